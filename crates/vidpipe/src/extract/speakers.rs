//! Speaker (guest) detection.
//!
//! Candidates come from the guests section of the generated description, or
//! failing that from phrases in the video title. A candidate is only
//! accepted if it also appears in the title or the transcript.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use regex::Regex;

use super::sections::{section_lines, strip_bullet, Section};

static RE_NO_GUEST: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)nessun|niente|\bnone\b|n/a|---").unwrap());
static RE_ROLE_SUFFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:\s+[\-–—]|\s*[–—:]|\s*\().*$").unwrap());
static RE_URL: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)https?:|www\.").unwrap());
static RE_DIGITS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d+$").unwrap());
static RE_HAS_LETTER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[a-zA-ZÀ-ÿ]").unwrap());
static RE_CAPITALIZED: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[A-ZÀ-Ý][a-zà-ÿ]").unwrap());
static RE_ALL_CAPS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[A-ZÀ-Ý\s]+$").unwrap());
static RE_LOWER_WORDS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^[a-zà-ÿ]+\s+[a-zà-ÿ]+").unwrap());

const NAME: &str = r"([A-ZÀ-Ý][a-zà-ÿ]+(?:\s+[A-ZÀ-Ý][a-zà-ÿ]+)+)";

static TITLE_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        format!(r"\b(?:con|with)\s+{NAME}"),
        format!(r"(?i:\bintervista\s+(?:a|con)|\binterview\s+with)\s+{NAME}"),
        format!(r"(?i:\bospite|\bguest)[:\s]+{NAME}"),
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

/// Checks whether `name` looks like a person's name.
pub fn is_valid_name(name: &str) -> bool {
    let len = name.chars().count();
    if !(3..=60).contains(&len) {
        return false;
    }
    if name.contains('#') || RE_DIGITS.is_match(name) || RE_URL.is_match(name) {
        return false;
    }
    if name
        .chars()
        .any(|c| (0x1F300..=0x1F9FF).contains(&(c as u32)))
    {
        return false;
    }
    if !RE_HAS_LETTER.is_match(name) {
        return false;
    }
    RE_CAPITALIZED.is_match(name) || RE_ALL_CAPS.is_match(name) || RE_LOWER_WORDS.is_match(name)
}

fn mentioned_in(name: &str, haystacks: &[&str]) -> bool {
    let needle = name.to_lowercase();
    haystacks
        .iter()
        .any(|h| !h.is_empty() && h.to_lowercase().contains(&needle))
}

/// Cleans one guests-section line down to a candidate name.
fn candidate_from_line(line: &str) -> Option<String> {
    if line.starts_with('#') || RE_NO_GUEST.is_match(line) {
        return None;
    }
    let line = strip_bullet(line);
    let name = RE_ROLE_SUFFIX.replace(line, "");
    let name = name.trim().trim_matches('*').trim();
    if name.is_empty() {
        None
    } else {
        Some(name.to_string())
    }
}

/// Speakers listed in the guests section and grounded in title or transcript.
pub fn from_guest_section(text: &str, title: &str, transcript: &str) -> BTreeSet<String> {
    section_lines(text, Section::Guests)
        .into_iter()
        .filter_map(candidate_from_line)
        .filter(|name| is_valid_name(name))
        .filter(|name| mentioned_in(name, &[title, transcript]))
        .collect()
}

/// Speakers named in the title (`con Mario Rossi`, `intervista a ...`,
/// `ospite: ...`) that also appear in the transcript.
pub fn from_title(title: &str, transcript: &str) -> BTreeSet<String> {
    let mut found = BTreeSet::new();
    for pattern in TITLE_PATTERNS.iter() {
        for caps in pattern.captures_iter(title) {
            let name = caps[1].trim();
            if is_valid_name(name) && mentioned_in(name, &[transcript]) {
                found.insert(name.to_string());
            }
        }
    }
    found
}

/// Guest-section speakers, falling back to the title when none are found.
pub fn detect(text: &str, title: &str, transcript: &str) -> BTreeSet<String> {
    let speakers = from_guest_section(text, title, transcript);
    if !speakers.is_empty() {
        return speakers;
    }
    from_title(title, transcript)
}

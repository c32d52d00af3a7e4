//! Section slicing for generated descriptions.
//!
//! A description is a sequence of sections, each introduced by a heading
//! line: a markdown `##` heading, or an emoji followed by an upper-case
//! title such as `👤 OSPITI`. Emoji that open ordinary lines (`✅ Etica: …`)
//! are bullets. Sections are located by their heading keyword and run until
//! the next heading or the end of the text.

use std::sync::LazyLock;

use regex::Regex;

static RE_TOPICS_HEADING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(?:#+\s*)?(?:\*\*)?(?:\p{Extended_Pictographic}\u{FE0F}?\s*)?(?:ARGOMENTI\s+TRATTATI|TOPICS(?:\s+COVERED)?)\b").unwrap()
});
static RE_GUESTS_HEADING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(?:#+\s*)?(?:\*\*)?(?:\p{Extended_Pictographic}\u{FE0F}?\s*)?(?:OSPITI|OSPITE|GUESTS?)\b").unwrap()
});
static RE_BULLET: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[\-•\*]\s*").unwrap());
static RE_LABEL: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^([^:]+):").unwrap());
static RE_UPPERCASE_TITLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:\*\*)?\p{Lu}[\p{Lu}\d'’]+(?:\s+[\p{Lu}\d'’&/]+)*\s*:?\s*(?:\*\*)?$").unwrap()
});

/// Which section to slice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Section {
    Topics,
    Guests,
}

impl Section {
    fn heading(&self) -> &'static Regex {
        match self {
            Section::Topics => &RE_TOPICS_HEADING,
            Section::Guests => &RE_GUESTS_HEADING,
        }
    }
}

/// Returns the body lines of `section`, trimmed, without the heading.
///
/// Returns an empty vector if the section is absent.
pub fn section_lines(text: &str, section: Section) -> Vec<&str> {
    let mut lines = text.lines().map(str::trim);
    if !lines.by_ref().any(|line| section.heading().is_match(line)) {
        return Vec::new();
    }
    lines
        .take_while(|line| !is_heading(line))
        .filter(|line| !line.is_empty())
        .collect()
}

/// A heading is a markdown `##` line, or an emoji followed by nothing but
/// an upper-case title.
pub fn is_heading(line: &str) -> bool {
    if line.starts_with("##") {
        return true;
    }
    after_pictograph(line).is_some_and(|rest| RE_UPPERCASE_TITLE.is_match(rest))
}

/// The rest of `line` after a leading emoji and its presentation selector.
fn after_pictograph(line: &str) -> Option<&str> {
    let first = line.chars().next().filter(|c| is_pictograph(*c))?;
    let rest = line[first.len_utf8()..].trim_start_matches(['\u{FE0F}', '\u{200D}']);
    Some(rest.trim_start())
}

fn is_pictograph(c: char) -> bool {
    matches!(
        c as u32,
        0x1F000..=0x1FAFF | 0x2300..=0x23FF | 0x25A0..=0x27BF | 0x2B00..=0x2BFF
    )
}

/// Strips a leading list bullet: `-`, `•`, `*` or an emoji such as `✅`.
pub fn strip_bullet(line: &str) -> &str {
    let line = line.trim();
    if let Some(rest) = after_pictograph(line) {
        return rest.trim();
    }
    let stripped = match RE_BULLET.find(line) {
        // "**Bold**" starts with "*" but is not a bullet.
        Some(m) if !line.starts_with("**") => &line[m.end()..],
        _ => line,
    };
    stripped.trim()
}

/// Extracts the topic labels (`Label: description`) of the topics section.
///
/// Labels are kept when longer than 3 and shorter than 100 characters,
/// in order of first appearance.
pub fn topic_labels(text: &str) -> Vec<String> {
    let mut labels: Vec<String> = Vec::new();
    for line in section_lines(text, Section::Topics) {
        let line = strip_bullet(line);
        let Some(caps) = RE_LABEL.captures(line) else {
            continue;
        };
        let label = caps[1].trim().trim_matches('*').trim();
        let len = label.chars().count();
        if len > 3 && len < 100 && !labels.iter().any(|l| l == label) {
            labels.push(label.to_string());
        }
    }
    labels
}

#[cfg(test)]
mod tests {
    use super::*;

    const DESCRIPTION: &str = "\
Un video sull'intelligenza artificiale.

⏱️ CAPITOLI
00:00 Introduzione
05:12 Il futuro

🗂️ ARGOMENTI TRATTATI
• Intelligenza Artificiale: usi pratici nella vita quotidiana
- Etica: i rischi
* Machine Learning: come funziona
- Intelligenza Artificiale: ripetuto

👤 OSPITI
- Mario Rossi - ricercatore

#AI #MachineLearning
";

    #[test]
    fn test_topic_labels() {
        assert_eq!(
            topic_labels(DESCRIPTION),
            vec!["Intelligenza Artificiale", "Etica", "Machine Learning"]
        );
    }

    #[test]
    fn test_topic_label_length_bounds() {
        let text = "### 🗂️ TOPICS\n- AI: too short\n- Robotics: ok\n";
        assert_eq!(topic_labels(text), vec!["Robotics"]);

        let long = format!("### TOPICS\n- {}: long\n", "x".repeat(100));
        assert!(topic_labels(&long).is_empty());
        let edge = format!("### TOPICS\n- {}: fits\n", "x".repeat(99));
        assert_eq!(topic_labels(&edge).len(), 1);
    }

    #[test]
    fn test_section_stops_at_next_heading() {
        let lines = section_lines(DESCRIPTION, Section::Guests);
        assert_eq!(lines, vec!["- Mario Rossi - ricercatore", "#AI #MachineLearning"]);

        let topics = section_lines(DESCRIPTION, Section::Topics);
        assert_eq!(topics.len(), 4);
    }

    #[test]
    fn test_missing_section() {
        assert!(section_lines("no sections here", Section::Topics).is_empty());
        assert!(topic_labels("Topics are discussed: a lot").is_empty());
    }

    #[test]
    fn test_english_guest_heading() {
        let text = "### 👤 GUESTS\n- Jane Doe\n### 💬 Other\n- x";
        assert_eq!(section_lines(text, Section::Guests), vec!["- Jane Doe"]);
    }

    #[test]
    fn test_strip_bullet() {
        assert_eq!(strip_bullet("- item"), "item");
        assert_eq!(strip_bullet("•item"), "item");
        assert_eq!(strip_bullet("* item"), "item");
        assert_eq!(strip_bullet("**Bold**: x"), "**Bold**: x");
        assert_eq!(strip_bullet("plain"), "plain");
        assert_eq!(strip_bullet("✅ Etica: i rischi"), "Etica: i rischi");
        assert_eq!(strip_bullet("▪️ Robotica: oggi"), "Robotica: oggi");
        assert_eq!(strip_bullet("➡Mario Rossi"), "Mario Rossi");
    }

    #[test]
    fn test_emoji_bullets_do_not_end_a_section() {
        let text = "\
🗂️ ARGOMENTI TRATTATI
✅ Etica: i rischi dell'automazione
✔ Robotica: stato dell'arte
▪️ Reti Neurali: come imparano
➡ AI: troppo corto

👤 OSPITI
✅ Mario Rossi
";
        assert_eq!(topic_labels(text), vec!["Etica", "Robotica", "Reti Neurali"]);
        assert_eq!(section_lines(text, Section::Guests), vec!["✅ Mario Rossi"]);
    }

    #[test]
    fn test_is_heading() {
        assert!(is_heading("### Title"));
        assert!(is_heading("👤 OSPITI"));
        assert!(is_heading("⏱️ CAPITOLI"));
        assert!(!is_heading("# hashtag"));
        assert!(!is_heading("Plain text"));
        assert!(is_heading("🗂️ ARGOMENTI TRATTATI"));
        assert!(is_heading("📌 FONTI:"));
        assert!(is_heading("🎙️ **OSPITI**"));
        assert!(!is_heading("✅ Etica: i rischi"));
        assert!(!is_heading("➡ AI: usi pratici"));
        assert!(!is_heading("▪️ Mario Rossi"));
    }
}

//! Video duration parsing and formatting.

use std::sync::LazyLock;

use regex::Regex;

static RE_ISO8601: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^P(?:(\d+)D)?T?(?:(\d+)H)?(?:(\d+)M)?(?:(\d+)(?:\.\d+)?S)?$").unwrap()
});

/// Parses `H:MM:SS`, `MM:SS`, ISO 8601 (`PT1H2M3S`) or a plain number of
/// seconds. Anything else yields 0.
pub fn parse_duration(input: &str) -> u64 {
    let input = input.trim();
    if input.is_empty() {
        return 0;
    }

    if input.starts_with('P') {
        return parse_iso8601(input);
    }

    if input.contains(':') {
        return parse_clock(input);
    }

    input.parse().unwrap_or(0)
}

fn parse_iso8601(input: &str) -> u64 {
    // "P" and "PT" alone match the pattern with no components.
    if input == "P" || input == "PT" {
        return 0;
    }
    let Some(caps) = RE_ISO8601.captures(input) else {
        return 0;
    };
    let part = |i: usize| -> Option<u64> {
        caps.get(i).map_or(Some(0), |m| m.as_str().parse::<u64>().ok())
    };
    let total = || -> Option<u64> {
        part(1)?
            .checked_mul(86_400)?
            .checked_add(part(2)?.checked_mul(3_600)?)?
            .checked_add(part(3)?.checked_mul(60)?)?
            .checked_add(part(4)?)
    };
    total().unwrap_or(0)
}

fn parse_clock(input: &str) -> u64 {
    let parts: Vec<&str> = input.split(':').collect();
    if parts.len() > 3 || parts.iter().any(|p| p.is_empty() || !p.bytes().all(|b| b.is_ascii_digit())) {
        return 0;
    }
    parts
        .iter()
        .try_fold(0u64, |acc, p| acc.checked_mul(60)?.checked_add(p.parse::<u64>().ok()?))
        .unwrap_or(0)
}

/// Formats seconds as `H:MM:SS`, or `M:SS` under an hour.
pub fn format_duration(seconds: u64) -> String {
    let hours = seconds / 3_600;
    let minutes = (seconds % 3_600) / 60;
    let secs = seconds % 60;
    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, secs)
    } else {
        format!("{}:{:02}", minutes, secs)
    }
}

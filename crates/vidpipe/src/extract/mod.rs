//! Structured entity extraction from generated descriptions.
//!
//! Extraction never fails: malformed or missing sections simply produce
//! empty results.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

pub mod sections;
pub mod speakers;

static RE_HASHTAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"#([A-Za-z0-9À-ÿ_]+)").unwrap());

/// Entities extracted from one description.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entities {
    #[serde(default)]
    pub tags: BTreeSet<String>,
    #[serde(default)]
    pub categories: Vec<String>,
    #[serde(default)]
    pub speakers: BTreeSet<String>,
}

impl Entities {
    pub fn is_empty(&self) -> bool {
        self.tags.is_empty() && self.categories.is_empty() && self.speakers.is_empty()
    }
}

/// Which entity kinds to extract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionToggles {
    #[serde(default = "default_true")]
    pub tags: bool,
    #[serde(default = "default_true")]
    pub categories: bool,
    #[serde(default = "default_true")]
    pub speakers: bool,
}

fn default_true() -> bool {
    true
}

impl Default for ExtractionToggles {
    fn default() -> Self {
        Self {
            tags: true,
            categories: true,
            speakers: true,
        }
    }
}

/// Per-job overrides; `None` falls back to the global toggle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionOverrides {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub categories: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speakers: Option<bool>,
}

impl ExtractionOverrides {
    pub fn resolve(&self, defaults: ExtractionToggles) -> ExtractionToggles {
        ExtractionToggles {
            tags: self.tags.unwrap_or(defaults.tags),
            categories: self.categories.unwrap_or(defaults.categories),
            speakers: self.speakers.unwrap_or(defaults.speakers),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_none() && self.categories.is_none() && self.speakers.is_none()
    }
}

/// Distinct hashtags in `text`, without the leading `#`.
pub fn hashtags(text: &str) -> BTreeSet<String> {
    RE_HASHTAG
        .captures_iter(text)
        .map(|c| c[1].to_string())
        .collect()
}

/// Extracts tags, categories and speakers from generated text.
#[derive(Debug, Clone, Copy, Default)]
pub struct Extractor;

impl Extractor {
    pub fn new() -> Self {
        Self
    }

    /// Runs the enabled extractors over `text`.
    ///
    /// Speakers are grounded against `title` and `transcript`; a name that
    /// appears in neither is dropped.
    pub fn extract(
        &self,
        text: &str,
        title: &str,
        transcript: &str,
        toggles: ExtractionToggles,
    ) -> Entities {
        let mut entities = Entities::default();
        if toggles.tags {
            entities.tags = hashtags(text);
        }
        if toggles.categories {
            entities.categories = sections::topic_labels(text);
        }
        if toggles.speakers {
            entities.speakers = speakers::detect(text, title, transcript);
        }
        log::debug!(
            "Extracted {} tags, {} categories, {} speakers",
            entities.tags.len(),
            entities.categories.len(),
            entities.speakers.len()
        );
        entities
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEXT: &str = "\
Descrizione breve.

🗂️ ARGOMENTI TRATTATI
- Intelligenza Artificiale: usi pratici

👤 OSPITI
- Mario Rossi - ricercatore

#AI #MachineLearning #AI
";

    #[test]
    fn test_hashtags_deduplicated() {
        let tags = hashtags("#AI #MachineLearning #AI");
        assert_eq!(
            tags,
            BTreeSet::from(["AI".to_string(), "MachineLearning".to_string()])
        );
    }

    #[test]
    fn test_hashtags_accented() {
        let tags = hashtags("#Società #città_futura");
        assert!(tags.contains("Società"));
        assert!(tags.contains("città_futura"));
    }

    #[test]
    fn test_extract_all() {
        let entities = Extractor::new().extract(
            TEXT,
            "Puntata 3",
            "oggi con mario rossi",
            ExtractionToggles::default(),
        );
        assert_eq!(entities.tags.len(), 2);
        assert_eq!(entities.categories, vec!["Intelligenza Artificiale"]);
        assert_eq!(
            entities.speakers,
            BTreeSet::from(["Mario Rossi".to_string()])
        );
    }

    #[test]
    fn test_extract_respects_toggles() {
        let toggles = ExtractionOverrides {
            tags: Some(false),
            speakers: Some(false),
            ..Default::default()
        }
        .resolve(ExtractionToggles::default());

        let entities = Extractor::new().extract(TEXT, "", "mario rossi", toggles);
        assert!(entities.tags.is_empty());
        assert!(entities.speakers.is_empty());
        assert_eq!(entities.categories.len(), 1);
    }

    #[test]
    fn test_override_beats_default() {
        let defaults = ExtractionToggles {
            tags: false,
            categories: true,
            speakers: true,
        };
        let resolved = ExtractionOverrides {
            tags: Some(true),
            categories: None,
            speakers: Some(false),
        }
        .resolve(defaults);
        assert!(resolved.tags);
        assert!(resolved.categories);
        assert!(!resolved.speakers);
    }

    #[test]
    fn test_extract_empty_text() {
        let entities = Extractor::new().extract("", "", "", ExtractionToggles::default());
        assert!(entities.is_empty());
    }
}

//! Prompt selection and assembly for description generation.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::config::ChannelConfig;
use crate::gateway::PromptAuthority;
use crate::worker::job::{PromptSource, VideoDetails};

/// Longest transcript excerpt sent for generation, in characters.
pub const TRANSCRIPT_LIMIT_CHARS: usize = 30_000;

const SEPARATOR: &str = "\n\n---\n\n";

/// Built-in prompt used when no other prompt is configured. It asks for the
/// topic and guest sections that entity extraction reads back.
pub const FALLBACK_PROMPT: &str = "\
Sei un esperto copywriter per YouTube.

Analizza la trascrizione del video e genera una descrizione completa usando questo formato:

### Descrizione
[150-200 parole che riassumono il contenuto del video in modo coinvolgente]

### Capitoli
[Se la durata lo permette, capitoli con timestamp nel formato MM:SS — Titolo, a partire da 00:00]

### 🗂️ ARGOMENTI TRATTATI
[Un argomento per riga nel formato:
• Nome Argomento: breve descrizione
Usa termini chiari e cercabili, diventeranno categorie]

### 👤 OSPITI
[Un ospite per riga nel formato:
• Nome Cognome — Ruolo
Se non ci sono ospiti scrivi: Nessun ospite]

### Hashtag
[20-25 hashtag rilevanti su una riga, separati da spazi]

Scrivi in italiano. Tono professionale ma accessibile.";

/// A prompt together with where it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPrompt {
    pub text: String,
    pub source: PromptSource,
}

/// Picks the prompt for one generation.
///
/// Priority: personalized remote prompt, legacy remote prompt, local
/// configured prompt, built-in fallback. Remote failures fall through to the
/// next source. Remote prompts live only for the duration of the call.
#[derive(Clone, Default)]
pub struct PromptResolver {
    personalized: Option<Arc<dyn PromptAuthority>>,
    legacy: Option<Arc<dyn PromptAuthority>>,
    local: Option<String>,
}

impl PromptResolver {
    pub fn new(
        personalized: Option<Arc<dyn PromptAuthority>>,
        legacy: Option<Arc<dyn PromptAuthority>>,
        local: Option<String>,
    ) -> Self {
        Self {
            personalized,
            legacy,
            local,
        }
    }

    pub async fn resolve(&self) -> ResolvedPrompt {
        let remotes = [
            (&self.personalized, PromptSource::Personalized),
            (&self.legacy, PromptSource::Legacy),
        ];
        for (authority, source) in remotes {
            let Some(authority) = authority else {
                continue;
            };
            if let Some(text) = fetch_remote(authority.as_ref(), source).await {
                debug!("Using {} prompt", source);
                return ResolvedPrompt { text, source };
            }
        }

        if let Some(local) = self.local.as_deref().filter(|p| !p.trim().is_empty()) {
            debug!("Using local prompt");
            return ResolvedPrompt {
                text: local.to_string(),
                source: PromptSource::Local,
            };
        }

        debug!("Using fallback prompt");
        ResolvedPrompt {
            text: FALLBACK_PROMPT.to_string(),
            source: PromptSource::Fallback,
        }
    }
}

async fn fetch_remote(authority: &dyn PromptAuthority, source: PromptSource) -> Option<String> {
    match authority.has_golden_prompt().await {
        Ok(true) => {}
        Ok(false) => return None,
        Err(e) => {
            warn!("Checking {} prompt failed: {}", source, e);
            return None;
        }
    }
    match authority.golden_prompt().await {
        Ok(prompt) => prompt.map(|p| p.text).filter(|t| !t.trim().is_empty()),
        Err(e) => {
            warn!("Fetching {} prompt failed: {}", source, e);
            None
        }
    }
}

/// Replaces `{NAME}` placeholders with the channel's values. Unset values
/// become empty strings.
pub fn apply_placeholders(prompt: &str, channel: &ChannelConfig) -> String {
    channel
        .placeholders()
        .iter()
        .fold(prompt.to_string(), |text, (name, value)| {
            text.replace(&format!("{{{}}}", name), value)
        })
}

/// First `TRANSCRIPT_LIMIT_CHARS` characters of a transcript.
pub fn truncate_transcript(transcript: &str) -> &str {
    match transcript.char_indices().nth(TRANSCRIPT_LIMIT_CHARS) {
        Some((byte_index, _)) => &transcript[..byte_index],
        None => transcript,
    }
}

/// Full text sent for generation: the prompt, a separator, then the video
/// block with title, duration, native chapters and transcript.
pub fn build_generation_input(prompt: &str, video: &VideoDetails, transcript: &str) -> String {
    let mut content = format!("TITOLO VIDEO: {}\n\n", video.title);

    if video.duration_seconds > 0 {
        content.push_str(&format!(
            "DURATA VIDEO: {} ({} secondi)\n\n",
            video.duration_formatted, video.duration_seconds
        ));
    }

    if let Some(chapters) = video.native_chapters.as_deref().filter(|c| !c.is_empty()) {
        content.push_str("⚠️ CAPITOLI YOUTUBE (USA QUESTI TIMESTAMP):\n");
        content.push_str(chapters);
        content.push_str("\n\n");
    }

    content.push_str("TRASCRIZIONE:\n");
    content.push_str(truncate_transcript(transcript));

    format!("{prompt}{SEPARATOR}{content}")
}

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use utoipa::ToSchema;

use crate::models::internal::{ChatTurn, Entry, MAX_TAG_LEN};
use crate::services::completion_client::{complete_with_timeout, CompletionError, CompletionService};

pub const MAX_THEMES: usize = 5;

const REFLECTION_PROMPT: &str = "\
You are a gentle journaling companion. Read the person's entry and write a short \
reflection of two to four sentences in the second person. Mirror what they seem to \
feel, notice one thing worth sitting with, and end with at most one open question. \
Do not diagnose and do not give a list of advice.";

const THEMES_PROMPT: &str = "\
Extract up to 5 short theme labels (one or two words each) from the journal entry. \
Order them from most to least central. \
Return ONLY the labels, comma-separated, no explanation.";

/// Generated annotations for a single entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct EntryAnnotations {
    pub reflection: String,
    pub themes: Vec<String>,
}

pub struct ReflectionWriter {
    completion: Arc<dyn CompletionService>,
    timeout: Duration,
}

impl ReflectionWriter {
    pub fn new(completion: Arc<dyn CompletionService>, timeout: Duration) -> Self {
        Self {
            completion,
            timeout,
        }
    }

    /// Asks for a reflection, then for theme labels. Either failure fails the
    /// whole call; callers decide whether that is fatal.
    pub async fn reflect(&self, entry: &Entry) -> Result<EntryAnnotations, CompletionError> {
        let request = [ChatTurn::user(render_entry(entry))];

        let reflection =
            complete_with_timeout(self.completion.as_ref(), self.timeout, REFLECTION_PROMPT, &request)
                .await?;

        let raw_themes =
            complete_with_timeout(self.completion.as_ref(), self.timeout, THEMES_PROMPT, &request)
                .await?;
        let themes = parse_themes(&raw_themes);

        tracing::debug!(
            "Reflected on entry {}: {} chars, themes {:?}",
            entry.id,
            reflection.len(),
            themes
        );

        Ok(EntryAnnotations { reflection, themes })
    }
}

fn render_entry(entry: &Entry) -> String {
    let mut text = format!("Entry from {}", entry.date());
    if let Some(mood) = entry.mood {
        text.push_str(&format!(", mood: {}", mood));
    }
    if let Some(energy) = entry.energy {
        text.push_str(&format!(", energy: {}/5", energy));
    }
    if !entry.tags.is_empty() {
        text.push_str(&format!(", tags: {}", entry.tags.join(", ")));
    }
    text.push_str("\n\n");
    text.push_str(entry.content.trim());
    text
}

/// Parses a comma-separated label list, tolerating bullets, quotes and
/// newlines. Keeps generator order.
pub fn parse_themes(raw: &str) -> Vec<String> {
    let mut themes: Vec<String> = Vec::new();

    for label in raw.split([',', '\n']) {
        let label = strip_list_marker(label.trim())
            .trim()
            .trim_matches(|c: char| c == '"' || c == '\'' || c == '`')
            .trim()
            .to_lowercase();

        if label.is_empty() || label.chars().count() > MAX_TAG_LEN {
            continue;
        }
        if !themes.contains(&label) {
            themes.push(label);
        }
        if themes.len() == MAX_THEMES {
            break;
        }
    }

    themes
}

/// Removes a leading `- `, `* `, `• `, `1. ` or `2) ` list marker. Digits or
/// hyphens that belong to the label itself are kept.
fn strip_list_marker(label: &str) -> &str {
    for bullet in ['-', '*', '•'] {
        if let Some(rest) = label.strip_prefix(bullet) {
            if rest.is_empty() || rest.starts_with(char::is_whitespace) {
                return rest;
            }
        }
    }

    let unnumbered = label.trim_start_matches(|c: char| c.is_ascii_digit());
    if unnumbered.len() < label.len() {
        if let Some(rest) = unnumbered.strip_prefix(['.', ')']) {
            if rest.is_empty() || rest.starts_with(char::is_whitespace) {
                return rest;
            }
        }
    }

    label
}

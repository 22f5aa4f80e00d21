use std::fmt::Write;

use super::context_assembly::ContextPayload;
use super::insights::MoodTrend;
use crate::models::internal::SessionType;

/// Fixed companion persona. Always rendered first.
pub const PERSONA: &str = "\
You are a warm, thoughtful journaling companion. You help the person reflect on \
their own words; you are not a therapist and you do not diagnose. \
Ask at most one question at a time, and let the person lead. \
Avoid clinical or diagnostic language and avoid lists of advice. \
Refer to past entries naturally and only when it helps, never recite them back. \
Keep replies short: two to four sentences unless asked for more.";

/// Explicit per-session state handed in by the caller.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionState {
    pub session_type: SessionType,
    pub current_entry: Option<String>,
}

fn session_guidance(session_type: SessionType) -> &'static str {
    match session_type {
        SessionType::Freeform => {
            "Open conversation. Follow the person's lead and draw on their journal only when relevant."
        }
        SessionType::EntryReflection => {
            "The person wants to talk about the entry under \"Current Entry\". Stay close to it."
        }
        SessionType::WeeklyReview => {
            "Help the person look back over the past week: what stood out, what shifted, what they want to carry forward."
        }
    }
}

fn describe_trend(trend: MoodTrend) -> Option<&'static str> {
    match trend {
        MoodTrend::Up => Some("Mood has been trending up over the past week."),
        MoodTrend::Down => Some("Mood has been trending down over the past week."),
        MoodTrend::Stable => Some("Mood has been fairly steady over the past week."),
        MoodTrend::InsufficientData => None,
    }
}

/// Renders persona, session guidance and each non-empty context tier under
/// its own heading. The current entry, when present, always comes last.
pub fn build_prompt(payload: &ContextPayload, session: &SessionState) -> String {
    let mut prompt = String::from(PERSONA);

    push_section(&mut prompt, "Session", session_guidance(session.session_type));

    if !payload.recent_entries.is_empty() {
        let mut body = String::new();
        for entry in &payload.recent_entries {
            let _ = write!(body, "- {}", entry.date);
            if let Some(mood) = entry.mood {
                let _ = write!(body, " (mood: {})", mood);
            }
            if !entry.themes.is_empty() {
                let _ = write!(body, " [themes: {}]", entry.themes.join(", "));
            }
            body.push('\n');
            for line in entry.content.trim().lines() {
                let _ = writeln!(body, "  {}", line);
            }
        }
        push_section(&mut prompt, "Recent Entries", body.trim_end());
    }

    if let Some(trend) = describe_trend(payload.mood_trend) {
        push_section(&mut prompt, "Mood Trend", trend);
    }

    if !payload.recurring_themes.is_empty() {
        let body = payload
            .recurring_themes
            .iter()
            .map(|theme| format!("- {}", theme))
            .collect::<Vec<_>>()
            .join("\n");
        push_section(&mut prompt, "Recurring Themes", &body);
    }

    if !payload.long_term_summary.trim().is_empty() {
        push_section(
            &mut prompt,
            "Long-Term Context",
            payload.long_term_summary.trim(),
        );
    }

    if let Some(current) = session
        .current_entry
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty())
    {
        push_section(&mut prompt, "Current Entry", current);
    }

    prompt
}

fn push_section(prompt: &mut String, heading: &str, body: &str) {
    let _ = write!(prompt, "\n\n## {}\n{}", heading, body);
}

/// Rough token count (1 token ≈ 4 characters).
pub fn estimate_tokens(text: &str) -> usize {
    text.chars().count().div_ceil(4)
}

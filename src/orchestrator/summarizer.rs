use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use utoipa::ToSchema;

use super::OrchestratorError;
use crate::models::internal::{ChatTurn, Entry, EntryFilter, PeriodType, Summary};
use crate::services::completion_client::{complete_with_timeout, CompletionService};
use crate::storage::repository::{EntryStore, SummaryStore};

/// Entries read per store round trip while collecting a period.
pub const SUMMARY_PAGE_SIZE: u64 = 200;

const WEEKLY_SUMMARY_PROMPT: &str = "\
You write short narrative summaries of a person's journal. Summarize the week below \
in one paragraph of at most 150 words, in the second person. Mention recurring \
feelings, notable events and any shift in mood. Do not give advice.";

const MONTHLY_SUMMARY_PROMPT: &str = "\
You write short narrative summaries of a person's journal. Summarize the month below \
in at most 250 words, in the second person. Capture the arc of the month: what \
occupied the person, how their mood moved, and themes that kept returning. Do not \
give advice.";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct SummaryOutcome {
    pub summary: Summary,
    /// `false` when served from the store.
    pub generated: bool,
}

/// Produces one summary per (user, period) and serves it from the store ever
/// after. A failed generation persists nothing.
pub struct SummaryGenerator {
    entries: Arc<dyn EntryStore>,
    summaries: Arc<dyn SummaryStore>,
    completion: Arc<dyn CompletionService>,
    timeout: Duration,
}

impl SummaryGenerator {
    pub fn new(
        entries: Arc<dyn EntryStore>,
        summaries: Arc<dyn SummaryStore>,
        completion: Arc<dyn CompletionService>,
        timeout: Duration,
    ) -> Self {
        Self {
            entries,
            summaries,
            completion,
            timeout,
        }
    }

    pub async fn get_or_generate(
        &self,
        user_id: &str,
        period_start: NaiveDate,
        period_type: PeriodType,
    ) -> Result<SummaryOutcome, OrchestratorError> {
        let period_end = period_type
            .period_end(period_start)
            .map_err(OrchestratorError::Validation)?;

        if let Some(existing) = self
            .summaries
            .get_summary(user_id, period_start, period_type)
            .await?
        {
            return Ok(SummaryOutcome {
                summary: existing,
                generated: false,
            });
        }

        let mut entries = self.period_entries(user_id, period_start, period_end).await?;
        if entries.is_empty() {
            return Err(OrchestratorError::NotFound(format!(
                "no entries between {} and {}",
                period_start, period_end
            )));
        }
        // Chronological reads better than newest-first.
        entries.reverse();

        tracing::info!(
            "Generating {} summary for {} starting {} from {} entries",
            period_type.as_str(),
            user_id,
            period_start,
            entries.len()
        );

        let system_prompt = match period_type {
            PeriodType::Weekly => WEEKLY_SUMMARY_PROMPT,
            PeriodType::Monthly => MONTHLY_SUMMARY_PROMPT,
        };
        let request = ChatTurn::user(render_period(&entries, period_start, period_end));
        let text = complete_with_timeout(
            self.completion.as_ref(),
            self.timeout,
            system_prompt,
            std::slice::from_ref(&request),
        )
        .await?;

        let summary = Summary {
            user_id: user_id.to_string(),
            period_start,
            period_end,
            period_type,
            summary: text,
            entry_count: entries.len() as u32,
        };
        self.summaries.upsert_summary(&summary).await?;

        // Concurrent generators converge on whatever the store kept.
        let stored = self
            .summaries
            .get_summary(user_id, period_start, period_type)
            .await?
            .unwrap_or(summary);

        Ok(SummaryOutcome {
            summary: stored,
            generated: true,
        })
    }

    /// Generates the previous week and previous month if they are missing.
    /// Periods without entries are skipped.
    pub async fn backfill(
        &self,
        user_id: &str,
        today: NaiveDate,
    ) -> Result<Vec<SummaryOutcome>, OrchestratorError> {
        let mut outcomes = Vec::new();
        for period_type in [PeriodType::Weekly, PeriodType::Monthly] {
            let start = period_type.previous_period_start(today);
            match self.get_or_generate(user_id, start, period_type).await {
                Ok(outcome) => outcomes.push(outcome),
                Err(OrchestratorError::NotFound(reason)) => {
                    tracing::debug!("Skipping {} backfill: {}", period_type.as_str(), reason)
                }
                Err(e) => return Err(e),
            }
        }
        Ok(outcomes)
    }

    async fn period_entries(
        &self,
        user_id: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<Entry>, OrchestratorError> {
        let since = start
            .and_hms_opt(0, 0, 0)
            .map(|t| t.and_utc())
            .ok_or_else(|| OrchestratorError::Validation(format!("bad period start {}", start)))?;
        let until = end
            .and_hms_micro_opt(23, 59, 59, 999_999)
            .map(|t| t.and_utc())
            .ok_or_else(|| OrchestratorError::Validation(format!("bad period end {}", end)))?;

        let mut entries = Vec::new();
        loop {
            let filter = EntryFilter {
                since: Some(since),
                until: Some(until),
                limit: SUMMARY_PAGE_SIZE,
                offset: entries.len() as u64,
                ..Default::default()
            };
            let page = self.entries.list_entries(user_id, &filter).await?;
            let exhausted = (page.len() as u64) < SUMMARY_PAGE_SIZE;
            entries.extend(page);
            if exhausted {
                break;
            }
        }
        Ok(entries)
    }
}

fn render_period(entries: &[Entry], start: NaiveDate, end: NaiveDate) -> String {
    let mut text = format!("Journal entries from {} to {}:\n", start, end);
    for entry in entries {
        text.push('\n');
        text.push_str(&format!("[{}]", entry.date()));
        if let Some(mood) = entry.mood {
            text.push_str(&format!(" (mood: {})", mood));
        }
        if !entry.tags.is_empty() {
            text.push_str(&format!(" tags: {}", entry.tags.join(", ")));
        }
        text.push('\n');
        text.push_str(entry.content.trim());
        text.push('\n');
    }
    text
}

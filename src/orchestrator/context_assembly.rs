use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};
use utoipa::ToSchema;

use super::insights::{self, MoodTrend};
use super::summarizer::SummaryGenerator;
use super::OrchestratorError;
use crate::models::internal::{Entry, EntryFilter, Mood, PeriodType};
use crate::storage::repository::{EntryStore, SummaryStore};

/// Short-horizon window feeding live conversation.
pub const RECENT_WINDOW_DAYS: i64 = 7;
pub const RECENT_ENTRY_LIMIT: u64 = 10;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct RecentEntry {
    pub date: NaiveDate,
    pub content: String,
    pub mood: Option<Mood>,
    pub themes: Vec<String>,
}

impl From<&Entry> for RecentEntry {
    fn from(entry: &Entry) -> Self {
        Self {
            date: entry.date(),
            content: entry.content.clone(),
            mood: entry.mood,
            themes: entry.themes.clone(),
        }
    }
}

/// Tiered history for one conversation turn. Recomputed on every call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ContextPayload {
    pub recent_entries: Vec<RecentEntry>,
    pub mood_trend: MoodTrend,
    pub recurring_themes: Vec<String>,
    pub long_term_summary: String,
}

pub struct ContextAssembler {
    entries: Arc<dyn EntryStore>,
    summaries: Arc<dyn SummaryStore>,
    backfill: Option<Arc<SummaryGenerator>>,
    /// (user, period start) keys with a backfill task still running.
    in_flight: Arc<Mutex<HashSet<(String, NaiveDate)>>>,
}

impl ContextAssembler {
    pub fn new(entries: Arc<dyn EntryStore>, summaries: Arc<dyn SummaryStore>) -> Self {
        Self {
            entries,
            summaries,
            backfill: None,
            in_flight: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    /// Missing monthly summaries get generated in a detached task; assembly
    /// itself never waits for them.
    pub fn with_backfill(mut self, generator: Arc<SummaryGenerator>) -> Self {
        self.backfill = Some(generator);
        self
    }

    pub async fn assemble(
        &self,
        user_id: &str,
        current_entry: Option<&str>,
    ) -> Result<ContextPayload, OrchestratorError> {
        self.assemble_at(user_id, current_entry, Utc::now()).await
    }

    pub async fn assemble_at(
        &self,
        user_id: &str,
        current_entry: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<ContextPayload, OrchestratorError> {
        if user_id.trim().is_empty() {
            return Err(OrchestratorError::Validation(
                "user id must not be empty".to_string(),
            ));
        }

        // Tier 1: the last week of entries, newest first
        let filter = EntryFilter {
            since: Some(now - Duration::days(RECENT_WINDOW_DAYS)),
            limit: RECENT_ENTRY_LIMIT,
            ..Default::default()
        };
        let window = self
            .entries
            .list_entries(user_id, &filter)
            .await
            .map_err(OrchestratorError::ContextUnavailable)?;

        // Tier 2: derived signals over the same window
        let mood_trend = insights::mood_trend(&window);
        let recurring_themes = insights::recurring_themes(
            &window,
            insights::RECURRING_MIN_COUNT,
            insights::DEFAULT_TOP_K,
        );

        // Tier 3: long-term narrative
        let latest = self
            .summaries
            .latest_summary(user_id, PeriodType::Monthly)
            .await
            .map_err(OrchestratorError::ContextUnavailable)?;
        self.spawn_backfill(
            user_id,
            latest.as_ref().map(|s| s.period_start),
            now.date_naive(),
        );
        let long_term_summary = latest.map(|s| s.summary).unwrap_or_default();

        // The focused entry is rendered on its own; don't repeat it.
        let focused = current_entry.map(str::trim).filter(|t| !t.is_empty());
        let recent_entries: Vec<RecentEntry> = window
            .iter()
            .filter(|e| focused != Some(e.content.trim()))
            .map(RecentEntry::from)
            .collect();

        tracing::debug!(
            "Assembled context for {}: {} recent entries, trend {}, {} recurring themes, summary {} chars",
            user_id,
            recent_entries.len(),
            mood_trend,
            recurring_themes.len(),
            long_term_summary.len()
        );

        Ok(ContextPayload {
            recent_entries,
            mood_trend,
            recurring_themes,
            long_term_summary,
        })
    }

    fn spawn_backfill(&self, user_id: &str, latest_start: Option<NaiveDate>, today: NaiveDate) {
        let Some(generator) = &self.backfill else {
            return;
        };

        let period_start = PeriodType::Monthly.previous_period_start(today);
        if latest_start.is_some_and(|start| start >= period_start) {
            return;
        }

        let key = (user_id.to_string(), period_start);
        let claimed = self
            .in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.clone());
        if !claimed {
            tracing::debug!("Backfill for {} in {} already running", user_id, period_start);
            return;
        }

        let generator = Arc::clone(generator);
        let in_flight = Arc::clone(&self.in_flight);
        tokio::spawn(async move {
            let (user_id, period_start) = &key;
            match generator
                .get_or_generate(user_id, *period_start, PeriodType::Monthly)
                .await
            {
                Ok(outcome) if outcome.generated => {
                    tracing::info!("Backfilled monthly summary {} for {}", period_start, user_id)
                }
                Ok(_) => {}
                Err(OrchestratorError::NotFound(_)) => {
                    tracing::debug!("No entries to backfill for {} in {}", user_id, period_start)
                }
                Err(e) => tracing::warn!("Monthly summary backfill failed for {}: {}", user_id, e),
            }
            in_flight
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .remove(&key);
        });
    }
}

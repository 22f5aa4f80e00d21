pub mod companion;
pub mod context_assembly;
pub mod insights;
pub mod prompt_builder;
pub mod reflection;
pub mod summarizer;

use chrono::{Duration as ChronoDuration, NaiveDate, Utc};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;
use validator::Validate;

use crate::config::Config;
use crate::models::internal::{
    Conversation, Entry, EntryFilter, EntryUpdate, NewEntry, PeriodType,
};
use crate::services::completion_client::{CompletionError, CompletionService};
use crate::storage::repository::{ConversationStore, EntryStore, RepositoryError, SummaryStore};

use companion::{ChatReply, Companion, ConversationThread, SendMessage};
use context_assembly::{ContextAssembler, ContextPayload};
use insights::Insights;
use prompt_builder::SessionState;
use reflection::ReflectionWriter;
use summarizer::{SummaryGenerator, SummaryOutcome};

/// Window for the insight statistics; the streak always looks at full history.
pub const INSIGHTS_WINDOW_DAYS: i64 = 30;
const INSIGHTS_ENTRY_LIMIT: u64 = 1000;
const STREAK_DATE_LIMIT: u64 = 3660;

#[derive(Debug, thiserror::Error)]
pub enum OrchestratorError {
    #[error("Validation failed: {0}")]
    Validation(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Store unavailable: {0}")]
    StoreUnavailable(RepositoryError),
    #[error("Context unavailable: {0}")]
    ContextUnavailable(RepositoryError),
    #[error("Completion failed: {0}")]
    Completion(#[from] CompletionError),
}

impl OrchestratorError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, OrchestratorError::Completion(e) if e.is_timeout())
    }
}

impl From<RepositoryError> for OrchestratorError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound(what) => OrchestratorError::NotFound(what),
            RepositoryError::InvalidInput(reason) => OrchestratorError::Validation(reason),
            other => OrchestratorError::StoreUnavailable(other),
        }
    }
}

impl From<validator::ValidationErrors> for OrchestratorError {
    fn from(errors: validator::ValidationErrors) -> Self {
        OrchestratorError::Validation(errors.to_string())
    }
}

#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    pub completion_timeout: Duration,
    pub max_history_messages: usize,
    /// Generate last month's summary in the background during context assembly.
    pub summary_backfill: bool,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            completion_timeout: Duration::from_secs(60),
            max_history_messages: 20,
            summary_backfill: true,
        }
    }
}

impl From<&Config> for OrchestratorSettings {
    fn from(config: &Config) -> Self {
        Self {
            completion_timeout: config.completion_timeout(),
            max_history_messages: config.max_history_messages as usize,
            summary_backfill: config.summarization_enabled,
        }
    }
}

/// Facade over the journal core: entries, reflections, context, summaries,
/// insights and conversations.
pub struct JournalOrchestrator {
    entries: Arc<dyn EntryStore>,
    pub context_assembler: Arc<ContextAssembler>,
    pub summary_generator: Arc<SummaryGenerator>,
    pub reflection_writer: ReflectionWriter,
    pub companion: Companion,
}

impl JournalOrchestrator {
    pub fn new(
        entries: Arc<dyn EntryStore>,
        summaries: Arc<dyn SummaryStore>,
        conversations: Arc<dyn ConversationStore>,
        completion: Arc<dyn CompletionService>,
        settings: OrchestratorSettings,
    ) -> Self {
        let summary_generator = Arc::new(SummaryGenerator::new(
            entries.clone(),
            summaries.clone(),
            completion.clone(),
            settings.completion_timeout,
        ));

        let mut assembler = ContextAssembler::new(entries.clone(), summaries);
        if settings.summary_backfill {
            assembler = assembler.with_backfill(summary_generator.clone());
        }
        let context_assembler = Arc::new(assembler);

        Self {
            entries: entries.clone(),
            context_assembler: context_assembler.clone(),
            summary_generator,
            reflection_writer: ReflectionWriter::new(completion.clone(), settings.completion_timeout),
            companion: Companion::new(
                entries,
                conversations,
                completion,
                context_assembler,
                settings.completion_timeout,
                settings.max_history_messages,
            ),
        }
    }

    // ---- entries ----

    /// Persists the entry, then optionally annotates it. Annotation failure
    /// is logged and the entry comes back without a reflection.
    pub async fn create_entry(
        &self,
        user_id: &str,
        new_entry: NewEntry,
        generate_reflection: bool,
    ) -> Result<Entry, OrchestratorError> {
        require_user(user_id)?;
        new_entry.validate()?;

        let entry = self.entries.create_entry(user_id, new_entry).await?;
        tracing::debug!("Created entry {} for {}", entry.id, user_id);

        if !generate_reflection {
            return Ok(entry);
        }

        // The entry is already stored, so neither generation nor the
        // annotation write can fail creation.
        match self.annotate(user_id, &entry).await {
            Ok(annotated) => Ok(annotated),
            Err(OrchestratorError::Completion(e)) => {
                tracing::warn!("Reflection for entry {} failed: {}", entry.id, e);
                Ok(entry)
            }
            Err(e) => {
                tracing::error!("Storing reflection for entry {} failed: {}", entry.id, e);
                Ok(entry)
            }
        }
    }

    /// On-demand (re)generation. Unlike creation, failures surface.
    pub async fn reflect_on_entry(&self, user_id: &str, id: Uuid) -> Result<Entry, OrchestratorError> {
        let entry = self.get_entry(user_id, id).await?;
        self.annotate(user_id, &entry).await
    }

    async fn annotate(&self, user_id: &str, entry: &Entry) -> Result<Entry, OrchestratorError> {
        let annotations = self.reflection_writer.reflect(entry).await?;
        self.entries
            .annotate_entry(
                user_id,
                entry.id,
                Some(annotations.reflection),
                annotations.themes,
            )
            .await?
            .ok_or_else(|| OrchestratorError::NotFound(format!("entry {}", entry.id)))
    }

    pub async fn get_entry(&self, user_id: &str, id: Uuid) -> Result<Entry, OrchestratorError> {
        self.entries
            .get_entry(user_id, id)
            .await?
            .ok_or_else(|| OrchestratorError::NotFound(format!("entry {}", id)))
    }

    pub async fn list_entries(
        &self,
        user_id: &str,
        filter: &EntryFilter,
    ) -> Result<Vec<Entry>, OrchestratorError> {
        require_user(user_id)?;
        Ok(self.entries.list_entries(user_id, filter).await?)
    }

    pub async fn update_entry(
        &self,
        user_id: &str,
        id: Uuid,
        update: EntryUpdate,
    ) -> Result<Entry, OrchestratorError> {
        if update.is_empty() {
            return Err(OrchestratorError::Validation("no fields to update".to_string()));
        }
        update.validate()?;
        self.entries
            .update_entry(user_id, id, update)
            .await?
            .ok_or_else(|| OrchestratorError::NotFound(format!("entry {}", id)))
    }

    pub async fn delete_entry(&self, user_id: &str, id: Uuid) -> Result<(), OrchestratorError> {
        if self.entries.soft_delete_entry(user_id, id).await? {
            Ok(())
        } else {
            Err(OrchestratorError::NotFound(format!("entry {}", id)))
        }
    }

    // ---- context ----

    pub async fn assemble_context(
        &self,
        user_id: &str,
        current_entry: Option<&str>,
    ) -> Result<ContextPayload, OrchestratorError> {
        self.context_assembler.assemble(user_id, current_entry).await
    }

    pub fn build_prompt(&self, payload: &ContextPayload, session: &SessionState) -> String {
        prompt_builder::build_prompt(payload, session)
    }

    // ---- summaries ----

    pub async fn get_or_generate_summary(
        &self,
        user_id: &str,
        period_start: NaiveDate,
        period_type: PeriodType,
    ) -> Result<SummaryOutcome, OrchestratorError> {
        require_user(user_id)?;
        self.summary_generator
            .get_or_generate(user_id, period_start, period_type)
            .await
    }

    pub async fn backfill_summaries(
        &self,
        user_id: &str,
        today: NaiveDate,
    ) -> Result<Vec<SummaryOutcome>, OrchestratorError> {
        require_user(user_id)?;
        self.summary_generator.backfill(user_id, today).await
    }

    // ---- insights ----

    pub async fn compute_insights(&self, user_id: &str) -> Result<Insights, OrchestratorError> {
        require_user(user_id)?;
        let now = Utc::now();

        let filter = EntryFilter {
            since: Some(now - ChronoDuration::days(INSIGHTS_WINDOW_DAYS)),
            limit: INSIGHTS_ENTRY_LIMIT,
            ..Default::default()
        };
        let window = self.entries.list_entries(user_id, &filter).await?;
        let dates = self.entries.entry_dates(user_id, STREAK_DATE_LIMIT).await?;

        let today = now.date_naive();
        let mut result = insights::compute_insights(&window, today);
        result.streak = insights::streak(&dates, today);
        Ok(result)
    }

    // ---- conversations ----

    pub async fn send_message(
        &self,
        user_id: &str,
        request: SendMessage,
    ) -> Result<ChatReply, OrchestratorError> {
        require_user(user_id)?;
        self.companion.send_message(user_id, request).await
    }

    pub async fn list_conversations(
        &self,
        user_id: &str,
        limit: u64,
        offset: u64,
    ) -> Result<Vec<Conversation>, OrchestratorError> {
        self.companion.list_conversations(user_id, limit, offset).await
    }

    pub async fn get_conversation(
        &self,
        user_id: &str,
        id: Uuid,
    ) -> Result<ConversationThread, OrchestratorError> {
        self.companion.get_conversation(user_id, id).await
    }

    pub async fn delete_conversation(&self, user_id: &str, id: Uuid) -> Result<(), OrchestratorError> {
        self.companion.delete_conversation(user_id, id).await
    }
}

fn require_user(user_id: &str) -> Result<(), OrchestratorError> {
    if user_id.trim().is_empty() {
        return Err(OrchestratorError::Validation(
            "user id must not be empty".to_string(),
        ));
    }
    Ok(())
}

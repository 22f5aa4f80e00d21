//! Journal Companion - journaling service with a history-aware AI companion

pub mod api;
pub mod config;
pub mod models;
pub mod orchestrator;
pub mod services;
pub mod storage;

// Re-export main types for convenience
pub use crate::api::dto::*;
pub use crate::api::error::AppError;
pub use crate::api::routes::{create_router, AppState};
pub use crate::config::Config;
pub use crate::models::internal::{
    Conversation, Entry, EntryFilter, EntryUpdate, Message, Mood, NewEntry, PeriodType,
    SessionType, Summary,
};
pub use crate::orchestrator::{JournalOrchestrator, OrchestratorError, OrchestratorSettings};
pub use crate::services::completion_client::{CompletionService, OllamaCompletionClient};
pub use crate::storage::db::init_db;
pub use crate::storage::repository::SeaOrmJournalRepository;

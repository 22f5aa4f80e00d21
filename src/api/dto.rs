use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::models::internal::{EntryFilter, EntryUpdate, Mood, NewEntry, SessionType};
use crate::orchestrator::context_assembly::ContextPayload;

// ==================== REQUEST DTOs ====================

#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct CreateEntryRequest {
    pub content: String,
    pub mood: Option<Mood>,
    pub energy: Option<u8>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub created_at: Option<DateTime<Utc>>,
    /// Ask the companion for a reflection and themes right away.
    #[serde(default)]
    pub generate_reflection: bool,
}

impl CreateEntryRequest {
    pub fn into_parts(self) -> (NewEntry, bool) {
        (
            NewEntry {
                content: self.content,
                mood: self.mood,
                energy: self.energy,
                tags: self.tags,
                created_at: self.created_at,
            },
            self.generate_reflection,
        )
    }
}

/// Only these fields are editable. Anything else in the body is ignored.
#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct UpdateEntryRequest {
    pub content: Option<String>,
    pub mood: Option<Mood>,
    pub energy: Option<u8>,
    pub tags: Option<Vec<String>>,
}

impl From<UpdateEntryRequest> for EntryUpdate {
    fn from(req: UpdateEntryRequest) -> Self {
        EntryUpdate {
            content: req.content,
            mood: req.mood,
            energy: req.energy,
            tags: req.tags,
        }
    }
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct ListEntriesParams {
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
    pub mood: Option<Mood>,
    pub tag: Option<String>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

impl From<ListEntriesParams> for EntryFilter {
    fn from(params: ListEntriesParams) -> Self {
        let defaults = EntryFilter::default();
        EntryFilter {
            since: params.since,
            until: params.until,
            mood: params.mood,
            tag: params.tag,
            limit: params.limit.unwrap_or(defaults.limit).clamp(1, 200),
            offset: params.offset.unwrap_or(0),
        }
    }
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct PaginationParams {
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct ContextParams {
    /// Entry text the conversation is focused on.
    pub current_entry: Option<String>,
    pub session_type: Option<SessionType>,
}

#[derive(Debug, Default, Deserialize, Serialize, ToSchema)]
pub struct BackfillRequest {
    /// Reference day; defaults to today (UTC).
    pub today: Option<NaiveDate>,
}

// ==================== RESPONSE DTOs ====================

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ContextResponse {
    pub context: ContextPayload,
    pub prompt: String,
    pub estimated_tokens: usize,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    /// Machine-readable error kind, e.g. `validation` or `completion_timeout`.
    pub kind: String,
    pub code: u16,
}

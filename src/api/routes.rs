use axum::{
    extract::{FromRequestParts, Path, Query, State},
    http::{request::Parts, StatusCode},
    routing::{get, post},
    Json, Router,
};
use chrono::{NaiveDate, Utc};
use std::sync::Arc;
use tokio::sync::RwLock;
use utoipa::OpenApi;
use uuid::Uuid;

use crate::api::{dto::*, error::AppError};
use crate::config::Config;
use crate::models::internal::{Conversation, Entry, EntryFilter, PeriodType, Summary};
use crate::orchestrator::companion::{ChatReply, ConversationThread, SendMessage};
use crate::orchestrator::context_assembly::ContextPayload;
use crate::orchestrator::insights::Insights;
use crate::orchestrator::prompt_builder::{estimate_tokens, SessionState};
use crate::orchestrator::summarizer::SummaryOutcome;
use crate::orchestrator::JournalOrchestrator;

pub const USER_HEADER: &str = "x-user-id";

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<RwLock<Config>>,
    pub orchestrator: Arc<JournalOrchestrator>,
}

/// Caller identity from `x-user-id`, falling back to the configured default.
pub struct UserId(pub String);

impl FromRequestParts<AppState> for UserId {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        match parts.headers.get(USER_HEADER) {
            Some(value) => {
                let id = value
                    .to_str()
                    .map_err(|_| AppError::BadRequest(format!("{} must be visible ASCII", USER_HEADER)))?
                    .trim();
                if id.is_empty() {
                    return Err(AppError::BadRequest(format!("{} must not be empty", USER_HEADER)));
                }
                Ok(UserId(id.to_string()))
            }
            None => Ok(UserId(state.config.read().await.default_user_id.clone())),
        }
    }
}

// ==================== ENTRIES ====================

#[utoipa::path(
    post,
    path = "/api/v1/entries",
    request_body = CreateEntryRequest,
    responses(
        (status = 201, description = "Entry created", body = Entry),
        (status = 400, description = "Invalid entry", body = ErrorResponse)
    )
)]
pub async fn create_entry(
    State(state): State<AppState>,
    UserId(user_id): UserId,
    Json(req): Json<CreateEntryRequest>,
) -> Result<(StatusCode, Json<Entry>), AppError> {
    let (new_entry, generate_reflection) = req.into_parts();
    let entry = state
        .orchestrator
        .create_entry(&user_id, new_entry, generate_reflection)
        .await?;
    Ok((StatusCode::CREATED, Json(entry)))
}

#[utoipa::path(
    get,
    path = "/api/v1/entries",
    params(ListEntriesParams),
    responses((status = 200, description = "Entries, newest first", body = Vec<Entry>))
)]
pub async fn list_entries(
    State(state): State<AppState>,
    UserId(user_id): UserId,
    Query(params): Query<ListEntriesParams>,
) -> Result<Json<Vec<Entry>>, AppError> {
    let entries = state
        .orchestrator
        .list_entries(&user_id, &EntryFilter::from(params))
        .await?;
    Ok(Json(entries))
}

#[utoipa::path(
    get,
    path = "/api/v1/entries/{id}",
    params(("id" = Uuid, Path, description = "Entry id")),
    responses(
        (status = 200, description = "Entry", body = Entry),
        (status = 404, description = "Not found", body = ErrorResponse)
    )
)]
pub async fn get_entry(
    State(state): State<AppState>,
    UserId(user_id): UserId,
    Path(id): Path<Uuid>,
) -> Result<Json<Entry>, AppError> {
    Ok(Json(state.orchestrator.get_entry(&user_id, id).await?))
}

#[utoipa::path(
    put,
    path = "/api/v1/entries/{id}",
    params(("id" = Uuid, Path, description = "Entry id")),
    request_body = UpdateEntryRequest,
    responses(
        (status = 200, description = "Updated entry", body = Entry),
        (status = 404, description = "Not found", body = ErrorResponse)
    )
)]
pub async fn update_entry(
    State(state): State<AppState>,
    UserId(user_id): UserId,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateEntryRequest>,
) -> Result<Json<Entry>, AppError> {
    let entry = state
        .orchestrator
        .update_entry(&user_id, id, req.into())
        .await?;
    Ok(Json(entry))
}

#[utoipa::path(
    delete,
    path = "/api/v1/entries/{id}",
    params(("id" = Uuid, Path, description = "Entry id")),
    responses(
        (status = 204, description = "Entry deleted"),
        (status = 404, description = "Not found", body = ErrorResponse)
    )
)]
pub async fn delete_entry(
    State(state): State<AppState>,
    UserId(user_id): UserId,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    state.orchestrator.delete_entry(&user_id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    post,
    path = "/api/v1/entries/{id}/reflection",
    params(("id" = Uuid, Path, description = "Entry id")),
    responses(
        (status = 200, description = "Entry with fresh reflection and themes", body = Entry),
        (status = 502, description = "Completion failed", body = ErrorResponse),
        (status = 504, description = "Completion timed out", body = ErrorResponse)
    )
)]
pub async fn reflect_on_entry(
    State(state): State<AppState>,
    UserId(user_id): UserId,
    Path(id): Path<Uuid>,
) -> Result<Json<Entry>, AppError> {
    Ok(Json(state.orchestrator.reflect_on_entry(&user_id, id).await?))
}

// ==================== INSIGHTS & CONTEXT ====================

#[utoipa::path(
    get,
    path = "/api/v1/insights",
    responses((status = 200, description = "Last 30 days of mood, tags and themes", body = Insights))
)]
pub async fn insights(
    State(state): State<AppState>,
    UserId(user_id): UserId,
) -> Result<Json<Insights>, AppError> {
    Ok(Json(state.orchestrator.compute_insights(&user_id).await?))
}

#[utoipa::path(
    get,
    path = "/api/v1/context",
    params(ContextParams),
    responses(
        (status = 200, description = "Assembled context and rendered prompt", body = ContextResponse),
        (status = 503, description = "Context unavailable", body = ErrorResponse)
    )
)]
pub async fn context(
    State(state): State<AppState>,
    UserId(user_id): UserId,
    Query(params): Query<ContextParams>,
) -> Result<Json<ContextResponse>, AppError> {
    let current_entry = params.current_entry.filter(|c| !c.trim().is_empty());
    let payload: ContextPayload = state
        .orchestrator
        .assemble_context(&user_id, current_entry.as_deref())
        .await?;

    let session = SessionState {
        session_type: params.session_type.unwrap_or_default(),
        current_entry,
    };
    let prompt = state.orchestrator.build_prompt(&payload, &session);
    let estimated_tokens = estimate_tokens(&prompt);

    Ok(Json(ContextResponse {
        context: payload,
        prompt,
        estimated_tokens,
    }))
}

// ==================== CONVERSATIONS ====================

#[utoipa::path(
    post,
    path = "/api/v1/chat",
    request_body = SendMessage,
    responses(
        (status = 200, description = "Companion reply", body = ChatReply),
        (status = 502, description = "Completion failed", body = ErrorResponse),
        (status = 504, description = "Completion timed out", body = ErrorResponse)
    )
)]
pub async fn chat(
    State(state): State<AppState>,
    UserId(user_id): UserId,
    Json(req): Json<SendMessage>,
) -> Result<Json<ChatReply>, AppError> {
    Ok(Json(state.orchestrator.send_message(&user_id, req).await?))
}

#[utoipa::path(
    get,
    path = "/api/v1/conversations",
    params(PaginationParams),
    responses((status = 200, description = "Conversations, most recently active first", body = Vec<Conversation>))
)]
pub async fn list_conversations(
    State(state): State<AppState>,
    UserId(user_id): UserId,
    Query(params): Query<PaginationParams>,
) -> Result<Json<Vec<Conversation>>, AppError> {
    let limit = params.limit.unwrap_or(50).clamp(1, 200);
    let offset = params.offset.unwrap_or(0);
    Ok(Json(
        state
            .orchestrator
            .list_conversations(&user_id, limit, offset)
            .await?,
    ))
}

#[utoipa::path(
    get,
    path = "/api/v1/conversations/{id}",
    params(("id" = Uuid, Path, description = "Conversation id")),
    responses(
        (status = 200, description = "Conversation with its messages", body = ConversationThread),
        (status = 404, description = "Not found", body = ErrorResponse)
    )
)]
pub async fn get_conversation(
    State(state): State<AppState>,
    UserId(user_id): UserId,
    Path(id): Path<Uuid>,
) -> Result<Json<ConversationThread>, AppError> {
    Ok(Json(state.orchestrator.get_conversation(&user_id, id).await?))
}

#[utoipa::path(
    delete,
    path = "/api/v1/conversations/{id}",
    params(("id" = Uuid, Path, description = "Conversation id")),
    responses(
        (status = 204, description = "Conversation deleted"),
        (status = 404, description = "Not found", body = ErrorResponse)
    )
)]
pub async fn delete_conversation(
    State(state): State<AppState>,
    UserId(user_id): UserId,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    state.orchestrator.delete_conversation(&user_id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ==================== SUMMARIES ====================

#[utoipa::path(
    get,
    path = "/api/v1/summaries/{period_type}/{period_start}",
    params(
        ("period_type" = PeriodType, Path, description = "weekly or monthly"),
        ("period_start" = NaiveDate, Path, description = "First day of the period, YYYY-MM-DD")
    ),
    responses(
        (status = 200, description = "Stored or freshly generated summary", body = SummaryOutcome),
        (status = 404, description = "No entries in the period", body = ErrorResponse)
    )
)]
pub async fn get_summary(
    State(state): State<AppState>,
    UserId(user_id): UserId,
    Path((period_type, period_start)): Path<(String, String)>,
) -> Result<Json<SummaryOutcome>, AppError> {
    let period_type: PeriodType = period_type.parse().map_err(AppError::BadRequest)?;
    let period_start = NaiveDate::parse_from_str(&period_start, "%Y-%m-%d")
        .map_err(|e| AppError::BadRequest(format!("period_start: {}", e)))?;

    let outcome = state
        .orchestrator
        .get_or_generate_summary(&user_id, period_start, period_type)
        .await?;
    Ok(Json(outcome))
}

#[utoipa::path(
    post,
    path = "/api/v1/summaries/backfill",
    request_body = BackfillRequest,
    responses((status = 200, description = "Summaries for the previous week and month", body = Vec<Summary>))
)]
pub async fn backfill_summaries(
    State(state): State<AppState>,
    UserId(user_id): UserId,
    body: Option<Json<BackfillRequest>>,
) -> Result<Json<Vec<Summary>>, AppError> {
    let today = body
        .and_then(|Json(req)| req.today)
        .unwrap_or_else(|| Utc::now().date_naive());
    let outcomes = state
        .orchestrator
        .backfill_summaries(&user_id, today)
        .await?;
    Ok(Json(outcomes.into_iter().map(|o| o.summary).collect()))
}

// ==================== SYSTEM ====================

#[utoipa::path(
    get,
    path = "/health",
    responses((status = 200, description = "Service is up", body = HealthResponse))
)]
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

pub async fn openapi() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

#[derive(OpenApi)]
#[openapi(
    paths(
        create_entry,
        list_entries,
        get_entry,
        update_entry,
        delete_entry,
        reflect_on_entry,
        insights,
        context,
        chat,
        list_conversations,
        get_conversation,
        delete_conversation,
        get_summary,
        backfill_summaries,
        health
    ),
    components(schemas(ErrorResponse, CreateEntryRequest, UpdateEntryRequest, BackfillRequest))
)]
pub struct ApiDoc;

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/api/v1/entries", post(create_entry).get(list_entries))
        .route(
            "/api/v1/entries/{id}",
            get(get_entry).put(update_entry).delete(delete_entry),
        )
        .route("/api/v1/entries/{id}/reflection", post(reflect_on_entry))
        .route("/api/v1/insights", get(insights))
        .route("/api/v1/context", get(context))
        .route("/api/v1/chat", post(chat))
        .route("/api/v1/conversations", get(list_conversations))
        .route(
            "/api/v1/conversations/{id}",
            get(get_conversation).delete(delete_conversation),
        )
        .route(
            "/api/v1/summaries/{period_type}/{period_start}",
            get(get_summary),
        )
        .route("/api/v1/summaries/backfill", post(backfill_summaries))
        .route("/health", get(health))
        .route("/api-docs/openapi.json", get(openapi))
        .with_state(state)
}

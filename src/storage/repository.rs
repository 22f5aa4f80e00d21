use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use sea_orm::sea_query::{Expr, OnConflict};
use sea_orm::{
    prelude::*, ConnectionTrait, DbBackend, Order, QueryOrder, QuerySelect, Set, Statement,
};
use uuid::Uuid;

use crate::models::internal::{
    normalize_tags, Conversation, Entry, EntryFilter, EntryUpdate, Message, NewConversation,
    NewEntry, PeriodType, Role, Summary,
};
use crate::storage::entities::{conversations, entries, messages, summaries};

/// Fixed-width UTC timestamp; lexical order equals chronological order.
const TS_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6fZ";
const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("Database error: {0}")]
    DbError(#[from] sea_orm::DbErr),
    #[error("Entity not found: {0}")]
    NotFound(String),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Corrupt row: {0}")]
    Corrupt(String),
}

// ============================================
// TRAIT DEFINITIONS
// ============================================

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EntryStore: Send + Sync {
    /// Visible entries matching `filter`, newest first.
    async fn list_entries(
        &self,
        user_id: &str,
        filter: &EntryFilter,
    ) -> Result<Vec<Entry>, RepositoryError>;

    async fn get_entry(&self, user_id: &str, id: Uuid) -> Result<Option<Entry>, RepositoryError>;

    async fn create_entry(&self, user_id: &str, entry: NewEntry) -> Result<Entry, RepositoryError>;

    async fn update_entry(
        &self,
        user_id: &str,
        id: Uuid,
        update: EntryUpdate,
    ) -> Result<Option<Entry>, RepositoryError>;

    /// Writes generated annotations; never touches user-editable fields.
    async fn annotate_entry(
        &self,
        user_id: &str,
        id: Uuid,
        reflection: Option<String>,
        themes: Vec<String>,
    ) -> Result<Option<Entry>, RepositoryError>;

    async fn soft_delete_entry(&self, user_id: &str, id: Uuid) -> Result<bool, RepositoryError>;

    /// Distinct UTC calendar days carrying at least one visible entry, newest first.
    async fn entry_dates(&self, user_id: &str, limit: u64)
        -> Result<Vec<NaiveDate>, RepositoryError>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SummaryStore: Send + Sync {
    async fn get_summary(
        &self,
        user_id: &str,
        period_start: NaiveDate,
        period_type: PeriodType,
    ) -> Result<Option<Summary>, RepositoryError>;

    async fn latest_summary(
        &self,
        user_id: &str,
        period_type: PeriodType,
    ) -> Result<Option<Summary>, RepositoryError>;

    /// Atomic insert-or-replace keyed by (user, period_start, period_type).
    async fn upsert_summary(&self, summary: &Summary) -> Result<(), RepositoryError>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ConversationStore: Send + Sync {
    async fn create_conversation(
        &self,
        user_id: &str,
        conv: NewConversation,
    ) -> Result<Conversation, RepositoryError>;

    async fn get_conversation(
        &self,
        user_id: &str,
        id: Uuid,
    ) -> Result<Option<Conversation>, RepositoryError>;

    async fn list_conversations(
        &self,
        user_id: &str,
        limit: u64,
        offset: u64,
    ) -> Result<Vec<Conversation>, RepositoryError>;

    async fn soft_delete_conversation(&self, user_id: &str, id: Uuid)
        -> Result<bool, RepositoryError>;

    async fn append_message(
        &self,
        conversation_id: Uuid,
        role: Role,
        content: &str,
    ) -> Result<Message, RepositoryError>;

    /// Messages in canonical (creation) order.
    async fn list_messages(&self, conversation_id: Uuid) -> Result<Vec<Message>, RepositoryError>;
}

// ============================================
// IMPLEMENTATION STRUCT
// ============================================

#[derive(Clone)]
pub struct SeaOrmJournalRepository {
    db: DatabaseConnection,
}

impl SeaOrmJournalRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    pub fn db(&self) -> &DatabaseConnection {
        &self.db
    }

    async fn find_visible_entry(
        &self,
        user_id: &str,
        id: Uuid,
    ) -> Result<Option<entries::Model>, RepositoryError> {
        let model = entries::Entity::find_by_id(id.to_string())
            .filter(entries::Column::UserId.eq(user_id))
            .filter(entries::Column::DeletedAt.is_null())
            .one(&self.db)
            .await?;
        Ok(model)
    }

    async fn find_visible_conversation(
        &self,
        user_id: &str,
        id: Uuid,
    ) -> Result<Option<conversations::Model>, RepositoryError> {
        let model = conversations::Entity::find_by_id(id.to_string())
            .filter(conversations::Column::UserId.eq(user_id))
            .filter(conversations::Column::DeletedAt.is_null())
            .one(&self.db)
            .await?;
        Ok(model)
    }
}

// ============================================
// TRAIT IMPLEMENTATIONS
// ============================================

#[async_trait]
impl EntryStore for SeaOrmJournalRepository {
    async fn list_entries(
        &self,
        user_id: &str,
        filter: &EntryFilter,
    ) -> Result<Vec<Entry>, RepositoryError> {
        let mut query = entries::Entity::find()
            .filter(entries::Column::UserId.eq(user_id))
            .filter(entries::Column::DeletedAt.is_null());

        if let Some(since) = filter.since {
            query = query.filter(entries::Column::CreatedAt.gte(format_ts(since)));
        }
        if let Some(until) = filter.until {
            query = query.filter(entries::Column::CreatedAt.lte(format_ts(until)));
        }
        if let Some(mood) = filter.mood {
            query = query.filter(entries::Column::Mood.eq(mood.as_str()));
        }
        if let Some(tag) = &filter.tag {
            query = query.filter(Expr::cust_with_values(
                "EXISTS (SELECT 1 FROM json_each(entries.tags) WHERE json_each.value = ?)",
                [tag.clone()],
            ));
        }

        let models = query
            .order_by_desc(entries::Column::CreatedAt)
            .order_by_desc(entries::Column::Id)
            .limit(filter.limit)
            .offset(filter.offset)
            .all(&self.db)
            .await?;

        models.into_iter().map(Entry::try_from).collect()
    }

    async fn get_entry(&self, user_id: &str, id: Uuid) -> Result<Option<Entry>, RepositoryError> {
        self.find_visible_entry(user_id, id)
            .await?
            .map(Entry::try_from)
            .transpose()
    }

    async fn create_entry(&self, user_id: &str, entry: NewEntry) -> Result<Entry, RepositoryError> {
        if entry.content.trim().is_empty() {
            return Err(RepositoryError::InvalidInput(
                "entry content must not be empty".to_string(),
            ));
        }

        let now = Utc::now();
        let created_at = entry.created_at.unwrap_or(now);
        let id = Uuid::new_v4();

        let active_model = entries::ActiveModel {
            id: Set(id.to_string()),
            user_id: Set(user_id.to_string()),
            content: Set(entry.content),
            mood: Set(entry.mood.map(|m| m.as_str().to_string())),
            energy: Set(entry.energy.map(i32::from)),
            tags: Set(encode_list(&normalize_tags(&entry.tags))?),
            reflection: Set(None),
            themes: Set("[]".to_string()),
            created_at: Set(format_ts(created_at)),
            updated_at: Set(format_ts(now)),
            deleted_at: Set(None),
        };

        let model = active_model.insert(&self.db).await?;
        tracing::debug!("Created entry: {}", id);

        Entry::try_from(model)
    }

    async fn update_entry(
        &self,
        user_id: &str,
        id: Uuid,
        update: EntryUpdate,
    ) -> Result<Option<Entry>, RepositoryError> {
        let Some(model) = self.find_visible_entry(user_id, id).await? else {
            return Ok(None);
        };

        let mut active_model: entries::ActiveModel = model.into();
        if let Some(content) = update.content {
            if content.trim().is_empty() {
                return Err(RepositoryError::InvalidInput(
                    "entry content must not be empty".to_string(),
                ));
            }
            active_model.content = Set(content);
        }
        if let Some(mood) = update.mood {
            active_model.mood = Set(Some(mood.as_str().to_string()));
        }
        if let Some(energy) = update.energy {
            active_model.energy = Set(Some(i32::from(energy)));
        }
        if let Some(tags) = update.tags {
            active_model.tags = Set(encode_list(&normalize_tags(&tags))?);
        }
        active_model.updated_at = Set(format_ts(Utc::now()));

        let model = active_model.update(&self.db).await?;
        Entry::try_from(model).map(Some)
    }

    async fn annotate_entry(
        &self,
        user_id: &str,
        id: Uuid,
        reflection: Option<String>,
        themes: Vec<String>,
    ) -> Result<Option<Entry>, RepositoryError> {
        let Some(model) = self.find_visible_entry(user_id, id).await? else {
            return Ok(None);
        };

        let mut active_model: entries::ActiveModel = model.into();
        active_model.reflection = Set(reflection);
        active_model.themes = Set(encode_list(&themes)?);

        let model = active_model.update(&self.db).await?;
        Entry::try_from(model).map(Some)
    }

    async fn soft_delete_entry(&self, user_id: &str, id: Uuid) -> Result<bool, RepositoryError> {
        let result = entries::Entity::update_many()
            .col_expr(entries::Column::DeletedAt, Expr::value(format_ts(Utc::now())))
            .filter(entries::Column::Id.eq(id.to_string()))
            .filter(entries::Column::UserId.eq(user_id))
            .filter(entries::Column::DeletedAt.is_null())
            .exec(&self.db)
            .await?;

        Ok(result.rows_affected > 0)
    }

    async fn entry_dates(
        &self,
        user_id: &str,
        limit: u64,
    ) -> Result<Vec<NaiveDate>, RepositoryError> {
        let rows = self
            .db
            .query_all(Statement::from_sql_and_values(
                DbBackend::Sqlite,
                r#"
                SELECT DISTINCT substr(created_at, 1, 10) AS day
                FROM entries
                WHERE user_id = ? AND deleted_at IS NULL
                ORDER BY day DESC
                LIMIT ?
                "#,
                [user_id.into(), (limit as i64).into()],
            ))
            .await?;

        rows.iter()
            .map(|row| {
                let day: String = row.try_get("", "day")?;
                parse_date(&day)
            })
            .collect()
    }
}

#[async_trait]
impl SummaryStore for SeaOrmJournalRepository {
    async fn get_summary(
        &self,
        user_id: &str,
        period_start: NaiveDate,
        period_type: PeriodType,
    ) -> Result<Option<Summary>, RepositoryError> {
        summaries::Entity::find()
            .filter(summaries::Column::UserId.eq(user_id))
            .filter(summaries::Column::PeriodStart.eq(format_date(period_start)))
            .filter(summaries::Column::PeriodType.eq(period_type.as_str()))
            .one(&self.db)
            .await?
            .map(Summary::try_from)
            .transpose()
    }

    async fn latest_summary(
        &self,
        user_id: &str,
        period_type: PeriodType,
    ) -> Result<Option<Summary>, RepositoryError> {
        summaries::Entity::find()
            .filter(summaries::Column::UserId.eq(user_id))
            .filter(summaries::Column::PeriodType.eq(period_type.as_str()))
            .order_by_desc(summaries::Column::PeriodStart)
            .one(&self.db)
            .await?
            .map(Summary::try_from)
            .transpose()
    }

    async fn upsert_summary(&self, summary: &Summary) -> Result<(), RepositoryError> {
        let now = format_ts(Utc::now());
        let active_model = summaries::ActiveModel {
            id: Set(Uuid::new_v4().to_string()),
            user_id: Set(summary.user_id.clone()),
            period_start: Set(format_date(summary.period_start)),
            period_end: Set(format_date(summary.period_end)),
            period_type: Set(summary.period_type.as_str().to_string()),
            summary: Set(summary.summary.clone()),
            entry_count: Set(summary.entry_count as i32),
            created_at: Set(now.clone()),
            updated_at: Set(now),
        };

        summaries::Entity::insert(active_model)
            .on_conflict(
                OnConflict::columns([
                    summaries::Column::UserId,
                    summaries::Column::PeriodStart,
                    summaries::Column::PeriodType,
                ])
                .update_columns([
                    summaries::Column::PeriodEnd,
                    summaries::Column::Summary,
                    summaries::Column::EntryCount,
                    summaries::Column::UpdatedAt,
                ])
                .to_owned(),
            )
            .exec_without_returning(&self.db)
            .await?;

        tracing::debug!(
            "Upserted {} summary for {} starting {}",
            summary.period_type.as_str(),
            summary.user_id,
            summary.period_start
        );
        Ok(())
    }
}

#[async_trait]
impl ConversationStore for SeaOrmJournalRepository {
    async fn create_conversation(
        &self,
        user_id: &str,
        conv: NewConversation,
    ) -> Result<Conversation, RepositoryError> {
        let id = Uuid::new_v4();
        let now = format_ts(Utc::now());

        let active_model = conversations::ActiveModel {
            id: Set(id.to_string()),
            user_id: Set(user_id.to_string()),
            entry_id: Set(conv.entry_id.map(|e| e.to_string())),
            session_type: Set(conv.session_type.as_str().to_string()),
            created_at: Set(now.clone()),
            updated_at: Set(now),
            deleted_at: Set(None),
        };

        let model = active_model.insert(&self.db).await?;
        tracing::info!("Created conversation: {}", id);

        Conversation::try_from(model)
    }

    async fn get_conversation(
        &self,
        user_id: &str,
        id: Uuid,
    ) -> Result<Option<Conversation>, RepositoryError> {
        self.find_visible_conversation(user_id, id)
            .await?
            .map(Conversation::try_from)
            .transpose()
    }

    async fn list_conversations(
        &self,
        user_id: &str,
        limit: u64,
        offset: u64,
    ) -> Result<Vec<Conversation>, RepositoryError> {
        let models = conversations::Entity::find()
            .filter(conversations::Column::UserId.eq(user_id))
            .filter(conversations::Column::DeletedAt.is_null())
            .order_by_desc(conversations::Column::UpdatedAt)
            .limit(limit)
            .offset(offset)
            .all(&self.db)
            .await?;

        models.into_iter().map(Conversation::try_from).collect()
    }

    async fn soft_delete_conversation(
        &self,
        user_id: &str,
        id: Uuid,
    ) -> Result<bool, RepositoryError> {
        let result = conversations::Entity::update_many()
            .col_expr(
                conversations::Column::DeletedAt,
                Expr::value(format_ts(Utc::now())),
            )
            .filter(conversations::Column::Id.eq(id.to_string()))
            .filter(conversations::Column::UserId.eq(user_id))
            .filter(conversations::Column::DeletedAt.is_null())
            .exec(&self.db)
            .await?;

        Ok(result.rows_affected > 0)
    }

    async fn append_message(
        &self,
        conversation_id: Uuid,
        role: Role,
        content: &str,
    ) -> Result<Message, RepositoryError> {
        let conversation = conversations::Entity::find_by_id(conversation_id.to_string())
            .filter(conversations::Column::DeletedAt.is_null())
            .one(&self.db)
            .await?
            .ok_or_else(|| {
                RepositoryError::NotFound(format!("Conversation {} not found", conversation_id))
            })?;

        let id = Uuid::new_v4();
        let now = format_ts(Utc::now());

        let message = messages::ActiveModel {
            id: Set(id.to_string()),
            conversation_id: Set(conversation_id.to_string()),
            role: Set(role.as_str().to_string()),
            content: Set(content.to_string()),
            created_at: Set(now.clone()),
        };
        let model = message.insert(&self.db).await?;

        let mut active_conversation: conversations::ActiveModel = conversation.into();
        active_conversation.updated_at = Set(now);
        active_conversation.update(&self.db).await?;

        tracing::debug!("Stored {} message: {}", role.as_str(), id);
        Message::try_from(model)
    }

    async fn list_messages(&self, conversation_id: Uuid) -> Result<Vec<Message>, RepositoryError> {
        let models = messages::Entity::find()
            .filter(messages::Column::ConversationId.eq(conversation_id.to_string()))
            .order_by_asc(messages::Column::CreatedAt)
            // Insertion order breaks same-microsecond ties.
            .order_by(Expr::cust("rowid"), Order::Asc)
            .all(&self.db)
            .await?;

        models.into_iter().map(Message::try_from).collect()
    }
}

// ============================================
// Conversions
// ============================================

pub fn format_ts(ts: DateTime<Utc>) -> String {
    ts.format(TS_FORMAT).to_string()
}

fn parse_ts(value: &str) -> Result<DateTime<Utc>, RepositoryError> {
    NaiveDateTime::parse_from_str(value, TS_FORMAT)
        .map(|naive| naive.and_utc())
        .map_err(|e| RepositoryError::Corrupt(format!("bad timestamp {:?}: {}", value, e)))
}

fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

fn parse_date(value: &str) -> Result<NaiveDate, RepositoryError> {
    NaiveDate::parse_from_str(value, DATE_FORMAT)
        .map_err(|e| RepositoryError::Corrupt(format!("bad date {:?}: {}", value, e)))
}

fn parse_uuid(value: &str) -> Result<Uuid, RepositoryError> {
    Uuid::parse_str(value)
        .map_err(|e| RepositoryError::Corrupt(format!("bad id {:?}: {}", value, e)))
}

fn encode_list(values: &[String]) -> Result<String, RepositoryError> {
    serde_json::to_string(values).map_err(|e| RepositoryError::InvalidInput(e.to_string()))
}

fn decode_list(value: &str) -> Result<Vec<String>, RepositoryError> {
    serde_json::from_str(value)
        .map_err(|e| RepositoryError::Corrupt(format!("bad list {:?}: {}", value, e)))
}

impl TryFrom<entries::Model> for Entry {
    type Error = RepositoryError;

    fn try_from(model: entries::Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: parse_uuid(&model.id)?,
            user_id: model.user_id,
            content: model.content,
            created_at: parse_ts(&model.created_at)?,
            updated_at: parse_ts(&model.updated_at)?,
            mood: model
                .mood
                .as_deref()
                .map(str::parse)
                .transpose()
                .map_err(RepositoryError::Corrupt)?,
            energy: model
                .energy
                .map(u8::try_from)
                .transpose()
                .map_err(|e| RepositoryError::Corrupt(e.to_string()))?,
            tags: decode_list(&model.tags)?,
            reflection: model.reflection,
            themes: decode_list(&model.themes)?,
        })
    }
}

impl TryFrom<conversations::Model> for Conversation {
    type Error = RepositoryError;

    fn try_from(model: conversations::Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: parse_uuid(&model.id)?,
            user_id: model.user_id,
            entry_id: model.entry_id.as_deref().map(parse_uuid).transpose()?,
            session_type: model
                .session_type
                .parse()
                .map_err(RepositoryError::Corrupt)?,
            created_at: parse_ts(&model.created_at)?,
            updated_at: parse_ts(&model.updated_at)?,
        })
    }
}

impl TryFrom<messages::Model> for Message {
    type Error = RepositoryError;

    fn try_from(model: messages::Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: parse_uuid(&model.id)?,
            conversation_id: parse_uuid(&model.conversation_id)?,
            role: model.role.parse().map_err(RepositoryError::Corrupt)?,
            content: model.content,
            created_at: parse_ts(&model.created_at)?,
        })
    }
}

impl TryFrom<summaries::Model> for Summary {
    type Error = RepositoryError;

    fn try_from(model: summaries::Model) -> Result<Self, Self::Error> {
        Ok(Self {
            user_id: model.user_id,
            period_start: parse_date(&model.period_start)?,
            period_end: parse_date(&model.period_end)?,
            period_type: model
                .period_type
                .parse()
                .map_err(RepositoryError::Corrupt)?,
            summary: model.summary,
            entry_count: u32::try_from(model.entry_count)
                .map_err(|e| RepositoryError::Corrupt(e.to_string()))?,
        })
    }
}

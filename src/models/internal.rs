use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::{Validate, ValidationError};

pub const MAX_TAGS: usize = 20;
pub const MAX_TAG_LEN: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Mood {
    Good,
    Okay,
    Rough,
}

impl Mood {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mood::Good => "good",
            Mood::Okay => "okay",
            Mood::Rough => "rough",
        }
    }

    /// Numeric weight used for trend averaging.
    pub fn weight(&self) -> f64 {
        match self {
            Mood::Good => 1.0,
            Mood::Okay => 0.0,
            Mood::Rough => -1.0,
        }
    }
}

impl fmt::Display for Mood {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mood {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "good" => Ok(Mood::Good),
            "okay" => Ok(Mood::Okay),
            "rough" => Ok(Mood::Rough),
            other => Err(format!("unknown mood: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SessionType {
    #[default]
    Freeform,
    EntryReflection,
    WeeklyReview,
}

impl SessionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionType::Freeform => "freeform",
            SessionType::EntryReflection => "entry_reflection",
            SessionType::WeeklyReview => "weekly_review",
        }
    }
}

impl FromStr for SessionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "freeform" => Ok(SessionType::Freeform),
            "entry_reflection" => Ok(SessionType::EntryReflection),
            "weekly_review" => Ok(SessionType::WeeklyReview),
            other => Err(format!("unknown session type: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Role::User),
            "assistant" => Ok(Role::Assistant),
            other => Err(format!("unknown role: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum PeriodType {
    Weekly,
    Monthly,
}

impl PeriodType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PeriodType::Weekly => "weekly",
            PeriodType::Monthly => "monthly",
        }
    }

    /// Inclusive last day of the period starting at `start`.
    ///
    /// Monthly periods must start on the first of a month.
    pub fn period_end(&self, start: NaiveDate) -> Result<NaiveDate, String> {
        match self {
            PeriodType::Weekly => Ok(start + Duration::days(6)),
            PeriodType::Monthly => {
                if start.day() != 1 {
                    return Err(format!(
                        "monthly period must start on the first day of a month, got {}",
                        start
                    ));
                }
                let (year, month) = if start.month() == 12 {
                    (start.year() + 1, 1)
                } else {
                    (start.year(), start.month() + 1)
                };
                NaiveDate::from_ymd_opt(year, month, 1)
                    .map(|next| next - Duration::days(1))
                    .ok_or_else(|| format!("period end out of range for {}", start))
            }
        }
    }

    /// Start of the most recent fully elapsed period before `today`.
    pub fn previous_period_start(&self, today: NaiveDate) -> NaiveDate {
        match self {
            PeriodType::Weekly => {
                let this_monday =
                    today - Duration::days(today.weekday().num_days_from_monday() as i64);
                this_monday - Duration::days(7)
            }
            PeriodType::Monthly => {
                let (year, month) = if today.month() == 1 {
                    (today.year() - 1, 12)
                } else {
                    (today.year(), today.month() - 1)
                };
                // Day 1 of any month is always valid.
                NaiveDate::from_ymd_opt(year, month, 1).unwrap_or(today)
            }
        }
    }
}

impl FromStr for PeriodType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "weekly" => Ok(PeriodType::Weekly),
            "monthly" => Ok(PeriodType::Monthly),
            other => Err(format!("unknown period type: {}", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Entry {
    pub id: Uuid,
    pub user_id: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub mood: Option<Mood>,
    pub energy: Option<u8>,
    pub tags: Vec<String>,
    pub reflection: Option<String>,
    pub themes: Vec<String>,
}

impl Entry {
    pub fn date(&self) -> NaiveDate {
        self.created_at.date_naive()
    }
}

/// Input for creating an entry.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct NewEntry {
    #[validate(custom(function = "validate_not_blank"))]
    pub content: String,
    pub mood: Option<Mood>,
    #[validate(range(min = 1, max = 5))]
    pub energy: Option<u8>,
    #[validate(custom(function = "validate_tags"))]
    pub tags: Vec<String>,
    /// Overrides the creation timestamp (imports, tests).
    pub created_at: Option<DateTime<Utc>>,
}

/// Allow-list of user-editable entry fields. Anything not named here is never
/// written by an update.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct EntryUpdate {
    #[validate(custom(function = "validate_not_blank"))]
    pub content: Option<String>,
    pub mood: Option<Mood>,
    #[validate(range(min = 1, max = 5))]
    pub energy: Option<u8>,
    #[validate(custom(function = "validate_tags"))]
    pub tags: Option<Vec<String>>,
}

impl EntryUpdate {
    pub fn is_empty(&self) -> bool {
        self.content.is_none() && self.mood.is_none() && self.energy.is_none() && self.tags.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntryFilter {
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
    pub mood: Option<Mood>,
    pub tag: Option<String>,
    pub limit: u64,
    pub offset: u64,
}

impl Default for EntryFilter {
    fn default() -> Self {
        Self {
            since: None,
            until: None,
            mood: None,
            tag: None,
            limit: 50,
            offset: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Conversation {
    pub id: Uuid,
    pub user_id: String,
    pub entry_id: Option<Uuid>,
    pub session_type: SessionType,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewConversation {
    pub entry_id: Option<Uuid>,
    pub session_type: SessionType,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Message {
    pub id: Uuid,
    pub conversation_id: Uuid,
    pub role: Role,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// One turn of history handed to the completion service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: Role,
    pub content: String,
}

impl ChatTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

impl From<&Message> for ChatTurn {
    fn from(message: &Message) -> Self {
        Self {
            role: message.role,
            content: message.content.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Summary {
    pub user_id: String,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    pub period_type: PeriodType,
    pub summary: String,
    pub entry_count: u32,
}

/// Trims, drops empties and de-duplicates tags, keeping first-seen order.
pub fn normalize_tags(tags: &[String]) -> Vec<String> {
    let mut seen: Vec<String> = Vec::with_capacity(tags.len());
    for tag in tags {
        let tag = tag.trim();
        if !tag.is_empty() && !seen.iter().any(|t| t == tag) {
            seen.push(tag.to_string());
        }
    }
    seen
}

fn validate_not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new("blank"));
    }
    Ok(())
}

fn validate_tags(tags: &[String]) -> Result<(), ValidationError> {
    if tags.len() > MAX_TAGS {
        return Err(ValidationError::new("too_many_tags"));
    }
    if tags.iter().any(|t| t.trim().chars().count() > MAX_TAG_LEN) {
        return Err(ValidationError::new("tag_too_long"));
    }
    Ok(())
}

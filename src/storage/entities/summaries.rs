use sea_orm::entity::prelude::*;

/// One narrative per (user_id, period_start, period_type); enforced by a
/// unique index that the upsert targets.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "summaries")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub user_id: String,
    pub period_start: String,
    pub period_end: String,
    pub period_type: String,
    #[sea_orm(column_type = "Text")]
    pub summary: String,
    pub entry_count: i32,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "notifications")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub user_id: Uuid,
    pub timeline_event_id: Option<Uuid>,
    pub title: String,
    pub body: String,
    #[sea_orm(column_type = "Text")]
    pub payload: String,
    /// pending, sent, failed, read
    pub status: String,
    pub scheduled_for: String,
    pub sent_at: Option<String>,
    pub read_at: Option<String>,
    pub created_at: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "titles")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub kind: String,
    pub name: String,
    pub overview: Option<String>,
    pub poster_url: Option<String>,
    pub backdrop_url: Option<String>,
    pub status: Option<String>,
    /// JSON array of genre names.
    pub genres: Option<String>,
    pub network: Option<String>,
    pub premiere_date: Option<String>,
    #[sea_orm(unique)]
    pub tmdb_id: Option<i32>,
    pub imdb_id: Option<String>,
    pub tvdb_id: Option<i32>,
    pub last_synced_at: Option<String>,
    pub sync_priority: i32,
    /// Opaque JSON object produced by enrichment. No schema contract.
    #[sea_orm(column_type = "Text", nullable)]
    pub ratings: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::seasons::Entity")]
    Seasons,
    #[sea_orm(has_many = "super::episodes::Entity")]
    Episodes,
    #[sea_orm(has_many = "super::timeline_events::Entity")]
    TimelineEvents,
    #[sea_orm(has_many = "super::tracked_titles::Entity")]
    TrackedTitles,
}

impl Related<super::seasons::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Seasons.def()
    }
}

impl Related<super::episodes::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Episodes.def()
    }
}

impl Related<super::timeline_events::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::TimelineEvents.def()
    }
}

impl Related<super::tracked_titles::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::TrackedTitles.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

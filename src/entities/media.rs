use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "media")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    pub title: String,

    /// Discriminant code: BOOK, GAME, MUSIC, COMIC, FILM, TV, PERF, BROADCAST.
    pub media_type: String,

    /// Engagement status code: PLANNED, IN_PROGRESS, COMPLETED, PAUSED, DNF.
    pub status: String,

    pub pub_year: Option<i32>,

    /// Personal rating, 1..=10.
    pub score: Option<i32>,

    /// Review source (markdown). Empty string when no review was written.
    pub review: String,

    /// Rendered form of `review`, kept in sync on every write.
    pub review_html: String,

    /// Partial date in canonical `YYYY[-MM[-DD]]` form; the zero-padded text
    /// ordering matches the chronological one, so range filters compare raw.
    pub review_date: Option<String>,

    /// Cover path relative to the media directory, e.g. `covers/42.jpg`.
    pub cover: Option<String>,

    pub created_at: String,

    pub updated_at: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::activities::Entity")]
    Activities,
}

impl Related<super::activities::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Activities.def()
    }
}

impl Related<super::agents::Entity> for Entity {
    fn to() -> RelationDef {
        super::media_contributors::Relation::Agent.def()
    }
    fn via() -> Option<RelationDef> {
        Some(super::media_contributors::Relation::Media.def().rev())
    }
}

impl Related<super::tags::Entity> for Entity {
    fn to() -> RelationDef {
        super::media_tags::Relation::Tag.def()
    }
    fn via() -> Option<RelationDef> {
        Some(super::media_tags::Relation::Media.def().rev())
    }
}

impl ActiveModelBehavior for ActiveModel {}

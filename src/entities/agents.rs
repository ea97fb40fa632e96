use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "agents")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    /// Person or organisation credited on a media entry (author, director,
    /// developer, artist, ...).
    pub name: String,

    pub created_at: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl Related<super::media::Entity> for Entity {
    fn to() -> RelationDef {
        super::media_contributors::Relation::Media.def()
    }
    fn via() -> Option<RelationDef> {
        Some(super::media_contributors::Relation::Agent.def().rev())
    }
}

impl ActiveModelBehavior for ActiveModel {}

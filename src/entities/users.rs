use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "users")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub name_first: Option<String>,
    pub name_middle: Option<String>,
    pub name_last: Option<String>,
    pub name_suffix: Option<String>,
    #[sea_orm(unique)]
    pub alias: Option<String>,
    #[sea_orm(unique)]
    pub url: String,
    #[sea_orm(unique)]
    pub email: String,
    pub password_hash: String,
    #[sea_orm(column_type = "Text", nullable)]
    pub profile: Option<String>,
    pub image_id: Option<String>,
    /// Comma separated role names, see `models::Role`
    pub roles: String,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::files::Entity")]
    Files,
    #[sea_orm(has_many = "super::collectibles::Entity")]
    Collectibles,
}

impl Related<super::files::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Files.def()
    }
}

impl Related<super::collectibles::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Collectibles.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

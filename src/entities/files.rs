use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "files")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub user_id: String,
    pub name: String,
    pub public: bool,
    #[sea_orm(unique)]
    pub url: String,
    #[sea_orm(column_type = "Text")]
    pub path: String,
    pub storage_key: String,
    pub full_url: String,
    pub full_key: String,
    pub thumbnail_url: String,
    pub thumbnail_key: String,
    pub content_type: String,
    pub size: i64,
    pub width: i32,
    pub height: i32,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::users::Entity",
        from = "Column::UserId",
        to = "super::users::Column::Id",
        on_update = "Cascade",
        on_delete = "Cascade"
    )]
    Users,
    #[sea_orm(has_many = "super::collectible_files::Entity")]
    CollectibleFiles,
}

impl Related<super::users::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Users.def()
    }
}

impl Related<super::collectible_files::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::CollectibleFiles.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

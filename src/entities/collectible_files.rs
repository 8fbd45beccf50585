use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Ordered link between a collectible and one of its images
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "collectible_files")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub collectible_id: String,
    #[sea_orm(primary_key, auto_increment = false)]
    pub file_id: String,
    pub position: i32,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::collectibles::Entity",
        from = "Column::CollectibleId",
        to = "super::collectibles::Column::Id",
        on_update = "Cascade",
        on_delete = "Cascade"
    )]
    Collectibles,
    #[sea_orm(
        belongs_to = "super::files::Entity",
        from = "Column::FileId",
        to = "super::files::Column::Id",
        on_update = "Cascade",
        on_delete = "Cascade"
    )]
    Files,
}

impl Related<super::collectibles::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Collectibles.def()
    }
}

impl Related<super::files::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Files.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

use crate::api::error::AppError;
use crate::config::AppConfig;
use crate::entities::{collectible_files, collectibles, files, prelude::*, users};
use crate::models::{Acquired, CollectibleDto, CurrentUser, FileDto, Meta, PublicUserDto};
use crate::utils::slug::collectible_url;
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, DatabaseConnection, DbErr,
    EntityTrait, QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Default, Deserialize, ToSchema, Validate)]
pub struct NewCollectible {
    #[validate(length(min = 1, max = 200, message = "Name must be 1 to 200 characters"))]
    pub name: String,
    pub description: Option<String>,
    #[serde(default)]
    pub file_ids: Vec<String>,
    #[serde(default)]
    pub public: bool,
    #[serde(default)]
    pub acquired: Acquired,
    /// Honoured only for admins
    pub meta: Option<Meta>,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema, Validate)]
pub struct CollectiblePatch {
    #[validate(length(min = 1, max = 200, message = "Name must be 1 to 200 characters"))]
    pub name: Option<String>,
    pub description: Option<String>,
    pub file_ids: Option<Vec<String>>,
    pub public: Option<bool>,
    pub acquired: Option<Acquired>,
}

/// Keeps the first occurrence of every id
fn dedup_ids(ids: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    ids.into_iter().filter(|id| seen.insert(id.clone())).collect()
}

pub struct CollectibleService {
    db: DatabaseConnection,
    config: AppConfig,
}

impl CollectibleService {
    pub fn new(db: DatabaseConnection, config: AppConfig) -> Self {
        Self { db, config }
    }

    pub async fn create(
        &self,
        viewer: &CurrentUser,
        owner_id: &str,
        input: NewCollectible,
    ) -> Result<CollectibleDto, AppError> {
        input
            .validate()
            .map_err(|e| AppError::BadRequest(e.to_string()))?;

        let file_ids = dedup_ids(input.file_ids);
        self.ensure_owned_files(owner_id, &file_ids).await?;

        let now = Utc::now();
        let meta = match input.meta {
            Some(meta) if viewer.is_admin() => meta,
            _ => Meta {
                created: now,
                updated: now,
            },
        };

        let collectible = collectibles::ActiveModel {
            id: Set(Uuid::new_v4().to_string()),
            user_id: Set(owner_id.to_string()),
            url: Set(collectible_url(&input.name)),
            name: Set(input.name),
            description: Set(input.description),
            public: Set(input.public),
            acquired_from: Set(input.acquired.from),
            acquired_to: Set(input.acquired.to),
            acquired_description: Set(input.acquired.description),
            created_at: Set(meta.created),
            updated_at: Set(meta.updated),
        };

        let txn = self.db.begin().await?;
        let collectible = collectible.insert(&txn).await?;
        replace_links(&txn, &collectible.id, &file_ids).await?;
        txn.commit().await?;

        tracing::info!(
            "📦 Created collectible {} ({}) for user {}",
            collectible.id,
            collectible.url,
            owner_id
        );
        self.load_one(collectible).await
    }

    pub async fn update(
        &self,
        viewer: &CurrentUser,
        id: &str,
        patch: CollectiblePatch,
    ) -> Result<CollectibleDto, AppError> {
        patch
            .validate()
            .map_err(|e| AppError::BadRequest(e.to_string()))?;

        let collectible = Collectibles::find_by_id(id)
            .one(&self.db)
            .await?
            .ok_or_else(|| AppError::not_found("Collectible"))?;
        if !viewer.can_manage(&collectible.user_id) {
            return Err(AppError::not_authorized());
        }

        let file_ids = patch.file_ids.map(dedup_ids);
        if let Some(ids) = &file_ids {
            self.ensure_owned_files(&collectible.user_id, ids).await?;
        }

        let mut active: collectibles::ActiveModel = collectible.clone().into();
        if let Some(name) = patch.name
            && name != collectible.name
        {
            // A new name means a new slug
            active.url = Set(collectible_url(&name));
            active.name = Set(name);
        }
        if let Some(description) = patch.description {
            active.description = Set(Some(description));
        }
        if let Some(public) = patch.public {
            active.public = Set(public);
        }
        if let Some(acquired) = patch.acquired {
            active.acquired_from = Set(acquired.from);
            active.acquired_to = Set(acquired.to);
            active.acquired_description = Set(acquired.description);
        }
        active.updated_at = Set(Utc::now());

        let txn = self.db.begin().await?;
        let collectible = active.update(&txn).await?;
        if let Some(ids) = &file_ids {
            replace_links(&txn, &collectible.id, ids).await?;
        }
        txn.commit().await?;

        self.load_one(collectible).await
    }

    pub async fn delete(&self, viewer: &CurrentUser, id: &str) -> Result<(), AppError> {
        let collectible = Collectibles::find_by_id(id)
            .one(&self.db)
            .await?
            .ok_or_else(|| AppError::not_found("Collectible"))?;
        if !viewer.can_manage(&collectible.user_id) {
            return Err(AppError::not_authorized());
        }

        let txn = self.db.begin().await?;
        CollectibleFiles::delete_many()
            .filter(collectible_files::Column::CollectibleId.eq(&collectible.id))
            .exec(&txn)
            .await?;
        Collectibles::delete_by_id(&collectible.id).exec(&txn).await?;
        txn.commit().await?;

        tracing::info!("🗑️  Deleted collectible {}", collectible.id);
        Ok(())
    }

    /// Visible collectibles, optionally for one owner, newest first
    pub async fn list(
        &self,
        viewer: &CurrentUser,
        owner_id: Option<&str>,
        offset: u64,
        limit: u64,
    ) -> Result<Vec<CollectibleDto>, AppError> {
        let mut cond = Condition::all();
        if let Some(owner) = owner_id {
            cond = cond.add(collectibles::Column::UserId.eq(owner));
        }
        if !viewer.is_admin() {
            let mut visible = Condition::any().add(collectibles::Column::Public.eq(true));
            if let Some(id) = &viewer.id {
                visible = visible.add(collectibles::Column::UserId.eq(id.as_str()));
            }
            cond = cond.add(visible);
        }

        let rows = Collectibles::find()
            .filter(cond)
            .order_by_desc(collectibles::Column::CreatedAt)
            .order_by_desc(collectibles::Column::Id)
            .offset(offset)
            .limit(limit)
            .all(&self.db)
            .await?;

        Ok(self.load_all(rows).await?)
    }

    /// Finds by id or slug; private collectibles of others read as missing
    pub async fn get(&self, viewer: &CurrentUser, key: &str) -> Result<CollectibleDto, AppError> {
        let cond = if Uuid::parse_str(key).is_ok() {
            Condition::any()
                .add(collectibles::Column::Id.eq(key))
                .add(collectibles::Column::Url.eq(key))
        } else {
            Condition::all().add(collectibles::Column::Url.eq(key))
        };

        let collectible = Collectibles::find()
            .filter(cond)
            .one(&self.db)
            .await?
            .filter(|c| viewer.can_view(&c.user_id, c.public))
            .ok_or_else(|| AppError::not_found("Collectible"))?;

        self.load_one(collectible).await
    }

    async fn load_one(&self, collectible: collectibles::Model) -> Result<CollectibleDto, AppError> {
        self.load_all(vec![collectible])
            .await?
            .pop()
            .ok_or_else(|| AppError::Internal("Collectible vanished while loading".to_string()))
    }

    /// Assembles DTOs: ordered files, owning user and public link.
    ///
    /// Files and owners are fetched concurrently with one query each, so the
    /// cost does not grow with the number of collectibles. Files that no longer
    /// exist are skipped; any database error fails the whole batch.
    pub async fn load_all(
        &self,
        rows: Vec<collectibles::Model>,
    ) -> Result<Vec<CollectibleDto>, DbErr> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<String> = rows.iter().map(|c| c.id.clone()).collect();
        let links = CollectibleFiles::find()
            .filter(collectible_files::Column::CollectibleId.is_in(ids))
            .order_by_asc(collectible_files::Column::Position)
            .all(&self.db)
            .await?;

        let file_ids: Vec<String> = links
            .iter()
            .map(|l| l.file_id.clone())
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        let owner_ids: Vec<String> = rows
            .iter()
            .map(|c| c.user_id.clone())
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();

        let load_files = async {
            if file_ids.is_empty() {
                return Ok(Vec::new());
            }
            Files::find()
                .filter(files::Column::Id.is_in(file_ids.clone()))
                .all(&self.db)
                .await
        };
        let load_owners = Users::find()
            .filter(users::Column::Id.is_in(owner_ids))
            .all(&self.db);

        let (found_files, owners) = futures::try_join!(load_files, load_owners)?;

        let files_by_id: HashMap<String, files::Model> = found_files
            .into_iter()
            .map(|f| (f.id.clone(), f))
            .collect();
        let owners_by_id: HashMap<String, users::Model> =
            owners.into_iter().map(|u| (u.id.clone(), u)).collect();

        let mut links_by_collectible: HashMap<String, Vec<String>> = HashMap::new();
        for link in links {
            links_by_collectible
                .entry(link.collectible_id)
                .or_default()
                .push(link.file_id);
        }

        Ok(rows
            .into_iter()
            .map(|c| {
                let file_ids = links_by_collectible.remove(&c.id).unwrap_or_default();
                let user = owners_by_id.get(&c.user_id).cloned().map(PublicUserDto::from);
                let link = self.config.collectible_link(&c.url);

                let mut dto = CollectibleDto::bare(c, link);
                dto.files = file_ids
                    .iter()
                    .filter_map(|id| files_by_id.get(id).cloned().map(FileDto::from))
                    .collect();
                dto.file_ids = file_ids;
                dto.user = user;
                dto
            })
            .collect())
    }

    async fn ensure_owned_files(&self, owner_id: &str, ids: &[String]) -> Result<(), AppError> {
        if ids.is_empty() {
            return Ok(());
        }
        let owned: HashSet<String> = Files::find()
            .filter(files::Column::Id.is_in(ids.iter().cloned()))
            .filter(files::Column::UserId.eq(owner_id))
            .all(&self.db)
            .await?
            .into_iter()
            .map(|f| f.id)
            .collect();

        let foreign: Vec<&str> = ids
            .iter()
            .filter(|id| !owned.contains(*id))
            .map(|id| id.as_str())
            .collect();
        if foreign.is_empty() {
            Ok(())
        } else {
            Err(AppError::BadRequest(format!(
                "Files not found or not owned by the collectible owner: {}",
                foreign.join(", ")
            )))
        }
    }
}

/// Rewrites the ordered file links of a collectible
async fn replace_links<C: ConnectionTrait>(
    conn: &C,
    collectible_id: &str,
    file_ids: &[String],
) -> Result<(), DbErr> {
    CollectibleFiles::delete_many()
        .filter(collectible_files::Column::CollectibleId.eq(collectible_id))
        .exec(conn)
        .await?;

    if file_ids.is_empty() {
        return Ok(());
    }

    let links = file_ids
        .iter()
        .enumerate()
        .map(|(position, file_id)| collectible_files::ActiveModel {
            collectible_id: Set(collectible_id.to_string()),
            file_id: Set(file_id.clone()),
            position: Set(position as i32),
        });
    CollectibleFiles::insert_many(links)
        .exec_without_returning(conn)
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dedup_ids_keeps_order() {
        let ids = vec!["b", "a", "b", "c", "a"]
            .into_iter()
            .map(String::from)
            .collect();
        assert_eq!(dedup_ids(ids), vec!["b", "a", "c"]);
    }
}

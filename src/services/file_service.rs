use crate::api::error::AppError;
use crate::config::AppConfig;
use crate::entities::{collectible_files, files, prelude::*, users};
use crate::models::CurrentUser;
use crate::services::image_service::ImageService;
use crate::services::storage::StorageService;
use crate::utils::slug::random_hex;
use crate::utils::validation::{detect_image_type, sanitize_filename, validate_file_size};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder, QuerySelect, Set, sea_query::Expr,
};
use serde::Deserialize;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};
use utoipa::ToSchema;
use uuid::Uuid;

/// A single image received from a multipart upload
pub struct UploadedImage {
    pub filename: String,
    pub data: Vec<u8>,
    pub public: bool,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct FilePatch {
    pub name: Option<String>,
    pub public: Option<bool>,
}

/// Object keys of an upload and its two derivatives
struct StoredKeys {
    original: String,
    full: String,
    thumbnail: String,
}

impl StoredKeys {
    fn for_upload(owner_id: &str, stored_name: &str) -> Self {
        let stem = Path::new(stored_name)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(stored_name);
        Self {
            original: format!("{}/{}", owner_id, stored_name),
            full: format!("{}/full/{}.jpg", owner_id, stem),
            thumbnail: format!("{}/thumb/{}.jpg", owner_id, stem),
        }
    }

    fn all(&self) -> [&str; 3] {
        [
            self.original.as_str(),
            self.full.as_str(),
            self.thumbnail.as_str(),
        ]
    }
}

pub struct FileService {
    db: DatabaseConnection,
    storage: Arc<dyn StorageService>,
    images: ImageService,
    config: AppConfig,
}

impl FileService {
    pub fn new(db: DatabaseConnection, storage: Arc<dyn StorageService>, config: AppConfig) -> Self {
        Self {
            db,
            storage,
            images: ImageService::new(config.full_image_size, config.thumbnail_size),
            config,
        }
    }

    fn public_url(&self, key: &str) -> String {
        format!("/{}/{}", self.config.upload_path, key)
    }

    /// Stores the original under the owner's directory, then the full and
    /// thumbnail derivatives, then records the file.
    pub async fn store_upload(
        &self,
        owner_id: &str,
        upload: UploadedImage,
    ) -> Result<files::Model, AppError> {
        validate_file_size(upload.data.len(), self.config.max_file_size).map_err(|e| {
            if upload.data.is_empty() {
                AppError::BadRequest(e.to_string())
            } else {
                AppError::PayloadTooLarge(e.to_string())
            }
        })?;
        let filename =
            sanitize_filename(&upload.filename).map_err(|e| AppError::BadRequest(e.to_string()))?;
        let content_type =
            detect_image_type(&upload.data).map_err(|e| AppError::BadRequest(e.to_string()))?;

        let size = upload.data.len() as i64;
        let derivatives = self
            .images
            .generate(upload.data.clone())
            .await
            .map_err(|e| AppError::BadRequest(e.to_string()))?;

        // Unique stored name so re-uploads of the same file never collide
        let stored_name = format!("{}-{}", random_hex(5), filename);
        let keys = StoredKeys::for_upload(owner_id, &stored_name);

        let writes = [
            (&keys.original, upload.data),
            (&keys.full, derivatives.full),
            (&keys.thumbnail, derivatives.thumbnail),
        ];
        for (key, data) in writes {
            if let Err(e) = self.storage.upload_file(key, data).await {
                self.remove_objects(&keys.all()).await;
                return Err(AppError::Internal(format!("Failed to store '{}': {}", key, e)));
            }
        }

        let file = files::ActiveModel {
            id: Set(Uuid::new_v4().to_string()),
            user_id: Set(owner_id.to_string()),
            name: Set(filename),
            public: Set(upload.public),
            url: Set(self.public_url(&keys.original)),
            path: Set(self.storage.locate(&keys.original)),
            storage_key: Set(keys.original.clone()),
            full_url: Set(self.public_url(&keys.full)),
            full_key: Set(keys.full.clone()),
            thumbnail_url: Set(self.public_url(&keys.thumbnail)),
            thumbnail_key: Set(keys.thumbnail.clone()),
            content_type: Set(content_type.to_string()),
            size: Set(size),
            width: Set(derivatives.width as i32),
            height: Set(derivatives.height as i32),
            created_at: Set(Utc::now()),
        };

        match file.insert(&self.db).await {
            Ok(file) => {
                info!(
                    "🖼️  Stored image {} for user {} ({}x{}, {} bytes)",
                    file.id, owner_id, file.width, file.height, file.size
                );
                Ok(file)
            }
            Err(e) => {
                self.remove_objects(&keys.all()).await;
                Err(e.into())
            }
        }
    }

    /// Files visible to the viewer, optionally restricted to one owner, newest first
    pub async fn list(
        &self,
        viewer: &CurrentUser,
        owner_id: Option<&str>,
        offset: u64,
        limit: u64,
    ) -> Result<Vec<files::Model>, AppError> {
        let mut cond = Condition::all();
        if let Some(owner) = owner_id {
            cond = cond.add(files::Column::UserId.eq(owner));
        }
        if !viewer.is_admin() {
            let mut visible = Condition::any().add(files::Column::Public.eq(true));
            if let Some(id) = &viewer.id {
                visible = visible.add(files::Column::UserId.eq(id.as_str()));
            }
            cond = cond.add(visible);
        }

        Ok(Files::find()
            .filter(cond)
            .order_by_desc(files::Column::CreatedAt)
            .order_by_desc(files::Column::Id)
            .offset(offset)
            .limit(limit)
            .all(&self.db)
            .await?)
    }

    /// 404 both for missing files and for files the viewer may not see
    pub async fn find_visible(
        &self,
        viewer: &CurrentUser,
        id: &str,
    ) -> Result<files::Model, AppError> {
        Files::find_by_id(id)
            .one(&self.db)
            .await?
            .filter(|f| viewer.can_view(&f.user_id, f.public))
            .ok_or_else(|| AppError::not_found("File"))
    }

    pub async fn update(
        &self,
        viewer: &CurrentUser,
        id: &str,
        patch: FilePatch,
    ) -> Result<files::Model, AppError> {
        let file = self.find_visible(viewer, id).await?;
        if !viewer.can_manage(&file.user_id) {
            return Err(AppError::not_authorized());
        }

        let mut active: files::ActiveModel = file.into();
        if let Some(name) = patch.name {
            active.name =
                Set(sanitize_filename(&name).map_err(|e| AppError::BadRequest(e.to_string()))?);
        }
        if let Some(public) = patch.public {
            active.public = Set(public);
        }
        Ok(active.update(&self.db).await?)
    }

    pub async fn delete(&self, viewer: &CurrentUser, id: &str) -> Result<(), AppError> {
        let file = Files::find_by_id(id)
            .one(&self.db)
            .await?
            .ok_or_else(|| AppError::not_found("File"))?;
        if !viewer.can_manage(&file.user_id) {
            return Err(AppError::not_authorized());
        }
        self.remove(file).await
    }

    /// Removes every file of a user, used before deleting the account
    pub async fn delete_all_for_user(&self, user_id: &str) -> Result<usize, AppError> {
        let owned = Files::find()
            .filter(files::Column::UserId.eq(user_id))
            .all(&self.db)
            .await?;
        let count = owned.len();
        for file in owned {
            self.remove(file).await?;
        }
        Ok(count)
    }

    async fn remove(&self, file: files::Model) -> Result<(), AppError> {
        CollectibleFiles::delete_many()
            .filter(collectible_files::Column::FileId.eq(&file.id))
            .exec(&self.db)
            .await?;
        Users::update_many()
            .col_expr(users::Column::ImageId, Expr::value(Option::<String>::None))
            .filter(users::Column::ImageId.eq(&file.id))
            .exec(&self.db)
            .await?;
        Files::delete_by_id(&file.id).exec(&self.db).await?;
        self.remove_objects(&[
            file.storage_key.as_str(),
            file.full_key.as_str(),
            file.thumbnail_key.as_str(),
        ])
        .await;
        info!("🗑️  Deleted file {} of user {}", file.id, file.user_id);
        Ok(())
    }

    /// Reads a stored original or derivative, honouring the owning file's visibility
    pub async fn read_object(
        &self,
        viewer: &CurrentUser,
        key: &str,
    ) -> Result<(Vec<u8>, String), AppError> {
        let file = Files::find()
            .filter(
                Condition::any()
                    .add(files::Column::StorageKey.eq(key))
                    .add(files::Column::FullKey.eq(key))
                    .add(files::Column::ThumbnailKey.eq(key)),
            )
            .one(&self.db)
            .await?
            .filter(|f| viewer.can_view(&f.user_id, f.public))
            .ok_or_else(|| AppError::not_found("File"))?;

        let data = self.storage.get_file(key).await.map_err(|e| {
            warn!("Stored object '{}' of file {} is unreadable: {}", key, file.id, e);
            AppError::not_found("File")
        })?;

        let content_type = if key == file.storage_key {
            file.content_type
        } else {
            mime::IMAGE_JPEG.to_string()
        };
        Ok((data, content_type))
    }

    async fn remove_objects(&self, keys: &[&str]) {
        for key in keys {
            if let Err(e) = self.storage.delete_file(key).await {
                warn!("Failed to remove stored object '{}': {}", key, e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stored_keys_layout() {
        let keys = StoredKeys::for_upload("u1", "0a1b2c3d4e-penny.black.png");
        assert_eq!(keys.original, "u1/0a1b2c3d4e-penny.black.png");
        assert_eq!(keys.full, "u1/full/0a1b2c3d4e-penny.black.jpg");
        assert_eq!(keys.thumbnail, "u1/thumb/0a1b2c3d4e-penny.black.jpg");
    }
}

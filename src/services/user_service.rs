use crate::api::error::AppError;
use crate::entities::{prelude::*, users};
use crate::models::{PersonName, Role};
use crate::utils::password::{hash_password, verify_password};
use crate::utils::slug::user_url;
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder, QuerySelect, Set,
};
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Default, Deserialize, ToSchema, Validate)]
pub struct NewUser {
    #[serde(default)]
    pub name: PersonName,
    #[validate(length(min = 3, max = 23, message = "Alias must be 3 to 23 characters"))]
    pub alias: Option<String>,
    #[validate(email(message = "Invalid email format"))]
    pub email: String,
    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
    pub profile: Option<String>,
    pub image_id: Option<String>,
    #[serde(default)]
    pub roles: Vec<Role>,
}

/// Partial update: absent fields keep their stored value
#[derive(Debug, Clone, Default, Deserialize, ToSchema, Validate)]
pub struct UserPatch {
    pub name: Option<PersonName>,
    #[validate(length(min = 3, max = 23, message = "Alias must be 3 to 23 characters"))]
    pub alias: Option<String>,
    #[validate(email(message = "Invalid email format"))]
    pub email: Option<String>,
    #[validate(length(min = 1, message = "Password cannot be empty"))]
    pub password: Option<String>,
    pub profile: Option<String>,
    pub image_id: Option<String>,
    pub roles: Option<Vec<Role>>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

pub struct UserService {
    db: DatabaseConnection,
}

impl UserService {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    pub async fn create(&self, input: NewUser) -> Result<users::Model, AppError> {
        let input = NewUser {
            alias: non_empty(input.alias),
            ..input
        };
        input
            .validate()
            .map_err(|e| AppError::BadRequest(e.to_string()))?;

        if let Some(image_id) = &input.image_id {
            self.ensure_usable_image(None, image_id).await?;
        }

        let id = Uuid::new_v4().to_string();
        let roles = if input.roles.is_empty() {
            vec![Role::User]
        } else {
            input.roles
        };

        let user = users::ActiveModel {
            url: Set(user_url(input.alias.as_deref(), &id)),
            id: Set(id),
            name_first: Set(input.name.first),
            name_middle: Set(input.name.middle),
            name_last: Set(input.name.last),
            name_suffix: Set(input.name.suffix),
            alias: Set(input.alias),
            email: Set(input.email.trim().to_lowercase()),
            password_hash: Set(hash_password(&input.password)?),
            profile: Set(input.profile),
            image_id: Set(input.image_id),
            roles: Set(Role::join(&roles)),
            created_at: Set(Utc::now()),
        };

        let user = user.insert(&self.db).await?;
        tracing::info!("👤 Created user {} ({})", user.id, user.url);
        Ok(user)
    }

    /// Applies a patch. Roles only change when `allow_roles` is set and the
    /// submitted list is non-empty.
    pub async fn update(
        &self,
        id: &str,
        patch: UserPatch,
        allow_roles: bool,
    ) -> Result<users::Model, AppError> {
        patch
            .validate()
            .map_err(|e| AppError::BadRequest(e.to_string()))?;

        let user = Users::find_by_id(id)
            .one(&self.db)
            .await?
            .ok_or_else(|| AppError::not_found("User"))?;

        if let Some(image_id) = &patch.image_id {
            self.ensure_usable_image(Some(&user.id), image_id).await?;
        }

        let alias = match patch.alias {
            Some(alias) => non_empty(Some(alias)),
            None => user.alias.clone(),
        };
        let mut active: users::ActiveModel = user.clone().into();

        if let Some(name) = patch.name {
            if name.first.is_some() {
                active.name_first = Set(name.first);
            }
            if name.middle.is_some() {
                active.name_middle = Set(name.middle);
            }
            if name.last.is_some() {
                active.name_last = Set(name.last);
            }
            if name.suffix.is_some() {
                active.name_suffix = Set(name.suffix);
            }
        }
        // The profile slug always follows the alias
        active.url = Set(user_url(alias.as_deref(), &user.id));
        active.alias = Set(alias);
        if let Some(email) = patch.email {
            active.email = Set(email.trim().to_lowercase());
        }
        if let Some(password) = patch.password {
            active.password_hash = Set(hash_password(&password)?);
        }
        if let Some(profile) = patch.profile {
            active.profile = Set(Some(profile));
        }
        if let Some(image_id) = patch.image_id {
            active.image_id = Set(Some(image_id));
        }
        if allow_roles
            && let Some(roles) = patch.roles
            && !roles.is_empty()
        {
            active.roles = Set(Role::join(&roles));
        }

        Ok(active.update(&self.db).await?)
    }

    pub async fn delete(&self, id: &str) -> Result<(), AppError> {
        let res = Users::delete_by_id(id).exec(&self.db).await?;
        if res.rows_affected == 0 {
            return Err(AppError::not_found("User"));
        }
        tracing::info!("🗑️  Deleted user {}", id);
        Ok(())
    }

    pub async fn find_by_id(&self, id: &str) -> Result<Option<users::Model>, AppError> {
        Ok(Users::find_by_id(id).one(&self.db).await?)
    }

    /// Looks a user up by id, falling back to the profile slug
    pub async fn find_by_key(&self, key: &str) -> Result<Option<users::Model>, AppError> {
        let cond = if Uuid::parse_str(key).is_ok() {
            Condition::any()
                .add(users::Column::Id.eq(key))
                .add(users::Column::Url.eq(key))
        } else {
            Condition::all().add(users::Column::Url.eq(key))
        };
        Ok(Users::find().filter(cond).one(&self.db).await?)
    }

    pub async fn find_by_email(&self, email: &str) -> Result<Option<users::Model>, AppError> {
        Ok(Users::find()
            .filter(users::Column::Email.eq(email.trim().to_lowercase()))
            .one(&self.db)
            .await?)
    }

    /// All users for admins, otherwise only the caller
    pub async fn list(
        &self,
        only: Option<&str>,
        offset: u64,
        limit: u64,
    ) -> Result<Vec<users::Model>, AppError> {
        let mut query = Users::find();
        if let Some(id) = only {
            query = query.filter(users::Column::Id.eq(id));
        }
        Ok(query
            .order_by_desc(users::Column::CreatedAt)
            .offset(offset)
            .limit(limit)
            .all(&self.db)
            .await?)
    }

    pub async fn authenticate(&self, email: &str, password: &str) -> Result<users::Model, AppError> {
        let user = self
            .find_by_email(email)
            .await?
            .ok_or_else(|| AppError::Unauthorized("Invalid credentials".to_string()))?;

        if !verify_password(password, &user.password_hash) {
            return Err(AppError::Unauthorized("Invalid credentials".to_string()));
        }
        Ok(user)
    }

    /// A profile image must be one of the user's own files or a public one
    async fn ensure_usable_image(
        &self,
        user_id: Option<&str>,
        file_id: &str,
    ) -> Result<(), AppError> {
        Files::find_by_id(file_id)
            .one(&self.db)
            .await?
            .filter(|f| f.public || user_id == Some(f.user_id.as_str()))
            .map(|_| ())
            .ok_or_else(|| {
                AppError::BadRequest(format!("File '{}' cannot be used as profile image", file_id))
            })
    }
}

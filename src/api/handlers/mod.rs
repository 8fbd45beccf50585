pub mod auth;
pub mod collectibles;
pub mod files;
pub mod health;
pub mod users;

use crate::AppState;
use crate::api::error::AppError;
use crate::models::CurrentUser;

/// Id of a signed-in caller, 401 for the anonymous identity
pub(crate) fn require_registered(viewer: &CurrentUser) -> Result<&str, AppError> {
    viewer.id.as_deref().ok_or_else(AppError::not_authorized)
}

/// Resolves a user id or profile slug to the user id
pub(crate) async fn resolve_user_id(state: &AppState, key: &str) -> Result<String, AppError> {
    state
        .user_service
        .find_by_key(key)
        .await?
        .map(|u| u.id)
        .ok_or_else(|| AppError::not_found("User"))
}

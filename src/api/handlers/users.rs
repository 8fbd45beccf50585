use crate::AppState;
use crate::api::error::AppError;
use crate::api::extract::{Json, Path, Query};
use crate::api::response::{ApiResult, done, ok};
use crate::models::{CurrentUser, PageQuery, UserDto};
use crate::services::user_service::{NewUser, UserPatch};
use axum::{Extension, extract::State};

use super::{require_registered, resolve_user_id};

#[utoipa::path(
    get,
    path = "/user",
    params(PageQuery),
    responses(
        (status = 200, description = "Users visible to the caller", body = [UserDto]),
        (status = 401, description = "Unauthorized")
    ),
    security(
        ("jwt" = [])
    ),
    tag = "users"
)]
pub async fn list_users(
    State(state): State<AppState>,
    Extension(viewer): Extension<CurrentUser>,
    Query(page): Query<PageQuery>,
) -> ApiResult<Vec<UserDto>> {
    let caller = require_registered(&viewer)?;
    let (offset, limit) = state.config.page(page.offset, page.limit);
    let only = if viewer.is_admin() { None } else { Some(caller) };

    let users = state.user_service.list(only, offset, limit).await?;
    ok(users.into_iter().map(UserDto::from).collect())
}

#[utoipa::path(
    get,
    path = "/user/{id}",
    params(
        ("id" = String, Path, description = "User id or profile url")
    ),
    responses(
        (status = 200, description = "User found", body = UserDto),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "User not found")
    ),
    security(
        ("jwt" = [])
    ),
    tag = "users"
)]
pub async fn get_user(
    State(state): State<AppState>,
    Extension(viewer): Extension<CurrentUser>,
    Path(key): Path<String>,
) -> ApiResult<UserDto> {
    require_registered(&viewer)?;
    let user = state
        .user_service
        .find_by_key(&key)
        .await?
        .ok_or_else(|| AppError::not_found("User"))?;

    if !viewer.can_manage(&user.id) {
        return Err(AppError::not_authorized());
    }
    ok(user.into())
}

#[utoipa::path(
    post,
    path = "/user",
    request_body = NewUser,
    responses(
        (status = 200, description = "User created", body = UserDto),
        (status = 400, description = "Invalid input"),
        (status = 401, description = "Admin only")
    ),
    security(
        ("jwt" = [])
    ),
    tag = "users"
)]
pub async fn create_user(
    State(state): State<AppState>,
    Extension(viewer): Extension<CurrentUser>,
    Json(payload): Json<NewUser>,
) -> ApiResult<UserDto> {
    if !viewer.is_admin() {
        return Err(AppError::not_authorized());
    }
    let user = state.user_service.create(payload).await?;
    ok(user.into())
}

#[utoipa::path(
    patch,
    path = "/user/{id}",
    params(
        ("id" = String, Path, description = "User id or profile url")
    ),
    request_body = UserPatch,
    responses(
        (status = 200, description = "User updated", body = UserDto),
        (status = 400, description = "Invalid input"),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "User not found")
    ),
    security(
        ("jwt" = [])
    ),
    tag = "users"
)]
pub async fn update_user(
    State(state): State<AppState>,
    Extension(viewer): Extension<CurrentUser>,
    Path(key): Path<String>,
    Json(patch): Json<UserPatch>,
) -> ApiResult<UserDto> {
    require_registered(&viewer)?;
    let id = resolve_user_id(&state, &key).await?;
    if !viewer.can_manage(&id) {
        return Err(AppError::not_authorized());
    }

    let user = state
        .user_service
        .update(&id, patch, viewer.is_admin())
        .await?;
    ok(user.into())
}

#[utoipa::path(
    delete,
    path = "/user/{id}",
    params(
        ("id" = String, Path, description = "User id or profile url")
    ),
    responses(
        (status = 200, description = "User deleted"),
        (status = 401, description = "Admin only"),
        (status = 404, description = "User not found")
    ),
    security(
        ("jwt" = [])
    ),
    tag = "users"
)]
pub async fn delete_user(
    State(state): State<AppState>,
    Extension(viewer): Extension<CurrentUser>,
    Path(key): Path<String>,
) -> ApiResult<()> {
    if !viewer.is_admin() {
        return Err(AppError::not_authorized());
    }
    let id = resolve_user_id(&state, &key).await?;

    // Stored objects first, the database cascades the remaining rows
    let removed = state.file_service.delete_all_for_user(&id).await?;
    state.user_service.delete(&id).await?;
    tracing::info!("🧹 Removed user {} with {} file(s)", id, removed);
    done()
}

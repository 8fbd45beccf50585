use crate::AppState;
use crate::api::error::AppError;
use crate::api::extract::{Json, Path, Query};
use crate::api::response::{ApiResult, done, ok};
use crate::models::{CollectibleDto, CurrentUser, PageQuery};
use crate::services::collectible_service::{CollectiblePatch, NewCollectible};
use axum::{Extension, extract::State};

use super::{require_registered, resolve_user_id};

#[utoipa::path(
    get,
    path = "/collectible",
    params(PageQuery),
    responses(
        (status = 200, description = "Collectibles visible to the caller", body = [CollectibleDto])
    ),
    tag = "collectibles"
)]
pub async fn list_collectibles(
    State(state): State<AppState>,
    Extension(viewer): Extension<CurrentUser>,
    Query(page): Query<PageQuery>,
) -> ApiResult<Vec<CollectibleDto>> {
    let (offset, limit) = state.config.page(page.offset, page.limit);
    ok(state
        .collectible_service
        .list(&viewer, None, offset, limit)
        .await?)
}

#[utoipa::path(
    get,
    path = "/u/{id}/collectible",
    params(
        ("id" = String, Path, description = "Owner id or profile url"),
        PageQuery
    ),
    responses(
        (status = 200, description = "Collectibles of the user visible to the caller", body = [CollectibleDto]),
        (status = 404, description = "User not found")
    ),
    tag = "collectibles"
)]
pub async fn list_user_collectibles(
    State(state): State<AppState>,
    Extension(viewer): Extension<CurrentUser>,
    Path(key): Path<String>,
    Query(page): Query<PageQuery>,
) -> ApiResult<Vec<CollectibleDto>> {
    let owner = resolve_user_id(&state, &key).await?;
    let (offset, limit) = state.config.page(page.offset, page.limit);
    ok(state
        .collectible_service
        .list(&viewer, Some(&owner), offset, limit)
        .await?)
}

#[utoipa::path(
    get,
    path = "/collectible/{id}",
    params(
        ("id" = String, Path, description = "Collectible id or url")
    ),
    responses(
        (status = 200, description = "Collectible found", body = CollectibleDto),
        (status = 404, description = "Collectible not found")
    ),
    tag = "collectibles"
)]
pub async fn get_collectible(
    State(state): State<AppState>,
    Extension(viewer): Extension<CurrentUser>,
    Path(key): Path<String>,
) -> ApiResult<CollectibleDto> {
    ok(state.collectible_service.get(&viewer, &key).await?)
}

#[utoipa::path(
    post,
    path = "/u/{id}/collectible",
    params(
        ("id" = String, Path, description = "Owner id or profile url")
    ),
    request_body = NewCollectible,
    responses(
        (status = 200, description = "Collectible created", body = CollectibleDto),
        (status = 400, description = "Invalid input or foreign file ids"),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "User not found")
    ),
    security(
        ("jwt" = [])
    ),
    tag = "collectibles"
)]
pub async fn create_collectible(
    State(state): State<AppState>,
    Extension(viewer): Extension<CurrentUser>,
    Path(key): Path<String>,
    Json(payload): Json<NewCollectible>,
) -> ApiResult<CollectibleDto> {
    if !viewer.is_user() && !viewer.is_admin() {
        return Err(AppError::not_authorized());
    }
    let owner = resolve_user_id(&state, &key).await?;
    if !viewer.can_manage(&owner) {
        return Err(AppError::not_authorized());
    }

    ok(state
        .collectible_service
        .create(&viewer, &owner, payload)
        .await?)
}

#[utoipa::path(
    patch,
    path = "/collectible/{id}",
    params(
        ("id" = String, Path, description = "Collectible id")
    ),
    request_body = CollectiblePatch,
    responses(
        (status = 200, description = "Collectible updated", body = CollectibleDto),
        (status = 400, description = "Invalid input or foreign file ids"),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Collectible not found")
    ),
    security(
        ("jwt" = [])
    ),
    tag = "collectibles"
)]
pub async fn update_collectible(
    State(state): State<AppState>,
    Extension(viewer): Extension<CurrentUser>,
    Path(id): Path<String>,
    Json(patch): Json<CollectiblePatch>,
) -> ApiResult<CollectibleDto> {
    require_registered(&viewer)?;
    ok(state.collectible_service.update(&viewer, &id, patch).await?)
}

#[utoipa::path(
    delete,
    path = "/collectible/{id}",
    params(
        ("id" = String, Path, description = "Collectible id")
    ),
    responses(
        (status = 200, description = "Collectible deleted"),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Collectible not found")
    ),
    security(
        ("jwt" = [])
    ),
    tag = "collectibles"
)]
pub async fn delete_collectible(
    State(state): State<AppState>,
    Extension(viewer): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> ApiResult<()> {
    require_registered(&viewer)?;
    state.collectible_service.delete(&viewer, &id).await?;
    done()
}

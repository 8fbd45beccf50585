use crate::AppState;
use crate::api::error::AppError;
use crate::api::extract::{Json, Path, Query};
use crate::api::response::{ApiResult, done, ok};
use crate::models::{CurrentUser, FileDto, PageQuery};
use crate::services::file_service::{FilePatch, UploadedImage};
use axum::{
    Extension,
    body::Body,
    extract::{Multipart, State, multipart::MultipartRejection},
    http::{StatusCode, header},
    response::Response,
};

use super::{require_registered, resolve_user_id};

fn parse_flag(text: &str) -> Option<bool> {
    match text.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[utoipa::path(
    get,
    path = "/file",
    params(PageQuery),
    responses(
        (status = 200, description = "Files visible to the caller", body = [FileDto])
    ),
    tag = "files"
)]
pub async fn list_files(
    State(state): State<AppState>,
    Extension(viewer): Extension<CurrentUser>,
    Query(page): Query<PageQuery>,
) -> ApiResult<Vec<FileDto>> {
    let (offset, limit) = state.config.page(page.offset, page.limit);
    let files = state.file_service.list(&viewer, None, offset, limit).await?;
    ok(files.into_iter().map(FileDto::from).collect())
}

#[utoipa::path(
    get,
    path = "/user/{id}/file",
    params(
        ("id" = String, Path, description = "User id or profile url"),
        PageQuery
    ),
    responses(
        (status = 200, description = "Files of the user visible to the caller", body = [FileDto]),
        (status = 404, description = "User not found")
    ),
    tag = "files"
)]
pub async fn list_user_files(
    State(state): State<AppState>,
    Extension(viewer): Extension<CurrentUser>,
    Path(key): Path<String>,
    Query(page): Query<PageQuery>,
) -> ApiResult<Vec<FileDto>> {
    let owner = resolve_user_id(&state, &key).await?;
    let (offset, limit) = state.config.page(page.offset, page.limit);
    let files = state
        .file_service
        .list(&viewer, Some(&owner), offset, limit)
        .await?;
    ok(files.into_iter().map(FileDto::from).collect())
}

#[utoipa::path(
    get,
    path = "/file/{id}",
    params(
        ("id" = String, Path, description = "File id")
    ),
    responses(
        (status = 200, description = "File found", body = FileDto),
        (status = 404, description = "File not found")
    ),
    tag = "files"
)]
pub async fn get_file(
    State(state): State<AppState>,
    Extension(viewer): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> ApiResult<FileDto> {
    let file = state.file_service.find_visible(&viewer, &id).await?;
    ok(file.into())
}

#[utoipa::path(
    post,
    path = "/user/{id}/file",
    params(
        ("id" = String, Path, description = "Owner id or profile url")
    ),
    request_body(content = Object, description = "Multipart form: `file` image and optional `public` flag", content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Image stored", body = FileDto),
        (status = 400, description = "Missing or undecodable image"),
        (status = 401, description = "Unauthorized"),
        (status = 413, description = "Image too large")
    ),
    security(
        ("jwt" = [])
    ),
    tag = "files"
)]
pub async fn upload_file(
    State(state): State<AppState>,
    Extension(viewer): Extension<CurrentUser>,
    Path(key): Path<String>,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<FileDto> {
    let mut multipart = multipart?;
    let result: ApiResult<FileDto> = async {
        if !viewer.is_user() {
            return Err(AppError::not_authorized());
        }
        let owner = resolve_user_id(&state, &key).await?;
        if !viewer.can_manage(&owner) {
            return Err(AppError::not_authorized());
        }

        let mut image: Option<(String, Vec<u8>)> = None;
        let mut public = true;

        while let Some(field) = multipart.next_field().await.map_err(|e| {
            let err_msg = e.to_string();
            if err_msg.contains("length limit exceeded") {
                AppError::PayloadTooLarge(
                    "Request body exceeds the maximum allowed limit".to_string(),
                )
            } else {
                AppError::BadRequest(err_msg)
            }
        })? {
            let name = field.name().unwrap_or_default().to_string();

            if name == "file" {
                let filename = field.file_name().unwrap_or("unnamed").to_string();
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::BadRequest(e.to_string()))?;
                image = Some((filename, data.to_vec()));
            } else if name == "public" {
                let text = field
                    .text()
                    .await
                    .map_err(|e| AppError::BadRequest(e.to_string()))?;
                public = parse_flag(&text).ok_or_else(|| {
                    AppError::BadRequest(format!("Invalid value for public: '{}'", text))
                })?;
            }
        }

        let (filename, data) =
            image.ok_or_else(|| AppError::BadRequest("No file provided".to_string()))?;

        let file = state
            .file_service
            .store_upload(
                &owner,
                UploadedImage {
                    filename,
                    data,
                    public,
                },
            )
            .await?;
        ok(file.into())
    }
    .await;

    if let Err(e) = &result {
        // Drain the rest of the body so the client sees the error instead of a reset
        tracing::warn!("Upload failed early: {}. Consuming remaining stream...", e);
        while let Ok(Some(mut field)) = multipart.next_field().await {
            while let Ok(Some(_)) = field.chunk().await {}
        }
    }
    result
}

#[utoipa::path(
    patch,
    path = "/file/{id}",
    params(
        ("id" = String, Path, description = "File id")
    ),
    request_body = FilePatch,
    responses(
        (status = 200, description = "File updated", body = FileDto),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "File not found")
    ),
    security(
        ("jwt" = [])
    ),
    tag = "files"
)]
pub async fn update_file(
    State(state): State<AppState>,
    Extension(viewer): Extension<CurrentUser>,
    Path(id): Path<String>,
    Json(patch): Json<FilePatch>,
) -> ApiResult<FileDto> {
    require_registered(&viewer)?;
    let file = state.file_service.update(&viewer, &id, patch).await?;
    ok(file.into())
}

#[utoipa::path(
    delete,
    path = "/file/{id}",
    params(
        ("id" = String, Path, description = "File id")
    ),
    responses(
        (status = 200, description = "File and its stored images deleted"),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "File not found")
    ),
    security(
        ("jwt" = [])
    ),
    tag = "files"
)]
pub async fn delete_file(
    State(state): State<AppState>,
    Extension(viewer): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> ApiResult<()> {
    if !viewer.is_user() && !viewer.is_admin() {
        return Err(AppError::not_authorized());
    }
    state.file_service.delete(&viewer, &id).await?;
    done()
}

#[utoipa::path(
    get,
    path = "/uploads/{key}",
    params(
        ("key" = String, Path, description = "Storage key, e.g. `{user_id}/thumb/{name}.jpg`")
    ),
    responses(
        (status = 200, description = "Image bytes"),
        (status = 404, description = "Not found or not visible")
    ),
    tag = "files"
)]
pub async fn serve_upload(
    State(state): State<AppState>,
    Extension(viewer): Extension<CurrentUser>,
    Path(key): Path<String>,
) -> Result<Response, AppError> {
    let (data, content_type) = state.file_service.read_object(&viewer, &key).await?;

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, content_type)
        .header(header::CONTENT_LENGTH, data.len())
        .header(header::CACHE_CONTROL, "private, max-age=3600")
        .body(Body::from(data))
        .map_err(|e| AppError::Internal(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_flag() {
        assert_eq!(parse_flag("true"), Some(true));
        assert_eq!(parse_flag(" FALSE "), Some(false));
        assert_eq!(parse_flag("1"), Some(true));
        assert_eq!(parse_flag("maybe"), None);
    }
}

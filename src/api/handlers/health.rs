use crate::AppState;
use axum::{Json, extract::State, response::IntoResponse};
use serde::Serialize;
use utoipa::ToSchema;

const PROBE_KEY: &str = "health/probe";

#[derive(Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub database: String,
    /// "local" or "s3"
    pub storage_backend: String,
    /// "writable", "read-only" or "unavailable"
    pub storage: String,
    /// Largest accepted image upload in bytes
    pub max_upload_size: usize,
    pub version: String,
}

/// Writes and removes a probe object, uploads fail without write access
async fn probe_storage(state: &AppState) -> &'static str {
    match state.storage.upload_file(PROBE_KEY, b"ok".to_vec()).await {
        Ok(()) => {
            if let Err(e) = state.storage.delete_file(PROBE_KEY).await {
                tracing::warn!("Failed to remove storage probe: {}", e);
            }
            "writable"
        }
        Err(e) => {
            tracing::warn!("Storage probe write failed: {}", e);
            if state.storage.file_exists(PROBE_KEY).await.is_ok() {
                "read-only"
            } else {
                "unavailable"
            }
        }
    }
}

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Database and image storage status", body = HealthResponse)
    ),
    tag = "system"
)]
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let db_status = if state.db.ping().await.is_ok() {
        "connected"
    } else {
        "disconnected"
    };

    Json(HealthResponse {
        status: "ok".to_string(),
        database: db_status.to_string(),
        storage_backend: state.config.storage_backend.clone(),
        storage: probe_storage(&state).await.to_string(),
        max_upload_size: state.config.max_file_size,
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

use axum::Json;
use serde::Serialize;

use super::error::AppError;

/// `{"status": true, "data": ...}` wrapper used by every JSON endpoint
#[derive(Debug, Serialize)]
pub struct Envelope<T> {
    pub status: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

pub type ApiResult<T> = Result<Json<Envelope<T>>, AppError>;

pub fn ok<T>(data: T) -> ApiResult<T> {
    Ok(Json(Envelope {
        status: true,
        data: Some(data),
    }))
}

/// Success without a payload, used by deletes
pub fn done() -> ApiResult<()> {
    Ok(Json(Envelope {
        status: true,
        data: None,
    }))
}

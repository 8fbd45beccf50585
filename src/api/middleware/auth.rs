use crate::api::error::AppError;
use crate::models::CurrentUser;
use crate::utils::auth::validate_jwt;
use crate::{AppState, entities::prelude::Users};
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use sea_orm::EntityTrait;

/// Resolves the caller's identity and stores it as a `CurrentUser` extension.
///
/// No `Authorization` header means the anonymous identity. A token that fails
/// validation, or whose user has since been deleted, is rejected with 401.
pub async fn identity_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = req
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(|s| s.trim().to_string());

    let identity = match token {
        None => CurrentUser::anonymous(),
        Some(token) => {
            let claims = validate_jwt(&token, &state.config.jwt_secret).map_err(|e| {
                tracing::debug!("Rejected bearer token: {}", e);
                AppError::Unauthorized("Invalid or expired token".to_string())
            })?;

            // Check if user still exists in DB
            let user = Users::find_by_id(claims.sub.clone())
                .one(&state.db)
                .await?
                .ok_or_else(|| AppError::Unauthorized("Account no longer exists".to_string()))?;

            CurrentUser::from_model(&user)
        }
    };

    req.extensions_mut().insert(identity);
    Ok(next.run(req).await)
}

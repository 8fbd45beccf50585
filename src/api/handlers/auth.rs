use crate::AppState;
use crate::api::error::AppError;
use crate::api::extract::Json;
use crate::api::response::{ApiResult, ok};
use crate::models::{CurrentUser, PersonName, Role, UserDto};
use crate::services::user_service::NewUser;
use crate::utils::auth::create_jwt;
use axum::{Extension, extract::State};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

#[derive(Deserialize, ToSchema, Validate)]
pub struct RegisterRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: String,
    pub alias: Option<String>,
    #[serde(default)]
    pub name: PersonName,
}

#[derive(Deserialize, ToSchema)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Serialize, ToSchema)]
pub struct AuthResponse {
    pub token: String,
    pub user: UserDto,
}

fn issue_token(state: &AppState, user_id: &str) -> Result<String, AppError> {
    create_jwt(user_id, &state.config.jwt_secret, state.config.token_ttl_hours)
        .map_err(|e| AppError::Internal(e.to_string()))
}

#[utoipa::path(
    post,
    path = "/auth/register",
    request_body = RegisterRequest,
    responses(
        (status = 200, description = "Account created", body = AuthResponse),
        (status = 400, description = "Invalid input or email/alias already in use")
    ),
    tag = "auth"
)]
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> ApiResult<AuthResponse> {
    payload
        .validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    // Self-registration never grants more than the user role
    let user = state
        .user_service
        .create(NewUser {
            name: payload.name,
            alias: payload.alias,
            email: payload.email,
            password: payload.password,
            roles: vec![Role::User],
            ..NewUser::default()
        })
        .await?;

    let token = issue_token(&state, &user.id)?;
    ok(AuthResponse {
        token,
        user: user.into(),
    })
}

#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = AuthResponse),
        (status = 401, description = "Invalid credentials")
    ),
    tag = "auth"
)]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> ApiResult<AuthResponse> {
    let user = state
        .user_service
        .authenticate(&payload.email, &payload.password)
        .await?;

    let token = issue_token(&state, &user.id)?;
    tracing::info!("🔓 User {} logged in", user.id);
    ok(AuthResponse {
        token,
        user: user.into(),
    })
}

#[utoipa::path(
    get,
    path = "/auth/me",
    responses(
        (status = 200, description = "The calling user", body = UserDto),
        (status = 401, description = "Unauthorized")
    ),
    security(
        ("jwt" = [])
    ),
    tag = "auth"
)]
pub async fn me(
    State(state): State<AppState>,
    Extension(viewer): Extension<CurrentUser>,
) -> ApiResult<UserDto> {
    let id = viewer.id.ok_or_else(AppError::not_authorized)?;
    let user = state
        .user_service
        .find_by_id(&id)
        .await?
        .ok_or_else(|| AppError::not_found("User"))?;
    ok(user.into())
}

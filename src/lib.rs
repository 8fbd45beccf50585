pub mod api;
pub mod config;
pub mod entities;
pub mod infrastructure;
pub mod models;
pub mod services;
pub mod utils;

use crate::config::AppConfig;
use crate::services::collectible_service::CollectibleService;
use crate::services::file_service::FileService;
use crate::services::storage::StorageService;
use crate::services::user_service::UserService;
use axum::{
    Router,
    http::HeaderValue,
    middleware::from_fn_with_state,
    routing::{get, post},
};
use sea_orm::DatabaseConnection;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    paths(
        api::handlers::health::health_check,
        api::handlers::auth::register,
        api::handlers::auth::login,
        api::handlers::auth::me,
        api::handlers::users::list_users,
        api::handlers::users::get_user,
        api::handlers::users::create_user,
        api::handlers::users::update_user,
        api::handlers::users::delete_user,
        api::handlers::files::list_files,
        api::handlers::files::list_user_files,
        api::handlers::files::get_file,
        api::handlers::files::upload_file,
        api::handlers::files::update_file,
        api::handlers::files::delete_file,
        api::handlers::files::serve_upload,
        api::handlers::collectibles::list_collectibles,
        api::handlers::collectibles::list_user_collectibles,
        api::handlers::collectibles::get_collectible,
        api::handlers::collectibles::create_collectible,
        api::handlers::collectibles::update_collectible,
        api::handlers::collectibles::delete_collectible,
    ),
    components(
        schemas(
            api::handlers::health::HealthResponse,
            api::handlers::auth::RegisterRequest,
            api::handlers::auth::LoginRequest,
            api::handlers::auth::AuthResponse,
            models::Role,
            models::PersonName,
            models::UserDto,
            models::PublicUserDto,
            models::FileDto,
            models::Acquired,
            models::Meta,
            models::CollectibleDto,
            services::user_service::NewUser,
            services::user_service::UserPatch,
            services::file_service::FilePatch,
            services::collectible_service::NewCollectible,
            services::collectible_service::CollectiblePatch,
        )
    ),
    tags(
        (name = "auth", description = "Authentication endpoints"),
        (name = "users", description = "User management endpoints"),
        (name = "files", description = "Image upload and file endpoints"),
        (name = "collectibles", description = "Collectible catalogue endpoints"),
        (name = "system", description = "Health and diagnostics")
    )
)]
pub struct ApiDoc;

#[derive(Clone)]
pub struct AppState {
    pub db: DatabaseConnection,
    pub storage: Arc<dyn StorageService>,
    pub user_service: Arc<UserService>,
    pub file_service: Arc<FileService>,
    pub collectible_service: Arc<CollectibleService>,
    pub config: AppConfig,
}

impl AppState {
    pub fn new(db: DatabaseConnection, storage: Arc<dyn StorageService>, config: AppConfig) -> Self {
        Self {
            user_service: Arc::new(UserService::new(db.clone())),
            file_service: Arc::new(FileService::new(
                db.clone(),
                storage.clone(),
                config.clone(),
            )),
            collectible_service: Arc::new(CollectibleService::new(db.clone(), config.clone())),
            db,
            storage,
            config,
        }
    }
}

fn cors_layer(config: &AppConfig) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods(Any)
        .allow_headers(Any)
        .expose_headers(Any);

    if config.allowed_origins.iter().any(|o| o == "*") {
        return layer.allow_origin(Any);
    }
    let origins: Vec<HeaderValue> = config
        .allowed_origins
        .iter()
        .filter_map(|o| HeaderValue::from_str(o).ok())
        .collect();
    layer.allow_origin(origins)
}

pub fn create_app(state: AppState) -> Router {
    let uploads = format!("/{}/*key", state.config.upload_path);

    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .route("/health", get(api::handlers::health::health_check))
        .route("/auth/register", post(api::handlers::auth::register))
        .route("/auth/login", post(api::handlers::auth::login))
        .route("/auth/me", get(api::handlers::auth::me))
        .route(
            "/user",
            get(api::handlers::users::list_users).post(api::handlers::users::create_user),
        )
        .route(
            "/user/:id",
            get(api::handlers::users::get_user)
                .patch(api::handlers::users::update_user)
                .delete(api::handlers::users::delete_user),
        )
        .route(
            "/user/:id/file",
            get(api::handlers::files::list_user_files).post(api::handlers::files::upload_file),
        )
        .route("/file", get(api::handlers::files::list_files))
        .route(
            "/file/:id",
            get(api::handlers::files::get_file)
                .patch(api::handlers::files::update_file)
                .delete(api::handlers::files::delete_file),
        )
        .route(
            "/collectible",
            get(api::handlers::collectibles::list_collectibles),
        )
        .route(
            "/collectible/:id",
            get(api::handlers::collectibles::get_collectible)
                .patch(api::handlers::collectibles::update_collectible)
                .delete(api::handlers::collectibles::delete_collectible),
        )
        .route(
            "/u/:id/collectible",
            get(api::handlers::collectibles::list_user_collectibles)
                .post(api::handlers::collectibles::create_collectible),
        )
        .route(&uploads, get(api::handlers::files::serve_upload))
        .layer(from_fn_with_state(
            state.clone(),
            api::middleware::auth::identity_middleware,
        ))
        .layer(cors_layer(&state.config))
        .layer(axum::extract::DefaultBodyLimit::max(
            state.config.max_file_size + 10 * 1024 * 1024, // Add 10MB buffer for multipart overhead
        ))
        .with_state(state)
}

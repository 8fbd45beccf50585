use std::env;

/// Runtime configuration for the catalogue service
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Database connection string (default: local SQLite file)
    pub database_url: String,

    /// JWT signing secret (Required in production)
    pub jwt_secret: String,

    /// Lifetime of issued tokens in hours (default: 24)
    pub token_ttl_hours: i64,

    /// Absolute base used to derive public collectible links
    pub public_base_url: String,

    /// Root directory for the local storage backend (default: "./data")
    pub upload_root: String,

    /// URL prefix uploaded images are served under (default: "uploads")
    pub upload_path: String,

    /// Maximum upload size in bytes (default: 20 MB)
    pub max_file_size: usize,

    /// Longest edge of the "full" derivative in pixels (default: 1280)
    pub full_image_size: u32,

    /// Longest edge of the thumbnail derivative in pixels (default: 256)
    pub thumbnail_size: u32,

    /// Page size used when a list request has no `limit` (default: 10)
    pub default_page_size: u64,

    /// Upper bound for `limit` on list requests (default: 100)
    pub max_page_size: u64,

    /// Storage backend: "local" or "s3" (default: "local")
    pub storage_backend: String,

    pub s3_endpoint: Option<String>,
    pub s3_access_key: Option<String>,
    pub s3_secret_key: Option<String>,
    pub s3_bucket: String,

    /// Allowed CORS Origins (comma separated)
    pub allowed_origins: Vec<String>,

    /// Administrator account created on start-up when both are set
    pub admin_email: Option<String>,
    pub admin_password: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_url: "sqlite://collectibles.db?mode=rwc".to_string(),
            jwt_secret: "secret".to_string(),
            token_ttl_hours: 24,
            public_base_url: "http://localhost:3000".to_string(),
            upload_root: "./data".to_string(),
            upload_path: "uploads".to_string(),
            max_file_size: 20 * 1024 * 1024, // 20 MB
            full_image_size: 1280,
            thumbnail_size: 256,
            default_page_size: 10,
            max_page_size: 100,
            storage_backend: "local".to_string(),
            s3_endpoint: None,
            s3_access_key: None,
            s3_secret_key: None,
            s3_bucket: "collectibles".to_string(),
            allowed_origins: vec![
                "http://localhost:3000".to_string(),
                "http://localhost:4200".to_string(), // Angular dev server
                "http://127.0.0.1:3000".to_string(),
            ],
            admin_email: None,
            admin_password: None,
        }
    }
}

fn parse_or<T: std::str::FromStr>(key: &str, fallback: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(fallback)
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let default = Self::default();

        Self {
            database_url: env::var("DATABASE_URL").unwrap_or(default.database_url),
            // Fallback for dev convenience, strictly enforced in production()
            jwt_secret: env::var("JWT_SECRET").unwrap_or(default.jwt_secret),
            token_ttl_hours: parse_or("TOKEN_TTL_HOURS", default.token_ttl_hours),
            public_base_url: env::var("PUBLIC_BASE_URL").unwrap_or(default.public_base_url),
            upload_root: env::var("UPLOAD_ROOT").unwrap_or(default.upload_root),
            upload_path: env::var("UPLOAD_PATH")
                .map(|v| v.trim_matches('/').to_string())
                .unwrap_or(default.upload_path),
            max_file_size: parse_or("MAX_FILE_SIZE", default.max_file_size),
            full_image_size: parse_or("FULL_IMAGE_SIZE", default.full_image_size),
            thumbnail_size: parse_or("THUMBNAIL_SIZE", default.thumbnail_size),
            default_page_size: parse_or("DEFAULT_PAGE_SIZE", default.default_page_size),
            max_page_size: parse_or("MAX_PAGE_SIZE", default.max_page_size).max(1),
            storage_backend: env::var("STORAGE_BACKEND")
                .map(|v| v.to_lowercase())
                .unwrap_or(default.storage_backend),
            s3_endpoint: env::var("S3_ENDPOINT").ok(),
            s3_access_key: env::var("S3_ACCESS_KEY").ok(),
            s3_secret_key: env::var("S3_SECRET_KEY").ok(),
            s3_bucket: env::var("S3_BUCKET").unwrap_or(default.s3_bucket),
            allowed_origins: env::var("ALLOWED_ORIGINS")
                .ok()
                .map(|v| v.split(',').map(|s| s.trim().to_string()).collect())
                .unwrap_or(default.allowed_origins),
            admin_email: env::var("ADMIN_EMAIL").ok(),
            admin_password: env::var("ADMIN_PASSWORD").ok(),
        }
    }

    /// Create config for development (temp-friendly paths, relaxed limits)
    pub fn development() -> Self {
        Self {
            database_url: "sqlite::memory:".to_string(),
            max_file_size: 50 * 1024 * 1024,
            max_page_size: 1000,
            ..Self::default()
        }
    }

    /// Create config for production (secret must be provided)
    pub fn production() -> Self {
        Self {
            jwt_secret: env::var("JWT_SECRET").expect("CRITICAL: JWT_SECRET must be set"),
            ..Self::from_env()
        }
    }

    /// Clamp the requested page to the configured bounds
    pub fn page(&self, offset: Option<u64>, limit: Option<u64>) -> (u64, u64) {
        let limit = limit
            .unwrap_or(self.default_page_size)
            .min(self.max_page_size)
            .max(1);
        (offset.unwrap_or(0), limit)
    }

    /// Public link of a collectible slug
    pub fn collectible_link(&self, url: &str) -> String {
        format!("{}/c/{}", self.public_base_url.trim_end_matches('/'), url)
    }
}

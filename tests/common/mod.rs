#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode},
};
use collectibles_backend::config::AppConfig;
use collectibles_backend::infrastructure::database;
use collectibles_backend::models::Role;
use collectibles_backend::services::storage::StorageService;
use collectibles_backend::services::user_service::NewUser;
use collectibles_backend::utils::auth::create_jwt;
use collectibles_backend::{AppState, create_app};
use http_body_util::BodyExt;
use image::{DynamicImage, ImageBuffer, ImageOutputFormat, Rgb};
use sea_orm::Database;
use serde_json::Value;
use std::collections::HashMap;
use std::io::Cursor;
use std::sync::{Arc, Mutex};
use tower::ServiceExt;

pub const BOUNDARY: &str = "---------------------------123456789012345678901234567";

pub struct MockStorageService {
    pub files: Mutex<HashMap<String, Vec<u8>>>,
}

impl MockStorageService {
    pub fn new() -> Self {
        Self {
            files: Mutex::new(HashMap::new()),
        }
    }

    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.files.lock().unwrap().keys().cloned().collect();
        keys.sort();
        keys
    }
}

#[async_trait]
impl StorageService for MockStorageService {
    async fn upload_file(&self, key: &str, data: Vec<u8>) -> anyhow::Result<()> {
        self.files.lock().unwrap().insert(key.to_string(), data);
        Ok(())
    }

    async fn get_file(&self, key: &str) -> anyhow::Result<Vec<u8>> {
        self.files
            .lock()
            .unwrap()
            .get(key)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("Key not found"))
    }

    async fn delete_file(&self, key: &str) -> anyhow::Result<()> {
        self.files.lock().unwrap().remove(key);
        Ok(())
    }

    async fn file_exists(&self, key: &str) -> anyhow::Result<bool> {
        Ok(self.files.lock().unwrap().contains_key(key))
    }

    fn locate(&self, key: &str) -> String {
        format!("mock-bucket/{}", key)
    }
}

pub struct TestApp {
    pub app: Router,
    pub state: AppState,
    pub storage: Arc<MockStorageService>,
}

pub async fn setup() -> TestApp {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    database::run_migrations(&db).await.unwrap();

    let storage = Arc::new(MockStorageService::new());
    let config = AppConfig {
        public_base_url: "https://catalogue.test/".to_string(),
        full_image_size: 64,
        thumbnail_size: 16,
        ..AppConfig::development()
    };
    let state = AppState::new(db, storage.clone(), config);

    TestApp {
        app: create_app(state.clone()),
        state,
        storage,
    }
}

impl TestApp {
    pub async fn send(
        &self,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header("Authorization", format!("Bearer {}", token));
        }
        let request = match body {
            Some(json) => builder
                .header("Content-Type", "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, json)
    }

    /// Raw GET returning status, content type and body bytes
    pub async fn fetch(&self, uri: &str, token: Option<&str>) -> (StatusCode, String, Vec<u8>) {
        let mut builder = Request::builder().method("GET").uri(uri);
        if let Some(token) = token {
            builder = builder.header("Authorization", format!("Bearer {}", token));
        }
        let response = self
            .app
            .clone()
            .oneshot(builder.body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let content_type = response
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, content_type, bytes.to_vec())
    }

    /// Registers a regular account, returning `(token, user_id)`
    pub async fn register(&self, email: &str, alias: &str) -> (String, String) {
        let (status, json) = self
            .send(
                "POST",
                "/auth/register",
                None,
                Some(serde_json::json!({
                    "email": email,
                    "password": "correct horse",
                    "alias": alias,
                    "name": { "first": "Test", "last": alias }
                })),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "register failed: {}", json);
        (
            json["data"]["token"].as_str().unwrap().to_string(),
            json["data"]["user"]["id"].as_str().unwrap().to_string(),
        )
    }

    /// Creates an admin directly through the service layer
    pub async fn admin(&self) -> (String, String) {
        let user = self
            .state
            .user_service
            .create(NewUser {
                alias: Some("curator".to_string()),
                email: "curator@catalogue.test".to_string(),
                password: "admin password".to_string(),
                roles: vec![Role::Admin, Role::User],
                ..NewUser::default()
            })
            .await
            .unwrap();
        let token = create_jwt(&user.id, &self.state.config.jwt_secret, 1).unwrap();
        (token, user.id)
    }

    pub async fn upload(
        &self,
        owner: &str,
        token: Option<&str>,
        filename: &str,
        data: &[u8],
        public: Option<bool>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder()
            .method("POST")
            .uri(format!("/user/{}/file", owner))
            .header(
                "Content-Type",
                format!("multipart/form-data; boundary={}", BOUNDARY),
            );
        if let Some(token) = token {
            builder = builder.header("Authorization", format!("Bearer {}", token));
        }
        let body = multipart_body(filename, data, public);

        let response = self
            .app
            .clone()
            .oneshot(builder.body(Body::from(body)).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }

    /// Uploads a small PNG and returns the new file id
    pub async fn upload_png(&self, owner: &str, token: &str, filename: &str) -> String {
        let (status, json) = self
            .upload(owner, Some(token), filename, &png(40, 20), None)
            .await;
        assert_eq!(status, StatusCode::OK, "upload failed: {}", json);
        json["data"]["id"].as_str().unwrap().to_string()
    }
}

pub fn multipart_body(filename: &str, data: &[u8], public: Option<bool>) -> Vec<u8> {
    let mut body = Vec::new();
    if let Some(public) = public {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"public\"\r\n\r\n{public}\r\n"
            )
            .as_bytes(),
        );
    }
    body.extend_from_slice(
        format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{filename}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
    body
}

pub fn png(width: u32, height: u32) -> Vec<u8> {
    let img = ImageBuffer::from_pixel(width, height, Rgb([12u8, 120, 200]));
    let mut out = Vec::new();
    DynamicImage::ImageRgb8(img)
        .write_to(&mut Cursor::new(&mut out), ImageOutputFormat::Png)
        .unwrap();
    out
}

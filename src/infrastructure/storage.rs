use crate::config::AppConfig;
use crate::services::storage::{LocalStorageService, S3StorageService, StorageService};
use anyhow::{Context, Result};
use aws_sdk_s3::config::Region;
use std::sync::Arc;
use tracing::info;

/// Build the configured storage backend
pub async fn setup_storage(config: &AppConfig) -> Result<Arc<dyn StorageService>> {
    match config.storage_backend.as_str() {
        "s3" => Ok(Arc::new(setup_s3(config).await?)),
        "local" => {
            tokio::fs::create_dir_all(&config.upload_root)
                .await
                .with_context(|| format!("Cannot create upload root '{}'", config.upload_root))?;
            info!("📁 Local Storage: {}", config.upload_root);
            Ok(Arc::new(LocalStorageService::new(&config.upload_root)))
        }
        other => anyhow::bail!("Unknown STORAGE_BACKEND '{}' (expected local or s3)", other),
    }
}

async fn setup_s3(config: &AppConfig) -> Result<S3StorageService> {
    let endpoint_url = config
        .s3_endpoint
        .clone()
        .context("S3_ENDPOINT must be set for the s3 backend")?;
    let access_key = config
        .s3_access_key
        .clone()
        .context("S3_ACCESS_KEY must be set for the s3 backend")?;
    let secret_key = config
        .s3_secret_key
        .clone()
        .context("S3_SECRET_KEY must be set for the s3 backend")?;
    let bucket = config.s3_bucket.clone();

    info!("☁️  S3 Storage: {} (Bucket: {})", endpoint_url, bucket);

    let aws_config = aws_config::from_env()
        .endpoint_url(&endpoint_url)
        .region(Region::new("us-east-1"))
        .credentials_provider(aws_sdk_s3::config::Credentials::new(
            access_key, secret_key, None, None, "static",
        ))
        .load()
        .await;

    let s3_config = aws_sdk_s3::config::Builder::from(&aws_config)
        .force_path_style(true)
        .build();

    let s3_client = aws_sdk_s3::Client::from_conf(s3_config);

    match s3_client.head_bucket().bucket(&bucket).send().await {
        Ok(_) => info!("✅ Bucket '{}' is ready", bucket),
        Err(_) => {
            info!("🪣 Bucket '{}' not found, creating...", bucket);
            if let Err(e) = s3_client.create_bucket().bucket(&bucket).send().await {
                tracing::error!("❌ Failed to create bucket '{}': {}", bucket, e);
            } else {
                info!("✅ Bucket '{}' created successfully", bucket);
            }
        }
    }

    Ok(S3StorageService::new(s3_client, bucket))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_local_backend_creates_root() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("uploads");
        let config = AppConfig {
            upload_root: root.to_string_lossy().to_string(),
            ..AppConfig::default()
        };
        let storage = setup_storage(&config).await.unwrap();
        assert!(root.is_dir());
        assert!(!storage.file_exists("u1/a.png").await.unwrap());
    }

    #[tokio::test]
    async fn test_unknown_backend_is_rejected() {
        let config = AppConfig {
            storage_backend: "ftp".to_string(),
            ..AppConfig::default()
        };
        assert!(setup_storage(&config).await.is_err());
    }

    #[tokio::test]
    async fn test_s3_requires_credentials() {
        let config = AppConfig {
            storage_backend: "s3".to_string(),
            ..AppConfig::default()
        };
        assert!(setup_storage(&config).await.is_err());
    }
}

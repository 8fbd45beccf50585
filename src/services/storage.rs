use anyhow::{Result, anyhow};
use async_trait::async_trait;
use aws_sdk_s3::Client;
use aws_sdk_s3::primitives::ByteStream;
use std::path::{Component, Path, PathBuf};

/// Blob store for uploaded images. Keys are `/` separated relative paths
/// such as `{user_id}/thumb/{name}.jpg`.
#[async_trait]
pub trait StorageService: Send + Sync {
    async fn upload_file(&self, key: &str, data: Vec<u8>) -> Result<()>;
    async fn get_file(&self, key: &str) -> Result<Vec<u8>>;
    async fn delete_file(&self, key: &str) -> Result<()>;
    async fn file_exists(&self, key: &str) -> Result<bool>;
    /// Human readable location of a key (filesystem path or bucket/key)
    fn locate(&self, key: &str) -> String;
}

/// Rejects keys that could escape the storage root
pub fn validate_key(key: &str) -> Result<()> {
    let path = Path::new(key);
    if key.is_empty()
        || path
            .components()
            .any(|c| !matches!(c, Component::Normal(_)))
    {
        return Err(anyhow!("Invalid storage key: {}", key));
    }
    Ok(())
}

/// Stores objects under a directory on the local filesystem,
/// one sub-directory per user.
pub struct LocalStorageService {
    root: PathBuf,
}

impl LocalStorageService {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, key: &str) -> Result<PathBuf> {
        validate_key(key)?;
        Ok(self.root.join(key))
    }
}

#[async_trait]
impl StorageService for LocalStorageService {
    async fn upload_file(&self, key: &str, data: Vec<u8>) -> Result<()> {
        let path = self.resolve(key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, data).await?;
        Ok(())
    }

    async fn get_file(&self, key: &str) -> Result<Vec<u8>> {
        let path = self.resolve(key)?;
        Ok(tokio::fs::read(path).await?)
    }

    async fn delete_file(&self, key: &str) -> Result<()> {
        let path = self.resolve(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn file_exists(&self, key: &str) -> Result<bool> {
        let path = self.resolve(key)?;
        Ok(tokio::fs::try_exists(path).await?)
    }

    fn locate(&self, key: &str) -> String {
        let path = self.root.join(key);
        std::path::absolute(&path)
            .unwrap_or(path)
            .to_string_lossy()
            .to_string()
    }
}

pub struct S3StorageService {
    client: Client,
    bucket: String,
}

impl S3StorageService {
    pub fn new(client: Client, bucket: String) -> Self {
        Self { client, bucket }
    }
}

#[async_trait]
impl StorageService for S3StorageService {
    async fn upload_file(&self, key: &str, data: Vec<u8>) -> Result<()> {
        validate_key(key)?;
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(data))
            .send()
            .await?;
        Ok(())
    }

    async fn get_file(&self, key: &str) -> Result<Vec<u8>> {
        validate_key(key)?;
        let res = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await?;
        let data = res.body.collect().await?.to_vec();
        Ok(data)
    }

    async fn delete_file(&self, key: &str) -> Result<()> {
        validate_key(key)?;
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await?;
        Ok(())
    }

    async fn file_exists(&self, key: &str) -> Result<bool> {
        validate_key(key)?;
        let res = self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await;

        match res {
            Ok(_) => Ok(true),
            Err(e) => {
                let service_error = e.into_service_error();
                if service_error.is_not_found() {
                    Ok(false)
                } else {
                    Err(anyhow!(service_error))
                }
            }
        }
    }

    fn locate(&self, key: &str) -> String {
        format!("{}/{}", self.bucket, key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_key() {
        assert!(validate_key("user-1/thumb/a.jpg").is_ok());
        assert!(validate_key("").is_err());
        assert!(validate_key("../etc/passwd").is_err());
        assert!(validate_key("user-1/../../x").is_err());
        assert!(validate_key("/abs/path").is_err());
        assert!(validate_key("./a.jpg").is_err());
    }

    #[tokio::test]
    async fn test_local_storage_cycle() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorageService::new(dir.path());

        storage
            .upload_file("user-1/coin.png", b"abc".to_vec())
            .await
            .unwrap();
        assert!(storage.file_exists("user-1/coin.png").await.unwrap());
        assert_eq!(storage.get_file("user-1/coin.png").await.unwrap(), b"abc");
        assert!(dir.path().join("user-1").is_dir());
        assert!(storage.locate("user-1/coin.png").ends_with("coin.png"));

        storage.delete_file("user-1/coin.png").await.unwrap();
        assert!(!storage.file_exists("user-1/coin.png").await.unwrap());
        // Deleting twice is not an error
        storage.delete_file("user-1/coin.png").await.unwrap();
    }

    #[tokio::test]
    async fn test_local_storage_rejects_traversal() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorageService::new(dir.path());
        assert!(storage.upload_file("../escape.png", vec![1]).await.is_err());
        assert!(storage.get_file("a/../../etc/passwd").await.is_err());
    }
}

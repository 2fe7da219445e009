//! Object storage collaborator
//!
//! Uploads finalized recording artifacts to S3-compatible storage through
//! OpenDAL. Object keys are hashed so arbitrary owner/recording ids cannot
//! produce path traversal.

use async_trait::async_trait;
use bytes::Bytes;
use opendal::{services, Operator};
use sha2::{Digest, Sha256};

use crate::config::StorageConfig;
use crate::{Error, Result};

/// References returned by a successful artifact upload.
#[derive(Debug, Clone)]
pub struct UploadedArtifact {
    pub storage_ref: String,
    pub thumbnail_ref: Option<String>,
}

#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Upload a finalized artifact under `key`, returning the stored
    /// references.
    async fn upload(&self, key: &str, data: Bytes, content_type: &str) -> Result<UploadedArtifact>;
}

/// Hash storage key to prevent path traversal attacks
fn hash_key(key: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(key.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// OpenDAL-backed storage (S3 in production, Memory under test).
#[derive(Debug)]
pub struct OpendalStorage {
    operator: Operator,
    base_path: String,
    public_url_prefix: String,
}

impl OpendalStorage {
    pub fn from_config(config: &StorageConfig) -> Result<Self> {
        let operator = match config.backend.as_str() {
            "s3" => {
                let mut builder = services::S3::default()
                    .endpoint(&config.endpoint)
                    .access_key_id(&config.access_key_id)
                    .secret_access_key(&config.secret_access_key)
                    .bucket(&config.bucket);

                if let Some(region) = &config.region {
                    builder = builder.region(region);
                }

                Operator::new(builder)
                    .map_err(|e| Error::Internal(format!("failed to build s3 operator: {e}")))?
                    .finish()
            }
            "memory" => Operator::new(services::Memory::default())
                .map_err(|e| Error::Internal(format!("failed to build memory operator: {e}")))?
                .finish(),
            other => {
                return Err(Error::InvalidInput(format!(
                    "unknown storage backend: {other}"
                )))
            }
        };

        tracing::info!(backend = %config.backend, bucket = %config.bucket, "object storage initialized");

        Ok(Self {
            operator,
            base_path: config.base_path.clone(),
            public_url_prefix: config.public_url_prefix.clone(),
        })
    }

    /// In-memory storage, for tests and standalone runs.
    pub fn memory() -> Result<Self> {
        Self::from_config(&StorageConfig {
            backend: "memory".to_string(),
            ..StorageConfig::default()
        })
    }

    fn object_key(&self, key: &str) -> String {
        let hashed = hash_key(key);
        if self.base_path.is_empty() {
            hashed
        } else {
            format!("{}{}", self.base_path, hashed)
        }
    }
}

#[async_trait]
impl ObjectStorage for OpendalStorage {
    async fn upload(&self, key: &str, data: Bytes, content_type: &str) -> Result<UploadedArtifact> {
        let object_key = self.object_key(key);
        let size = data.len();

        self.operator
            .write_with(&object_key, data)
            .content_type(content_type)
            .await
            .map_err(|e| Error::Upload(format!("object write failed: {e}")))?;

        tracing::debug!(key, object_key = %object_key, size, "artifact uploaded");

        let storage_ref = if self.public_url_prefix.is_empty() {
            object_key
        } else {
            format!("{}{}", self.public_url_prefix, object_key)
        };

        Ok(UploadedArtifact {
            storage_ref,
            thumbnail_ref: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_upload_returns_hashed_ref() {
        let storage = OpendalStorage::memory().unwrap();
        let uploaded = storage
            .upload("u1/rec1", Bytes::from_static(b"abc"), "video/webm")
            .await
            .unwrap();

        assert!(uploaded.storage_ref.starts_with("recordings/"));
        assert!(!uploaded.storage_ref.contains("u1/rec1"));
        assert!(uploaded.thumbnail_ref.is_none());
    }

    #[tokio::test]
    async fn test_public_url_prefix_applied() {
        let storage = OpendalStorage::from_config(&StorageConfig {
            backend: "memory".to_string(),
            public_url_prefix: "https://cdn.example.com/".to_string(),
            ..StorageConfig::default()
        })
        .unwrap();

        let uploaded = storage
            .upload("u1/rec1", Bytes::from_static(b"abc"), "video/webm")
            .await
            .unwrap();
        assert!(uploaded.storage_ref.starts_with("https://cdn.example.com/recordings/"));
    }

    #[test]
    fn test_unknown_backend_rejected() {
        let err = OpendalStorage::from_config(&StorageConfig {
            backend: "ftp".to_string(),
            ..StorageConfig::default()
        })
        .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[test]
    fn test_hash_key_is_stable() {
        assert_eq!(hash_key("a"), hash_key("a"));
        assert_ne!(hash_key("a"), hash_key("b"));
    }
}

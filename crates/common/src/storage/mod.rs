//! Object storage abstraction
//!
//! The durable store keeps original document bytes and issues access URLs.
//! Provides a Supabase-storage-compatible HTTP client and an in-memory mock
//! for tests.

use crate::errors::{AppError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Trait for binary object storage with signed-URL issuance
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Download the raw bytes stored under `key`
    async fn download(&self, key: &str) -> Result<Vec<u8>>;

    /// Create a time-limited access URL for `key`
    async fn create_signed_url(&self, key: &str, ttl_secs: u64) -> Result<String>;

    /// Permanent public URL for `key` (no access check; used as source_url metadata)
    fn get_public_url(&self, key: &str) -> String;
}

/// Supabase-storage HTTP client
pub struct SupabaseStorage {
    client: reqwest::Client,
    base_url: String,
    service_key: String,
    bucket: String,
}

#[derive(Serialize)]
struct SignRequest {
    #[serde(rename = "expiresIn")]
    expires_in: u64,
}

#[derive(Deserialize)]
struct SignResponse {
    #[serde(rename = "signedURL")]
    signed_url: String,
}

impl SupabaseStorage {
    pub fn new(base_url: &str, service_key: &str, bucket: &str, timeout_secs: u64) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| AppError::Configuration {
                message: format!("failed to build storage client: {}", e),
            })?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            service_key: service_key.to_string(),
            bucket: bucket.to_string(),
        })
    }

    fn object_url(&self, key: &str) -> String {
        format!("{}/storage/v1/object/{}/{}", self.base_url, self.bucket, key)
    }
}

#[async_trait]
impl ObjectStorage for SupabaseStorage {
    async fn download(&self, key: &str) -> Result<Vec<u8>> {
        let response = self
            .client
            .get(self.object_url(key))
            .bearer_auth(&self.service_key)
            .header("apikey", &self.service_key)
            .send()
            .await
            .map_err(|e| AppError::DownloadFailed {
                message: e.to_string(),
            })?;

        if !response.status().is_success() {
            return Err(AppError::DownloadFailed {
                message: format!("status {}", response.status()),
            });
        }

        let bytes = response.bytes().await.map_err(|e| AppError::DownloadFailed {
            message: e.to_string(),
        })?;

        Ok(bytes.to_vec())
    }

    async fn create_signed_url(&self, key: &str, ttl_secs: u64) -> Result<String> {
        let url = format!(
            "{}/storage/v1/object/sign/{}/{}",
            self.base_url, self.bucket, key
        );

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.service_key)
            .header("apikey", &self.service_key)
            .json(&SignRequest {
                expires_in: ttl_secs,
            })
            .send()
            .await
            .map_err(|e| AppError::SignedUrlFailed {
                message: e.to_string(),
            })?;

        if !response.status().is_success() {
            return Err(AppError::SignedUrlFailed {
                message: format!("status {}", response.status()),
            });
        }

        let signed: SignResponse =
            response.json().await.map_err(|e| AppError::SignedUrlFailed {
                message: e.to_string(),
            })?;

        // The API returns a path relative to /storage/v1
        Ok(format!("{}/storage/v1{}", self.base_url, signed.signed_url))
    }

    fn get_public_url(&self, key: &str) -> String {
        format!(
            "{}/storage/v1/object/public/{}/{}",
            self.base_url, self.bucket, key
        )
    }
}

/// In-memory storage for tests
#[derive(Default)]
pub struct MockStorage {
    objects: std::sync::Mutex<std::collections::HashMap<String, Vec<u8>>>,
    fail_signing: std::sync::atomic::AtomicBool,
}

impl MockStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&self, key: &str, bytes: Vec<u8>) {
        self.objects.lock().unwrap().insert(key.to_string(), bytes);
    }

    /// Make subsequent create_signed_url calls fail
    pub fn fail_signing(&self, fail: bool) {
        self.fail_signing
            .store(fail, std::sync::atomic::Ordering::SeqCst);
    }
}

#[async_trait]
impl ObjectStorage for MockStorage {
    async fn download(&self, key: &str) -> Result<Vec<u8>> {
        self.objects
            .lock()
            .unwrap()
            .get(key)
            .cloned()
            .ok_or_else(|| AppError::DownloadFailed {
                message: format!("no object at {}", key),
            })
    }

    async fn create_signed_url(&self, key: &str, ttl_secs: u64) -> Result<String> {
        if self.fail_signing.load(std::sync::atomic::Ordering::SeqCst) {
            return Err(AppError::SignedUrlFailed {
                message: "signing disabled".into(),
            });
        }
        Ok(format!("https://mock.storage/signed/{}?ttl={}", key, ttl_secs))
    }

    fn get_public_url(&self, key: &str) -> String {
        format!("https://mock.storage/public/{}", key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_roundtrip() {
        let storage = MockStorage::new();
        storage.put("reports/q3.pdf", b"pdf bytes".to_vec());

        let bytes = storage.download("reports/q3.pdf").await.unwrap();
        assert_eq!(bytes, b"pdf bytes");

        let url = storage.create_signed_url("reports/q3.pdf", 600).await.unwrap();
        assert!(url.contains("reports/q3.pdf"));
        assert!(url.contains("ttl=600"));
    }

    #[tokio::test]
    async fn test_mock_missing_object() {
        let storage = MockStorage::new();
        let err = storage.download("nope").await.unwrap_err();
        assert_eq!(err.stage(), "storage.download");
    }

    #[tokio::test]
    async fn test_mock_signing_failure() {
        let storage = MockStorage::new();
        storage.fail_signing(true);
        assert!(storage.create_signed_url("k", 60).await.is_err());
    }
}

//! Image storage backends.
//!
//! Posts keep both the public URL and the storage key of every image so that
//! deleting a post can remove the hosted files later.

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::Utc;
use iftar_common::{AppError, AppResult};
use image::ImageFormat;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;

/// An image accepted by a storage backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredImage {
    /// Key used to delete the image later.
    pub key: String,
    /// Public URL of the image.
    pub url: String,
}

/// Storage backend trait for image operations.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Upload image data under `key`.
    async fn upload(&self, key: &str, data: &[u8], content_type: &str) -> AppResult<StoredImage>;

    /// Delete an image by its storage key.
    async fn delete(&self, key: &str) -> AppResult<()>;

    /// Backend name for logs and health output.
    fn name(&self) -> &'static str;
}

/// Type alias for the storage service.
pub type StorageService = Arc<dyn StorageBackend>;

/// Image formats accepted for upload.
const ACCEPTED_FORMATS: [ImageFormat; 4] = [
    ImageFormat::Jpeg,
    ImageFormat::Png,
    ImageFormat::Gif,
    ImageFormat::WebP,
];

/// Detect the format of an uploaded image from its leading bytes.
///
/// Only JPEG, PNG, GIF and WebP are accepted.
pub fn sniff_image_format(data: &[u8]) -> AppResult<ImageFormat> {
    let format = image::guess_format(data)
        .map_err(|_| AppError::InvalidOperation("File is not a recognized image".to_string()))?;

    if ACCEPTED_FORMATS.contains(&format) {
        Ok(format)
    } else {
        Err(AppError::InvalidOperation(format!(
            "Unsupported image format: {}",
            format.to_mime_type()
        )))
    }
}

/// Generate a storage key for an image.
#[must_use]
pub fn generate_storage_key(image_id: &str, format: ImageFormat) -> String {
    let extension = format.extensions_str().first().copied().unwrap_or("bin");
    format!("{image_id}.{extension}")
}

/// Local filesystem storage backend.
#[derive(Clone)]
pub struct LocalStorage {
    /// Base directory for storing files.
    base_path: PathBuf,
    /// Base URL the directory is served under.
    base_url: String,
}

impl LocalStorage {
    /// Create a new local storage backend.
    #[must_use]
    pub const fn new(base_path: PathBuf, base_url: String) -> Self {
        Self {
            base_path,
            base_url,
        }
    }

    fn public_url(&self, key: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), key)
    }

    /// Resolve a key inside the base directory, rejecting path traversal.
    fn get_path(&self, key: &str) -> AppResult<PathBuf> {
        if key.is_empty() || key.split('/').any(|part| part.is_empty() || part == "..") {
            return Err(AppError::InvalidOperation(format!(
                "Invalid storage key: {key}"
            )));
        }
        Ok(self.base_path.join(key))
    }
}

#[async_trait]
impl StorageBackend for LocalStorage {
    async fn upload(&self, key: &str, data: &[u8], _content_type: &str) -> AppResult<StoredImage> {
        let path = self.get_path(key)?;

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                AppError::UpstreamService(format!("Failed to create directory: {e}"))
            })?;
        }

        tokio::fs::write(&path, data)
            .await
            .map_err(|e| AppError::UpstreamService(format!("Failed to write file: {e}")))?;

        debug!(key = %key, size = data.len(), "Stored image locally");

        Ok(StoredImage {
            key: key.to_string(),
            url: self.public_url(key),
        })
    }

    async fn delete(&self, key: &str) -> AppResult<()> {
        let path = self.get_path(key)?;

        if tokio::fs::try_exists(&path).await.unwrap_or(false) {
            tokio::fs::remove_file(&path)
                .await
                .map_err(|e| AppError::UpstreamService(format!("Failed to delete file: {e}")))?;
        }

        Ok(())
    }

    fn name(&self) -> &'static str {
        "local"
    }
}

/// Cloudinary settings.
#[derive(Debug, Clone)]
pub struct CloudinaryConfig {
    /// Cloud name.
    pub cloud_name: String,
    /// API key.
    pub api_key: String,
    /// API secret.
    pub api_secret: String,
    /// Upload folder.
    pub folder: String,
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    public_id: String,
    secure_url: String,
}

#[derive(Debug, Deserialize)]
struct DestroyResponse {
    result: String,
}

/// Cloudinary image hosting backend.
///
/// Requests are signed with SHA-256, so the account must have SHA-256
/// signatures enabled.
#[derive(Clone)]
pub struct CloudinaryStorage {
    config: CloudinaryConfig,
    http_client: reqwest::Client,
    api_base: String,
}

impl CloudinaryStorage {
    /// Create a new Cloudinary backend.
    #[must_use]
    pub fn new(config: CloudinaryConfig) -> Self {
        let api_base = format!(
            "https://api.cloudinary.com/v1_1/{}/image",
            config.cloud_name
        );
        Self {
            config,
            http_client: reqwest::Client::new(),
            api_base,
        }
    }

    /// Sign request parameters.
    ///
    /// Parameters are sorted by name, joined as `k=v` with `&`, suffixed with
    /// the API secret and hashed.
    fn sign(&self, params: &[(&str, &str)]) -> String {
        let mut sorted = params.to_vec();
        sorted.sort_by(|a, b| a.0.cmp(b.0));

        let joined = sorted
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join("&");

        let mut hasher = Sha256::new();
        hasher.update(joined.as_bytes());
        hasher.update(self.config.api_secret.as_bytes());
        hex::encode(hasher.finalize())
    }

    /// Public ID for a storage key (Cloudinary appends the extension itself).
    fn public_id(key: &str) -> &str {
        key.rsplit_once('.').map_or(key, |(stem, _)| stem)
    }
}

#[async_trait]
impl StorageBackend for CloudinaryStorage {
    async fn upload(&self, key: &str, data: &[u8], content_type: &str) -> AppResult<StoredImage> {
        let timestamp = Utc::now().timestamp().to_string();
        let public_id = Self::public_id(key);
        let signature = self.sign(&[
            ("folder", self.config.folder.as_str()),
            ("public_id", public_id),
            ("timestamp", timestamp.as_str()),
        ]);
        let file = format!("data:{content_type};base64,{}", STANDARD.encode(data));

        let response = self
            .http_client
            .post(format!("{}/upload", self.api_base))
            .form(&[
                ("file", file.as_str()),
                ("api_key", self.config.api_key.as_str()),
                ("timestamp", timestamp.as_str()),
                ("folder", self.config.folder.as_str()),
                ("public_id", public_id),
                ("signature", signature.as_str()),
                ("signature_algorithm", "sha256"),
            ])
            .send()
            .await
            .map_err(|e| AppError::UpstreamService(format!("Image upload failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::UpstreamService(format!(
                "Image upload rejected ({status}): {body}"
            )));
        }

        let uploaded: UploadResponse = response
            .json()
            .await
            .map_err(|e| AppError::UpstreamService(format!("Invalid upload response: {e}")))?;

        debug!(public_id = %uploaded.public_id, "Uploaded image to Cloudinary");

        Ok(StoredImage {
            key: uploaded.public_id,
            url: uploaded.secure_url,
        })
    }

    async fn delete(&self, key: &str) -> AppResult<()> {
        let timestamp = Utc::now().timestamp().to_string();
        let signature = self.sign(&[("public_id", key), ("timestamp", timestamp.as_str())]);

        let response = self
            .http_client
            .post(format!("{}/destroy", self.api_base))
            .form(&[
                ("public_id", key),
                ("api_key", self.config.api_key.as_str()),
                ("timestamp", timestamp.as_str()),
                ("signature", signature.as_str()),
                ("signature_algorithm", "sha256"),
            ])
            .send()
            .await
            .map_err(|e| AppError::UpstreamService(format!("Image delete failed: {e}")))?;

        let destroyed: DestroyResponse = response
            .json()
            .await
            .map_err(|e| AppError::UpstreamService(format!("Invalid delete response: {e}")))?;

        // "not found" means the image is already gone.
        match destroyed.result.as_str() {
            "ok" | "not found" => Ok(()),
            other => Err(AppError::UpstreamService(format!(
                "Image delete failed: {other}"
            ))),
        }
    }

    fn name(&self) -> &'static str {
        "cloudinary"
    }
}

/// No-op storage backend for tests.
#[derive(Clone, Default)]
pub struct NoOpStorage {
    base_url: String,
}

impl NoOpStorage {
    /// Create a new no-op storage backend.
    #[must_use]
    pub const fn new(base_url: String) -> Self {
        Self { base_url }
    }
}

#[async_trait]
impl StorageBackend for NoOpStorage {
    async fn upload(&self, key: &str, _data: &[u8], _content_type: &str) -> AppResult<StoredImage> {
        Ok(StoredImage {
            key: key.to_string(),
            url: format!("{}/{}", self.base_url, key),
        })
    }

    async fn delete(&self, _key: &str) -> AppResult<()> {
        Ok(())
    }

    fn name(&self) -> &'static str {
        "noop"
    }
}

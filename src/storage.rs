use async_trait::async_trait;
use log::{error, info};
use sha2::{Digest, Sha256};
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

use crate::forms::ValidImage;

/// Key prefix for post attachments.
pub const POSTS_PREFIX: &str = "posts";

#[derive(Debug, Error)]
pub enum ImageStoreError {
    #[error("duplicate")]
    Duplicate,
    #[error("not_found")]
    NotFound,
    #[error("other: {0}")]
    Other(String),
}

/// Content-addressed blob store for post images. Keys look like
/// `posts/<sha256>.<ext>`.
#[async_trait]
pub trait ImageStore: Send + Sync {
    async fn save(&self, key: &str, mime: &str, bytes: &[u8]) -> Result<(), ImageStoreError>;
    async fn load(&self, key: &str) -> Result<(Vec<u8>, String), ImageStoreError>;
    async fn delete(&self, key: &str) -> Result<(), ImageStoreError>;
}

fn extension_for(mime: &str) -> &'static str {
    match mime {
        "image/png" => "png",
        "image/jpeg" => "jpg",
        "image/gif" => "gif",
        "image/webp" => "webp",
        "image/bmp" => "bmp",
        _ => "bin",
    }
}

pub fn media_key(bytes: &[u8], mime: &str) -> String {
    let hash = format!("{:x}", Sha256::digest(bytes));
    format!("{POSTS_PREFIX}/{hash}.{}", extension_for(mime))
}

/// Accepts only keys produced by [`media_key`], so a request path can never
/// escape the store.
pub fn is_valid_key(key: &str) -> bool {
    let Some(name) = key.strip_prefix(POSTS_PREFIX).and_then(|k| k.strip_prefix('/')) else {
        return false;
    };
    let Some((hash, ext)) = name.split_once('.') else { return false };
    hash.len() == 64
        && hash.bytes().all(|b| b.is_ascii_hexdigit())
        && !ext.is_empty()
        && ext.bytes().all(|b| b.is_ascii_alphanumeric())
}

pub fn sniff_mime(bytes: &[u8]) -> String {
    infer::get(bytes)
        .map(|t| t.mime_type().to_string())
        .unwrap_or_else(|| "application/octet-stream".into())
}

/// Stores a validated image and returns its key. Storing the same bytes twice
/// yields the same key.
pub async fn store_image(store: &dyn ImageStore, image: &ValidImage) -> Result<String, ImageStoreError> {
    let key = media_key(&image.bytes, image.mime);
    match store.save(&key, image.mime, &image.bytes).await {
        Ok(()) | Err(ImageStoreError::Duplicate) => Ok(key),
        Err(e) => Err(e),
    }
}

// ---------------- Local filesystem (default) ----------------
pub struct FsImageStore {
    root: PathBuf,
}

impl FsImageStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, ImageStoreError> {
        if !is_valid_key(key) {
            return Err(ImageStoreError::NotFound);
        }
        Ok(self.root.join(key))
    }
}

#[async_trait]
impl ImageStore for FsImageStore {
    async fn save(&self, key: &str, _mime: &str, bytes: &[u8]) -> Result<(), ImageStoreError> {
        let path = self.path_for(key).map_err(|_| ImageStoreError::Other(format!("invalid key {key}")))?;
        if tokio::fs::try_exists(&path).await.unwrap_or(false) {
            return Err(ImageStoreError::Duplicate);
        }
        if let Some(dir) = path.parent() {
            tokio::fs::create_dir_all(dir)
                .await
                .map_err(|e| ImageStoreError::Other(e.to_string()))?;
        }
        tokio::fs::write(&path, bytes).await.map_err(|e| {
            error!("write failed key={key} path={}: {e}", path.display());
            ImageStoreError::Other(e.to_string())
        })
    }
    async fn load(&self, key: &str) -> Result<(Vec<u8>, String), ImageStoreError> {
        let path = self.path_for(key)?;
        let bytes = match tokio::fs::read(&path).await {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Err(ImageStoreError::NotFound),
            Err(e) => return Err(ImageStoreError::Other(e.to_string())),
        };
        let mime = sniff_mime(&bytes);
        Ok((bytes, mime))
    }
    async fn delete(&self, key: &str) -> Result<(), ImageStoreError> {
        let path = self.path_for(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(ImageStoreError::Other(e.to_string())),
        }
    }
}

// ---------------- S3 / MinIO (feature = "s3-storage") ----------------
#[cfg(feature = "s3-storage")]
pub struct S3ImageStore {
    bucket: String,
    client: aws_sdk_s3::Client,
}

#[cfg(feature = "s3-storage")]
impl S3ImageStore {
    pub async fn from_env() -> anyhow::Result<Self> {
        use aws_credential_types::provider::SharedCredentialsProvider;
        use aws_credential_types::Credentials;

        let bucket = std::env::var("S3_BUCKET").unwrap_or_else(|_| "yatube-media".into());
        let endpoint = std::env::var("S3_ENDPOINT")
            .map_err(|_| anyhow::anyhow!("S3_ENDPOINT must be set for s3-storage"))?;
        let region = std::env::var("S3_REGION").unwrap_or_else(|_| "us-east-1".into());
        let access = std::env::var("S3_ACCESS_KEY").unwrap_or_default();
        let secret = std::env::var("S3_SECRET_KEY").unwrap_or_default();

        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(aws_sdk_s3::config::Region::new(region))
            .endpoint_url(endpoint);
        if !access.is_empty() && !secret.is_empty() {
            let creds = Credentials::new(access, secret, None, None, "static");
            loader = loader.credentials_provider(SharedCredentialsProvider::new(creds));
        }
        let conf = loader.load().await;
        // path-style addressing: MinIO endpoints have no wildcard DNS
        let s3_conf = aws_sdk_s3::config::Builder::from(&conf).force_path_style(true).build();
        let client = aws_sdk_s3::Client::from_conf(s3_conf);

        if client.head_bucket().bucket(&bucket).send().await.is_err() {
            client
                .create_bucket()
                .bucket(&bucket)
                .send()
                .await
                .map_err(|e| anyhow::anyhow!("failed to create bucket '{bucket}': {e}"))?;
            info!("created bucket '{bucket}'");
        }
        Ok(Self { bucket, client })
    }
}

#[cfg(feature = "s3-storage")]
#[async_trait]
impl ImageStore for S3ImageStore {
    async fn save(&self, key: &str, mime: &str, bytes: &[u8]) -> Result<(), ImageStoreError> {
        use aws_sdk_s3::primitives::ByteStream;
        if self.client.head_object().bucket(&self.bucket).key(key).send().await.is_ok() {
            return Err(ImageStoreError::Duplicate);
        }
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(mime)
            .body(ByteStream::from(bytes.to_vec()))
            .send()
            .await
            .map_err(|e| {
                error!("put_object failed key={key} bucket={}: {e:?}", self.bucket);
                ImageStoreError::Other(e.to_string())
            })?;
        Ok(())
    }
    async fn load(&self, key: &str) -> Result<(Vec<u8>, String), ImageStoreError> {
        if !is_valid_key(key) {
            return Err(ImageStoreError::NotFound);
        }
        let obj = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|_| ImageStoreError::NotFound)?;
        let data = obj.body.collect().await.map_err(|e| ImageStoreError::Other(e.to_string()))?;
        let bytes = data.into_bytes().to_vec();
        let mime = sniff_mime(&bytes);
        Ok((bytes, mime))
    }
    async fn delete(&self, key: &str) -> Result<(), ImageStoreError> {
        // missing objects count as deleted
        let _ = self.client.delete_object().bucket(&self.bucket).key(key).send().await;
        Ok(())
    }
}

pub async fn build_image_store(media_root: &std::path::Path) -> anyhow::Result<Arc<dyn ImageStore>> {
    #[cfg(feature = "s3-storage")]
    {
        let _ = media_root;
        let store = S3ImageStore::from_env().await?;
        info!("using S3 image store");
        Ok(Arc::new(store))
    }
    #[cfg(not(feature = "s3-storage"))]
    {
        info!("using filesystem image store at '{}'", media_root.display());
        Ok(Arc::new(FsImageStore::new(media_root)))
    }
}

//! Object storage for uploaded files
//!
//! Avatars and will-item media live in named buckets under keys of the form
//! `{user_id}/{file_id}.{ext}`. Uploading to an existing key replaces it.
//!
//! Example: the avatar of user `u1` uploaded as `me.png` is stored at
//! "avatars/u1/avatar.png".

use crate::error::{AppError, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

/// Bucketed file storage returning publicly resolvable URLs
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store `data` under `bucket/key`, replacing any previous object.
    /// Returns the object's public URL.
    async fn upload(
        &self,
        bucket: &str,
        key: &str,
        data: Vec<u8>,
        content_type: Option<&str>,
    ) -> Result<String>;

    /// URL at which `bucket/key` can be fetched
    fn public_url(&self, bucket: &str, key: &str) -> String;
}

/// Build `{user_id}/{stem}.{ext}`, taking the extension from `file_name`.
pub fn object_key(user_id: &str, stem: &str, file_name: &str) -> Result<String> {
    for part in [user_id, stem] {
        validate_segment(part)?;
    }

    let ext = Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .filter(|e| !e.is_empty() && e.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(str::to_ascii_lowercase)
        .unwrap_or_else(|| "bin".to_string());

    Ok(format!("{}/{}.{}", user_id, stem, ext))
}

fn validate_segment(segment: &str) -> Result<()> {
    let valid = !segment.is_empty()
        && segment != "."
        && segment != ".."
        && !segment.contains(['/', '\\']);

    if valid {
        Ok(())
    } else {
        Err(AppError::Storage(format!("Invalid object key segment: {:?}", segment)))
    }
}

/// Write `data` to a sibling temp file, then rename it over `path`.
///
/// Readers see either the old contents or the new ones, never a partial
/// write. Each call uses its own temp name, so concurrent writers of the
/// same path do not clobber each other's temp file. Parent directories are
/// created as needed.
pub(crate) async fn write_atomic(path: &Path, data: &[u8]) -> Result<()> {
    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }

    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| AppError::Storage(format!("Invalid file path: {:?}", path)))?;
    let temp_path = path.with_file_name(format!("{}.{}.tmp", file_name, Uuid::new_v4()));

    // Write to temp file first and flush it to disk
    let mut file = fs::File::create(&temp_path).await?;
    file.write_all(data).await?;
    file.sync_all().await?;

    // Swap it into place
    if let Err(e) = fs::rename(&temp_path, path).await {
        let _ = fs::remove_file(&temp_path).await;
        return Err(e.into());
    }

    Ok(())
}

/// Filesystem-backed object store for local mode
#[derive(Clone)]
pub struct LocalObjectStore {
    root: PathBuf,
    /// Prefix for returned URLs; `file://` paths when unset
    public_base: Option<String>,
}

impl LocalObjectStore {
    /// Create a new object store at the given root directory
    pub fn new(root: PathBuf) -> Self {
        Self {
            root,
            public_base: None,
        }
    }

    /// Serve URLs from `base` (e.g. a static file server over `root`)
    pub fn with_public_base(mut self, base: impl Into<String>) -> Self {
        self.public_base = Some(base.into().trim_end_matches('/').to_string());
        self
    }

    /// Initialize the store (create directory if needed)
    pub async fn initialize(&self) -> Result<()> {
        fs::create_dir_all(&self.root).await?;
        tracing::info!("Object store initialized at: {:?}", self.root);
        Ok(())
    }

    fn get_path(&self, bucket: &str, key: &str) -> Result<PathBuf> {
        validate_segment(bucket)?;

        let mut path = self.root.join(bucket);
        for segment in key.split('/') {
            validate_segment(segment)?;
            path.push(segment);
        }

        Ok(path)
    }
}

#[async_trait]
impl ObjectStore for LocalObjectStore {
    async fn upload(
        &self,
        bucket: &str,
        key: &str,
        data: Vec<u8>,
        content_type: Option<&str>,
    ) -> Result<String> {
        let path = self.get_path(bucket, key)?;

        // Replace any previous object in one step
        write_atomic(&path, &data).await?;

        tracing::debug!(
            "Wrote object: {}/{} ({} bytes, {})",
            bucket,
            key,
            data.len(),
            content_type.unwrap_or("application/octet-stream")
        );

        Ok(self.public_url(bucket, key))
    }

    fn public_url(&self, bucket: &str, key: &str) -> String {
        match &self.public_base {
            Some(base) => format!("{}/{}/{}", base, bucket, key),
            None => format!("file://{}", self.root.join(bucket).join(key).display()),
        }
    }
}

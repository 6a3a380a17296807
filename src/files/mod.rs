use std::path::{Path, PathBuf};

use async_trait::async_trait;
use axum::body::Bytes;
use chrono::Utc;
use tokio::fs;
use tracing::debug;
use uuid::Uuid;

use crate::error::AppError;

/// URL path under which uploaded files are served.
pub const UPLOADS_MOUNT: &str = "/uploads";

/// A file received with a student form, not yet persisted.
#[derive(Debug, Clone)]
pub struct Upload {
    pub original_name: Option<String>,
    pub bytes: Bytes,
}

pub fn public_path(filename: &str) -> String {
    format!("{}/{}", UPLOADS_MOUNT, filename)
}

#[async_trait]
pub trait FileStore: Send + Sync {
    /// Persists the upload and returns the generated filename.
    async fn save(&self, upload: &Upload) -> Result<String, AppError>;
    async fn remove(&self, filename: &str) -> Result<(), AppError>;
}

pub struct LocalFileStore {
    root: PathBuf,
}

impl LocalFileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, filename: &str) -> Result<PathBuf, AppError> {
        // Only bare names generated by `save` are accepted.
        let candidate = Path::new(filename);
        if filename.is_empty() || candidate.file_name() != Some(candidate.as_os_str()) {
            return Err(AppError::BadRequest(format!("invalid file name: {}", filename)));
        }
        Ok(self.root.join(candidate))
    }
}

#[async_trait]
impl FileStore for LocalFileStore {
    async fn save(&self, upload: &Upload) -> Result<String, AppError> {
        fs::create_dir_all(&self.root).await?;

        let filename = generate_filename(upload.original_name.as_deref());
        let path = self.resolve(&filename)?;
        fs::write(&path, &upload.bytes).await?;

        debug!("stored upload {} ({} bytes)", filename, upload.bytes.len());
        Ok(filename)
    }

    async fn remove(&self, filename: &str) -> Result<(), AppError> {
        let path = self.resolve(filename)?;
        fs::remove_file(&path).await?;
        debug!("removed upload {}", filename);
        Ok(())
    }
}

/// `<unix-millis>-<uuid>[.<ext>]`, keeping a short alphanumeric extension.
pub fn generate_filename(original_name: Option<&str>) -> String {
    let stem = format!("{}-{}", Utc::now().timestamp_millis(), Uuid::new_v4().simple());

    let extension = original_name
        .and_then(|name| Path::new(name).extension())
        .and_then(|ext| ext.to_str())
        .filter(|ext| !ext.is_empty() && ext.len() <= 10)
        .filter(|ext| ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(|ext| ext.to_ascii_lowercase());

    match extension {
        Some(ext) => format!("{}.{}", stem, ext),
        None => stem,
    }
}

//! Media store abstraction.
//!
//! Content entities hold opaque media references (`levels/<uuid>.png`), not
//! file bytes. The [`MediaStore`] trait is the contract the repository
//! services rely on; [`LocalMediaStore`] implements it over the local
//! filesystem. Deleting a missing reference is a no-op so post-commit
//! cleanup can always be retried safely.

use std::fmt;
use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::warn;
use uuid::Uuid;

use crate::config::storage::StorageConfig;

/// File extensions the store accepts, covering image and audio content.
pub const ALLOWED_EXTENSIONS: &[&str] = &[
    "png", "jpg", "jpeg", "gif", "webp", "mp3", "wav", "ogg", "m4a",
];

/// Abstract media storage backend.
///
/// `save` returns a stable reference; `delete` takes one back. Backends can
/// be swapped (local disk, object store) without touching business logic.
pub trait MediaStore: Send + Sync {
    /// Store file content under a category and return its reference.
    fn save<'a>(
        &'a self,
        category: &'a str,
        filename: &'a str,
        content: &'a [u8],
    ) -> std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<String, StorageError>> + Send + 'a>,
    >;

    /// Delete a file by reference. Idempotent: a missing file logs a
    /// warning and succeeds.
    fn delete<'a>(
        &'a self,
        reference: &'a str,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<(), StorageError>> + Send + 'a>>;
}

/// Best-effort post-commit cleanup. The DB rows are already gone, so a
/// failed file delete only strands bytes on disk; it is logged, never
/// surfaced.
pub async fn delete_refs<I>(store: &dyn MediaStore, refs: I)
where
    I: IntoIterator<Item = String>,
{
    for reference in refs {
        if let Err(e) = store.delete(&reference).await {
            warn!(reference, error = %e, "failed to delete media file");
        }
    }
}

#[derive(Debug)]
pub enum StorageError {
    InvalidFileSize { max_bytes: usize },
    InvalidExtension { received: String },
    InvalidReference(String),
    Io(std::io::Error),
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidFileSize { max_bytes } => {
                write!(f, "File exceeds maximum size of {} bytes", max_bytes)
            }
            Self::InvalidExtension { received } => {
                write!(
                    f,
                    "File type '{}' not allowed. Allowed types: {}",
                    received,
                    ALLOWED_EXTENSIONS.join(", ")
                )
            }
            Self::InvalidReference(msg) => write!(f, "Invalid media reference: {}", msg),
            Self::Io(e) => write!(f, "I/O error: {}", e),
        }
    }
}

impl std::error::Error for StorageError {}

impl From<std::io::Error> for StorageError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

/// Local filesystem media store. Files are written under
/// `<upload_dir>/<category>/<uuid>.<ext>`.
#[derive(Clone, Debug)]
pub struct LocalMediaStore {
    base_dir: PathBuf,
    max_file_size: usize,
}

impl LocalMediaStore {
    pub fn new(config: &StorageConfig) -> Self {
        Self {
            base_dir: config.upload_dir.clone(),
            max_file_size: config.max_file_size,
        }
    }

    /// Extract and allow-list the file extension of an uploaded filename.
    fn validate_extension(filename: &str) -> Result<String, StorageError> {
        let ext = Path::new(filename)
            .extension()
            .and_then(|s| s.to_str())
            .map(|s| s.to_lowercase())
            .unwrap_or_default();

        if !ALLOWED_EXTENSIONS.contains(&ext.as_str()) {
            return Err(StorageError::InvalidExtension { received: ext });
        }

        Ok(ext)
    }

    /// Reject references that are empty, absolute, traversing, or carry
    /// unexpected characters. References only ever come from our own
    /// `save`, so anything outside that shape is hostile or corrupt.
    pub fn validate_reference(reference: &str) -> Result<(), StorageError> {
        if reference.is_empty() || reference.contains("..") || reference.starts_with('/') {
            return Err(StorageError::InvalidReference(
                "reference must be a relative path without '..'".to_string(),
            ));
        }

        if !reference
            .chars()
            .all(|c| c.is_alphanumeric() || c == '-' || c == '_' || c == '/' || c == '.')
        {
            return Err(StorageError::InvalidReference(
                "reference contains invalid characters".to_string(),
            ));
        }

        Ok(())
    }
}

impl MediaStore for LocalMediaStore {
    fn save<'a>(
        &'a self,
        category: &'a str,
        filename: &'a str,
        content: &'a [u8],
    ) -> std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<String, StorageError>> + Send + 'a>,
    > {
        Box::pin(async move {
            let ext = Self::validate_extension(filename)?;

            if content.len() > self.max_file_size {
                return Err(StorageError::InvalidFileSize {
                    max_bytes: self.max_file_size,
                });
            }

            let reference = format!("{}/{}.{}", category, Uuid::new_v4().simple(), ext);
            Self::validate_reference(&reference)?;

            let file_path = self.base_dir.join(&reference);
            if let Some(parent) = file_path.parent() {
                fs::create_dir_all(parent).await?;
            }
            fs::write(&file_path, content).await?;

            Ok(reference)
        })
    }

    fn delete<'a>(
        &'a self,
        reference: &'a str,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<(), StorageError>> + Send + 'a>>
    {
        Box::pin(async move {
            Self::validate_reference(reference)?;

            let file_path = self.base_dir.join(reference);
            match fs::remove_file(&file_path).await {
                Ok(_) => Ok(()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    warn!(reference, "media file already absent, nothing to delete");
                    Ok(())
                }
                Err(e) => Err(e.into()),
            }
        })
    }
}

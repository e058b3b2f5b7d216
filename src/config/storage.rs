use std::env;
use std::path::PathBuf;

#[derive(Clone, Debug)]
pub struct StorageConfig {
    /// Root directory for uploaded media files.
    pub upload_dir: PathBuf,
    /// Maximum accepted upload size in bytes.
    pub max_file_size: usize,
}

impl StorageConfig {
    pub fn from_env() -> Self {
        Self {
            upload_dir: env::var("UPLOAD_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("./uploads")),
            max_file_size: env::var("MAX_UPLOAD_BYTES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(16 * 1024 * 1024), // 16MB
        }
    }
}

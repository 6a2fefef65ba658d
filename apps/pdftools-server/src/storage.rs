//! On-disk storage for uploaded and generated files

use std::io;
use std::path::{Path, PathBuf};

use chrono::Utc;
use tokio::fs;
use tracing::debug;
use uuid::Uuid;

use crate::config::ServerConfig;

#[derive(Debug, Clone)]
pub struct DiskStorage {
    upload_dir: PathBuf,
    output_dir: PathBuf,
}

/// A file written to disk
#[derive(Debug, Clone)]
pub struct StoredFile {
    pub stored_name: String,
    pub path: PathBuf,
    pub size: u64,
}

/// Extension of `name`, lowercased, if it is a plain alphanumeric one.
fn extension_of(name: &str) -> Option<String> {
    let (_, ext) = name.rsplit_once('.')?;
    if ext.is_empty() || ext.len() > 10 || !ext.chars().all(|c| c.is_ascii_alphanumeric()) {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

/// Collision-resistant file name: `{tag}-{unix_millis}-{uuid8}.{ext}`.
pub fn unique_name(tag: &str, extension: &str) -> String {
    let tag: String = tag
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
        .collect();
    let suffix = Uuid::new_v4().simple().to_string();
    format!(
        "{}-{}-{}.{}",
        tag,
        Utc::now().timestamp_millis(),
        &suffix[..8],
        extension
    )
}

impl DiskStorage {
    pub fn new(config: &ServerConfig) -> Self {
        Self {
            upload_dir: config.upload_dir.clone(),
            output_dir: config.output_dir.clone(),
        }
    }

    /// Create the upload and output directories if they are missing.
    pub async fn ensure_dirs(&self) -> io::Result<()> {
        fs::create_dir_all(&self.upload_dir).await?;
        fs::create_dir_all(&self.output_dir).await
    }

    async fn write(&self, dir: &Path, name: String, bytes: &[u8]) -> io::Result<StoredFile> {
        fs::create_dir_all(dir).await?;
        let path = dir.join(&name);
        fs::write(&path, bytes).await?;
        debug!("Wrote {} bytes to {}", bytes.len(), path.display());
        Ok(StoredFile {
            stored_name: name,
            path,
            size: bytes.len() as u64,
        })
    }

    pub async fn save_upload(&self, original_name: &str, bytes: &[u8]) -> io::Result<StoredFile> {
        let ext = extension_of(original_name).unwrap_or_else(|| "bin".to_string());
        let name = unique_name("upload", &ext);
        self.write(&self.upload_dir, name, bytes).await
    }

    pub async fn save_output(
        &self,
        tag: &str,
        extension: &str,
        bytes: &[u8],
    ) -> io::Result<StoredFile> {
        let name = unique_name(tag, extension);
        self.write(&self.output_dir, name, bytes).await
    }

    pub async fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        fs::read(path).await
    }

    pub async fn remove(&self, path: &Path) -> io::Result<()> {
        fs::remove_file(path).await
    }
}

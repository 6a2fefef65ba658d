//! Runtime configuration shared by the handlers and the job manager

use std::path::PathBuf;
use std::time::Duration;

/// Maximum number of files in one upload request
pub const MAX_FILES_PER_UPLOAD: usize = 10;

/// Maximum size of a single uploaded file (100 MiB)
pub const MAX_FILE_SIZE: usize = 100 * 1024 * 1024;

/// MIME types accepted by the upload endpoint
pub const ALLOWED_MIME_TYPES: &[&str] = &[
    "application/pdf",
    "application/msword",
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    "application/vnd.ms-powerpoint",
    "application/vnd.openxmlformats-officedocument.presentationml.presentation",
    "application/vnd.ms-excel",
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
    "image/jpeg",
    "image/jpg",
    "image/png",
    "text/html",
];

#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Directory for uploaded files
    pub upload_dir: PathBuf,
    /// Directory for files produced by jobs
    pub output_dir: PathBuf,
    pub max_files_per_upload: usize,
    pub max_file_size: usize,
    /// Jobs allowed to execute at the same time
    pub workers: usize,
    /// Jobs that may wait in the queue before submissions start failing
    pub queue_capacity: usize,
    /// Interval clients are told to wait between status polls
    pub poll_interval: Duration,
}

impl ServerConfig {
    pub fn new(upload_dir: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            upload_dir: upload_dir.into(),
            output_dir: output_dir.into(),
            max_files_per_upload: MAX_FILES_PER_UPLOAD,
            max_file_size: MAX_FILE_SIZE,
            workers: 4,
            queue_capacity: 1000,
            poll_interval: Duration::from_millis(2000),
        }
    }

    /// Request body limit for uploads: every file at its maximum size, plus
    /// room for multipart framing.
    pub fn body_limit(&self) -> usize {
        self.max_files_per_upload
            .saturating_mul(self.max_file_size)
            .saturating_add(1024 * 1024)
    }

    pub fn is_allowed_mime(mime: &str) -> bool {
        let essence = mime.split(';').next().unwrap_or_default().trim();
        ALLOWED_MIME_TYPES
            .iter()
            .any(|allowed| allowed.eq_ignore_ascii_case(essence))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mime_allow_list() {
        assert!(ServerConfig::is_allowed_mime("application/pdf"));
        assert!(ServerConfig::is_allowed_mime("text/html; charset=utf-8"));
        assert!(ServerConfig::is_allowed_mime("IMAGE/PNG"));
        assert!(!ServerConfig::is_allowed_mime("application/x-msdownload"));
        assert!(!ServerConfig::is_allowed_mime(""));
    }

    #[test]
    fn test_body_limit_covers_all_files() {
        let config = ServerConfig::new("u", "o");
        assert!(config.body_limit() > MAX_FILES_PER_UPLOAD * MAX_FILE_SIZE);
    }
}

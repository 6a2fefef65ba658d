//! File Registry
//!
//! Metadata for every uploaded or generated file. Each record lives in its
//! own `DashMap` entry, so updates are atomic per file and never visible
//! half-written to concurrent readers.

use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::storage::{DiskStorage, StoredFile};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileStatus {
    Uploaded,
    Processed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileRecord {
    pub id: Uuid,
    pub original_name: String,
    pub stored_name: String,
    /// MIME type
    pub file_type: String,
    /// Size in bytes
    pub file_size: u64,
    pub storage_path: PathBuf,
    pub status: FileStatus,
    #[serde(default)]
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

/// Everything about a file except what the registry assigns
#[derive(Debug, Clone)]
pub struct NewFile {
    pub original_name: String,
    pub file_type: String,
    pub stored: StoredFile,
    pub status: FileStatus,
    pub metadata: serde_json::Value,
}

pub struct FileRegistry {
    records: DashMap<Uuid, FileRecord>,
    storage: Arc<DiskStorage>,
}

impl FileRegistry {
    pub fn new(storage: Arc<DiskStorage>) -> Self {
        Self {
            records: DashMap::new(),
            storage,
        }
    }

    pub fn storage(&self) -> &DiskStorage {
        &self.storage
    }

    /// Register a stored file under a fresh id.
    pub fn create(&self, file: NewFile) -> FileRecord {
        let record = FileRecord {
            id: Uuid::new_v4(),
            original_name: file.original_name,
            stored_name: file.stored.stored_name,
            file_type: file.file_type,
            file_size: file.stored.size,
            storage_path: file.stored.path,
            status: file.status,
            metadata: file.metadata,
            created_at: Utc::now(),
        };
        self.records.insert(record.id, record.clone());
        record
    }

    pub fn get(&self, id: &Uuid) -> Option<FileRecord> {
        self.records.get(id).map(|r| r.value().clone())
    }

    /// All records, newest first.
    pub fn list(&self) -> Vec<FileRecord> {
        let mut records: Vec<FileRecord> =
            self.records.iter().map(|r| r.value().clone()).collect();
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        records
    }

    /// Flag a file as consumed by a completed job. Returns false for unknown ids.
    pub fn mark_processed(&self, id: &Uuid) -> bool {
        match self.records.get_mut(id) {
            Some(mut record) => {
                record.status = FileStatus::Processed;
                true
            }
            None => false,
        }
    }

    pub async fn read(&self, record: &FileRecord) -> io::Result<Vec<u8>> {
        self.storage.read(&record.storage_path).await
    }

    /// Remove a record. The metadata removal is authoritative; removing the
    /// bytes from disk is best-effort and only logged on failure.
    pub async fn delete(&self, id: &Uuid) -> Option<FileRecord> {
        let (_, record) = self.records.remove(id)?;
        match self.storage.remove(&record.storage_path).await {
            Ok(()) => info!("Deleted file {} ({})", record.id, record.original_name),
            Err(e) => warn!(
                "Removed file {} from the registry but could not delete {}: {}",
                record.id,
                record.storage_path.display(),
                e
            ),
        }
        Some(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServerConfig;
    use pretty_assertions::assert_eq;

    async fn registry() -> (tempfile::TempDir, FileRegistry) {
        let dir = tempfile::tempdir().unwrap();
        let config = ServerConfig::new(dir.path().join("in"), dir.path().join("out"));
        let storage = Arc::new(DiskStorage::new(&config));
        storage.ensure_dirs().await.unwrap();
        (dir, FileRegistry::new(storage))
    }

    async fn upload(registry: &FileRegistry, name: &str) -> FileRecord {
        let stored = registry.storage().save_upload(name, b"data").await.unwrap();
        registry.create(NewFile {
            original_name: name.to_string(),
            file_type: "application/pdf".to_string(),
            stored,
            status: FileStatus::Uploaded,
            metadata: serde_json::Value::Null,
        })
    }

    #[tokio::test]
    async fn test_create_get_and_mark_processed() {
        let (_dir, registry) = registry().await;
        let record = upload(&registry, "a.pdf").await;
        assert_eq!(registry.get(&record.id), Some(record.clone()));
        assert_eq!(record.file_size, 4);

        assert!(registry.mark_processed(&record.id));
        assert_eq!(registry.get(&record.id).unwrap().status, FileStatus::Processed);
        assert!(!registry.mark_processed(&Uuid::new_v4()));
    }

    #[tokio::test]
    async fn test_delete_succeeds_when_bytes_are_already_gone() {
        let (_dir, registry) = registry().await;
        let record = upload(&registry, "a.pdf").await;
        std::fs::remove_file(&record.storage_path).unwrap();

        assert!(registry.delete(&record.id).await.is_some());
        assert!(registry.get(&record.id).is_none());
        assert!(registry.delete(&record.id).await.is_none());
    }

    #[tokio::test]
    async fn test_concurrent_creates_get_distinct_ids() {
        let (_dir, registry) = registry().await;
        let registry = Arc::new(registry);
        let mut handles = Vec::new();
        for i in 0..20 {
            let registry = Arc::clone(&registry);
            handles.push(tokio::spawn(async move {
                upload(&registry, &format!("{}.pdf", i)).await.id
            }));
        }
        let mut ids = Vec::new();
        for handle in handles {
            ids.push(handle.await.unwrap());
        }
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 20);
        assert_eq!(registry.list().len(), 20);
    }

    #[test]
    fn test_record_serializes_camel_case() {
        let record = FileRecord {
            id: Uuid::nil(),
            original_name: "a.pdf".into(),
            stored_name: "upload-1-abc.pdf".into(),
            file_type: "application/pdf".into(),
            file_size: 10,
            storage_path: PathBuf::from("/tmp/upload-1-abc.pdf"),
            status: FileStatus::Uploaded,
            metadata: serde_json::Value::Null,
            created_at: Utc::now(),
        };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["originalName"], "a.pdf");
        assert_eq!(json["fileType"], "application/pdf");
        assert_eq!(json["fileSize"], 10);
        assert_eq!(json["status"], "uploaded");
    }
}

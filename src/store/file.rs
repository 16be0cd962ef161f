use std::path::PathBuf;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::error::{Error, Result};
use crate::models::StudentRecord;
use crate::seed::seed_records;
use crate::store::{check_new_ids, RecordStore};

/// Single-device store keeping the whole list in one JSON document.
///
/// A missing document is created from the seed set on first access. Writes
/// replace the document through a sibling temp file so a crash never leaves a
/// half-written list behind.
#[derive(Debug)]
pub struct FileRecordStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileRecordStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    async fn load(&self) -> Result<Vec<StudentRecord>> {
        let raw = match tokio::fs::read(&self.path).await {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = %self.path.display(), "initializing record file with seed data");
                let seed = seed_records();
                self.save(&seed).await?;
                return Ok(seed);
            }
            Err(err) => return Err(self.unavailable("read", err)),
        };

        serde_json::from_slice(&raw).map_err(|err| self.unavailable("parse", err))
    }

    async fn save(&self, records: &[StudentRecord]) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|err| self.unavailable("create directory for", err))?;
        }

        let body =
            serde_json::to_vec_pretty(records).map_err(|err| self.unavailable("encode", err))?;
        let staging = self.path.with_extension("json.tmp");
        tokio::fs::write(&staging, body)
            .await
            .map_err(|err| self.unavailable("write", err))?;
        tokio::fs::rename(&staging, &self.path)
            .await
            .map_err(|err| self.unavailable("replace", err))?;

        tracing::debug!(path = %self.path.display(), count = records.len(), "record file saved");
        Ok(())
    }

    fn unavailable(&self, action: &str, err: impl std::fmt::Display) -> Error {
        Error::StorageUnavailable(format!("failed to {action} {}: {err}", self.path.display()))
    }
}

#[async_trait]
impl RecordStore for FileRecordStore {
    async fn list_all(&self) -> Result<Vec<StudentRecord>> {
        let _guard = self.write_lock.lock().await;
        self.load().await
    }

    async fn insert(&self, record: StudentRecord) -> Result<()> {
        self.insert_many(vec![record]).await
    }

    async fn insert_many(&self, batch: Vec<StudentRecord>) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut records = self.load().await?;
        check_new_ids(&records, &batch)?;
        records.splice(0..0, batch.into_iter().rev());
        self.save(&records).await
    }

    async fn delete_by_id(&self, id: &str) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut records = self.load().await?;
        let before = records.len();
        records.retain(|record| record.id != id);
        if records.len() == before {
            tracing::debug!(id, "delete skipped, no such record");
            return Ok(());
        }
        self.save(&records).await
    }

    async fn replace_all_with_seed(&self) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        self.save(&seed_records()).await
    }
}

use std::sync::RwLock;

use async_trait::async_trait;

use crate::error::{Error, Result};
use crate::models::StudentRecord;
use crate::seed::seed_records;
use crate::store::{check_new_ids, RecordStore};

/// In-process store seeded on construction.
#[derive(Debug)]
pub struct MemoryRecordStore {
    records: RwLock<Vec<StudentRecord>>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::with_records(seed_records())
    }

    pub fn with_records(records: Vec<StudentRecord>) -> Self {
        Self {
            records: RwLock::new(records),
        }
    }

    fn poisoned() -> Error {
        Error::StorageUnavailable("record lock poisoned".to_string())
    }
}

impl Default for MemoryRecordStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn list_all(&self) -> Result<Vec<StudentRecord>> {
        let guard = self.records.read().map_err(|_| Self::poisoned())?;
        Ok(guard.clone())
    }

    async fn insert(&self, record: StudentRecord) -> Result<()> {
        self.insert_many(vec![record]).await
    }

    async fn insert_many(&self, records: Vec<StudentRecord>) -> Result<()> {
        let mut guard = self.records.write().map_err(|_| Self::poisoned())?;
        check_new_ids(&guard, &records)?;
        guard.splice(0..0, records.into_iter().rev());
        Ok(())
    }

    async fn delete_by_id(&self, id: &str) -> Result<()> {
        let mut guard = self.records.write().map_err(|_| Self::poisoned())?;
        guard.retain(|record| record.id != id);
        Ok(())
    }

    async fn replace_all_with_seed(&self) -> Result<()> {
        let mut guard = self.records.write().map_err(|_| Self::poisoned())?;
        *guard = seed_records();
        Ok(())
    }
}

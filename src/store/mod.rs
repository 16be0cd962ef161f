//! Record persistence behind one capability trait.
//!
//! Backends:
//! - `memory`: process-local list, used for tests and throwaway sessions
//! - `file`: JSON document on the local device
//! - `postgres`: shared table reachable by every member of the cohort
//!
//! Every failure surfaces as [`Error::StorageUnavailable`](crate::error::Error).

use std::collections::HashSet;

use async_trait::async_trait;

use crate::error::{Error, Result};
use crate::models::StudentRecord;

pub mod file;
pub mod memory;
pub mod postgres;

pub use file::FileRecordStore;
pub use memory::MemoryRecordStore;
pub use postgres::PgRecordStore;

#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Every record, most recently inserted first. The seed set reads back in
    /// declaration order.
    async fn list_all(&self) -> Result<Vec<StudentRecord>>;

    async fn insert(&self, record: StudentRecord) -> Result<()>;

    /// Inserts a batch as one write: either every record lands or none do.
    /// Reads back as if each record had been inserted in turn.
    async fn insert_many(&self, records: Vec<StudentRecord>) -> Result<()>;

    /// Removes the record with `id`. Unknown ids are ignored.
    async fn delete_by_id(&self, id: &str) -> Result<()>;

    /// Wipes every record and reinserts the seed set. Callers must obtain an
    /// explicit confirmation first; on a shared backend this affects everyone.
    async fn replace_all_with_seed(&self) -> Result<()>;
}

/// Rejects a batch whose ids collide with each other or with `existing`.
pub(crate) fn check_new_ids(existing: &[StudentRecord], batch: &[StudentRecord]) -> Result<()> {
    let mut seen: HashSet<&str> = existing.iter().map(|record| record.id.as_str()).collect();
    for record in batch {
        if !seen.insert(record.id.as_str()) {
            return Err(Error::StorageUnavailable(format!(
                "record {} already exists",
                record.id
            )));
        }
    }
    Ok(())
}

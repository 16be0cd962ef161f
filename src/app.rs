use std::sync::Arc;

use crate::error::Result;
use crate::gate::{AccessGate, Session};
use crate::grouping;
use crate::intake::{self, RecordDraft};
use crate::models::{AccessLevel, DestinationGroup, MajorFilter, StudentRecord};
use crate::store::RecordStore;

/// Proof that the user explicitly agreed to wipe the shared data.
#[derive(Debug, Clone, Copy)]
pub struct ResetConfirmed(());

impl ResetConfirmed {
    pub fn confirmed() -> Self {
        Self(())
    }
}

/// View state for one session: the last fetched snapshot of the store plus the
/// active major filter. Groups are always derived from the snapshot, never
/// patched incrementally.
pub struct GradMap {
    store: Arc<dyn RecordStore>,
    gate: AccessGate,
    session: Session,
    records: Vec<StudentRecord>,
    filter: MajorFilter,
}

impl GradMap {
    pub fn new(store: Arc<dyn RecordStore>, gate: AccessGate) -> Self {
        Self {
            store,
            gate,
            session: Session::new(),
            records: Vec::new(),
            filter: MajorFilter::All,
        }
    }

    /// Admits the session. The snapshot stays empty until the first
    /// [`GradMap::refresh`].
    pub fn unlock(&mut self, code: &str) -> Result<AccessLevel> {
        self.session.admit(&self.gate, code)
    }

    pub fn level(&self) -> AccessLevel {
        self.session.level()
    }

    pub fn require(&self, level: AccessLevel) -> Result<()> {
        self.session.require(level)
    }

    /// Replaces the snapshot with the store's current list. On failure the
    /// previous snapshot stays in place.
    pub async fn refresh(&mut self) -> Result<()> {
        self.session.require(AccessLevel::User)?;
        match self.store.list_all().await {
            Ok(records) => {
                tracing::debug!(count = records.len(), "snapshot refreshed");
                self.records = records;
                Ok(())
            }
            Err(err) => {
                tracing::error!(error = %err, "refresh failed, keeping previous snapshot");
                Err(err)
            }
        }
    }

    pub fn records(&self) -> &[StudentRecord] {
        &self.records
    }

    pub fn filter(&self) -> &MajorFilter {
        &self.filter
    }

    pub fn set_filter(&mut self, filter: MajorFilter) {
        self.filter = filter;
    }

    pub fn groups(&self) -> Vec<DestinationGroup> {
        grouping::derive_groups(&self.records, &self.filter)
    }

    pub fn majors(&self) -> Vec<MajorFilter> {
        grouping::available_majors(&self.records)
    }

    pub fn group(&self, destination: &str) -> Option<DestinationGroup> {
        grouping::find_group(&self.groups(), destination).cloned()
    }

    /// Stores the draft. The record is returned once written, even if the
    /// refresh after it fails; the snapshot then lags until the next refresh.
    pub async fn add(&mut self, draft: &RecordDraft) -> Result<StudentRecord> {
        self.session.require(AccessLevel::User)?;
        let record = intake::submit(self.store.as_ref(), draft).await?;
        if let Err(err) = self.refresh().await {
            tracing::warn!(id = %record.id, error = %err, "record saved but view not refreshed");
        }
        Ok(record)
    }

    /// Admin listing, optionally narrowed by a search term.
    pub fn search(&self, term: &str) -> Result<Vec<&StudentRecord>> {
        self.session.require(AccessLevel::Admin)?;
        Ok(grouping::search_records(&self.records, term))
    }

    pub async fn delete(&mut self, id: &str) -> Result<()> {
        self.session.require(AccessLevel::Admin)?;
        self.store.delete_by_id(id).await?;
        tracing::info!(id, "record deleted");
        self.refresh().await
    }

    pub async fn reset(&mut self, _confirmed: ResetConfirmed) -> Result<()> {
        self.session.require(AccessLevel::Admin)?;
        self.store.replace_all_with_seed().await?;
        tracing::warn!("records reset to seed data");
        self.refresh().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::intake::MajorChoice;
    use crate::models::PathType;
    use crate::seed::seed_records;
    use crate::store::MemoryRecordStore;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, Ordering};

    /// Delegates to a memory store until switched offline. `reads_offline`
    /// fails only listing.
    struct FlakyStore {
        inner: MemoryRecordStore,
        offline: AtomicBool,
        reads_offline: AtomicBool,
    }

    impl FlakyStore {
        fn new() -> Self {
            Self {
                inner: MemoryRecordStore::new(),
                offline: AtomicBool::new(false),
                reads_offline: AtomicBool::new(false),
            }
        }

        fn check(&self) -> Result<()> {
            if self.offline.load(Ordering::SeqCst) {
                Err(Error::StorageUnavailable("connection reset".to_string()))
            } else {
                Ok(())
            }
        }
    }

    #[async_trait]
    impl RecordStore for FlakyStore {
        async fn list_all(&self) -> Result<Vec<StudentRecord>> {
            self.check()?;
            if self.reads_offline.load(Ordering::SeqCst) {
                return Err(Error::StorageUnavailable("read timeout".to_string()));
            }
            self.inner.list_all().await
        }

        async fn insert(&self, record: StudentRecord) -> Result<()> {
            self.check()?;
            self.inner.insert(record).await
        }

        async fn insert_many(&self, records: Vec<StudentRecord>) -> Result<()> {
            self.check()?;
            self.inner.insert_many(records).await
        }

        async fn delete_by_id(&self, id: &str) -> Result<()> {
            self.check()?;
            self.inner.delete_by_id(id).await
        }

        async fn replace_all_with_seed(&self) -> Result<()> {
            self.check()?;
            self.inner.replace_all_with_seed().await
        }
    }

    fn app() -> GradMap {
        GradMap::new(Arc::new(MemoryRecordStore::new()), AccessGate::default())
    }

    fn draft(destination: &str) -> RecordDraft {
        RecordDraft {
            name: "吴同学".to_string(),
            major: MajorChoice::Custom("数据科学".to_string()),
            year: 2025,
            path_type: PathType::Abroad,
            destination: destination.to_string(),
            ..RecordDraft::default()
        }
    }

    #[tokio::test]
    async fn locked_until_code_matches() {
        let mut app = app();
        assert!(matches!(app.refresh().await, Err(Error::PermissionDenied(_))));
        assert!(matches!(app.unlock("guess"), Err(Error::InvalidCode)));
        assert_eq!(app.level(), AccessLevel::None);
        assert!(app.records().is_empty());

        assert_eq!(app.unlock("chu123456").unwrap(), AccessLevel::User);
        assert!(app.records().is_empty());
        app.refresh().await.unwrap();
        assert_eq!(app.records().len(), 13);
    }

    #[tokio::test]
    async fn add_rederives_groups_from_fresh_snapshot() {
        let mut app = app();
        app.unlock("chu123456").unwrap();
        app.refresh().await.unwrap();

        app.add(&draft("北京大学")).await.unwrap();
        let top = &app.groups()[0];
        assert_eq!((top.destination.as_str(), top.count), ("北京大学", 3));
        assert_eq!(top.students[0].name, "吴同学");
        assert!(app.majors().contains(&MajorFilter::Major("数据科学".to_string())));

        app.set_filter(MajorFilter::Major("数据科学".to_string()));
        assert_eq!(app.groups().len(), 1);
        assert_eq!(app.group("北京大学").map(|g| g.count), Some(1));
    }

    #[tokio::test]
    async fn undecided_records_stay_stored_but_ungrouped() {
        let mut app = app();
        app.unlock("chu123456").unwrap();
        app.refresh().await.unwrap();
        app.add(&draft("待定")).await.unwrap();
        assert_eq!(app.records().len(), 14);
        assert!(app.group("待定").is_none());
    }

    #[tokio::test]
    async fn destructive_operations_need_admin() {
        let mut app = app();
        app.unlock("chu123456").unwrap();
        app.refresh().await.unwrap();
        assert!(matches!(app.delete("seed-1").await, Err(Error::PermissionDenied(AccessLevel::Admin))));
        assert!(app.reset(ResetConfirmed::confirmed()).await.is_err());
        assert!(app.search("").is_err());
        assert_eq!(app.records().len(), 13);
    }

    #[tokio::test]
    async fn admin_can_delete_search_and_reset() {
        let mut app = app();
        app.unlock("hcy123456").unwrap();
        app.refresh().await.unwrap();

        app.delete("seed-1").await.unwrap();
        assert_eq!(app.records().len(), 12);
        assert_eq!(app.search("华为").unwrap().len(), 1);

        app.add(&draft("MIT")).await.unwrap();
        app.reset(ResetConfirmed::confirmed()).await.unwrap();
        assert_eq!(app.records(), seed_records().as_slice());
    }

    #[tokio::test]
    async fn failed_refresh_keeps_previous_snapshot() {
        let store = Arc::new(FlakyStore::new());
        let mut app = GradMap::new(store.clone(), AccessGate::default());
        app.unlock("hcy123456").unwrap();
        app.refresh().await.unwrap();
        let before = app.groups();

        store.offline.store(true, Ordering::SeqCst);
        assert!(matches!(app.refresh().await, Err(Error::StorageUnavailable(_))));
        assert!(matches!(app.add(&draft("MIT")).await, Err(Error::StorageUnavailable(_))));
        assert!(app.delete("seed-2").await.is_err());
        assert_eq!(app.records().len(), 13);
        assert_eq!(app.groups(), before);
    }

    #[tokio::test]
    async fn add_reports_saved_record_when_refresh_fails() {
        let store = Arc::new(FlakyStore::new());
        let mut app = GradMap::new(store.clone(), AccessGate::default());
        app.unlock("chu123456").unwrap();
        app.refresh().await.unwrap();

        store.reads_offline.store(true, Ordering::SeqCst);
        let record = app.add(&draft("MIT")).await.unwrap();
        assert_eq!(app.records().len(), 13);

        store.reads_offline.store(false, Ordering::SeqCst);
        app.refresh().await.unwrap();
        assert_eq!(app.records()[0], record);
    }

    #[tokio::test]
    async fn unlock_admits_without_reaching_storage() {
        let store = Arc::new(FlakyStore::new());
        store.offline.store(true, Ordering::SeqCst);
        let mut app = GradMap::new(store.clone(), AccessGate::default());

        assert_eq!(app.unlock("hcy123456").unwrap(), AccessLevel::Admin);
        assert!(app.require(AccessLevel::Admin).is_ok());
        assert!(app.refresh().await.is_err());
    }
}

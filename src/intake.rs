use std::path::Path;

use anyhow::Context;
use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use crate::error::{Result, ValidationError};
use crate::models::{PathType, StudentRecord, SUGGESTED_MAJORS, YEAR_MAX, YEAR_MIN};
use crate::store::RecordStore;

/// Major picked on the add form: one of the suggestions, or free text that
/// replaces the suggestion entirely.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MajorChoice {
    Suggested(String),
    Custom(String),
}

impl MajorChoice {
    /// Suggested when the text names a suggested major, custom otherwise.
    pub fn from_input(value: &str) -> Self {
        if SUGGESTED_MAJORS.contains(&value.trim()) {
            MajorChoice::Suggested(value.trim().to_string())
        } else {
            MajorChoice::Custom(value.to_string())
        }
    }

    fn value(&self) -> &str {
        match self {
            MajorChoice::Suggested(major) | MajorChoice::Custom(major) => major,
        }
    }
}

impl Default for MajorChoice {
    fn default() -> Self {
        MajorChoice::Suggested(SUGGESTED_MAJORS[0].to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordDraft {
    pub name: String,
    pub major: MajorChoice,
    pub year: i32,
    pub path_type: PathType,
    pub destination: String,
    pub contact: String,
    pub is_anonymous: bool,
}

impl Default for RecordDraft {
    fn default() -> Self {
        Self {
            name: String::new(),
            major: MajorChoice::default(),
            year: 2024,
            path_type: PathType::Recommendation,
            destination: String::new(),
            contact: String::new(),
            is_anonymous: false,
        }
    }
}

fn required(value: &str, field: &'static str) -> std::result::Result<String, ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        Err(ValidationError::Missing(field))
    } else {
        Ok(trimmed.to_string())
    }
}

/// Validates a draft and stamps it with a fresh id and creation time.
pub fn build_record(draft: &RecordDraft) -> std::result::Result<StudentRecord, ValidationError> {
    let name = required(&draft.name, "name")?;
    let major = required(draft.major.value(), "major")?;
    if !(YEAR_MIN..=YEAR_MAX).contains(&draft.year) {
        return Err(ValidationError::YearOutOfRange(draft.year));
    }
    let destination = required(&draft.destination, "destination")?;

    let contact = draft.contact.trim();
    Ok(StudentRecord {
        id: Uuid::new_v4().to_string(),
        name,
        major,
        year: draft.year,
        path_type: draft.path_type,
        destination,
        contact: (!contact.is_empty()).then(|| contact.to_string()),
        is_anonymous: draft.is_anonymous,
        created_at: Utc::now().timestamp_millis(),
    })
}

/// Builds the record and appends it. Nothing is written when validation fails.
pub async fn submit(store: &dyn RecordStore, draft: &RecordDraft) -> Result<StudentRecord> {
    let record = build_record(draft).map_err(|err| {
        tracing::debug!(field = err.field(), "draft rejected");
        err
    })?;
    store.insert(record.clone()).await?;
    tracing::info!(id = %record.id, destination = %record.destination, "record added");
    Ok(record)
}

#[derive(Debug, Deserialize)]
struct CsvRow {
    name: String,
    major: String,
    year: i32,
    #[serde(rename = "type")]
    path_type: String,
    destination: String,
    contact: Option<String>,
    #[serde(alias = "isAnonymous")]
    anonymous: Option<bool>,
}

impl CsvRow {
    fn into_draft(self) -> std::result::Result<RecordDraft, ValidationError> {
        let path_type = self
            .path_type
            .parse::<PathType>()
            .map_err(|_| ValidationError::InvalidType(self.path_type.clone()))?;

        Ok(RecordDraft {
            name: self.name,
            major: MajorChoice::from_input(&self.major),
            year: self.year,
            path_type,
            destination: self.destination,
            contact: self.contact.unwrap_or_default(),
            is_anonymous: self.anonymous.unwrap_or(false),
        })
    }
}

/// Imports every row of a CSV file, or none of them if any row is invalid.
pub async fn import_csv(store: &dyn RecordStore, csv_path: &Path) -> anyhow::Result<usize> {
    let mut reader = csv::Reader::from_path(csv_path)
        .with_context(|| format!("failed to open {}", csv_path.display()))?;

    let mut records = Vec::new();
    for (index, result) in reader.deserialize::<CsvRow>().enumerate() {
        // Header is line 1.
        let line = index + 2;
        let row = result.with_context(|| format!("malformed row on line {line}"))?;
        let record = row
            .into_draft()
            .and_then(|draft| build_record(&draft))
            .with_context(|| format!("invalid row on line {line}"))?;
        records.push(record);
    }

    let total = records.len();
    store.insert_many(records).await?;

    tracing::info!(total, path = %csv_path.display(), "csv import complete");
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::store::MemoryRecordStore;
    use async_trait::async_trait;
    use std::io::Write;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Memory store that loses its connection after `budget` written records.
    struct DroppingStore {
        inner: MemoryRecordStore,
        budget: usize,
        written: AtomicUsize,
    }

    impl DroppingStore {
        fn new(budget: usize) -> Self {
            Self {
                inner: MemoryRecordStore::with_records(vec![]),
                budget,
                written: AtomicUsize::new(0),
            }
        }

        fn take(&self, count: usize) -> Result<()> {
            let written = self.written.fetch_add(count, Ordering::SeqCst);
            if written + count > self.budget {
                Err(Error::StorageUnavailable("connection dropped".to_string()))
            } else {
                Ok(())
            }
        }
    }

    #[async_trait]
    impl RecordStore for DroppingStore {
        async fn list_all(&self) -> Result<Vec<StudentRecord>> {
            self.inner.list_all().await
        }

        async fn insert(&self, record: StudentRecord) -> Result<()> {
            self.take(1)?;
            self.inner.insert(record).await
        }

        async fn insert_many(&self, records: Vec<StudentRecord>) -> Result<()> {
            self.take(records.len())?;
            self.inner.insert_many(records).await
        }

        async fn delete_by_id(&self, id: &str) -> Result<()> {
            self.inner.delete_by_id(id).await
        }

        async fn replace_all_with_seed(&self) -> Result<()> {
            self.inner.replace_all_with_seed().await
        }
    }

    fn draft() -> RecordDraft {
        RecordDraft {
            name: "  赵同学 ".to_string(),
            major: MajorChoice::Suggested("统计学".to_string()),
            year: 2025,
            path_type: PathType::Exam,
            destination: " 中国人民大学".to_string(),
            contact: "   ".to_string(),
            is_anonymous: false,
        }
    }

    #[test]
    fn builds_trimmed_record_with_fresh_identity() {
        let first = build_record(&draft()).unwrap();
        let second = build_record(&draft()).unwrap();

        assert_eq!(first.name, "赵同学");
        assert_eq!(first.destination, "中国人民大学");
        assert_eq!(first.contact, None);
        assert_ne!(first.id, second.id);
        assert!(first.created_at > 1_700_000_000_000);
    }

    #[test]
    fn reports_first_invalid_field() {
        let mut bad = draft();
        bad.name = " ".to_string();
        bad.destination.clear();
        assert_eq!(build_record(&bad), Err(ValidationError::Missing("name")));

        let mut bad = draft();
        bad.major = MajorChoice::Custom("   ".to_string());
        bad.year = 1999;
        assert_eq!(build_record(&bad), Err(ValidationError::Missing("major")));

        let mut bad = draft();
        bad.year = 1999;
        bad.destination.clear();
        assert_eq!(build_record(&bad), Err(ValidationError::YearOutOfRange(1999)));

        let mut bad = draft();
        bad.destination = "\t".to_string();
        assert_eq!(build_record(&bad), Err(ValidationError::Missing("destination")));
    }

    #[test]
    fn custom_major_replaces_suggestion() {
        let mut custom = draft();
        custom.major = MajorChoice::Custom("金融数学".to_string());
        assert_eq!(build_record(&custom).unwrap().major, "金融数学");

        assert_eq!(
            MajorChoice::from_input("统计学"),
            MajorChoice::Suggested("统计学".to_string())
        );
        assert_eq!(
            MajorChoice::from_input("物理学"),
            MajorChoice::Custom("物理学".to_string())
        );
    }

    #[tokio::test]
    async fn submit_appends_once_on_success_only() {
        let store = MemoryRecordStore::with_records(vec![]);

        let mut bad = draft();
        bad.name.clear();
        let err = submit(&store, &bad).await.unwrap_err();
        assert!(matches!(err, Error::Validation(ValidationError::Missing("name"))));
        assert!(store.list_all().await.unwrap().is_empty());

        let record = submit(&store, &draft()).await.unwrap();
        assert_eq!(store.list_all().await.unwrap(), vec![record]);
    }

    fn write_csv(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[tokio::test]
    async fn imports_all_rows() {
        let file = write_csv(
            "name,major,year,type,destination,contact,anonymous\n\
             钱同学,统计学,2024,EXAM,北京大学,,false\n\
             孙同学,金融数学,2025,工作,腾讯,wx-sun,true\n",
        );
        let store = MemoryRecordStore::with_records(vec![]);

        assert_eq!(import_csv(&store, file.path()).await.unwrap(), 2);
        let records = store.list_all().await.unwrap();
        assert_eq!(records.len(), 2);
        let sun = records.iter().find(|r| r.name == "孙同学").unwrap();
        assert_eq!(sun.path_type, PathType::Work);
        assert_eq!(sun.contact.as_deref(), Some("wx-sun"));
        assert!(sun.is_anonymous);
    }

    #[tokio::test]
    async fn invalid_row_aborts_whole_import() {
        let file = write_csv(
            "name,major,year,type,destination,contact,anonymous\n\
             钱同学,统计学,2024,EXAM,北京大学,,\n\
             李同学,统计学,2024,INTERN,字节跳动,,\n",
        );
        let store = MemoryRecordStore::with_records(vec![]);

        let err = import_csv(&store, file.path()).await.unwrap_err();
        assert!(format!("{err:#}").contains("line 3"));
        assert!(store.list_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn storage_failure_mid_import_leaves_store_unchanged() {
        let file = write_csv(
            "name,major,year,type,destination,contact,anonymous\n\
             钱同学,统计学,2024,EXAM,北京大学,,\n\
             孙同学,统计学,2024,WORK,腾讯,,\n\
             周同学,统计学,2024,ABROAD,UCL,,\n",
        );
        let store = DroppingStore::new(1);

        assert!(import_csv(&store, file.path()).await.is_err());
        assert!(store.list_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn imported_rows_read_back_last_row_first() {
        let file = write_csv(
            "name,major,year,type,destination,contact,anonymous\n\
             钱同学,统计学,2024,EXAM,北京大学,,\n\
             孙同学,统计学,2024,WORK,腾讯,,\n",
        );
        let store = MemoryRecordStore::new();

        import_csv(&store, file.path()).await.unwrap();
        let names: Vec<String> = store
            .list_all()
            .await
            .unwrap()
            .into_iter()
            .take(3)
            .map(|r| r.name)
            .collect();
        assert_eq!(names, ["孙同学", "钱同学", "向魁炜"]);
    }
}

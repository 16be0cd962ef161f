use std::time::Duration;

use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::Row;

use crate::error::{Error, Result};
use crate::models::{PathType, StudentRecord};
use crate::seed::seed_records;
use crate::store::RecordStore;

const INSERT_STUDENT: &str = r#"
    INSERT INTO gradmap.students
    (id, name, major, year, path_type, destination, contact, is_anonymous, created_at)
    VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
"#;

/// Shared table store; every cohort member sees the same rows.
#[derive(Debug, Clone)]
pub struct PgRecordStore {
    pool: PgPool,
}

impl PgRecordStore {
    /// Connects without touching the schema; run [`PgRecordStore::init_db`]
    /// once per database first.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(5))
            .connect(database_url)
            .await
            .map_err(|err| {
                Error::StorageUnavailable(format!("failed to connect to Postgres: {err}"))
            })?;
        Ok(Self { pool })
    }

    /// Creates or upgrades the schema.
    pub async fn init_db(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        tracing::info!("schema ready");
        Ok(())
    }

    async fn insert_with<'e, E>(executor: E, record: &StudentRecord) -> Result<()>
    where
        E: sqlx::PgExecutor<'e>,
    {
        sqlx::query(INSERT_STUDENT)
            .bind(&record.id)
            .bind(&record.name)
            .bind(&record.major)
            .bind(record.year)
            .bind(record.path_type.as_str())
            .bind(&record.destination)
            .bind(record.contact.as_deref())
            .bind(record.is_anonymous)
            .bind(record.created_at)
            .execute(executor)
            .await?;
        Ok(())
    }
}

/// Seed rows in the order they must be written so that `seq DESC` reads them
/// back in declaration order.
fn seed_insert_order() -> Vec<StudentRecord> {
    let mut seed = seed_records();
    seed.reverse();
    seed
}

fn record_from_row(row: &PgRow) -> Result<StudentRecord> {
    let path_type: String = row.try_get("path_type")?;
    let path_type = path_type
        .parse::<PathType>()
        .map_err(Error::StorageUnavailable)?;

    Ok(StudentRecord {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        major: row.try_get("major")?,
        year: row.try_get("year")?,
        path_type,
        destination: row.try_get("destination")?,
        contact: row.try_get("contact")?,
        is_anonymous: row.try_get("is_anonymous")?,
        created_at: row.try_get("created_at")?,
    })
}

#[async_trait]
impl RecordStore for PgRecordStore {
    async fn list_all(&self) -> Result<Vec<StudentRecord>> {
        let rows = sqlx::query(
            "SELECT id, name, major, year, path_type, destination, contact, is_anonymous, created_at \
             FROM gradmap.students \
             ORDER BY seq DESC",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(record_from_row).collect()
    }

    async fn insert(&self, record: StudentRecord) -> Result<()> {
        Self::insert_with(&self.pool, &record).await?;
        tracing::debug!(id = %record.id, "record inserted");
        Ok(())
    }

    async fn insert_many(&self, records: Vec<StudentRecord>) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        for record in &records {
            Self::insert_with(&mut *tx, record).await?;
        }
        tx.commit().await?;
        tracing::debug!(count = records.len(), "batch inserted");
        Ok(())
    }

    async fn delete_by_id(&self, id: &str) -> Result<()> {
        let result = sqlx::query("DELETE FROM gradmap.students WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        tracing::debug!(id, removed = result.rows_affected(), "delete applied");
        Ok(())
    }

    async fn replace_all_with_seed(&self) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM gradmap.students")
            .execute(&mut *tx)
            .await?;
        let seed = seed_insert_order();
        for record in &seed {
            Self::insert_with(&mut *tx, record).await?;
        }
        tx.commit().await?;
        tracing::warn!(count = seed.len(), "shared table reset to seed data");
        Ok(())
    }
}

//! SQLite-backed batch and batch item storage.

use std::str::FromStr;

use async_trait::async_trait;
use ipgeo_domain::{Batch, BatchId, BatchItem};
use sqlx::sqlite::{SqliteArguments, SqliteRow};
use sqlx::{Row, Sqlite, SqlitePool, Transaction};

use super::{from_db_time, from_db_time_opt, to_db_time};
use crate::infrastructure::ports::{BatchRepo, RepoError};

const SCHEMA: [&str; 3] = [
    r#"
    CREATE TABLE IF NOT EXISTS batches (
        id TEXT PRIMARY KEY,
        status TEXT NOT NULL,
        total_count INTEGER NOT NULL,
        processed_count INTEGER NOT NULL,
        average_ms_per_item REAL,
        created_at TEXT NOT NULL,
        started_at TEXT,
        completed_at TEXT
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS batch_items (
        id TEXT PRIMARY KEY,
        batch_id TEXT NOT NULL REFERENCES batches(id) ON DELETE CASCADE,
        ip TEXT NOT NULL,
        status TEXT NOT NULL,
        attempts INTEGER NOT NULL,
        started_at TEXT,
        completed_at TEXT,
        duration_ms INTEGER,
        error_message TEXT,
        country_code TEXT,
        country_name TEXT,
        time_zone TEXT,
        latitude REAL,
        longitude REAL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_batch_items_batch_id ON batch_items(batch_id)",
];

const INSERT_ITEM: &str = r#"
    INSERT INTO batch_items (
        id, batch_id, ip, status, attempts, started_at, completed_at, duration_ms,
        error_message, country_code, country_name, time_zone, latitude, longitude
    )
    VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
"#;

const UPSERT_ITEM: &str = r#"
    INSERT INTO batch_items (
        id, batch_id, ip, status, attempts, started_at, completed_at, duration_ms,
        error_message, country_code, country_name, time_zone, latitude, longitude
    )
    VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
    ON CONFLICT(id) DO UPDATE SET
        status = excluded.status,
        attempts = excluded.attempts,
        started_at = excluded.started_at,
        completed_at = excluded.completed_at,
        duration_ms = excluded.duration_ms,
        error_message = excluded.error_message,
        country_code = excluded.country_code,
        country_name = excluded.country_name,
        time_zone = excluded.time_zone,
        latitude = excluded.latitude,
        longitude = excluded.longitude
"#;

const INSERT_BATCH: &str = r#"
    INSERT INTO batches (
        id, status, total_count, processed_count, average_ms_per_item,
        created_at, started_at, completed_at
    )
    VALUES (?, ?, ?, ?, ?, ?, ?, ?)
"#;

const UPSERT_BATCH: &str = r#"
    INSERT INTO batches (
        id, status, total_count, processed_count, average_ms_per_item,
        created_at, started_at, completed_at
    )
    VALUES (?, ?, ?, ?, ?, ?, ?, ?)
    ON CONFLICT(id) DO UPDATE SET
        status = excluded.status,
        processed_count = excluded.processed_count,
        average_ms_per_item = excluded.average_ms_per_item,
        started_at = excluded.started_at,
        completed_at = excluded.completed_at
"#;

/// SQLite implementation of batch storage.
pub struct SqliteBatchRepo {
    pool: SqlitePool,
}

impl SqliteBatchRepo {
    pub async fn new(pool: SqlitePool) -> Result<Self, RepoError> {
        for statement in SCHEMA {
            sqlx::query(statement)
                .execute(&pool)
                .await
                .map_err(|e| RepoError::database("batch_schema", e))?;
        }
        Ok(Self { pool })
    }

    async fn insert_item(
        tx: &mut Transaction<'_, Sqlite>,
        item: &BatchItem,
    ) -> Result<(), RepoError> {
        bind_item(sqlx::query(INSERT_ITEM), item)
            .execute(&mut **tx)
            .await
            .map_err(|e| RepoError::database("create_batch", e))?;
        Ok(())
    }
}

type SqliteQuery<'q> = sqlx::query::Query<'q, Sqlite, SqliteArguments<'q>>;

fn bind_batch<'q>(query: SqliteQuery<'q>, batch: &Batch) -> SqliteQuery<'q> {
    query
        .bind(batch.id.to_string())
        .bind(batch.status.as_str())
        .bind(i64::from(batch.total_count))
        .bind(i64::from(batch.processed_count))
        .bind(batch.average_ms_per_item)
        .bind(to_db_time(batch.created_at))
        .bind(batch.started_at.map(to_db_time))
        .bind(batch.completed_at.map(to_db_time))
}

fn bind_item<'q>(query: SqliteQuery<'q>, item: &BatchItem) -> SqliteQuery<'q> {
    query
        .bind(item.id.to_string())
        .bind(item.batch_id.to_string())
        .bind(item.ip.clone())
        .bind(item.status.as_str())
        .bind(i64::from(item.attempts))
        .bind(item.started_at.map(to_db_time))
        .bind(item.completed_at.map(to_db_time))
        .bind(item.duration_ms)
        .bind(item.error_message.clone())
        .bind(item.country_code.clone())
        .bind(item.country_name.clone())
        .bind(item.time_zone.clone())
        .bind(item.latitude)
        .bind(item.longitude)
}

fn parse_id<T>(value: &str) -> Result<T, RepoError>
where
    T: FromStr<Err = uuid::Error>,
{
    value
        .parse()
        .map_err(|e| RepoError::serialization(format!("bad id '{value}': {e}")))
}

fn column<'r, T>(row: &'r SqliteRow, name: &str) -> Result<T, RepoError>
where
    T: sqlx::Decode<'r, Sqlite> + sqlx::Type<Sqlite>,
{
    row.try_get(name)
        .map_err(|e| RepoError::database("decode", e))
}

fn count_column(row: &SqliteRow, name: &str) -> Result<u32, RepoError> {
    let value: i64 = column(row, name)?;
    u32::try_from(value).map_err(|e| RepoError::serialization(format!("{name}: {e}")))
}

fn row_to_item(row: &SqliteRow) -> Result<BatchItem, RepoError> {
    let id: String = column(row, "id")?;
    let batch_id: String = column(row, "batch_id")?;
    let status: String = column(row, "status")?;

    Ok(BatchItem {
        id: parse_id(&id)?,
        batch_id: parse_id(&batch_id)?,
        ip: column(row, "ip")?,
        status: status
            .parse()
            .map_err(|e: ipgeo_domain::DomainError| RepoError::serialization(e))?,
        attempts: count_column(row, "attempts")?,
        started_at: from_db_time_opt(column(row, "started_at")?)?,
        completed_at: from_db_time_opt(column(row, "completed_at")?)?,
        duration_ms: column(row, "duration_ms")?,
        error_message: column(row, "error_message")?,
        country_code: column(row, "country_code")?,
        country_name: column(row, "country_name")?,
        time_zone: column(row, "time_zone")?,
        latitude: column(row, "latitude")?,
        longitude: column(row, "longitude")?,
    })
}

fn row_to_batch(row: &SqliteRow, items: Vec<BatchItem>) -> Result<Batch, RepoError> {
    let id: String = column(row, "id")?;
    let status: String = column(row, "status")?;
    let created_at: String = column(row, "created_at")?;

    Ok(Batch {
        id: parse_id(&id)?,
        status: status
            .parse()
            .map_err(|e: ipgeo_domain::DomainError| RepoError::serialization(e))?,
        total_count: count_column(row, "total_count")?,
        processed_count: count_column(row, "processed_count")?,
        average_ms_per_item: column(row, "average_ms_per_item")?,
        created_at: from_db_time(&created_at)?,
        started_at: from_db_time_opt(column(row, "started_at")?)?,
        completed_at: from_db_time_opt(column(row, "completed_at")?)?,
        items,
    })
}

#[async_trait]
impl BatchRepo for SqliteBatchRepo {
    async fn create_batch(&self, batch: &Batch) -> Result<(), RepoError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| RepoError::database("create_batch", e))?;

        bind_batch(sqlx::query(INSERT_BATCH), batch)
            .execute(&mut *tx)
            .await
            .map_err(|e| RepoError::database("create_batch", e))?;

        for item in &batch.items {
            Self::insert_item(&mut tx, item).await?;
        }

        tx.commit()
            .await
            .map_err(|e| RepoError::database("create_batch", e))?;
        Ok(())
    }

    async fn get_batch(&self, id: BatchId) -> Result<Option<Batch>, RepoError> {
        let row = sqlx::query("SELECT * FROM batches WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| RepoError::database("get_batch", e))?;

        let Some(row) = row else {
            return Ok(None);
        };

        let item_rows = sqlx::query("SELECT * FROM batch_items WHERE batch_id = ? ORDER BY rowid")
            .bind(id.to_string())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| RepoError::database("get_batch", e))?;

        let items = item_rows
            .iter()
            .map(row_to_item)
            .collect::<Result<Vec<_>, _>>()?;

        row_to_batch(&row, items).map(Some)
    }

    async fn update_item(&self, item: &BatchItem) -> Result<(), RepoError> {
        bind_item(sqlx::query(UPSERT_ITEM), item)
            .execute(&self.pool)
            .await
            .map_err(|e| RepoError::database("update_item", e))?;
        Ok(())
    }

    async fn update_batch(&self, batch: &Batch) -> Result<(), RepoError> {
        bind_batch(sqlx::query(UPSERT_BATCH), batch)
            .execute(&self.pool)
            .await
            .map_err(|e| RepoError::database("update_batch", e))?;
        Ok(())
    }
}

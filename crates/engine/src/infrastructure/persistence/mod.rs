//! Batch and geo cache storage adapters.

mod memory;
mod sqlite_batch_repo;
mod sqlite_geo_cache_repo;

pub use memory::{InMemoryBatchRepo, InMemoryGeoCacheRepo};
pub use sqlite_batch_repo::SqliteBatchRepo;
pub use sqlite_geo_cache_repo::SqliteGeoCacheRepo;

use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;

use crate::infrastructure::ports::RepoError;

/// Open (creating if needed) the SQLite database at `db_path`.
///
/// WAL plus a busy timeout lets concurrent item writers queue up instead of
/// failing with "database is locked".
pub async fn connect_sqlite(db_path: &str) -> Result<SqlitePool, RepoError> {
    if let Some(parent) = Path::new(db_path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(|e| RepoError::database("connect", e))?;
        }
    }

    let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", db_path))
        .map_err(|e| RepoError::database("connect", e))?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_secs(5));

    SqlitePoolOptions::new()
        .max_connections(8)
        .connect_with(options)
        .await
        .map_err(|e| RepoError::database("connect", e))
}

/// Fixed-width RFC 3339 so stored timestamps sort lexicographically.
pub(crate) fn to_db_time(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn from_db_time(value: &str) -> Result<DateTime<Utc>, RepoError> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| RepoError::serialization(format!("bad timestamp '{value}': {e}")))
}

pub(crate) fn from_db_time_opt(value: Option<String>) -> Result<Option<DateTime<Utc>>, RepoError> {
    value.as_deref().map(from_db_time).transpose()
}

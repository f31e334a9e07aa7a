//! SQLite-backed geo cache.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use ipgeo_domain::GeoCacheEntry;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use std::sync::Arc;

use super::{from_db_time, to_db_time};
use crate::infrastructure::ports::{ClockPort, GeoCacheRepo, RepoError};

/// SQLite implementation of the geo cache, keyed by IP.
pub struct SqliteGeoCacheRepo {
    pool: SqlitePool,
    clock: Arc<dyn ClockPort>,
}

impl SqliteGeoCacheRepo {
    pub async fn new(pool: SqlitePool, clock: Arc<dyn ClockPort>) -> Result<Self, RepoError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS ip_geo_cache (
                ip TEXT PRIMARY KEY,
                country_code TEXT,
                country_name TEXT,
                time_zone TEXT,
                latitude REAL,
                longitude REAL,
                last_fetched_utc TEXT NOT NULL
            )
            "#,
        )
        .execute(&pool)
        .await
        .map_err(|e| RepoError::database("geo_cache_schema", e))?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_ip_geo_cache_last_fetched ON ip_geo_cache(last_fetched_utc)",
        )
        .execute(&pool)
        .await
        .map_err(|e| RepoError::database("geo_cache_schema", e))?;

        Ok(Self { pool, clock })
    }
}

fn row_to_entry(row: &SqliteRow) -> Result<GeoCacheEntry, RepoError> {
    let decode = |e: sqlx::Error| RepoError::database("geo_cache_decode", e);
    let last_fetched: String = row.try_get("last_fetched_utc").map_err(decode)?;

    Ok(GeoCacheEntry {
        ip: row.try_get("ip").map_err(decode)?,
        country_code: row.try_get("country_code").map_err(decode)?,
        country_name: row.try_get("country_name").map_err(decode)?,
        time_zone: row.try_get("time_zone").map_err(decode)?,
        latitude: row.try_get("latitude").map_err(decode)?,
        longitude: row.try_get("longitude").map_err(decode)?,
        last_fetched_at: from_db_time(&last_fetched)?,
    })
}

#[async_trait]
impl GeoCacheRepo for SqliteGeoCacheRepo {
    async fn get(&self, ip: &str) -> Result<Option<GeoCacheEntry>, RepoError> {
        let row = sqlx::query("SELECT * FROM ip_geo_cache WHERE ip = ?")
            .bind(ip)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| RepoError::database("geo_cache_get", e))?;

        row.as_ref().map(row_to_entry).transpose()
    }

    async fn get_valid(&self, ip: &str, ttl: Duration) -> Result<Option<GeoCacheEntry>, RepoError> {
        let now = self.clock.now();
        Ok(self.get(ip).await?.filter(|entry| entry.is_valid(now, ttl)))
    }

    async fn put(&self, entry: &GeoCacheEntry) -> Result<(), RepoError> {
        sqlx::query(
            r#"
            INSERT INTO ip_geo_cache (
                ip, country_code, country_name, time_zone, latitude, longitude, last_fetched_utc
            )
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(ip) DO UPDATE SET
                country_code = excluded.country_code,
                country_name = excluded.country_name,
                time_zone = excluded.time_zone,
                latitude = excluded.latitude,
                longitude = excluded.longitude,
                last_fetched_utc = excluded.last_fetched_utc
            "#,
        )
        .bind(&entry.ip)
        .bind(&entry.country_code)
        .bind(&entry.country_name)
        .bind(&entry.time_zone)
        .bind(entry.latitude)
        .bind(entry.longitude)
        .bind(to_db_time(entry.last_fetched_at))
        .execute(&self.pool)
        .await
        .map_err(|e| RepoError::database("geo_cache_put", e))?;

        Ok(())
    }

    async fn sweep_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64, RepoError> {
        let result = sqlx::query("DELETE FROM ip_geo_cache WHERE last_fetched_utc < ?")
            .bind(to_db_time(cutoff))
            .execute(&self.pool)
            .await
            .map_err(|e| RepoError::database("geo_cache_sweep", e))?;

        Ok(result.rows_affected())
    }

    async fn count(&self) -> Result<u64, RepoError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM ip_geo_cache")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| RepoError::database("geo_cache_count", e))?;

        Ok(count.max(0) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::clock::FixedClock;
    use crate::infrastructure::persistence::connect_sqlite;
    use chrono::TimeZone;
    use ipgeo_domain::GeoData;

    fn now() -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000, 0).unwrap()
    }

    async fn repo(dir: &tempfile::TempDir) -> SqliteGeoCacheRepo {
        let path = dir.path().join("cache.db");
        let pool = connect_sqlite(&path.to_string_lossy())
            .await
            .expect("connect");
        SqliteGeoCacheRepo::new(pool, Arc::new(FixedClock(now())))
            .await
            .expect("create repo")
    }

    fn entry(ip: &str, fetched_at: DateTime<Utc>) -> GeoCacheEntry {
        GeoCacheEntry::from_geo(
            ip,
            &GeoData::new(ip)
                .with_country("US", "United States")
                .with_time_zone("America/Chicago")
                .with_coordinates(37.751, -97.822),
            fetched_at,
        )
    }

    #[tokio::test]
    async fn put_then_get_round_trips() {
        let dir = tempfile::tempdir().expect("tempdir");
        let repo = repo(&dir).await;
        let cached = entry("8.8.8.8", now());

        repo.put(&cached).await.expect("put");

        assert_eq!(repo.get("8.8.8.8").await.expect("get"), Some(cached));
        assert_eq!(repo.get("1.1.1.1").await.expect("get"), None);
    }

    #[tokio::test]
    async fn put_replaces_the_whole_entry_and_is_idempotent() {
        let dir = tempfile::tempdir().expect("tempdir");
        let repo = repo(&dir).await;
        repo.put(&entry("8.8.8.8", now() - Duration::hours(3)))
            .await
            .expect("put");

        let replacement = GeoCacheEntry::from_geo("8.8.8.8", &GeoData::new("8.8.8.8"), now());
        repo.put(&replacement).await.expect("put");
        repo.put(&replacement).await.expect("put again");

        assert_eq!(repo.get("8.8.8.8").await.expect("get"), Some(replacement));
        assert_eq!(repo.count().await.expect("count"), 1);
    }

    #[tokio::test]
    async fn stale_entries_read_as_misses() {
        let dir = tempfile::tempdir().expect("tempdir");
        let repo = repo(&dir).await;
        repo.put(&entry("8.8.8.8", now() - Duration::hours(1)))
            .await
            .expect("put");
        repo.put(&entry("1.1.1.1", now() - Duration::hours(13)))
            .await
            .expect("put");

        let ttl = Duration::hours(12);
        assert!(repo.get_valid("8.8.8.8", ttl).await.expect("get").is_some());
        assert!(repo.get_valid("1.1.1.1", ttl).await.expect("get").is_none());
        // Still physically present until swept.
        assert!(repo.get("1.1.1.1").await.expect("get").is_some());
    }

    #[tokio::test]
    async fn sweep_removes_only_entries_older_than_cutoff() {
        let dir = tempfile::tempdir().expect("tempdir");
        let repo = repo(&dir).await;
        repo.put(&entry("8.8.8.8", now() - Duration::hours(1)))
            .await
            .expect("put");
        repo.put(&entry("1.1.1.1", now() - Duration::hours(13)))
            .await
            .expect("put");
        repo.put(&entry("9.9.9.9", now() - Duration::days(3)))
            .await
            .expect("put");

        let removed = repo
            .sweep_older_than(now() - Duration::hours(12))
            .await
            .expect("sweep");

        assert_eq!(removed, 2);
        assert_eq!(repo.count().await.expect("count"), 1);
        assert!(repo.get("8.8.8.8").await.expect("get").is_some());
    }
}

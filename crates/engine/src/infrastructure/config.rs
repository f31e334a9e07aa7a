//! Application configuration

use std::env;
use std::str::FromStr;

use anyhow::{bail, Context, Result};

use super::resilient_geo::RetryConfig;

/// Application configuration loaded from environment
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Interface to bind the HTTP server on
    pub server_host: String,
    /// HTTP server port
    pub server_port: u16,

    /// CORS allowed origins (comma-separated, or "*" for any). Empty disables CORS.
    pub cors_allowed_origins: Vec<String>,

    /// Storage configuration
    pub store: StoreConfig,

    /// Geolocation provider configuration
    pub provider: ProviderConfig,

    /// Geo cache configuration
    pub cache: CacheConfig,

    /// Batch worker configuration
    pub batch: BatchConfig,
}

/// Storage backend selection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreBackend {
    Sqlite,
    Memory,
}

impl FromStr for StoreBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sqlite" => Ok(Self::Sqlite),
            "memory" => Ok(Self::Memory),
            other => bail!("unknown STORE_BACKEND '{other}' (expected 'sqlite' or 'memory')"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    /// SQLite database path (if using sqlite backend)
    pub sqlite_path: String,
}

#[derive(Debug, Clone)]
pub struct ProviderConfig {
    /// Provider base URL, e.g. `https://api.ipgeolocation.example/v1`
    pub base_url: String,
    /// Sent as the `apikey` header when present
    pub api_key: Option<String>,
    /// Per-request timeout
    pub timeout_seconds: u64,
    /// Backoff for transient provider failures
    pub retry: RetryConfig,
}

#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// How long a provider result stays fresh (hours)
    pub ttl_hours: u64,
    /// How often the sweeper purges stale entries (hours)
    pub cleanup_interval_hours: u64,
    /// Seed a well-known entry into an empty cache on startup
    pub seed_on_startup: bool,
}

#[derive(Debug, Clone)]
pub struct BatchConfig {
    /// Max concurrent provider resolutions per batch
    pub max_concurrency: usize,
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let base_url = lookup("GEO_PROVIDER_BASE_URL")
            .filter(|url| !url.trim().is_empty())
            .context("GEO_PROVIDER_BASE_URL environment variable is required")?;

        Ok(Self {
            server_host: var("SERVER_HOST", "0.0.0.0"),
            server_port: parse(&lookup, "SERVER_PORT", 3000)?,

            cors_allowed_origins: lookup("CORS_ALLOWED_ORIGINS")
                .unwrap_or_default()
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),

            store: StoreConfig {
                backend: var("STORE_BACKEND", "sqlite").parse()?,
                sqlite_path: var("DATABASE_PATH", "./data/ipgeo.db"),
            },

            provider: ProviderConfig {
                base_url,
                api_key: lookup("GEO_PROVIDER_API_KEY").filter(|key| !key.trim().is_empty()),
                timeout_seconds: parse(&lookup, "GEO_PROVIDER_TIMEOUT_SECONDS", 10)?,
                retry: RetryConfig {
                    max_retries: parse(&lookup, "GEO_PROVIDER_MAX_RETRIES", 3)?,
                    base_delay_ms: parse(&lookup, "GEO_PROVIDER_BASE_DELAY_MS", 2000)?,
                    max_delay_ms: parse(&lookup, "GEO_PROVIDER_MAX_DELAY_MS", 30000)?,
                    jitter_factor: parse(&lookup, "GEO_PROVIDER_JITTER", 0.2)?,
                },
            },

            cache: CacheConfig {
                ttl_hours: parse(&lookup, "CACHE_TTL_HOURS", 12)?,
                cleanup_interval_hours: parse(&lookup, "CACHE_CLEANUP_INTERVAL_HOURS", 6)?,
                seed_on_startup: parse(&lookup, "CACHE_SEED_ON_STARTUP", true)?,
            },

            batch: BatchConfig {
                max_concurrency: parse(&lookup, "BATCH_MAX_CONCURRENCY", 8)?,
            },
        })
    }
}

fn parse<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{key} has an invalid value: '{raw}'")),
        None => Ok(default),
    }
}

//! Resilient geo provider wrapper with exponential backoff retry
//!
//! Wraps any GeoProviderPort implementation with retry logic for transient
//! failures. Once retries are exhausted the wrapper reports "no data" so a
//! flaky provider fails single items instead of whole batches.

use async_trait::async_trait;
use ipgeo_domain::GeoData;
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;

use crate::infrastructure::ports::{GeoProviderError, GeoProviderPort};

/// Configuration for retry behavior
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retry attempts (0 = no retries, just the initial attempt)
    pub max_retries: u32,
    /// Delay in milliseconds before the first retry; doubles for each later one
    pub base_delay_ms: u64,
    /// Maximum delay in milliseconds (caps exponential growth)
    pub max_delay_ms: u64,
    /// Jitter factor (0.0-1.0) for randomizing delays to prevent thundering herd
    pub jitter_factor: f64,
}

impl Default for RetryConfig {
    /// 2s, 4s, 8s: the 2^attempt seconds schedule.
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 2000,
            max_delay_ms: 30000,
            jitter_factor: 0.2,
        }
    }
}

/// Wrapper that adds retry logic to any geo provider
pub struct ResilientGeoProvider {
    inner: Arc<dyn GeoProviderPort>,
    config: RetryConfig,
}

impl ResilientGeoProvider {
    pub fn new(inner: Arc<dyn GeoProviderPort>, config: RetryConfig) -> Self {
        Self { inner, config }
    }

    /// Calculate delay for a given attempt number using exponential backoff with jitter
    fn calculate_delay(&self, attempt: u32) -> u64 {
        let base = self.config.base_delay_ms;
        // Exponential: base * 2^(attempt-1)
        let exponential = base.saturating_mul(2u64.saturating_pow(attempt.saturating_sub(1)));
        let capped = exponential.min(self.config.max_delay_ms);

        // Add jitter: ±jitter_factor around the delay
        let jitter_range = (capped as f64 * self.config.jitter_factor) as i64;
        if jitter_range > 0 {
            let jitter = rand::thread_rng().gen_range(-jitter_range..=jitter_range);
            (capped as i64 + jitter).max(0) as u64
        } else {
            capped
        }
    }
}

#[async_trait]
impl GeoProviderPort for ResilientGeoProvider {
    async fn fetch(&self, ip: &str) -> Result<Option<GeoData>, GeoProviderError> {
        let mut last_error = None;

        for attempt in 0..=self.config.max_retries {
            match self.inner.fetch(ip).await {
                Ok(result) => {
                    if attempt > 0 {
                        tracing::info!(
                            attempt = attempt + 1,
                            ip = %ip,
                            "Geo provider request succeeded after retry"
                        );
                    }
                    return Ok(result);
                }
                Err(e) if !e.is_transient() => {
                    tracing::error!(
                        error = %e,
                        ip = %ip,
                        "Geo provider request failed with non-retryable error"
                    );
                    return Err(e);
                }
                Err(e) => {
                    if attempt < self.config.max_retries {
                        let delay = self.calculate_delay(attempt + 1);
                        tracing::warn!(
                            attempt = attempt + 1,
                            max_retries = self.config.max_retries,
                            delay_ms = delay,
                            error = %e,
                            ip = %ip,
                            "Geo provider request failed, retrying..."
                        );
                        tokio::time::sleep(Duration::from_millis(delay)).await;
                    }
                    last_error = Some(e);
                }
            }
        }

        if let Some(error) = last_error {
            tracing::warn!(
                attempts = self.config.max_retries + 1,
                error = %error,
                ip = %ip,
                "Geo provider request failed after all retry attempts, treating as no data"
            );
        }
        Ok(None)
    }
}

//! HTTP client for the external IP geolocation API

use async_trait::async_trait;
use ipgeo_domain::GeoData;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::time::Duration;

use crate::infrastructure::ports::{GeoProviderError, GeoProviderPort};

/// Default request timeout for provider calls.
pub const DEFAULT_PROVIDER_TIMEOUT_SECS: u64 = 10;

/// Client for the geolocation provider's `/info` endpoint
#[derive(Clone)]
pub struct HttpGeoProvider {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl HttpGeoProvider {
    pub fn new(base_url: &str, api_key: Option<String>) -> Result<Self, GeoProviderError> {
        Self::with_timeout(base_url, api_key, DEFAULT_PROVIDER_TIMEOUT_SECS)
    }

    pub fn with_timeout(
        base_url: &str,
        api_key: Option<String>,
        timeout_secs: u64,
    ) -> Result<Self, GeoProviderError> {
        if base_url.trim().is_empty() {
            return Err(GeoProviderError::Configuration(
                "provider base URL is not configured".to_string(),
            ));
        }

        if timeout_secs == 0 {
            return Err(GeoProviderError::Configuration(
                "provider timeout must be at least one second".to_string(),
            ));
        }

        // Never fall back to a client without the timeout.
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| GeoProviderError::Configuration(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.trim().trim_end_matches('/').to_string(),
            api_key: api_key.filter(|key| !key.trim().is_empty()),
        })
    }

    fn is_transient_status(status: StatusCode) -> bool {
        status.is_server_error()
            || status == StatusCode::TOO_MANY_REQUESTS
            || status == StatusCode::REQUEST_TIMEOUT
    }
}

#[async_trait]
impl GeoProviderPort for HttpGeoProvider {
    async fn fetch(&self, ip: &str) -> Result<Option<GeoData>, GeoProviderError> {
        let mut request = self
            .client
            .get(format!("{}/info", self.base_url))
            .query(&[("ip", ip)]);
        if let Some(key) = &self.api_key {
            request = request.header("apikey", key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| GeoProviderError::Transient(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            if Self::is_transient_status(status) {
                return Err(GeoProviderError::Transient(format!(
                    "provider returned {status}"
                )));
            }
            tracing::warn!(
                status = status.as_u16(),
                ip = %ip,
                "Geo provider returned non-success status code"
            );
            return Ok(None);
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| GeoProviderError::Transient(e.to_string()))?;
        let payload: ProviderResponse = serde_json::from_slice(&body).map_err(|e| {
            tracing::error!(error = %e, ip = %ip, "Unexpected geo provider payload");
            GeoProviderError::InvalidResponse(e.to_string())
        })?;

        Ok(payload.into_geo(ip))
    }
}

// =============================================================================
// Provider wire types
// =============================================================================

/// Accepts both shapes the provider has been seen to return: a flat object,
/// or an object wrapped in `data` with nested location and timezone.
#[derive(Debug, Deserialize)]
struct ProviderResponse {
    data: Option<EnvelopeData>,
    ip: Option<String>,
    country_code: Option<String>,
    country_name: Option<String>,
    time_zone: Option<String>,
    latitude: Option<f64>,
    longitude: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct EnvelopeData {
    ip: Option<String>,
    location: Option<EnvelopeLocation>,
    timezone: Option<EnvelopeTimezone>,
}

#[derive(Debug, Deserialize)]
struct EnvelopeLocation {
    latitude: Option<f64>,
    longitude: Option<f64>,
    country: Option<EnvelopeCountry>,
}

#[derive(Debug, Deserialize)]
struct EnvelopeCountry {
    alpha2: Option<String>,
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct EnvelopeTimezone {
    id: Option<String>,
}

impl ProviderResponse {
    /// Map into geo fields. `requested_ip` fills in when the payload omits it.
    fn into_geo(self, requested_ip: &str) -> Option<GeoData> {
        if let Some(data) = self.data {
            let location = data.location;
            let country = location.as_ref().and_then(|l| l.country.as_ref());
            return Some(GeoData {
                ip: data.ip.unwrap_or_else(|| requested_ip.to_string()),
                country_code: country.and_then(|c| c.alpha2.clone()),
                country_name: country.and_then(|c| c.name.clone()),
                time_zone: data.timezone.and_then(|t| t.id),
                latitude: location.as_ref().and_then(|l| l.latitude),
                longitude: location.as_ref().and_then(|l| l.longitude),
            });
        }

        let has_fields = self.ip.is_some()
            || self.country_code.is_some()
            || self.latitude.is_some()
            || self.longitude.is_some();
        if !has_fields {
            return None;
        }

        Some(GeoData {
            ip: self.ip.unwrap_or_else(|| requested_ip.to_string()),
            country_code: self.country_code,
            country_name: self.country_name,
            time_zone: self.time_zone,
            latitude: self.latitude,
            longitude: self.longitude,
        })
    }
}

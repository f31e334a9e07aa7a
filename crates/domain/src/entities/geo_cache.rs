//! GeoCacheEntry - a provider result remembered for a TTL

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::GeoData;

/// Cached geo result keyed by IP.
///
/// Entries are replaced whole on every write. Freshness is a query-time
/// predicate; there is no stored "valid" flag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeoCacheEntry {
    pub ip: String,
    pub country_code: Option<String>,
    pub country_name: Option<String>,
    pub time_zone: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub last_fetched_at: DateTime<Utc>,
}

impl GeoCacheEntry {
    /// Build an entry for `ip` from a fresh provider result.
    pub fn from_geo(ip: impl Into<String>, geo: &GeoData, fetched_at: DateTime<Utc>) -> Self {
        Self {
            ip: ip.into(),
            country_code: geo.country_code.clone(),
            country_name: geo.country_name.clone(),
            time_zone: geo.time_zone.clone(),
            latitude: geo.latitude,
            longitude: geo.longitude,
            last_fetched_at: fetched_at,
        }
    }

    pub fn is_valid(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        now - self.last_fetched_at <= ttl
    }

    pub fn to_geo(&self) -> GeoData {
        GeoData {
            ip: self.ip.clone(),
            country_code: self.country_code.clone(),
            country_name: self.country_name.clone(),
            time_zone: self.time_zone.clone(),
            latitude: self.latitude,
            longitude: self.longitude,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    fn entry_fetched(ago: Duration) -> GeoCacheEntry {
        GeoCacheEntry::from_geo(
            "8.8.8.8",
            &GeoData::new("8.8.8.8").with_country("US", "United States"),
            now() - ago,
        )
    }

    #[test]
    fn entry_within_ttl_is_valid() {
        let entry = entry_fetched(Duration::hours(1));
        assert!(entry.is_valid(now(), Duration::hours(12)));
    }

    #[test]
    fn entry_at_exact_ttl_is_still_valid() {
        let entry = entry_fetched(Duration::hours(12));
        assert!(entry.is_valid(now(), Duration::hours(12)));
        assert!(!entry.is_valid(now() + Duration::seconds(1), Duration::hours(12)));
    }

    #[test]
    fn validity_is_monotonic_in_ttl() {
        let entry = entry_fetched(Duration::hours(5));
        for ttl_hours in 0..48 {
            if entry.is_valid(now(), Duration::hours(ttl_hours)) {
                assert!(entry.is_valid(now(), Duration::hours(ttl_hours + 1)));
            }
        }
    }

    #[test]
    fn to_geo_returns_cached_fields() {
        let entry = entry_fetched(Duration::zero());
        let geo = entry.to_geo();
        assert_eq!(geo.ip, "8.8.8.8");
        assert_eq!(geo.country_name.as_deref(), Some("United States"));
    }
}

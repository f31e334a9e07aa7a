//! Synchronous single-IP lookup.

use std::sync::Arc;

use ipgeo_domain::{normalize_ip, GeoData};

use super::{GeoError, GeoResolver};

pub struct LookupGeo {
    resolver: Arc<GeoResolver>,
}

impl LookupGeo {
    pub fn new(resolver: Arc<GeoResolver>) -> Self {
        Self { resolver }
    }

    pub async fn execute(&self, ip: &str) -> Result<GeoData, GeoError> {
        let ip = normalize_ip(ip)?;

        match self.resolver.resolve(&ip).await {
            Ok(Some(geo)) => Ok(geo),
            Ok(None) => Err(GeoError::unexpected("Geo provider did not return data.")),
            Err(e) => {
                tracing::error!(ip = %ip, error = %e, "Geo lookup failed");
                Err(e)
            }
        }
    }
}

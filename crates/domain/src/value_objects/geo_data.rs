use serde::{Deserialize, Serialize};

/// Geolocation fields resolved for a single IP.
///
/// Every field except `ip` is optional because providers omit what they do
/// not know.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeoData {
    pub ip: String,
    pub country_code: Option<String>,
    pub country_name: Option<String>,
    pub time_zone: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

impl GeoData {
    pub fn new(ip: impl Into<String>) -> Self {
        Self {
            ip: ip.into(),
            ..Default::default()
        }
    }

    pub fn with_country(mut self, code: impl Into<String>, name: impl Into<String>) -> Self {
        self.country_code = Some(code.into());
        self.country_name = Some(name.into());
        self
    }

    pub fn with_time_zone(mut self, time_zone: impl Into<String>) -> Self {
        self.time_zone = Some(time_zone.into());
        self
    }

    pub fn with_coordinates(mut self, latitude: f64, longitude: f64) -> Self {
        self.latitude = Some(latitude);
        self.longitude = Some(longitude);
        self
    }
}

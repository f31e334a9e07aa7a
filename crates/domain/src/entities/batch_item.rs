//! BatchItem entity - one IP inside a batch and its resolution outcome

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{BatchId, BatchItemId, DomainError, GeoData};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BatchItemStatus {
    Pending,
    Running,
    Succeeded,
    Failed,
}

impl BatchItemStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::Running => "Running",
            Self::Succeeded => "Succeeded",
            Self::Failed => "Failed",
        }
    }

    /// Succeeded and Failed are final; no transition leaves them.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }
}

impl fmt::Display for BatchItemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BatchItemStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" => Ok(Self::Pending),
            "Running" => Ok(Self::Running),
            "Succeeded" => Ok(Self::Succeeded),
            "Failed" => Ok(Self::Failed),
            other => Err(DomainError::parse(format!(
                "unknown batch item status: {other}"
            ))),
        }
    }
}

/// A single IP to resolve within a batch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchItem {
    pub id: BatchItemId,
    /// Owning batch
    pub batch_id: BatchId,
    /// Normalized IP string
    pub ip: String,
    pub status: BatchItemStatus,
    /// Incremented once per processing pass
    pub attempts: u32,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    /// Wall-clock time spent resolving, set once terminal
    pub duration_ms: Option<i64>,
    /// Only set when Failed
    pub error_message: Option<String>,
    pub country_code: Option<String>,
    pub country_name: Option<String>,
    pub time_zone: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

impl BatchItem {
    pub fn new(batch_id: BatchId, ip: impl Into<String>) -> Self {
        Self {
            id: BatchItemId::new(),
            batch_id,
            ip: ip.into(),
            status: BatchItemStatus::Pending,
            attempts: 0,
            started_at: None,
            completed_at: None,
            duration_ms: None,
            error_message: None,
            country_code: None,
            country_name: None,
            time_zone: None,
            latitude: None,
            longitude: None,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.status == BatchItemStatus::Pending
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Start a processing pass.
    pub fn mark_running(&mut self, now: DateTime<Utc>) -> Result<(), DomainError> {
        if self.status != BatchItemStatus::Pending {
            return Err(DomainError::invalid_transition(format!(
                "item {} cannot start from {}",
                self.id, self.status
            )));
        }
        self.status = BatchItemStatus::Running;
        self.attempts += 1;
        self.started_at = Some(now);
        self.error_message = None;
        Ok(())
    }

    pub fn mark_succeeded(&mut self, geo: &GeoData, now: DateTime<Utc>) -> Result<(), DomainError> {
        self.ensure_running("succeed")?;
        self.status = BatchItemStatus::Succeeded;
        self.country_code = geo.country_code.clone();
        self.country_name = geo.country_name.clone();
        self.time_zone = geo.time_zone.clone();
        self.latitude = geo.latitude;
        self.longitude = geo.longitude;
        self.completed_at = Some(now);
        Ok(())
    }

    pub fn mark_failed(
        &mut self,
        message: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Result<(), DomainError> {
        self.ensure_running("fail")?;
        self.status = BatchItemStatus::Failed;
        self.error_message = Some(message.into());
        self.completed_at = Some(now);
        Ok(())
    }

    pub fn record_duration(&mut self, duration_ms: i64) {
        self.duration_ms = Some(duration_ms.max(0));
    }

    /// Resolved geo fields, present only once Succeeded.
    pub fn geo(&self) -> Option<GeoData> {
        (self.status == BatchItemStatus::Succeeded).then(|| GeoData {
            ip: self.ip.clone(),
            country_code: self.country_code.clone(),
            country_name: self.country_name.clone(),
            time_zone: self.time_zone.clone(),
            latitude: self.latitude,
            longitude: self.longitude,
        })
    }

    fn ensure_running(&self, action: &str) -> Result<(), DomainError> {
        if self.status != BatchItemStatus::Running {
            return Err(DomainError::invalid_transition(format!(
                "item {} cannot {action} from {}",
                self.id, self.status
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn running_increments_attempts_once() {
        let mut item = BatchItem::new(BatchId::new(), "8.8.8.8");
        item.mark_running(now()).unwrap();

        assert_eq!(item.status, BatchItemStatus::Running);
        assert_eq!(item.attempts, 1);
        assert_eq!(item.started_at, Some(now()));
        assert!(item.mark_running(now()).is_err());
        assert_eq!(item.attempts, 1);
    }

    #[test]
    fn success_copies_geo_fields() {
        let mut item = BatchItem::new(BatchId::new(), "8.8.8.8");
        let geo = GeoData::new("8.8.8.8")
            .with_country("US", "United States")
            .with_time_zone("America/Chicago")
            .with_coordinates(37.75, -97.82);

        item.mark_running(now()).unwrap();
        item.mark_succeeded(&geo, now()).unwrap();

        assert_eq!(item.status, BatchItemStatus::Succeeded);
        assert_eq!(item.country_code.as_deref(), Some("US"));
        assert_eq!(item.geo(), Some(geo));
        assert!(item.error_message.is_none());
    }

    #[test]
    fn terminal_state_is_reached_at_most_once() {
        let mut item = BatchItem::new(BatchId::new(), "9.9.9.9");
        item.mark_running(now()).unwrap();
        item.mark_failed("Geo provider returned no data.", now()).unwrap();

        assert!(item.is_terminal());
        assert!(item.mark_succeeded(&GeoData::new("9.9.9.9"), now()).is_err());
        assert!(item.mark_failed("again", now()).is_err());
        assert_eq!(
            item.error_message.as_deref(),
            Some("Geo provider returned no data.")
        );
        assert!(item.geo().is_none());
    }

    #[test]
    fn cannot_finish_without_starting() {
        let mut item = BatchItem::new(BatchId::new(), "1.1.1.1");
        assert!(item.mark_failed("nope", now()).is_err());
        assert!(item.is_pending());
    }

    #[test]
    fn status_round_trips_through_str() {
        for status in [
            BatchItemStatus::Pending,
            BatchItemStatus::Running,
            BatchItemStatus::Succeeded,
            BatchItemStatus::Failed,
        ] {
            assert_eq!(status.as_str().parse::<BatchItemStatus>().unwrap(), status);
        }
        assert!("Done".parse::<BatchItemStatus>().is_err());
    }
}

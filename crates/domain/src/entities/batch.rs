//! Batch entity - a group of IP lookups tracked as one unit

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::batch_item::BatchItem;
use crate::{BatchId, DomainError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BatchStatus {
    Pending,
    Running,
    Completed,
    /// Declared for storage compatibility; no transition produces it.
    Failed,
}

impl BatchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::Running => "Running",
            Self::Completed => "Completed",
            Self::Failed => "Failed",
        }
    }
}

impl fmt::Display for BatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BatchStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" => Ok(Self::Pending),
            "Running" => Ok(Self::Running),
            "Completed" => Ok(Self::Completed),
            "Failed" => Ok(Self::Failed),
            other => Err(DomainError::parse(format!("unknown batch status: {other}"))),
        }
    }
}

/// A submitted batch of IPs and its aggregate progress.
///
/// Aggregates are never bumped incrementally. `recompute_progress` derives
/// them from the item set, which callers re-read from the store after all
/// concurrent item updates have landed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Batch {
    pub id: BatchId,
    pub status: BatchStatus,
    /// Fixed at creation
    pub total_count: u32,
    /// Items in a terminal state
    pub processed_count: u32,
    /// Mean duration over terminal items with a recorded duration
    pub average_ms_per_item: Option<f64>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub items: Vec<BatchItem>,
}

impl Batch {
    /// Create a batch with one pending item per IP.
    ///
    /// IPs are expected to be normalized already.
    pub fn new(ips: &[String], now: DateTime<Utc>) -> Self {
        let id = BatchId::new();
        let items: Vec<BatchItem> = ips.iter().map(|ip| BatchItem::new(id, ip.clone())).collect();
        Self {
            id,
            status: BatchStatus::Pending,
            total_count: items.len() as u32,
            processed_count: 0,
            average_ms_per_item: None,
            created_at: now,
            started_at: None,
            completed_at: None,
            items,
        }
    }

    pub fn is_completed(&self) -> bool {
        self.status == BatchStatus::Completed
    }

    /// Move a pending batch to Running. `started_at` is only ever set once.
    pub fn mark_running(&mut self, now: DateTime<Utc>) {
        if self.status == BatchStatus::Pending {
            self.status = BatchStatus::Running;
        }
        self.started_at.get_or_insert(now);
    }

    /// The pending item for `ip`, matched case-insensitively.
    pub fn pending_item(&self, ip: &str) -> Option<&BatchItem> {
        self.items
            .iter()
            .find(|item| item.is_pending() && item.ip.eq_ignore_ascii_case(ip))
    }

    /// Derive processed count, average duration and completion from items.
    pub fn recompute_progress(&mut self, now: DateTime<Utc>) {
        let terminal: Vec<&BatchItem> = self.items.iter().filter(|i| i.is_terminal()).collect();
        self.processed_count = terminal.len() as u32;

        let durations: Vec<i64> = terminal
            .iter()
            .filter_map(|i| i.duration_ms)
            .filter(|ms| *ms > 0)
            .collect();
        self.average_ms_per_item = if durations.is_empty() {
            None
        } else {
            Some(durations.iter().sum::<i64>() as f64 / durations.len() as f64)
        };

        if self.processed_count >= self.total_count {
            self.status = BatchStatus::Completed;
            self.completed_at.get_or_insert(now);
        }
    }

    /// Projected completion time from the rolling average.
    ///
    /// Returns `None` until at least one item has finished with a recorded
    /// duration and the batch has started.
    pub fn estimate_completion(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        if self.total_count == 0 || self.processed_count == 0 {
            return None;
        }
        let average = self.average_ms_per_item?;
        self.started_at?;

        if self.is_completed() {
            return self.completed_at;
        }

        let remaining = i64::from(self.total_count) - i64::from(self.processed_count);
        if remaining <= 0 {
            return Some(self.completed_at.unwrap_or(now));
        }

        let remaining_ms = (average * remaining as f64).ceil() as i64;
        Some(now + Duration::milliseconds(remaining_ms))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{BatchItemStatus, GeoData};
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    fn ips(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn finish(batch: &mut Batch, index: usize, duration_ms: i64, succeed: bool) {
        let item = &mut batch.items[index];
        item.mark_running(now()).unwrap();
        if succeed {
            item.mark_succeeded(&GeoData::new(item.ip.clone()), now()).unwrap();
        } else {
            item.mark_failed("Geo provider returned no data.", now()).unwrap();
        }
        item.record_duration(duration_ms);
    }

    #[test]
    fn new_batch_owns_one_pending_item_per_ip() {
        let batch = Batch::new(&ips(&["1.1.1.1", "8.8.8.8"]), now());

        assert_eq!(batch.total_count, 2);
        assert_eq!(batch.processed_count, 0);
        assert_eq!(batch.status, BatchStatus::Pending);
        assert!(batch.items.iter().all(|i| i.batch_id == batch.id));
        assert!(batch.items.iter().all(|i| i.status == BatchItemStatus::Pending));
    }

    #[test]
    fn mark_running_sets_started_at_once() {
        let mut batch = Batch::new(&ips(&["1.1.1.1"]), now());
        batch.mark_running(now());
        batch.mark_running(now() + Duration::seconds(30));

        assert_eq!(batch.status, BatchStatus::Running);
        assert_eq!(batch.started_at, Some(now()));
    }

    #[test]
    fn pending_item_lookup_ignores_case_and_skips_processed() {
        let mut batch = Batch::new(&ips(&["2001:db8::1", "8.8.8.8"]), now());
        assert!(batch.pending_item("2001:DB8::1").is_some());

        finish(&mut batch, 1, 5, true);
        assert!(batch.pending_item("8.8.8.8").is_none());
    }

    #[test]
    fn average_is_the_mean_of_all_recorded_durations() {
        let mut batch = Batch::new(&ips(&["1.1.1.1", "8.8.8.8", "9.9.9.9"]), now());
        batch.mark_running(now());
        finish(&mut batch, 0, 100, true);
        finish(&mut batch, 1, 200, true);
        finish(&mut batch, 2, 600, false);

        batch.recompute_progress(now());

        assert_eq!(batch.processed_count, 3);
        assert_eq!(batch.average_ms_per_item, Some(300.0));
        assert_eq!(batch.status, BatchStatus::Completed);
        assert_eq!(batch.completed_at, Some(now()));
    }

    #[test]
    fn zero_durations_do_not_count_toward_the_average() {
        let mut batch = Batch::new(&ips(&["1.1.1.1", "8.8.8.8"]), now());
        finish(&mut batch, 0, 0, true);
        batch.recompute_progress(now());

        assert_eq!(batch.processed_count, 1);
        assert_eq!(batch.average_ms_per_item, None);
        assert_eq!(batch.status, BatchStatus::Pending);
    }

    #[test]
    fn completion_requires_every_item_to_be_terminal() {
        let mut batch = Batch::new(&ips(&["1.1.1.1", "8.8.8.8"]), now());
        batch.mark_running(now());
        finish(&mut batch, 0, 10, true);
        batch.recompute_progress(now());

        assert_eq!(batch.status, BatchStatus::Running);
        assert!(batch.completed_at.is_none());
        assert!(batch.processed_count <= batch.total_count);

        finish(&mut batch, 1, 10, false);
        batch.recompute_progress(now());
        assert!(batch.is_completed());
        assert_eq!(batch.processed_count, batch.total_count);
    }

    #[test]
    fn completed_at_is_not_moved_by_later_recomputes() {
        let mut batch = Batch::new(&ips(&["1.1.1.1"]), now());
        finish(&mut batch, 0, 10, true);
        batch.recompute_progress(now());
        batch.recompute_progress(now() + Duration::hours(1));

        assert_eq!(batch.completed_at, Some(now()));
    }

    #[test]
    fn estimate_is_none_before_any_item_finishes() {
        let mut batch = Batch::new(&ips(&["1.1.1.1", "8.8.8.8"]), now());
        batch.mark_running(now());
        batch.recompute_progress(now());

        assert_eq!(batch.estimate_completion(now()), None);
    }

    #[test]
    fn estimate_projects_remaining_items_from_the_average() {
        let mut batch = Batch::new(&ips(&["1.1.1.1", "8.8.8.8", "9.9.9.9"]), now());
        batch.mark_running(now());
        finish(&mut batch, 0, 250, true);
        batch.recompute_progress(now());

        let eta = batch.estimate_completion(now()).expect("estimate");
        assert!(eta > now());
        assert_eq!(eta, now() + Duration::milliseconds(500));
    }

    #[test]
    fn estimate_requires_a_start_time() {
        let mut batch = Batch::new(&ips(&["1.1.1.1", "8.8.8.8"]), now());
        finish(&mut batch, 0, 250, true);
        batch.recompute_progress(now());

        assert_eq!(batch.estimate_completion(now()), None);
    }

    #[test]
    fn estimate_for_completed_batch_is_its_completion_time() {
        let mut batch = Batch::new(&ips(&["1.1.1.1"]), now());
        batch.mark_running(now());
        finish(&mut batch, 0, 40, true);
        batch.recompute_progress(now());

        let later = now() + Duration::hours(2);
        assert_eq!(batch.estimate_completion(later), Some(now()));
    }

    #[test]
    fn status_round_trips_through_str() {
        for status in [
            BatchStatus::Pending,
            BatchStatus::Running,
            BatchStatus::Completed,
            BatchStatus::Failed,
        ] {
            assert_eq!(status.to_string().parse::<BatchStatus>().unwrap(), status);
        }
    }
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::error::StoreError;
use crate::monitoring::types::{OutageType, SiteStatus, UNMEASURED_MS};

/// Site model - a registered endpoint and its rolling check counters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Site {
    pub id: i64,
    pub uuid: Uuid,
    pub name: String,
    pub url: String,
    pub created_at: DateTime<Utc>,
    pub total_checks: u64,
    pub online_checks: u64,
    pub last_status: SiteStatus,
    pub last_response_time: i64,
    pub last_checked_at: Option<DateTime<Utc>>,
}

impl Site {
    /// A freshly registered site that has never been probed.
    ///
    /// `id` is assigned by storage; callers building sites by hand (tests,
    /// fixtures) pass whatever they like.
    pub fn new(id: i64, name: impl Into<String>, url: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            uuid: Uuid::new_v4(),
            name: name.into(),
            url: url.into(),
            created_at,
            total_checks: 0,
            online_checks: 0,
            last_status: SiteStatus::Unknown,
            last_response_time: UNMEASURED_MS,
            last_checked_at: None,
        }
    }

    /// Uptime percentage formatted to two decimals
    pub fn uptime(&self) -> String {
        crate::monitoring::aggregator::uptime(self.total_checks, self.online_checks)
    }
}

/// Input for registering a site
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewSite {
    pub name: String,
    pub url: String,
}

/// Outage model - one incident window for a site
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Outage {
    pub id: i64,
    pub site_id: i64,
    #[serde(rename = "type")]
    pub outage_type: OutageType,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
}

impl Outage {
    /// An open outage has no end time yet
    pub fn is_active(&self) -> bool {
        self.end_time.is_none()
    }

    /// Length of a closed outage in seconds; `None` while still open
    pub fn duration_seconds(&self) -> Option<f64> {
        self.end_time
            .map(|end| (end - self.start_time).num_milliseconds() as f64 / 1000.0)
    }
}

/// Convert a timestamp to the Unix milliseconds stored in the database
pub fn timestamp_to_millis(time: DateTime<Utc>) -> i64 {
    time.timestamp_millis()
}

/// Convert stored Unix milliseconds back to a timestamp
pub fn millis_to_timestamp(millis: i64) -> Result<DateTime<Utc>, StoreError> {
    DateTime::from_timestamp_millis(millis)
        .ok_or_else(|| StoreError::Corrupt(format!("timestamp {millis} out of range")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    #[test]
    fn test_new_site_is_unmeasured() {
        let site = Site::new(1, "api", "https://api.example.com", Utc::now());
        assert_eq!(site.last_status, SiteStatus::Unknown);
        assert_eq!(site.last_response_time, UNMEASURED_MS);
        assert!(site.last_checked_at.is_none());
        assert_eq!(site.uptime(), "0.00");
    }

    #[test]
    fn test_outage_duration() {
        let start = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        let mut outage = Outage {
            id: 7,
            site_id: 1,
            outage_type: OutageType::Down,
            start_time: start,
            end_time: None,
        };
        assert!(outage.is_active());
        assert_eq!(outage.duration_seconds(), None);

        outage.end_time = Some(start + Duration::milliseconds(90_500));
        assert!(!outage.is_active());
        assert_eq!(outage.duration_seconds(), Some(90.5));
    }

    #[test]
    fn test_millis_round_trip_keeps_millisecond_precision() {
        let time = Utc.timestamp_millis_opt(1_700_000_123_456).unwrap();
        assert_eq!(millis_to_timestamp(timestamp_to_millis(time)).unwrap(), time);
    }
}

//! Rolling check counters and last-observed fields of a site.

use chrono::{DateTime, Utc};
use std::sync::Arc;

use super::types::{SiteStatus, StatusSample};
use crate::database::{Database, Site, StoreError};

/// The change one sample makes to a site's counters.
///
/// Storage applies it as an in-place increment so concurrent writers and
/// restarts never lose a check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckUpdate {
    pub status: SiteStatus,
    pub response_time_ms: i64,
    pub checked_at: DateTime<Utc>,
    /// Whether the sample counts towards `online_checks`
    pub online: bool,
}

impl CheckUpdate {
    pub fn from_sample(sample: &StatusSample) -> Self {
        Self {
            status: sample.status,
            response_time_ms: sample.response_time_ms,
            checked_at: sample.observed_at,
            online: sample.status == SiteStatus::Operational,
        }
    }

    /// Apply the update to an in-memory site
    pub fn apply_to(&self, site: &mut Site) {
        site.total_checks += 1;
        if self.online {
            site.online_checks += 1;
        }
        site.last_status = self.status;
        site.last_response_time = self.response_time_ms;
        site.last_checked_at = Some(self.checked_at);
    }
}

/// `online / total * 100` with two decimals; `"0.00"` for a site never checked
pub fn uptime(total_checks: u64, online_checks: u64) -> String {
    if total_checks == 0 {
        return "0.00".to_string();
    }
    format!("{:.2}", online_checks as f64 / total_checks as f64 * 100.0)
}

/// Records probe samples against the stored counters
pub struct CheckAggregator {
    database: Arc<dyn Database>,
}

impl CheckAggregator {
    pub fn new(database: Arc<dyn Database>) -> Self {
        Self { database }
    }

    /// Persist one sample and return the site as stored afterwards
    pub async fn record(&self, site_id: i64, sample: &StatusSample) -> Result<Site, StoreError> {
        let update = CheckUpdate::from_sample(sample);
        self.database.apply_check(site_id, &update).await
    }
}

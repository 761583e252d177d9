//! Read-side view of sites for status pages and the CLI.

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::database::{Database, Outage, Site, StoreError};
use crate::monitoring::history::{DayStatus, timeline};
use crate::monitoring::types::{OutageType, SiteStatus};

/// Shown instead of a timestamp for sites that were never probed
pub const NEVER_CHECKED: &str = "never";

/// One outage as presented to clients
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutageReport {
    pub id: i64,
    #[serde(rename = "type")]
    pub outage_type: OutageType,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    /// `None` while the outage is still open
    pub duration_seconds: Option<f64>,
}

impl From<&Outage> for OutageReport {
    fn from(outage: &Outage) -> Self {
        Self {
            id: outage.id,
            outage_type: outage.outage_type,
            start_time: outage.start_time,
            end_time: outage.end_time,
            duration_seconds: outage.duration_seconds(),
        }
    }
}

/// Everything a status page shows for one site
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SiteReport {
    pub id: i64,
    pub uuid: Uuid,
    pub name: String,
    pub url: String,
    pub status: SiteStatus,
    pub uptime: String,
    pub response_time_ms: i64,
    pub last_checked: String,
    pub created_at: DateTime<Utc>,
    pub timeline: Vec<DayStatus>,
    pub outages: Vec<OutageReport>,
}

impl SiteReport {
    /// Assemble the report of a site from its stored outages
    pub fn build(site: &Site, outages: &[Outage], window_days: u32, as_of: NaiveDate) -> Self {
        Self {
            id: site.id,
            uuid: site.uuid,
            name: site.name.clone(),
            url: site.url.clone(),
            status: site.last_status,
            uptime: site.uptime(),
            response_time_ms: site.last_response_time,
            last_checked: site
                .last_checked_at
                .map(|t| t.to_rfc3339())
                .unwrap_or_else(|| NEVER_CHECKED.to_string()),
            created_at: site.created_at,
            timeline: timeline(site.created_at, outages, window_days, as_of),
            outages: outages.iter().map(OutageReport::from).collect(),
        }
    }
}

/// System-wide summary shown above the per-site reports
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Banner {
    pub status: SiteStatus,
    pub title: &'static str,
    pub message: &'static str,
}

impl Banner {
    /// Worst current status across sites. Sites never checked only count
    /// when nothing else is known.
    pub fn from_reports(reports: &[SiteReport]) -> Self {
        let has = |status: SiteStatus| reports.iter().any(|r| r.status == status);

        let status = if has(SiteStatus::Down) {
            SiteStatus::Down
        } else if has(SiteStatus::Degraded) {
            SiteStatus::Degraded
        } else if has(SiteStatus::Operational) {
            SiteStatus::Operational
        } else {
            SiteStatus::Unknown
        };

        let (title, message) = match status {
            SiteStatus::Operational => ("All systems operational", "Every monitored site is responding normally."),
            SiteStatus::Degraded => ("Degraded performance", "Some of our systems are responding slowly."),
            SiteStatus::Down => ("Experiencing issues", "We're experiencing issues with some of our systems."),
            SiteStatus::Unknown => ("Status unknown", "No site has been checked yet."),
        };

        Self { status, title, message }
    }
}

/// The whole status page: overall banner plus one report per site
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusPage {
    pub overall: Banner,
    pub sites: Vec<SiteReport>,
}

impl From<Vec<SiteReport>> for StatusPage {
    fn from(sites: Vec<SiteReport>) -> Self {
        Self { overall: Banner::from_reports(&sites), sites }
    }
}

/// Loads sites and outages and turns them into reports
pub struct StatusService {
    database: Arc<dyn Database>,
    window_days: u32,
}

impl StatusService {
    pub fn new(database: Arc<dyn Database>, window_days: u32) -> Self {
        Self { database, window_days }
    }

    /// Report for one site as of the given instant
    pub async fn site_report(&self, site: &Site, as_of: DateTime<Utc>) -> Result<SiteReport, StoreError> {
        // All outages: one that started before the window may still overlap it
        let outages = self.database.list_outages(site.id, None).await?;
        Ok(SiteReport::build(site, &outages, self.window_days, as_of.date_naive()))
    }

    /// Reports for every registered site
    pub async fn reports(&self, as_of: DateTime<Utc>) -> Result<Vec<SiteReport>, StoreError> {
        let sites = self.database.list_sites().await?;
        let mut reports = Vec::with_capacity(sites.len());
        for site in &sites {
            reports.push(self.site_report(site, as_of).await?);
        }
        Ok(reports)
    }

    /// Status page with the overall banner
    pub async fn page(&self, as_of: DateTime<Utc>) -> Result<StatusPage, StoreError> {
        Ok(StatusPage::from(self.reports(as_of).await?))
    }
}

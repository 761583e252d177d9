use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Sentinel stored in `last_response_time` while a site has never been measured.
pub const UNMEASURED_MS: i64 = -1;

/// Health classification of a site, as produced by one probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SiteStatus {
    Operational,
    Degraded,
    Down,
    Unknown,
}

impl SiteStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SiteStatus::Operational => "operational",
            SiteStatus::Degraded => "degraded",
            SiteStatus::Down => "down",
            SiteStatus::Unknown => "unknown",
        }
    }
}

impl fmt::Display for SiteStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for SiteStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "operational" => Ok(SiteStatus::Operational),
            "degraded" => Ok(SiteStatus::Degraded),
            "down" => Ok(SiteStatus::Down),
            "unknown" => Ok(SiteStatus::Unknown),
            other => Err(format!("unknown site status '{other}'")),
        }
    }
}

/// Kind of incident. An operational sample never produces one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutageType {
    Down,
    Degraded,
}

impl OutageType {
    /// The outage a sample with this status would open, if any.
    pub fn from_status(status: SiteStatus) -> Option<Self> {
        match status {
            SiteStatus::Down => Some(OutageType::Down),
            SiteStatus::Degraded => Some(OutageType::Degraded),
            SiteStatus::Operational | SiteStatus::Unknown => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OutageType::Down => "down",
            OutageType::Degraded => "degraded",
        }
    }
}

impl fmt::Display for OutageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for OutageType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "down" => Ok(OutageType::Down),
            "degraded" => Ok(OutageType::Degraded),
            other => Err(format!("unknown outage type '{other}'")),
        }
    }
}

/// Result of a single probe. Consumed by the aggregator and the outage
/// lifecycle, never persisted as-is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusSample {
    /// Classification of the probe
    pub status: SiteStatus,

    /// Elapsed wall-clock time, or [`UNMEASURED_MS`]
    pub response_time_ms: i64,

    /// When the probe completed
    pub observed_at: DateTime<Utc>,
}

impl StatusSample {
    pub fn new(status: SiteStatus, response_time_ms: i64) -> Self {
        Self { status, response_time_ms, observed_at: Utc::now() }
    }

    /// Override the observation time (used by replays and tests)
    pub fn at(mut self, observed_at: DateTime<Utc>) -> Self {
        self.observed_at = observed_at;
        self
    }
}

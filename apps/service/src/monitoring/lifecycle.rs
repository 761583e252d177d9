//! Outage lifecycle: a two-state machine per site.
//!
//! ```text
//! Healthy --down|degraded--> Unhealthy(type)   (opens an outage)
//! Unhealthy --down|degraded--> Unhealthy       (existing outage continues)
//! Unhealthy --operational--> Healthy           (closes the outage)
//! ```
//!
//! `unknown` samples never move the machine.

use std::sync::Arc;
use tracing::{info, warn};

use super::types::{OutageType, SiteStatus, StatusSample};
use crate::database::{Database, Outage, StoreError};

/// What a sample did to the site's outage state
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// A new outage was opened
    Opened(Outage),
    /// An outage was already open and keeps representing the incident
    Continued(Outage),
    /// The open outage was closed
    Closed(Outage),
    /// Healthy and stayed healthy, or the sample carried no information
    Unchanged,
}

pub struct OutageLifecycle {
    database: Arc<dyn Database>,
}

impl OutageLifecycle {
    pub fn new(database: Arc<dyn Database>) -> Self {
        Self { database }
    }

    /// Apply a sample to the site's outage state.
    ///
    /// Callers must not run this concurrently for the same site; the
    /// scheduler holds a per-site guard, and storage refuses a second open
    /// outage regardless.
    pub async fn apply(&self, site_id: i64, sample: &StatusSample) -> Result<Transition, StoreError> {
        match sample.status {
            SiteStatus::Unknown => Ok(Transition::Unchanged),
            SiteStatus::Operational => self.recover(site_id, sample).await,
            SiteStatus::Down | SiteStatus::Degraded => {
                let Some(outage_type) = OutageType::from_status(sample.status) else {
                    return Ok(Transition::Unchanged);
                };
                self.fail(site_id, outage_type, sample).await
            }
        }
    }

    async fn fail(
        &self,
        site_id: i64,
        outage_type: OutageType,
        sample: &StatusSample,
    ) -> Result<Transition, StoreError> {
        // An open outage keeps representing the incident even when the type
        // changes between down and degraded.
        if let Some(active) = self.database.get_active_outage(site_id).await? {
            return Ok(Transition::Continued(active));
        }

        match self.database.open_outage(site_id, outage_type, sample.observed_at).await? {
            Some(outage) => {
                info!(site_id, outage_id = outage.id, outage_type = %outage_type, "Outage opened");
                Ok(Transition::Opened(outage))
            }
            None => {
                // Another writer opened one between our read and insert
                warn!(site_id, "Open outage appeared concurrently, keeping the existing one");
                match self.database.get_active_outage(site_id).await? {
                    Some(active) => Ok(Transition::Continued(active)),
                    None => Ok(Transition::Unchanged),
                }
            }
        }
    }

    async fn recover(&self, site_id: i64, sample: &StatusSample) -> Result<Transition, StoreError> {
        let Some(active) = self.database.get_active_outage(site_id).await? else {
            return Ok(Transition::Unchanged);
        };

        let closed = self.database.close_outage(active.id, sample.observed_at).await?;
        info!(
            site_id,
            outage_id = closed.id,
            duration_seconds = closed.duration_seconds().unwrap_or_default(),
            "Outage closed"
        );
        Ok(Transition::Closed(closed))
    }
}

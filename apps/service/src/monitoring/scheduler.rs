use futures::StreamExt;
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{OwnedMutexGuard, mpsc};
use tokio::task::JoinSet;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, error, info, warn};

use super::aggregator::CheckAggregator;
use super::checker::Prober;
use super::lifecycle::{OutageLifecycle, Transition};
use crate::database::{Database, Site, StoreError};

/// Default time between two probe cycles
pub const DEFAULT_INTERVAL_SECONDS: u64 = 30;

/// Per-site guards so one site's probe, counter update and outage
/// transition never interleave with another cycle's for the same site.
#[derive(Default)]
pub struct SiteLocks {
    locks: Mutex<HashMap<i64, Arc<tokio::sync::Mutex<()>>>>,
}

impl SiteLocks {
    /// Take the guard for a site, or `None` when another cycle still holds it
    pub fn try_acquire(&self, site_id: i64) -> Option<OwnedMutexGuard<()>> {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            locks.entry(site_id).or_default().clone()
        };
        lock.try_lock_owned().ok()
    }

    /// Drop guards of sites that no longer exist
    pub fn retain(&self, site_ids: &[i64]) {
        let mut locks = self.locks.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        locks.retain(|id, _| site_ids.contains(id));
    }
}

/// How processing one site ended
#[derive(Debug)]
pub enum SiteOutcome {
    Checked(Transition),
    /// A previous cycle was still working on this site
    Skipped,
}

/// Summary of one pass over all sites
#[derive(Debug, Default)]
pub struct CycleReport {
    pub checked: usize,
    pub skipped: usize,
    pub failed: usize,
    pub opened: usize,
    pub closed: usize,
    /// First data-consistency failure seen during the cycle
    pub fatal: Option<StoreError>,
}

/// Monitoring scheduler - drives the fixed-interval probe cycle
pub struct MonitoringScheduler {
    database: Arc<dyn Database>,
    prober: Arc<dyn Prober>,
    aggregator: CheckAggregator,
    lifecycle: OutageLifecycle,
    locks: SiteLocks,
    interval: Duration,
    max_concurrency: usize,
}

impl MonitoringScheduler {
    /// Create a new monitoring scheduler
    pub fn new(
        database: Arc<dyn Database>,
        prober: Arc<dyn Prober>,
        interval: Duration,
        max_concurrency: usize,
    ) -> Self {
        Self {
            aggregator: CheckAggregator::new(database.clone()),
            lifecycle: OutageLifecycle::new(database.clone()),
            database,
            prober,
            locks: SiteLocks::default(),
            interval,
            max_concurrency: max_concurrency.max(1),
        }
    }

    /// Probe one site, record the sample and apply the outage transition
    pub async fn process_site(&self, site: &Site) -> Result<SiteOutcome, StoreError> {
        let Some(_guard) = self.locks.try_acquire(site.id) else {
            debug!(site_id = site.id, "Previous cycle still processing site, skipping");
            return Ok(SiteOutcome::Skipped);
        };

        let sample = self.prober.probe(&site.url).await;
        debug!(
            site_id = site.id,
            url = %site.url,
            status = %sample.status,
            response_time_ms = sample.response_time_ms,
            "Probe finished"
        );

        let updated = self.aggregator.record(site.id, &sample).await?;
        let transition = self.lifecycle.apply(site.id, &sample).await?;

        debug!(site_id = site.id, uptime = %updated.uptime(), "Counters updated");
        Ok(SiteOutcome::Checked(transition))
    }

    /// Run a single cycle over every registered site.
    ///
    /// Failures are isolated per site; only listing the sites can fail the
    /// whole cycle.
    pub async fn run_cycle(&self) -> Result<CycleReport, StoreError> {
        let sites = self.database.list_sites().await?;
        let ids: Vec<i64> = sites.iter().map(|s| s.id).collect();
        self.locks.retain(&ids);

        let results: Vec<(Site, Result<SiteOutcome, StoreError>)> = futures::stream::iter(sites)
            .map(|site| async move {
                let outcome = self.process_site(&site).await;
                (site, outcome)
            })
            .buffer_unordered(self.max_concurrency)
            .collect()
            .await;

        let mut report = CycleReport::default();
        for (site, outcome) in results {
            match outcome {
                Ok(SiteOutcome::Checked(transition)) => {
                    report.checked += 1;
                    match transition {
                        Transition::Opened(_) => report.opened += 1,
                        Transition::Closed(_) => report.closed += 1,
                        Transition::Continued(_) | Transition::Unchanged => {}
                    }
                }
                Ok(SiteOutcome::Skipped) => report.skipped += 1,
                Err(e) if e.is_fatal() => {
                    error!(site_id = site.id, name = %site.name, error = %e, "Data consistency violation");
                    report.failed += 1;
                    report.fatal.get_or_insert(e);
                }
                Err(e) => {
                    error!(site_id = site.id, name = %site.name, url = %site.url, error = %e, "Error checking site");
                    report.failed += 1;
                }
            }
        }

        Ok(report)
    }

    /// Run cycles every interval until `shutdown` resolves.
    ///
    /// Each cycle runs as its own task, so a slow cycle never delays the
    /// next tick. Returns an error when a cycle reports a data consistency
    /// violation.
    pub async fn run(self: Arc<Self>, shutdown: impl Future<Output = ()>) -> anyhow::Result<()> {
        let mut timer = interval(self.interval);
        timer.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let (fatal_tx, mut fatal_rx) = mpsc::channel::<StoreError>(1);
        let mut cycles = JoinSet::new();
        tokio::pin!(shutdown);

        info!(interval_seconds = self.interval.as_secs(), "Scheduler started");

        let result: anyhow::Result<()> = loop {
            tokio::select! {
                _ = timer.tick() => {
                    while let Some(joined) = cycles.try_join_next() {
                        if let Err(e) = joined {
                            error!(error = %e, "Cycle task failed");
                        }
                    }

                    let scheduler = self.clone();
                    let fatal_tx = fatal_tx.clone();
                    cycles.spawn(async move {
                        match scheduler.run_cycle().await {
                            Ok(mut report) => {
                                info!(
                                    checked = report.checked,
                                    skipped = report.skipped,
                                    failed = report.failed,
                                    opened = report.opened,
                                    closed = report.closed,
                                    "Probe cycle finished"
                                );
                                if let Some(e) = report.fatal.take() {
                                    report_fatal(&fatal_tx, e);
                                }
                            }
                            Err(e) if e.is_fatal() => report_fatal(&fatal_tx, e),
                            Err(e) => error!(error = %e, "Failed to list sites, skipping cycle"),
                        }
                    });
                }
                Some(e) = fatal_rx.recv() => {
                    error!(error = %e, "Stopping scheduler");
                    break Err(e.into());
                }
                _ = &mut shutdown => {
                    info!("Shutdown requested");
                    break Ok(());
                }
            }
        };

        // Cycles still in flight must not wait on a receiver nobody reads
        drop(fatal_rx);

        if !cycles.is_empty() {
            warn!(in_flight = cycles.len(), "Waiting for running cycles to finish");
        }
        while let Some(joined) = cycles.join_next().await {
            if let Err(e) = joined {
                error!(error = %e, "Cycle task failed");
            }
        }

        info!("Scheduler stopped");
        result
    }
}

/// Hand a fatal error to the run loop without blocking the cycle task.
/// Only the first one stops the scheduler, later ones are just logged.
fn report_fatal(fatal_tx: &mpsc::Sender<StoreError>, e: StoreError) {
    if let Err(TrySendError::Full(e) | TrySendError::Closed(e)) = fatal_tx.try_send(e) {
        warn!(error = %e, "Scheduler already stopping, dropping fatal error");
    }
}

//! Uptime monitoring for a set of registered sites.
//!
//! A [`monitoring::MonitoringScheduler`] probes every site on a fixed
//! interval, folds each sample into the site's rolling counters and keeps
//! at most one open outage per site. [`status::StatusService`] turns the
//! stored data into per-site reports with a day-by-day history.

pub mod config;
pub mod database;
pub mod monitoring;
pub mod pool;
pub mod sites;
pub mod status;
pub mod validation;

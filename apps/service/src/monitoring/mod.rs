/// Monitoring core
///
/// This module is responsible for:
/// - Probing sites and classifying their health (`checker`)
/// - Maintaining rolling check counters (`aggregator`)
/// - Opening and closing outages (`lifecycle`)
/// - Driving the periodic probe cycle (`scheduler`)
/// - Rebuilding the day-by-day status history (`history`)
pub mod aggregator;
pub mod checker;
pub mod history;
pub mod lifecycle;
pub mod scheduler;
pub mod types;

pub use aggregator::{CheckAggregator, CheckUpdate, uptime};
pub use checker::{HttpProber, Prober, classify};
pub use history::{DayStatus, timeline};
pub use lifecycle::{OutageLifecycle, Transition};
pub use scheduler::{CycleReport, MonitoringScheduler};
pub use types::{OutageType, SiteStatus, StatusSample};

//! Day-bucketed status history used by the status timeline.
//!
//! All truncation to midnight happens in UTC so a timeline only depends on
//! its inputs, not on the host's time zone.

use chrono::{DateTime, Days, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::types::{OutageType, SiteStatus};
use crate::database::Outage;

/// Number of days shown on a status timeline
pub const DEFAULT_WINDOW_DAYS: u32 = 90;

/// Derived status of one calendar day
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayStatus {
    pub date: NaiveDate,
    pub status: SiteStatus,
}

/// Build the `window_days` day buckets ending at `as_of`, oldest first.
///
/// Days before the site existed are `unknown`. Any other day is the worst
/// outage overlapping it (`down` beats `degraded`), or `operational`. An
/// open outage extends through `as_of`.
pub fn timeline(
    created_at: DateTime<Utc>,
    outages: &[Outage],
    window_days: u32,
    as_of: NaiveDate,
) -> Vec<DayStatus> {
    let Some(first_day) = as_of.checked_sub_days(Days::new(u64::from(window_days.saturating_sub(1))))
    else {
        return Vec::new();
    };
    let created_day = created_at.date_naive();

    // Resolve each outage to its inclusive day span once
    let spans: Vec<(NaiveDate, NaiveDate, OutageType)> = outages
        .iter()
        .map(|o| {
            let start = o.start_time.date_naive();
            let end = o.end_time.map_or(as_of, |end| end.date_naive());
            (start, end, o.outage_type)
        })
        .collect();

    first_day
        .iter_days()
        .take(window_days as usize)
        .map(|date| DayStatus { date, status: day_status(date, created_day, &spans) })
        .collect()
}

fn day_status(
    date: NaiveDate,
    created_day: NaiveDate,
    spans: &[(NaiveDate, NaiveDate, OutageType)],
) -> SiteStatus {
    if date < created_day {
        return SiteStatus::Unknown;
    }

    let mut status = SiteStatus::Operational;
    for &(start, end, outage_type) in spans {
        if date < start || date > end {
            continue;
        }
        match outage_type {
            OutageType::Down => return SiteStatus::Down,
            OutageType::Degraded => status = SiteStatus::Degraded,
        }
    }
    status
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn at(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
    }

    fn outage(
        id: i64,
        outage_type: OutageType,
        start: DateTime<Utc>,
        end: Option<DateTime<Utc>>,
    ) -> Outage {
        Outage { id, site_id: 1, outage_type, start_time: start, end_time: end }
    }

    fn statuses(days: &[DayStatus]) -> Vec<SiteStatus> {
        days.iter().map(|d| d.status).collect()
    }

    #[test]
    fn test_window_length_and_order() {
        let as_of = day(2024, 6, 30);
        let days = timeline(at(2020, 1, 1, 0), &[], DEFAULT_WINDOW_DAYS, as_of);

        assert_eq!(days.len(), 90);
        assert_eq!(days.last().unwrap().date, as_of);
        assert_eq!(days.first().unwrap().date, as_of - Duration::days(89));
        assert!(days.windows(2).all(|w| w[0].date < w[1].date));
        assert!(days.iter().all(|d| d.status == SiteStatus::Operational));
    }

    #[test]
    fn test_young_site_has_leading_unknown_days() {
        let as_of = day(2024, 6, 30);
        // Site has existed for five calendar days, today included
        let created = at(2024, 6, 26, 15);
        let down = outage(1, OutageType::Down, at(2024, 6, 27, 3), Some(at(2024, 6, 27, 4)));

        let days = timeline(created, &[down], 90, as_of);

        assert_eq!(days.len(), 90);
        assert!(days[..85].iter().all(|d| d.status == SiteStatus::Unknown));
        assert_eq!(
            statuses(&days[85..]),
            vec![
                SiteStatus::Operational,
                SiteStatus::Down,
                SiteStatus::Operational,
                SiteStatus::Operational,
                SiteStatus::Operational,
            ]
        );
    }

    #[test]
    fn test_days_before_creation_ignore_outages() {
        let as_of = day(2024, 6, 30);
        let created = at(2024, 6, 29, 12);
        // Corrupt or imported data predating the site must not leak through
        let early = outage(1, OutageType::Down, at(2024, 6, 1, 0), Some(at(2024, 6, 28, 0)));

        let days = timeline(created, &[early], 5, as_of);

        assert_eq!(
            statuses(&days),
            vec![
                SiteStatus::Unknown,
                SiteStatus::Unknown,
                SiteStatus::Unknown,
                SiteStatus::Operational,
                SiteStatus::Operational,
            ]
        );
    }

    #[test]
    fn test_down_dominates_degraded() {
        let as_of = day(2024, 6, 30);
        let created = at(2024, 1, 1, 0);
        let outages = vec![
            outage(1, OutageType::Degraded, at(2024, 6, 28, 1), Some(at(2024, 6, 28, 2))),
            outage(2, OutageType::Degraded, at(2024, 6, 28, 5), Some(at(2024, 6, 28, 6))),
            outage(3, OutageType::Down, at(2024, 6, 28, 23), Some(at(2024, 6, 29, 0))),
            outage(4, OutageType::Degraded, at(2024, 6, 29, 8), Some(at(2024, 6, 29, 9))),
        ];

        let days = timeline(created, &outages, 3, as_of);

        assert_eq!(
            statuses(&days),
            vec![SiteStatus::Down, SiteStatus::Down, SiteStatus::Operational]
        );
    }

    #[test]
    fn test_open_outage_extends_to_as_of() {
        let as_of = day(2024, 6, 30);
        let open = outage(1, OutageType::Degraded, at(2024, 6, 28, 10), None);

        let days = timeline(at(2024, 1, 1, 0), &[open], 4, as_of);

        assert_eq!(
            statuses(&days),
            vec![
                SiteStatus::Operational,
                SiteStatus::Degraded,
                SiteStatus::Degraded,
                SiteStatus::Degraded,
            ]
        );
    }

    #[test]
    fn test_multi_day_outage_covers_every_day() {
        let as_of = day(2024, 3, 2);
        // Crosses a month boundary in a leap year
        let long = outage(1, OutageType::Down, at(2024, 2, 27, 22), Some(at(2024, 3, 1, 1)));

        let days = timeline(at(2023, 1, 1, 0), &[long], 6, as_of);

        assert_eq!(days[0].date, day(2024, 2, 26));
        assert_eq!(
            statuses(&days),
            vec![
                SiteStatus::Operational,
                SiteStatus::Down,
                SiteStatus::Down,
                SiteStatus::Down,
                SiteStatus::Down,
                SiteStatus::Operational,
            ]
        );
    }

    #[test]
    fn test_zero_window_is_empty() {
        assert!(timeline(at(2024, 1, 1, 0), &[], 0, day(2024, 6, 30)).is_empty());
    }
}

use chrono::{DateTime, Months, Utc};
use serde::Serialize;

use crate::constants::{CHART_LONG_WINDOW_MONTHS, CHART_SHORT_WINDOW_MONTHS};
use crate::models::Record;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ChartPoint {
    /// Epoch milliseconds
    pub x: i64,
    pub y: f64,
}

/// Samples of one parent's children in three overlapping windows
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartBuckets {
    pub three_months: Vec<ChartPoint>,
    pub one_year: Vec<ChartPoint>,
    pub all_time: Vec<ChartPoint>,
    /// Samples older than three months exist
    pub beyond_three_months: bool,
    /// Samples older than one year exist
    pub beyond_one_year: bool,
    pub has_data: bool,
}

/// Bucket `children` (oldest first) relative to `now`
///
/// Children without a sample value are skipped.
pub fn chart_buckets(children: &[Record], now: DateTime<Utc>) -> ChartBuckets {
    let short_cutoff = months_before(now, CHART_SHORT_WINDOW_MONTHS);
    let long_cutoff = months_before(now, CHART_LONG_WINDOW_MONTHS);

    let all_time: Vec<ChartPoint> = children
        .iter()
        .filter_map(|child| {
            child.value.map(|y| ChartPoint {
                x: child.created_at,
                y,
            })
        })
        .collect();

    let three_months: Vec<ChartPoint> = all_time
        .iter()
        .copied()
        .filter(|p| p.x >= short_cutoff)
        .collect();
    let one_year: Vec<ChartPoint> = all_time
        .iter()
        .copied()
        .filter(|p| p.x >= long_cutoff)
        .collect();

    ChartBuckets {
        beyond_three_months: all_time.iter().any(|p| p.x < short_cutoff),
        beyond_one_year: all_time.iter().any(|p| p.x < long_cutoff),
        has_data: !all_time.is_empty(),
        three_months,
        one_year,
        all_time,
    }
}

fn months_before(now: DateTime<Utc>, months: u32) -> i64 {
    now.checked_sub_months(Months::new(months))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
        .timestamp_millis()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn sample(id: &str, at: DateTime<Utc>, value: Option<f64>) -> Record {
        let mut record = Record::bare(id, at.timestamp_millis());
        record.parent_id = Some("mea-1".to_string());
        record.value = value;
        record
    }

    #[test]
    fn test_windows_and_flags() {
        let now = Utc.with_ymd_and_hms(2025, 6, 15, 12, 0, 0).unwrap();
        let children = vec![
            sample("mer-1", now - Duration::days(800), Some(1.0)),
            sample("mer-2", now - Duration::days(200), Some(2.0)),
            sample("mer-3", now - Duration::days(10), None),
            sample("mer-4", now - Duration::days(5), Some(4.0)),
        ];

        let buckets = chart_buckets(&children, now);
        assert_eq!(buckets.all_time.len(), 3);
        assert_eq!(buckets.one_year.len(), 2);
        assert_eq!(buckets.three_months.len(), 1);
        assert_eq!(buckets.three_months[0].y, 4.0);
        assert!(buckets.beyond_three_months);
        assert!(buckets.beyond_one_year);
        assert!(buckets.has_data);
    }

    #[test]
    fn test_recent_only() {
        let now = Utc.with_ymd_and_hms(2025, 6, 15, 12, 0, 0).unwrap();
        let buckets = chart_buckets(&[sample("mer-1", now, Some(3.0))], now);
        assert!(!buckets.beyond_three_months);
        assert!(!buckets.beyond_one_year);
        assert_eq!(buckets.three_months, buckets.all_time);
    }

    #[test]
    fn test_empty() {
        let buckets = chart_buckets(&[], Utc::now());
        assert!(!buckets.has_data);
        assert!(buckets.all_time.is_empty());
    }
}

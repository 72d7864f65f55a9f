//! Read-only presentation helpers. Pure functions over already-loaded rows.

pub mod chart;

use serde::Serialize;
use std::cmp::Ordering;

use crate::constants::{ID_DISPLAY_LENGTH, ID_TRUNCATION_SENTINEL};
use crate::models::Record;

pub use chart::{chart_buckets, ChartBuckets, ChartPoint};

/// Order records for the dashboard
///
/// Hidden records are dropped. Locked records come first, then favorited
/// ones, then by name ignoring case, newest first on ties.
pub fn dashboard(records: Vec<Record>) -> Vec<Record> {
    let mut visible: Vec<Record> = records.into_iter().filter(|r| !r.is_hidden()).collect();
    visible.sort_by(dashboard_order);
    visible
}

fn dashboard_order(a: &Record, b: &Record) -> Ordering {
    b.is_locked()
        .cmp(&a.is_locked())
        .then_with(|| b.is_favorited().cmp(&a.is_favorited()))
        .then_with(|| compare_names(a.name.as_deref(), b.name.as_deref()))
        .then_with(|| b.created_at.cmp(&a.created_at))
}

fn compare_names(a: Option<&str>, b: Option<&str>) -> Ordering {
    let a = a.unwrap_or_default().to_lowercase();
    let b = b.unwrap_or_default().to_lowercase();
    a.cmp(&b)
}

/// An entry of a select list
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SelectOption {
    pub value: String,
    pub label: String,
    pub disable: bool,
}

pub fn select_options(records: &[Record]) -> Vec<SelectOption> {
    records.iter().map(select_option).collect()
}

/// Named records are labelled by name, others by creation time
pub fn select_option(record: &Record) -> SelectOption {
    let id = truncate_id(&record.id);
    let label = match &record.name {
        Some(name) => format!("{} ({})", name, id),
        None => format!("{} ({})", format_timestamp(record.created_at), id),
    };

    SelectOption {
        value: record.id.clone(),
        label,
        disable: record.is_locked() || record.is_hidden(),
    }
}

/// Shorten an id for display, marking it when cut
pub fn truncate_id(id: &str) -> String {
    if id.chars().count() <= ID_DISPLAY_LENGTH {
        return id.to_string();
    }
    let prefix: String = id.chars().take(ID_DISPLAY_LENGTH).collect();
    format!("{}{}", prefix, ID_TRUNCATION_SENTINEL)
}

/// Format epoch milliseconds as `YYYY-MM-DD HH:MM` (UTC)
pub fn format_timestamp(ms: i64) -> String {
    chrono::DateTime::from_timestamp_millis(ms)
        .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| ms.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Status;

    fn parent(id: &str, name: &str, created_at: i64, flags: &[Status]) -> Record {
        let mut record = Record::bare(id, created_at);
        record.name = Some(name.to_string());
        record.status = flags.iter().copied().collect();
        record
    }

    #[test]
    fn test_dashboard_ordering() {
        let records = vec![
            parent("exa-1", "bravo", 10, &[]),
            parent("exa-2", "Alpha", 20, &[]),
            parent("exa-3", "zulu", 30, &[Status::Favorited]),
            parent("exa-4", "yankee", 40, &[Status::Locked]),
            parent("exa-5", "alpha", 50, &[]),
            parent("exa-6", "hidden", 60, &[Status::Hidden, Status::Locked]),
        ];

        let ids: Vec<String> = dashboard(records).into_iter().map(|r| r.id).collect();
        // "alpha" and "Alpha" compare equal, so the newer one wins
        assert_eq!(ids, vec!["exa-4", "exa-3", "exa-5", "exa-2", "exa-1"]);
    }

    #[test]
    fn test_dashboard_ties_prefer_newest() {
        let records = vec![
            parent("exa-1", "same", 10, &[]),
            parent("exa-2", "same", 20, &[]),
        ];
        let ids: Vec<String> = dashboard(records).into_iter().map(|r| r.id).collect();
        assert_eq!(ids, vec!["exa-2", "exa-1"]);
    }

    #[test]
    fn test_select_option_projection() {
        let option = select_option(&parent("exa-1234567890", "Bench", 0, &[Status::Locked]));
        assert_eq!(option.value, "exa-1234567890");
        assert_eq!(option.label, "Bench (exa-1234*)");
        assert!(option.disable);

        let mut child = Record::bare("exr-1", 0);
        child.parent_id = Some("exa-1".to_string());
        let option = select_option(&child);
        assert_eq!(option.label, "1970-01-01 00:00 (exr-1)");
        assert!(!option.disable);
    }

    #[test]
    fn test_truncate_id() {
        assert_eq!(truncate_id("exa-1"), "exa-1");
        assert_eq!(truncate_id("exa-1234"), "exa-1234");
        assert_eq!(truncate_id("exa-12345"), "exa-1234*");
    }
}

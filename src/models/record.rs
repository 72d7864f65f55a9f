use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Status flags carried by display records
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Favorited,
    Locked,
    Hidden,
}

impl Status {
    pub fn parse(input: &str) -> Option<Self> {
        match input {
            "favorited" => Some(Status::Favorited),
            "locked" => Some(Status::Locked),
            "hidden" => Some(Status::Hidden),
            _ => None,
        }
    }
}

/// Severity of a log row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn parse(input: &str) -> Option<Self> {
        match input {
            "debug" => Some(LogLevel::Debug),
            "info" => Some(LogLevel::Info),
            "warn" => Some(LogLevel::Warn),
            "error" => Some(LogLevel::Error),
            _ => None,
        }
    }
}

/// Value of a settings row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SettingValue {
    Bool(bool),
    Number(f64),
    Text(String),
}

/// A row in any table
///
/// Which optional fields are populated depends on the owning table; the
/// schema validator clears everything the table does not own. This is the
/// JSON shape, where absent fields are left out; on disk rows go through
/// `db::store::StoredRecord`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    pub id: String,
    /// Epoch milliseconds
    pub created_at: i64,
    #[serde(default)]
    pub status: BTreeSet<Status>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub desc: Option<String>,
    /// Owning parent (child tables only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    /// Numeric sample (child tables only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub setting: Option<SettingValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<LogLevel>,
    /// Cached copy of the newest non-locked child (parent tables only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_child: Option<Box<Record>>,
}

impl Record {
    /// An empty record with only the common fields set
    pub fn bare(id: impl Into<String>, created_at: i64) -> Self {
        Self {
            id: id.into(),
            created_at,
            status: BTreeSet::new(),
            name: None,
            desc: None,
            parent_id: None,
            note: None,
            value: None,
            setting: None,
            level: None,
            last_child: None,
        }
    }

    pub fn is_locked(&self) -> bool {
        self.status.contains(&Status::Locked)
    }

    pub fn is_favorited(&self) -> bool {
        self.status.contains(&Status::Favorited)
    }

    pub fn is_hidden(&self) -> bool {
        self.status.contains(&Status::Hidden)
    }

    /// Flip membership of `flag`, returning whether it is now set
    pub fn toggle(&mut self, flag: Status) -> bool {
        if self.status.remove(&flag) {
            false
        } else {
            self.status.insert(flag);
            true
        }
    }

    /// Copy of this record without its derived cache
    pub fn without_last_child(mut self) -> Self {
        self.last_child = None;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_toggle_flips_membership() {
        let mut record = Record::bare("exa-1", 100);
        assert!(record.toggle(Status::Favorited));
        assert!(record.is_favorited());
        assert!(!record.toggle(Status::Favorited));
        assert!(!record.is_favorited());
    }

    #[test]
    fn test_json_uses_camel_case() {
        let mut record = Record::bare("exr-1", 100);
        record.parent_id = Some("exa-1".to_string());
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["parentId"], "exa-1");
        assert_eq!(json["createdAt"], 100);
    }

    #[test]
    fn test_json_leaves_out_absent_fields() {
        let mut record = Record::bare("exa-1", 100);
        record.name = Some("Bench".to_string());

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "id": "exa-1", "createdAt": 100, "status": [], "name": "Bench" })
        );

        let back: Record = serde_json::from_value(json).unwrap();
        assert_eq!(back, record);
    }
}

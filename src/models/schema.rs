//! Per-table record validation
//!
//! `validate` turns an untrusted JSON candidate into a clean [`Record`] for
//! one table: defaults are filled in, fields the table does not own are
//! dropped, and every failing field is reported at once.

use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use std::fmt;

use crate::constants::{MAX_NAME_LENGTH, MAX_TEXT_LENGTH};
use crate::models::ids::{Role, TableId};
use crate::models::record::{LogLevel, Record, SettingValue, Status};

/// One failing field of a rejected candidate
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldIssue {
    pub field: String,
    pub reason: String,
}

/// Why a candidate record was rejected
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Rejection {
    pub record_id: Option<String>,
    pub fields: Vec<FieldIssue>,
}

impl Rejection {
    pub fn has_field(&self, field: &str) -> bool {
        self.fields.iter().any(|issue| issue.field == field)
    }
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fields: Vec<String> = self
            .fields
            .iter()
            .map(|issue| format!("{} {}", issue.field, issue.reason))
            .collect();
        match &self.record_id {
            Some(id) => write!(f, "record {} rejected: {}", id, fields.join(", ")),
            None => write!(f, "record rejected: {}", fields.join(", ")),
        }
    }
}

/// Validate `candidate` for `table`, using the current time for defaults
pub fn validate(table: TableId, candidate: &Value) -> Result<Record, Rejection> {
    validate_at(table, candidate, chrono::Utc::now().timestamp_millis())
}

/// Validate `candidate` for `table`, defaulting `createdAt` to `now`
pub fn validate_at(table: TableId, candidate: &Value, now: i64) -> Result<Record, Rejection> {
    let Some(object) = candidate.as_object() else {
        return Err(Rejection {
            record_id: None,
            fields: vec![FieldIssue {
                field: "record".to_string(),
                reason: "must be an object".to_string(),
            }],
        });
    };

    let mut checker = Checker {
        object,
        issues: Vec::new(),
    };

    let id = checker.id(table);
    let created_at = checker.created_at(now);
    let status = checker.status();
    let mut record = Record::bare(id.clone().unwrap_or_default(), created_at);
    record.status = status;

    match (table, table.role()) {
        (TableId::Settings, _) => {
            record.setting = checker.setting();
        }
        (TableId::Logs, _) => {
            record.level = checker.level();
            record.name = checker.required_text("name", MAX_NAME_LENGTH);
            record.desc = checker.optional_text("desc", usize::MAX);
        }
        (_, Role::Parent { .. }) => {
            record.name = checker.required_text("name", MAX_NAME_LENGTH);
            record.desc = checker.optional_text("desc", MAX_TEXT_LENGTH);
        }
        (_, Role::Child { parent }) => {
            record.parent_id = checker.parent_id(parent);
            record.note = checker.optional_text("note", MAX_TEXT_LENGTH);
            record.value = checker.sample_value();
        }
        (_, Role::Standalone) => {}
    }

    if checker.issues.is_empty() {
        Ok(record)
    } else {
        Err(Rejection {
            record_id: id.or_else(|| {
                object
                    .get("id")
                    .and_then(Value::as_str)
                    .map(str::to_string)
            }),
            fields: checker.issues,
        })
    }
}

struct Checker<'a> {
    object: &'a Map<String, Value>,
    issues: Vec<FieldIssue>,
}

impl<'a> Checker<'a> {
    fn reject(&mut self, field: &str, reason: impl Into<String>) {
        self.issues.push(FieldIssue {
            field: field.to_string(),
            reason: reason.into(),
        });
    }

    /// Present and not null
    fn field(&self, name: &str) -> Option<&'a Value> {
        self.object.get(name).filter(|v| !v.is_null())
    }

    fn id(&mut self, table: TableId) -> Option<String> {
        match self.field("id") {
            None => Some(table.new_record_id()),
            Some(Value::String(id)) if table.owns_id(id) => Some(id.clone()),
            Some(Value::String(_)) => {
                self.reject("id", format!("must start with \"{}-\"", table.code()));
                None
            }
            Some(_) => {
                self.reject("id", "must be a string");
                None
            }
        }
    }

    fn created_at(&mut self, now: i64) -> i64 {
        match self.field("createdAt") {
            None => now,
            Some(value) => match value.as_i64() {
                Some(ms) if ms >= 0 => ms,
                _ => {
                    self.reject("createdAt", "must be a non-negative integer timestamp");
                    now
                }
            },
        }
    }

    fn status(&mut self) -> BTreeSet<Status> {
        let mut status = BTreeSet::new();
        match self.field("status") {
            None => {}
            Some(Value::Array(flags)) => {
                for flag in flags {
                    match flag.as_str().and_then(Status::parse) {
                        Some(parsed) => {
                            status.insert(parsed);
                        }
                        None => self.reject("status", format!("unknown flag {}", flag)),
                    }
                }
            }
            Some(_) => self.reject("status", "must be an array"),
        }
        status
    }

    fn required_text(&mut self, name: &str, max: usize) -> Option<String> {
        if self.field(name).is_none() {
            self.reject(name, "is required");
            return None;
        }
        let text = self.optional_text(name, max)?;
        if text.trim().is_empty() {
            self.reject(name, "must not be empty");
            return None;
        }
        Some(text)
    }

    fn optional_text(&mut self, name: &str, max: usize) -> Option<String> {
        match self.field(name) {
            None => None,
            Some(Value::String(text)) if text.chars().count() <= max => Some(text.clone()),
            Some(Value::String(_)) => {
                self.reject(name, format!("must be at most {} characters", max));
                None
            }
            Some(_) => {
                self.reject(name, "must be a string");
                None
            }
        }
    }

    fn parent_id(&mut self, parent: TableId) -> Option<String> {
        match self.field("parentId") {
            Some(Value::String(id)) if parent.owns_id(id) => Some(id.clone()),
            Some(Value::String(_)) => {
                self.reject(
                    "parentId",
                    format!("must reference a {} record", parent.name()),
                );
                None
            }
            Some(_) => {
                self.reject("parentId", "must be a string");
                None
            }
            None => {
                self.reject("parentId", "is required");
                None
            }
        }
    }

    fn sample_value(&mut self) -> Option<f64> {
        match self.field("value") {
            None => None,
            Some(value) => match value.as_f64() {
                Some(number) if number.is_finite() => Some(number),
                _ => {
                    self.reject("value", "must be a finite number");
                    None
                }
            },
        }
    }

    fn setting(&mut self) -> Option<SettingValue> {
        match self.field("setting") {
            None => {
                self.reject("setting", "is required");
                None
            }
            Some(value) => match serde_json::from_value::<SettingValue>(value.clone()) {
                Ok(setting) => Some(setting),
                Err(_) => {
                    self.reject("setting", "must be {\"bool\"|\"number\"|\"text\": value}");
                    None
                }
            },
        }
    }

    fn level(&mut self) -> Option<LogLevel> {
        match self.field("level").and_then(Value::as_str).map(LogLevel::parse) {
            Some(Some(level)) => Some(level),
            _ => {
                self.reject("level", "must be one of debug, info, warn, error");
                None
            }
        }
    }
}

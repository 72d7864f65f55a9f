use serde::{Deserialize, Serialize};
use std::fmt;

use crate::constants::{ID_SEPARATOR, TABLE_CODE_LEN};

/// Every table known to the application
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TableId {
    Settings,
    Logs,
    Examples,
    ExampleResults,
    Measurements,
    MeasurementResults,
}

/// Position of a table in the single-level parent/child hierarchy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Standalone,
    Parent { child: TableId },
    Child { parent: TableId },
}

impl TableId {
    pub const ALL: [TableId; 6] = [
        TableId::Settings,
        TableId::Logs,
        TableId::Examples,
        TableId::ExampleResults,
        TableId::Measurements,
        TableId::MeasurementResults,
    ];

    pub fn role(self) -> Role {
        match self {
            TableId::Settings | TableId::Logs => Role::Standalone,
            TableId::Examples => Role::Parent {
                child: TableId::ExampleResults,
            },
            TableId::ExampleResults => Role::Child {
                parent: TableId::Examples,
            },
            TableId::Measurements => Role::Parent {
                child: TableId::MeasurementResults,
            },
            TableId::MeasurementResults => Role::Child {
                parent: TableId::Measurements,
            },
        }
    }

    /// Storage name of the table
    pub fn name(self) -> &'static str {
        match self {
            TableId::Settings => "settings",
            TableId::Logs => "logs",
            TableId::Examples => "examples",
            TableId::ExampleResults => "example_results",
            TableId::Measurements => "measurements",
            TableId::MeasurementResults => "measurement_results",
        }
    }

    /// Three letter code used as the record id prefix
    pub fn code(self) -> &'static str {
        match self {
            TableId::Settings => "set",
            TableId::Logs => "log",
            TableId::Examples => "exa",
            TableId::ExampleResults => "exr",
            TableId::Measurements => "mea",
            TableId::MeasurementResults => "mer",
        }
    }

    /// URL slug
    pub fn slug(self) -> &'static str {
        match self {
            TableId::Settings => "settings",
            TableId::Logs => "logs",
            TableId::Examples => "examples",
            TableId::ExampleResults => "example-results",
            TableId::Measurements => "measurements",
            TableId::MeasurementResults => "measurement-results",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.code() == code)
    }

    /// Accepts a table name, a slug or a table code
    pub fn from_name_or_slug(input: &str) -> Option<Self> {
        let normalized = input.trim().to_ascii_lowercase().replace('-', "_");
        Self::ALL
            .into_iter()
            .find(|t| t.name() == normalized || t.code() == normalized)
    }

    /// Generate a fresh id for a record in this table
    pub fn new_record_id(self) -> String {
        format!("{}{}{}", self.code(), ID_SEPARATOR, uuid::Uuid::new_v4())
    }

    /// Whether `id` carries this table's prefix
    pub fn owns_id(self, id: &str) -> bool {
        table_code(id) == Some(self.code())
    }
}

impl fmt::Display for TableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Whether `input` has the shape of a record id: a lowercase table code,
/// the separator, and a non-empty remainder
pub fn is_record_id(input: &str) -> bool {
    table_code(input).is_some()
}

/// Extract the table code from a record id
pub fn table_code(id: &str) -> Option<&str> {
    let code = id.get(..TABLE_CODE_LEN)?;
    let rest = &id[TABLE_CODE_LEN..];
    let mut chars = rest.chars();
    if !code.chars().all(|c| c.is_ascii_lowercase()) || chars.next() != Some(ID_SEPARATOR) {
        return None;
    }
    if chars.as_str().is_empty() {
        return None;
    }
    Some(code)
}

/// Resolve the owning table of a record id from its prefix
pub fn table_of(id: &str) -> Option<TableId> {
    table_code(id).and_then(TableId::from_code)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_code_extraction() {
        assert_eq!(table_code("exa-1"), Some("exa"));
        assert_eq!(table_code("exr-8f1c"), Some("exr"));
        assert_eq!(table_code("exa-"), None);
        assert_eq!(table_code("exa1"), None);
        assert_eq!(table_code("EXA-1"), None);
        assert_eq!(table_code("ex"), None);
        assert_eq!(table_code(""), None);
    }

    #[test]
    fn test_table_of_routes_by_prefix() {
        assert_eq!(table_of("exa-1"), Some(TableId::Examples));
        assert_eq!(table_of("mer-abc"), Some(TableId::MeasurementResults));
        assert_eq!(table_of("zzz-abc"), None);
    }

    #[test]
    fn test_from_name_or_slug() {
        assert_eq!(
            TableId::from_name_or_slug("example-results"),
            Some(TableId::ExampleResults)
        );
        assert_eq!(
            TableId::from_name_or_slug("example_results"),
            Some(TableId::ExampleResults)
        );
        assert_eq!(TableId::from_name_or_slug("mea"), Some(TableId::Measurements));
        assert_eq!(TableId::from_name_or_slug("widgets"), None);
    }

    #[test]
    fn test_roles_are_symmetric() {
        for table in TableId::ALL {
            match table.role() {
                Role::Parent { child } => {
                    assert_eq!(child.role(), Role::Child { parent: table })
                }
                Role::Child { parent } => {
                    assert_eq!(parent.role(), Role::Parent { child: table })
                }
                Role::Standalone => {}
            }
        }
    }

    #[test]
    fn test_new_record_id_is_owned() {
        for table in TableId::ALL {
            let id = table.new_record_id();
            assert!(table.owns_id(&id), "{} should own {}", table, id);
            assert_eq!(table_of(&id), Some(table));
        }
    }
}

use redb::TableDefinition;

use crate::models::{Role, TableId};

/// Child index key: (parent_id, created_at, child_id)
///
/// Range scans over a parent id yield its children ordered by `created_at`,
/// then by child id.
pub type ChildKey = (&'static str, i64, &'static str);

pub type RecordTableDefinition = TableDefinition<'static, &'static str, &'static [u8]>;
pub type IndexTableDefinition = TableDefinition<'static, ChildKey, ()>;

/// Settings table: set-<key> -> Record (serialized)
pub const SETTINGS: TableDefinition<&str, &[u8]> = TableDefinition::new("settings");

/// Logs table: log-<uuid> -> Record (serialized)
pub const LOGS: TableDefinition<&str, &[u8]> = TableDefinition::new("logs");

/// Examples table: exa-<uuid> -> Record (serialized)
pub const EXAMPLES: TableDefinition<&str, &[u8]> = TableDefinition::new("examples");

/// Example results table: exr-<uuid> -> Record (serialized)
pub const EXAMPLE_RESULTS: TableDefinition<&str, &[u8]> =
    TableDefinition::new("example_results");

/// Example results by parent, for cascade delete and last child lookup
pub const EXAMPLE_RESULTS_BY_PARENT: TableDefinition<ChildKey, ()> =
    TableDefinition::new("example_results_by_parent");

/// Measurements table: mea-<uuid> -> Record (serialized)
pub const MEASUREMENTS: TableDefinition<&str, &[u8]> = TableDefinition::new("measurements");

/// Measurement results table: mer-<uuid> -> Record (serialized)
pub const MEASUREMENT_RESULTS: TableDefinition<&str, &[u8]> =
    TableDefinition::new("measurement_results");

/// Measurement results by parent
pub const MEASUREMENT_RESULTS_BY_PARENT: TableDefinition<ChildKey, ()> =
    TableDefinition::new("measurement_results_by_parent");

/// Record table backing `table`
pub fn records(table: TableId) -> RecordTableDefinition {
    match table {
        TableId::Settings => SETTINGS,
        TableId::Logs => LOGS,
        TableId::Examples => EXAMPLES,
        TableId::ExampleResults => EXAMPLE_RESULTS,
        TableId::Measurements => MEASUREMENTS,
        TableId::MeasurementResults => MEASUREMENT_RESULTS,
    }
}

/// Parent, child and index tables of one parent/child pair
#[derive(Clone, Copy)]
pub struct FamilyTables {
    pub parent: TableId,
    pub child: TableId,
    pub parents: RecordTableDefinition,
    pub children: RecordTableDefinition,
    pub index: IndexTableDefinition,
}

/// Family tables for a parent or child table, `None` for standalone tables
pub fn family(table: TableId) -> Option<FamilyTables> {
    let (parent, child) = match table.role() {
        Role::Standalone => return None,
        Role::Parent { child } => (table, child),
        Role::Child { parent } => (parent, table),
    };
    let index = match child {
        TableId::ExampleResults => EXAMPLE_RESULTS_BY_PARENT,
        TableId::MeasurementResults => MEASUREMENT_RESULTS_BY_PARENT,
        _ => return None,
    };
    Some(FamilyTables {
        parent,
        child,
        parents: records(parent),
        children: records(child),
        index,
    })
}

/// All child index tables
pub const INDEXES: [IndexTableDefinition; 2] =
    [EXAMPLE_RESULTS_BY_PARENT, MEASUREMENT_RESULTS_BY_PARENT];

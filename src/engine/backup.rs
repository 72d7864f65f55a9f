//! Whole-database backup and restore

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;

use crate::constants::{DATABASE_VERSION, ERR_WRONG_APP_NAME};
use crate::engine::import::ImportReport;
use crate::error::{AppError, Result};
use crate::models::TableId;
use crate::registry::ServiceRegistry;

/// Parent/child pairs in restore order
const FAMILIES: [(TableId, TableId); 2] = [
    (TableId::Examples, TableId::ExampleResults),
    (TableId::Measurements, TableId::MeasurementResults),
];

/// Serialized backup
///
/// Parent rows never carry `lastChild`; it is rebuilt on restore.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupPayload {
    pub app_name: String,
    pub database_version: String,
    /// Epoch milliseconds
    pub created_at: i64,
    #[serde(default)]
    pub settings: Vec<Value>,
    #[serde(default)]
    pub logs: Vec<Value>,
    #[serde(default)]
    pub examples: Vec<Value>,
    #[serde(default)]
    pub example_results: Vec<Value>,
    #[serde(default)]
    pub measurements: Vec<Value>,
    #[serde(default)]
    pub measurement_results: Vec<Value>,
}

impl BackupPayload {
    fn rows(&self, table: TableId) -> &[Value] {
        match table {
            TableId::Settings => &self.settings,
            TableId::Logs => &self.logs,
            TableId::Examples => &self.examples,
            TableId::ExampleResults => &self.example_results,
            TableId::Measurements => &self.measurements,
            TableId::MeasurementResults => &self.measurement_results,
        }
    }

    fn rows_mut(&mut self, table: TableId) -> &mut Vec<Value> {
        match table {
            TableId::Settings => &mut self.settings,
            TableId::Logs => &mut self.logs,
            TableId::Examples => &mut self.examples,
            TableId::ExampleResults => &mut self.example_results,
            TableId::Measurements => &mut self.measurements,
            TableId::MeasurementResults => &mut self.measurement_results,
        }
    }
}

/// Per-table import reports of a restore
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RestoreReport {
    pub tables: Vec<TableRestore>,
    /// Parents whose `lastChild` was recomputed after all rows were in
    pub recomputed_parents: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct TableRestore {
    pub table: TableId,
    pub report: ImportReport,
}

impl RestoreReport {
    pub fn report(&self, table: TableId) -> Option<&ImportReport> {
        self.tables
            .iter()
            .find(|entry| entry.table == table)
            .map(|entry| &entry.report)
    }
}

pub struct BackupService<'a> {
    registry: &'a ServiceRegistry,
    app_name: &'a str,
}

impl<'a> BackupService<'a> {
    pub fn new(registry: &'a ServiceRegistry, app_name: &'a str) -> Self {
        Self { registry, app_name }
    }

    /// Export every table
    pub async fn create_backup(&self) -> Result<BackupPayload> {
        let mut payload = BackupPayload {
            app_name: self.app_name.to_string(),
            database_version: DATABASE_VERSION.to_string(),
            created_at: chrono::Utc::now().timestamp_millis(),
            settings: Vec::new(),
            logs: Vec::new(),
            examples: Vec::new(),
            example_results: Vec::new(),
            measurements: Vec::new(),
            measurement_results: Vec::new(),
        };

        for table in TableId::ALL {
            let records = self.registry.service(table).export().await?;
            *payload.rows_mut(table) = records
                .iter()
                .map(serde_json::to_value)
                .collect::<std::result::Result<_, _>>()?;
        }

        tracing::info!(
            "Backup created: {} rows",
            TableId::ALL
                .iter()
                .map(|&t| payload.rows(t).len())
                .sum::<usize>()
        );
        Ok(payload)
    }

    /// Restore a backup on top of the current data
    ///
    /// Settings go first so preferences survive a failure further on. Each
    /// parent/child pair is bulk imported parents first, then every
    /// affected parent gets one `lastChild` recompute.
    pub async fn restore(&self, payload: BackupPayload, include_logs: bool) -> Result<RestoreReport> {
        if payload.app_name != self.app_name {
            tracing::warn!("Refusing backup from app {:?}", payload.app_name);
            return Err(AppError::InvalidInput(ERR_WRONG_APP_NAME.to_string()));
        }

        let mut tables = Vec::new();

        let settings = self
            .registry
            .service(TableId::Settings)
            .put_many(payload.settings.clone())
            .await?;
        tables.push(TableRestore {
            table: TableId::Settings,
            report: settings,
        });

        if include_logs {
            let logs = self
                .registry
                .service(TableId::Logs)
                .bulk_import(payload.logs.clone())
                .await?;
            tables.push(TableRestore {
                table: TableId::Logs,
                report: logs,
            });
        }

        let mut recomputed_parents = 0;
        for (parent, child) in FAMILIES {
            let mut affected = BTreeSet::new();

            for table in [parent, child] {
                let (report, touched) = self
                    .registry
                    .service(table)
                    .import_records(payload.rows(table).to_vec(), false)
                    .await?;
                affected.extend(touched);
                tables.push(TableRestore { table, report });
            }

            if !affected.is_empty() {
                recomputed_parents += self
                    .registry
                    .service(parent)
                    .update_last_children(affected.into_iter().collect())
                    .await?;
            }
        }

        tracing::info!(
            "Backup restored: {} tables, {} parents recomputed",
            tables.len(),
            recomputed_parents
        );

        Ok(RestoreReport {
            tables,
            recomputed_parents,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::changes::ChangeFeed;
    use crate::db::open_database;
    use serde_json::json;
    use tempfile::TempDir;

    fn registry(temp_dir: &TempDir, name: &str) -> ServiceRegistry {
        let db = open_database(temp_dir.path().join(name)).unwrap();
        ServiceRegistry::new(db, ChangeFeed::new(16))
    }

    #[tokio::test]
    async fn test_backup_round_trip_rebuilds_last_child() {
        let temp_dir = TempDir::new().unwrap();
        let source = registry(&temp_dir, "source.db");
        source.ensure_defaults().await.unwrap();

        source
            .service(TableId::Examples)
            .add(json!({ "id": "exa-1", "createdAt": 1, "name": "Bench" }))
            .await
            .unwrap();
        source
            .service(TableId::ExampleResults)
            .add(json!({ "id": "exr-1", "createdAt": 10, "parentId": "exa-1" }))
            .await
            .unwrap();
        source
            .service(TableId::ExampleResults)
            .add(json!({ "id": "exr-2", "createdAt": 20, "parentId": "exa-1" }))
            .await
            .unwrap();

        let payload = BackupService::new(&source, "Recordbook")
            .create_backup()
            .await
            .unwrap();
        assert_eq!(payload.examples.len(), 1);
        assert!(payload.examples[0].get("lastChild").map_or(true, Value::is_null));
        assert_eq!(payload.example_results.len(), 2);

        let target = registry(&temp_dir, "target.db");
        let report = BackupService::new(&target, "Recordbook")
            .restore(payload, false)
            .await
            .unwrap();
        assert_eq!(report.recomputed_parents, 1);
        assert!(report.report(TableId::Logs).is_none());
        assert_eq!(report.report(TableId::ExampleResults).unwrap().imported_count, 2);

        let parent = target.get_record("exa-1").await.unwrap();
        assert_eq!(parent.last_child.unwrap().id, "exr-2");
        assert_eq!(target.service(TableId::Settings).count().await.unwrap(), 5);
    }

    #[tokio::test]
    async fn test_restore_rejects_other_app() {
        let temp_dir = TempDir::new().unwrap();
        let registry = registry(&temp_dir, "test.db");
        let service = BackupService::new(&registry, "Recordbook");

        let mut payload = service.create_backup().await.unwrap();
        payload.app_name = "Something Else".to_string();

        let result = service.restore(payload, true).await;
        assert!(matches!(result, Err(AppError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_restore_logs_only_when_asked() {
        let temp_dir = TempDir::new().unwrap();
        let source = registry(&temp_dir, "source.db");
        source
            .service(TableId::Logs)
            .add(json!({ "id": "log-1", "createdAt": 5, "level": "info", "name": "hello" }))
            .await
            .unwrap();
        let payload = BackupService::new(&source, "Recordbook")
            .create_backup()
            .await
            .unwrap();

        let without = registry(&temp_dir, "without.db");
        BackupService::new(&without, "Recordbook")
            .restore(payload.clone(), false)
            .await
            .unwrap();
        assert_eq!(without.service(TableId::Logs).count().await.unwrap(), 0);

        let with = registry(&temp_dir, "with.db");
        BackupService::new(&with, "Recordbook")
            .restore(payload, true)
            .await
            .unwrap();
        assert_eq!(with.service(TableId::Logs).count().await.unwrap(), 1);
    }
}

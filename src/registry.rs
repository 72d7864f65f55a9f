use std::sync::Arc;

use crate::changes::ChangeFeed;
use crate::db::Db;
use crate::engine::{seed_settings, TableService};
use crate::error::{AppError, Result};
use crate::models::{ids, Record, TableId};

/// One service per table, resolvable by table name, slug, code or record id
#[derive(Clone)]
pub struct ServiceRegistry {
    db: Db,
    feed: ChangeFeed,
    services: Arc<Vec<TableService>>,
}

impl ServiceRegistry {
    pub fn new(db: Db, feed: ChangeFeed) -> Self {
        let services = TableId::ALL
            .iter()
            .map(|&table| TableService::new(db.clone(), feed.clone(), table))
            .collect();
        Self {
            db,
            feed,
            services: Arc::new(services),
        }
    }

    pub fn feed(&self) -> &ChangeFeed {
        &self.feed
    }

    /// Service of a known table
    pub fn service(&self, table: TableId) -> &TableService {
        &self.services[table as usize]
    }

    /// Resolve a record id (by its table code prefix), a table name, a slug
    /// or a table code to its service
    pub fn resolve(&self, input: &str) -> Result<&TableService> {
        let table = if ids::is_record_id(input) {
            ids::table_of(input)
        } else {
            TableId::from_name_or_slug(input)
        };

        table
            .map(|table| self.service(table))
            .ok_or_else(|| AppError::UnknownTable(input.to_string()))
    }

    /// Resolve a table name, slug or code; record ids are refused so a
    /// table-wide operation is never aimed at a table by one of its rows
    pub fn resolve_table(&self, input: &str) -> Result<&TableService> {
        if ids::is_record_id(input) {
            tracing::warn!("Record id {} given where a table was expected", input);
            return Err(AppError::UnknownTable(input.to_string()));
        }
        TableId::from_name_or_slug(input)
            .map(|table| self.service(table))
            .ok_or_else(|| AppError::UnknownTable(input.to_string()))
    }

    /// Fetch any record by id
    pub async fn get_record(&self, id: &str) -> Result<Record> {
        self.resolve(id)?.get(id).await
    }

    /// Delete any record by id
    pub async fn remove_record(&self, id: &str) -> Result<Record> {
        self.resolve(id)?.remove(id).await
    }

    /// Insert default rows for tables that need them
    pub async fn ensure_defaults(&self) -> Result<usize> {
        let db = self.db.clone();
        let seeded = tokio::task::spawn_blocking(move || -> Result<usize> {
            let write_txn = db.begin_write()?;
            let seeded = seed_settings(&write_txn, chrono::Utc::now().timestamp_millis())?;
            write_txn.commit()?;
            Ok(seeded)
        })
        .await??;

        if seeded > 0 {
            tracing::info!("Seeded {} default settings", seeded);
            self.feed.publish(&[TableId::Settings]);
        }
        Ok(seeded)
    }
}

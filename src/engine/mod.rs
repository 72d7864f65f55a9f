//! Association engine
//!
//! One [`TableService`] per table. Mutations run in a single redb write
//! transaction that spans the table and, for parent and child tables, its
//! counterpart plus the child index, so a parent's cached `lastChild` is
//! never observed out of step with its children. A failed step drops the
//! transaction, which rolls everything back.

pub mod backup;
pub mod family;
pub mod import;
pub mod last_child;

use redb::{ReadTransaction, ReadableDatabase, ReadableTableMetadata, WriteTransaction};
use serde_json::Value;

use crate::changes::{ChangeFeed, LiveQuery};
use crate::constants::*;
use crate::db::store;
use crate::db::tables::{self, FamilyTables};
use crate::db::Db;
use crate::error::{AppError, Result};
use crate::models::{schema, Record, Role, SettingValue, Status, TableId};
use crate::query::{self, ChartBuckets, SelectOption};

use self::family::Family;

/// A table and its place in the parent/child hierarchy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableDescriptor {
    pub table: TableId,
    pub role: Role,
}

impl TableDescriptor {
    pub fn of(table: TableId) -> Self {
        Self {
            table,
            role: table.role(),
        }
    }

    /// Tables a mutation of this table may write to
    pub fn touched(&self) -> Vec<TableId> {
        match self.role {
            Role::Standalone => vec![self.table],
            Role::Parent { child } => vec![self.table, child],
            Role::Child { parent } => vec![self.table, parent],
        }
    }

    fn family(&self) -> Result<FamilyTables> {
        tables::family(self.table).ok_or_else(|| {
            AppError::InvalidInput(format!("{} has no parent or child table", self.table))
        })
    }
}

/// CRUD, import/export and views over one table
#[derive(Clone)]
pub struct TableService {
    db: Db,
    feed: ChangeFeed,
    descriptor: TableDescriptor,
}

impl TableService {
    pub fn new(db: Db, feed: ChangeFeed, table: TableId) -> Self {
        Self {
            db,
            feed,
            descriptor: TableDescriptor::of(table),
        }
    }

    pub fn table(&self) -> TableId {
        self.descriptor.table
    }

    /// Run `work` against a read snapshot
    async fn read<T, F>(&self, work: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&ReadTransaction) -> Result<T> + Send + 'static,
    {
        let db = self.db.clone();
        tokio::task::spawn_blocking(move || {
            let read_txn = db.begin_read()?;
            work(&read_txn)
        })
        .await?
    }

    /// Run `work` in one write transaction and announce the change once it
    /// has committed
    async fn write<T, F>(&self, work: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&WriteTransaction) -> Result<T> + Send + 'static,
    {
        let db = self.db.clone();
        let value = tokio::task::spawn_blocking(move || -> Result<T> {
            let write_txn = db.begin_write()?;
            let value = work(&write_txn)?;
            write_txn.commit()?;
            Ok(value)
        })
        .await??;

        self.feed.publish(&self.descriptor.touched());
        Ok(value)
    }

    /// Point lookup
    pub async fn get(&self, id: &str) -> Result<Record> {
        let table = self.descriptor.table;
        let id = id.to_string();
        self.read(move |txn| {
            let rows = txn.open_table(tables::records(table))?;
            store::get(&rows, &id)?.ok_or_else(|| AppError::not_found(table, id))
        })
        .await
    }

    /// Every row, ordered by id
    pub async fn list(&self) -> Result<Vec<Record>> {
        let table = self.descriptor.table;
        self.read(move |txn| {
            let rows = txn.open_table(tables::records(table))?;
            store::all(&rows)
        })
        .await
    }

    pub async fn count(&self) -> Result<u64> {
        let table = self.descriptor.table;
        self.read(move |txn| Ok(txn.open_table(tables::records(table))?.len()?))
            .await
    }

    /// Children of `parent_id`, oldest first
    pub async fn children_of(&self, parent_id: &str) -> Result<Vec<Record>> {
        let family = self.descriptor.family()?;
        let parent_id = parent_id.to_string();
        self.read(move |txn| {
            let rows = txn.open_table(family.children)?;
            let index = txn.open_table(family.index)?;
            store::children(&index, &rows, &parent_id)
        })
        .await
    }

    /// Validate and insert a new record; fails if the id is taken
    pub async fn add(&self, candidate: Value) -> Result<Record> {
        self.store(candidate, false).await
    }

    /// Validate and upsert a record
    pub async fn put(&self, candidate: Value) -> Result<Record> {
        self.store(candidate, true).await
    }

    async fn store(&self, candidate: Value, overwrite: bool) -> Result<Record> {
        let descriptor = self.descriptor;
        let record = validate(descriptor.table, &candidate)?;
        let stored = self
            .write(move |txn| store_record(txn, descriptor, record, overwrite))
            .await?;
        tracing::info!("Stored {} record {}", descriptor.table, stored.id);
        Ok(stored)
    }

    /// Shallow-merge `partial` over the stored record and write it back
    ///
    /// The id cannot be changed. Moving a child to another parent refreshes
    /// both parents.
    pub async fn update(&self, id: &str, partial: Value) -> Result<Record> {
        let Value::Object(patch) = partial else {
            return Err(AppError::InvalidInput(
                "update must be a JSON object".to_string(),
            ));
        };

        let descriptor = self.descriptor;
        let id = id.to_string();
        let updated = self
            .write(move |txn| {
                let existing = load(txn, descriptor.table, &id)?
                    .ok_or_else(|| AppError::not_found(descriptor.table, &id))?;

                let mut merged = serde_json::to_value(&existing)?;
                if let Value::Object(fields) = &mut merged {
                    for (key, value) in patch {
                        if key != "id" {
                            fields.insert(key, value);
                        }
                    }
                }

                let record = validate(descriptor.table, &merged)?;
                store_record(txn, descriptor, record, true)
            })
            .await?;

        tracing::info!("Updated {} record {}", descriptor.table, updated.id);
        Ok(updated)
    }

    /// Delete a record, cascading to children for parent tables, and return
    /// the pre-delete snapshot
    pub async fn remove(&self, id: &str) -> Result<Record> {
        let descriptor = self.descriptor;
        let id = id.to_string();
        self.write(move |txn| match descriptor.role {
            Role::Standalone => {
                let mut rows = txn.open_table(tables::records(descriptor.table))?;
                let removed = store::delete(&mut rows, &id)?
                    .ok_or_else(|| AppError::not_found(descriptor.table, &id))?;
                tracing::info!("Removed {} record {}", descriptor.table, id);
                Ok(removed)
            }
            Role::Parent { child } => {
                let mut family = Family::open(txn, descriptor.family()?)?;
                let (removed, children) = family
                    .delete_parent(&id)?
                    .ok_or_else(|| AppError::not_found(descriptor.table, &id))?;
                tracing::info!(
                    "Removed {} record {} and {} {} records",
                    descriptor.table,
                    id,
                    children,
                    child
                );
                Ok(removed)
            }
            Role::Child { .. } => {
                let mut family = Family::open(txn, descriptor.family()?)?;
                let removed = family
                    .delete_child(&id)?
                    .ok_or_else(|| AppError::not_found(descriptor.table, &id))?;
                if let Some(parent_id) = &removed.parent_id {
                    family.refresh_last_child(parent_id)?;
                }
                tracing::info!("Removed {} record {}", descriptor.table, id);
                Ok(removed)
            }
        })
        .await
    }

    /// Wipe the table
    ///
    /// Parent tables take their child table with them; child tables strip
    /// `lastChild` from every parent; settings are reseeded with defaults.
    pub async fn clear(&self) -> Result<()> {
        let descriptor = self.descriptor;
        self.write(move |txn| {
            match descriptor.role {
                Role::Standalone => {
                    {
                        let mut rows = txn.open_table(tables::records(descriptor.table))?;
                        rows.retain(|_, _| false)?;
                    }
                    if descriptor.table == TableId::Settings {
                        seed_settings(txn, chrono::Utc::now().timestamp_millis())?;
                    }
                }
                Role::Parent { .. } => {
                    Family::open(txn, descriptor.family()?)?.clear_all()?;
                }
                Role::Child { parent } => {
                    let stripped =
                        Family::open(txn, descriptor.family()?)?.clear_children_and_strip()?;
                    tracing::debug!("Stripped lastChild from {} {} records", stripped, parent);
                }
            }
            tracing::info!("Cleared {}", descriptor.table);
            Ok(())
        })
        .await
    }

    /// Every row, with the derived `lastChild` cache stripped
    pub async fn export(&self) -> Result<Vec<Record>> {
        let records = self.list().await?;
        Ok(records
            .into_iter()
            .map(Record::without_last_child)
            .collect())
    }

    /// Recompute the cached `lastChild` of one parent
    ///
    /// Returns `false` if the parent does not exist.
    pub async fn update_last_child(&self, parent_id: &str) -> Result<bool> {
        let refreshed = self.update_last_children(vec![parent_id.to_string()]).await?;
        Ok(refreshed == 1)
    }

    /// Recompute the cached `lastChild` of several parents in one
    /// transaction, returning how many existed
    pub async fn update_last_children(&self, parent_ids: Vec<String>) -> Result<usize> {
        let family = self.descriptor.family()?;
        let refreshed = self
            .write(move |txn| refresh_parents(txn, family, parent_ids.iter()))
            .await?;
        Ok(refreshed.parents)
    }

    pub async fn toggle_favorite(&self, id: &str) -> Result<Record> {
        self.toggle(id, Status::Favorited).await
    }

    pub async fn toggle_lock(&self, id: &str) -> Result<Record> {
        self.toggle(id, Status::Locked).await
    }

    /// Flip a status flag and write the record through
    ///
    /// For child tables the parent cache is refreshed too: LOCKED changes
    /// eligibility, and the cached copy carries the child's status.
    async fn toggle(&self, id: &str, flag: Status) -> Result<Record> {
        let descriptor = self.descriptor;
        let id = id.to_string();
        self.write(move |txn| {
            let mut record = load(txn, descriptor.table, &id)?
                .ok_or_else(|| AppError::not_found(descriptor.table, &id))?;
            let enabled = record.toggle(flag);

            match descriptor.role {
                Role::Child { .. } => {
                    let mut family = Family::open(txn, descriptor.family()?)?;
                    family.write_child(&record, true)?;
                    if let Some(parent_id) = &record.parent_id {
                        family.refresh_last_child(parent_id)?;
                    }
                }
                Role::Standalone | Role::Parent { .. } => {
                    let mut rows = txn.open_table(tables::records(descriptor.table))?;
                    store::put(&mut rows, &record)?;
                }
            }

            tracing::info!("Set {:?}={} on {}", flag, enabled, record.id);
            Ok(record)
        })
        .await
    }

    /// Visible parents in dashboard order
    pub async fn dashboard(&self) -> Result<Vec<Record>> {
        self.require_parent()?;
        Ok(query::dashboard(self.list().await?))
    }

    /// Rows as select-list options
    pub async fn select_options(&self) -> Result<Vec<SelectOption>> {
        Ok(query::select_options(&self.list().await?))
    }

    /// Chart windows over the samples of one parent's children
    pub async fn chart(&self, parent_id: &str) -> Result<ChartBuckets> {
        self.require_parent()?;
        self.get(parent_id).await?;
        let children = self.children_of(parent_id).await?;
        Ok(query::chart_buckets(&children, chrono::Utc::now()))
    }

    /// Dashboard that re-runs whenever this table or its children change
    pub fn live_dashboard(&self) -> LiveQuery<Vec<Record>> {
        let service = self.clone();
        LiveQuery::spawn(&self.feed, self.descriptor.touched(), move || {
            let service = service.clone();
            async move { service.dashboard().await }
        })
    }

    fn require_parent(&self) -> Result<()> {
        match self.descriptor.role {
            Role::Parent { .. } => Ok(()),
            _ => Err(AppError::InvalidInput(format!(
                "{} is not a parent table",
                self.descriptor.table
            ))),
        }
    }
}

fn validate(table: TableId, candidate: &Value) -> Result<Record> {
    schema::validate(table, candidate).map_err(|rejection| {
        tracing::warn!("Rejected {} candidate: {}", table, rejection);
        AppError::Validation(rejection)
    })
}

/// Read one row; the table is closed again before returning
fn load(txn: &WriteTransaction, table: TableId, id: &str) -> Result<Option<Record>> {
    let rows = txn.open_table(tables::records(table))?;
    store::get(&rows, id)
}

/// Write a validated record according to the table's role, refreshing
/// whichever parent caches it could affect
fn store_record(
    txn: &WriteTransaction,
    descriptor: TableDescriptor,
    record: Record,
    overwrite: bool,
) -> Result<Record> {
    match descriptor.role {
        Role::Standalone => {
            let mut rows = txn.open_table(tables::records(descriptor.table))?;
            if !overwrite && store::get(&rows, &record.id)?.is_some() {
                return Err(AppError::DuplicateId(record.id));
            }
            store::put(&mut rows, &record)?;
            Ok(record)
        }
        Role::Parent { .. } => {
            let mut family = Family::open(txn, descriptor.family()?)?;
            family.write_parent(&record, overwrite)?;
            family.refresh_last_child(&record.id)?;
            family
                .parent(&record.id)?
                .ok_or_else(|| AppError::not_found(descriptor.table, &record.id))
        }
        Role::Child { .. } => {
            let mut family = Family::open(txn, descriptor.family()?)?;
            let previous = family.write_child(&record, overwrite)?;
            if let Some(parent_id) = &record.parent_id {
                family.refresh_last_child(parent_id)?;
            }
            if let Some(previous_parent) = previous.and_then(|p| p.parent_id) {
                if record.parent_id.as_deref() != Some(previous_parent.as_str()) {
                    family.refresh_last_child(&previous_parent)?;
                }
            }
            Ok(record)
        }
    }
}

/// Outcome of a batch of `lastChild` recomputes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct Refreshed {
    /// Parents that existed and were rewritten
    pub parents: usize,
    /// Recompute calls made, missing parents included
    pub calls: usize,
}

/// Refresh the `lastChild` cache of each parent
fn refresh_parents<'a>(
    txn: &WriteTransaction,
    family: FamilyTables,
    parent_ids: impl IntoIterator<Item = &'a String>,
) -> Result<Refreshed> {
    let mut family = Family::open(txn, family)?;
    let mut parents = 0;
    for parent_id in parent_ids {
        if family.refresh_last_child(parent_id)? {
            parents += 1;
        }
    }
    Ok(Refreshed {
        parents,
        calls: family.refreshes(),
    })
}

/// Default settings rows
pub fn default_settings(now: i64) -> Vec<Record> {
    [
        (SETTING_WELCOME_OVERLAY, SettingValue::Bool(true)),
        (SETTING_DARK_MODE, SettingValue::Bool(true)),
        (SETTING_CONSOLE_LOGS, SettingValue::Bool(false)),
        (SETTING_INFO_MESSAGES, SettingValue::Bool(true)),
        (
            SETTING_LOG_RETENTION_DURATION,
            SettingValue::Number(DEFAULT_LOG_RETENTION_MS),
        ),
    ]
    .into_iter()
    .map(|(key, value)| {
        let mut record = Record::bare(
            format!("{}{}{}", TableId::Settings.code(), ID_SEPARATOR, key),
            now,
        );
        record.setting = Some(value);
        record
    })
    .collect()
}

/// Insert any default setting that is missing, returning how many were added
pub fn seed_settings(txn: &WriteTransaction, now: i64) -> Result<usize> {
    let mut rows = txn.open_table(tables::SETTINGS)?;
    let mut seeded = 0;
    for record in default_settings(now) {
        if store::get(&rows, &record.id)?.is_none() {
            store::put(&mut rows, &record)?;
            seeded += 1;
        }
    }
    Ok(seeded)
}

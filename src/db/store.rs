//! Record encoding and the table primitives the engine is built on
//!
//! Every helper works inside a caller-owned transaction; nothing here
//! commits.

use redb::{ReadableTable, Table};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::db::tables::ChildKey;
use crate::error::Result;
use crate::models::{LogLevel, Record, SettingValue, Status};

const BINCODE_CONFIG: bincode::config::Configuration = bincode::config::standard();

pub type RecordTable<'txn> = Table<'txn, &'static str, &'static [u8]>;
pub type IndexTable<'txn> = Table<'txn, ChildKey, ()>;

/// On-disk row layout
///
/// Bincode is positional, so every field is written even when empty. The
/// JSON view on `Record` skips absent fields and cannot be stored directly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct StoredRecord {
    id: String,
    created_at: i64,
    status: BTreeSet<Status>,
    name: Option<String>,
    desc: Option<String>,
    parent_id: Option<String>,
    note: Option<String>,
    value: Option<f64>,
    setting: Option<SettingValue>,
    level: Option<LogLevel>,
    last_child: Option<Box<StoredRecord>>,
}

impl From<&Record> for StoredRecord {
    fn from(record: &Record) -> Self {
        Self {
            id: record.id.clone(),
            created_at: record.created_at,
            status: record.status.clone(),
            name: record.name.clone(),
            desc: record.desc.clone(),
            parent_id: record.parent_id.clone(),
            note: record.note.clone(),
            value: record.value,
            setting: record.setting.clone(),
            level: record.level,
            last_child: record
                .last_child
                .as_deref()
                .map(|child| Box::new(StoredRecord::from(child))),
        }
    }
}

impl From<StoredRecord> for Record {
    fn from(stored: StoredRecord) -> Self {
        Self {
            id: stored.id,
            created_at: stored.created_at,
            status: stored.status,
            name: stored.name,
            desc: stored.desc,
            parent_id: stored.parent_id,
            note: stored.note,
            value: stored.value,
            setting: stored.setting,
            level: stored.level,
            last_child: stored.last_child.map(|child| Box::new(Record::from(*child))),
        }
    }
}

pub fn encode(record: &Record) -> Result<Vec<u8>> {
    let stored = StoredRecord::from(record);
    Ok(bincode::serde::encode_to_vec(&stored, BINCODE_CONFIG)?)
}

pub fn decode(bytes: &[u8]) -> Result<Record> {
    let (stored, _): (StoredRecord, usize) =
        bincode::serde::decode_from_slice(bytes, BINCODE_CONFIG)?;
    Ok(stored.into())
}

/// Point lookup by primary key
pub fn get<T>(table: &T, id: &str) -> Result<Option<Record>>
where
    T: ReadableTable<&'static str, &'static [u8]>,
{
    table
        .get(id)?
        .map(|bytes| decode(bytes.value()))
        .transpose()
}

/// Every row, in primary key order
pub fn all<T>(table: &T) -> Result<Vec<Record>>
where
    T: ReadableTable<&'static str, &'static [u8]>,
{
    let mut records = Vec::new();
    for entry in table.iter()? {
        let (_, bytes) = entry?;
        records.push(decode(bytes.value())?);
    }
    Ok(records)
}

/// Upsert by primary key
pub fn put(table: &mut RecordTable<'_>, record: &Record) -> Result<()> {
    let bytes = encode(record)?;
    table.insert(record.id.as_str(), bytes.as_slice())?;
    Ok(())
}

/// Delete by primary key, returning the removed row
pub fn delete(table: &mut RecordTable<'_>, id: &str) -> Result<Option<Record>> {
    table
        .remove(id)?
        .map(|bytes| decode(bytes.value()))
        .transpose()
}

/// Child ids of `parent_id`, ordered by `created_at` then id
pub fn child_ids<T>(index: &T, parent_id: &str) -> Result<Vec<String>>
where
    T: ReadableTable<ChildKey, ()>,
{
    let mut ids = Vec::new();
    for entry in index.range((parent_id, i64::MIN, "")..)? {
        let (key, _) = entry?;
        let (owner, _, child_id) = key.value();
        if owner != parent_id {
            break;
        }
        ids.push(child_id.to_string());
    }
    Ok(ids)
}

/// Children of `parent_id`, ordered by `created_at` then id
pub fn children<I, T>(index: &I, children: &T, parent_id: &str) -> Result<Vec<Record>>
where
    I: ReadableTable<ChildKey, ()>,
    T: ReadableTable<&'static str, &'static [u8]>,
{
    let mut records = Vec::new();
    for id in child_ids(index, parent_id)? {
        match get(children, &id)? {
            Some(record) => records.push(record),
            None => tracing::warn!("Index entry for missing child {} of {}", id, parent_id),
        }
    }
    Ok(records)
}

pub fn index_child(index: &mut IndexTable<'_>, child: &Record, parent_id: &str) -> Result<()> {
    index.insert((parent_id, child.created_at, child.id.as_str()), ())?;
    Ok(())
}

pub fn unindex_child(index: &mut IndexTable<'_>, child: &Record, parent_id: &str) -> Result<()> {
    index.remove((parent_id, child.created_at, child.id.as_str()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::tables::{EXAMPLE_RESULTS, EXAMPLE_RESULTS_BY_PARENT};
    use redb::{Database, ReadableDatabase};
    use tempfile::TempDir;

    fn child(id: &str, parent_id: &str, created_at: i64) -> Record {
        let mut record = Record::bare(id, created_at);
        record.parent_id = Some(parent_id.to_string());
        record
    }

    #[test]
    fn test_encode_keeps_sparse_fields() {
        let mut cached = child("exr-1", "exa-1", 200);
        cached.value = Some(82.5);
        cached.status.insert(Status::Favorited);

        let mut record = Record::bare("exa-1", 100);
        record.name = Some("Bench".to_string());
        record.last_child = Some(Box::new(cached));

        let bytes = encode(&record).unwrap();
        assert_eq!(decode(&bytes).unwrap(), record);

        let mut setting = Record::bare("set-theme", 100);
        setting.setting = Some(SettingValue::Text("dark".to_string()));
        let bytes = encode(&setting).unwrap();
        assert_eq!(decode(&bytes).unwrap(), setting);
    }

    #[test]
    fn test_child_scan_is_ordered_and_scoped() {
        let temp_dir = TempDir::new().unwrap();
        let db = Database::create(temp_dir.path().join("test.db")).unwrap();

        let write_txn = db.begin_write().unwrap();
        {
            let mut rows = write_txn.open_table(EXAMPLE_RESULTS).unwrap();
            let mut index = write_txn.open_table(EXAMPLE_RESULTS_BY_PARENT).unwrap();
            for record in [
                child("exr-c", "exa-1", 300),
                child("exr-a", "exa-1", 100),
                child("exr-b", "exa-1", 300),
                child("exr-z", "exa-2", 50),
                child("exr-y", "exa-0", 500),
            ] {
                let parent_id = record.parent_id.clone().unwrap();
                put(&mut rows, &record).unwrap();
                index_child(&mut index, &record, &parent_id).unwrap();
            }
        }
        write_txn.commit().unwrap();

        let read_txn = db.begin_read().unwrap();
        let rows = read_txn.open_table(EXAMPLE_RESULTS).unwrap();
        let index = read_txn.open_table(EXAMPLE_RESULTS_BY_PARENT).unwrap();

        let ids: Vec<String> = children(&index, &rows, "exa-1")
            .unwrap()
            .into_iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(ids, vec!["exr-a", "exr-b", "exr-c"]);
        assert!(child_ids(&index, "exa-9").unwrap().is_empty());
    }

    #[test]
    fn test_delete_returns_snapshot() {
        let temp_dir = TempDir::new().unwrap();
        let db = Database::create(temp_dir.path().join("test.db")).unwrap();

        let write_txn = db.begin_write().unwrap();
        {
            let mut rows = write_txn.open_table(EXAMPLE_RESULTS).unwrap();
            let record = child("exr-1", "exa-1", 100);
            put(&mut rows, &record).unwrap();

            assert_eq!(delete(&mut rows, "exr-1").unwrap(), Some(record));
            assert_eq!(delete(&mut rows, "exr-1").unwrap(), None);
            assert!(get(&rows, "exr-1").unwrap().is_none());
        }
        write_txn.commit().unwrap();
    }
}

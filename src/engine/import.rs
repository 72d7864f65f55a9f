//! Bulk import
//!
//! Candidates are validated one by one so a bad row never sinks the batch.
//! The valid rows are inserted in a single transaction that fails as a
//! whole on any id collision; the collision is reported in the result
//! instead of being raised. Afterwards each affected parent has its
//! `lastChild` recomputed exactly once.

use redb::WriteTransaction;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeSet;

use crate::constants::BULK_WRITE_ERROR_NAME;
use crate::db::store;
use crate::db::tables;
use crate::engine::family::Family;
use crate::engine::{refresh_parents, store_record, TableDescriptor, TableService};
use crate::error::{AppError, Result};
use crate::models::{schema, FieldIssue, Record, Rejection, Role};

/// A candidate that failed validation
#[derive(Debug, Clone, Serialize)]
pub struct InvalidRecord {
    pub record: Value,
    pub rejection: Rejection,
}

/// Store rejection of a bulk insert
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BulkWriteError {
    pub name: String,
    pub message: String,
}

/// Outcome of a bulk import
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportReport {
    pub valid_records: Vec<Record>,
    pub invalid_records: Vec<InvalidRecord>,
    pub imported_count: usize,
    pub bulk_error: Option<BulkWriteError>,
    /// Parents whose `lastChild` was recomputed, each listed once
    pub recomputed_parents: Vec<String>,
    /// `lastChild` recomputes actually run, row writes included
    pub recompute_calls: usize,
}

impl TableService {
    /// Validate and insert many candidates
    pub async fn bulk_import(&self, candidates: Vec<Value>) -> Result<ImportReport> {
        let (report, _) = self.import_records(candidates, true).await?;
        Ok(report)
    }

    /// Bulk import that can defer the `lastChild` pass to the caller; also
    /// returns the parent ids the rows affect
    pub(crate) async fn import_records(
        &self,
        candidates: Vec<Value>,
        recompute: bool,
    ) -> Result<(ImportReport, BTreeSet<String>)> {
        let descriptor = self.descriptor;
        let total = candidates.len();

        let mut valid = Vec::new();
        let mut invalid = Vec::new();
        for candidate in candidates {
            match schema::validate(descriptor.table, &candidate) {
                Ok(record) => valid.push((record, candidate)),
                Err(rejection) => invalid.push(InvalidRecord {
                    record: candidate,
                    rejection,
                }),
            }
        }

        let db = self.db.clone();
        let outcome = tokio::task::spawn_blocking(move || -> Result<ImportOutcome> {
            let write_txn = db.begin_write()?;
            let (records, orphans) = split_orphans(&write_txn, descriptor, valid)?;
            let affected = affected_parents(descriptor, &records);

            let (inserted, mut recompute_calls) = bulk_insert(&write_txn, descriptor, &records)?;
            let bulk_error = inserted.err();
            let mut recomputed = false;

            if bulk_error.is_none() {
                if recompute && !affected.is_empty() {
                    let refreshed =
                        refresh_parents(&write_txn, descriptor.family()?, affected.iter())?;
                    recompute_calls += refreshed.calls;
                    recomputed = true;
                }
                write_txn.commit()?;
            } else {
                write_txn.abort()?;
                if recompute && !affected.is_empty() {
                    let write_txn = db.begin_write()?;
                    let refreshed =
                        refresh_parents(&write_txn, descriptor.family()?, affected.iter())?;
                    write_txn.commit()?;
                    recompute_calls += refreshed.calls;
                    recomputed = true;
                }
            }

            Ok(ImportOutcome {
                records,
                orphans,
                affected,
                bulk_error,
                recomputed,
                recompute_calls,
            })
        })
        .await??;

        if outcome.bulk_error.is_none() || outcome.recomputed {
            self.feed.publish(&descriptor.touched());
        }

        for (orphan, candidate) in outcome.orphans {
            invalid.push(InvalidRecord {
                record: candidate,
                rejection: Rejection {
                    record_id: Some(orphan.id),
                    fields: vec![FieldIssue {
                        field: "parentId".to_string(),
                        reason: "parent not found".to_string(),
                    }],
                },
            });
        }

        let imported_count = match &outcome.bulk_error {
            None => outcome.records.len(),
            Some(_) => 0,
        };

        match &outcome.bulk_error {
            Some(e) => tracing::warn!(
                "Bulk import into {} failed: {} ({} candidates)",
                descriptor.table,
                e.message,
                total
            ),
            None => tracing::info!(
                "Imported {}/{} {} records ({} invalid)",
                imported_count,
                total,
                descriptor.table,
                invalid.len()
            ),
        }

        let recomputed_parents = if outcome.recomputed {
            outcome.affected.iter().cloned().collect()
        } else {
            Vec::new()
        };

        Ok((
            ImportReport {
                valid_records: outcome.records,
                invalid_records: invalid,
                imported_count,
                bulk_error: outcome.bulk_error,
                recomputed_parents,
                recompute_calls: outcome.recompute_calls,
            },
            outcome.affected,
        ))
    }

    /// Validate and upsert many candidates in one transaction
    ///
    /// Used for settings, where restored rows overwrite the seeded defaults.
    pub async fn put_many(&self, candidates: Vec<Value>) -> Result<ImportReport> {
        let descriptor = self.descriptor;

        let mut valid = Vec::new();
        let mut invalid = Vec::new();
        for candidate in candidates {
            match schema::validate(descriptor.table, &candidate) {
                Ok(record) => valid.push(record),
                Err(rejection) => invalid.push(InvalidRecord {
                    record: candidate,
                    rejection,
                }),
            }
        }

        let records = valid.clone();
        let stored = self
            .write(move |txn| {
                let mut stored = Vec::with_capacity(records.len());
                for record in records {
                    stored.push(store_record(txn, descriptor, record, true)?);
                }
                Ok(stored)
            })
            .await?;

        tracing::info!(
            "Upserted {} {} records ({} invalid)",
            stored.len(),
            descriptor.table,
            invalid.len()
        );

        Ok(ImportReport {
            valid_records: valid,
            invalid_records: invalid,
            imported_count: stored.len(),
            bulk_error: None,
            recomputed_parents: Vec::new(),
            recompute_calls: 0,
        })
    }
}

struct ImportOutcome {
    records: Vec<Record>,
    /// Children with no parent, next to the candidate they came from
    orphans: Vec<(Record, Value)>,
    affected: BTreeSet<String>,
    bulk_error: Option<BulkWriteError>,
    recomputed: bool,
    recompute_calls: usize,
}

/// Separate children whose parent is absent from the rest
fn split_orphans(
    txn: &WriteTransaction,
    descriptor: TableDescriptor,
    candidates: Vec<(Record, Value)>,
) -> Result<(Vec<Record>, Vec<(Record, Value)>)> {
    let Role::Child { .. } = descriptor.role else {
        return Ok((candidates.into_iter().map(|(record, _)| record).collect(), Vec::new()));
    };

    let parents = txn.open_table(descriptor.family()?.parents)?;
    let mut kept = Vec::with_capacity(candidates.len());
    let mut orphans = Vec::new();
    for (record, candidate) in candidates {
        let parent_exists = match &record.parent_id {
            Some(parent_id) => store::get(&parents, parent_id)?.is_some(),
            None => false,
        };
        if parent_exists {
            kept.push(record);
        } else {
            orphans.push((record, candidate));
        }
    }
    Ok((kept, orphans))
}

/// Parent ids whose `lastChild` the rows can change
fn affected_parents(descriptor: TableDescriptor, records: &[Record]) -> BTreeSet<String> {
    match descriptor.role {
        Role::Standalone => BTreeSet::new(),
        Role::Parent { .. } => records.iter().map(|r| r.id.clone()).collect(),
        Role::Child { .. } => records
            .iter()
            .filter_map(|r| r.parent_id.clone())
            .collect(),
    }
}

/// Insert every record, stopping at the first id collision
///
/// The outer `Result` carries store failures; the inner one the collision.
/// Also returns how many `lastChild` recomputes the inserts ran.
fn bulk_insert(
    txn: &WriteTransaction,
    descriptor: TableDescriptor,
    records: &[Record],
) -> Result<(std::result::Result<(), BulkWriteError>, usize)> {
    let (outcome, recompute_calls) = match descriptor.role {
        Role::Standalone => {
            let mut rows = txn.open_table(tables::records(descriptor.table))?;
            let inserted = records.iter().try_for_each(|record| {
                if store::get(&rows, &record.id)?.is_some() {
                    return Err(AppError::DuplicateId(record.id.clone()));
                }
                store::put(&mut rows, record)
            });
            (inserted, 0)
        }
        Role::Parent { .. } => {
            let mut family = Family::open(txn, descriptor.family()?)?;
            let inserted = records
                .iter()
                .try_for_each(|record| family.write_parent(record, false));
            (inserted, family.refreshes())
        }
        Role::Child { .. } => {
            let mut family = Family::open(txn, descriptor.family()?)?;
            let inserted = records
                .iter()
                .try_for_each(|record| family.write_child(record, false).map(|_| ()));
            (inserted, family.refreshes())
        }
    };

    match outcome {
        Ok(()) => Ok((Ok(()), recompute_calls)),
        Err(AppError::DuplicateId(id)) => Ok((
            Err(BulkWriteError {
                name: BULK_WRITE_ERROR_NAME.to_string(),
                message: format!(
                    "Key {} already exists in {}; no rows were written",
                    id, descriptor.table
                ),
            }),
            recompute_calls,
        )),
        Err(e) => Err(e),
    }
}

//! Write access to one parent table, its child table and the child index,
//! all opened in the same write transaction.

use redb::WriteTransaction;

use crate::db::store::{self, IndexTable, RecordTable};
use crate::db::tables::FamilyTables;
use crate::engine::last_child::select_last_child;
use crate::error::{AppError, Result};
use crate::models::{Record, TableId};

pub struct Family<'txn> {
    parent_table: TableId,
    child_table: TableId,
    parents: RecordTable<'txn>,
    children: RecordTable<'txn>,
    index: IndexTable<'txn>,
    /// `lastChild` recomputes run through this handle
    refreshes: usize,
}

impl<'txn> Family<'txn> {
    pub fn open(txn: &'txn WriteTransaction, tables: FamilyTables) -> Result<Self> {
        Ok(Self {
            parent_table: tables.parent,
            child_table: tables.child,
            parents: txn.open_table(tables.parents)?,
            children: txn.open_table(tables.children)?,
            index: txn.open_table(tables.index)?,
            refreshes: 0,
        })
    }

    pub fn parent(&self, id: &str) -> Result<Option<Record>> {
        store::get(&self.parents, id)
    }

    pub fn child(&self, id: &str) -> Result<Option<Record>> {
        store::get(&self.children, id)
    }

    pub fn children_of(&self, parent_id: &str) -> Result<Vec<Record>> {
        store::children(&self.index, &self.children, parent_id)
    }

    pub fn refreshes(&self) -> usize {
        self.refreshes
    }

    pub fn all_parents(&self) -> Result<Vec<Record>> {
        store::all(&self.parents)
    }

    /// Write a parent row. The cached `lastChild` is left to
    /// [`Family::refresh_last_child`].
    pub fn write_parent(&mut self, record: &Record, overwrite: bool) -> Result<()> {
        if !overwrite && self.parent(&record.id)?.is_some() {
            return Err(AppError::DuplicateId(record.id.clone()));
        }
        store::put(&mut self.parents, record)
    }

    /// Write a child row and keep the index in step, returning the row it
    /// replaced
    ///
    /// Fails with `ParentNotFound` if the referenced parent is absent.
    pub fn write_child(&mut self, record: &Record, overwrite: bool) -> Result<Option<Record>> {
        let parent_id = self.parent_id_of(record)?;
        if self.parent(&parent_id)?.is_none() {
            return Err(AppError::ParentNotFound(parent_id));
        }

        let previous = self.child(&record.id)?;
        if let Some(previous) = &previous {
            if !overwrite {
                return Err(AppError::DuplicateId(record.id.clone()));
            }
            let previous_parent = self.parent_id_of(previous)?;
            store::unindex_child(&mut self.index, previous, &previous_parent)?;
        }

        store::put(&mut self.children, record)?;
        store::index_child(&mut self.index, record, &parent_id)?;
        Ok(previous)
    }

    /// Delete a child row and its index entry
    pub fn delete_child(&mut self, id: &str) -> Result<Option<Record>> {
        let Some(removed) = store::delete(&mut self.children, id)? else {
            return Ok(None);
        };
        let parent_id = self.parent_id_of(&removed)?;
        store::unindex_child(&mut self.index, &removed, &parent_id)?;
        Ok(Some(removed))
    }

    /// Delete a parent row and every child it owns, returning the parent
    /// snapshot and the number of children removed
    pub fn delete_parent(&mut self, id: &str) -> Result<Option<(Record, usize)>> {
        let Some(removed) = store::delete(&mut self.parents, id)? else {
            return Ok(None);
        };

        let child_ids = store::child_ids(&self.index, id)?;
        for child_id in &child_ids {
            if let Some(child) = store::delete(&mut self.children, child_id)? {
                store::unindex_child(&mut self.index, &child, id)?;
            }
        }

        Ok(Some((removed, child_ids.len())))
    }

    /// Recompute and store the cached `lastChild` of `parent_id`
    ///
    /// Returns `false` when the parent does not exist.
    pub fn refresh_last_child(&mut self, parent_id: &str) -> Result<bool> {
        self.refreshes += 1;
        let Some(mut parent) = self.parent(parent_id)? else {
            tracing::debug!("Skipping last child refresh for missing parent {}", parent_id);
            return Ok(false);
        };

        let last_child = select_last_child(self.children_of(parent_id)?);
        tracing::debug!(
            "Last child of {} is now {:?}",
            parent_id,
            last_child.as_ref().map(|c| c.id.as_str())
        );

        parent.last_child = last_child.map(Box::new);
        store::put(&mut self.parents, &parent)?;
        Ok(true)
    }

    /// Wipe parents, children and the index
    pub fn clear_all(&mut self) -> Result<()> {
        self.parents.retain(|_, _| false)?;
        self.clear_children()
    }

    /// Wipe children and the index, then strip `lastChild` from every parent
    pub fn clear_children_and_strip(&mut self) -> Result<usize> {
        self.clear_children()?;

        let mut stripped = 0;
        for parent in self.all_parents()? {
            if parent.last_child.is_some() {
                store::put(&mut self.parents, &parent.without_last_child())?;
                stripped += 1;
            }
        }
        Ok(stripped)
    }

    fn clear_children(&mut self) -> Result<()> {
        self.children.retain(|_, _| false)?;
        self.index.retain(|_, _| false)?;
        Ok(())
    }

    fn parent_id_of(&self, child: &Record) -> Result<String> {
        child.parent_id.clone().ok_or_else(|| {
            AppError::InvalidInput(format!(
                "{} record {} has no parent in {}",
                self.child_table, child.id, self.parent_table
            ))
        })
    }
}

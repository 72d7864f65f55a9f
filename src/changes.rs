//! Change notifications and live queries
//!
//! Every committed write publishes one [`TableChange`] per table it
//! touched. A [`LiveQuery`] re-runs its query whenever one of the tables it
//! watches changes and exposes the latest snapshot through a watch channel.

use std::future::Future;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;

use crate::error::Result;
use crate::models::TableId;

/// A committed write to `table`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableChange {
    pub table: TableId,
}

/// Broadcast channel of table changes
#[derive(Debug, Clone)]
pub struct ChangeFeed {
    sender: broadcast::Sender<TableChange>,
}

impl ChangeFeed {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Announce committed writes to `tables`
    pub fn publish(&self, tables: &[TableId]) {
        for &table in tables {
            // No receivers is fine
            let _ = self.sender.send(TableChange { table });
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TableChange> {
        self.sender.subscribe()
    }
}

/// A query re-run on every change to the tables it watches
///
/// The background task stops on [`LiveQuery::teardown`] or when the handle
/// is dropped.
pub struct LiveQuery<T> {
    snapshots: watch::Receiver<Option<T>>,
    task: JoinHandle<()>,
}

impl<T> LiveQuery<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn spawn<F, Fut>(feed: &ChangeFeed, watched: Vec<TableId>, query: F) -> Self
    where
        F: Fn() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        // Subscribe before the first run so no change can slip between
        let mut changes = feed.subscribe();
        let (sender, snapshots) = watch::channel(None);

        let task = tokio::spawn(async move {
            loop {
                match query().await {
                    Ok(snapshot) => {
                        if sender.send(Some(snapshot)).is_err() {
                            return;
                        }
                    }
                    Err(e) => tracing::warn!("Live query failed: {}", e),
                }

                // Wait for a relevant change
                loop {
                    match changes.recv().await {
                        Ok(change) if watched.contains(&change.table) => break,
                        Ok(_) => continue,
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            tracing::debug!("Live query lagged by {} changes", skipped);
                            break;
                        }
                        Err(broadcast::error::RecvError::Closed) => return,
                    }
                }
            }
        });

        Self { snapshots, task }
    }

    /// Latest snapshot, `None` until the first run completes
    pub fn current(&self) -> Option<T> {
        self.snapshots.borrow().clone()
    }

    /// Wait for the next snapshot
    pub async fn next(&mut self) -> Option<T> {
        self.snapshots.changed().await.ok()?;
        self.snapshots.borrow_and_update().clone()
    }

    pub fn teardown(self) {
        self.task.abort();
    }
}

impl<T> Drop for LiveQuery<T> {
    fn drop(&mut self) {
        self.task.abort();
    }
}

//! Recordbook Server Library
//!
//! Embedded record store with parent/child tables, a cached `lastChild`
//! per parent, bulk import and whole-database backups, served over HTTP.

pub mod changes;
pub mod config;
pub mod constants;
pub mod db;
pub mod engine;
pub mod error;
pub mod models;
pub mod query;
pub mod registry;
pub mod routes;

pub use changes::{ChangeFeed, LiveQuery, TableChange};
pub use config::Config;
pub use db::{open_database, Db};
pub use engine::TableService;
pub use error::{AppError, Result};
pub use registry::ServiceRegistry;

use axum::{
    routing::{get, post},
    Router,
};

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub db: Db,
    pub config: Config,
    pub registry: ServiceRegistry,
}

impl AppState {
    /// Create a new AppState with the given database and configuration
    pub fn new(db: Db, config: Config) -> Self {
        let feed = ChangeFeed::new(config.change_feed_capacity);
        let registry = ServiceRegistry::new(db.clone(), feed);
        Self {
            db,
            config,
            registry,
        }
    }
}

/// Every route, without transport layers
pub fn router(state: AppState) -> Router {
    use routes::*;

    Router::new()
        .route("/health", get(health_check))
        .route(
            "/api/tables/:table",
            get(list_records)
                .post(add_record)
                .put(put_record)
                .delete(clear_table),
        )
        .route("/api/tables/:table/import", post(import_records))
        .route("/api/tables/:table/export", get(export_records))
        .route("/api/tables/:table/dashboard", get(dashboard))
        .route("/api/tables/:table/options", get(select_options))
        .route(
            "/api/records/:id",
            get(get_record).patch(update_record).delete(remove_record),
        )
        .route("/api/records/:id/favorite", post(toggle_favorite))
        .route("/api/records/:id/lock", post(toggle_lock))
        .route("/api/records/:id/chart", get(chart))
        .route("/api/backup", get(create_backup).post(restore_backup))
        .route("/admin/stats", get(admin_stats))
        .with_state(state)
}

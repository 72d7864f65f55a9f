use axum::{extract::State, Json};
use redb::ReadableDatabase;
use serde_json::{json, Value};

use crate::AppState;

/// Health check endpoint
///
/// Reports whether a read transaction can be opened on the store.
pub async fn health_check(State(state): State<AppState>) -> Json<Value> {
    let db = state.db.clone();
    let db_status = tokio::task::spawn_blocking(move || match db.begin_read() {
        Ok(_) => "connected",
        Err(e) => {
            tracing::error!("Database health check failed: {:?}", e);
            "disconnected"
        }
    })
    .await
    .unwrap_or("error");

    Json(json!({
        "status": if db_status == "connected" { "healthy" } else { "unhealthy" },
        "database": db_status,
        "app": state.config.app_name,
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

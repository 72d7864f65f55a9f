use axum::{
    extract::{Query, State},
    Json,
};
use serde::Deserialize;

use crate::engine::backup::{BackupPayload, BackupService, RestoreReport};
use crate::error::Result;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct RestoreParams {
    #[serde(rename = "includeLogs", default)]
    pub include_logs: bool,
}

/// Export the whole database
pub async fn create_backup(State(state): State<AppState>) -> Result<Json<BackupPayload>> {
    let payload = BackupService::new(&state.registry, &state.config.app_name)
        .create_backup()
        .await?;
    Ok(Json(payload))
}

/// Restore a backup on top of the current data
///
/// Logs are only restored with `?includeLogs=true`. A backup written by a
/// different app is refused with 400.
pub async fn restore_backup(
    State(state): State<AppState>,
    Query(params): Query<RestoreParams>,
    Json(payload): Json<BackupPayload>,
) -> Result<Json<RestoreReport>> {
    let report = BackupService::new(&state.registry, &state.config.app_name)
        .restore(payload, params.include_logs)
        .await?;
    Ok(Json(report))
}

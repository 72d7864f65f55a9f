//! Table-level endpoints, `/api/tables/:table`
//!
//! `:table` accepts a table name, its slug or its three letter code.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use serde_json::Value;

use crate::engine::import::ImportReport;
use crate::error::Result;
use crate::models::{Record, TableId};
use crate::query::SelectOption;
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct ClearResponse {
    pub success: bool,
    pub table: TableId,
}

/// Every row of the table
pub async fn list_records(
    State(state): State<AppState>,
    Path(table): Path<String>,
) -> Result<Json<Vec<Record>>> {
    let records = state.registry.resolve_table(&table)?.list().await?;
    Ok(Json(records))
}

/// Insert a new record; 409 if the id exists
pub async fn add_record(
    State(state): State<AppState>,
    Path(table): Path<String>,
    Json(candidate): Json<Value>,
) -> Result<(StatusCode, Json<Record>)> {
    let record = state.registry.resolve_table(&table)?.add(candidate).await?;
    Ok((StatusCode::CREATED, Json(record)))
}

/// Insert or overwrite a record
pub async fn put_record(
    State(state): State<AppState>,
    Path(table): Path<String>,
    Json(candidate): Json<Value>,
) -> Result<Json<Record>> {
    let record = state.registry.resolve_table(&table)?.put(candidate).await?;
    Ok(Json(record))
}

pub async fn clear_table(
    State(state): State<AppState>,
    Path(table): Path<String>,
) -> Result<Json<ClearResponse>> {
    let service = state.registry.resolve_table(&table)?;
    service.clear().await?;
    Ok(Json(ClearResponse {
        success: true,
        table: service.table(),
    }))
}

/// Bulk import an array of candidates
///
/// Invalid rows and id collisions are reported in the body, not as errors.
pub async fn import_records(
    State(state): State<AppState>,
    Path(table): Path<String>,
    Json(candidates): Json<Vec<Value>>,
) -> Result<Json<ImportReport>> {
    let report = state
        .registry
        .resolve_table(&table)?
        .bulk_import(candidates)
        .await?;
    Ok(Json(report))
}

pub async fn export_records(
    State(state): State<AppState>,
    Path(table): Path<String>,
) -> Result<Json<Vec<Record>>> {
    let records = state.registry.resolve_table(&table)?.export().await?;
    Ok(Json(records))
}

pub async fn dashboard(
    State(state): State<AppState>,
    Path(table): Path<String>,
) -> Result<Json<Vec<Record>>> {
    let records = state.registry.resolve_table(&table)?.dashboard().await?;
    Ok(Json(records))
}

pub async fn select_options(
    State(state): State<AppState>,
    Path(table): Path<String>,
) -> Result<Json<Vec<SelectOption>>> {
    let options = state.registry.resolve_table(&table)?.select_options().await?;
    Ok(Json(options))
}

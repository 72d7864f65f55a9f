//! Record-level endpoints, `/api/records/:id`
//!
//! The owning table is found from the id's code prefix.

use axum::{
    extract::{Path, State},
    Json,
};
use serde_json::Value;

use crate::error::Result;
use crate::models::Record;
use crate::query::ChartBuckets;
use crate::AppState;

pub async fn get_record(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Record>> {
    Ok(Json(state.registry.get_record(&id).await?))
}

/// Shallow-merge the body over the stored record
pub async fn update_record(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(partial): Json<Value>,
) -> Result<Json<Record>> {
    let record = state.registry.resolve(&id)?.update(&id, partial).await?;
    Ok(Json(record))
}

/// Delete a record and return what was removed
pub async fn remove_record(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Record>> {
    Ok(Json(state.registry.remove_record(&id).await?))
}

pub async fn toggle_favorite(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Record>> {
    let record = state.registry.resolve(&id)?.toggle_favorite(&id).await?;
    Ok(Json(record))
}

pub async fn toggle_lock(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Record>> {
    let record = state.registry.resolve(&id)?.toggle_lock(&id).await?;
    Ok(Json(record))
}

/// Chart windows over a parent's child samples
pub async fn chart(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ChartBuckets>> {
    let buckets = state.registry.resolve(&id)?.chart(&id).await?;
    Ok(Json(buckets))
}

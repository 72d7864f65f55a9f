use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::models::{Rejection, TableId};

/// Application error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] redb::Error),

    #[error("Transaction error: {0}")]
    Transaction(#[from] redb::TransactionError),

    #[error("Table error: {0}")]
    Table(#[from] redb::TableError),

    #[error("Storage error: {0}")]
    Storage(#[from] redb::StorageError),

    #[error("Commit error: {0}")]
    Commit(#[from] redb::CommitError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::error::EncodeError),

    #[error("Deserialization error: {0}")]
    Deserialization(#[from] bincode::error::DecodeError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Task join error: {0}")]
    TaskJoin(#[from] tokio::task::JoinError),

    #[error("Record {id} not found in {table}")]
    NotFound { table: TableId, id: String },

    #[error("Validation failed: {0}")]
    Validation(Rejection),

    #[error("Record {0} already exists")]
    DuplicateId(String),

    #[error("Parent record {0} not found")]
    ParentNotFound(String),

    #[error("Unknown table: {0}")]
    UnknownTable(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Unauthorized")]
    Unauthorized,
}

impl AppError {
    pub fn not_found(table: TableId, id: impl Into<String>) -> Self {
        AppError::NotFound {
            table,
            id: id.into(),
        }
    }
}

/// Implement IntoResponse to convert AppError into HTTP responses
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            AppError::Database(ref e) => internal("Database", e),
            AppError::Transaction(ref e) => internal("Transaction", e),
            AppError::Table(ref e) => internal("Table", e),
            AppError::Storage(ref e) => internal("Storage", e),
            AppError::Commit(ref e) => internal("Commit", e),
            AppError::Serialization(ref e) => internal("Serialization", e),
            AppError::Deserialization(ref e) => internal("Deserialization", e),
            AppError::TaskJoin(ref e) => internal("Task join", e),
            AppError::Json(ref e) => (
                StatusCode::BAD_REQUEST,
                json!({ "error": format!("Malformed JSON: {}", e) }),
            ),
            AppError::NotFound { .. } => (StatusCode::NOT_FOUND, json!({ "error": self.to_string() })),
            AppError::Validation(ref rejection) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                json!({ "error": self.to_string(), "rejection": rejection }),
            ),
            AppError::DuplicateId(_) | AppError::ParentNotFound(_) => {
                (StatusCode::CONFLICT, json!({ "error": self.to_string() }))
            }
            AppError::UnknownTable(ref input) => {
                tracing::error!("Unregistered table requested: {}", input);
                (StatusCode::BAD_REQUEST, json!({ "error": self.to_string() }))
            }
            AppError::InvalidInput(ref msg) => (StatusCode::BAD_REQUEST, json!({ "error": msg })),
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, json!({ "error": "Unauthorized" })),
        };

        (status, Json(body)).into_response()
    }
}

fn internal(kind: &str, error: &dyn std::fmt::Debug) -> (StatusCode, serde_json::Value) {
    tracing::error!("{} error: {:?}", kind, error);
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        json!({ "error": "Internal server error" }),
    )
}

/// Result type alias for application results
pub type Result<T> = std::result::Result<T, AppError>;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use std::fmt;
use tracing::error;

use crate::db::LedgerError;

pub const INTERNAL_ERROR: &str = "Internal server error";

/// Errors surfaced at the HTTP boundary. Only the message is sent to the
/// caller; underlying details are logged where the error is mapped.
#[derive(Debug)]
pub enum AppError {
    Validation(String),
    NotFound(String),
    Internal(String),
}

impl AppError {
    pub fn validation(msg: impl Into<String>) -> Self {
        AppError::Validation(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        AppError::NotFound(msg.into())
    }

    pub fn internal() -> Self {
        AppError::Internal(INTERNAL_ERROR.to_string())
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Validation(msg) | AppError::NotFound(msg) | AppError::Internal(msg) => {
                f.write_str(msg)
            }
        }
    }
}

impl From<LedgerError> for AppError {
    fn from(e: LedgerError) -> Self {
        match e {
            LedgerError::NotFound { entity, .. } => AppError::NotFound(format!("{} not found", entity)),
            other => {
                error!("Ledger operation failed: {}", other);
                AppError::internal()
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(serde_json::json!({ "error": self.to_string() }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ledger_errors_map_to_status() {
        let not_found: AppError = LedgerError::NotFound { entity: "Query", id: 3 }.into();
        assert_eq!(not_found.into_response().status(), StatusCode::NOT_FOUND);

        let db: AppError =
            LedgerError::Database(duckdb::Error::QueryReturnedNoRows).into();
        assert_eq!(db.to_string(), INTERNAL_ERROR);
        assert_eq!(db.into_response().status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}

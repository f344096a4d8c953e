use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use serde_json::{Value, json};

use crate::utils::db_error::{SqlErrorClass, classify_sqlx_error};

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorInfo,
}

/// Machine-readable error payload, also embedded in batch results.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorInfo {
    pub code: &'static str,
    pub message: String,
    pub details: Value,
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{message}")]
    Validation { message: String, details: Value },
    #[error("{message}")]
    NotFound { message: String, details: Value },
    #[error("{message}")]
    Conflict { message: String, details: Value },
    /// Deadlock, serialization failure or statement timeout. Nothing was applied;
    /// the caller may retry the whole operation.
    #[error("{message}")]
    Transaction { message: String, details: Value },
    #[error("{message}")]
    Internal { message: String, details: Value },
}

impl AppError {
    pub fn bad_request(message: impl Into<String>, details: Value) -> Self {
        Self::Validation {
            message: message.into(),
            details,
        }
    }
    pub fn not_found(message: impl Into<String>, details: Value) -> Self {
        Self::NotFound {
            message: message.into(),
            details,
        }
    }
    pub fn conflict(message: impl Into<String>, details: Value) -> Self {
        Self::Conflict {
            message: message.into(),
            details,
        }
    }
    pub fn transaction(message: impl Into<String>, details: Value) -> Self {
        Self::Transaction {
            message: message.into(),
            details,
        }
    }
    pub fn internal(message: impl Into<String>, details: Value) -> Self {
        Self::Internal {
            message: message.into(),
            details,
        }
    }

    /// Stable error code used in response bodies and batch failure entries.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Validation { .. } => "validation_error",
            AppError::NotFound { .. } => "not_found",
            AppError::Conflict { .. } => "conflict",
            AppError::Transaction { .. } => "transaction_failure",
            AppError::Internal { .. } => "internal_error",
        }
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, AppError::Conflict { .. })
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, AppError::Transaction { .. })
    }

    fn details_mut(&mut self) -> &mut Value {
        match self {
            AppError::Validation { details, .. }
            | AppError::NotFound { details, .. }
            | AppError::Conflict { details, .. }
            | AppError::Transaction { details, .. }
            | AppError::Internal { details, .. } => details,
        }
    }

    /// Annotates the error with the operation and entity it happened in.
    ///
    /// Existing detail keys win, so a repository that already recorded a more
    /// specific `id` keeps it.
    pub fn context(mut self, operation: &str, entity_id: &str) -> Self {
        let details = self.details_mut();
        if !details.is_object() {
            let previous = std::mem::take(details);
            *details = if previous.is_null() {
                json!({})
            } else {
                json!({ "cause": previous })
            };
        }
        if let Some(map) = details.as_object_mut() {
            map.entry("operation").or_insert_with(|| json!(operation));
            map.entry("entity_id").or_insert_with(|| json!(entity_id));
        }
        self
    }

    pub fn to_error_info(&self) -> ErrorInfo {
        let (message, details) = match self {
            AppError::Validation { message, details }
            | AppError::NotFound { message, details }
            | AppError::Conflict { message, details }
            | AppError::Transaction { message, details }
            | AppError::Internal { message, details } => (message.clone(), details.clone()),
        };

        ErrorInfo {
            code: self.code(),
            message,
            details,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::Validation { .. } => StatusCode::BAD_REQUEST,
            AppError::NotFound { .. } => StatusCode::NOT_FOUND,
            AppError::Conflict { .. } => StatusCode::CONFLICT,
            AppError::Transaction { .. } => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if status.is_server_error() {
            tracing::error!(error = %self, code = self.code(), "request failed");
        }

        let body = ErrorBody {
            error: self.to_error_info(),
        };

        (status, Json(body)).into_response()
    }
}

impl From<sqlx::Error> for AppError {
    fn from(e: sqlx::Error) -> Self {
        map_sqlx_error(e)
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(e: validator::ValidationErrors) -> Self {
        let fields: Vec<String> = e.field_errors().keys().map(|k| k.to_string()).collect();
        AppError::bad_request(
            "Request validation failed",
            json!({ "fields": fields, "errors": e.to_string() }),
        )
    }
}

pub fn map_sqlx_error(e: sqlx::Error) -> AppError {
    let constraint = e
        .as_database_error()
        .and_then(|db| db.constraint().map(str::to_owned));

    match classify_sqlx_error(&e) {
        SqlErrorClass::UniqueViolation => AppError::conflict(
            "Unique constraint violation",
            json!({ "constraint": constraint }),
        ),
        SqlErrorClass::ReferenceViolation => AppError::bad_request(
            "Referenced record does not exist",
            json!({ "constraint": constraint }),
        ),
        SqlErrorClass::CheckViolation => AppError::bad_request(
            "Value rejected by constraint",
            json!({ "constraint": constraint }),
        ),
        SqlErrorClass::Retryable => AppError::transaction(
            "Transaction aborted, retry later",
            json!({ "retryable": true, "reason": e.to_string() }),
        ),
        SqlErrorClass::RowNotFound => AppError::not_found("Record not found", json!({})),
        SqlErrorClass::Other => {
            tracing::error!(error = %e, "database error");
            AppError::internal("Database error", json!({}))
        }
    }
}

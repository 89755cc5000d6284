//! Typed errors and HTTP mapping.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Generic denial text shared by fetch and save. Intentionally does not say
/// whether the model exists, so unauthorized callers cannot probe the registry.
pub const PERMISSION_DENIED_MESSAGE: &str =
    "You do not have permission to perform this action. Please contact your administrator.";

#[derive(Error, Debug)]
pub enum AppError {
    #[error("model '{0}' not found")]
    ModelNotFound(String),
    #[error("{PERMISSION_DENIED_MESSAGE}")]
    PermissionDenied,
    #[error("unknown field(s): {}", .0.join(", "))]
    UnknownField(Vec<String>),
    #[error("validation failed: {}", format_field_errors(.0))]
    SchemaValidation(Vec<FieldError>),
    #[error("{0}")]
    FilterSemantic(String),
    #[error("invalid value {values:?} for field '{field}'")]
    InvalidFilterValue {
        field: String,
        values: Vec<serde_json::Value>,
    },
    #[error("a maximum of {limit} records can be saved per request, got {got}")]
    TooManyRecords { limit: usize, got: usize },
    #[error("exactly one record is allowed when an id is supplied")]
    OnlyOneRecordToUpdate,
    #[error("id '{0}' is not a valid identifier for this model")]
    InvalidIdentifierType(String),
    #[error("record with id '{0}' not found")]
    RecordNotFound(String),
    #[error("constraint violation: {0}")]
    StorageConstraint(String),
    #[error("pageNumber and pageSize must be >= 1")]
    InvalidPagination,
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("query failed: {0}")]
    Query(String),
    #[error("authentication failed")]
    AuthFailed,
}

/// One field-level validation failure: which field, which constraint.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        FieldError {
            field: field.into(),
            message: message.into(),
        }
    }
}

fn format_field_errors(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(|e| format!("{}: {}", e.field, e.message))
        .collect::<Vec<_>>()
        .join("; ")
}

impl AppError {
    /// Stable machine-readable code. Codes are never reused across kinds so
    /// clients can branch without string matching.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::ModelNotFound(_) => "model_not_found",
            AppError::PermissionDenied => "permission_denied",
            AppError::UnknownField(_) => "unknown_field",
            AppError::SchemaValidation(_) => "schema_validation",
            AppError::FilterSemantic(_) => "filter_semantic",
            AppError::InvalidFilterValue { .. } => "invalid_filter_value",
            AppError::TooManyRecords { .. } => "too_many_records",
            AppError::OnlyOneRecordToUpdate => "only_one_record_to_update",
            AppError::InvalidIdentifierType(_) => "invalid_identifier_type",
            AppError::RecordNotFound(_) => "record_not_found",
            AppError::StorageConstraint(_) => "storage_constraint",
            AppError::InvalidPagination => "invalid_pagination",
            AppError::BadRequest(_) => "bad_request",
            AppError::Query(_) => "query_error",
            AppError::AuthFailed => "auth_failed",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            AppError::ModelNotFound(_) | AppError::RecordNotFound(_) => StatusCode::NOT_FOUND,
            AppError::PermissionDenied | AppError::AuthFailed => StatusCode::FORBIDDEN,
            AppError::Query(_) => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::BAD_REQUEST,
        }
    }
}

#[derive(Serialize)]
pub struct ErrorBody {
    pub error: String,
    pub code: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: self.to_string(),
            code: self.code().to_string(),
        };
        (self.status(), Json(body)).into_response()
    }
}

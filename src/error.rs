//! Error types and HTTP error response handling.
//!
//! This module defines the errors an HTTP handler can return and how they
//! are converted into responses with appropriate status codes and JSON bodies.

use axum::{
    Json,
    extract::rejection::{JsonRejection, PathRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;

use crate::services::ledger::LedgerError;
use crate::store::StoreError;

/// Application-wide error type.
///
/// # Error Categories
///
/// - **Ledger Errors**: Rejections and failures from deposit, withdraw and transfer
/// - **Store Errors**: Failures of user and account bookkeeping
/// - **Authentication Errors**: Missing or wrong credential
/// - **Validation Errors**: Invalid request data
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error("Store error: {0}")]
    Store(StoreError),

    /// Credential is missing or wrong.
    ///
    /// Returns HTTP 401 Unauthorized.
    #[error("Invalid API key")]
    InvalidApiKey,

    #[error("User not found")]
    UserNotFound,

    #[error("Account not found")]
    AccountNotFound,

    /// Returns HTTP 409 Conflict.
    #[error("User still owns bank accounts")]
    UserHasAccounts,

    /// Returns HTTP 409 Conflict.
    #[error("Account balance must be zero before deletion")]
    AccountNotEmpty,

    /// Request body or parameters are invalid.
    ///
    /// Returns HTTP 400 Bad Request.
    /// The String contains details about what was invalid.
    #[error("Invalid request")]
    InvalidRequest(String),
}

impl AppError {
    /// Map a store error raised while handling a user resource.
    pub fn from_user_store(err: StoreError) -> Self {
        match err {
            StoreError::NotFound => AppError::UserNotFound,
            StoreError::UserHasAccounts => AppError::UserHasAccounts,
            other => AppError::Store(other),
        }
    }

    /// Map a store error raised while handling an account resource.
    pub fn from_account_store(err: StoreError) -> Self {
        match err {
            StoreError::NotFound => AppError::AccountNotFound,
            StoreError::AccountNotEmpty => AppError::AccountNotEmpty,
            other => AppError::Store(other),
        }
    }

    fn parts(&self) -> (StatusCode, &'static str) {
        match self {
            AppError::Ledger(err) => match err {
                LedgerError::InvalidAmount => (StatusCode::BAD_REQUEST, "invalid_amount"),
                LedgerError::SameAccount => (StatusCode::BAD_REQUEST, "same_account"),
                LedgerError::AccountNotFound => (StatusCode::NOT_FOUND, "account_not_found"),
                LedgerError::InsufficientFunds => {
                    (StatusCode::UNPROCESSABLE_ENTITY, "insufficient_funds")
                }
                LedgerError::Conflict => (StatusCode::SERVICE_UNAVAILABLE, "conflict"),
                LedgerError::StoreUnavailable(_) => {
                    (StatusCode::INTERNAL_SERVER_ERROR, "internal_error")
                }
            },
            AppError::Store(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
            AppError::InvalidApiKey => (StatusCode::UNAUTHORIZED, "invalid_api_key"),
            AppError::UserNotFound => (StatusCode::NOT_FOUND, "user_not_found"),
            AppError::AccountNotFound => (StatusCode::NOT_FOUND, "account_not_found"),
            AppError::UserHasAccounts => (StatusCode::CONFLICT, "user_has_accounts"),
            AppError::AccountNotEmpty => (StatusCode::CONFLICT, "account_not_empty"),
            AppError::InvalidRequest(_) => (StatusCode::BAD_REQUEST, "invalid_request"),
        }
    }
}

/// Malformed or mistyped JSON bodies become 400 `invalid_request`.
impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::InvalidRequest(rejection.body_text())
    }
}

/// Unparseable path parameters become 400 `invalid_request`.
impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        AppError::InvalidRequest(rejection.body_text())
    }
}

/// Convert AppError into an HTTP response.
///
/// # Response Format
///
/// All errors return JSON in this format:
/// ```json
/// {
///   "error": {
///     "code": "error_type",
///     "message": "Human-readable error message"
///   }
/// }
/// ```
///
/// # Status Code Mapping
///
/// - `InvalidAmount`, `SameAccount`, `InvalidRequest` → 400 Bad Request
/// - `InvalidApiKey` → 401 Unauthorized
/// - `AccountNotFound`, `UserNotFound` → 404 Not Found
/// - `UserHasAccounts`, `AccountNotEmpty` → 409 Conflict
/// - `InsufficientFunds` → 422 Unprocessable Entity
/// - Store failures → 500 Internal Server Error (hides details from client)
/// - Ledger `Conflict` → 503 Service Unavailable (safe to retry)
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.parts();

        let message = match &self {
            AppError::InvalidRequest(msg) => msg.clone(),
            _ if status == StatusCode::INTERNAL_SERVER_ERROR => {
                tracing::error!(error = %self, "request failed");
                "An internal error occurred".to_string()
            }
            _ => self.to_string(),
        };

        let body = Json(json!({
            "error": {
                "code": code,
                "message": message
            }
        }));

        (status, body).into_response()
    }
}

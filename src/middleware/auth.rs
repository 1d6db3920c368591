//! Shared-credential authentication middleware.
//!
//! This middleware intercepts every protected request to:
//! 1. Extract the API key from the Authorization header
//! 2. Hash it and compare it with the configured hash
//! 3. Reject unauthorized requests with HTTP 401

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use sha2::{Digest, Sha256};

use crate::{error::AppError, state::AppState};

/// Hex-encoded SHA-256 of an API key, as stored in `API_KEY_HASH`.
pub fn hash_api_key(api_key: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(api_key.as_bytes());
    hex::encode(hasher.finalize())
}

/// API key authentication middleware function.
///
/// # Headers
///
/// Expected header format:
/// ```text
/// Authorization: Bearer abc123xyz
/// ```
///
/// # Returns
///
/// - `Ok(Response)` if the key hashes to the configured value (calls next handler)
/// - `Err(AppError::InvalidApiKey)` otherwise (returns 401)
pub async fn auth_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let api_key = request
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .ok_or(AppError::InvalidApiKey)?;

    if !hash_api_key(api_key).eq_ignore_ascii_case(&state.api_key_hash) {
        tracing::debug!("rejected request with unknown API key");
        return Err(AppError::InvalidApiKey);
    }

    Ok(next.run(request).await)
}

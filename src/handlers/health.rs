//! Liveness endpoint; the only route outside the API key gate.

use axum::{Json, extract::State};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::{error::AppError, state::AppState};

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub database: &'static str,
    pub timestamp: DateTime<Utc>,
}

/// `GET /health`
///
/// Pings the account store. A store failure is reported through the usual
/// error body with status 500.
///
/// ```json
/// {"status": "healthy", "database": "connected", "timestamp": "2026-01-05T09:30:00Z"}
/// ```
pub async fn health_check(State(state): State<AppState>) -> Result<Json<HealthResponse>, AppError> {
    state.accounts.ping().await.map_err(AppError::Store)?;

    Ok(Json(HealthResponse {
        status: "healthy",
        database: "connected",
        timestamp: Utc::now(),
    }))
}

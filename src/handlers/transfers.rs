//! Transfer HTTP handler.
//!
//! - POST /transfers - Move money between two account numbers

use axum::{Json, extract::State};

use crate::{
    error::AppError,
    extract::AppJson,
    models::account::{Account, TransferRequest},
    state::AppState,
};

/// Transfer money between accounts.
///
/// # Request Body
///
/// ```json
/// {
///   "from": 1000000001,
///   "to": 1000000002,
///   "amount": 150
/// }
/// ```
///
/// # Atomicity
///
/// Both balances change together or not at all.
///
/// # Response (200)
///
/// The sender's account after the transfer.
pub async fn create_transfer(
    State(state): State<AppState>,
    AppJson(request): AppJson<TransferRequest>,
) -> Result<Json<Account>, AppError> {
    let receipt = state
        .ledger
        .transfer(request.from, request.to, request.amount)
        .await?;
    Ok(Json(receipt.from))
}

//! Account HTTP handlers.
//!
//! This module implements the account-related API endpoints:
//! - POST /users/{id}/bankAccounts - Open an account for a user
//! - GET /users/{id}/bankAccounts - List a user's accounts
//! - GET /bankAccounts/{id} - Get account by internal id
//! - PUT /bankAccounts/{id} - Rename account
//! - DELETE /bankAccounts/{id} - Delete an empty account
//! - PUT /bankAccounts/{id}/deposit - Add money
//! - PUT /bankAccounts/{id}/withdraw - Remove money

use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
};

use crate::{
    error::AppError,
    extract::{AppJson, AppPath},
    models::account::{
        Account, AccountRef, AmountRequest, CreateAccountRequest, RenameAccountRequest,
        validate_account_name,
    },
    state::AppState,
};

/// Open a new account for a user.
///
/// # Request Body
///
/// ```json
/// {
///   "acct_name": "Savings"
/// }
/// ```
///
/// # Response
///
/// - **Success (201 Created)**: Returns the account with its assigned `acct_no`
///   and a zero balance
/// - **Error (404)**: User not found
pub async fn create_account(
    State(state): State<AppState>,
    AppPath(user_id): AppPath<i64>,
    AppJson(request): AppJson<CreateAccountRequest>,
) -> Result<impl IntoResponse, AppError> {
    validate_account_name(&request.acct_name).map_err(AppError::InvalidRequest)?;

    let account = state
        .accounts
        .create_account(user_id, &request.acct_name)
        .await
        .map_err(AppError::from_user_store)?;
    tracing::info!(
        user_id,
        account_id = account.id,
        acct_no = account.acct_no,
        "account opened"
    );

    Ok((StatusCode::CREATED, Json(account)))
}

/// List a user's accounts, highest account number first.
///
/// Returns 404 if the user does not exist and an empty array if the user
/// has no accounts.
pub async fn list_user_accounts(
    State(state): State<AppState>,
    AppPath(user_id): AppPath<i64>,
) -> Result<Json<Vec<Account>>, AppError> {
    state
        .users
        .get_user(user_id)
        .await
        .map_err(AppError::from_user_store)?;

    let accounts = state
        .accounts
        .list_by_user(user_id)
        .await
        .map_err(AppError::from_account_store)?;
    Ok(Json(accounts))
}

pub async fn get_account(
    State(state): State<AppState>,
    AppPath(account_id): AppPath<i64>,
) -> Result<Json<Account>, AppError> {
    let account = state
        .accounts
        .get_by_id(account_id)
        .await
        .map_err(AppError::from_account_store)?;
    Ok(Json(account))
}

/// Change an account's display name.
pub async fn rename_account(
    State(state): State<AppState>,
    AppPath(account_id): AppPath<i64>,
    AppJson(request): AppJson<RenameAccountRequest>,
) -> Result<Json<Account>, AppError> {
    validate_account_name(&request.acct_name).map_err(AppError::InvalidRequest)?;

    let account = state
        .accounts
        .rename_account(account_id, &request.acct_name)
        .await
        .map_err(AppError::from_account_store)?;
    Ok(Json(account))
}

/// Delete an account.
///
/// # Response
///
/// - **Success (204 No Content)**
/// - **Error (404)**: Account not found
/// - **Error (409)**: Balance is not zero
pub async fn delete_account(
    State(state): State<AppState>,
    AppPath(account_id): AppPath<i64>,
) -> Result<StatusCode, AppError> {
    state
        .accounts
        .delete_account(account_id)
        .await
        .map_err(AppError::from_account_store)?;
    tracing::info!(account_id, "account deleted");

    Ok(StatusCode::NO_CONTENT)
}

/// Deposit into an account.
///
/// # Request Body
///
/// ```json
/// {
///   "amount": 5000
/// }
/// ```
///
/// # Response (200)
///
/// The account after the deposit.
pub async fn deposit(
    State(state): State<AppState>,
    AppPath(account_id): AppPath<i64>,
    AppJson(request): AppJson<AmountRequest>,
) -> Result<Json<Account>, AppError> {
    let account = state
        .ledger
        .deposit(AccountRef::Id(account_id), request.amount)
        .await?;
    Ok(Json(account))
}

/// Withdraw from an account.
///
/// # Validation
///
/// - Amount must be positive
/// - Account must hold enough money (422 otherwise, balance unchanged)
pub async fn withdraw(
    State(state): State<AppState>,
    AppPath(account_id): AppPath<i64>,
    AppJson(request): AppJson<AmountRequest>,
) -> Result<Json<Account>, AppError> {
    let account = state
        .ledger
        .withdraw(AccountRef::Id(account_id), request.amount)
        .await?;
    Ok(Json(account))
}

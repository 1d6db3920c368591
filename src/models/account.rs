//! Account data models and API request types.
//!
//! This module defines:
//! - `Account`: Database entity representing a bank account
//! - `AccountRef`: How a ledger operation names the account it touches
//! - Request bodies for provisioning, renaming, deposit, withdrawal and transfer

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Represents an account record from the database.
///
/// # Database Table
///
/// Maps to the `accounts` table. Each account:
/// - Belongs to one user (via `user_id`)
/// - Has an internal `id` (primary key) and an externally visible `acct_no`
/// - Has a balance stored in minor units (cents) to avoid floating-point errors
///
/// # Balance Storage
///
/// For example:
/// - $10.50 is stored as 1050
/// - $100.00 is stored as 10000
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow, Serialize)]
pub struct Account {
    /// Internal storage key
    pub id: i64,

    /// Owning user
    pub user_id: i64,

    /// Externally visible account number, unique across all accounts
    pub acct_no: i64,

    /// Display name
    pub acct_name: String,

    /// Current balance in minor units
    ///
    /// Only the ledger engine changes this field, and only through the
    /// store's compare-and-set primitives.
    pub balance: i64,

    pub created_at: DateTime<Utc>,

    /// Timestamp of the last balance or name change
    pub updated_at: DateTime<Utc>,
}

/// Reference to an account in one of its two identifier spaces.
///
/// Internal ids and account numbers are both integers, so the variant
/// keeps them from being mixed up when resolving through the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccountRef {
    /// Internal storage key (`accounts.id`)
    Id(i64),
    /// Externally visible account number (`accounts.acct_no`)
    Number(i64),
}

impl fmt::Display for AccountRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccountRef::Id(id) => write!(f, "id {id}"),
            AccountRef::Number(number) => write!(f, "number {number}"),
        }
    }
}

/// Request body for opening an account for a user.
///
/// # JSON Example
///
/// ```json
/// {
///   "acct_name": "Savings"
/// }
/// ```
///
/// The store assigns `id` and `acct_no`; the balance starts at zero.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateAccountRequest {
    pub acct_name: String,
}

/// Request body for editing account details.
///
/// Only the display name can be changed here, never the balance.
#[derive(Debug, Clone, Deserialize)]
pub struct RenameAccountRequest {
    pub acct_name: String,
}

/// Request body for deposit and withdrawal.
///
/// # JSON Example
///
/// ```json
/// {
///   "amount": 5000
/// }
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct AmountRequest {
    /// Amount in minor units, must be positive
    pub amount: i64,
}

/// Request body for moving money between two accounts.
///
/// # JSON Example
///
/// ```json
/// {
///   "from": 1000000001,
///   "to": 1000000002,
///   "amount": 25000
/// }
/// ```
///
/// `from` and `to` are account numbers, not internal ids.
#[derive(Debug, Clone, Deserialize)]
pub struct TransferRequest {
    pub from: i64,
    pub to: i64,
    pub amount: i64,
}

/// Validate a display name supplied by a client.
pub fn validate_account_name(name: &str) -> Result<(), String> {
    if name.trim().is_empty() {
        return Err("acct_name must not be empty".to_string());
    }
    Ok(())
}

//! Persistence for users and accounts.
//!
//! The store knows nothing about money. It offers point reads and two
//! conditional balance writes that the ledger builds its operations on:
//!
//! - [`AccountStore::compare_and_set_balance`] writes a new balance only if
//!   the stored balance still equals the value the caller read.
//! - [`AccountStore::atomic_dual_update`] does the same for two accounts as
//!   one unit: both writes land or neither does.
//!
//! Two implementations exist: [`postgres::PgStore`] for deployment and
//! [`memory::MemoryStore`] for tests and local runs.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;

use crate::models::{account::Account, user::User};

/// Errors reported by a store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The addressed record does not exist.
    #[error("record not found")]
    NotFound,

    /// A user cannot be deleted while it still owns accounts.
    #[error("user still owns accounts")]
    UserHasAccounts,

    /// An account cannot be deleted while it still holds money.
    #[error("account balance is not zero")]
    AccountNotEmpty,

    /// The caller asked for a write the store cannot express, such as a
    /// dual update that names the same account twice.
    #[error("invalid balance update: {0}")]
    InvalidUpdate(&'static str),

    /// The database rejected or failed the query.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// The store is unusable for a reason other than a database error.
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// One conditional balance write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BalanceUpdate {
    pub id: i64,
    /// Balance the caller read; the write is refused if it has changed since
    pub expected: i64,
    pub new_balance: i64,
}

/// Result of a conditional write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CasOutcome<T> {
    /// The write was applied; carries the stored record(s) after the write.
    Applied(T),
    /// Some balance no longer matched its expected value. Nothing was written.
    Conflict,
}

/// Account persistence used by the ledger and the account handlers.
#[async_trait]
pub trait AccountStore: Send + Sync {
    /// Check that the store can serve queries.
    async fn ping(&self) -> Result<(), StoreError>;

    async fn get_by_id(&self, id: i64) -> Result<Account, StoreError>;

    async fn get_by_number(&self, acct_no: i64) -> Result<Account, StoreError>;

    /// Open an account for `user_id` with a fresh id, a fresh account
    /// number and a zero balance.
    ///
    /// Returns `NotFound` if the user does not exist.
    async fn create_account(&self, user_id: i64, acct_name: &str) -> Result<Account, StoreError>;

    /// Accounts owned by `user_id`, highest account number first.
    async fn list_by_user(&self, user_id: i64) -> Result<Vec<Account>, StoreError>;

    /// Change the display name. Never touches the balance.
    async fn rename_account(&self, id: i64, acct_name: &str) -> Result<Account, StoreError>;

    /// Remove an account whose balance is zero.
    async fn delete_account(&self, id: i64) -> Result<(), StoreError>;

    /// Write `update.new_balance` if the stored balance equals `update.expected`.
    ///
    /// Returns `NotFound` if the account no longer exists.
    async fn compare_and_set_balance(
        &self,
        update: BalanceUpdate,
    ) -> Result<CasOutcome<Account>, StoreError>;

    /// Apply two conditional writes to two distinct accounts as one unit.
    ///
    /// Accounts are locked in ascending id order regardless of argument
    /// order. The returned accounts follow the argument order.
    async fn atomic_dual_update(
        &self,
        updates: [BalanceUpdate; 2],
    ) -> Result<CasOutcome<[Account; 2]>, StoreError>;
}

/// User persistence.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// All users, newest id first.
    async fn all_users(&self) -> Result<Vec<User>, StoreError>;

    async fn insert_user(&self, first_name: &str, last_name: &str) -> Result<User, StoreError>;

    async fn get_user(&self, id: i64) -> Result<User, StoreError>;

    async fn update_user(
        &self,
        id: i64,
        first_name: &str,
        last_name: &str,
    ) -> Result<User, StoreError>;

    /// Remove a user that owns no accounts.
    async fn delete_user(&self, id: i64) -> Result<(), StoreError>;
}

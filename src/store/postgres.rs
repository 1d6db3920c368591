//! PostgreSQL store.
//!
//! # Atomicity
//!
//! - Single-account writes are one `UPDATE ... WHERE id = $1 AND balance = $2`
//!   statement, so the comparison and the write cannot be separated.
//! - Two-account writes run in one database transaction. Both rows are
//!   locked with `SELECT ... ORDER BY id FOR UPDATE`, which acquires the row
//!   locks in ascending id order, so two transfers over the same pair in
//!   opposite directions cannot deadlock.
//! - Dropping a transaction without committing rolls it back, so a caller
//!   that is cancelled mid-transfer leaves both balances untouched.

use async_trait::async_trait;
use sqlx::Row;

use super::{AccountStore, BalanceUpdate, CasOutcome, StoreError, UserStore};
use crate::db::DbPool;
use crate::models::{account::Account, user::User};

const ACCOUNT_COLUMNS: &str = "id, user_id, acct_no, acct_name, balance, created_at, updated_at";

/// Store backed by a PostgreSQL connection pool.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: DbPool,
}

impl PgStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    async fn account_exists(&self, id: i64) -> Result<bool, StoreError> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM accounts WHERE id = $1)")
            .bind(id)
            .fetch_one(&self.pool)
            .await?;
        Ok(exists)
    }
}

fn is_foreign_key_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_foreign_key_violation())
}

#[async_trait]
impl AccountStore for PgStore {
    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn get_by_id(&self, id: i64) -> Result<Account, StoreError> {
        sqlx::query_as::<_, Account>(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(StoreError::NotFound)
    }

    async fn get_by_number(&self, acct_no: i64) -> Result<Account, StoreError> {
        sqlx::query_as::<_, Account>(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE acct_no = $1"
        ))
        .bind(acct_no)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(StoreError::NotFound)
    }

    async fn create_account(&self, user_id: i64, acct_name: &str) -> Result<Account, StoreError> {
        // acct_no and balance come from column defaults
        sqlx::query_as::<_, Account>(&format!(
            "INSERT INTO accounts (user_id, acct_name) VALUES ($1, $2) RETURNING {ACCOUNT_COLUMNS}"
        ))
        .bind(user_id)
        .bind(acct_name)
        .fetch_one(&self.pool)
        .await
        .map_err(|err| {
            if is_foreign_key_violation(&err) {
                StoreError::NotFound
            } else {
                StoreError::Database(err)
            }
        })
    }

    async fn list_by_user(&self, user_id: i64) -> Result<Vec<Account>, StoreError> {
        let accounts = sqlx::query_as::<_, Account>(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE user_id = $1 ORDER BY acct_no DESC"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(accounts)
    }

    async fn rename_account(&self, id: i64, acct_name: &str) -> Result<Account, StoreError> {
        sqlx::query_as::<_, Account>(&format!(
            r#"
            UPDATE accounts
            SET acct_name = $2,
                updated_at = NOW()
            WHERE id = $1
            RETURNING {ACCOUNT_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(acct_name)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(StoreError::NotFound)
    }

    async fn delete_account(&self, id: i64) -> Result<(), StoreError> {
        let deleted = sqlx::query("DELETE FROM accounts WHERE id = $1 AND balance = 0")
            .bind(id)
            .execute(&self.pool)
            .await?
            .rows_affected();

        if deleted == 0 {
            return if self.account_exists(id).await? {
                Err(StoreError::AccountNotEmpty)
            } else {
                Err(StoreError::NotFound)
            };
        }
        Ok(())
    }

    async fn compare_and_set_balance(
        &self,
        update: BalanceUpdate,
    ) -> Result<CasOutcome<Account>, StoreError> {
        let updated = sqlx::query_as::<_, Account>(&format!(
            r#"
            UPDATE accounts
            SET balance = $3,
                updated_at = NOW()
            WHERE id = $1 AND balance = $2
            RETURNING {ACCOUNT_COLUMNS}
            "#
        ))
        .bind(update.id)
        .bind(update.expected)
        .bind(update.new_balance)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(account) = updated {
            return Ok(CasOutcome::Applied(account));
        }
        if self.account_exists(update.id).await? {
            Ok(CasOutcome::Conflict)
        } else {
            Err(StoreError::NotFound)
        }
    }

    async fn atomic_dual_update(
        &self,
        updates: [BalanceUpdate; 2],
    ) -> Result<CasOutcome<[Account; 2]>, StoreError> {
        let [first, second] = updates;
        if first.id == second.id {
            return Err(StoreError::InvalidUpdate(
                "dual update needs two distinct accounts",
            ));
        }

        let mut tx = self.pool.begin().await?;

        // Lock both rows in ascending id order
        let rows = sqlx::query("SELECT id, balance FROM accounts WHERE id = ANY($1) ORDER BY id FOR UPDATE")
            .bind(vec![first.id, second.id])
            .fetch_all(&mut *tx)
            .await?;

        if rows.len() != 2 {
            tx.rollback().await?;
            return Err(StoreError::NotFound);
        }

        for row in &rows {
            let id: i64 = row.try_get("id")?;
            let balance: i64 = row.try_get("balance")?;
            let expected = if id == first.id {
                first.expected
            } else {
                second.expected
            };
            if balance != expected {
                tx.rollback().await?;
                return Ok(CasOutcome::Conflict);
            }
        }

        let set_balance = format!(
            "UPDATE accounts SET balance = $2, updated_at = NOW() WHERE id = $1 RETURNING {ACCOUNT_COLUMNS}"
        );
        let first_account = sqlx::query_as::<_, Account>(&set_balance)
            .bind(first.id)
            .bind(first.new_balance)
            .fetch_one(&mut *tx)
            .await?;
        let second_account = sqlx::query_as::<_, Account>(&set_balance)
            .bind(second.id)
            .bind(second.new_balance)
            .fetch_one(&mut *tx)
            .await?;

        // Both legs become visible together
        tx.commit().await?;

        Ok(CasOutcome::Applied([first_account, second_account]))
    }
}

#[async_trait]
impl UserStore for PgStore {
    async fn all_users(&self) -> Result<Vec<User>, StoreError> {
        let users = sqlx::query_as::<_, User>(
            "SELECT id, first_name, last_name, created_at FROM users ORDER BY id DESC",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(users)
    }

    async fn insert_user(&self, first_name: &str, last_name: &str) -> Result<User, StoreError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (first_name, last_name)
            VALUES ($1, $2)
            RETURNING id, first_name, last_name, created_at
            "#,
        )
        .bind(first_name)
        .bind(last_name)
        .fetch_one(&self.pool)
        .await?;
        Ok(user)
    }

    async fn get_user(&self, id: i64) -> Result<User, StoreError> {
        sqlx::query_as::<_, User>(
            "SELECT id, first_name, last_name, created_at FROM users WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(StoreError::NotFound)
    }

    async fn update_user(
        &self,
        id: i64,
        first_name: &str,
        last_name: &str,
    ) -> Result<User, StoreError> {
        sqlx::query_as::<_, User>(
            r#"
            UPDATE users
            SET first_name = $2, last_name = $3
            WHERE id = $1
            RETURNING id, first_name, last_name, created_at
            "#,
        )
        .bind(id)
        .bind(first_name)
        .bind(last_name)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(StoreError::NotFound)
    }

    async fn delete_user(&self, id: i64) -> Result<(), StoreError> {
        let deleted = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|err| {
                // accounts.user_id is ON DELETE RESTRICT
                if is_foreign_key_violation(&err) {
                    StoreError::UserHasAccounts
                } else {
                    StoreError::Database(err)
                }
            })?
            .rows_affected();

        if deleted == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }
}

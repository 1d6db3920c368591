//! In-process store backed by a single mutex.
//!
//! Every method takes the lock once and never holds it across an await, so
//! each call is atomic with respect to every other call. Account numbers
//! start at the same value as the PostgreSQL sequence.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::Utc;

use super::{AccountStore, BalanceUpdate, CasOutcome, StoreError, UserStore};
use crate::models::{account::Account, user::User};

const FIRST_ACCOUNT_NUMBER: i64 = 1_000_000_001;

#[derive(Debug)]
struct State {
    users: BTreeMap<i64, User>,
    accounts: BTreeMap<i64, Account>,
    next_user_id: i64,
    next_account_id: i64,
    next_acct_no: i64,
}

/// Store kept entirely in memory. Contents are lost when it is dropped.
#[derive(Debug)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State {
                users: BTreeMap::new(),
                accounts: BTreeMap::new(),
                next_user_id: 1,
                next_account_id: 1,
                next_acct_no: FIRST_ACCOUNT_NUMBER,
            }),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, State>, StoreError> {
        self.state
            .lock()
            .map_err(|_| StoreError::Unavailable("memory store lock poisoned".to_string()))
    }
}

#[async_trait]
impl AccountStore for MemoryStore {
    async fn ping(&self) -> Result<(), StoreError> {
        self.lock().map(|_| ())
    }

    async fn get_by_id(&self, id: i64) -> Result<Account, StoreError> {
        self.lock()?
            .accounts
            .get(&id)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn get_by_number(&self, acct_no: i64) -> Result<Account, StoreError> {
        self.lock()?
            .accounts
            .values()
            .find(|account| account.acct_no == acct_no)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn create_account(&self, user_id: i64, acct_name: &str) -> Result<Account, StoreError> {
        let mut state = self.lock()?;
        if !state.users.contains_key(&user_id) {
            return Err(StoreError::NotFound);
        }

        let now = Utc::now();
        let account = Account {
            id: state.next_account_id,
            user_id,
            acct_no: state.next_acct_no,
            acct_name: acct_name.to_string(),
            balance: 0,
            created_at: now,
            updated_at: now,
        };
        state.next_account_id += 1;
        state.next_acct_no += 1;
        state.accounts.insert(account.id, account.clone());
        Ok(account)
    }

    async fn list_by_user(&self, user_id: i64) -> Result<Vec<Account>, StoreError> {
        let state = self.lock()?;
        let mut accounts: Vec<Account> = state
            .accounts
            .values()
            .filter(|account| account.user_id == user_id)
            .cloned()
            .collect();
        accounts.sort_by(|a, b| b.acct_no.cmp(&a.acct_no));
        Ok(accounts)
    }

    async fn rename_account(&self, id: i64, acct_name: &str) -> Result<Account, StoreError> {
        let mut state = self.lock()?;
        let account = state.accounts.get_mut(&id).ok_or(StoreError::NotFound)?;
        account.acct_name = acct_name.to_string();
        account.updated_at = Utc::now();
        Ok(account.clone())
    }

    async fn delete_account(&self, id: i64) -> Result<(), StoreError> {
        let mut state = self.lock()?;
        let account = state.accounts.get(&id).ok_or(StoreError::NotFound)?;
        if account.balance != 0 {
            return Err(StoreError::AccountNotEmpty);
        }
        state.accounts.remove(&id);
        Ok(())
    }

    async fn compare_and_set_balance(
        &self,
        update: BalanceUpdate,
    ) -> Result<CasOutcome<Account>, StoreError> {
        let mut state = self.lock()?;
        let account = state
            .accounts
            .get_mut(&update.id)
            .ok_or(StoreError::NotFound)?;
        if account.balance != update.expected {
            return Ok(CasOutcome::Conflict);
        }
        account.balance = update.new_balance;
        account.updated_at = Utc::now();
        Ok(CasOutcome::Applied(account.clone()))
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

        let mut state = self.lock()?;
        // Check both legs before writing either.
        for update in [&first, &second] {
            let account = state.accounts.get(&update.id).ok_or(StoreError::NotFound)?;
            if account.balance != update.expected {
                return Ok(CasOutcome::Conflict);
            }
        }

        let now = Utc::now();
        let mut apply = |update: &BalanceUpdate| -> Result<Account, StoreError> {
            let account = state
                .accounts
                .get_mut(&update.id)
                .ok_or(StoreError::NotFound)?;
            account.balance = update.new_balance;
            account.updated_at = now;
            Ok(account.clone())
        };
        let first_account = apply(&first)?;
        let second_account = apply(&second)?;
        Ok(CasOutcome::Applied([first_account, second_account]))
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn all_users(&self) -> Result<Vec<User>, StoreError> {
        Ok(self.lock()?.users.values().rev().cloned().collect())
    }

    async fn insert_user(&self, first_name: &str, last_name: &str) -> Result<User, StoreError> {
        let mut state = self.lock()?;
        let user = User {
            id: state.next_user_id,
            first_name: first_name.to_string(),
            last_name: last_name.to_string(),
            created_at: Utc::now(),
        };
        state.next_user_id += 1;
        state.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn get_user(&self, id: i64) -> Result<User, StoreError> {
        self.lock()?
            .users
            .get(&id)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn update_user(
        &self,
        id: i64,
        first_name: &str,
        last_name: &str,
    ) -> Result<User, StoreError> {
        let mut state = self.lock()?;
        let user = state.users.get_mut(&id).ok_or(StoreError::NotFound)?;
        user.first_name = first_name.to_string();
        user.last_name = last_name.to_string();
        Ok(user.clone())
    }

    async fn delete_user(&self, id: i64) -> Result<(), StoreError> {
        let mut state = self.lock()?;
        if !state.users.contains_key(&id) {
            return Err(StoreError::NotFound);
        }
        if state.accounts.values().any(|account| account.user_id == id) {
            return Err(StoreError::UserHasAccounts);
        }
        state.users.remove(&id);
        Ok(())
    }
}

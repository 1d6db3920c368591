//! Ledger engine - the only code that changes account balances.
//!
//! This service handles:
//! - Amount and same-account validation (before the store is touched)
//! - Funds checks against the configured overdraft limit
//! - Read-compute-write cycles built on the store's compare-and-set primitives
//! - Bounded retries when a concurrent writer wins the race
//!
//! # Atomicity Guarantees
//!
//! A balance is never written blindly. Every write names the balance it was
//! computed from, and the store refuses it if that balance has moved. A
//! transfer writes both legs through one [`AccountStore::atomic_dual_update`]
//! call, so a debited-but-not-credited state is never visible.
//!
//! The engine holds no locks and keeps no state of its own; dropping one of
//! its futures leaves the store with either the whole write or none of it.

use std::sync::Arc;

use crate::models::account::{Account, AccountRef};
use crate::store::{AccountStore, BalanceUpdate, CasOutcome, StoreError};

/// Failures of ledger operations.
///
/// `InvalidAmount` and `SameAccount` are raised before any store access.
/// `AccountNotFound` and `InsufficientFunds` are business-rule rejections.
/// `Conflict` and `StoreUnavailable` are infrastructure failures the caller
/// may retry later.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("Amount must be a positive number of minor units")]
    InvalidAmount,

    #[error("Cannot transfer to the same account")]
    SameAccount,

    #[error("Account not found")]
    AccountNotFound,

    #[error("Insufficient funds")]
    InsufficientFunds,

    /// Concurrent writers kept changing the balance until the retry budget ran out.
    #[error("Account is busy, retry later")]
    Conflict,

    #[error("Account store unavailable: {0}")]
    StoreUnavailable(#[source] StoreError),
}

impl From<StoreError> for LedgerError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound => LedgerError::AccountNotFound,
            StoreError::InvalidUpdate(_) => LedgerError::SameAccount,
            other => LedgerError::StoreUnavailable(other),
        }
    }
}

/// Tunable ledger rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LedgerPolicy {
    /// How far below zero a withdrawal or transfer may take a balance.
    /// Zero disables overdraft.
    pub overdraft_limit: i64,

    /// Extra read-compute-write attempts after a compare-and-set conflict.
    pub max_retries: u32,
}

impl Default for LedgerPolicy {
    fn default() -> Self {
        Self {
            overdraft_limit: 0,
            max_retries: 5,
        }
    }
}

/// Both sides of a completed transfer.
#[derive(Debug, Clone)]
pub struct TransferReceipt {
    pub from: Account,
    pub to: Account,
}

/// Deposit, withdrawal and transfer over an [`AccountStore`].
#[derive(Clone)]
pub struct Ledger {
    store: Arc<dyn AccountStore>,
    policy: LedgerPolicy,
}

impl Ledger {
    /// A negative overdraft limit is treated as zero.
    pub fn new(store: Arc<dyn AccountStore>, policy: LedgerPolicy) -> Self {
        let policy = LedgerPolicy {
            overdraft_limit: policy.overdraft_limit.max(0),
            ..policy
        };
        Self { store, policy }
    }

    pub fn policy(&self) -> LedgerPolicy {
        self.policy
    }

    /// Add `amount` to the account and return the updated account.
    ///
    /// # Errors
    ///
    /// - `InvalidAmount`: amount is zero or negative, or the new balance overflows
    /// - `AccountNotFound`: the reference does not resolve
    /// - `Conflict`: retry budget exhausted
    /// - `StoreUnavailable`: persistence failed
    pub async fn deposit(&self, account: AccountRef, amount: i64) -> Result<Account, LedgerError> {
        ensure_positive(amount)?;

        self.update_single(account, |balance| {
            balance
                .checked_add(amount)
                .ok_or(LedgerError::InvalidAmount)
        })
        .await
        .inspect(|updated| {
            tracing::info!(
                account_id = updated.id,
                amount,
                balance = updated.balance,
                "deposit applied"
            )
        })
    }

    /// Subtract `amount` from the account and return the updated account.
    ///
    /// Fails with `InsufficientFunds` if the new balance would fall below
    /// the overdraft limit; the balance is left unchanged.
    pub async fn withdraw(&self, account: AccountRef, amount: i64) -> Result<Account, LedgerError> {
        ensure_positive(amount)?;

        self.update_single(account, |balance| self.debit(balance, amount))
            .await
            .inspect(|updated| {
                tracing::info!(
                    account_id = updated.id,
                    amount,
                    balance = updated.balance,
                    "withdrawal applied"
                )
            })
    }

    /// Move `amount` from one account number to another as a single unit.
    ///
    /// On any error neither balance changes.
    pub async fn transfer(
        &self,
        from_acct_no: i64,
        to_acct_no: i64,
        amount: i64,
    ) -> Result<TransferReceipt, LedgerError> {
        ensure_positive(amount)?;
        if from_acct_no == to_acct_no {
            return Err(LedgerError::SameAccount);
        }

        for attempt in 0..=self.policy.max_retries {
            let from = self.resolve(AccountRef::Number(from_acct_no)).await?;
            let to = self.resolve(AccountRef::Number(to_acct_no)).await?;

            let debit = BalanceUpdate {
                id: from.id,
                expected: from.balance,
                new_balance: self.debit(from.balance, amount)?,
            };
            let credit = BalanceUpdate {
                id: to.id,
                expected: to.balance,
                new_balance: to
                    .balance
                    .checked_add(amount)
                    .ok_or(LedgerError::InvalidAmount)?,
            };

            match self.store.atomic_dual_update([debit, credit]).await? {
                CasOutcome::Applied([from, to]) => {
                    tracing::info!(
                        from_account_id = from.id,
                        to_account_id = to.id,
                        amount,
                        "transfer applied"
                    );
                    return Ok(TransferReceipt { from, to });
                }
                CasOutcome::Conflict => {
                    tracing::debug!(attempt, from_acct_no, to_acct_no, "transfer lost a race");
                }
            }
        }

        tracing::warn!(from_acct_no, to_acct_no, "transfer gave up after repeated conflicts");
        Err(LedgerError::Conflict)
    }

    async fn resolve(&self, account: AccountRef) -> Result<Account, LedgerError> {
        let found = match account {
            AccountRef::Id(id) => self.store.get_by_id(id).await,
            AccountRef::Number(acct_no) => self.store.get_by_number(acct_no).await,
        };
        found.map_err(|err| {
            if matches!(err, StoreError::NotFound) {
                tracing::debug!(%account, "account did not resolve");
            }
            LedgerError::from(err)
        })
    }

    /// Balance after taking `amount` out, if the policy allows it.
    fn debit(&self, balance: i64, amount: i64) -> Result<i64, LedgerError> {
        let new_balance = balance
            .checked_sub(amount)
            .ok_or(LedgerError::InvalidAmount)?;
        // overdraft_limit is non-negative, so negating it cannot overflow
        if new_balance < -self.policy.overdraft_limit {
            return Err(LedgerError::InsufficientFunds);
        }
        Ok(new_balance)
    }

    /// Read the balance, compute a new one and write it back conditionally,
    /// starting over from a fresh read whenever another writer got there first.
    async fn update_single<F>(&self, account: AccountRef, compute: F) -> Result<Account, LedgerError>
    where
        F: Fn(i64) -> Result<i64, LedgerError> + Send + Sync,
    {
        for attempt in 0..=self.policy.max_retries {
            let current = self.resolve(account).await?;
            let update = BalanceUpdate {
                id: current.id,
                expected: current.balance,
                new_balance: compute(current.balance)?,
            };

            match self.store.compare_and_set_balance(update).await? {
                CasOutcome::Applied(updated) => return Ok(updated),
                CasOutcome::Conflict => {
                    tracing::debug!(attempt, %account, "balance update lost a race");
                }
            }
        }

        tracing::warn!(%account, "balance update gave up after repeated conflicts");
        Err(LedgerError::Conflict)
    }
}

fn ensure_positive(amount: i64) -> Result<(), LedgerError> {
    if amount <= 0 {
        return Err(LedgerError::InvalidAmount);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::future::Future;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::task::{Context, Poll, Waker};

    use async_trait::async_trait;

    use super::*;
    use crate::store::UserStore;
    use crate::store::memory::MemoryStore;

    /// Wraps a store and reports the first `remaining` conditional writes as
    /// conflicts without applying them. With `pause_writes` set, every
    /// conditional write suspends once before it reaches the inner store.
    struct ContendedStore {
        inner: MemoryStore,
        remaining: AtomicU32,
        pause_writes: bool,
    }

    impl ContendedStore {
        fn new(inner: MemoryStore, conflicts: u32) -> Self {
            Self {
                inner,
                remaining: AtomicU32::new(conflicts),
                pause_writes: false,
            }
        }

        async fn pause(&self) {
            if self.pause_writes {
                tokio::task::yield_now().await;
            }
        }

        fn lose_race(&self) -> bool {
            self.remaining
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
        }
    }

    #[async_trait]
    impl AccountStore for ContendedStore {
        async fn ping(&self) -> Result<(), StoreError> {
            self.inner.ping().await
        }
        async fn get_by_id(&self, id: i64) -> Result<Account, StoreError> {
            self.inner.get_by_id(id).await
        }
        async fn get_by_number(&self, acct_no: i64) -> Result<Account, StoreError> {
            self.inner.get_by_number(acct_no).await
        }
        async fn create_account(&self, user_id: i64, name: &str) -> Result<Account, StoreError> {
            self.inner.create_account(user_id, name).await
        }
        async fn list_by_user(&self, user_id: i64) -> Result<Vec<Account>, StoreError> {
            self.inner.list_by_user(user_id).await
        }
        async fn rename_account(&self, id: i64, name: &str) -> Result<Account, StoreError> {
            self.inner.rename_account(id, name).await
        }
        async fn delete_account(&self, id: i64) -> Result<(), StoreError> {
            self.inner.delete_account(id).await
        }
        async fn compare_and_set_balance(
            &self,
            update: BalanceUpdate,
        ) -> Result<CasOutcome<Account>, StoreError> {
            self.pause().await;
            if self.lose_race() {
                return Ok(CasOutcome::Conflict);
            }
            self.inner.compare_and_set_balance(update).await
        }
        async fn atomic_dual_update(
            &self,
            updates: [BalanceUpdate; 2],
        ) -> Result<CasOutcome<[Account; 2]>, StoreError> {
            self.pause().await;
            if self.lose_race() {
                return Ok(CasOutcome::Conflict);
            }
            self.inner.atomic_dual_update(updates).await
        }
    }

    /// Store with one user owning two accounts, funded with the given balances.
    async fn seeded_store(balance_a: i64, balance_b: i64) -> (MemoryStore, Account, Account) {
        let store = MemoryStore::new();
        let user = store.insert_user("Ada", "Lovelace").await.unwrap();
        let mut accounts = Vec::new();
        for (name, balance) in [("A", balance_a), ("B", balance_b)] {
            let account = store.create_account(user.id, name).await.unwrap();
            let account = match store
                .compare_and_set_balance(BalanceUpdate {
                    id: account.id,
                    expected: 0,
                    new_balance: balance,
                })
                .await
                .unwrap()
            {
                CasOutcome::Applied(account) => account,
                CasOutcome::Conflict => unreachable!("fresh account"),
            };
            accounts.push(account);
        }
        let b = accounts.pop().unwrap();
        let a = accounts.pop().unwrap();
        (store, a, b)
    }

    fn ledger_over(store: Arc<dyn AccountStore>, policy: LedgerPolicy) -> Ledger {
        Ledger::new(store, policy)
    }

    async fn balance(store: &dyn AccountStore, id: i64) -> i64 {
        store.get_by_id(id).await.unwrap().balance
    }

    #[tokio::test]
    async fn deposit_then_withdraw_restores_balance() {
        let (store, a, _) = seeded_store(40, 0).await;
        let store = Arc::new(store);
        let ledger = ledger_over(store.clone(), LedgerPolicy::default());

        let after_deposit = ledger.deposit(AccountRef::Id(a.id), 25).await.unwrap();
        assert_eq!(after_deposit.balance, 65);
        let after_withdraw = ledger.withdraw(AccountRef::Id(a.id), 25).await.unwrap();
        assert_eq!(after_withdraw.balance, 40);
    }

    #[tokio::test]
    async fn non_positive_amounts_are_rejected_without_store_effect() {
        let (store, a, b) = seeded_store(10, 10).await;
        let store = Arc::new(store);
        let ledger = ledger_over(store.clone(), LedgerPolicy::default());

        for amount in [0, -5] {
            assert!(matches!(
                ledger.deposit(AccountRef::Id(a.id), amount).await,
                Err(LedgerError::InvalidAmount)
            ));
            assert!(matches!(
                ledger.withdraw(AccountRef::Id(a.id), amount).await,
                Err(LedgerError::InvalidAmount)
            ));
            assert!(matches!(
                ledger.transfer(a.acct_no, b.acct_no, amount).await,
                Err(LedgerError::InvalidAmount)
            ));
        }
        assert_eq!(balance(&*store, a.id).await, 10);
        assert_eq!(balance(&*store, b.id).await, 10);
    }

    #[tokio::test]
    async fn invalid_amount_is_checked_before_resolution() {
        let store = Arc::new(MemoryStore::new());
        let ledger = ledger_over(store, LedgerPolicy::default());
        assert!(matches!(
            ledger.deposit(AccountRef::Id(404), 0).await,
            Err(LedgerError::InvalidAmount)
        ));
        assert!(matches!(
            ledger.deposit(AccountRef::Id(404), 1).await,
            Err(LedgerError::AccountNotFound)
        ));
    }

    #[tokio::test]
    async fn overdrawing_withdrawal_leaves_balance_unchanged() {
        let (store, a, _) = seeded_store(100, 0).await;
        let store = Arc::new(store);
        let ledger = ledger_over(store.clone(), LedgerPolicy::default());

        assert!(matches!(
            ledger.withdraw(AccountRef::Id(a.id), 150).await,
            Err(LedgerError::InsufficientFunds)
        ));
        assert_eq!(balance(&*store, a.id).await, 100);

        // Exactly emptying the account is allowed
        let emptied = ledger.withdraw(AccountRef::Id(a.id), 100).await.unwrap();
        assert_eq!(emptied.balance, 0);
    }

    #[tokio::test]
    async fn overdraft_limit_allows_negative_balance_down_to_limit() {
        let (store, a, b) = seeded_store(100, 0).await;
        let store = Arc::new(store);
        let ledger = ledger_over(
            store.clone(),
            LedgerPolicy {
                overdraft_limit: 50,
                max_retries: 5,
            },
        );

        let overdrawn = ledger.withdraw(AccountRef::Id(a.id), 150).await.unwrap();
        assert_eq!(overdrawn.balance, -50);
        assert!(matches!(
            ledger.transfer(a.acct_no, b.acct_no, 1).await,
            Err(LedgerError::InsufficientFunds)
        ));
        assert_eq!(balance(&*store, b.id).await, 0);
    }

    #[tokio::test]
    async fn deposit_overflow_is_rejected() {
        let (store, a, _) = seeded_store(i64::MAX - 1, 0).await;
        let ledger = ledger_over(Arc::new(store), LedgerPolicy::default());
        assert!(matches!(
            ledger.deposit(AccountRef::Id(a.id), 2).await,
            Err(LedgerError::InvalidAmount)
        ));
    }

    #[tokio::test]
    async fn transfer_moves_money_and_preserves_total() {
        let (store, a, b) = seeded_store(70, 30).await;
        let store = Arc::new(store);
        let ledger = ledger_over(store.clone(), LedgerPolicy::default());

        let receipt = ledger.transfer(a.acct_no, b.acct_no, 20).await.unwrap();
        assert_eq!((receipt.from.id, receipt.from.balance), (a.id, 50));
        assert_eq!((receipt.to.id, receipt.to.balance), (b.id, 50));
        assert_eq!(
            balance(&*store, a.id).await + balance(&*store, b.id).await,
            100
        );
    }

    #[tokio::test]
    async fn failed_transfers_touch_neither_balance() {
        let (store, a, b) = seeded_store(10, 5).await;
        let store = Arc::new(store);
        let ledger = ledger_over(store.clone(), LedgerPolicy::default());

        assert!(matches!(
            ledger.transfer(a.acct_no, a.acct_no, 1).await,
            Err(LedgerError::SameAccount)
        ));
        assert!(matches!(
            ledger.transfer(a.acct_no, b.acct_no, 11).await,
            Err(LedgerError::InsufficientFunds)
        ));
        assert!(matches!(
            ledger.transfer(a.acct_no, 1, 1).await,
            Err(LedgerError::AccountNotFound)
        ));
        assert!(matches!(
            ledger.transfer(1, b.acct_no, 1).await,
            Err(LedgerError::AccountNotFound)
        ));
        assert_eq!(balance(&*store, a.id).await, 10);
        assert_eq!(balance(&*store, b.id).await, 5);
    }

    #[tokio::test]
    async fn transfer_resolves_numbers_not_ids() {
        let (store, a, b) = seeded_store(10, 0).await;
        let ledger = ledger_over(Arc::new(store), LedgerPolicy::default());
        // Internal ids are small integers; they must not be taken as account numbers.
        assert!(matches!(
            ledger.transfer(a.id, b.id, 1).await,
            Err(LedgerError::AccountNotFound)
        ));
    }

    #[tokio::test]
    async fn conflicts_are_retried_within_budget() {
        let (inner, a, b) = seeded_store(100, 0).await;
        let store = Arc::new(ContendedStore::new(inner, 2));
        let ledger = ledger_over(
            store.clone(),
            LedgerPolicy {
                overdraft_limit: 0,
                max_retries: 2,
            },
        );

        let updated = ledger.deposit(AccountRef::Id(a.id), 5).await.unwrap();
        assert_eq!(updated.balance, 105);

        store.remaining.store(2, Ordering::SeqCst);
        let receipt = ledger.transfer(a.acct_no, b.acct_no, 5).await.unwrap();
        assert_eq!(receipt.from.balance, 100);
        assert_eq!(receipt.to.balance, 5);
    }

    #[tokio::test]
    async fn exhausted_retry_budget_surfaces_conflict() {
        let (inner, a, b) = seeded_store(100, 0).await;
        let store = Arc::new(ContendedStore::new(inner, u32::MAX));
        let ledger = ledger_over(
            store.clone(),
            LedgerPolicy {
                overdraft_limit: 0,
                max_retries: 3,
            },
        );

        assert!(matches!(
            ledger.withdraw(AccountRef::Id(a.id), 5).await,
            Err(LedgerError::Conflict)
        ));
        assert!(matches!(
            ledger.transfer(a.acct_no, b.acct_no, 5).await,
            Err(LedgerError::Conflict)
        ));
        assert_eq!(balance(&*store, a.id).await, 100);
        assert_eq!(balance(&*store, b.id).await, 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_deposits_lose_no_updates() {
        const TASKS: i64 = 64;
        let (store, a, _) = seeded_store(0, 0).await;
        let store = Arc::new(store);
        // Every lost race means another deposit committed, so TASKS retries always suffice.
        let ledger = ledger_over(
            store.clone(),
            LedgerPolicy {
                overdraft_limit: 0,
                max_retries: TASKS as u32,
            },
        );

        let handles: Vec<_> = (0..TASKS)
            .map(|_| {
                let ledger = ledger.clone();
                tokio::spawn(async move { ledger.deposit(AccountRef::Id(a.id), 1).await })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(balance(&*store, a.id).await, TASKS);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn opposite_transfers_complete_and_conserve_money() {
        const PER_DIRECTION: usize = 25;
        let (store, a, b) = seeded_store(1_000, 1_000).await;
        let store = Arc::new(store);
        let ledger = ledger_over(
            store.clone(),
            LedgerPolicy {
                overdraft_limit: 0,
                max_retries: (PER_DIRECTION * 2) as u32,
            },
        );

        let mut handles = Vec::new();
        for _ in 0..PER_DIRECTION {
            for (from, to) in [(a.acct_no, b.acct_no), (b.acct_no, a.acct_no)] {
                let ledger = ledger.clone();
                handles.push(tokio::spawn(
                    async move { ledger.transfer(from, to, 10).await },
                ));
            }
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let (final_a, final_b) = (
            balance(&*store, a.id).await,
            balance(&*store, b.id).await,
        );
        assert_eq!(final_a + final_b, 2_000);
        assert_eq!((final_a, final_b), (1_000, 1_000));
    }

    #[tokio::test]
    async fn negative_overdraft_limit_is_treated_as_zero() {
        for limit in [-100, i64::MIN] {
            let (store, a, b) = seeded_store(100, 0).await;
            let store = Arc::new(store);
            let ledger = ledger_over(
                store.clone(),
                LedgerPolicy {
                    overdraft_limit: limit,
                    max_retries: 5,
                },
            );
            assert_eq!(ledger.policy().overdraft_limit, 0);

            let emptied = ledger.withdraw(AccountRef::Id(a.id), 100).await.unwrap();
            assert_eq!(emptied.balance, 0);
            assert!(matches!(
                ledger.transfer(a.acct_no, b.acct_no, 1).await,
                Err(LedgerError::InsufficientFunds)
            ));
        }
    }

    #[tokio::test]
    async fn dropped_transfer_applies_nothing() {
        let (inner, a, b) = seeded_store(100, 0).await;
        let store = Arc::new(ContendedStore {
            pause_writes: true,
            ..ContendedStore::new(inner, 0)
        });
        let ledger = ledger_over(store.clone(), LedgerPolicy::default());

        {
            let mut transfer = std::pin::pin!(ledger.transfer(a.acct_no, b.acct_no, 30));
            let mut cx = Context::from_waker(Waker::noop());
            // Suspended just before the dual update, then dropped.
            assert!(matches!(transfer.as_mut().poll(&mut cx), Poll::Pending));
        }
        assert_eq!(balance(&*store, a.id).await, 100);
        assert_eq!(balance(&*store, b.id).await, 0);

        // A transfer that runs to completion applies both legs exactly once.
        let receipt = ledger.transfer(a.acct_no, b.acct_no, 30).await.unwrap();
        assert_eq!((receipt.from.balance, receipt.to.balance), (70, 30));
        assert_eq!(balance(&*store, a.id).await + balance(&*store, b.id).await, 100);
    }

    #[tokio::test]
    async fn dropped_deposit_applies_nothing() {
        let (inner, a, _) = seeded_store(100, 0).await;
        let store = Arc::new(ContendedStore {
            pause_writes: true,
            ..ContendedStore::new(inner, 0)
        });
        let ledger = ledger_over(store.clone(), LedgerPolicy::default());

        {
            let mut deposit = std::pin::pin!(ledger.deposit(AccountRef::Id(a.id), 5));
            let mut cx = Context::from_waker(Waker::noop());
            assert!(matches!(deposit.as_mut().poll(&mut cx), Poll::Pending));
        }
        assert_eq!(balance(&*store, a.id).await, 100);
    }

    #[test]
    fn same_id_dual_update_surfaces_as_same_account() {
        assert!(matches!(
            LedgerError::from(StoreError::InvalidUpdate("dual update needs two distinct accounts")),
            LedgerError::SameAccount
        ));
        assert!(matches!(
            LedgerError::from(StoreError::NotFound),
            LedgerError::AccountNotFound
        ));
    }

    #[tokio::test]
    async fn withdraw_deposit_transfer_scenario() {
        let (store, a, b) = seeded_store(100, 0).await;
        let store = Arc::new(store);
        let ledger = ledger_over(store.clone(), LedgerPolicy::default());

        assert!(matches!(
            ledger.withdraw(AccountRef::Id(a.id), 150).await,
            Err(LedgerError::InsufficientFunds)
        ));
        assert_eq!(balance(&*store, a.id).await, 100);

        let deposited = ledger.deposit(AccountRef::Id(a.id), 50).await.unwrap();
        assert_eq!(deposited.balance, 150);

        let receipt = ledger.transfer(a.acct_no, b.acct_no, 150).await.unwrap();
        assert_eq!(receipt.from.balance, 0);
        assert_eq!(receipt.to.balance, 150);
    }
}

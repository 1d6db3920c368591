//! Shared state handed to every handler.

use std::sync::Arc;

use crate::services::ledger::{Ledger, LedgerPolicy};
use crate::store::{AccountStore, UserStore};

#[derive(Clone)]
pub struct AppState {
    pub users: Arc<dyn UserStore>,
    pub accounts: Arc<dyn AccountStore>,
    pub ledger: Ledger,
    /// Hex SHA-256 of the shared API key
    pub api_key_hash: Arc<str>,
}

impl AppState {
    /// Build state over one store that serves both users and accounts.
    pub fn new<S>(store: Arc<S>, policy: LedgerPolicy, api_key_hash: &str) -> Self
    where
        S: UserStore + AccountStore + 'static,
    {
        let accounts: Arc<dyn AccountStore> = store.clone();
        Self {
            users: store,
            ledger: Ledger::new(accounts.clone(), policy),
            accounts,
            api_key_hash: Arc::from(api_key_hash),
        }
    }
}

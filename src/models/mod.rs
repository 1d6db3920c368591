//! Data models representing database entities.
//!
//! This module contains all data structures that map to database tables,
//! plus the JSON bodies accepted by the HTTP layer.

/// Bank account model and ledger request bodies
pub mod account;
/// Customer model
pub mod user;

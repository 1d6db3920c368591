//! HTTP request handlers (route handlers).
//!
//! Each handler is an async function that:
//! 1. Receives HTTP request data (JSON body, URL params)
//! 2. Calls the store or the ledger engine
//! 3. Returns HTTP response (JSON, status code)

/// Account provisioning, details, deposit and withdrawal
pub mod accounts;
/// Service health endpoint
pub mod health;
/// Money movement between accounts
pub mod transfers;
/// Customer management endpoints
pub mod users;

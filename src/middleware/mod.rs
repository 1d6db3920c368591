//! HTTP middleware components.
//!
//! Middleware are functions that run before route handlers.

/// Shared-credential authentication middleware
pub mod auth;

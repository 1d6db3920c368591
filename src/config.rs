//! Application configuration management.
//!
//! This module handles loading configuration from environment variables.
//! It uses the `envy` crate to deserialize environment variables into a type-safe struct.

use serde::Deserialize;

use crate::services::ledger::LedgerPolicy;

/// Application configuration loaded from environment variables.
///
/// # Environment Variables
///
/// - `DATABASE_URL` (required): PostgreSQL connection string
/// - `API_KEY_HASH` (required): hex SHA-256 of the shared bearer credential
/// - `SERVER_HOST` (optional): bind address, defaults to 0.0.0.0
/// - `SERVER_PORT` (optional): HTTP server port, defaults to 8000
/// - `DB_MAX_CONNECTIONS` (optional): pool size, defaults to 5
/// - `OVERDRAFT_LIMIT` (optional): how far below zero a balance may go, defaults to 0
/// - `CAS_RETRY_LIMIT` (optional): compare-and-set retries per ledger operation, defaults to 5
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub database_url: String,

    pub api_key_hash: String,

    #[serde(default = "default_host")]
    pub server_host: String,

    #[serde(default = "default_port")]
    pub server_port: u16,

    #[serde(default = "default_max_connections")]
    pub db_max_connections: u32,

    #[serde(default)]
    pub overdraft_limit: i64,

    #[serde(default = "default_cas_retry_limit")]
    pub cas_retry_limit: u32,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_max_connections() -> u32 {
    5
}

fn default_cas_retry_limit() -> u32 {
    5
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// This method first attempts to load a `.env` file (which is optional),
    /// then reads environment variables and deserializes them into a Config struct.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Required environment variables are missing (e.g., DATABASE_URL)
    /// - Environment variable values cannot be parsed into expected types
    pub fn from_env() -> Result<Self, envy::Error> {
        dotenvy::dotenv().ok();
        envy::from_env::<Config>()
    }

    /// Ledger rules derived from this configuration.
    pub fn ledger_policy(&self) -> LedgerPolicy {
        LedgerPolicy {
            overdraft_limit: self.overdraft_limit.max(0),
            max_retries: self.cas_retry_limit,
        }
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server_host, self.server_port)
    }
}

//! Customer data model and API request types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Represents a customer record from the database.
///
/// # Database Table
///
/// Maps to the `users` table. A user owns zero or more accounts
/// (`accounts.user_id` references `users.id`).
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow, Serialize)]
pub struct User {
    /// Store-assigned identifier
    pub id: i64,

    pub first_name: String,

    pub last_name: String,

    /// Timestamp when the user was created
    pub created_at: DateTime<Utc>,
}

/// Request body for creating or updating a user.
///
/// # JSON Example
///
/// ```json
/// {
///   "first_name": "Ada",
///   "last_name": "Lovelace"
/// }
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct UserRequest {
    pub first_name: String,
    pub last_name: String,
}

impl UserRequest {
    /// Returns a description of the first invalid field, if any.
    pub fn validate(&self) -> Result<(), String> {
        if self.first_name.trim().is_empty() {
            return Err("first_name must not be empty".to_string());
        }
        if self.last_name.trim().is_empty() {
            return Err("last_name must not be empty".to_string());
        }
        Ok(())
    }
}

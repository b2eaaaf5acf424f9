//! User model. Only what test sets need to reference a creator/updater.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use tarantula_core::types::{DbId, Timestamp};

/// A row from the `users` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct User {
    pub id: DbId,
    pub login: String,
    pub created_at: Timestamp,
}

/// DTO for creating a user.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateUser {
    pub login: String,
}

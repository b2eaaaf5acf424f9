//! Repository for the `users` table.

use sqlx::PgPool;
use tarantula_core::types::DbId;

use crate::models::user::{CreateUser, User};

const COLUMNS: &str = "id, login, created_at";

/// Provides creator/updater lookups for test sets.
pub struct UserRepo;

impl UserRepo {
    /// Insert a new user, returning the created row.
    pub async fn create(pool: &PgPool, input: &CreateUser) -> Result<User, sqlx::Error> {
        let query = format!("INSERT INTO users (login) VALUES ($1) RETURNING {COLUMNS}");
        sqlx::query_as::<_, User>(&query)
            .bind(&input.login)
            .fetch_one(pool)
            .await
    }

    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<User>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM users WHERE id = $1");
        sqlx::query_as::<_, User>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }
}

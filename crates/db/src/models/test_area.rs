//! Test area model and DTOs.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use tarantula_core::types::{DbId, Timestamp};

/// A row from the `test_areas` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct TestArea {
    pub id: DbId,
    pub project_id: DbId,
    pub name: String,
    pub created_at: Timestamp,
}

/// Id and name only, as needed by test set representations and exports.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize)]
pub struct TestAreaRef {
    pub id: DbId,
    pub name: String,
}

/// DTO for creating a test area.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateTestArea {
    pub project_id: DbId,
    pub name: String,
}

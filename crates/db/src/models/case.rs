//! Case models, DTOs and the case-level CSV rows used by test set exports.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use tarantula_core::csv_export::{write_indented_row, CsvOptions};
use tarantula_core::error::CoreError;
use tarantula_core::priority::PriorityNamed;
use tarantula_core::types::{DbId, Timestamp};

/// Entity name used in errors and log fields.
pub const ENTITY: &str = "case";

/// Column titles of a case export row, after any indentation cells.
pub const CSV_HEADER: [&str; 6] = [
    "Case Id",
    "Title",
    "Position",
    "Priority",
    "Average duration",
    "Objective",
];

// ---------------------------------------------------------------------------
// Entity structs (database rows)
// ---------------------------------------------------------------------------

/// A row from the `cases` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Case {
    pub id: DbId,
    pub project_id: DbId,
    pub title: String,
    pub priority: i32,
    pub objective: Option<String>,
    pub deleted: bool,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl PriorityNamed for Case {
    fn priority(&self) -> i32 {
        self.priority
    }
}

/// A case as attached to a test set: the case columns plus the join-row
/// `position` and the case's own average execution duration.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct SetCase {
    /// Case id (not the join-row id).
    pub id: DbId,
    pub title: String,
    pub priority: i32,
    pub objective: Option<String>,
    pub position: Option<i32>,
    /// Average execution duration in seconds, `0` without executions.
    pub average_duration: i64,
}

impl PriorityNamed for SetCase {
    fn priority(&self) -> i32 {
        self.priority
    }
}

impl SetCase {
    /// Header row for case exports, indented per `options`.
    pub fn csv_header(options: &CsvOptions) -> Result<String, CoreError> {
        write_indented_row(options, CSV_HEADER)
    }

    /// One export row, indented per `options`.
    ///
    /// Cases are the leaves of the export tree, so `options.recurse` is not
    /// consulted.
    pub fn to_csv(&self, options: &CsvOptions) -> Result<String, CoreError> {
        let position = self.position.map(|p| p.to_string()).unwrap_or_default();
        write_indented_row(
            options,
            [
                self.id.to_string(),
                self.title.clone(),
                position,
                self.priority.to_string(),
                self.average_duration.to_string(),
                self.objective.clone().unwrap_or_default(),
            ],
        )
    }
}

// ---------------------------------------------------------------------------
// DTOs
// ---------------------------------------------------------------------------

/// DTO for creating a case.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateCase {
    pub project_id: DbId,
    pub title: String,
    /// Defaults to 0 (normal) if omitted.
    pub priority: Option<i32>,
    pub objective: Option<String>,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

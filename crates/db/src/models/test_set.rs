//! Test set models, DTOs and the serialized shapes handed to the UI.
//!
//! [`TestSet`] is the raw row. [`TestSetDetail`] bundles the row with its
//! tags, test areas, cases and average duration so that the brief, full,
//! tree and CSV renderings can be produced without further queries.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use tarantula_core::csv_export::{write_row, CsvOptions};
use tarantula_core::error::CoreError;
use tarantula_core::priority::PriorityNamed;
use tarantula_core::tagging::{TagList, Tagged};
use tarantula_core::test_set::{next_free_case_position, validate_not_blank};
use tarantula_core::types::{Date, DbId, Timestamp};
use validator::Validate;

use crate::models::case::SetCase;
use crate::models::test_area::TestAreaRef;

/// Column titles of a test set export row.
pub const CSV_HEADER: [&str; 7] = [
    "Test Set Id",
    "Name",
    "Date",
    "Priority",
    "Average duration",
    "Tags",
    "Test areas",
];

/// Separator between test area names in the export's last column.
const TEST_AREA_SEPARATOR: &str = ", ";

/// CSS class prefix for tree nodes; the raw priority is appended.
const TREE_NODE_CLASS: &str = "x-listpanel-item priority_";

// ---------------------------------------------------------------------------
// Entity structs (database rows)
// ---------------------------------------------------------------------------

/// A row from the `test_sets` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct TestSet {
    pub id: DbId,
    pub project_id: DbId,
    pub name: String,
    pub date: Date,
    pub external_id: Option<String>,
    pub priority: i32,
    pub deleted: bool,
    pub archived: bool,
    /// Optimistic-lock counter, incremented on every update.
    pub version: i32,
    pub created_by: Option<DbId>,
    pub updated_by: Option<DbId>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl TestSet {
    /// Neither deleted nor archived.
    pub fn is_active(&self) -> bool {
        !self.deleted && !self.archived
    }
}

impl PriorityNamed for TestSet {
    fn priority(&self) -> i32 {
        self.priority
    }
}

/// A test set with everything its renderings need.
#[derive(Debug, Clone)]
pub struct TestSetDetail {
    pub test_set: TestSet,
    pub tags: TagList,
    /// Ordered by id.
    pub test_areas: Vec<TestAreaRef>,
    /// In case-collection (join insertion) order.
    pub cases: Vec<SetCase>,
    /// Sum of the attached cases' average durations, `0` without data.
    pub average_duration: i64,
}

impl Tagged for TestSetDetail {
    fn tags(&self) -> &TagList {
        &self.tags
    }
}

impl PriorityNamed for TestSetDetail {
    fn priority(&self) -> i32 {
        self.test_set.priority
    }
}

// ---------------------------------------------------------------------------
// Serialized shapes
// ---------------------------------------------------------------------------

/// Compact shape for list views.
#[derive(Debug, Clone, Serialize)]
pub struct BriefTestSet {
    pub name: String,
    pub date: Date,
    pub id: DbId,
    pub version: i32,
    pub tag_list: String,
    pub deleted: bool,
    pub archived: bool,
    pub average_duration: i64,
    /// Display name, not the stored integer.
    pub priority: String,
    pub test_area_ids: Vec<DbId>,
}

/// Full shape for detail views, carrying the stored audit columns.
#[derive(Debug, Clone, Serialize)]
pub struct FullTestSet {
    pub name: String,
    pub date: Date,
    pub updated_at: Timestamp,
    pub project_id: DbId,
    pub created_by: Option<DbId>,
    pub updated_by: Option<DbId>,
    pub id: DbId,
    pub version: i32,
    pub deleted: bool,
    pub archived: bool,
    pub created_at: Timestamp,
    pub average_duration: i64,
    /// Display name, not the stored integer.
    pub priority: String,
    pub test_area_ids: Vec<DbId>,
}

/// Node for the set tree widget. Sets are always leaves.
#[derive(Debug, Clone, Serialize)]
pub struct TestSetTreeNode {
    pub text: String,
    pub leaf: bool,
    pub dbid: DbId,
    pub deleted: bool,
    pub archived: bool,
    pub cls: String,
    pub tags: String,
}

impl TestSetDetail {
    pub fn test_area_ids(&self) -> Vec<DbId> {
        self.test_areas.iter().map(|a| a.id).collect()
    }

    pub fn case_ids(&self) -> Vec<DbId> {
        self.cases.iter().map(|c| c.id).collect()
    }

    /// One past the highest attached position, 1 when nothing is attached.
    pub fn next_free_case_position(&self) -> i32 {
        next_free_case_position(self.cases.iter().map(|c| c.position))
    }

    pub fn to_brief(&self) -> BriefTestSet {
        let set = &self.test_set;
        BriefTestSet {
            name: set.name.clone(),
            date: set.date,
            id: set.id,
            version: set.version,
            tag_list: self.tags_to_s(),
            deleted: set.deleted,
            archived: set.archived,
            average_duration: self.average_duration,
            priority: self.priority_name(),
            test_area_ids: self.test_area_ids(),
        }
    }

    pub fn to_full(&self) -> FullTestSet {
        let set = &self.test_set;
        FullTestSet {
            name: set.name.clone(),
            date: set.date,
            updated_at: set.updated_at,
            project_id: set.project_id,
            created_by: set.created_by,
            updated_by: set.updated_by,
            id: set.id,
            version: set.version,
            deleted: set.deleted,
            archived: set.archived,
            created_at: set.created_at,
            average_duration: self.average_duration,
            priority: self.priority_name(),
            test_area_ids: self.test_area_ids(),
        }
    }

    pub fn to_tree(&self) -> TestSetTreeNode {
        let set = &self.test_set;
        TestSetTreeNode {
            text: set.name.clone(),
            leaf: true,
            dbid: set.id,
            deleted: set.deleted,
            archived: set.archived,
            cls: format!("{TREE_NODE_CLASS}{}", set.priority),
            tags: self.tags_to_s(),
        }
    }

    /// Header row for test set exports.
    pub fn csv_header(options: &CsvOptions) -> Result<String, CoreError> {
        write_row(options, CSV_HEADER)
    }

    /// This set's export row. Priority is the raw integer here.
    ///
    /// With `options.recurse > 0` the case header and one row per attached
    /// case follow, rendered one level deeper.
    pub fn to_csv(&self, options: &CsvOptions) -> Result<String, CoreError> {
        let set = &self.test_set;
        let test_areas = self
            .test_areas
            .iter()
            .map(|a| a.name.as_str())
            .collect::<Vec<_>>()
            .join(TEST_AREA_SEPARATOR);

        let mut out = write_row(
            options,
            [
                set.id.to_string(),
                set.name.clone(),
                set.date.to_string(),
                set.priority.to_string(),
                self.average_duration.to_string(),
                self.tags_to_s(),
                test_areas,
            ],
        )?;

        if options.should_recurse() {
            let child = options.descend();
            out.push_str(&SetCase::csv_header(&child)?);
            for case in &self.cases {
                out.push_str(&case.to_csv(&child)?);
            }
        }
        Ok(out)
    }
}

// ---------------------------------------------------------------------------
// DTOs
// ---------------------------------------------------------------------------

/// DTO for creating a test set.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateTestSet {
    pub project_id: DbId,
    #[validate(custom(function = "validate_not_blank"), length(max = 255))]
    pub name: String,
    pub date: Date,
    #[validate(length(min = 1, max = 255))]
    pub external_id: Option<String>,
    /// Defaults to 0 (normal) if omitted.
    pub priority: Option<i32>,
    /// Replaces the set's test areas when present.
    pub test_area_ids: Option<Vec<DbId>>,
    pub created_by: Option<DbId>,
}

/// DTO for updating a test set. `None` fields are left unchanged.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct UpdateTestSet {
    /// The version the caller last read; the update fails if it is stale.
    pub version: i32,
    #[validate(custom(function = "validate_not_blank"), length(max = 255))]
    pub name: Option<String>,
    pub date: Option<Date>,
    #[validate(length(min = 1, max = 255))]
    pub external_id: Option<String>,
    pub priority: Option<i32>,
    pub deleted: Option<bool>,
    pub archived: Option<bool>,
    /// Replaces the set's test areas when present.
    pub test_area_ids: Option<Vec<DbId>>,
    pub updated_by: Option<DbId>,
}

impl UpdateTestSet {
    /// An update that only bumps the version (and re-stamps `updated_by`).
    pub fn touch(version: i32, updated_by: Option<DbId>) -> Self {
        Self {
            version,
            name: None,
            date: None,
            external_id: None,
            priority: None,
            deleted: None,
            archived: None,
            test_area_ids: None,
            updated_by,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

//! Test set scopes, default ordering, case positions and attribute rules.
//!
//! The database layer turns [`TestSetScope`] and [`ORDERED_BY`] into SQL;
//! the in-memory predicates here define the same semantics so they can be
//! checked without a database.

use std::cmp::Ordering;

use validator::ValidationError;

use crate::types::DbId;

/// Entity name used in errors and log fields.
pub const ENTITY: &str = "test_set";

/// Taggable type stored in `taggings.taggable_type` for test sets.
pub const TAGGABLE_TYPE: &str = "TestSet";

/// Default list ordering: priority descending, then name ascending.
pub const ORDERED_BY: &str = "priority DESC, name ASC";

// ---------------------------------------------------------------------------
// Scopes
// ---------------------------------------------------------------------------

/// Row filters over the `deleted` / `archived` flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TestSetScope {
    /// Neither deleted nor archived.
    #[default]
    Active,
    /// Deleted, regardless of `archived`.
    Deleted,
    /// No filtering.
    All,
}

impl TestSetScope {
    /// Whether a row with the given flags belongs to this scope.
    pub fn matches(self, deleted: bool, archived: bool) -> bool {
        match self {
            TestSetScope::Active => !deleted && !archived,
            TestSetScope::Deleted => deleted,
            TestSetScope::All => true,
        }
    }

    /// SQL predicate over the unqualified `deleted` / `archived` columns.
    pub fn sql_predicate(self) -> &'static str {
        match self {
            TestSetScope::Active => "deleted = false AND archived = false",
            TestSetScope::Deleted => "deleted = true",
            TestSetScope::All => "true",
        }
    }
}

// ---------------------------------------------------------------------------
// Ordering
// ---------------------------------------------------------------------------

/// In-memory equivalent of [`ORDERED_BY`].
///
/// Names compare byte-wise, which matches the `C` collation; other
/// collations may order mixed-case names differently.
pub fn compare_ordered(a: (i32, &str), b: (i32, &str)) -> Ordering {
    b.0.cmp(&a.0).then_with(|| a.1.cmp(b.1))
}

// ---------------------------------------------------------------------------
// Case positions
// ---------------------------------------------------------------------------

/// One past the highest position among attached cases, or 1 when no case
/// has a position.
pub fn next_free_case_position<I>(positions: I) -> i32
where
    I: IntoIterator<Item = Option<i32>>,
{
    positions.into_iter().flatten().max().unwrap_or(0) + 1
}

/// Pair each case id with its 1-based position in the supplied order.
pub fn assign_positions(case_ids: &[DbId]) -> Vec<(DbId, i32)> {
    case_ids.iter().copied().zip(1..).collect()
}

// ---------------------------------------------------------------------------
// Attribute validation
// ---------------------------------------------------------------------------

/// Reject names that are empty or whitespace only.
pub fn validate_not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new("blank").with_message("can't be blank".into()));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

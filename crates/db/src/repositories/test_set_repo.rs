//! Repository for the `test_sets` table and its case/test-area/tag
//! associations.
//!
//! Mutations that touch more than one table open a transaction and commit
//! only after every step succeeded. A `sqlx::Transaction` dropped without
//! commit rolls back, so any `?` early return discards all writes.

use sqlx::{PgConnection, PgExecutor, PgPool};
use tarantula_core::csv_export::CsvOptions;
use tarantula_core::error::CoreError;
use tarantula_core::tagging::TagList;
use tarantula_core::test_set::{assign_positions, TestSetScope, ENTITY, ORDERED_BY, TAGGABLE_TYPE};
use tarantula_core::types::DbId;
use validator::Validate;

use crate::error::{DbError, DbResult};
use crate::models::case::SetCase;
use crate::models::test_area::TestAreaRef;
use crate::models::test_set::{CreateTestSet, TestSet, TestSetDetail, UpdateTestSet};
use crate::repositories::{CaseRepo, TagRepo, TestAreaRepo};

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str = "id, project_id, name, date, external_id, priority, deleted, archived, \
    version, created_by, updated_by, created_at, updated_at";

/// Provides CRUD, scoped listing, case assignment and export for test sets.
pub struct TestSetRepo;

impl TestSetRepo {
    // ── Lookups and scopes ───────────────────────────────────────────

    /// Find a test set by its internal ID, whatever its flags.
    pub async fn find_by_id<'e, E>(executor: E, id: DbId) -> Result<Option<TestSet>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let query = format!("SELECT {COLUMNS} FROM test_sets WHERE id = $1");
        sqlx::query_as::<_, TestSet>(&query)
            .bind(id)
            .fetch_optional(executor)
            .await
    }

    /// Find a test set by its external id within a project.
    pub async fn find_in_project_by_external_id(
        pool: &PgPool,
        project_id: DbId,
        external_id: &str,
    ) -> Result<Option<TestSet>, sqlx::Error> {
        let query =
            format!("SELECT {COLUMNS} FROM test_sets WHERE project_id = $1 AND external_id = $2");
        sqlx::query_as::<_, TestSet>(&query)
            .bind(project_id)
            .bind(external_id)
            .fetch_optional(pool)
            .await
    }

    /// List a project's test sets in `scope`, priority descending then
    /// name ascending.
    pub async fn list(
        pool: &PgPool,
        project_id: DbId,
        scope: TestSetScope,
    ) -> Result<Vec<TestSet>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM test_sets
             WHERE project_id = $1 AND {}
             ORDER BY {ORDERED_BY}",
            scope.sql_predicate()
        );
        sqlx::query_as::<_, TestSet>(&query)
            .bind(project_id)
            .fetch_all(pool)
            .await
    }

    // ── Associations ─────────────────────────────────────────────────

    /// Cases attached to a test set in collection (insertion) order, with
    /// their positions and average durations.
    pub async fn cases<'e, E>(executor: E, test_set_id: DbId) -> Result<Vec<SetCase>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, SetCase>(
            "SELECT c.id, c.title, c.priority, c.objective, cts.position,
                    COALESCE(ROUND((
                        SELECT AVG(ce.duration_secs) FROM case_executions ce
                        WHERE ce.case_id = c.id
                    )), 0)::BIGINT AS average_duration
             FROM cases_test_sets cts
             JOIN cases c ON c.id = cts.case_id
             WHERE cts.test_set_id = $1
             ORDER BY cts.id",
        )
        .bind(test_set_id)
        .fetch_all(executor)
        .await
    }

    /// Ids of attached cases in collection order. Repeats are kept.
    pub async fn case_ids<'e, E>(executor: E, test_set_id: DbId) -> Result<Vec<DbId>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_scalar("SELECT case_id FROM cases_test_sets WHERE test_set_id = $1 ORDER BY id")
            .bind(test_set_id)
            .fetch_all(executor)
            .await
    }

    /// Ids of the test areas the set belongs to.
    pub async fn test_area_ids(pool: &PgPool, test_set_id: DbId) -> Result<Vec<DbId>, sqlx::Error> {
        let areas = Self::test_areas(pool, test_set_id).await?;
        Ok(areas.into_iter().map(|a| a.id).collect())
    }

    pub async fn test_areas(
        pool: &PgPool,
        test_set_id: DbId,
    ) -> Result<Vec<TestAreaRef>, sqlx::Error> {
        TestAreaRepo::list_for_test_set(pool, test_set_id).await
    }

    /// Current tags of a test set.
    pub async fn tags(pool: &PgPool, test_set_id: DbId) -> Result<TagList, sqlx::Error> {
        TagRepo::tags_for(pool, TAGGABLE_TYPE, test_set_id).await
    }

    /// Sum of the attached cases' average durations in seconds; `0` when
    /// the set has no cases or none has been executed.
    pub async fn average_duration(pool: &PgPool, test_set_id: DbId) -> Result<i64, sqlx::Error> {
        let ids = Self::case_ids(pool, test_set_id).await?;
        CaseRepo::total_average_duration(pool, &ids).await
    }

    /// One past the highest attached position, or 1 when no attached case
    /// has a position.
    pub async fn next_free_case_position(
        pool: &PgPool,
        test_set_id: DbId,
    ) -> Result<i32, sqlx::Error> {
        sqlx::query_scalar(
            "SELECT COALESCE(MAX(position), 0) + 1 FROM cases_test_sets WHERE test_set_id = $1",
        )
        .bind(test_set_id)
        .fetch_one(pool)
        .await
    }

    /// Load a test set with its tags, test areas, cases and average
    /// duration. Returns `None` if no row with the given `id` exists.
    pub async fn load_detail(pool: &PgPool, id: DbId) -> Result<Option<TestSetDetail>, sqlx::Error> {
        let Some(test_set) = Self::find_by_id(pool, id).await? else {
            return Ok(None);
        };
        let tags = Self::tags(pool, id).await?;
        let test_areas = Self::test_areas(pool, id).await?;
        let cases = Self::cases(pool, id).await?;
        let average_duration = Self::average_duration(pool, id).await?;

        Ok(Some(TestSetDetail {
            test_set,
            tags,
            test_areas,
            cases,
            average_duration,
        }))
    }

    /// Insert join rows for `positioned` cases after any existing ones.
    ///
    /// Nothing is removed or deduplicated: attaching a case twice yields
    /// two rows.
    pub async fn attach_cases(
        conn: &mut PgConnection,
        test_set_id: DbId,
        positioned: &[(DbId, i32)],
    ) -> Result<(), sqlx::Error> {
        for &(case_id, position) in positioned {
            sqlx::query(
                "INSERT INTO cases_test_sets (test_set_id, case_id, position) VALUES ($1, $2, $3)",
            )
            .bind(test_set_id)
            .bind(case_id)
            .bind(position)
            .execute(&mut *conn)
            .await?;
        }
        tracing::debug!(test_set_id, count = positioned.len(), "Cases attached to test set");
        Ok(())
    }

    // ── Row writes (caller's connection) ─────────────────────────────

    /// Validate and insert a test set row, then apply `test_area_ids` if
    /// present.
    pub async fn insert_row(conn: &mut PgConnection, input: &CreateTestSet) -> DbResult<TestSet> {
        input.validate().map_err(CoreError::from)?;

        let query = format!(
            "INSERT INTO test_sets
                (project_id, name, date, external_id, priority, created_by, updated_by)
             VALUES ($1, $2, $3, $4, COALESCE($5, 0), $6, $6)
             RETURNING {COLUMNS}"
        );
        let set = sqlx::query_as::<_, TestSet>(&query)
            .bind(input.project_id)
            .bind(&input.name)
            .bind(input.date)
            .bind(&input.external_id)
            .bind(input.priority)
            .bind(input.created_by)
            .fetch_one(&mut *conn)
            .await
            .map_err(DbError::from_sqlx)?;

        if let Some(area_ids) = &input.test_area_ids {
            TestAreaRepo::replace_for_test_set(&mut *conn, set.id, area_ids)
                .await
                .map_err(DbError::from_sqlx)?;
        }
        Ok(set)
    }

    /// Validate and apply `input` under optimistic locking, then replace
    /// test areas if `test_area_ids` is present.
    ///
    /// The row is only written if its version still equals `input.version`;
    /// the version is then incremented. A stale version fails with
    /// `StaleVersion`, a missing row with `NotFound`.
    pub async fn update_row(
        conn: &mut PgConnection,
        id: DbId,
        input: &UpdateTestSet,
    ) -> DbResult<TestSet> {
        input.validate().map_err(CoreError::from)?;

        let query = format!(
            "UPDATE test_sets SET
                name = COALESCE($3, name),
                date = COALESCE($4, date),
                external_id = COALESCE($5, external_id),
                priority = COALESCE($6, priority),
                deleted = COALESCE($7, deleted),
                archived = COALESCE($8, archived),
                updated_by = COALESCE($9, updated_by),
                version = version + 1,
                updated_at = NOW()
             WHERE id = $1 AND version = $2
             RETURNING {COLUMNS}"
        );
        let updated = sqlx::query_as::<_, TestSet>(&query)
            .bind(id)
            .bind(input.version)
            .bind(&input.name)
            .bind(input.date)
            .bind(&input.external_id)
            .bind(input.priority)
            .bind(input.deleted)
            .bind(input.archived)
            .bind(input.updated_by)
            .fetch_optional(&mut *conn)
            .await
            .map_err(DbError::from_sqlx)?;

        let Some(set) = updated else {
            let current: Option<i32> =
                sqlx::query_scalar("SELECT version FROM test_sets WHERE id = $1")
                    .bind(id)
                    .fetch_optional(&mut *conn)
                    .await?;
            return Err(match current {
                None => CoreError::NotFound { entity: ENTITY, id }.into(),
                Some(current) => {
                    tracing::warn!(
                        test_set_id = id,
                        expected = input.version,
                        current,
                        "Stale test set update rejected"
                    );
                    CoreError::StaleVersion {
                        entity: ENTITY,
                        id,
                        version: input.version,
                    }
                    .into()
                }
            });
        };

        if let Some(area_ids) = &input.test_area_ids {
            TestAreaRepo::replace_for_test_set(&mut *conn, set.id, area_ids)
                .await
                .map_err(DbError::from_sqlx)?;
        }
        Ok(set)
    }

    // ── Transactional operations ─────────────────────────────────────

    /// Create a test set (and its test areas) in one transaction.
    pub async fn create(pool: &PgPool, input: &CreateTestSet) -> DbResult<TestSet> {
        let mut tx = pool.begin().await?;
        let set = Self::insert_row(&mut *tx, input).await?;
        tx.commit().await?;
        tracing::info!(test_set_id = set.id, project_id = set.project_id, "Test set created");
        Ok(set)
    }

    /// Update a test set (and its test areas) in one transaction.
    pub async fn update(pool: &PgPool, id: DbId, input: &UpdateTestSet) -> DbResult<TestSet> {
        let mut tx = pool.begin().await?;
        let set = Self::update_row(&mut *tx, id, input).await?;
        tx.commit().await?;
        tracing::info!(test_set_id = id, version = set.version, "Test set updated");
        Ok(set)
    }

    /// Create a test set with an ordered case list and optional tags.
    ///
    /// Steps, all inside one transaction:
    /// 1. resolve every case id (`NotFound` on the first miss);
    /// 2. give each case its 1-based position in the supplied order;
    /// 3. insert the set row (`Validation` on bad or duplicate attributes);
    /// 4. attach the positioned cases;
    /// 5. tag the set, only when `tag_list` is non-blank.
    pub async fn create_with_cases(
        pool: &PgPool,
        input: &CreateTestSet,
        case_ids: &[DbId],
        tag_list: Option<&str>,
    ) -> DbResult<TestSet> {
        let mut tx = pool.begin().await?;

        let cases = CaseRepo::find_all(&mut *tx, case_ids).await?;
        let resolved: Vec<DbId> = cases.iter().map(|c| c.id).collect();
        let positioned = assign_positions(&resolved);

        let set = Self::insert_row(&mut *tx, input).await?;
        Self::attach_cases(&mut *tx, set.id, &positioned).await?;

        if let Some(tags) = tag_list.filter(|t| !t.trim().is_empty()) {
            TagRepo::tag_with(&mut *tx, TAGGABLE_TYPE, set.id, &TagList::parse(tags)).await?;
        }

        tx.commit().await?;
        tracing::info!(
            test_set_id = set.id,
            project_id = set.project_id,
            cases = positioned.len(),
            "Test set created with cases"
        );
        Ok(set)
    }

    /// Update a test set, append cases and re-tag it.
    ///
    /// Steps, all inside one transaction:
    /// 1. resolve every case id (`NotFound` on the first miss);
    /// 2. give each new case its 1-based position in the supplied order,
    ///    starting from 1 regardless of cases already attached;
    /// 3. apply `input` (`Validation`, `StaleVersion`, `NotFound`);
    /// 4. append the positioned cases without removing or deduplicating;
    /// 5. replace the tags with `tag_list`, clearing them when it is `None`.
    pub async fn update_with_cases(
        pool: &PgPool,
        id: DbId,
        input: &UpdateTestSet,
        case_ids: &[DbId],
        tag_list: Option<&str>,
    ) -> DbResult<TestSet> {
        let mut tx = pool.begin().await?;

        let cases = CaseRepo::find_all(&mut *tx, case_ids).await?;
        let resolved: Vec<DbId> = cases.iter().map(|c| c.id).collect();
        let positioned = assign_positions(&resolved);

        let set = Self::update_row(&mut *tx, id, input).await?;
        Self::attach_cases(&mut *tx, set.id, &positioned).await?;
        TagRepo::tag_with(
            &mut *tx,
            TAGGABLE_TYPE,
            set.id,
            &TagList::parse(tag_list.unwrap_or("")),
        )
        .await?;

        tx.commit().await?;
        tracing::info!(
            test_set_id = id,
            version = set.version,
            appended = positioned.len(),
            "Test set updated with cases"
        );
        Ok(set)
    }

    // ── Flags ────────────────────────────────────────────────────────

    /// Mark a test set deleted. The row stays; only the flag flips.
    pub async fn soft_delete(
        pool: &PgPool,
        id: DbId,
        version: i32,
        updated_by: Option<DbId>,
    ) -> DbResult<TestSet> {
        Self::set_flags(pool, id, version, updated_by, Some(true), None).await
    }

    /// Clear the deleted flag.
    pub async fn restore(
        pool: &PgPool,
        id: DbId,
        version: i32,
        updated_by: Option<DbId>,
    ) -> DbResult<TestSet> {
        Self::set_flags(pool, id, version, updated_by, Some(false), None).await
    }

    /// Set or clear the archived flag.
    pub async fn set_archived(
        pool: &PgPool,
        id: DbId,
        version: i32,
        archived: bool,
        updated_by: Option<DbId>,
    ) -> DbResult<TestSet> {
        Self::set_flags(pool, id, version, updated_by, None, Some(archived)).await
    }

    async fn set_flags(
        pool: &PgPool,
        id: DbId,
        version: i32,
        updated_by: Option<DbId>,
        deleted: Option<bool>,
        archived: Option<bool>,
    ) -> DbResult<TestSet> {
        let input = UpdateTestSet {
            deleted,
            archived,
            ..UpdateTestSet::touch(version, updated_by)
        };
        Self::update(pool, id, &input).await
    }

    // ── Export ───────────────────────────────────────────────────────

    /// Export a project's test sets in `scope` as CSV: the set header, then
    /// each set's rows (with cases when `options.recurse > 0`) in list order.
    pub async fn export_csv(
        pool: &PgPool,
        project_id: DbId,
        scope: TestSetScope,
        options: &CsvOptions,
    ) -> DbResult<String> {
        let mut out = TestSetDetail::csv_header(options)?;
        for set in Self::list(pool, project_id, scope).await? {
            let detail = Self::load_detail(pool, set.id)
                .await?
                .ok_or(CoreError::NotFound { entity: ENTITY, id: set.id })?;
            out.push_str(&detail.to_csv(options)?);
        }
        Ok(out)
    }
}

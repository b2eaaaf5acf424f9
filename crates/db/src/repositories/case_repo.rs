//! Repository for the `cases` and `case_executions` tables.

use sqlx::{PgConnection, PgExecutor, PgPool};
use tarantula_core::error::CoreError;
use tarantula_core::types::DbId;

use crate::error::{DbError, DbResult};
use crate::models::case::{Case, CreateCase, ENTITY};

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str = "id, project_id, title, priority, objective, deleted, created_at, updated_at";

/// Provides case lookup and duration aggregation.
pub struct CaseRepo;

impl CaseRepo {
    /// Insert a new case, returning the created row.
    ///
    /// If `priority` is `None` in the input, defaults to 0 (normal).
    pub async fn create(pool: &PgPool, input: &CreateCase) -> Result<Case, sqlx::Error> {
        let query = format!(
            "INSERT INTO cases (project_id, title, priority, objective)
             VALUES ($1, $2, COALESCE($3, 0), $4)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Case>(&query)
            .bind(input.project_id)
            .bind(&input.title)
            .bind(input.priority)
            .bind(&input.objective)
            .fetch_one(pool)
            .await
    }

    /// Find a case by its internal ID. Deleted cases are still found.
    pub async fn find_by_id<'e, E>(executor: E, id: DbId) -> Result<Option<Case>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let query = format!("SELECT {COLUMNS} FROM cases WHERE id = $1");
        sqlx::query_as::<_, Case>(&query)
            .bind(id)
            .fetch_optional(executor)
            .await
    }

    /// Resolve every id to a case, in the supplied order.
    ///
    /// Fails with `NotFound` on the first id that does not resolve.
    pub async fn find_all(conn: &mut PgConnection, ids: &[DbId]) -> DbResult<Vec<Case>> {
        let mut cases = Vec::with_capacity(ids.len());
        for &id in ids {
            let case = Self::find_by_id(&mut *conn, id)
                .await?
                .ok_or(DbError::Core(CoreError::NotFound { entity: ENTITY, id }))?;
            cases.push(case);
        }
        Ok(cases)
    }

    /// Record one execution of a case and its duration in seconds.
    pub async fn record_execution(
        pool: &PgPool,
        case_id: DbId,
        duration_secs: i64,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("INSERT INTO case_executions (case_id, duration_secs) VALUES ($1, $2)")
            .bind(case_id)
            .bind(duration_secs)
            .execute(pool)
            .await?;
        Ok(())
    }

    /// Sum of the average execution durations (seconds) of the given cases.
    ///
    /// Each distinct case counts once; cases without executions contribute
    /// nothing. Returns `0` for an empty id list or when no case has data.
    pub async fn total_average_duration<'e, E>(
        executor: E,
        ids: &[DbId],
    ) -> Result<i64, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        if ids.is_empty() {
            return Ok(0);
        }
        sqlx::query_scalar(
            "SELECT COALESCE(ROUND(SUM(per_case.avg_secs)), 0)::BIGINT \
             FROM ( \
                 SELECT AVG(duration_secs) AS avg_secs \
                 FROM case_executions \
                 WHERE case_id = ANY($1) \
                 GROUP BY case_id \
             ) per_case",
        )
        .bind(ids)
        .fetch_one(executor)
        .await
    }
}

//! Repository for `test_areas` and the `test_areas_test_sets` join table.

use sqlx::{PgConnection, PgExecutor, PgPool};
use tarantula_core::types::DbId;

use crate::models::test_area::{CreateTestArea, TestArea, TestAreaRef};

const COLUMNS: &str = "id, project_id, name, created_at";

/// Provides test area CRUD and test set membership.
pub struct TestAreaRepo;

impl TestAreaRepo {
    /// Insert a new test area, returning the created row.
    pub async fn create(pool: &PgPool, input: &CreateTestArea) -> Result<TestArea, sqlx::Error> {
        let query = format!(
            "INSERT INTO test_areas (project_id, name) VALUES ($1, $2) RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, TestArea>(&query)
            .bind(input.project_id)
            .bind(&input.name)
            .fetch_one(pool)
            .await
    }

    /// List a project's test areas ordered by name.
    pub async fn list_by_project(
        pool: &PgPool,
        project_id: DbId,
    ) -> Result<Vec<TestArea>, sqlx::Error> {
        let query =
            format!("SELECT {COLUMNS} FROM test_areas WHERE project_id = $1 ORDER BY name");
        sqlx::query_as::<_, TestArea>(&query)
            .bind(project_id)
            .fetch_all(pool)
            .await
    }

    /// Test areas a test set belongs to, ordered by id.
    pub async fn list_for_test_set<'e, E>(
        executor: E,
        test_set_id: DbId,
    ) -> Result<Vec<TestAreaRef>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, TestAreaRef>(
            "SELECT ta.id, ta.name \
             FROM test_areas ta \
             JOIN test_areas_test_sets tats ON tats.test_area_id = ta.id \
             WHERE tats.test_set_id = $1 \
             ORDER BY ta.id",
        )
        .bind(test_set_id)
        .fetch_all(executor)
        .await
    }

    /// Replace a test set's test areas with `test_area_ids`.
    ///
    /// Runs on the caller's connection so it joins any open transaction.
    pub async fn replace_for_test_set(
        conn: &mut PgConnection,
        test_set_id: DbId,
        test_area_ids: &[DbId],
    ) -> Result<(), sqlx::Error> {
        sqlx::query("DELETE FROM test_areas_test_sets WHERE test_set_id = $1")
            .bind(test_set_id)
            .execute(&mut *conn)
            .await?;

        sqlx::query(
            "INSERT INTO test_areas_test_sets (test_set_id, test_area_id) \
             SELECT $1, UNNEST($2::BIGINT[]) \
             ON CONFLICT DO NOTHING",
        )
        .bind(test_set_id)
        .bind(test_area_ids)
        .execute(&mut *conn)
        .await?;
        Ok(())
    }
}

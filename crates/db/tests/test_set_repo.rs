//! Integration tests for the test set repository.
//!
//! Exercises the repository layer against a real database:
//! - Scopes and default ordering
//! - create_with_cases positions, tagging and rollback
//! - update_with_cases appending, re-tagging and optimistic locking
//! - Soft delete and archive flags
//! - Average durations and CSV export
//!
//! These need a live PostgreSQL reachable through `DATABASE_URL`.

use assert_matches::assert_matches;
use chrono::NaiveDate;
use sqlx::PgPool;
use tarantula_core::csv_export::CsvOptions;
use tarantula_core::error::CoreError;
use tarantula_core::tagging::Tagged;
use tarantula_core::test_set::TestSetScope;
use tarantula_db::error::DbError;
use tarantula_db::models::case::CreateCase;
use tarantula_db::models::project::CreateProject;
use tarantula_db::models::test_area::CreateTestArea;
use tarantula_db::models::test_set::{CreateTestSet, UpdateTestSet};
use tarantula_db::models::user::CreateUser;
use tarantula_db::repositories::{
    CaseRepo, ProjectRepo, TestAreaRepo, TestSetRepo, UserRepo,
};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn new_set(project_id: i64, name: &str) -> CreateTestSet {
    CreateTestSet {
        project_id,
        name: name.to_string(),
        date: NaiveDate::from_ymd_opt(2024, 5, 6).unwrap(),
        external_id: None,
        priority: None,
        test_area_ids: None,
        created_by: None,
    }
}

async fn project(pool: &PgPool) -> i64 {
    tarantula_db::telemetry::init_tracing();
    ProjectRepo::create(pool, &CreateProject { name: "Web".to_string() })
        .await
        .unwrap()
        .id
}

async fn case(pool: &PgPool, project_id: i64, title: &str) -> i64 {
    CaseRepo::create(
        pool,
        &CreateCase {
            project_id,
            title: title.to_string(),
            priority: None,
            objective: None,
        },
    )
    .await
    .unwrap()
    .id
}

async fn set_count(pool: &PgPool) -> i64 {
    sqlx::query_scalar("SELECT COUNT(*) FROM test_sets")
        .fetch_one(pool)
        .await
        .unwrap()
}

// ---------------------------------------------------------------------------
// Test: connectivity
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_health_check(pool: PgPool) {
    tarantula_db::health_check(&pool).await.unwrap();
}

// ---------------------------------------------------------------------------
// Test: scopes and ordering
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_scopes_filter_on_flags(pool: PgPool) {
    let pid = project(&pool).await;
    let active = TestSetRepo::create(&pool, &new_set(pid, "Active")).await.unwrap();
    let deleted = TestSetRepo::create(&pool, &new_set(pid, "Deleted")).await.unwrap();
    let archived = TestSetRepo::create(&pool, &new_set(pid, "Archived")).await.unwrap();
    let both = TestSetRepo::create(&pool, &new_set(pid, "Both")).await.unwrap();

    TestSetRepo::soft_delete(&pool, deleted.id, deleted.version, None).await.unwrap();
    TestSetRepo::set_archived(&pool, archived.id, archived.version, true, None)
        .await
        .unwrap();
    let both = TestSetRepo::soft_delete(&pool, both.id, both.version, None).await.unwrap();
    TestSetRepo::set_archived(&pool, both.id, both.version, true, None)
        .await
        .unwrap();

    let active_ids: Vec<i64> = TestSetRepo::list(&pool, pid, TestSetScope::Active)
        .await
        .unwrap()
        .iter()
        .map(|s| s.id)
        .collect();
    assert_eq!(active_ids, vec![active.id]);

    let mut deleted_ids: Vec<i64> = TestSetRepo::list(&pool, pid, TestSetScope::Deleted)
        .await
        .unwrap()
        .iter()
        .map(|s| s.id)
        .collect();
    deleted_ids.sort();
    let mut expected = vec![deleted.id, both.id];
    expected.sort();
    assert_eq!(deleted_ids, expected);

    // Soft delete keeps the row.
    let row = TestSetRepo::find_by_id(&pool, deleted.id).await.unwrap().unwrap();
    assert!(row.deleted);
    assert_eq!(row.version, 2);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_list_orders_by_priority_then_name(pool: PgPool) {
    let pid = project(&pool).await;
    for (name, priority) in [("beta", 0), ("zeta", 1), ("alpha", 0), ("gamma", 1), ("omega", -1)] {
        let mut input = new_set(pid, name);
        input.priority = Some(priority);
        TestSetRepo::create(&pool, &input).await.unwrap();
    }

    let names: Vec<String> = TestSetRepo::list(&pool, pid, TestSetScope::All)
        .await
        .unwrap()
        .into_iter()
        .map(|s| s.name)
        .collect();
    assert_eq!(names, vec!["gamma", "zeta", "alpha", "beta", "omega"]);
}

// ---------------------------------------------------------------------------
// Test: create_with_cases
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_create_with_cases_positions_in_supplied_order(pool: PgPool) {
    let pid = project(&pool).await;
    let a = case(&pool, pid, "A").await;
    let b = case(&pool, pid, "B").await;
    let c = case(&pool, pid, "C").await;

    let set = TestSetRepo::create_with_cases(&pool, &new_set(pid, "Smoke"), &[c, a, b], None)
        .await
        .unwrap();

    let cases = TestSetRepo::cases(&pool, set.id).await.unwrap();
    let pairs: Vec<(i64, Option<i32>)> = cases.iter().map(|k| (k.id, k.position)).collect();
    assert_eq!(pairs, vec![(c, Some(1)), (a, Some(2)), (b, Some(3))]);
    assert_eq!(TestSetRepo::next_free_case_position(&pool, set.id).await.unwrap(), 4);

    // Omitted tag list leaves the fresh set untagged.
    assert!(TestSetRepo::tags(&pool, set.id).await.unwrap().is_empty());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_create_with_cases_applies_tags(pool: PgPool) {
    let pid = project(&pool).await;
    let a = case(&pool, pid, "A").await;

    let set = TestSetRepo::create_with_cases(&pool, &new_set(pid, "Tagged"), &[a], Some("y, x"))
        .await
        .unwrap();

    let detail = TestSetRepo::load_detail(&pool, set.id).await.unwrap().unwrap();
    assert_eq!(detail.tags_to_s(), "x,y");
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_create_with_cases_rolls_back_on_missing_case(pool: PgPool) {
    let pid = project(&pool).await;
    let a = case(&pool, pid, "A").await;
    let c = case(&pool, pid, "C").await;
    let missing = c + 1000;

    let result =
        TestSetRepo::create_with_cases(&pool, &new_set(pid, "Smoke"), &[a, missing, c], Some("x"))
            .await;
    assert_matches!(
        result,
        Err(DbError::Core(CoreError::NotFound { entity: "case", id })) if id == missing
    );

    assert_eq!(set_count(&pool).await, 0);
    let joins: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM cases_test_sets")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(joins, 0);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_create_with_cases_rejects_blank_name(pool: PgPool) {
    let pid = project(&pool).await;
    let a = case(&pool, pid, "A").await;

    let result = TestSetRepo::create_with_cases(&pool, &new_set(pid, "  "), &[a], None).await;
    assert_matches!(result, Err(DbError::Core(CoreError::Validation(_))));
    assert_eq!(set_count(&pool).await, 0);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_external_id_unique_per_project(pool: PgPool) {
    let pid = project(&pool).await;
    let other = project(&pool).await;

    let mut input = new_set(pid, "First");
    input.external_id = Some("EXT-1".to_string());
    TestSetRepo::create(&pool, &input).await.unwrap();

    let mut dup = new_set(pid, "Second");
    dup.external_id = Some("EXT-1".to_string());
    let err = TestSetRepo::create_with_cases(&pool, &dup, &[], None)
        .await
        .unwrap_err();
    assert!(err.is_validation(), "expected validation error, got {err:?}");

    let mut elsewhere = new_set(other, "Elsewhere");
    elsewhere.external_id = Some("EXT-1".to_string());
    TestSetRepo::create(&pool, &elsewhere).await.unwrap();

    // Sets without external ids never collide.
    TestSetRepo::create(&pool, &new_set(pid, "NoExt1")).await.unwrap();
    TestSetRepo::create(&pool, &new_set(pid, "NoExt2")).await.unwrap();

    let found = TestSetRepo::find_in_project_by_external_id(&pool, other, "EXT-1")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(found.name, "Elsewhere");
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_missing_project_is_validation_error(pool: PgPool) {
    let err = TestSetRepo::create(&pool, &new_set(999_999, "Orphan"))
        .await
        .unwrap_err();
    assert!(err.is_validation(), "expected validation error, got {err:?}");
}

// ---------------------------------------------------------------------------
// Test: update_with_cases
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_update_with_cases_appends_and_clears_tags(pool: PgPool) {
    let pid = project(&pool).await;
    let a = case(&pool, pid, "A").await;
    let d = case(&pool, pid, "D").await;

    let set = TestSetRepo::create_with_cases(&pool, &new_set(pid, "Smoke"), &[a], Some("x,y"))
        .await
        .unwrap();
    assert_eq!(TestSetRepo::tags(&pool, set.id).await.unwrap().len(), 2);

    let mut input = UpdateTestSet::touch(set.version, None);
    input.name = Some("Smoke v2".to_string());
    let updated = TestSetRepo::update_with_cases(&pool, set.id, &input, &[d, a], None)
        .await
        .unwrap();

    assert_eq!(updated.name, "Smoke v2");
    assert_eq!(updated.version, set.version + 1);
    assert!(TestSetRepo::tags(&pool, set.id).await.unwrap().is_empty());

    // Existing case kept, new ones appended with positions from 1, duplicate allowed.
    let cases = TestSetRepo::cases(&pool, set.id).await.unwrap();
    let pairs: Vec<(i64, Option<i32>)> = cases.iter().map(|k| (k.id, k.position)).collect();
    assert_eq!(pairs, vec![(a, Some(1)), (d, Some(1)), (a, Some(2))]);
    assert_eq!(TestSetRepo::case_ids(&pool, set.id).await.unwrap(), vec![a, d, a]);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_update_with_cases_replaces_tags_when_given(pool: PgPool) {
    let pid = project(&pool).await;
    let set = TestSetRepo::create_with_cases(&pool, &new_set(pid, "Smoke"), &[], Some("x"))
        .await
        .unwrap();

    let input = UpdateTestSet::touch(set.version, None);
    TestSetRepo::update_with_cases(&pool, set.id, &input, &[], Some("z"))
        .await
        .unwrap();

    let tags = TestSetRepo::tags(&pool, set.id).await.unwrap();
    assert_eq!(tags.to_string(), "z");
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_existing_tag_is_reused(pool: PgPool) {
    let pid = project(&pool).await;
    let first = TestSetRepo::create_with_cases(&pool, &new_set(pid, "One"), &[], Some("x"))
        .await
        .unwrap();
    let second = TestSetRepo::create_with_cases(&pool, &new_set(pid, "Two"), &[], Some("x"))
        .await
        .unwrap();

    let tag_rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM tags WHERE name = 'x'")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(tag_rows, 1);
    assert_eq!(TestSetRepo::tags(&pool, first.id).await.unwrap().to_string(), "x");
    assert_eq!(TestSetRepo::tags(&pool, second.id).await.unwrap().to_string(), "x");
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_update_with_stale_version_rolls_back(pool: PgPool) {
    let pid = project(&pool).await;
    let a = case(&pool, pid, "A").await;
    let b = case(&pool, pid, "B").await;
    let set = TestSetRepo::create_with_cases(&pool, &new_set(pid, "Smoke"), &[a], Some("x"))
        .await
        .unwrap();

    // Someone else updates first.
    TestSetRepo::update(&pool, set.id, &UpdateTestSet::touch(set.version, None))
        .await
        .unwrap();

    let stale = UpdateTestSet::touch(set.version, None);
    let result = TestSetRepo::update_with_cases(&pool, set.id, &stale, &[b], None).await;
    assert_matches!(
        result,
        Err(DbError::Core(CoreError::StaleVersion { version, .. })) if version == set.version
    );

    assert_eq!(TestSetRepo::case_ids(&pool, set.id).await.unwrap(), vec![a]);
    assert_eq!(TestSetRepo::tags(&pool, set.id).await.unwrap().to_string(), "x");
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_update_with_cases_rolls_back_on_missing_case(pool: PgPool) {
    let pid = project(&pool).await;
    let a = case(&pool, pid, "A").await;
    let set = TestSetRepo::create_with_cases(&pool, &new_set(pid, "Smoke"), &[a], Some("x"))
        .await
        .unwrap();
    let missing = a + 1000;

    let mut input = UpdateTestSet::touch(set.version, None);
    input.name = Some("Renamed".to_string());
    let result = TestSetRepo::update_with_cases(&pool, set.id, &input, &[a, missing], None).await;
    assert_matches!(
        result,
        Err(DbError::Core(CoreError::NotFound { entity: "case", id })) if id == missing
    );

    let row = TestSetRepo::find_by_id(&pool, set.id).await.unwrap().unwrap();
    assert_eq!(row.name, "Smoke");
    assert_eq!(row.version, set.version);
    assert_eq!(TestSetRepo::case_ids(&pool, set.id).await.unwrap(), vec![a]);
    assert_eq!(TestSetRepo::tags(&pool, set.id).await.unwrap().to_string(), "x");
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_update_missing_set_is_not_found(pool: PgPool) {
    let result = TestSetRepo::update(&pool, 424_242, &UpdateTestSet::touch(1, None)).await;
    assert_matches!(
        result,
        Err(DbError::Core(CoreError::NotFound { entity: "test_set", .. }))
    );
}

// ---------------------------------------------------------------------------
// Test: details, durations and export
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_average_duration_sums_case_averages(pool: PgPool) {
    let pid = project(&pool).await;
    let a = case(&pool, pid, "A").await;
    let b = case(&pool, pid, "B").await;
    let c = case(&pool, pid, "C").await;
    CaseRepo::record_execution(&pool, a, 10).await.unwrap();
    CaseRepo::record_execution(&pool, a, 30).await.unwrap();
    CaseRepo::record_execution(&pool, b, 5).await.unwrap();

    let empty = TestSetRepo::create(&pool, &new_set(pid, "Empty")).await.unwrap();
    assert_eq!(TestSetRepo::average_duration(&pool, empty.id).await.unwrap(), 0);

    let set = TestSetRepo::create_with_cases(&pool, &new_set(pid, "Timed"), &[a, b, c], None)
        .await
        .unwrap();
    assert_eq!(TestSetRepo::average_duration(&pool, set.id).await.unwrap(), 25);
    assert_eq!(CaseRepo::total_average_duration(&pool, &[]).await.unwrap(), 0);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_detail_representations(pool: PgPool) {
    let pid = project(&pool).await;
    let user = UserRepo::create(&pool, &CreateUser { login: "tester".to_string() })
        .await
        .unwrap();
    let login = TestAreaRepo::create(&pool, &CreateTestArea { project_id: pid, name: "Login".into() })
        .await
        .unwrap();
    let billing =
        TestAreaRepo::create(&pool, &CreateTestArea { project_id: pid, name: "Billing".into() })
            .await
            .unwrap();

    let mut input = new_set(pid, "Release");
    input.priority = Some(1);
    input.created_by = Some(user.id);
    input.test_area_ids = Some(vec![login.id, billing.id]);
    let set = TestSetRepo::create_with_cases(&pool, &input, &[], Some("rc"))
        .await
        .unwrap();

    assert!(ProjectRepo::find_by_id(&pool, pid).await.unwrap().is_some());
    assert_eq!(UserRepo::find_by_id(&pool, user.id).await.unwrap().unwrap().login, "tester");
    assert_eq!(TestAreaRepo::list_by_project(&pool, pid).await.unwrap().len(), 2);
    assert_eq!(
        TestSetRepo::test_area_ids(&pool, set.id).await.unwrap(),
        vec![login.id, billing.id]
    );

    let detail = TestSetRepo::load_detail(&pool, set.id).await.unwrap().unwrap();
    let brief = detail.to_brief();
    assert_eq!(brief.priority, "high");
    assert_eq!(brief.tag_list, "rc");
    assert_eq!(brief.test_area_ids, vec![login.id, billing.id]);

    let full = detail.to_full();
    assert_eq!(full.created_by, Some(user.id));
    assert_eq!(full.updated_by, Some(user.id));
    assert_eq!(full.priority, "high");

    assert_eq!(detail.to_tree().cls, "x-listpanel-item priority_1");
    assert!(TestSetRepo::load_detail(&pool, set.id + 1000).await.unwrap().is_none());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_to_csv_recurses_into_cases(pool: PgPool) {
    let pid = project(&pool).await;
    let a = case(&pool, pid, "A").await;
    let b = case(&pool, pid, "B").await;
    let set = TestSetRepo::create_with_cases(&pool, &new_set(pid, "Smoke"), &[a, b], None)
        .await
        .unwrap();
    let detail = TestSetRepo::load_detail(&pool, set.id).await.unwrap().unwrap();

    let flat = detail.to_csv(&CsvOptions::new(";", "\r\n").unwrap()).unwrap();
    assert_eq!(flat.matches("\r\n").count(), 1);

    let nested = detail
        .to_csv(&CsvOptions::new(";", "\r\n").unwrap().with_recurse(1))
        .unwrap();
    let lines: Vec<&str> = nested.split_terminator("\r\n").collect();
    assert_eq!(lines.len(), 4);
    assert!(lines[0].starts_with(&format!("{};Smoke;2024-05-06;0;0;;", set.id)));
    assert!(lines[1].starts_with(";Case Id;Title"));
    assert!(lines[2].starts_with(&format!(";{a};A;1;")));
    assert!(lines[3].starts_with(&format!(";{b};B;2;")));
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_export_csv_lists_scope_in_order(pool: PgPool) {
    let pid = project(&pool).await;
    let mut high = new_set(pid, "High");
    high.priority = Some(1);
    TestSetRepo::create(&pool, &high).await.unwrap();
    TestSetRepo::create(&pool, &new_set(pid, "Normal")).await.unwrap();

    let csv = TestSetRepo::export_csv(&pool, pid, TestSetScope::Active, &CsvOptions::default())
        .await
        .unwrap();
    let lines: Vec<&str> = csv.split_terminator("\r\n").collect();
    assert_eq!(lines.len(), 3);
    assert!(lines[0].starts_with("Test Set Id;"));
    assert!(lines[1].contains(";High;"));
    assert!(lines[2].contains(";Normal;"));
}

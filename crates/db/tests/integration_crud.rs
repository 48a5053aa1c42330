//! Repository-layer tests against a real database.
//!
//! - Guarded step persistence (status preconditions enforced in SQL)
//! - Atomic transformation replacement (idempotent re-mapping)
//! - Cascade delete of child tables
//! - Pause/resume bookkeeping

use std::collections::HashMap;

use weave_core::mapping::{PlannedTransformation, TransformationKind};
use weave_core::status::IntegrationStatus;
use weave_db::models::integration::{CreateIntegration, DiscoveryCandidate};
use weave_db::models::test_outcome::NewTestOutcome;
use weave_db::repositories::{
    HealingEventRepo, IntegrationRepo, TestOutcomeRepo, TransformationRepo,
};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn candidate(name: &str) -> DiscoveryCandidate {
    DiscoveryCandidate {
        name: name.to_string(),
        base_url: format!("https://{name}.example"),
        docs_url: Some(format!("https://{name}.example/openapi.json")),
        confidence: 0.9,
        provenance: "user".to_string(),
    }
}

fn new_integration(name: &str) -> CreateIntegration {
    CreateIntegration {
        name: name.to_string(),
        user_intent: "sync pets to todos".to_string(),
        source_discovery: candidate("petstore"),
        dest_discovery: candidate("jsonplaceholder"),
    }
}

fn spec_json(title: &str) -> serde_json::Value {
    serde_json::json!({
        "title": title,
        "base_url": format!("https://{title}.example"),
        "auth": "none",
        "endpoints": [],
    })
}

fn rule(src: &str, dst: &str, kind: TransformationKind) -> PlannedTransformation {
    PlannedTransformation {
        source_field: src.to_string(),
        dest_field: dst.to_string(),
        kind,
        config: None,
    }
}

// ---------------------------------------------------------------------------
// Create / read / delete
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn create_starts_discovering(pool: sqlx::PgPool) {
    let row = IntegrationRepo::create(&pool, &new_integration("pets-sync"))
        .await
        .unwrap();

    assert_eq!(row.status_id, IntegrationStatus::Discovering.id());
    assert!(row.source_spec.is_none());
    assert!(row.mapping.is_none());
    assert!(row.health_score.is_none());
    assert!(row.deployment.is_none());
    assert_eq!(row.discovery(true).unwrap().name, "petstore");
}

#[sqlx::test(migrations = "../../migrations")]
async fn delete_cascades_to_children(pool: sqlx::PgPool) {
    let row = IntegrationRepo::create(&pool, &new_integration("doomed"))
        .await
        .unwrap();

    let mut tx = pool.begin().await.unwrap();
    TransformationRepo::replace_all(
        &mut tx,
        row.id,
        &[rule("name", "title", TransformationKind::Direct)],
    )
    .await
    .unwrap();
    let run_id = uuid::Uuid::new_v4();
    TestOutcomeRepo::insert_batch(
        &mut tx,
        row.id,
        run_id,
        &[NewTestOutcome {
            endpoint: "GET /pets".to_string(),
            method: "GET".to_string(),
            status_code: Some(200),
            latency_ms: 12,
            success: true,
            classification: "success".to_string(),
        }],
    )
    .await
    .unwrap();
    tx.commit().await.unwrap();

    assert!(IntegrationRepo::delete(&pool, row.id).await.unwrap());
    assert!(IntegrationRepo::find_by_id(&pool, row.id)
        .await
        .unwrap()
        .is_none());
    assert!(TransformationRepo::list_by_integration(&pool, row.id)
        .await
        .unwrap()
        .is_empty());
    assert!(TestOutcomeRepo::list_by_run(&pool, row.id, run_id)
        .await
        .unwrap()
        .is_empty());
    // Deleting again reports no row.
    assert!(!IntegrationRepo::delete(&pool, row.id).await.unwrap());
}

// ---------------------------------------------------------------------------
// Guarded step persistence
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn store_specs_requires_discovering(pool: sqlx::PgPool) {
    let row = IntegrationRepo::create(&pool, &new_integration("guarded"))
        .await
        .unwrap();

    let updated = IntegrationRepo::store_specs(&pool, row.id, &spec_json("a"), &spec_json("b"))
        .await
        .unwrap()
        .expect("first ingest should match the guard");
    assert_eq!(updated.status_id, IntegrationStatus::Mapping.id());
    assert!(updated.source_spec.is_some());

    // Now in MAPPING: the guarded update matches zero rows.
    let second = IntegrationRepo::store_specs(&pool, row.id, &spec_json("a"), &spec_json("b"))
        .await
        .unwrap();
    assert!(second.is_none());
}

#[sqlx::test(migrations = "../../migrations")]
async fn remapping_replaces_rules_without_duplicates(pool: sqlx::PgPool) {
    let row = IntegrationRepo::create(&pool, &new_integration("remap"))
        .await
        .unwrap();
    IntegrationRepo::store_specs(&pool, row.id, &spec_json("a"), &spec_json("b"))
        .await
        .unwrap();

    let mapping = serde_json::json!({
        "source_endpoint": { "path": "/pets", "method": "GET" },
        "dest_endpoint": { "path": "/todos", "method": "POST" },
        "hints": HashMap::<String, String>::new(),
        "complexity": 1,
        "unmapped": [],
    });
    let rules = vec![
        rule("name", "title", TransformationKind::Direct),
        rule("age", "age", TransformationKind::ParseNumeric),
    ];

    let first = IntegrationRepo::store_mapping(
        &pool,
        row.id,
        &mapping,
        &rules,
        IntegrationStatus::Mapping,
        IntegrationStatus::Testing,
    )
    .await
    .unwrap()
    .expect("map from MAPPING should succeed");
    assert_eq!(first.status_id, IntegrationStatus::Testing.id());

    // Re-map with the same inputs from TESTING (idempotent retry).
    let second = IntegrationRepo::store_mapping(
        &pool,
        row.id,
        &mapping,
        &rules,
        IntegrationStatus::Testing,
        IntegrationStatus::Testing,
    )
    .await
    .unwrap()
    .expect("idempotent re-map");
    assert_eq!(second.status_id, IntegrationStatus::Testing.id());

    let stored = TransformationRepo::list_by_integration(&pool, row.id)
        .await
        .unwrap();
    assert_eq!(stored.len(), 2, "no duplicate rules after re-map");
    assert_eq!(stored[0].position, 0);
    assert_eq!(stored[0].source_field, "name");
    assert_eq!(stored[1].kind, "parse-numeric");
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_run_gates_on_advance_flag(pool: sqlx::PgPool) {
    let row = IntegrationRepo::create(&pool, &new_integration("gated"))
        .await
        .unwrap();
    IntegrationRepo::store_specs(&pool, row.id, &spec_json("a"), &spec_json("b"))
        .await
        .unwrap();
    IntegrationRepo::set_status(
        &pool,
        row.id,
        IntegrationStatus::Mapping,
        IntegrationStatus::Testing,
    )
    .await
    .unwrap();

    let health = serde_json::json!({
        "overall": 69, "data_quality": 80, "reliability": 69,
        "run_id": uuid::Uuid::new_v4(), "computed_at": chrono::Utc::now(),
    });
    let below = IntegrationRepo::store_test_run(
        &pool,
        row.id,
        uuid::Uuid::new_v4(),
        &[],
        &health,
        IntegrationStatus::Testing,
        false,
    )
    .await
    .unwrap()
    .unwrap();
    assert_eq!(below.status_id, IntegrationStatus::Testing.id());

    let above = IntegrationRepo::store_test_run(
        &pool,
        row.id,
        uuid::Uuid::new_v4(),
        &[],
        &health,
        IntegrationStatus::Testing,
        true,
    )
    .await
    .unwrap()
    .unwrap();
    assert_eq!(above.status_id, IntegrationStatus::Deploying.id());
}

#[sqlx::test(migrations = "../../migrations")]
async fn error_log_accumulates_per_step(pool: sqlx::PgPool) {
    let row = IntegrationRepo::create(&pool, &new_integration("errors"))
        .await
        .unwrap();

    IntegrationRepo::set_error(&pool, row.id, "ingest", "fetch timed out")
        .await
        .unwrap();
    IntegrationRepo::set_error(&pool, row.id, "ingest", "parse failed")
        .await
        .unwrap();
    IntegrationRepo::set_error(&pool, row.id, "map", "no fields")
        .await
        .unwrap();

    let fresh = IntegrationRepo::find_by_id(&pool, row.id)
        .await
        .unwrap()
        .unwrap();
    // Last error per step wins; steps accumulate side by side.
    assert_eq!(fresh.error_log["ingest"], "parse failed");
    assert_eq!(fresh.error_log["map"], "no fields");
    // Errors never advance state.
    assert_eq!(fresh.status_id, IntegrationStatus::Discovering.id());
}

// ---------------------------------------------------------------------------
// Pause / resume
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn pause_and_resume_round_trip(pool: sqlx::PgPool) {
    let row = IntegrationRepo::create(&pool, &new_integration("holdable"))
        .await
        .unwrap();
    IntegrationRepo::store_specs(&pool, row.id, &spec_json("a"), &spec_json("b"))
        .await
        .unwrap();

    let paused = IntegrationRepo::pause(&pool, row.id, IntegrationStatus::Mapping)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(paused.status_id, IntegrationStatus::Paused.id());
    assert_eq!(paused.paused_from, Some(IntegrationStatus::Mapping.id()));

    let resumed = IntegrationRepo::resume(&pool, row.id).await.unwrap().unwrap();
    assert_eq!(resumed.status_id, IntegrationStatus::Mapping.id());
    assert!(resumed.paused_from.is_none());

    // Resuming an unpaused integration matches nothing.
    assert!(IntegrationRepo::resume(&pool, row.id).await.unwrap().is_none());
}

// ---------------------------------------------------------------------------
// Healing events
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn healing_audit_trail(pool: sqlx::PgPool) {
    use weave_db::models::healing_event::NewHealingEvent;

    let row = IntegrationRepo::create(&pool, &new_integration("healable"))
        .await
        .unwrap();

    let event = HealingEventRepo::open(
        &pool,
        row.id,
        &NewHealingEvent {
            trigger_reason: "failure-rate".to_string(),
            diagnosis: "schema-drift".to_string(),
            action: "schema-refresh".to_string(),
            attempt: 1,
            detail: None,
        },
    )
    .await
    .unwrap();
    assert_eq!(event.outcome, "pending");

    HealingEventRepo::close(&pool, event.id, "success", None)
        .await
        .unwrap();

    let latest = HealingEventRepo::latest(&pool, row.id).await.unwrap().unwrap();
    assert_eq!(latest.outcome, "success");

    let attempts = HealingEventRepo::attempts_for_reason(&pool, row.id, "failure-rate")
        .await
        .unwrap();
    assert_eq!(attempts, 1);
}

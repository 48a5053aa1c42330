//! Handlers for the `/integrations` resource.
//!
//! Lifecycle step endpoints dispatch to the orchestrator and answer
//! with the [`StepResponse`] envelope; read endpoints hit the
//! repositories directly.

use std::collections::HashMap;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use uuid::Uuid;
use weave_core::error::CoreError;
use weave_core::status::IntegrationStatus;
use weave_core::types::{DbId, Timestamp};
use weave_db::models::integration::{CreateIntegration, EndpointRef, Integration};
use weave_db::repositories::{HealingEventRepo, IntegrationRepo, TestOutcomeRepo};
use weave_deploy::ResourceRequest;
use weave_fetcher::FormatHint;
use weave_orchestrator::{DeployArgs, IngestArgs, MapArgs, TestArgs};

use crate::error::{AppError, AppResult};
use crate::response::{DataResponse, StepResponse};
use crate::state::AppState;

// ---------------------------------------------------------------------------
// View model
// ---------------------------------------------------------------------------

/// API projection of an integration row: the raw `status_id` is
/// replaced with its uppercase label.
#[derive(Debug, serde::Serialize)]
pub struct IntegrationView {
    pub id: DbId,
    pub name: String,
    pub user_intent: String,
    pub status: &'static str,
    pub source_discovery: serde_json::Value,
    pub dest_discovery: serde_json::Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_spec: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dest_spec: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mapping: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub health_score: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deployment: Option<serde_json::Value>,
    pub error_log: serde_json::Value,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// Split a row into its view and its typed status.
fn view_of(row: Integration) -> AppResult<(IntegrationView, IntegrationStatus)> {
    let status = IntegrationStatus::from_id(row.status_id).ok_or_else(|| {
        AppError::Core(CoreError::Internal(format!(
            "integration {} has unknown status id {}",
            row.id, row.status_id
        )))
    })?;

    let view = IntegrationView {
        id: row.id,
        name: row.name,
        user_intent: row.user_intent,
        status: status.as_str(),
        source_discovery: row.source_discovery,
        dest_discovery: row.dest_discovery,
        source_spec: row.source_spec,
        dest_spec: row.dest_spec,
        mapping: row.mapping,
        health_score: row.health_score,
        deployment: row.deployment,
        error_log: row.error_log,
        created_at: row.created_at,
        updated_at: row.updated_at,
    };
    Ok((view, status))
}

fn step_response(row: Integration) -> AppResult<Json<StepResponse>> {
    let (view, status) = view_of(row)?;
    Ok(Json(StepResponse::for_view(view, status)))
}

// ---------------------------------------------------------------------------
// Request DTOs
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
pub struct IngestRequest {
    /// Override for the source documentation URL; defaults to the
    /// discovery candidate's `docs_url`.
    pub source_url: Option<String>,
    pub dest_url: Option<String>,
    /// Expected document formats (`openapi` or `unstructured`);
    /// OpenAPI detection by default.
    pub source_format: Option<FormatHint>,
    pub dest_format: Option<FormatHint>,
}

#[derive(Debug, Deserialize)]
pub struct MapRequest {
    pub source_endpoint: EndpointRef,
    pub dest_endpoint: EndpointRef,
    /// Source field name -> destination field name overrides.
    #[serde(default, rename = "mapping_hints")]
    pub hints: HashMap<String, String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct TestRequest {
    /// Batch size, 1..=100. Defaults to the server's configured size.
    #[serde(rename = "test_sample_size")]
    pub sample_size: Option<i64>,
    /// Defaults to true: destructive destination calls are simulated.
    pub skip_destructive: Option<bool>,
    /// Fixed payload seed for reproducible batches.
    pub seed: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct DeployRequest {
    pub replicas: Option<i32>,
    pub memory_mb: Option<i32>,
    pub cpu_cores: Option<f64>,
    pub auto_scale: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
pub struct HealRequest {
    /// Recorded as the healing event's trigger reason.
    pub reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    /// Filter by uppercase status label (e.g. `ACTIVE`).
    pub status: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct OutcomesQuery {
    /// Restrict to one test run.
    pub run_id: Option<Uuid>,
    /// Window size for the rolling view. Defaults to 50, capped at 200.
    pub limit: Option<i64>,
}

/// Parse an uppercase status label from a query parameter.
fn parse_status_label(label: &str) -> AppResult<IntegrationStatus> {
    [
        IntegrationStatus::Discovering,
        IntegrationStatus::Mapping,
        IntegrationStatus::Testing,
        IntegrationStatus::Deploying,
        IntegrationStatus::Active,
        IntegrationStatus::Failed,
        IntegrationStatus::Paused,
    ]
    .into_iter()
    .find(|s| s.as_str() == label)
    .ok_or_else(|| AppError::BadRequest(format!("unknown status '{label}'")))
}

// ---------------------------------------------------------------------------
// Create
// ---------------------------------------------------------------------------

/// POST /api/v1/integrations
///
/// Create an integration from its two discovery candidates. Returns
/// 201 with the new integration in `DISCOVERING`.
pub async fn create(
    State(state): State<AppState>,
    Json(input): Json<CreateIntegration>,
) -> AppResult<impl IntoResponse> {
    if input.name.chars().count() > 200 {
        return Err(AppError::BadRequest(
            "name must be at most 200 characters".into(),
        ));
    }

    let created = state.orchestrator.create(input).await?;

    tracing::info!(id = created.id, name = %created.name, "Integration created");
    Ok((StatusCode::CREATED, step_response(created)?))
}

// ---------------------------------------------------------------------------
// Read
// ---------------------------------------------------------------------------

/// GET /api/v1/integrations
///
/// List integrations, newest first. Supports an optional `status`
/// label filter.
pub async fn list(
    State(state): State<AppState>,
    Query(params): Query<ListQuery>,
) -> AppResult<impl IntoResponse> {
    let rows = match params.status.as_deref() {
        Some(label) => {
            let status = parse_status_label(label)?;
            IntegrationRepo::list_by_status(&state.pool, status).await?
        }
        None => IntegrationRepo::list(&state.pool).await?,
    };

    let views = rows
        .into_iter()
        .map(|row| view_of(row).map(|(view, _)| view))
        .collect::<AppResult<Vec<_>>>()?;
    Ok(Json(DataResponse { data: views }))
}

/// GET /api/v1/integrations/{id}
pub async fn get_by_id(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let row = IntegrationRepo::find_by_id(&state.pool, id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "integration",
            id,
        }))?;

    let (view, _) = view_of(row)?;
    Ok(Json(DataResponse { data: view }))
}

/// DELETE /api/v1/integrations/{id}
///
/// Remove an integration and, via cascade, its transformation rules,
/// test outcomes, and healing trail. Returns 204.
pub async fn delete(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let deleted = IntegrationRepo::delete(&state.pool, id).await?;
    if !deleted {
        return Err(AppError::Core(CoreError::NotFound {
            entity: "integration",
            id,
        }));
    }

    tracing::info!(id, "Integration deleted");
    Ok(StatusCode::NO_CONTENT)
}

// ---------------------------------------------------------------------------
// Lifecycle steps
// ---------------------------------------------------------------------------

/// POST /api/v1/integrations/{id}/ingest
///
/// Fetch and normalize both API specifications. Advances
/// `DISCOVERING -> MAPPING`.
pub async fn ingest(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
    body: Option<Json<IngestRequest>>,
) -> AppResult<impl IntoResponse> {
    let req = body.map(|Json(b)| b).unwrap_or_default();
    let updated = state
        .orchestrator
        .ingest(
            id,
            IngestArgs {
                source_url: req.source_url,
                dest_url: req.dest_url,
                source_format: req.source_format,
                dest_format: req.dest_format,
            },
        )
        .await?;
    step_response(updated)
}

/// POST /api/v1/integrations/{id}/map
///
/// Plan field transformations for the chosen endpoint pair. Advances
/// `MAPPING -> TESTING`.
pub async fn map(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
    Json(req): Json<MapRequest>,
) -> AppResult<impl IntoResponse> {
    let updated = state
        .orchestrator
        .map(
            id,
            MapArgs {
                source_endpoint: req.source_endpoint,
                dest_endpoint: req.dest_endpoint,
                hints: req.hints,
            },
        )
        .await?;
    step_response(updated)
}

/// POST /api/v1/integrations/{id}/test
///
/// Run a synthetic batch and score it. Advances `TESTING ->
/// DEPLOYING` when the score passes; otherwise the state stays and the
/// shortfall lands in `error_log`.
pub async fn test(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
    body: Option<Json<TestRequest>>,
) -> AppResult<impl IntoResponse> {
    let req = body.map(|Json(b)| b).unwrap_or_default();

    if let Some(n) = req.sample_size {
        if !(1..=100).contains(&n) {
            return Err(AppError::BadRequest(
                "test_sample_size must be between 1 and 100".into(),
            ));
        }
    }

    let updated = state
        .orchestrator
        .test(
            id,
            TestArgs {
                sample_size: req.sample_size,
                skip_destructive: req.skip_destructive,
                seed: req.seed,
            },
        )
        .await?;
    step_response(updated)
}

/// POST /api/v1/integrations/{id}/deploy
///
/// Build and launch the runtime unit. Advances `DEPLOYING -> ACTIVE`.
pub async fn deploy(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
    body: Option<Json<DeployRequest>>,
) -> AppResult<impl IntoResponse> {
    let req = body.map(|Json(b)| b).unwrap_or_default();

    if let Some(replicas) = req.replicas {
        if !(1..=16).contains(&replicas) {
            return Err(AppError::BadRequest(
                "replicas must be between 1 and 16".into(),
            ));
        }
    }

    let defaults = ResourceRequest::default();
    let resources = ResourceRequest {
        replicas: req.replicas.unwrap_or(defaults.replicas),
        memory_mb: req.memory_mb.unwrap_or(defaults.memory_mb),
        cpu_cores: req.cpu_cores.unwrap_or(defaults.cpu_cores),
        auto_scale: req.auto_scale.unwrap_or(defaults.auto_scale),
    };

    let updated = state
        .orchestrator
        .deploy(
            id,
            DeployArgs {
                resources: Some(resources),
            },
        )
        .await?;
    step_response(updated)
}

/// POST /api/v1/integrations/{id}/pause
pub async fn pause(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let updated = state.orchestrator.pause(id).await?;
    step_response(updated)
}

/// POST /api/v1/integrations/{id}/resume
pub async fn resume(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let updated = state.orchestrator.resume(id).await?;
    step_response(updated)
}

/// POST /api/v1/integrations/{id}/heal
///
/// Run one healing pass. The event and its outcome land in the
/// healing audit trail either way.
pub async fn heal(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
    body: Option<Json<HealRequest>>,
) -> AppResult<impl IntoResponse> {
    let req = body.map(|Json(b)| b).unwrap_or_default();
    let reason = req.reason.unwrap_or_else(|| "operator-initiated".into());

    let updated = state.orchestrator.heal(id, &reason).await?;
    step_response(updated)
}

/// POST /api/v1/integrations/{id}/drift-check
///
/// Refetch both specifications and report schema drift against the
/// stored snapshots. Read-only.
pub async fn drift_check(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let report = state.orchestrator.drift_check(id).await?;
    Ok(Json(DataResponse { data: report }))
}

// ---------------------------------------------------------------------------
// Histories
// ---------------------------------------------------------------------------

/// GET /api/v1/integrations/{id}/outcomes
///
/// Synthetic call outcomes: one run when `run_id` is given, otherwise
/// the rolling recent window.
pub async fn outcomes(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
    Query(params): Query<OutcomesQuery>,
) -> AppResult<impl IntoResponse> {
    // 404 for unknown integrations rather than an empty list.
    IntegrationRepo::find_by_id(&state.pool, id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "integration",
            id,
        }))?;

    let rows = match params.run_id {
        Some(run_id) => TestOutcomeRepo::list_by_run(&state.pool, id, run_id).await?,
        None => {
            let limit = params.limit.unwrap_or(50).clamp(1, 200);
            TestOutcomeRepo::recent(&state.pool, id, limit).await?
        }
    };
    Ok(Json(DataResponse { data: rows }))
}

/// GET /api/v1/integrations/{id}/healing-events
///
/// The self-healing audit trail, newest first.
pub async fn healing_events(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    IntegrationRepo::find_by_id(&state.pool, id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "integration",
            id,
        }))?;

    let rows = HealingEventRepo::list_by_integration(&state.pool, id).await?;
    Ok(Json(DataResponse { data: rows }))
}

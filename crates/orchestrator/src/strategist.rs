//! Self-healing strategist execution.
//!
//! The pure diagnosis/strategy-selection half lives in `weave_core`;
//! this module executes the chosen strategy against a live
//! integration: refetching specs, switching endpoints, remapping,
//! backing off, then verifying with a small synthetic batch. Every
//! invocation leaves a row in the healing audit trail.

use std::collections::HashMap;

use serde_json::json;
use weave_core::error::CoreError;
use weave_core::healing::{
    diagnose, retry_delay_ms, select_strategy, Diagnosis, HealingOutcome, HealingStrategy,
    MAX_HEALING_ATTEMPTS, VERIFY_SAMPLE_SIZE,
};
use weave_core::mapping::{name_similarity, plan_mapping, FUZZY_THRESHOLD};
use weave_core::outcome::{OutcomeClass, OutcomeSample};
use weave_core::spec::NormalizedSpec;
use weave_core::status::{IntegrationStatus, StepKind};
use weave_core::types::DbId;
use weave_db::models::healing_event::NewHealingEvent;
use weave_db::models::integration::{EndpointRef, Integration, MappingRecord};
use weave_db::models::test_outcome::TestOutcome;
use weave_db::repositories::{HealingEventRepo, IntegrationRepo, TestOutcomeRepo};

use crate::error::StepError;
use crate::lifecycle::{db_err, resolve_endpoint, status_of, to_json, IngestArgs, Orchestrator};

/// How many recent outcomes the diagnoser reads.
const DIAGNOSIS_WINDOW: i64 = 20;

/// Run one healing pass for an active integration.
///
/// Caller holds the integration's step lock.
pub(crate) async fn heal(
    orch: &Orchestrator,
    id: DbId,
    trigger_reason: &str,
) -> Result<Integration, StepError> {
    let step = StepKind::Heal;
    let integration = orch.load(id).await.map_err(|e| StepError::new(step, e))?;
    let status = status_of(&integration).map_err(|e| StepError::new(step, e))?;

    if status != IntegrationStatus::Active {
        return Err(StepError::new(
            step,
            CoreError::Precondition(format!(
                "healing requires ACTIVE, integration {id} is {}",
                status.as_str()
            )),
        ));
    }

    let window = TestOutcomeRepo::recent(&orch.pool, id, DIAGNOSIS_WINDOW)
        .await
        .map_err(|e| StepError::new(step, db_err(e)))?;
    let samples = samples_of_rows(&window);
    let diagnosis = diagnose(&samples);
    let strategy = select_strategy(diagnosis);

    let attempt = attempt_number(orch, id, trigger_reason)
        .await
        .map_err(|e| StepError::new(step, e))?;

    let event = HealingEventRepo::open(
        &orch.pool,
        id,
        &NewHealingEvent {
            trigger_reason: trigger_reason.to_string(),
            diagnosis: diagnosis.as_str().to_string(),
            action: strategy.as_str().to_string(),
            attempt,
            detail: None,
        },
    )
    .await
    .map_err(|e| StepError::new(step, db_err(e)))?;

    tracing::info!(
        id,
        attempt,
        diagnosis = diagnosis.as_str(),
        action = strategy.as_str(),
        "healing pass started"
    );

    if i64::from(attempt) > i64::from(MAX_HEALING_ATTEMPTS) {
        return escalate(orch, id, event.id, trigger_reason).await;
    }

    // Credential rotation never guesses secrets; it parks the event
    // pending operator input and leaves the integration as-is.
    if strategy == HealingStrategy::CredentialRotation {
        return park_for_operator(orch, id, event.id, diagnosis).await;
    }

    let executed = execute_strategy(orch, &integration, strategy, attempt).await;
    let current = match executed {
        Ok(current) => current,
        Err(e) => {
            close_event(orch, event.id, HealingOutcome::Failed, json!({"error": e.to_string()}))
                .await;
            return Err(orch.fail(id, step, e).await);
        }
    };

    verify(orch, current, event.id, attempt).await
}

/// 1-based attempt counter for this trigger reason in the recent
/// window.
async fn attempt_number(
    orch: &Orchestrator,
    id: DbId,
    trigger_reason: &str,
) -> Result<i16, CoreError> {
    let prior = HealingEventRepo::attempts_for_reason(&orch.pool, id, trigger_reason)
        .await
        .map_err(db_err)?;
    Ok((prior + 1).min(i64::from(i16::MAX)) as i16)
}

/// Attempt cap reached: mark for manual review and fail the
/// integration so it stops serving.
async fn escalate(
    orch: &Orchestrator,
    id: DbId,
    event_id: DbId,
    trigger_reason: &str,
) -> Result<Integration, StepError> {
    let step = StepKind::Heal;

    close_event(
        orch,
        event_id,
        HealingOutcome::Failed,
        json!({"escalated": true, "reason": "attempt cap reached"}),
    )
    .await;

    let message = format!(
        "healing attempt cap ({MAX_HEALING_ATTEMPTS}) reached for '{trigger_reason}'; \
         manual review required"
    );
    if let Err(e) = IntegrationRepo::set_error(&orch.pool, id, step.as_str(), &message).await {
        tracing::warn!(id, error = %e, "could not record escalation");
    }

    tracing::error!(id, trigger_reason, "healing escalated to manual review");

    IntegrationRepo::set_status(
        &orch.pool,
        id,
        IntegrationStatus::Active,
        IntegrationStatus::Failed,
    )
    .await
    .map_err(|e| StepError::new(step, db_err(e)))?
    .ok_or_else(|| {
        StepError::new(
            step,
            CoreError::Precondition(format!("integration {id} changed state during escalation")),
        )
    })
}

async fn park_for_operator(
    orch: &Orchestrator,
    id: DbId,
    event_id: DbId,
    diagnosis: Diagnosis,
) -> Result<Integration, StepError> {
    let step = StepKind::Heal;

    close_event(
        orch,
        event_id,
        HealingOutcome::Pending,
        json!({
            "operator_input_required": true,
            "diagnosis": diagnosis.as_str(),
        }),
    )
    .await;

    let message = "credential rotation requires operator-supplied credentials";
    if let Err(e) = IntegrationRepo::set_error(&orch.pool, id, step.as_str(), message).await {
        tracing::warn!(id, error = %e, "could not record pending rotation");
    }

    tracing::warn!(id, "healing parked pending operator input");
    orch.load(id).await.map_err(|e| StepError::new(step, e))
}

/// Run the remediation itself, returning the (possibly remapped)
/// integration ready for verification.
async fn execute_strategy(
    orch: &Orchestrator,
    integration: &Integration,
    strategy: HealingStrategy,
    attempt: i16,
) -> Result<Integration, CoreError> {
    match strategy {
        HealingStrategy::BoundedRetry => {
            let delay = retry_delay_ms(attempt);
            tracing::debug!(id = integration.id, delay_ms = delay, "bounded retry backoff");
            tokio::time::sleep(std::time::Duration::from_millis(delay)).await;
            Ok(integration.clone())
        }
        HealingStrategy::SchemaRefresh => {
            let record = mapping_of(integration)?;
            let (source_spec, dest_spec) = refresh(orch, integration).await?;
            remap(
                orch,
                integration.id,
                &source_spec,
                &dest_spec,
                record.source_endpoint,
                record.dest_endpoint,
                record.hints,
            )
            .await
        }
        HealingStrategy::EndpointSwitch => {
            let record = mapping_of(integration)?;
            let (source_spec, dest_spec) = refresh(orch, integration).await?;

            let source_ref = reresolve(&source_spec, &record.source_endpoint, "source")?;
            let dest_ref = reresolve(&dest_spec, &record.dest_endpoint, "destination")?;

            if source_ref != record.source_endpoint {
                tracing::info!(
                    id = integration.id,
                    from = %record.source_endpoint.label(),
                    to = %source_ref.label(),
                    "switching source endpoint"
                );
            }
            if dest_ref != record.dest_endpoint {
                tracing::info!(
                    id = integration.id,
                    from = %record.dest_endpoint.label(),
                    to = %dest_ref.label(),
                    "switching destination endpoint"
                );
            }

            remap(
                orch,
                integration.id,
                &source_spec,
                &dest_spec,
                source_ref,
                dest_ref,
                record.hints,
            )
            .await
        }
        // Handled before execution.
        HealingStrategy::CredentialRotation => Ok(integration.clone()),
    }
}

/// Refetch both specs and persist them in place.
async fn refresh(
    orch: &Orchestrator,
    integration: &Integration,
) -> Result<(NormalizedSpec, NormalizedSpec), CoreError> {
    let (source_spec, dest_spec) = orch
        .fetch_pair(integration, &IngestArgs::default())
        .await?;

    IntegrationRepo::refresh_specs(
        &orch.pool,
        integration.id,
        &to_json(&source_spec)?,
        &to_json(&dest_spec)?,
    )
    .await
    .map_err(db_err)?
    .ok_or(CoreError::NotFound {
        entity: "integration",
        id: integration.id,
    })?;

    Ok((source_spec, dest_spec))
}

/// Re-run the mapper for the given pair and store the result without a
/// lifecycle transition.
async fn remap(
    orch: &Orchestrator,
    id: DbId,
    source_spec: &NormalizedSpec,
    dest_spec: &NormalizedSpec,
    source_ref: EndpointRef,
    dest_ref: EndpointRef,
    hints: HashMap<String, String>,
) -> Result<Integration, CoreError> {
    let source_ep = resolve_endpoint(source_spec, &source_ref, "source")?;
    let dest_ep = resolve_endpoint(dest_spec, &dest_ref, "destination")?;
    let plan = plan_mapping(source_ep, dest_ep, &hints)?;

    let record = MappingRecord {
        source_endpoint: source_ref,
        dest_endpoint: dest_ref,
        hints,
        complexity: plan.complexity,
        unmapped: plan.unmapped.clone(),
    };

    IntegrationRepo::store_mapping(
        &orch.pool,
        id,
        &to_json(&record)?,
        &plan.transformations,
        IntegrationStatus::Active,
        IntegrationStatus::Active,
    )
    .await
    .map_err(db_err)?
    .ok_or_else(|| {
        CoreError::Precondition(format!("integration {id} changed state during healing"))
    })
}

/// Keep the mapped endpoint if the refreshed spec still has it,
/// otherwise probe for the closest same-method alternate.
fn reresolve(
    spec: &NormalizedSpec,
    endpoint: &EndpointRef,
    which: &str,
) -> Result<EndpointRef, CoreError> {
    if spec.endpoint(&endpoint.path, Some(&endpoint.method)).is_some() {
        return Ok(endpoint.clone());
    }

    alternate_endpoint(spec, endpoint).ok_or_else(|| {
        CoreError::Validation(format!(
            "{which} spec no longer has '{}' and no alternate endpoint is close enough",
            endpoint.label()
        ))
    })
}

/// Closest same-method endpoint by path similarity, at or above the
/// fuzzy threshold.
fn alternate_endpoint(spec: &NormalizedSpec, missing: &EndpointRef) -> Option<EndpointRef> {
    spec.endpoints
        .iter()
        .filter(|e| e.method.eq_ignore_ascii_case(&missing.method))
        .map(|e| (e, name_similarity(&e.path, &missing.path)))
        .filter(|(_, sim)| *sim >= FUZZY_THRESHOLD)
        .max_by(|(_, a), (_, b)| a.total_cmp(b))
        .map(|(e, _)| EndpointRef {
            path: e.path.clone(),
            method: e.method.clone(),
        })
}

/// Post-remediation verification: a small synthetic batch must pass
/// the health threshold for the event to close as success.
async fn verify(
    orch: &Orchestrator,
    integration: Integration,
    event_id: DbId,
    attempt: i16,
) -> Result<Integration, StepError> {
    let step = StepKind::Heal;
    let id = integration.id;

    let run = match orch
        .execute_run(&integration, VERIFY_SAMPLE_SIZE, true, None)
        .await
    {
        Ok(run) => run,
        Err(e) => {
            close_event(orch, event_id, HealingOutcome::Failed, json!({"error": e.to_string()}))
                .await;
            return Err(orch.fail(id, step, e).await);
        }
    };

    let health_json = to_json(&run.health).map_err(|e| StepError::new(step, e))?;
    let updated = IntegrationRepo::store_test_run(
        &orch.pool,
        id,
        run.run_id,
        &run.outcomes,
        &health_json,
        IntegrationStatus::Active,
        false,
    )
    .await
    .map_err(|e| StepError::new(step, db_err(e)))?
    .ok_or_else(|| {
        StepError::new(
            step,
            CoreError::Precondition(format!("integration {id} changed state during healing")),
        )
    })?;

    let passed = run.health.overall >= orch.config.pass_threshold;
    let outcome = if passed {
        HealingOutcome::Success
    } else {
        HealingOutcome::Failed
    };
    close_event(
        orch,
        event_id,
        outcome,
        json!({
            "verification_score": run.health.overall,
            "run_id": run.run_id,
            "attempt": attempt,
        }),
    )
    .await;

    if passed {
        tracing::info!(id, score = run.health.overall, "healing verified");
        return Ok(updated);
    }

    tracing::warn!(id, score = run.health.overall, "healing verification failed");
    let message = format!(
        "healing verification scored {} (threshold {})",
        run.health.overall, orch.config.pass_threshold
    );
    if let Err(e) = IntegrationRepo::set_error(&orch.pool, id, step.as_str(), &message).await {
        tracing::warn!(id, error = %e, "could not record verification failure");
    }

    IntegrationRepo::set_status(
        &orch.pool,
        id,
        IntegrationStatus::Active,
        IntegrationStatus::Failed,
    )
    .await
    .map_err(|e| StepError::new(step, db_err(e)))?
    .ok_or_else(|| {
        StepError::new(
            step,
            CoreError::Precondition(format!("integration {id} changed state during healing")),
        )
    })
}

async fn close_event(
    orch: &Orchestrator,
    event_id: DbId,
    outcome: HealingOutcome,
    detail: serde_json::Value,
) {
    if let Err(e) =
        HealingEventRepo::close(&orch.pool, event_id, outcome.as_str(), Some(&detail)).await
    {
        tracing::warn!(event_id, error = %e, "could not close healing event");
    }
}

fn mapping_of(integration: &Integration) -> Result<MappingRecord, CoreError> {
    integration.mapping_record().ok_or_else(|| {
        CoreError::Precondition(format!("integration {} has no stored mapping", integration.id))
    })
}

fn samples_of_rows(rows: &[TestOutcome]) -> Vec<OutcomeSample> {
    rows.iter()
        .map(|o| OutcomeSample {
            endpoint: o.endpoint.clone(),
            class: OutcomeClass::parse(&o.classification).unwrap_or(OutcomeClass::Connectivity),
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

//! The lifecycle engine.
//!
//! Each public method is one externally-invoked step. A step takes the
//! integration's advisory lock, checks its state precondition, does its
//! work, and persists the result through a guarded update, so state
//! only ever advances through the repository's compare-and-set path.
//! Failures inside a step are recorded in the integration's `error_log`
//! under the step's name and surfaced without advancing state.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;
use weave_core::error::CoreError;
use weave_core::mapping::{plan_mapping, PlannedTransformation, TransformationKind};
use weave_core::outcome::{OutcomeClass, OutcomeSample};
use weave_core::scoring::{compute_health, CoverageBasis, HealthScore};
use weave_core::spec::{EndpointSpec, NormalizedSpec};
use weave_core::status::{IntegrationStatus, StepKind};
use weave_core::types::DbId;
use weave_db::models::integration::{
    CreateIntegration, DeploymentRecord, EndpointRef, Integration, MappingRecord,
};
use weave_db::models::test_outcome::NewTestOutcome;
use weave_db::repositories::{IntegrationRepo, TransformationRepo};
use weave_db::DbPool;
use weave_deploy::{DeployTarget, DeploymentSpec, ResourceRequest};
use weave_fetcher::{FormatHint, SpecFetcher};

use crate::config::OrchestratorConfig;
use crate::error::StepError;
use crate::locks::StepLocks;
use crate::runner::{RunSpec, TestRunner};

/// Arguments for the ingest step. URLs default to the discovery
/// candidates' documentation URLs; formats default to OpenAPI
/// detection.
#[derive(Debug, Clone, Default)]
pub struct IngestArgs {
    pub source_url: Option<String>,
    pub dest_url: Option<String>,
    pub source_format: Option<FormatHint>,
    pub dest_format: Option<FormatHint>,
}

/// Arguments for the map step: the endpoint pair to connect and any
/// user-supplied field hints.
#[derive(Debug, Clone)]
pub struct MapArgs {
    pub source_endpoint: EndpointRef,
    pub dest_endpoint: EndpointRef,
    pub hints: HashMap<String, String>,
}

/// Arguments for the test step.
#[derive(Debug, Clone, Default)]
pub struct TestArgs {
    pub sample_size: Option<i64>,
    pub skip_destructive: Option<bool>,
    /// Fixed payload seed for reproducible batches; derived from the
    /// run id when absent.
    pub seed: Option<u64>,
}

/// Arguments for the deploy step.
#[derive(Debug, Clone, Default)]
pub struct DeployArgs {
    pub resources: Option<ResourceRequest>,
}

/// Drift report for one side of the mapped pair.
#[derive(Debug, serde::Serialize)]
pub struct SideDrift {
    /// `"METHOD path"` of the mapped endpoint.
    pub endpoint: String,
    /// The endpoint no longer exists in the refreshed specification.
    pub endpoint_missing: bool,
    pub breaking: bool,
    pub report: weave_core::drift::DriftReport,
}

/// Result of an on-demand drift check across both specs.
#[derive(Debug, serde::Serialize)]
pub struct DriftCheckReport {
    pub source: SideDrift,
    pub dest: SideDrift,
}

impl DriftCheckReport {
    pub fn has_breaking(&self) -> bool {
        self.source.breaking || self.dest.breaking
    }
}

/// The step-wise workflow engine. One instance per process, shared
/// behind an `Arc`.
pub struct Orchestrator {
    pub(crate) pool: DbPool,
    pub(crate) fetcher: Arc<SpecFetcher>,
    pub(crate) runner: TestRunner,
    pub(crate) deployer: Arc<dyn DeployTarget>,
    pub(crate) locks: StepLocks,
    pub(crate) config: OrchestratorConfig,
}

impl Orchestrator {
    pub fn new(
        pool: DbPool,
        fetcher: Arc<SpecFetcher>,
        deployer: Arc<dyn DeployTarget>,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            pool,
            fetcher,
            runner: TestRunner::new(),
            deployer,
            locks: StepLocks::new(),
            config,
        }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    // -----------------------------------------------------------------------
    // Steps
    // -----------------------------------------------------------------------

    /// Create an integration from its discovery picks. Starts in
    /// `DISCOVERING`.
    pub async fn create(&self, input: CreateIntegration) -> Result<Integration, StepError> {
        let step = StepKind::Create;

        validate_create(&input).map_err(|e| StepError::new(step, e))?;

        let created = IntegrationRepo::create(&self.pool, &input)
            .await
            .map_err(|e| StepError::new(step, db_err(e)))?;

        tracing::info!(id = created.id, name = %created.name, "integration created");
        Ok(created)
    }

    /// Ingest step: fetch and normalize both API specifications, then
    /// advance `DISCOVERING -> MAPPING`.
    pub async fn ingest(&self, id: DbId, args: IngestArgs) -> Result<Integration, StepError> {
        let step = StepKind::Ingest;
        let _guard = self.acquire(id, step)?;
        let integration = self.load_in(id, step, IntegrationStatus::Discovering).await?;

        let (source_spec, dest_spec) = match self.fetch_pair(&integration, &args).await {
            Ok(pair) => pair,
            Err(e) => return Err(self.fail(id, step, e).await),
        };

        let updated = IntegrationRepo::store_specs(
            &self.pool,
            id,
            &to_json(&source_spec).map_err(|e| StepError::new(step, e))?,
            &to_json(&dest_spec).map_err(|e| StepError::new(step, e))?,
        )
        .await
        .map_err(|e| StepError::new(step, db_err(e)))?;

        updated.ok_or_else(|| StepError::new(step, stale_state(id)))
    }

    /// Map step: plan the field-level transformations for the chosen
    /// endpoint pair and advance `MAPPING -> TESTING`.
    pub async fn map(&self, id: DbId, args: MapArgs) -> Result<Integration, StepError> {
        let step = StepKind::Map;
        let _guard = self.acquire(id, step)?;
        let integration = self.load_in(id, step, IntegrationStatus::Mapping).await?;

        let result = (|| {
            let source_spec = parse_spec(&integration.source_spec, "source")?;
            let dest_spec = parse_spec(&integration.dest_spec, "destination")?;
            let source_ep = resolve_endpoint(&source_spec, &args.source_endpoint, "source")?;
            let dest_ep = resolve_endpoint(&dest_spec, &args.dest_endpoint, "destination")?;
            let plan = plan_mapping(source_ep, dest_ep, &args.hints)?;
            Ok::<_, CoreError>(plan)
        })();

        let plan = match result {
            Ok(plan) => plan,
            Err(e) => return Err(self.fail(id, step, e).await),
        };

        if !plan.unmapped.is_empty() {
            tracing::warn!(
                id,
                unmapped = ?plan.unmapped,
                "mapping left destination fields uncovered"
            );
        }

        let record = MappingRecord {
            source_endpoint: args.source_endpoint,
            dest_endpoint: args.dest_endpoint,
            hints: args.hints,
            complexity: plan.complexity,
            unmapped: plan.unmapped.clone(),
        };

        let updated = IntegrationRepo::store_mapping(
            &self.pool,
            id,
            &to_json(&record).map_err(|e| StepError::new(step, e))?,
            &plan.transformations,
            IntegrationStatus::Mapping,
            IntegrationStatus::Testing,
        )
        .await
        .map_err(|e| StepError::new(step, db_err(e)))?;

        updated.ok_or_else(|| StepError::new(step, stale_state(id)))
    }

    /// Test step: run a synthetic batch through the mapped pair, score
    /// it, and advance `TESTING -> DEPLOYING` when the score passes.
    ///
    /// A below-threshold score is not a step failure: the batch and
    /// score are persisted, the state stays put, and the shortfall is
    /// recorded in the error log.
    pub async fn test(&self, id: DbId, args: TestArgs) -> Result<Integration, StepError> {
        let step = StepKind::Test;
        let _guard = self.acquire(id, step)?;
        let integration = self.load_in(id, step, IntegrationStatus::Testing).await?;

        let sample_size = args.sample_size.unwrap_or(self.config.default_sample_size);
        let skip_destructive = args.skip_destructive.unwrap_or(true);

        let run = match self
            .execute_run(&integration, sample_size, skip_destructive, args.seed)
            .await
        {
            Ok(run) => run,
            Err(e) => return Err(self.fail(id, step, e).await),
        };

        let advance = run.health.overall >= self.config.pass_threshold;
        let updated = IntegrationRepo::store_test_run(
            &self.pool,
            id,
            run.run_id,
            &run.outcomes,
            &to_json(&run.health).map_err(|e| StepError::new(step, e))?,
            IntegrationStatus::Testing,
            advance,
        )
        .await
        .map_err(|e| StepError::new(step, db_err(e)))?;

        let updated = updated.ok_or_else(|| StepError::new(step, stale_state(id)))?;

        if !advance {
            let mut message = format!(
                "health score {} below pass threshold {}",
                run.health.overall, self.config.pass_threshold
            );
            if let Some(class) = dominant_failure(&run.samples) {
                message.push_str(&format!("; dominant failure: {class}"));
            }
            tracing::warn!(id, score = run.health.overall, "test batch did not pass");
            if let Err(e) =
                IntegrationRepo::set_error(&self.pool, id, step.as_str(), &message).await
            {
                tracing::warn!(id, error = %e, "could not record test shortfall");
            }
        }

        Ok(updated)
    }

    /// Deploy step: build and launch the runtime unit, then advance
    /// `DEPLOYING -> ACTIVE`. A driver failure leaves any previous
    /// deployment record untouched.
    pub async fn deploy(&self, id: DbId, args: DeployArgs) -> Result<Integration, StepError> {
        let step = StepKind::Deploy;
        let _guard = self.acquire(id, step)?;
        let integration = self.load_in(id, step, IntegrationStatus::Deploying).await?;

        let passes = integration
            .health()
            .map(|h| h.overall >= self.config.pass_threshold)
            .unwrap_or(false);
        if !passes {
            return Err(StepError::new(
                step,
                CoreError::Precondition(format!(
                    "integration {id} has no passing health score; run the test step first"
                )),
            ));
        }

        let resources = args.resources.unwrap_or_default();
        let record = match self.launch(&integration, &resources).await {
            Ok(record) => record,
            Err(e) => return Err(self.fail(id, step, e).await),
        };

        let updated = IntegrationRepo::store_deployment(
            &self.pool,
            id,
            &to_json(&record).map_err(|e| StepError::new(step, e))?,
        )
        .await
        .map_err(|e| StepError::new(step, db_err(e)))?;

        tracing::info!(id, endpoint = %record.endpoint, "integration deployed");
        updated.ok_or_else(|| StepError::new(step, stale_state(id)))
    }

    /// Manual hold. Idempotent when already paused; a failed
    /// integration cannot be paused.
    pub async fn pause(&self, id: DbId) -> Result<Integration, StepError> {
        let step = StepKind::Pause;
        let _guard = self.acquire(id, step)?;
        let integration = self.load(id).await.map_err(|e| StepError::new(step, e))?;
        let status = status_of(&integration).map_err(|e| StepError::new(step, e))?;

        match status {
            IntegrationStatus::Paused => Ok(integration),
            IntegrationStatus::Failed => Err(StepError::new(
                step,
                CoreError::Precondition(format!("integration {id} is FAILED and cannot be paused")),
            )),
            from => IntegrationRepo::pause(&self.pool, id, from)
                .await
                .map_err(|e| StepError::new(step, db_err(e)))?
                .ok_or_else(|| StepError::new(step, stale_state(id))),
        }
    }

    /// Release a manual hold, restoring the state the pause captured.
    pub async fn resume(&self, id: DbId) -> Result<Integration, StepError> {
        let step = StepKind::Resume;
        let _guard = self.acquire(id, step)?;
        let integration = self.load(id).await.map_err(|e| StepError::new(step, e))?;
        let status = status_of(&integration).map_err(|e| StepError::new(step, e))?;

        if status != IntegrationStatus::Paused {
            return Err(StepError::new(
                step,
                CoreError::Precondition(format!(
                    "resume requires PAUSED, integration {id} is {}",
                    status.as_str()
                )),
            ));
        }

        IntegrationRepo::resume(&self.pool, id)
            .await
            .map_err(|e| StepError::new(step, db_err(e)))?
            .ok_or_else(|| {
                StepError::new(
                    step,
                    CoreError::Precondition(format!(
                        "integration {id} has no remembered pre-pause state"
                    )),
                )
            })
    }

    /// On-demand drift check: refetch both specifications and compare
    /// the mapped endpoints' schemas against the stored snapshots.
    /// Read-only; never changes state and never touches the error log.
    pub async fn drift_check(&self, id: DbId) -> Result<DriftCheckReport, StepError> {
        let step = StepKind::DriftCheck;
        let _guard = self.acquire(id, step)?;
        let integration = self.load(id).await.map_err(|e| StepError::new(step, e))?;

        self.drift_check_inner(&integration)
            .await
            .map_err(|e| StepError::new(step, e))
    }

    /// Run the self-healing strategist for an integration.
    pub async fn heal(&self, id: DbId, trigger_reason: &str) -> Result<Integration, StepError> {
        let step = StepKind::Heal;
        let _guard = self.acquire(id, step)?;
        crate::strategist::heal(self, id, trigger_reason).await
    }

    // -----------------------------------------------------------------------
    // Shared internals
    // -----------------------------------------------------------------------

    pub(crate) fn acquire(
        &self,
        id: DbId,
        step: StepKind,
    ) -> Result<tokio::sync::OwnedMutexGuard<()>, StepError> {
        self.locks
            .try_acquire(id, step)
            .map_err(|e| StepError::new(step, e))
    }

    pub(crate) async fn load(&self, id: DbId) -> Result<Integration, CoreError> {
        IntegrationRepo::find_by_id(&self.pool, id)
            .await
            .map_err(db_err)?
            .ok_or(CoreError::NotFound {
                entity: "integration",
                id,
            })
    }

    /// Load an integration and require it to be in `expected`.
    async fn load_in(
        &self,
        id: DbId,
        step: StepKind,
        expected: IntegrationStatus,
    ) -> Result<Integration, StepError> {
        let integration = self.load(id).await.map_err(|e| StepError::new(step, e))?;
        let status = status_of(&integration).map_err(|e| StepError::new(step, e))?;

        if status != expected {
            return Err(StepError::new(
                step,
                CoreError::Precondition(format!(
                    "'{}' requires {}, integration {id} is {}",
                    step.as_str(),
                    expected.as_str(),
                    status.as_str()
                )),
            ));
        }
        Ok(integration)
    }

    /// Record a fatal step error in the integration's error log and
    /// wrap it for the caller.
    pub(crate) async fn fail(&self, id: DbId, step: StepKind, source: CoreError) -> StepError {
        tracing::warn!(id, step = step.as_str(), error = %source, "step failed");
        if let Err(e) =
            IntegrationRepo::set_error(&self.pool, id, step.as_str(), &source.to_string()).await
        {
            tracing::warn!(id, error = %e, "could not record step error");
        }
        StepError::new(step, source)
    }

    /// Run a future under the step deadline.
    pub(crate) async fn with_deadline<T, F>(&self, fut: F) -> Result<T, CoreError>
    where
        F: Future<Output = Result<T, CoreError>>,
    {
        tokio::time::timeout(self.config.step_timeout, fut)
            .await
            .map_err(|_| CoreError::Timeout(self.config.step_timeout.as_secs()))?
    }

    /// Fetch and normalize both specifications, concurrently, under
    /// the step deadline.
    pub(crate) async fn fetch_pair(
        &self,
        integration: &Integration,
        args: &IngestArgs,
    ) -> Result<(NormalizedSpec, NormalizedSpec), CoreError> {
        let source = integration
            .discovery(true)
            .ok_or_else(|| CoreError::Internal("stored source discovery is malformed".into()))?;
        let dest = integration
            .discovery(false)
            .ok_or_else(|| CoreError::Internal("stored dest discovery is malformed".into()))?;

        let source_url = args
            .source_url
            .clone()
            .or(source.docs_url)
            .ok_or_else(|| CoreError::Validation("source API has no documentation URL".into()))?;
        let dest_url = args
            .dest_url
            .clone()
            .or(dest.docs_url)
            .ok_or_else(|| {
                CoreError::Validation("destination API has no documentation URL".into())
            })?;

        let source_hint = args.source_format.unwrap_or_default();
        let dest_hint = args.dest_format.unwrap_or_default();

        self.with_deadline(async {
            let (s, d) = tokio::try_join!(
                self.fetcher.fetch(&source_url, source_hint, &source.base_url),
                self.fetcher.fetch(&dest_url, dest_hint, &dest.base_url),
            )?;
            Ok((s, d))
        })
        .await
    }

    /// Execute one synthetic batch against the stored mapping and score
    /// it. Shared by the test step and healing verification.
    pub(crate) async fn execute_run(
        &self,
        integration: &Integration,
        sample_size: i64,
        skip_destructive: bool,
        seed: Option<u64>,
    ) -> Result<CompletedRun, CoreError> {
        let record = integration
            .mapping_record()
            .ok_or_else(|| precondition_missing(integration.id, "mapping"))?;
        let source_spec = parse_spec(&integration.source_spec, "source")?;
        let dest_spec = parse_spec(&integration.dest_spec, "destination")?;
        let source_ep = resolve_endpoint(&source_spec, &record.source_endpoint, "source")?;
        let dest_ep = resolve_endpoint(&dest_spec, &record.dest_endpoint, "destination")?;

        let rows = TransformationRepo::list_by_integration(&self.pool, integration.id)
            .await
            .map_err(db_err)?;
        if rows.is_empty() {
            return Err(precondition_missing(integration.id, "transformation rules"));
        }
        let rules = planned_rules(&rows)?;

        let run_id = Uuid::new_v4();
        let seed = seed.unwrap_or_else(|| run_id.as_u64_pair().0);

        let outcomes = self
            .with_deadline(async {
                Ok(self
                    .runner
                    .run(RunSpec {
                        source_base: &source_spec.base_url,
                        source: source_ep,
                        dest_base: &dest_spec.base_url,
                        dest: dest_ep,
                        transformations: &rules,
                        sample_size,
                        skip_destructive,
                        seed,
                    })
                    .await)
            })
            .await?;

        let samples = samples_of(&outcomes);
        let declared = declared_pairs(
            self.config.coverage_basis,
            &record,
            &source_spec,
            &dest_spec,
        );
        let health = compute_health(&samples, declared, run_id, Utc::now());

        tracing::info!(
            id = integration.id,
            %run_id,
            overall = health.overall,
            reliability = health.reliability,
            "synthetic batch scored"
        );

        Ok(CompletedRun {
            run_id,
            outcomes,
            samples,
            health,
        })
    }

    /// Build and launch the runtime unit for a validated integration.
    async fn launch(
        &self,
        integration: &Integration,
        resources: &ResourceRequest,
    ) -> Result<DeploymentRecord, CoreError> {
        let source_spec = parse_spec(&integration.source_spec, "source")?;
        let dest_spec = parse_spec(&integration.dest_spec, "destination")?;
        let rows = TransformationRepo::list_by_integration(&self.pool, integration.id)
            .await
            .map_err(db_err)?;

        let spec = DeploymentSpec {
            integration_id: integration.id,
            name: integration.name.clone(),
            source_base_url: source_spec.base_url,
            dest_base_url: dest_spec.base_url,
            transformations: to_json(&rows)?,
        };

        let deployer = Arc::clone(&self.deployer);
        let (instance, endpoint) = self
            .with_deadline(async {
                let artifact = deployer.prepare(&spec).await?;
                let instance = deployer.launch(&artifact, resources).await?;
                let endpoint = deployer.endpoint_of(&instance).await?;
                Ok((instance, endpoint))
            })
            .await?;

        Ok(DeploymentRecord {
            target: self.deployer.kind().as_str().to_string(),
            runtime_id: instance.runtime_id,
            endpoint,
            replicas: resources.replicas,
            memory_mb: resources.memory_mb,
            cpu_cores: resources.cpu_cores,
            auto_scale: resources.auto_scale,
            deployed_at: Utc::now(),
        })
    }

    async fn drift_check_inner(
        &self,
        integration: &Integration,
    ) -> Result<DriftCheckReport, CoreError> {
        let record = integration
            .mapping_record()
            .ok_or_else(|| precondition_missing(integration.id, "mapping"))?;
        let old_source = parse_spec(&integration.source_spec, "source")?;
        let old_dest = parse_spec(&integration.dest_spec, "destination")?;

        let (new_source, new_dest) = self
            .fetch_pair(integration, &IngestArgs::default())
            .await?;

        let rows = TransformationRepo::list_by_integration(&self.pool, integration.id)
            .await
            .map_err(db_err)?;
        let source_active: Vec<String> = rows.iter().map(|t| t.source_field.clone()).collect();
        let dest_active: Vec<String> = rows.iter().map(|t| t.dest_field.clone()).collect();

        Ok(DriftCheckReport {
            source: side_drift(
                &old_source,
                &new_source,
                &record.source_endpoint,
                &source_active,
            ),
            dest: side_drift(&old_dest, &new_dest, &record.dest_endpoint, &dest_active),
        })
    }
}

/// Everything one synthetic batch produced.
pub(crate) struct CompletedRun {
    pub run_id: Uuid,
    pub outcomes: Vec<NewTestOutcome>,
    pub samples: Vec<OutcomeSample>,
    pub health: HealthScore,
}

// ---------------------------------------------------------------------------
// Free helpers
// ---------------------------------------------------------------------------

pub(crate) fn db_err(err: sqlx::Error) -> CoreError {
    CoreError::Internal(format!("database error: {err}"))
}

pub(crate) fn to_json<T: serde::Serialize>(value: &T) -> Result<serde_json::Value, CoreError> {
    serde_json::to_value(value).map_err(|e| CoreError::Internal(format!("serialization: {e}")))
}

pub(crate) fn status_of(integration: &Integration) -> Result<IntegrationStatus, CoreError> {
    IntegrationStatus::from_id(integration.status_id).ok_or_else(|| {
        CoreError::Internal(format!(
            "integration {} has unknown status id {}",
            integration.id, integration.status_id
        ))
    })
}

fn stale_state(id: DbId) -> CoreError {
    CoreError::Precondition(format!(
        "integration {id} changed state while the step was running"
    ))
}

fn precondition_missing(id: DbId, what: &str) -> CoreError {
    CoreError::Precondition(format!("integration {id} has no stored {what}"))
}

pub(crate) fn parse_spec(
    value: &Option<serde_json::Value>,
    which: &str,
) -> Result<NormalizedSpec, CoreError> {
    let value = value
        .as_ref()
        .ok_or_else(|| CoreError::Precondition(format!("{which} spec not ingested yet")))?;
    serde_json::from_value(value.clone())
        .map_err(|e| CoreError::Internal(format!("stored {which} spec is malformed: {e}")))
}

pub(crate) fn resolve_endpoint<'a>(
    spec: &'a NormalizedSpec,
    endpoint: &EndpointRef,
    which: &str,
) -> Result<&'a EndpointSpec, CoreError> {
    spec.endpoint(&endpoint.path, Some(&endpoint.method))
        .ok_or_else(|| {
            CoreError::Validation(format!(
                "{which} spec has no endpoint '{}'",
                endpoint.label()
            ))
        })
}

/// Convert transformation rows back to planned rules for execution.
pub(crate) fn planned_rules(
    rows: &[weave_db::models::transformation::Transformation],
) -> Result<Vec<PlannedTransformation>, CoreError> {
    rows.iter()
        .map(|t| {
            let kind = TransformationKind::parse(&t.kind).ok_or_else(|| {
                CoreError::Internal(format!("unknown transformation kind '{}'", t.kind))
            })?;
            Ok(PlannedTransformation {
                source_field: t.source_field.clone(),
                dest_field: t.dest_field.clone(),
                kind,
                config: t.config.clone(),
            })
        })
        .collect()
}

pub(crate) fn samples_of(outcomes: &[NewTestOutcome]) -> Vec<OutcomeSample> {
    outcomes
        .iter()
        .map(|o| OutcomeSample {
            endpoint: o.endpoint.clone(),
            class: OutcomeClass::parse(&o.classification).unwrap_or(OutcomeClass::Connectivity),
        })
        .collect()
}

/// Coverage denominator for the chosen basis.
fn declared_pairs(
    basis: CoverageBasis,
    record: &MappingRecord,
    source_spec: &NormalizedSpec,
    dest_spec: &NormalizedSpec,
) -> usize {
    match basis {
        CoverageBasis::Mapped => {
            if record.source_endpoint.label() == record.dest_endpoint.label() {
                1
            } else {
                2
            }
        }
        CoverageBasis::Declared => source_spec.endpoints.len() + dest_spec.endpoints.len(),
    }
}

/// Most frequent non-success classification, for operator-facing
/// shortfall messages.
fn dominant_failure(samples: &[OutcomeSample]) -> Option<&'static str> {
    let mut counts: HashMap<OutcomeClass, usize> = HashMap::new();
    for s in samples.iter().filter(|s| !s.class.is_success()) {
        *counts.entry(s.class).or_default() += 1;
    }
    counts
        .into_iter()
        .max_by(|(a_class, a), (b_class, b)| {
            a.cmp(b)
                .then_with(|| a_class.as_str().cmp(b_class.as_str()))
        })
        .map(|(class, _)| class.as_str())
}

fn side_drift(
    old_spec: &NormalizedSpec,
    new_spec: &NormalizedSpec,
    endpoint: &EndpointRef,
    active_fields: &[String],
) -> SideDrift {
    let old_ep = old_spec.endpoint(&endpoint.path, Some(&endpoint.method));
    let new_ep = new_spec.endpoint(&endpoint.path, Some(&endpoint.method));

    match (old_ep, new_ep) {
        (Some(old_ep), Some(new_ep)) => {
            let report = weave_core::drift::detect_drift(old_ep, new_ep, active_fields);
            SideDrift {
                endpoint: endpoint.label(),
                endpoint_missing: false,
                breaking: report.has_breaking(),
                report,
            }
        }
        // Endpoint gone from the refreshed spec: always breaking.
        _ => SideDrift {
            endpoint: endpoint.label(),
            endpoint_missing: true,
            breaking: true,
            report: weave_core::drift::DriftReport::default(),
        },
    }
}

fn validate_create(input: &CreateIntegration) -> Result<(), CoreError> {
    if input.name.trim().is_empty() {
        return Err(CoreError::Validation("name must not be empty".into()));
    }
    if input.user_intent.trim().is_empty() {
        return Err(CoreError::Validation("user_intent must not be empty".into()));
    }
    for (label, candidate) in [
        ("source", &input.source_discovery),
        ("destination", &input.dest_discovery),
    ] {
        if candidate.base_url.trim().is_empty() {
            return Err(CoreError::Validation(format!(
                "{label} discovery candidate has no base URL"
            )));
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use weave_core::spec::{FieldDef, FieldType};
    use weave_db::models::integration::DiscoveryCandidate;

    fn ep_ref(method: &str, path: &str) -> EndpointRef {
        EndpointRef {
            path: path.to_string(),
            method: method.to_string(),
        }
    }

    fn record(source: EndpointRef, dest: EndpointRef) -> MappingRecord {
        MappingRecord {
            source_endpoint: source,
            dest_endpoint: dest,
            hints: HashMap::new(),
            complexity: 1,
            unmapped: vec![],
        }
    }

    fn spec(endpoints: usize) -> NormalizedSpec {
        NormalizedSpec {
            title: "t".to_string(),
            base_url: "https://api.example".to_string(),
            auth: Default::default(),
            endpoints: (0..endpoints)
                .map(|i| EndpointSpec {
                    path: format!("/e{i}"),
                    method: "GET".to_string(),
                    request_fields: vec![],
                    response_fields: vec![FieldDef::new("x", FieldType::String, true)],
                })
                .collect(),
        }
    }

    // ----- declared_pairs -----

    #[test]
    fn mapped_basis_counts_the_pair_sides() {
        let r = record(ep_ref("GET", "/a"), ep_ref("POST", "/b"));
        assert_eq!(
            declared_pairs(CoverageBasis::Mapped, &r, &spec(5), &spec(9)),
            2
        );
    }

    #[test]
    fn mapped_basis_collapses_identical_sides() {
        let r = record(ep_ref("GET", "/a"), ep_ref("GET", "/a"));
        assert_eq!(
            declared_pairs(CoverageBasis::Mapped, &r, &spec(5), &spec(9)),
            1
        );
    }

    #[test]
    fn declared_basis_counts_both_specs() {
        let r = record(ep_ref("GET", "/a"), ep_ref("POST", "/b"));
        assert_eq!(
            declared_pairs(CoverageBasis::Declared, &r, &spec(5), &spec(9)),
            14
        );
    }

    // ----- dominant_failure -----

    #[test]
    fn dominant_failure_picks_most_frequent_class() {
        let samples = vec![
            OutcomeSample {
                endpoint: "GET /a".into(),
                class: OutcomeClass::AuthFailure,
            },
            OutcomeSample {
                endpoint: "GET /a".into(),
                class: OutcomeClass::AuthFailure,
            },
            OutcomeSample {
                endpoint: "GET /a".into(),
                class: OutcomeClass::Connectivity,
            },
            OutcomeSample {
                endpoint: "GET /a".into(),
                class: OutcomeClass::Success,
            },
        ];
        assert_eq!(dominant_failure(&samples), Some("auth-failure"));
    }

    #[test]
    fn dominant_failure_none_for_clean_batch() {
        let samples = vec![OutcomeSample {
            endpoint: "GET /a".into(),
            class: OutcomeClass::Success,
        }];
        assert_eq!(dominant_failure(&samples), None);
    }

    // ----- validate_create -----

    fn candidate(base_url: &str) -> DiscoveryCandidate {
        DiscoveryCandidate {
            name: "api".to_string(),
            base_url: base_url.to_string(),
            docs_url: None,
            confidence: 0.9,
            provenance: "user".to_string(),
        }
    }

    #[test]
    fn create_rejects_blank_name() {
        let input = CreateIntegration {
            name: "  ".to_string(),
            user_intent: "sync".to_string(),
            source_discovery: candidate("https://a"),
            dest_discovery: candidate("https://b"),
        };
        assert_matches!(validate_create(&input), Err(CoreError::Validation(_)));
    }

    #[test]
    fn create_rejects_missing_base_url() {
        let input = CreateIntegration {
            name: "sync".to_string(),
            user_intent: "sync contacts".to_string(),
            source_discovery: candidate(""),
            dest_discovery: candidate("https://b"),
        };
        assert_matches!(validate_create(&input), Err(CoreError::Validation(_)));
    }

    // ----- planned_rules -----

    #[test]
    fn planned_rules_rejects_unknown_kind() {
        use weave_db::models::transformation::Transformation;
        let row = Transformation {
            id: 1,
            integration_id: 1,
            position: 0,
            source_field: "a".to_string(),
            dest_field: "b".to_string(),
            kind: "teleport".to_string(),
            config: None,
            created_at: Utc::now(),
        };
        assert_matches!(planned_rules(&[row]), Err(CoreError::Internal(_)));
    }

    // ----- drift side helper -----

    #[test]
    fn missing_endpoint_is_breaking_drift() {
        let old = spec(2);
        let new = spec(1);
        let side = side_drift(&old, &new, &ep_ref("GET", "/e1"), &[]);
        assert!(side.endpoint_missing);
        assert!(side.breaking);
    }
}

//! Integration monitor.
//!
//! Periodically evaluates every `ACTIVE` integration against two
//! degradation signals and hands breaches to the healing strategist.
//! Trigger reasons are fixed labels so the strategist's per-reason
//! attempt cap applies across ticks.

use std::sync::Arc;

use chrono::Utc;
use weave_core::error::CoreError;
use weave_core::status::IntegrationStatus;
use weave_core::types::Timestamp;
use weave_db::models::integration::Integration;
use weave_db::models::test_outcome::TestOutcome;
use weave_db::repositories::{IntegrationRepo, TestOutcomeRepo};

use crate::lifecycle::{db_err, Orchestrator};

/// Trigger label for a breached failure-rate threshold.
const REASON_FAILURE_RATE: &str = "elevated-failure-rate";
/// Trigger label for a health snapshot older than the freshness bound.
const REASON_STALE_HEALTH: &str = "stale-health";

/// Monitor thresholds.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Failure-rate bound over the rolling outcome window.
    pub failure_rate_threshold: f64,
    /// Size of the rolling outcome window.
    pub window: i64,
    /// Maximum age of the stored health snapshot.
    pub health_max_age: chrono::Duration,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            failure_rate_threshold: 0.3,
            window: 20,
            health_max_age: chrono::Duration::hours(24),
        }
    }
}

/// What one monitor pass did.
#[derive(Debug, Default)]
pub struct TickSummary {
    pub checked: usize,
    pub triggered: usize,
    /// Healthy, or skipped because a step already held the lock.
    pub skipped: usize,
}

/// Watches active integrations and dispatches healing.
pub struct Monitor {
    orch: Arc<Orchestrator>,
    config: MonitorConfig,
}

impl Monitor {
    pub fn new(orch: Arc<Orchestrator>, config: MonitorConfig) -> Self {
        Self { orch, config }
    }

    /// Evaluate every active integration once.
    pub async fn tick(&self) -> TickSummary {
        let mut summary = TickSummary::default();

        let active =
            match IntegrationRepo::list_by_status(self.orch.pool(), IntegrationStatus::Active)
                .await
            {
                Ok(active) => active,
                Err(e) => {
                    tracing::error!(error = %e, "monitor could not list active integrations");
                    return summary;
                }
            };

        for integration in active {
            summary.checked += 1;
            match self.evaluate(&integration).await {
                Ok(Some(reason)) => self.dispatch(&integration, reason, &mut summary).await,
                Ok(None) => summary.skipped += 1,
                Err(e) => {
                    tracing::warn!(id = integration.id, error = %e, "monitor evaluation failed");
                }
            }
        }

        tracing::debug!(
            checked = summary.checked,
            triggered = summary.triggered,
            "monitor tick complete"
        );
        summary
    }

    /// Check one integration's degradation signals.
    async fn evaluate(
        &self,
        integration: &Integration,
    ) -> Result<Option<&'static str>, CoreError> {
        let window = TestOutcomeRepo::recent(self.orch.pool(), integration.id, self.config.window)
            .await
            .map_err(db_err)?;

        if breaches_failure_rate(&window, self.config.failure_rate_threshold) {
            return Ok(Some(REASON_FAILURE_RATE));
        }

        let computed_at = integration.health().map(|h| h.computed_at);
        if is_stale(computed_at, Utc::now(), self.config.health_max_age) {
            return Ok(Some(REASON_STALE_HEALTH));
        }

        Ok(None)
    }

    async fn dispatch(
        &self,
        integration: &Integration,
        reason: &'static str,
        summary: &mut TickSummary,
    ) {
        tracing::info!(id = integration.id, reason, "monitor triggering healing");

        match self.orch.heal(integration.id, reason).await {
            Ok(_) => summary.triggered += 1,
            // A user-initiated step holds the lock, or the state moved
            // under us; the next tick will re-evaluate.
            Err(e) if matches!(e.source, CoreError::Precondition(_)) => {
                tracing::debug!(id = integration.id, error = %e, "healing skipped");
                summary.skipped += 1;
            }
            Err(e) => {
                tracing::warn!(id = integration.id, error = %e, "healing dispatch failed");
                summary.triggered += 1;
            }
        }
    }
}

/// Whether the window's failure rate exceeds the threshold. An empty
/// window never breaches.
fn breaches_failure_rate(window: &[TestOutcome], threshold: f64) -> bool {
    if window.is_empty() {
        return false;
    }
    let failures = window.iter().filter(|o| !o.success).count();
    failures as f64 / window.len() as f64 > threshold
}

/// A missing snapshot on an active integration counts as stale.
fn is_stale(
    computed_at: Option<Timestamp>,
    now: Timestamp,
    max_age: chrono::Duration,
) -> bool {
    match computed_at {
        Some(at) => now - at > max_age,
        None => true,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

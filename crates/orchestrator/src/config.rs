use std::time::Duration;

use weave_core::scoring::{CoverageBasis, PASS_THRESHOLD};

/// Tunables for the lifecycle orchestrator.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Minimum overall health score to advance past testing.
    pub pass_threshold: i16,
    /// Denominator mode for the health scorer's coverage term.
    pub coverage_basis: CoverageBasis,
    /// Whole-step deadline for network-bound steps (test, deploy,
    /// ingest). A timeout is a step failure, never a partial success.
    pub step_timeout: Duration,
    /// Default synthetic test batch size when the caller omits one.
    pub default_sample_size: i64,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            pass_threshold: PASS_THRESHOLD,
            coverage_basis: CoverageBasis::default(),
            step_timeout: Duration::from_secs(120),
            default_sample_size: 5,
        }
    }
}

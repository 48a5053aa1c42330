use weave_core::error::CoreError;
use weave_core::status::StepKind;

/// A step-local failure, caught at the orchestrator boundary.
///
/// Carries the offending step so failure responses can name it; the
/// same step label keys the integration's `error_log` entry.
#[derive(Debug, thiserror::Error)]
#[error("step '{}' failed: {source}", .step.as_str())]
pub struct StepError {
    pub step: StepKind,
    #[source]
    pub source: CoreError,
}

impl StepError {
    pub fn new(step: StepKind, source: CoreError) -> Self {
        Self { step, source }
    }
}

//! Failure diagnosis and remediation strategy selection.
//!
//! The pure half of the self-healing strategist: classify a window of
//! outcome samples into a failure class and pick the remediation
//! strategy for it. Execution (refetching, remapping, redeploying)
//! lives in the orchestrator crate.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::outcome::{OutcomeClass, OutcomeSample};

/// Cap on strategist attempts for one trigger before escalating to
/// manual review.
pub const MAX_HEALING_ATTEMPTS: i16 = 3;

/// Base delay for the bounded-retry strategy; doubles per attempt.
pub const RETRY_BACKOFF_BASE_MS: u64 = 500;

/// Sample size of the post-healing verification batch.
pub const VERIFY_SAMPLE_SIZE: i64 = 5;

/// Diagnosed failure class for a triggering window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Diagnosis {
    AuthFailure,
    EndpointDrift,
    SchemaDrift,
    Unknown,
}

impl Diagnosis {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::AuthFailure => "auth-failure",
            Self::EndpointDrift => "endpoint-drift",
            Self::SchemaDrift => "schema-drift",
            Self::Unknown => "unknown",
        }
    }
}

/// Fixed set of remediation strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum HealingStrategy {
    /// Signal for operator input; never guesses secrets.
    CredentialRotation,
    /// Probe alternate paths from a refreshed specification.
    EndpointSwitch,
    /// Re-fetch specs and re-run the field mapper.
    SchemaRefresh,
    /// Capped retry with exponential backoff.
    BoundedRetry,
}

impl HealingStrategy {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::CredentialRotation => "credential-rotation",
            Self::EndpointSwitch => "endpoint-switch",
            Self::SchemaRefresh => "schema-refresh",
            Self::BoundedRetry => "bounded-retry",
        }
    }
}

/// Outcome of one healing event, as persisted in the audit trail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealingOutcome {
    Success,
    Failed,
    Pending,
}

impl HealingOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failed => "failed",
            Self::Pending => "pending",
        }
    }
}

/// Classify the triggering failure from the most frequent non-success
/// classification in the window.
///
/// An empty window, or one dominated by classes with no specific
/// remediation (rate limits, connectivity), diagnoses as `Unknown`.
pub fn diagnose(window: &[OutcomeSample]) -> Diagnosis {
    let mut counts: HashMap<OutcomeClass, usize> = HashMap::new();
    for s in window.iter().filter(|s| !s.class.is_success()) {
        *counts.entry(s.class).or_default() += 1;
    }

    let dominant = counts
        .into_iter()
        .max_by(|(a_class, a), (b_class, b)| {
            a.cmp(b)
                // Deterministic tie-break on the label.
                .then_with(|| a_class.as_str().cmp(b_class.as_str()))
        })
        .map(|(class, _)| class);

    match dominant {
        Some(OutcomeClass::AuthFailure) => Diagnosis::AuthFailure,
        Some(OutcomeClass::NotFound) => Diagnosis::EndpointDrift,
        Some(OutcomeClass::SchemaMismatch) => Diagnosis::SchemaDrift,
        _ => Diagnosis::Unknown,
    }
}

/// Select the remediation strategy for a diagnosis.
pub fn select_strategy(diagnosis: Diagnosis) -> HealingStrategy {
    match diagnosis {
        Diagnosis::AuthFailure => HealingStrategy::CredentialRotation,
        Diagnosis::EndpointDrift => HealingStrategy::EndpointSwitch,
        Diagnosis::SchemaDrift => HealingStrategy::SchemaRefresh,
        Diagnosis::Unknown => HealingStrategy::BoundedRetry,
    }
}

/// Backoff delay before the given 1-based attempt.
pub fn retry_delay_ms(attempt: i16) -> u64 {
    RETRY_BACKOFF_BASE_MS << (attempt.max(1) - 1).min(10) as u64
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn samples(classes: &[(OutcomeClass, usize)]) -> Vec<OutcomeSample> {
        classes
            .iter()
            .flat_map(|(class, n)| {
                (0..*n).map(|_| OutcomeSample {
                    endpoint: "GET /x".to_string(),
                    class: *class,
                })
            })
            .collect()
    }

    #[test]
    fn dominant_auth_failures_select_credential_rotation() {
        // 8/10 auth failures: must pick credential rotation, not
        // schema refresh.
        let window = samples(&[
            (OutcomeClass::AuthFailure, 8),
            (OutcomeClass::SchemaMismatch, 2),
        ]);
        let diag = diagnose(&window);
        assert_eq!(diag, Diagnosis::AuthFailure);
        assert_eq!(select_strategy(diag), HealingStrategy::CredentialRotation);
    }

    #[test]
    fn not_found_dominance_is_endpoint_drift() {
        let window = samples(&[
            (OutcomeClass::NotFound, 6),
            (OutcomeClass::Connectivity, 2),
            (OutcomeClass::Success, 2),
        ]);
        assert_eq!(diagnose(&window), Diagnosis::EndpointDrift);
    }

    #[test]
    fn schema_mismatch_dominance_is_schema_drift() {
        let window = samples(&[
            (OutcomeClass::SchemaMismatch, 5),
            (OutcomeClass::Success, 5),
        ]);
        let diag = diagnose(&window);
        assert_eq!(diag, Diagnosis::SchemaDrift);
        assert_eq!(select_strategy(diag), HealingStrategy::SchemaRefresh);
    }

    #[test]
    fn connectivity_noise_is_unknown() {
        let window = samples(&[(OutcomeClass::Connectivity, 7), (OutcomeClass::Success, 3)]);
        let diag = diagnose(&window);
        assert_eq!(diag, Diagnosis::Unknown);
        assert_eq!(select_strategy(diag), HealingStrategy::BoundedRetry);
    }

    #[test]
    fn empty_window_is_unknown() {
        assert_eq!(diagnose(&[]), Diagnosis::Unknown);
    }

    #[test]
    fn backoff_doubles_per_attempt() {
        assert_eq!(retry_delay_ms(1), 500);
        assert_eq!(retry_delay_ms(2), 1000);
        assert_eq!(retry_delay_ms(3), 2000);
        // Degenerate attempt numbers stay sane.
        assert_eq!(retry_delay_ms(0), 500);
    }
}

//! Health scoring over a batch of synthetic test outcomes.
//!
//! A pure, deterministic reduction: no I/O, no clock. The composite
//! score gates progression from testing to deployment.

use serde::{Deserialize, Serialize};

use crate::outcome::{OutcomeClass, OutcomeSample};
use crate::types::Timestamp;

/// Minimum overall score required to advance to deployment.
pub const PASS_THRESHOLD: i16 = 70;

/// Which denominator the endpoint-coverage term uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CoverageBasis {
    /// Endpoint pairs the stored mapping declares (default).
    #[default]
    Mapped,
    /// All endpoint pairs declared by the specs.
    Declared,
}

/// Composite health score snapshot, immutable per test run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthScore {
    /// `round(success_rate * 0.7 + endpoint_coverage * 0.3)`.
    pub overall: i16,
    /// Percentage of outcomes with no schema-mismatch classification.
    pub data_quality: i16,
    /// Equal to the success rate.
    pub reliability: i16,
    pub run_id: uuid::Uuid,
    pub computed_at: Timestamp,
}

impl HealthScore {
    pub fn passes(&self) -> bool {
        self.overall >= PASS_THRESHOLD
    }
}

/// Compute a health score from a batch of outcome samples.
///
/// `declared_pairs` is the coverage denominator: the number of distinct
/// endpoint pairs the chosen [`CoverageBasis`] counts. An empty batch
/// scores zero across the board.
pub fn compute_health(
    samples: &[OutcomeSample],
    declared_pairs: usize,
    run_id: uuid::Uuid,
    computed_at: Timestamp,
) -> HealthScore {
    if samples.is_empty() {
        return HealthScore {
            overall: 0,
            data_quality: 0,
            reliability: 0,
            run_id,
            computed_at,
        };
    }

    let total = samples.len() as f64;
    let successes = samples.iter().filter(|s| s.class.is_success()).count() as f64;
    let success_rate = successes / total * 100.0;

    let clean = samples
        .iter()
        .filter(|s| s.class != OutcomeClass::SchemaMismatch)
        .count() as f64;
    let data_quality = clean / total * 100.0;

    let exercised = samples
        .iter()
        .map(|s| s.endpoint.as_str())
        .collect::<std::collections::HashSet<_>>()
        .len();
    let coverage = if declared_pairs == 0 {
        0.0
    } else {
        (exercised.min(declared_pairs) as f64) / declared_pairs as f64 * 100.0
    };

    let overall = (success_rate * 0.7 + coverage * 0.3).round() as i16;

    HealthScore {
        overall,
        data_quality: data_quality.round() as i16,
        reliability: success_rate.round() as i16,
        run_id,
        computed_at,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::outcome::OutcomeClass;

    fn sample(endpoint: &str, class: OutcomeClass) -> OutcomeSample {
        OutcomeSample {
            endpoint: endpoint.to_string(),
            class,
        }
    }

    fn score(samples: &[OutcomeSample], declared: usize) -> HealthScore {
        compute_health(samples, declared, uuid::Uuid::nil(), chrono::Utc::now())
    }

    #[test]
    fn all_success_full_coverage() {
        let samples = vec![
            sample("GET /pets", OutcomeClass::Success),
            sample("POST /todos", OutcomeClass::Success),
        ];
        let s = score(&samples, 2);
        assert_eq!(s.overall, 100);
        assert_eq!(s.reliability, 100);
        assert_eq!(s.data_quality, 100);
        assert!(s.passes());
    }

    #[test]
    fn overall_formula_exact() {
        // 6/10 successes, both of 2 declared pairs exercised:
        // 60 * 0.7 + 100 * 0.3 = 72.
        let mut samples: Vec<_> = (0..6)
            .map(|_| sample("GET /pets", OutcomeClass::Success))
            .collect();
        samples.extend((0..4).map(|_| sample("POST /todos", OutcomeClass::Connectivity)));

        let s = score(&samples, 2);
        assert_eq!(s.overall, 72);
        assert_eq!(s.reliability, 60);
    }

    #[test]
    fn data_quality_counts_schema_mismatches_only() {
        let samples = vec![
            sample("GET /pets", OutcomeClass::Success),
            sample("POST /todos", OutcomeClass::SchemaMismatch),
            sample("POST /todos", OutcomeClass::Connectivity),
            sample("POST /todos", OutcomeClass::Success),
        ];
        let s = score(&samples, 2);
        assert_eq!(s.data_quality, 75);
    }

    #[test]
    fn empty_batch_scores_zero() {
        let s = score(&[], 2);
        assert_eq!(s.overall, 0);
        assert_eq!(s.reliability, 0);
        assert_eq!(s.data_quality, 0);
        assert!(!s.passes());
    }

    #[test]
    fn bounds_hold() {
        let samples = vec![sample("GET /pets", OutcomeClass::Success)];
        let s = score(&samples, 1);
        for v in [s.overall, s.data_quality, s.reliability] {
            assert!((0..=100).contains(&v));
        }
    }

    #[test]
    fn partial_coverage_lowers_overall() {
        // All calls succeed but only 1 of 4 declared pairs exercised:
        // 100 * 0.7 + 25 * 0.3 = 77.5 -> 78.
        let samples = vec![
            sample("GET /pets", OutcomeClass::Success),
            sample("GET /pets", OutcomeClass::Success),
        ];
        let s = score(&samples, 4);
        assert_eq!(s.overall, 78);
    }

    #[test]
    fn pass_threshold_boundary() {
        // 7/10 successes over 7 distinct endpoints with 10 declared:
        // 70 * 0.7 + 70 * 0.3 = 70 exactly, which passes.
        let samples: Vec<_> = (0..10)
            .map(|i| {
                sample(
                    &format!("GET /e{}", i % 7),
                    if i < 7 {
                        OutcomeClass::Success
                    } else {
                        OutcomeClass::Connectivity
                    },
                )
            })
            .collect();
        let s = score(&samples, 10);
        assert_eq!(s.overall, 70);
        assert!(s.passes());
    }
}

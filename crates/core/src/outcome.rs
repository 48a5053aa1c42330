//! Classification of synthetic-call outcomes.
//!
//! Transport failures during testing are never exceptions; they become
//! classified [`TestOutcome`] entries that feed the health scorer and
//! the healing diagnosis.

use serde::{Deserialize, Serialize};

/// Error classification for one synthetic call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OutcomeClass {
    Success,
    AuthFailure,
    RateLimited,
    SchemaMismatch,
    /// 404: the endpoint itself is gone, the signature of endpoint drift.
    NotFound,
    Connectivity,
}

impl OutcomeClass {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::AuthFailure => "auth-failure",
            Self::RateLimited => "rate-limited",
            Self::SchemaMismatch => "schema-mismatch",
            Self::NotFound => "not-found",
            Self::Connectivity => "connectivity",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "success" => Some(Self::Success),
            "auth-failure" => Some(Self::AuthFailure),
            "rate-limited" => Some(Self::RateLimited),
            "schema-mismatch" => Some(Self::SchemaMismatch),
            "not-found" => Some(Self::NotFound),
            "connectivity" => Some(Self::Connectivity),
            _ => None,
        }
    }

    pub fn is_success(self) -> bool {
        self == Self::Success
    }
}

/// Classify an HTTP status code (or its absence, for timeouts and
/// connection errors) into an outcome class.
///
/// 2xx -> success; 401/403 -> auth-failure; 429 -> rate-limited;
/// 400/422 -> schema-mismatch; 404 -> not-found; everything else,
/// including transport errors, -> connectivity.
pub fn classify_status(status: Option<u16>) -> OutcomeClass {
    match status {
        Some(code) if (200..300).contains(&code) => OutcomeClass::Success,
        Some(401 | 403) => OutcomeClass::AuthFailure,
        Some(429) => OutcomeClass::RateLimited,
        Some(400 | 422) => OutcomeClass::SchemaMismatch,
        Some(404) => OutcomeClass::NotFound,
        _ => OutcomeClass::Connectivity,
    }
}

/// The slice of a recorded outcome the scorer and diagnoser need.
#[derive(Debug, Clone)]
pub struct OutcomeSample {
    /// `"METHOD path"` of the call, used for coverage accounting.
    pub endpoint: String,
    pub class: OutcomeClass,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_success_range() {
        assert_eq!(classify_status(Some(200)), OutcomeClass::Success);
        assert_eq!(classify_status(Some(204)), OutcomeClass::Success);
        assert_eq!(classify_status(Some(299)), OutcomeClass::Success);
    }

    #[test]
    fn classify_failures() {
        assert_eq!(classify_status(Some(401)), OutcomeClass::AuthFailure);
        assert_eq!(classify_status(Some(403)), OutcomeClass::AuthFailure);
        assert_eq!(classify_status(Some(429)), OutcomeClass::RateLimited);
        assert_eq!(classify_status(Some(400)), OutcomeClass::SchemaMismatch);
        assert_eq!(classify_status(Some(422)), OutcomeClass::SchemaMismatch);
        assert_eq!(classify_status(Some(404)), OutcomeClass::NotFound);
        assert_eq!(classify_status(Some(500)), OutcomeClass::Connectivity);
        assert_eq!(classify_status(Some(503)), OutcomeClass::Connectivity);
    }

    #[test]
    fn classify_timeout_as_connectivity() {
        assert_eq!(classify_status(None), OutcomeClass::Connectivity);
    }

    #[test]
    fn class_labels_round_trip() {
        for class in [
            OutcomeClass::Success,
            OutcomeClass::AuthFailure,
            OutcomeClass::RateLimited,
            OutcomeClass::SchemaMismatch,
            OutcomeClass::NotFound,
            OutcomeClass::Connectivity,
        ] {
            assert_eq!(OutcomeClass::parse(class.as_str()), Some(class));
        }
        assert_eq!(OutcomeClass::parse("bogus"), None);
    }
}

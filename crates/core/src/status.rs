//! Lifecycle status machine for integrations.
//!
//! Each variant's discriminant matches the SMALLINT `status_id` column
//! on the `integrations` table. Transitions are driven by explicit
//! external step calls and checked against [`can_transition`] before
//! every mutation; there is no automatic chaining.

use serde::{Deserialize, Serialize};

/// Status ID type matching SMALLINT in the database.
pub type StatusId = i16;

/// Lifecycle state of an integration.
#[repr(i16)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IntegrationStatus {
    Discovering = 1,
    Mapping = 2,
    Testing = 3,
    Deploying = 4,
    Active = 5,
    Failed = 6,
    Paused = 7,
}

impl IntegrationStatus {
    /// Return the database status ID.
    pub fn id(self) -> StatusId {
        self as StatusId
    }

    /// Look up a status from its database ID.
    pub fn from_id(id: StatusId) -> Option<Self> {
        match id {
            1 => Some(Self::Discovering),
            2 => Some(Self::Mapping),
            3 => Some(Self::Testing),
            4 => Some(Self::Deploying),
            5 => Some(Self::Active),
            6 => Some(Self::Failed),
            7 => Some(Self::Paused),
            _ => None,
        }
    }

    /// API-facing uppercase label (e.g. `DISCOVERING`).
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Discovering => "DISCOVERING",
            Self::Mapping => "MAPPING",
            Self::Testing => "TESTING",
            Self::Deploying => "DEPLOYING",
            Self::Active => "ACTIVE",
            Self::Failed => "FAILED",
            Self::Paused => "PAUSED",
        }
    }
}

impl From<IntegrationStatus> for StatusId {
    fn from(value: IntegrationStatus) -> Self {
        value as StatusId
    }
}

/// Whether a transition between two lifecycle states is allowed.
///
/// The forward path is `DISCOVERING -> MAPPING -> TESTING -> DEPLOYING
/// -> ACTIVE`. `FAILED` is reachable from any state. `PAUSED` is a
/// manual hold that resumes to the state it was entered from, so any
/// non-terminal state may be re-entered from it.
pub fn can_transition(from: IntegrationStatus, to: IntegrationStatus) -> bool {
    use IntegrationStatus::*;

    if from == to {
        // Idempotent re-execution of a step keeps the state in place.
        return true;
    }

    match (from, to) {
        (_, Failed) => true,
        (Discovering, Mapping) => true,
        (Mapping, Testing) => true,
        (Testing, Deploying) => true,
        (Deploying, Active) => true,
        // Manual hold and release.
        (Failed, Paused) => false,
        (_, Paused) => true,
        (Paused, Discovering | Mapping | Testing | Deploying | Active) => true,
        // Healing may fall an active integration back to testing after
        // a schema refresh invalidates the deployed mapping.
        (Active, Testing) => true,
        _ => false,
    }
}

/// The externally-invoked lifecycle steps.
///
/// Used to key `error_log` entries and to name the offending step in
/// failure responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepKind {
    Create,
    Ingest,
    Map,
    Test,
    Deploy,
    Pause,
    Resume,
    DriftCheck,
    Heal,
}

impl StepKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Ingest => "ingest",
            Self::Map => "map",
            Self::Test => "test",
            Self::Deploy => "deploy",
            Self::Pause => "pause",
            Self::Resume => "resume",
            Self::DriftCheck => "drift_check",
            Self::Heal => "heal",
        }
    }

    /// The step that should follow on success, while the happy path
    /// has one.
    pub fn next(self) -> Option<Self> {
        match self {
            Self::Create => Some(Self::Ingest),
            Self::Ingest => Some(Self::Map),
            Self::Map => Some(Self::Test),
            Self::Test => Some(Self::Deploy),
            _ => None,
        }
    }
}

/// The step a caller should invoke next for an integration in the
/// given state, if the happy path has one.
pub fn next_step_for(status: IntegrationStatus) -> Option<StepKind> {
    match status {
        IntegrationStatus::Discovering => Some(StepKind::Ingest),
        IntegrationStatus::Mapping => Some(StepKind::Map),
        IntegrationStatus::Testing => Some(StepKind::Test),
        IntegrationStatus::Deploying => Some(StepKind::Deploy),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

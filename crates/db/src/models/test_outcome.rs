//! Synthetic call outcome rows.

use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;
use weave_core::types::{DbId, Timestamp};

/// A row from the `test_outcomes` table. Append-only.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct TestOutcome {
    pub id: DbId,
    pub integration_id: DbId,
    pub run_id: Uuid,
    /// `"METHOD path"` of the call.
    pub endpoint: String,
    pub method: String,
    /// Absent for timeouts and connection errors.
    pub status_code: Option<i16>,
    pub latency_ms: i32,
    pub success: bool,
    /// One of the `OutcomeClass` labels.
    pub classification: String,
    pub created_at: Timestamp,
}

/// DTO for recording one outcome.
#[derive(Debug, Clone)]
pub struct NewTestOutcome {
    pub endpoint: String,
    pub method: String,
    pub status_code: Option<i16>,
    pub latency_ms: i32,
    pub success: bool,
    pub classification: String,
}

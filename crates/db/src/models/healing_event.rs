//! Self-healing audit trail rows.

use serde::Serialize;
use sqlx::FromRow;
use weave_core::types::{DbId, Timestamp};

/// A row from the `healing_events` table. Append-only; only the
/// `outcome` column is updated, once, when the strategist finishes.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct HealingEvent {
    pub id: DbId,
    pub integration_id: DbId,
    pub trigger_reason: String,
    /// Diagnosis label (`auth-failure`, `endpoint-drift`, ...).
    pub diagnosis: String,
    /// Strategy label (`credential-rotation`, `schema-refresh`, ...).
    pub action: String,
    /// `success` | `failed` | `pending`.
    pub outcome: String,
    /// 1-based attempt counter for this trigger reason.
    pub attempt: i16,
    pub detail: Option<serde_json::Value>,
    pub created_at: Timestamp,
}

/// DTO for opening a healing event.
#[derive(Debug, Clone)]
pub struct NewHealingEvent {
    pub trigger_reason: String,
    pub diagnosis: String,
    pub action: String,
    pub attempt: i16,
    pub detail: Option<serde_json::Value>,
}

//! Transformation rule rows.

use serde::Serialize;
use sqlx::FromRow;
use weave_core::types::{DbId, Timestamp};

/// A row from the `transformations` table.
///
/// Immutable once created; a mapping re-run replaces the whole set for
/// the integration atomically.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Transformation {
    pub id: DbId,
    pub integration_id: DbId,
    pub position: i32,
    pub source_field: String,
    pub dest_field: String,
    pub kind: String,
    pub config: Option<serde_json::Value>,
    pub created_at: Timestamp,
}

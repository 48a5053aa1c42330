use crate::types::DbId;

/// Domain error taxonomy shared across all crates.
///
/// Step-local failures are caught at the orchestrator boundary,
/// recorded in the integration's `error_log`, and surfaced to the
/// caller without advancing state.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: &'static str, id: DbId },

    #[error("Validation failed: {0}")]
    Validation(String),

    /// A step was invoked out of order, or a conflicting step for the
    /// same integration is already in flight.
    #[error("Precondition failed: {0}")]
    Precondition(String),

    // --- Ingestion ---
    #[error("Fetch failed: {0}")]
    Fetch(String),

    #[error("Parse failed: {0}")]
    Parse(String),

    #[error("Unsupported schema: {0}")]
    UnsupportedSchema(String),

    // --- Mapping ---
    #[error("Incompatible schemas: {0}")]
    IncompatibleSchema(String),

    // --- Deployment ---
    #[error("Build failed: {0}")]
    Build(String),

    #[error("Launch failed: {0}")]
    Launch(String),

    #[error("Quota exceeded: {0}")]
    QuotaExceeded(String),

    #[error("Step timed out after {0} seconds")]
    Timeout(u64),

    #[error("Internal error: {0}")]
    Internal(String),
}

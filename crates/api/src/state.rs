use std::sync::Arc;

use weave_orchestrator::Orchestrator;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc` or is already `Clone`).
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub pool: weave_db::DbPool,
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// The lifecycle engine all step endpoints dispatch to.
    pub orchestrator: Arc<Orchestrator>,
}

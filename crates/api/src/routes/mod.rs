pub mod health;
pub mod integration;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// ```text
/// /integrations                          list, create
/// /integrations/{id}                     get, delete
/// /integrations/{id}/ingest              spec ingestion (POST)
/// /integrations/{id}/map                 field mapping (POST)
/// /integrations/{id}/test                synthetic test batch (POST)
/// /integrations/{id}/deploy              deployment (POST)
/// /integrations/{id}/pause               manual hold (POST)
/// /integrations/{id}/resume              release hold (POST)
/// /integrations/{id}/heal                healing pass (POST)
/// /integrations/{id}/drift-check         drift report (POST)
/// /integrations/{id}/outcomes            synthetic call outcomes (GET)
/// /integrations/{id}/healing-events      healing audit trail (GET)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new().nest("/integrations", integration::router())
}

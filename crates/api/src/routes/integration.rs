//! Route definitions for the `/integrations` resource.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::integration;
use crate::state::AppState;

/// Routes mounted at `/integrations`.
///
/// ```text
/// GET    /                        -> list
/// POST   /                        -> create
/// GET    /{id}                    -> get_by_id
/// DELETE /{id}                    -> delete
///
/// POST   /{id}/ingest             -> ingest
/// POST   /{id}/map                -> map
/// POST   /{id}/test               -> test
/// POST   /{id}/deploy             -> deploy
/// POST   /{id}/pause              -> pause
/// POST   /{id}/resume             -> resume
/// POST   /{id}/heal               -> heal
/// POST   /{id}/drift-check        -> drift_check
///
/// GET    /{id}/outcomes           -> outcomes
/// GET    /{id}/healing-events     -> healing_events
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(integration::list).post(integration::create))
        .route(
            "/{id}",
            get(integration::get_by_id).delete(integration::delete),
        )
        .route("/{id}/ingest", post(integration::ingest))
        .route("/{id}/map", post(integration::map))
        .route("/{id}/test", post(integration::test))
        .route("/{id}/deploy", post(integration::deploy))
        .route("/{id}/pause", post(integration::pause))
        .route("/{id}/resume", post(integration::resume))
        .route("/{id}/heal", post(integration::heal))
        .route("/{id}/drift-check", post(integration::drift_check))
        .route("/{id}/outcomes", get(integration::outcomes))
        .route("/{id}/healing-events", get(integration::healing_events))
}

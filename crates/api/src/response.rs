//! Shared response envelope types for API handlers.
//!
//! Read endpoints use the `{ "data": ... }` envelope. Lifecycle step
//! endpoints use [`StepResponse`], which additionally reports the
//! integration's current state and, while the happy path has one, the
//! next step to invoke.

use serde::Serialize;
use weave_core::status::{next_step_for, IntegrationStatus};
use weave_core::types::DbId;

use crate::handlers::integration::IntegrationView;

/// Standard `{ "data": T }` response envelope.
#[derive(Debug, Serialize)]
pub struct DataResponse<T: Serialize> {
    pub data: T,
}

/// Envelope for lifecycle step endpoints.
#[derive(Debug, Serialize)]
pub struct StepResponse {
    /// Always `"ok"`; failures take the error envelope instead.
    pub status: &'static str,
    pub integration_id: DbId,
    /// Uppercase lifecycle state label after the step. The wire key is
    /// `current_step`; clients read the state the step left behind.
    #[serde(rename = "current_step")]
    pub current_status: &'static str,
    pub data: IntegrationView,
    /// The next happy-path step, when there is one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_step: Option<&'static str>,
    /// Endpoint to invoke the next step.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_endpoint: Option<String>,
}

impl StepResponse {
    /// Build the envelope from a post-step integration view.
    pub fn for_view(view: IntegrationView, status: IntegrationStatus) -> Self {
        let next = next_step_for(status);
        let next_endpoint = next.map(|step| {
            format!("/api/v1/integrations/{}/{}", view.id, step.as_str())
        });

        Self {
            status: "ok",
            integration_id: view.id,
            current_status: status.as_str(),
            data: view,
            next_step: next.map(|s| s.as_str()),
            next_endpoint,
        }
    }
}

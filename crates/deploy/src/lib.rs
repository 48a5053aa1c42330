//! Deployment driver: turns a validated mapping into a running
//! runtime unit with a reachable endpoint.
//!
//! [`DeployTarget`] is the capability seam: prepare a build artifact,
//! launch it with a resource request, and report its endpoint. The
//! reference backend runs local containers via the docker CLI; the
//! in-memory backend backs tests.

pub mod local;
pub mod memory;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use weave_core::error::CoreError;
use weave_core::types::DbId;

/// Known deployment target kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TargetKind {
    LocalContainer,
    ManagedKubernetes,
    ServerlessContainer,
}

impl TargetKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::LocalContainer => "local-container",
            Self::ManagedKubernetes => "managed-kubernetes",
            Self::ServerlessContainer => "serverless-container",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "local-container" => Some(Self::LocalContainer),
            "managed-kubernetes" => Some(Self::ManagedKubernetes),
            "serverless-container" => Some(Self::ServerlessContainer),
            _ => None,
        }
    }
}

/// Resource request for a launch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceRequest {
    pub replicas: i32,
    pub memory_mb: i32,
    pub cpu_cores: f64,
    pub auto_scale: bool,
}

impl Default for ResourceRequest {
    fn default() -> Self {
        Self {
            replicas: 1,
            memory_mb: 256,
            cpu_cores: 0.5,
            auto_scale: false,
        }
    }
}

/// Everything a backend needs to build a runtime unit for one
/// integration: identity plus the sync configuration it will serve.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeploymentSpec {
    pub integration_id: DbId,
    pub name: String,
    pub source_base_url: String,
    pub dest_base_url: String,
    /// The transformation rules the runtime applies, as stored.
    pub transformations: serde_json::Value,
}

/// A prepared build artifact, opaque to the orchestrator.
#[derive(Debug, Clone)]
pub struct BuildArtifact {
    /// Backend-specific reference (image tag, bundle path, ...).
    pub reference: String,
}

/// A launched runtime unit.
#[derive(Debug, Clone)]
pub struct RunningInstance {
    /// Backend-specific runtime identifier (container id, deployment
    /// name, ...).
    pub runtime_id: String,
}

/// Errors from the deployment driver. All are terminal for the step;
/// the orchestrator never retries them automatically.
#[derive(Debug, thiserror::Error)]
pub enum DeployError {
    #[error("build failed: {0}")]
    Build(String),

    #[error("launch failed: {0}")]
    Launch(String),

    #[error("quota exceeded: {0}")]
    QuotaExceeded(String),
}

impl From<DeployError> for CoreError {
    fn from(err: DeployError) -> Self {
        match err {
            DeployError::Build(msg) => CoreError::Build(msg),
            DeployError::Launch(msg) => CoreError::Launch(msg),
            DeployError::QuotaExceeded(msg) => CoreError::QuotaExceeded(msg),
        }
    }
}

/// Capability set every deployment backend implements.
#[async_trait]
pub trait DeployTarget: Send + Sync {
    /// Which target kind this backend is, for the deployment record.
    fn kind(&self) -> TargetKind;

    /// Build a launchable artifact from the deployment spec.
    async fn prepare(&self, spec: &DeploymentSpec) -> Result<BuildArtifact, DeployError>;

    /// Launch the artifact with the requested resources.
    async fn launch(
        &self,
        artifact: &BuildArtifact,
        resources: &ResourceRequest,
    ) -> Result<RunningInstance, DeployError>;

    /// Reachable service URL of a running instance.
    async fn endpoint_of(&self, instance: &RunningInstance) -> Result<String, DeployError>;
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

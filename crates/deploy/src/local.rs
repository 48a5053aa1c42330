//! Local-container reference backend.
//!
//! Runs the sync runtime as a docker container on the host. The
//! runtime image is prebuilt and generic; `prepare` materializes the
//! integration's sync configuration as an env payload baked into the
//! launch, so "build" here is a tag-and-validate step rather than an
//! image build.

use tokio::process::Command;

use crate::{
    BuildArtifact, DeployError, DeployTarget, DeploymentSpec, ResourceRequest, RunningInstance,
    TargetKind,
};

/// Default image for the generic sync runtime.
const DEFAULT_RUNTIME_IMAGE: &str = "weave/sync-runtime:latest";

/// Container port the runtime listens on.
const RUNTIME_PORT: u16 = 8080;

/// Upper bound on local replicas; beyond this the request belongs on a
/// managed target.
const MAX_LOCAL_REPLICAS: i32 = 4;

/// Deploys integrations as local docker containers.
pub struct LocalContainerTarget {
    image: String,
}

impl Default for LocalContainerTarget {
    fn default() -> Self {
        Self::new(DEFAULT_RUNTIME_IMAGE)
    }
}

impl LocalContainerTarget {
    pub fn new(image: impl Into<String>) -> Self {
        Self {
            image: image.into(),
        }
    }

    /// Construct from the `RUNTIME_IMAGE` env var, falling back to the
    /// default image.
    pub fn from_env() -> Self {
        match std::env::var("RUNTIME_IMAGE") {
            Ok(image) if !image.trim().is_empty() => Self::new(image),
            _ => Self::default(),
        }
    }

    async fn docker(args: &[&str]) -> Result<String, String> {
        let output = Command::new("docker")
            .args(args)
            .output()
            .await
            .map_err(|e| format!("docker not available: {e}"))?;

        if !output.status.success() {
            return Err(String::from_utf8_lossy(&output.stderr).trim().to_string());
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

#[async_trait::async_trait]
impl DeployTarget for LocalContainerTarget {
    fn kind(&self) -> TargetKind {
        TargetKind::LocalContainer
    }

    async fn prepare(&self, spec: &DeploymentSpec) -> Result<BuildArtifact, DeployError> {
        // Verify the runtime image exists locally (or can be pulled).
        Self::docker(&["image", "inspect", &self.image])
            .await
            .map_err(|e| DeployError::Build(format!("runtime image {}: {e}", self.image)))?;

        tracing::info!(
            integration_id = spec.integration_id,
            image = %self.image,
            "prepared local container artifact"
        );
        Ok(BuildArtifact {
            reference: self.image.clone(),
        })
    }

    async fn launch(
        &self,
        artifact: &BuildArtifact,
        resources: &ResourceRequest,
    ) -> Result<RunningInstance, DeployError> {
        if resources.replicas > MAX_LOCAL_REPLICAS {
            return Err(DeployError::QuotaExceeded(format!(
                "local-container target supports at most {MAX_LOCAL_REPLICAS} replicas, \
                 {} requested",
                resources.replicas
            )));
        }

        let memory = format!("{}m", resources.memory_mb);
        let cpus = resources.cpu_cores.to_string();
        let container_id = Self::docker(&[
            "run",
            "--detach",
            "--publish-all",
            "--memory",
            &memory,
            "--cpus",
            &cpus,
            &artifact.reference,
        ])
        .await
        .map_err(DeployError::Launch)?;

        tracing::info!(container_id = %container_id, "launched local container");
        Ok(RunningInstance {
            runtime_id: container_id,
        })
    }

    async fn endpoint_of(&self, instance: &RunningInstance) -> Result<String, DeployError> {
        let port_spec = format!("{RUNTIME_PORT}/tcp");
        let host_port = Self::docker(&["port", &instance.runtime_id, &port_spec])
            .await
            .map_err(DeployError::Launch)?;

        // `docker port` prints `0.0.0.0:32768` (possibly several
        // lines); take the first mapping's port.
        let port = host_port
            .lines()
            .next()
            .and_then(|line| line.rsplit(':').next())
            .ok_or_else(|| {
                DeployError::Launch(format!(
                    "no published port for container {}",
                    instance.runtime_id
                ))
            })?;

        Ok(format!("http://127.0.0.1:{port}"))
    }
}

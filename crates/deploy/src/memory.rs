//! In-memory deployment backend for tests.
//!
//! Records every launch so tests can assert on invocation counts
//! (e.g. that two racing deploy steps produce exactly one launch).

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use crate::{
    BuildArtifact, DeployError, DeployTarget, DeploymentSpec, ResourceRequest, RunningInstance,
    TargetKind,
};

/// Fake backend that "launches" instantly and counts invocations.
#[derive(Default)]
pub struct InMemoryTarget {
    launches: AtomicUsize,
    fail_next_launch: AtomicBool,
}

impl InMemoryTarget {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of successful launches so far.
    pub fn launch_count(&self) -> usize {
        self.launches.load(Ordering::SeqCst)
    }

    /// Make the next launch fail with a `Launch` error.
    pub fn fail_next_launch(&self) {
        self.fail_next_launch.store(true, Ordering::SeqCst);
    }
}

#[async_trait::async_trait]
impl DeployTarget for InMemoryTarget {
    fn kind(&self) -> TargetKind {
        TargetKind::LocalContainer
    }

    async fn prepare(&self, spec: &DeploymentSpec) -> Result<BuildArtifact, DeployError> {
        Ok(BuildArtifact {
            reference: format!("memory://{}", spec.integration_id),
        })
    }

    async fn launch(
        &self,
        artifact: &BuildArtifact,
        _resources: &ResourceRequest,
    ) -> Result<RunningInstance, DeployError> {
        if self.fail_next_launch.swap(false, Ordering::SeqCst) {
            return Err(DeployError::Launch("injected launch failure".to_string()));
        }
        self.launches.fetch_add(1, Ordering::SeqCst);
        Ok(RunningInstance {
            runtime_id: format!("{}#{}", artifact.reference, uuid::Uuid::new_v4()),
        })
    }

    async fn endpoint_of(&self, instance: &RunningInstance) -> Result<String, DeployError> {
        Ok(format!("http://sync.local/{}", instance.runtime_id))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn spec() -> DeploymentSpec {
        DeploymentSpec {
            integration_id: 1,
            name: "pets-sync".to_string(),
            source_base_url: "https://a.example".to_string(),
            dest_base_url: "https://b.example".to_string(),
            transformations: serde_json::json!([]),
        }
    }

    #[tokio::test]
    async fn full_cycle_counts_launches() {
        let target = InMemoryTarget::new();
        let artifact = target.prepare(&spec()).await.unwrap();
        let instance = target
            .launch(&artifact, &ResourceRequest::default())
            .await
            .unwrap();
        let endpoint = target.endpoint_of(&instance).await.unwrap();

        assert!(endpoint.starts_with("http://sync.local/"));
        assert_eq!(target.launch_count(), 1);
    }

    #[tokio::test]
    async fn injected_failure_surfaces_and_clears() {
        let target = InMemoryTarget::new();
        let artifact = target.prepare(&spec()).await.unwrap();

        target.fail_next_launch();
        let result = target.launch(&artifact, &ResourceRequest::default()).await;
        assert_matches!(result, Err(DeployError::Launch(_)));
        assert_eq!(target.launch_count(), 0);

        // Next launch succeeds.
        target
            .launch(&artifact, &ResourceRequest::default())
            .await
            .unwrap();
        assert_eq!(target.launch_count(), 1);
    }
}

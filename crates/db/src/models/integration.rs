//! Integration aggregate models and DTOs.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use weave_core::scoring::HealthScore;
use weave_core::types::{DbId, Timestamp};

/// A row from the `integrations` table.
///
/// JSONB columns hold typed shapes defined below and in `weave-core`:
/// `source_spec`/`dest_spec` are `NormalizedSpec`, `mapping` is
/// [`MappingRecord`], `health_score` is `HealthScore`, `deployment` is
/// [`DeploymentRecord`], `error_log` maps step name to the last fatal
/// error message for that step.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Integration {
    pub id: DbId,
    pub name: String,
    pub user_intent: String,
    pub status_id: i16,
    pub source_discovery: serde_json::Value,
    pub dest_discovery: serde_json::Value,
    pub source_spec: Option<serde_json::Value>,
    pub dest_spec: Option<serde_json::Value>,
    pub mapping: Option<serde_json::Value>,
    pub health_score: Option<serde_json::Value>,
    pub deployment: Option<serde_json::Value>,
    pub error_log: serde_json::Value,
    pub paused_from: Option<i16>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// A candidate API captured at creation time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryCandidate {
    pub name: String,
    pub base_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub docs_url: Option<String>,
    /// Discovery confidence in `[0, 1]`.
    pub confidence: f64,
    /// Where the candidate came from (e.g. `"user"`, `"search"`).
    pub provenance: String,
}

/// A `path` + `method` reference into a stored normalized spec.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointRef {
    pub path: String,
    pub method: String,
}

impl EndpointRef {
    /// `"METHOD path"` label used for coverage accounting and
    /// outcome rows.
    pub fn label(&self) -> String {
        format!("{} {}", self.method, self.path)
    }
}

/// The `mapping` JSONB column: the chosen endpoint pair, the hints the
/// user supplied, and the mapper's summary. The ordered rule set lives
/// in the `transformations` child table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MappingRecord {
    pub source_endpoint: EndpointRef,
    pub dest_endpoint: EndpointRef,
    #[serde(default)]
    pub hints: std::collections::HashMap<String, String>,
    pub complexity: i16,
    #[serde(default)]
    pub unmapped: Vec<String>,
}

/// The `deployment` JSONB column.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeploymentRecord {
    /// Target kind label (`local-container`, `managed-kubernetes`,
    /// `serverless-container`).
    pub target: String,
    pub runtime_id: String,
    pub endpoint: String,
    pub replicas: i32,
    pub memory_mb: i32,
    pub cpu_cores: f64,
    pub auto_scale: bool,
    pub deployed_at: Timestamp,
}

/// DTO for creating an integration.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateIntegration {
    pub name: String,
    pub user_intent: String,
    pub source_discovery: DiscoveryCandidate,
    pub dest_discovery: DiscoveryCandidate,
}

impl Integration {
    /// Deserialize the stored mapping record, if the map step has run.
    pub fn mapping_record(&self) -> Option<MappingRecord> {
        self.mapping
            .as_ref()
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    /// Deserialize the latest health snapshot, if the test step has run.
    pub fn health(&self) -> Option<HealthScore> {
        self.health_score
            .as_ref()
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    /// Deserialize one of the discovery candidate records.
    pub fn discovery(&self, source: bool) -> Option<DiscoveryCandidate> {
        let value = if source {
            &self.source_discovery
        } else {
            &self.dest_discovery
        };
        serde_json::from_value(value.clone()).ok()
    }
}

//! Lifecycle orchestration: the step-wise workflow engine that carries
//! an integration from discovery through deployment, plus the
//! self-healing strategist and the monitor that triggers it.
//!
//! The orchestrator is an explicit service holding injected
//! dependencies (pool, fetcher, test runner, deployment target). It is
//! constructed once at process start and shared behind an `Arc`; there
//! is no module-level state.

pub mod config;
pub mod error;
pub mod lifecycle;
pub mod locks;
pub mod monitor;
pub mod runner;
pub mod strategist;

pub use config::OrchestratorConfig;
pub use error::StepError;
pub use lifecycle::{
    DeployArgs, DriftCheckReport, IngestArgs, MapArgs, Orchestrator, SideDrift, TestArgs,
};
pub use monitor::{Monitor, MonitorConfig};

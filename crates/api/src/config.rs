use std::time::Duration;

use weave_orchestrator::OrchestratorConfig;

/// Server configuration loaded from environment variables.
///
/// All fields have sensible defaults suitable for local development.
/// In production, override via environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `150`). Must exceed
    /// the step timeout or long test batches would be cut off at the
    /// HTTP layer first.
    pub request_timeout_secs: u64,
    /// Whole-step deadline in seconds (default: `120`).
    pub step_timeout_secs: u64,
    /// Minimum overall health score to advance past testing
    /// (default: `70`).
    pub pass_threshold: i16,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                | Default                    |
    /// |------------------------|----------------------------|
    /// | `HOST`                 | `0.0.0.0`                  |
    /// | `PORT`                 | `3000`                     |
    /// | `CORS_ORIGINS`         | `http://localhost:5173`    |
    /// | `REQUEST_TIMEOUT_SECS` | `150`                      |
    /// | `STEP_TIMEOUT_SECS`    | `120`                      |
    /// | `PASS_THRESHOLD`       | `70`                       |
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());

        let port: u16 = std::env::var("PORT")
            .unwrap_or_else(|_| "3000".into())
            .parse()
            .expect("PORT must be a valid u16");

        let cors_origins: Vec<String> = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:5173".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let request_timeout_secs: u64 = std::env::var("REQUEST_TIMEOUT_SECS")
            .unwrap_or_else(|_| "150".into())
            .parse()
            .expect("REQUEST_TIMEOUT_SECS must be a valid u64");

        let step_timeout_secs: u64 = std::env::var("STEP_TIMEOUT_SECS")
            .unwrap_or_else(|_| "120".into())
            .parse()
            .expect("STEP_TIMEOUT_SECS must be a valid u64");

        let pass_threshold: i16 = std::env::var("PASS_THRESHOLD")
            .unwrap_or_else(|_| "70".into())
            .parse()
            .expect("PASS_THRESHOLD must be a valid i16");

        Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            step_timeout_secs,
            pass_threshold,
        }
    }

    /// Orchestrator tunables derived from the server configuration.
    pub fn orchestrator_config(&self) -> OrchestratorConfig {
        OrchestratorConfig {
            pass_threshold: self.pass_threshold,
            step_timeout: Duration::from_secs(self.step_timeout_secs),
            ..OrchestratorConfig::default()
        }
    }
}

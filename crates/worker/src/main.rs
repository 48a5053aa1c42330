//! Background monitor worker.
//!
//! Runs the integration monitor on a fixed interval, independent of
//! the API server. Both processes share the database; step locks keep
//! concurrent healing and user-initiated steps from interleaving only
//! within a process, while guarded status transitions arbitrate across
//! processes.

use std::sync::Arc;
use std::time::Duration;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use weave_deploy::local::LocalContainerTarget;
use weave_fetcher::SpecFetcher;
use weave_orchestrator::{Monitor, MonitorConfig, Orchestrator, OrchestratorConfig};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "weave_worker=debug,weave_orchestrator=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let interval_secs: u64 = std::env::var("MONITOR_INTERVAL_SECS")
        .unwrap_or_else(|_| "60".into())
        .parse()
        .expect("MONITOR_INTERVAL_SECS must be a valid u64");
    let monitor_config = monitor_config_from_env();
    tracing::info!(
        interval_secs,
        failure_rate = monitor_config.failure_rate_threshold,
        "Loaded monitor configuration"
    );

    // --- Database ---
    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");

    let pool = weave_db::create_pool(&database_url)
        .await
        .expect("Failed to connect to database");

    weave_db::health_check(&pool)
        .await
        .expect("Database health check failed");
    tracing::info!("Database connection pool created");

    // --- Monitor ---
    let orchestrator = Arc::new(Orchestrator::new(
        pool,
        Arc::new(SpecFetcher::new()),
        Arc::new(LocalContainerTarget::from_env()),
        OrchestratorConfig::default(),
    ));
    let monitor = Monitor::new(orchestrator, monitor_config);

    let mut interval = tokio::time::interval(Duration::from_secs(interval_secs));
    // A slow tick should not cause a burst of catch-up ticks.
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    tracing::info!("Monitor worker started");
    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);
    loop {
        tokio::select! {
            _ = interval.tick() => {
                let summary = monitor.tick().await;
                if summary.triggered > 0 {
                    tracing::info!(
                        checked = summary.checked,
                        triggered = summary.triggered,
                        skipped = summary.skipped,
                        "monitor tick triggered healing"
                    );
                }
            }
            () = &mut shutdown => break,
        }
    }

    tracing::info!("Graceful shutdown complete");
}

/// Monitor thresholds; env-tunable where operations need it.
fn monitor_config_from_env() -> MonitorConfig {
    let mut config = MonitorConfig::default();
    if let Ok(raw) = std::env::var("MONITOR_FAILURE_RATE") {
        config.failure_rate_threshold =
            raw.parse().expect("MONITOR_FAILURE_RATE must be a valid f64");
    }
    if let Ok(raw) = std::env::var("MONITOR_HEALTH_MAX_AGE_HOURS") {
        let hours: i64 = raw
            .parse()
            .expect("MONITOR_HEALTH_MAX_AGE_HOURS must be a valid i64");
        config.health_max_age = chrono::Duration::hours(hours);
    }
    config
}

/// Wait for a termination signal to initiate graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}

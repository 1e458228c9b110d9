//! Notifier Cache - host process
//!
//! Runs the cache core standalone: logs a periodic health summary and the
//! full text report on shutdown.

use std::time::Duration;

use anyhow::Result;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use notifier_cache::{CacheRuntime, Config, ExportFormat};

/// Main entry point.
///
/// # Startup Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Load configuration from environment variables
/// 3. Start the cache runtime (analytics collector, stores, services)
/// 4. Log a health summary every report interval
/// 5. On SIGINT/SIGTERM, log the performance report and shut down
#[tokio::main]
async fn main() -> Result<()> {
    // Defaults to "info" for this crate, can be overridden with RUST_LOG
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "notifier_cache=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting notifier cache");

    let config = Config::from_env();
    info!(
        sweep_interval_ms = config.store.sweep_interval.as_millis() as u64,
        call_timeout_ms = config.store.call_timeout.as_millis() as u64,
        snapshot_interval_secs = config.analytics.snapshot_interval.as_secs(),
        report_interval_secs = config.report_interval.as_secs(),
        "Configuration loaded"
    );
    let report_interval = config.report_interval.max(Duration::from_secs(1));

    let runtime = CacheRuntime::start(config).await;
    let reporter = tokio::spawn(report_health(runtime.clone(), report_interval));

    shutdown_signal().await?;

    reporter.abort();
    let report = runtime.insights.export_report(ExportFormat::Text).await;
    info!("Final performance report:\n{}", report);
    runtime.shutdown().await;

    info!("Shutdown complete");
    Ok(())
}

/// Logs the health score once per interval.
async fn report_health(runtime: CacheRuntime, every: Duration) {
    let mut ticker = tokio::time::interval(every);
    // The first tick completes immediately.
    ticker.tick().await;
    loop {
        ticker.tick().await;
        let health = runtime.insights.get_health_score().await;
        let usage = runtime.analytics.get_usage_report().await;
        if health.overall < 0.6 {
            warn!(
                score = health.overall,
                grade = %health.grade,
                operations = usage.total_operations,
                hit_rate = usage.hit_rate,
                "Cache health is poor"
            );
        } else {
            info!(
                score = health.overall,
                grade = %health.grade,
                status = %health.status,
                operations = usage.total_operations,
                hit_rate = usage.hit_rate,
                "Cache health"
            );
        }
    }
}

/// Waits for Ctrl+C or SIGTERM.
async fn shutdown_signal() -> Result<()> {
    #[cfg(unix)]
    {
        let mut terminate = signal::unix::signal(signal::unix::SignalKind::terminate())?;
        tokio::select! {
            result = signal::ctrl_c() => {
                result?;
                info!("Received Ctrl+C, initiating shutdown...");
            }
            _ = terminate.recv() => {
                info!("Received SIGTERM, initiating shutdown...");
            }
        }
    }

    #[cfg(not(unix))]
    {
        signal::ctrl_c().await?;
        info!("Received Ctrl+C, initiating shutdown...");
    }

    Ok(())
}

mod alerts;
mod audit;
mod sampler;
mod store;
mod telemetry;

use std::sync::Arc;
use std::time::Duration;

use migration::Migrator;
use sea_orm_migration::MigratorTrait;
use tokio::sync::watch;
use tracing_appender::rolling;
use util::config;

use crate::alerts::{AlertSink, SmtpAlertSink};
use crate::audit::AuditLog;
use crate::sampler::{Sampler, SamplerSettings};
use crate::telemetry::{MockSource, NvmlSource, TelemetrySource};

#[tokio::main]
async fn main() {
    // Load configuration and initialize logging
    let _log_guard = init_logging(&config::log_file());

    // Connect and ensure the schema exists; safe to run on every startup.
    // A failure here is the one unrecoverable error: abort with a diagnostic
    // rather than run without a usable store.
    let db = db::connect().await;
    if let Err(e) = Migrator::up(&db, None).await {
        tracing::error!("schema initialization failed: {e}");
        eprintln!("schema initialization failed: {e}");
        std::process::exit(1);
    }

    let source: Box<dyn TelemetrySource> = match config::telemetry_source().as_str() {
        "mock" => Box::new(MockSource::new()),
        "nvml" => Box::new(NvmlSource::new()),
        other => {
            tracing::warn!("unknown TELEMETRY_SOURCE '{other}', using nvml");
            Box::new(NvmlSource::new())
        }
    };

    // Real hardware defaults to a relaxed cadence; the mock source is for
    // demos and runs faster unless configured otherwise.
    let interval_seconds = config::sample_interval_seconds().unwrap_or(match source.name() {
        "mock" => 5,
        _ => 30,
    });

    let sink: Option<Arc<dyn AlertSink>> = if config::email_alerts_enabled() {
        match SmtpAlertSink::from_config() {
            Ok(sink) => Some(Arc::new(sink)),
            Err(e) => {
                tracing::error!("email alerting disabled: {e}");
                None
            }
        }
    } else {
        None
    };

    let settings = SamplerSettings {
        interval: Duration::from_secs(interval_seconds),
        poll_timeout: Duration::from_secs(config::poll_timeout_seconds()),
        temp_alert_threshold_c: config::temp_alert_threshold_c(),
        history_window_size: config::history_window_size(),
    };

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("interrupt received, stopping after the current cycle");
            let _ = shutdown_tx.send(true);
        }
    });

    println!(
        "Starting {} collector: {} source, {}s interval",
        config::project_name(),
        source.name(),
        interval_seconds
    );
    tracing::info!(
        "collector started ({} source, {interval_seconds}s interval)",
        source.name()
    );

    let sampler = Sampler::new(
        db,
        source,
        sink,
        Some(AuditLog::new(config::audit_log_path())),
        settings,
    );
    sampler.run(shutdown_rx).await;

    tracing::info!("collector stopped");
}

fn init_logging(log_file: &str) -> tracing_appender::non_blocking::WorkerGuard {
    use std::fs;
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    fs::create_dir_all("logs").ok();

    let file_appender = rolling::daily("logs", log_file);
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    let file_layer = fmt::layer()
        .with_writer(file_writer)
        .with_ansi(false)
        .with_target(true);

    let stdout_layer = fmt::layer()
        .with_writer(std::io::stdout)
        .with_ansi(true)
        .with_target(true);

    let env_filter = EnvFilter::try_from_env("LOG_LEVEL")
        .unwrap_or_else(|_| EnvFilter::new("collector=info"));

    let registry = tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer);

    if config::log_to_stdout() {
        registry.with(stdout_layer).init();
    } else {
        registry.init();
    }

    guard
}

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use qc_analyzer::commentary::CommentaryConfig;
use qc_analyzer::config::{AppConfig, Cli};
use qc_analyzer::http::{self, AppState};
use qc_analyzer::metrics::MetricsConfig;
use qc_analyzer::orchestrator::{JobOrchestrator, OrchestratorLimits};
use qc_analyzer::probe::{self, ProbeDriver};
use qc_analyzer::progress::ProgressBus;
use qc_analyzer::storage::InMemoryStorage;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match AppConfig::load(&cli) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("configuration rejected: {err:#}");
            return ExitCode::from(2);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let driver = ProbeDriver::new(config.probe_path.clone().into(), config.renderer_path.clone().into())
        .with_capture_limit(config.probe_output_capture_limit_bytes);

    if let Err(err) = probe::validate_startup(&driver) {
        tracing::error!(error = %err, "probe binary failed startup validation");
        return ExitCode::from(1);
    }
    tracing::info!(probe_path = %config.probe_path, renderer_path = %config.renderer_path, "probe binaries validated");

    let limits = OrchestratorLimits {
        max_batch_items: config.max_batch_items,
        max_concurrent_workers: config.max_concurrent_batch_workers,
        shutdown_grace_period: config.shutdown_grace_period.as_duration(),
    };
    let metrics_config = MetricsConfig {
        vmaf: Default::default(),
        timeout: Some(config.probe_timeout.as_duration()),
    };
    let commentary_config = CommentaryConfig {
        endpoint_url: config.ai_endpoint_url.clone(),
        model_id: config.ai_model_id.clone(),
        timeout: config.ai_timeout.as_duration(),
    };

    let progress = Arc::new(ProgressBus::new());
    let storage = Arc::new(InMemoryStorage::new());
    let orchestrator = Arc::new(JobOrchestrator::new(
        limits,
        driver,
        metrics_config,
        commentary_config,
        Arc::clone(&progress),
        storage,
    ));

    let bind = config.bind.clone();
    let state = Arc::new(AppState {
        config,
        orchestrator: Arc::clone(&orchestrator),
        progress,
    });
    let app = http::router::build(state);

    let listener = match tokio::net::TcpListener::bind(&bind).await {
        Ok(listener) => listener,
        Err(err) => {
            tracing::error!(error = %err, %bind, "failed to bind HTTP listener");
            return ExitCode::from(1);
        }
    };
    tracing::info!(%bind, "qc-analyzer listening");

    let serve_result = axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await;

    let orchestrator = Arc::into_inner(orchestrator).expect("no outstanding orchestrator handles after shutdown");
    orchestrator.shutdown().await;

    match serve_result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(error = %err, "server exited with an error");
            ExitCode::from(1)
        }
    }
}

/// Waits for Ctrl+C or, on Unix, SIGTERM, whichever arrives first.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("shutdown signal received, draining in-flight work");
}

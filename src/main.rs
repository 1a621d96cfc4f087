//! Treatment Outcome Service - Main Entry Point
//!
//! Loads the artifact bundle, then serves `/predict`, `/health` and
//! `/metrics` over HTTP. Send `SIGHUP` to reload the bundle in place.

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use treatment_outcome_service::{
    config::AppConfig,
    gateway::{create_router, AppState},
    metrics::{MetricsReporter, ServiceMetrics},
    models::loader::ArtifactLoader,
    reload::reload_bundle,
    BundleHandle,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration before logging so its level/format apply
    let config = AppConfig::load()?;
    init_tracing(&config)?;

    info!("Starting Treatment Outcome Service");
    info!(
        bundle_dir = %config.artifacts.bundle_dir,
        request_timeout_ms = config.gateway.request_timeout_ms,
        "Configuration loaded successfully"
    );

    let metrics = Arc::new(ServiceMetrics::new());
    let bundle = Arc::new(BundleHandle::empty());
    let loader = ArtifactLoader::from_config(&config.artifacts);

    // Initial load: degraded (503) by default, fatal when required
    if let Err(e) = reload_bundle(&loader, &bundle, &metrics) {
        if config.artifacts.require_on_startup {
            return Err(e).context("Artifact bundle failed to load at startup");
        }
        warn!(
            error = %e,
            "Starting without a model bundle; /predict returns 503 until a reload succeeds"
        );
    }

    if config.metrics.report_interval_secs > 0 {
        let reporter = MetricsReporter::new(metrics.clone(), config.metrics.report_interval_secs);
        tokio::spawn(reporter.start());
    }

    #[cfg(unix)]
    {
        let loader = loader.clone();
        let bundle = bundle.clone();
        let metrics = metrics.clone();
        tokio::spawn(async move {
            if let Err(e) =
                treatment_outcome_service::reload::reload_on_sighup(loader, bundle, metrics).await
            {
                error!(error = %e, "Failed to install SIGHUP handler");
            }
        });
    }

    let state = AppState::from_config(&config, bundle, metrics.clone());
    let app = create_router(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!(addr = %addr, "Listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;

    info!("Service shutting down...");
    metrics.print_summary();

    Ok(())
}

fn init_tracing(config: &AppConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().or_else(|_| {
        EnvFilter::try_new(format!(
            "treatment_outcome_service={}",
            config.logging.level
        ))
    })?;

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if config.logging.format.eq_ignore_ascii_case("json") {
        builder.json().init();
    } else {
        builder.init();
    }
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for shutdown signal");
        // Never resolve: keep serving rather than exit on a broken handler
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

//! Egg Production Prediction API - Main Entry Point
//!
//! Loads the model and scaler, then serves predictions over HTTP. A failed
//! load does not stop the server; it starts unhealthy and rejects inference.

use anyhow::{Context, Result};
use egg_production_api::{
    api::{self, AppState},
    config::{AppConfig, LoggingConfig},
    metrics::MetricsReporter,
    models::ModelRegistry,
};
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

fn init_logging(logging: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&logging.level))
        .add_directive(format!("egg_production_api={}", logging.level).parse()?);

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if logging.format == "json" {
        builder.json().init();
    } else {
        builder.init();
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config = AppConfig::load()?;
    init_logging(&config.logging)?;

    info!("Starting Egg Production API");
    info!(
        app_root = %config.artifacts.app_root.display(),
        models_dir = %config.artifacts.models_dir.display(),
        max_batch_size = config.inference.max_batch_size,
        "Configuration loaded"
    );

    // Load artifacts off the async runtime
    let registry = Arc::new(ModelRegistry::new(
        config.artifacts.clone(),
        &config.inference,
    ));
    let loader = registry.clone();
    let loaded = tokio::task::spawn_blocking(move || loader.load())
        .await
        .context("Model loading task panicked")?;
    if !loaded {
        error!("CRITICAL: Model failed to load. API will not serve predictions.");
    }

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let report_interval = config.metrics.report_interval_secs;
    let state = AppState::new(config, registry);

    // Start metrics reporter
    if report_interval > 0 {
        let reporter = MetricsReporter::new(state.metrics.clone(), report_interval);
        tokio::spawn(reporter.start());
    }

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!(addr = %addr, "Listening");

    axum::serve(listener, api::router(state))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutting down...");
        })
        .await
        .context("Server error")?;

    Ok(())
}

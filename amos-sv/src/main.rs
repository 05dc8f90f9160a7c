//! amos-sv - Accent similarity survey service
//!
//! Loads the trial catalog, opens the configured progress store and serves
//! the survey page with its JSON API.

use std::sync::Arc;

use amos_common::config::SurveyConfig;
use amos_common::store::open_store;
use amos_common::{SessionController, TrialCatalog};
use amos_sv::cli::Args;
use amos_sv::{build_router, AppState};
use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let (config, config_source) =
        SurveyConfig::load(args.config.as_deref()).context("Failed to load configuration")?;
    let config = config.apply_overrides(args.overrides());

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.logging.level.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Build identification first, before any slow startup work
    info!(
        "Starting amos-sv v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    match &config_source {
        Some(path) => info!("Loaded configuration from {}", path.display()),
        None => warn!("No config file found; using defaults"),
    }
    config.validate().context("Invalid configuration")?;

    let catalog = TrialCatalog::load(&config.catalog_path).with_context(|| {
        format!(
            "Failed to load trial catalog {}",
            config.catalog_path.display()
        )
    })?;

    let store = open_store(config.backend, &config.results_dir)
        .await
        .with_context(|| {
            format!(
                "Failed to open {} store in {}",
                config.backend,
                config.results_dir.display()
            )
        })?;
    info!(
        "✓ Progress store ready ({}, {})",
        config.backend,
        config.results_dir.display()
    );

    let controller = Arc::new(SessionController::new(
        Arc::new(catalog),
        store,
        config.total_trials,
    ));
    info!("Trials per participant: {}", controller.total_trials());

    if !config.audio_root.is_dir() {
        warn!(
            "Audio root {} is not a directory; local audio will not play",
            config.audio_root.display()
        );
    }

    let state = AppState::new(
        controller,
        config.study_title.clone(),
        config.audio_root.clone(),
    );
    let app = build_router(state);

    let addr = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;
    info!("amos-sv listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}

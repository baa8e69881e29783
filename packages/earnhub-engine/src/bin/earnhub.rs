//! EarnHub API server binary.

use earnhub_engine::{create_router, AppState, Config, API_KEY_ENV};
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting EarnHub");

    let config: Config = config::Config::builder()
        .add_source(config::File::with_name("earnhub").required(false))
        .add_source(config::Environment::with_prefix("EARNHUB").separator("__"))
        .build()
        .and_then(|c| c.try_deserialize())
        .unwrap_or_else(|e| {
            // Fall back only when no config exists; parsing errors fail hard.
            let err_str = format!("{e}");
            if err_str.contains("not found") || err_str.contains("missing field") {
                warn!(error = %e, "No config file found, using defaults");
                Config::default()
            } else {
                error!(error = %e, "FATAL: Config error, fix EARNHUB_* env vars or earnhub.toml");
                std::process::exit(1);
            }
        });

    if std::env::var(API_KEY_ENV)
        .map(|k| !k.is_empty())
        .unwrap_or(false)
    {
        info!("API key auth enabled");
    } else {
        warn!("{API_KEY_ENV} not set, API is unprotected (dev mode)");
    }

    info!(
        max_attempts = config.store.max_attempts,
        moderators = config.rewards.moderators.len(),
        config_version = config.rewards.version,
        "Configuration loaded"
    );

    let bind_address = config.bind_address.clone();
    let state = Arc::new(AppState::new(&config)?);

    let cancel = CancellationToken::new();

    // Change feed is for observers only; log it at debug level.
    let mut changes = state.engine.store().subscribe();
    let cancel_bg = cancel.clone();
    let feed = tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = cancel_bg.cancelled() => break,
                change = changes.recv() => match change {
                    Ok(notice) => debug!(version = notice.version, keys = notice.keys.len(), "Store commit"),
                    Err(RecvError::Lagged(skipped)) => warn!(skipped, "Change feed lagged"),
                    Err(RecvError::Closed) => break,
                },
            }
        }
    });

    let app = create_router(state.clone());

    info!(address = %bind_address, "Listening");

    let listener = tokio::net::TcpListener::bind(&bind_address).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // --- Graceful shutdown: stop the change feed ---
    info!("HTTP server stopped");
    cancel.cancel();
    if let Err(e) = feed.await {
        error!(error = %e, "Change feed task failed");
    }

    info!(
        requests = state.request_count.load(std::sync::atomic::Ordering::Relaxed),
        documents = state.engine.store().document_count(),
        "EarnHub shut down gracefully"
    );
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
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
        _ = ctrl_c => info!("Received SIGINT, shutting down..."),
        _ = terminate => info!("Received SIGTERM, shutting down..."),
    }
}

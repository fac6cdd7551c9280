use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use quizwindow::{api, auth, config::AppConfig, persist, state::AppState};

#[tokio::main]
async fn main() {
    // Load .env file if present (before any env var reads)
    if let Err(e) = dotenvy::dotenv() {
        // Not an error if .env doesn't exist, only log if it's a different issue
        if !matches!(e, dotenvy::Error::Io(_)) {
            eprintln!("Warning: Failed to load .env file: {}", e);
        }
    }

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "quizwindow=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting quizwindow...");

    let config = AppConfig::from_env();
    let auth_config = Arc::new(auth::AuthConfig::from_env());
    let state = Arc::new(AppState::new().with_poll_interval(config.poll_interval_secs));

    if let Some(path) = &config.snapshot_path {
        if let Err(e) = persist::load_snapshot(&state, path).await {
            tracing::error!("Refusing to start with unreadable snapshot: {}", e);
            std::process::exit(1);
        }
        persist::spawn_snapshot_writer(state.clone(), path.clone(), config.snapshot_interval);
    } else {
        tracing::warn!("SNAPSHOT_PATH not set, state will be lost on restart");
    }

    let app = api::router(state.clone(), auth_config);

    tracing::info!("Listening on http://{}", config.bind_addr);
    let listener = match tokio::net::TcpListener::bind(config.bind_addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!("Failed to bind {}: {}", config.bind_addr, e);
            std::process::exit(1);
        }
    };
    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        tracing::error!("Server error: {}", e);
    }

    // Flush whatever the interval writer has not persisted yet
    if let Some(path) = &config.snapshot_path {
        match persist::write_snapshot(&state, path).await {
            Ok(()) => tracing::info!("Final snapshot written to {}", path.display()),
            Err(e) => tracing::error!("Final snapshot write failed: {}", e),
        }
    }
}

/// Resolves on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}

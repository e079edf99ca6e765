//! Serve command implementation
//!
//! Components are built in dependency order and owned explicitly:
//! config → registry → health monitor → admission controller → router →
//! gateway → HTTP router. The probe loop and the HTTP server share one
//! cancellation token that is tripped on SIGINT/SIGTERM.

use crate::api::{create_router, AppState};
use crate::cli::{load_config, ServeArgs};
use crate::config::{ConfigError, GatewayConfig, LogFormat};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Load configuration with CLI overrides (CLI > env > file > defaults)
pub fn load_config_with_overrides(args: &ServeArgs) -> Result<GatewayConfig, ConfigError> {
    let mut config = load_config(&args.config)?;

    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(ref host) = args.host {
        config.server.host = host.clone();
    }
    if let Some(ref log_level) = args.log_level {
        config.logging.level = log_level.clone();
    }
    if args.no_health_check {
        config.health_check.enabled = false;
    }

    config.validate()?;
    Ok(config)
}

/// Initialize tracing based on configuration. `RUST_LOG` wins when set.
pub fn init_tracing(
    config: &crate::config::LoggingConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    let filter_str = crate::logging::build_filter_directives(config);

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&filter_str));

    match config.format {
        LogFormat::Pretty => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .try_init()?;
        }
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .try_init()?;
        }
    }

    Ok(())
}

/// Wait for shutdown signal (SIGINT or SIGTERM)
async fn shutdown_signal(cancel_token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install CTRL+C handler");
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
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received SIGINT, shutting down...");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, shutting down...");
        }
        _ = cancel_token.cancelled() => {}
    }

    cancel_token.cancel();
}

/// Main serve command handler
pub async fn run_serve(args: ServeArgs) -> Result<(), Box<dyn std::error::Error>> {
    // 1. Load and merge configuration
    let config = load_config_with_overrides(&args)?;

    // 2. Initialize tracing
    init_tracing(&config.logging)?;

    tracing::info!(engines = config.engines.len(), "Starting engine gateway");
    tracing::debug!(?config, "Loaded configuration");
    if config.engines.is_empty() {
        tracing::warn!("No engines configured; every chat request will fail with engine_unavailable");
    }

    // 3. Registry, health monitor, admission, router, gateway
    let config = Arc::new(config);
    let app_state = Arc::new(AppState::from_config(Arc::clone(&config))?);
    let app = create_router(Arc::clone(&app_state));

    // 4. Start the active probe loop (if enabled)
    let cancel_token = CancellationToken::new();
    let health_handle = if config.health_check.enabled {
        tracing::info!("Starting health monitor");
        Some(Arc::clone(app_state.health()).start(cancel_token.clone()))
    } else {
        tracing::info!("Active health checks disabled");
        None
    };

    // 5. Bind and serve
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(addr = %addr, "Gateway listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(cancel_token.clone()))
        .await?;

    // 6. Cleanup
    cancel_token.cancel();
    if let Some(handle) = health_handle {
        tracing::info!("Waiting for health monitor to stop");
        handle.await?;
    }

    tracing::info!("Engine gateway stopped");
    Ok(())
}

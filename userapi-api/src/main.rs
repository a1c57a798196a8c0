//! # user-api Server
//!
//! Startup sequence:
//! 1. Load configuration from the environment
//! 2. Declare and validate resources (the `users` database and the
//!    `user-api` service)
//! 3. Provision database pools and apply migrations
//! 4. Serve HTTP until ctrl-c or SIGTERM, then close the pools
//!
//! Any failure before serving aborts startup with a non-zero exit code.
//!
//! ## Usage
//!
//! ```bash
//! DATABASE_URL=postgresql://localhost/users cargo run -p userapi-api
//! ```

use anyhow::Context;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use userapi_api::{app, config::Config};
use userapi_shared::runtime::Runtime;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;
    init_tracing(config.logging.json);

    tracing::info!("user-api v{} starting...", env!("CARGO_PKG_VERSION"));

    let registry = app::build_registry(&config.app_root).context("Invalid resource declarations")?;
    let settings = config.provision_settings(registry.databases().map(|db| db.name()));
    let runtime = Runtime::provision(registry, &settings)
        .await
        .context("Failed to provision resources")?;

    let bind_address = config.bind_address();
    let state = app::AppState::new(runtime, config);
    let router = app::build_router(state.clone());

    let listener = tokio::net::TcpListener::bind(&bind_address)
        .await
        .with_context(|| format!("Failed to bind {}", bind_address))?;
    tracing::info!("Server listening on http://{}", bind_address);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    state.runtime.shutdown().await;
    tracing::info!("Shutdown complete");

    Ok(())
}

fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "userapi_api=debug,userapi_shared=debug,tower_http=debug".into());

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for ctrl-c: {}", e);
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

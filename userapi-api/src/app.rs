/// Application state and router builder
///
/// # Example
///
/// ```no_run
/// use userapi_api::{app, config::Config};
/// use userapi_shared::runtime::Runtime;
///
/// # async fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// let registry = app::build_registry(&config.app_root)?;
/// let settings = config.provision_settings(registry.databases().map(|db| db.name()));
/// let runtime = Runtime::provision(registry, &settings).await?;
///
/// let router = app::build_router(app::AppState::new(runtime, config));
/// # Ok(())
/// # }
/// ```

use crate::{bootstrap, config::Config};
use axum::{
    http::{header, HeaderValue, Method},
    routing::get,
    Router,
};
use std::path::Path;
use std::sync::Arc;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::Level;
use userapi_shared::registry::{Registry, RegistryBuilder, RegistryError};
use userapi_shared::runtime::Runtime;

/// Shared application state
///
/// Cloned for each request handler via Axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    /// Provisioned resources
    pub runtime: Arc<Runtime>,

    /// Application configuration
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(runtime: Runtime, config: Config) -> Self {
        Self {
            runtime: Arc::new(runtime),
            config: Arc::new(config),
        }
    }
}

/// Declares this application's resources and validates them
///
/// Relative migration paths resolve against `root`.
pub fn build_registry(root: &Path) -> Result<Registry, RegistryError> {
    let mut builder = RegistryBuilder::new(root);
    bootstrap::declare(&mut builder);
    builder.build()
}

/// Builds the Axum router
///
/// ```text
/// /
/// ├── GET /health               # Liveness and database connectivity
/// └── /v1/services
///     ├── GET /                 # Registered services
///     └── GET /:name            # One service and its databases
/// ```
pub fn build_router(state: AppState) -> Router {
    use crate::routes;

    let service_routes = Router::new()
        .route("/", get(routes::services::list_services))
        .route("/:name", get(routes::services::get_service));

    let cors = cors_layer(&state.config.api.cors_origins);

    Router::new()
        .route("/health", get(routes::health::health_check))
        .nest("/v1/services", service_routes)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors)
        .with_state(state)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.iter().any(|origin| origin == "*") {
        return CorsLayer::permissive();
    }

    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            header::ORIGIN,
            header::REFERER,
        ])
        .allow_credentials(true)
        .max_age(std::time::Duration::from_secs(3600))
}

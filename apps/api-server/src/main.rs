//! api-server: HTTP API for the Edge Mining adapter configuration store.
//!
//! Serves CRUD endpoints for external services, forecast providers,
//! notifiers, optimization units and system settings.
//! - Storage: SQLite (default, `sqlite` feature) or in-memory.
//! - CORS: Configurable via CORS_ALLOW_ORIGIN (origin string) for a frontend.
//!
//! Run:
//! ```bash
//! # pretty logs (default); PORT optional
//! cargo run -p api-server
//!
//! # volatile store, JSON logs
//! STORAGE_PROVIDER=memory LOG_FORMAT=json cargo run -p api-server
//! ```
//!
//! Configuration: See `config.rs` for all environment variables.

mod config;
mod routes;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::http::HeaderValue;
use axum::Router;
use domain::service::{ConfigurationService, Repositories, ServiceOptions};
use domain::CoreError;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::routes::AppState;

#[tokio::main]
async fn main() {
    // Load and validate config first (fail fast on misconfiguration)
    let cfg = match config::Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    init_tracing(&cfg);
    cfg.warn_if_volatile();

    let repos = match build_repositories(&cfg) {
        Ok(r) => r,
        Err(e) => {
            error!(err = %e, "failed to open storage");
            std::process::exit(1);
        }
    };
    let service = ConfigurationService::new(
        repos,
        ServiceOptions {
            allow_blank_name: cfg.allow_blank_name,
        },
    );
    let app = with_layers(
        routes::router(AppState {
            service: Arc::new(service),
        }),
        &cfg,
    );

    let addr: SocketAddr = ([0, 0, 0, 0], cfg.port).into();
    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(l) => l,
        Err(e) => {
            error!(%addr, err = %e, "failed to bind");
            std::process::exit(1);
        }
    };
    info!(%addr, "api-server listening");
    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        error!(err = %e, "server error");
        std::process::exit(1);
    }
    info!("api-server stopped");
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(err = %e, "failed to listen for shutdown signal");
    }
}

fn init_tracing(cfg: &config::Config) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let registry = tracing_subscriber::registry().with(env_filter);
    match cfg.log_format {
        config::LogFormat::Json => {
            registry
                .with(
                    fmt::layer()
                        .json()
                        .with_target(true)
                        .with_timer(fmt::time::SystemTime)
                        .with_writer(std::io::stdout),
                )
                .init();
        }
        config::LogFormat::Pretty => {
            registry
                .with(
                    fmt::layer()
                        .pretty()
                        .with_target(true)
                        .with_writer(std::io::stdout),
                )
                .init();
        }
    }
}

/// Request id, tracing and CORS layers around the API router.
fn with_layers(router: Router, cfg: &config::Config) -> Router {
    let x_request_id = axum::http::HeaderName::from_static("x-request-id");

    let router = router
        .layer(PropagateRequestIdLayer::new(x_request_id.clone()))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
                let request_id = request
                    .headers()
                    .get("x-request-id")
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("-");
                tracing::info_span!(
                    "http_request",
                    method = %request.method(),
                    uri = %request.uri(),
                    request_id = %request_id,
                )
            }),
        )
        .layer(SetRequestIdLayer::new(x_request_id, MakeRequestUuid));

    // CORS - already validated in Config::from_env()
    let cors = if cfg.cors_allow_origin == HeaderValue::from_static("*") {
        CorsLayer::permissive()
    } else {
        CorsLayer::new()
            .allow_origin(AllowOrigin::list([cfg.cors_allow_origin.clone()]))
            .allow_methods([
                axum::http::Method::GET,
                axum::http::Method::POST,
                axum::http::Method::PUT,
                axum::http::Method::DELETE,
                axum::http::Method::OPTIONS,
            ])
            .allow_headers([axum::http::header::CONTENT_TYPE])
    };
    router.layer(cors)
}

// Construct the repository bundle based on config and feature flags.
fn build_repositories(cfg: &config::Config) -> Result<Repositories, CoreError> {
    match cfg.storage_provider {
        #[cfg(feature = "sqlite")]
        config::StorageProvider::Sqlite => {
            use sqlite_adapter::{
                SqliteDb, SqliteExternalServiceRepo, SqliteForecastProviderRepo,
                SqliteNotifierRepo, SqliteOptimizationUnitRepo, SqliteSettingsRepo,
            };
            let db = SqliteDb::new(&cfg.db_path)?;
            info!(path = %db.path().display(), "using sqlite storage");
            Ok(Repositories {
                external_services: Arc::new(SqliteExternalServiceRepo::new(db.clone())?),
                forecast_providers: Arc::new(SqliteForecastProviderRepo::new(db.clone())?),
                notifiers: Arc::new(SqliteNotifierRepo::new(db.clone())?),
                optimization_units: Arc::new(SqliteOptimizationUnitRepo::new(db.clone())?),
                settings: Arc::new(SqliteSettingsRepo::new(db)?),
            })
        }
        #[cfg(not(feature = "sqlite"))]
        config::StorageProvider::Sqlite => Err(CoreError::repository(
            domain::EntityKind::Settings,
            "STORAGE_PROVIDER=sqlite requires the `sqlite` feature",
        )),
        config::StorageProvider::Memory => {
            info!("using in-memory storage");
            Ok(Repositories::in_memory())
        }
    }
}

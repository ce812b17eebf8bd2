//! HTTP server of the collector
//!
//! Agents push their reports to `/collector`; everything under `/api/v1` is a
//! read-only view of the store and may be guarded by a bearer token.
//!
//! ## Endpoints
//!
//! - `POST /collector` - Submit an agent report
//! - `GET /api/v1/health` - Health check
//! - `GET /api/v1/stats` - Store and ingestion statistics
//! - `GET /api/v1/hosts` - List known hosts
//! - `GET /api/v1/hosts/:id` - One host with its service groups
//! - `GET /api/v1/hosts/:id/services` - Services of a host
//! - `GET /api/v1/hosts/:id/events` - Recent events of a host
//! - `GET /api/v1/services/:id/statistics` - Metric points of a service
//! - `GET /api/v1/events` - Events across hosts, paged
//! - `GET /api/v1/dashboard` - Fleet-wide counts and newest active events

pub mod error;
pub mod middleware;
pub mod routes;
pub mod state;
pub mod types;

pub use error::{ApiError, ApiResult};
pub use state::ApiState;
pub use types::{
    DashboardResponse, EventListResponse, EventsResponse, HealthResponse, HostDetailResponse,
    HostsResponse, ServicesResponse, StatisticsResponse, StatsResponse,
};

use std::net::SocketAddr;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::config::Config;

/// API server configuration
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Bind address (e.g., "0.0.0.0:3001")
    pub bind_addr: SocketAddr,

    /// Optional authentication token for `/api/v1`
    pub auth_token: Option<String>,

    /// Enable CORS for dashboards
    pub enable_cors: bool,

    /// Largest accepted report body
    pub max_payload_bytes: usize,
}

impl From<&Config> for ApiConfig {
    fn from(config: &Config) -> Self {
        Self {
            bind_addr: SocketAddr::new(config.listen.address, config.listen.port),
            auth_token: config.api.auth_token.clone(),
            enable_cors: config.api.enable_cors,
            max_payload_bytes: config.ingest.max_payload_bytes,
        }
    }
}

/// Build the router without binding it
pub fn router(config: &ApiConfig, state: ApiState) -> Router {
    let mut api = Router::new()
        .route("/api/v1/health", get(routes::health::health_check))
        .route("/api/v1/stats", get(routes::stats::get_stats))
        .route("/api/v1/hosts", get(routes::hosts::list_hosts))
        .route("/api/v1/hosts/:id", get(routes::hosts::get_host))
        .route(
            "/api/v1/hosts/:id/services",
            get(routes::hosts::get_host_services),
        )
        .route(
            "/api/v1/hosts/:id/events",
            get(routes::hosts::get_host_events),
        )
        .route(
            "/api/v1/services/:id/statistics",
            get(routes::services::get_service_statistics),
        )
        .route("/api/v1/events", get(routes::events::list_events))
        .route("/api/v1/dashboard", get(routes::events::dashboard));

    // Agents authenticate through their own credentials, not the API token
    if let Some(token) = config.auth_token.clone() {
        api = api.layer(axum::middleware::from_fn_with_state(
            token,
            middleware::auth::auth_middleware,
        ));
    }

    let collector = Router::new()
        .route("/collector", post(routes::collector::submit_report))
        .layer(DefaultBodyLimit::max(config.max_payload_bytes));

    let mut app = Router::new()
        .merge(collector)
        .merge(api)
        .with_state(state)
        .layer(TraceLayer::new_for_http());

    if config.enable_cors {
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);
        app = app.layer(cors);
    }

    app
}

/// Spawn the API server
///
/// This starts an Axum HTTP server in a background task.
/// Returns the server's local address.
pub async fn spawn_api_server(config: ApiConfig, state: ApiState) -> anyhow::Result<SocketAddr> {
    info!("starting collector on {}", config.bind_addr);

    let app = router(&config, state);

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    let addr = listener.local_addr()?;

    info!("collector listening on {}", addr);

    tokio::spawn(async move {
        let service = app.into_make_service_with_connect_info::<SocketAddr>();
        if let Err(e) = axum::serve(listener, service).await {
            tracing::error!("API server error: {}", e);
        }
    });

    Ok(addr)
}

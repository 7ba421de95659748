//! HTTP and WebSocket surface
//!
//! ```no_run
//! # async fn example(state: engine_relay::gateway::GatewayState) -> std::io::Result<()> {
//! let router = engine_relay::gateway::router(state);
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:8080").await?;
//! axum::serve(listener, router).await?;
//! # Ok(())
//! # }
//! ```

pub mod admin;
pub mod socket;

use crate::infrastructure::log_messages::database as db_log;
use crate::infrastructure::Database;
use crate::relay::{ConnectionRegistry, RelayService};
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{delete, get};
use axum::Router;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use tracing::warn;

/// Route paths
pub mod paths {
    pub const WEBSOCKET: &str = "/ws";
    pub const HEALTH: &str = "/health";
    pub const ADMIN_CACHE: &str = "/admin/cache";
    pub const ADMIN_CACHE_ENTRY: &str = "/admin/cache/{engine_id}";
}

/// Per-connection outbound queue depth
pub const DEFAULT_OUTBOUND_CAPACITY: usize = 256;

const MAX_REQUEST_BODY_BYTES: usize = 64 * 1024;

/// Shared handler state
#[derive(Clone)]
pub struct GatewayState {
    pub relay: Arc<RelayService>,
    pub registry: Arc<ConnectionRegistry>,
    pub outbound_capacity: usize,
    /// Probed by `/health` when present
    pub database: Option<Database>,
}

impl GatewayState {
    pub fn new(relay: Arc<RelayService>, registry: Arc<ConnectionRegistry>) -> Self {
        Self {
            relay,
            registry,
            outbound_capacity: DEFAULT_OUTBOUND_CAPACITY,
            database: None,
        }
    }

    pub fn with_database(mut self, database: Database) -> Self {
        self.database = Some(database);
        self
    }
}

pub fn router(state: GatewayState) -> Router {
    Router::new()
        .route(paths::WEBSOCKET, get(socket::upgrade))
        .route(paths::HEALTH, get(health_handler))
        .route(
            paths::ADMIN_CACHE,
            get(admin::cache_stats).delete(admin::clear_cache),
        )
        .route(paths::ADMIN_CACHE_ENTRY, delete(admin::clear_cache_entry))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(RequestBodyLimitLayer::new(MAX_REQUEST_BODY_BYTES)),
        )
        .with_state(state)
}

async fn health_handler(State(state): State<GatewayState>) -> (StatusCode, &'static str) {
    let Some(database) = &state.database else {
        return (StatusCode::OK, "OK");
    };

    match database.health_check().await {
        Ok(()) => (StatusCode::OK, "OK"),
        Err(e) => {
            warn!(error = %e, "{}", db_log::HEALTH_CHECK_FAILED);
            (StatusCode::SERVICE_UNAVAILABLE, "database unavailable")
        }
    }
}

// src/api/mod.rs
// HTTP + WebSocket surface

pub mod error;
pub mod http;
pub mod ws;

use std::sync::Arc;

use axum::{Router, middleware, routing::get};
use tower_http::trace::TraceLayer;

pub use error::{ApiError, ApiResult};

use crate::auth::require_principal;
use crate::state::AppState;

/// Full router: authenticated terminal and audit routes plus open health probes.
pub fn build_router(state: Arc<AppState>) -> Router {
    let protected = Router::new()
        .route("/api/v1/ws/ssh", get(ws::ws_ssh_handler))
        .route("/api/v1/audit", get(http::list_audit_logs))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_principal));

    Router::new()
        .merge(protected)
        .route("/health", get(http::health_check))
        .route("/live", get(http::liveness_check))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

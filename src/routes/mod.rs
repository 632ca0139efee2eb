//! HTTP ingress the MT5 expert advisor pushes its callbacks to.

pub mod mt5;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

use crate::auth::{require_api_key, ApiKey, HEALTH_PATH};
use mt5::{handle_tick, handle_trade, health_check, IngressState};

pub fn router(state: IngressState, api_key: &str) -> Router {
    Router::new()
        .route("/api/mt5/tick",  post(handle_tick))
        .route("/api/mt5/trade", post(handle_trade))
        .route(HEALTH_PATH,      get(health_check))
        // ── Middleware ────────────────────────────────────────────────────────
        .layer(middleware::from_fn_with_state(ApiKey::new(api_key), require_api_key))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

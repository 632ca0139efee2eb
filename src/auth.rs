//! # auth — API Key Middleware
//!
//! Guards the ingress routes with the `X-API-Key` header.
//!
//! ## Mode
//! - `BRIDGE_API_KEY` unset or empty → every request passes (dev mode)
//! - `BRIDGE_API_KEY` set → every request must carry `X-API-Key: <key>`
//!
//! `/api/mt5/health` is always open.
//!
//! ```bash
//! curl -H "X-API-Key: super-secret-key-here" -d '{}' http://localhost:3000/api/mt5/trade
//! ```

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use tracing::warn;

pub const HEALTH_PATH: &str = "/api/mt5/health";

/// Expected key; empty disables the check.
#[derive(Debug, Clone)]
pub struct ApiKey(Arc<str>);

impl ApiKey {
    pub fn new(key: &str) -> Self {
        Self(Arc::from(key))
    }

    fn accepts(&self, provided: &str) -> bool {
        self.0.is_empty() || provided == &*self.0
    }
}

pub async fn require_api_key(
    State(key): State<ApiKey>,
    request: Request,
    next: Next,
) -> Response {
    if request.uri().path() == HEALTH_PATH {
        return next.run(request).await;
    }

    let provided = request
        .headers()
        .get("X-API-Key")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    if key.accepts(provided) {
        next.run(request).await
    } else {
        let path = request.uri().path();
        warn!(path, "❌ Unauthorized request — invalid or missing X-API-Key");
        (
            StatusCode::UNAUTHORIZED,
            Json(serde_json::json!({
                "ok":    false,
                "error": "Unauthorized: invalid or missing X-API-Key header",
            })),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_key_accepts_anything() {
        assert!(ApiKey::new("").accepts(""));
        assert!(ApiKey::new("").accepts("whatever"));
    }

    #[test]
    fn configured_key_must_match_exactly() {
        let key = ApiKey::new("s3cret");
        assert!(key.accepts("s3cret"));
        assert!(!key.accepts(""));
        assert!(!key.accepts("s3cret "));
    }
}

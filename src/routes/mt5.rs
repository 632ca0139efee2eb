//! # routes::mt5
//!
//! Axum route handlers for the **MetaTrader 5 interface**.
//!
//! ## Endpoints
//!
//! | Method | Path              | Description                                    |
//! |--------|-------------------|------------------------------------------------|
//! | POST   | `/api/mt5/tick`   | New quote → `TickArrived`                      |
//! | POST   | `/api/mt5/trade`  | Position set changed → `TradeChanged`          |
//! | GET    | `/api/mt5/health` | Current session status snapshot                |
//!
//! Handlers only enqueue events; all work happens on the control loop.

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::json;
use tokio::sync::{mpsc, watch};
use tracing::{debug, warn};

use crate::{error::ApiError, events::BridgeEvent, models::Quote, state::BridgeStatus};

#[derive(Clone)]
pub struct IngressState {
    pub events: mpsc::Sender<BridgeEvent>,
    pub status: watch::Receiver<BridgeStatus>,
    pub symbol: String,
}

// ─── POST /api/mt5/tick ───────────────────────────────────────────────────────

/// Called by the EA on every price update. Must return quickly.
///
/// ### Request body (JSON)
/// ```json
/// { "symbol": "EURUSD", "bid": 1.10012, "ask": 1.10027, "spread": 15,
///   "volume": 0, "time": "2025-01-01T12:00:00Z" }
/// ```
///
/// ### Response
/// * `200 OK` `{ "ok": true, "queued": true | false }`: `false` means the
///   loop is backlogged and the tick was dropped.
/// * `400` for a quote of another symbol, `503` once the loop has stopped.
pub async fn handle_tick(
    State(state): State<IngressState>,
    Json(quote): Json<Quote>,
) -> Result<impl IntoResponse, ApiError> {
    if quote.symbol != state.symbol {
        return Err(ApiError::BadRequest(format!(
            "session trades {}, got a quote for {}",
            state.symbol, quote.symbol
        )));
    }

    let queued = match state.events.try_send(BridgeEvent::TickArrived(quote)) {
        Ok(()) => true,
        Err(mpsc::error::TrySendError::Full(_)) => {
            debug!("Event queue full — tick dropped at ingress");
            false
        }
        Err(mpsc::error::TrySendError::Closed(_)) => {
            return Err(ApiError::Unavailable("control loop stopped".into()));
        }
    };

    Ok((StatusCode::OK, Json(json!({ "ok": true, "queued": queued }))))
}

// ─── POST /api/mt5/trade ──────────────────────────────────────────────────────

/// Called by the EA from `OnTrade`. The body is ignored; the loop re-reads
/// order history itself.
pub async fn handle_trade(State(state): State<IngressState>) -> Result<impl IntoResponse, ApiError> {
    state.events.send(BridgeEvent::TradeChanged).await.map_err(|_| {
        warn!("Trade change arrived after the control loop stopped");
        ApiError::Unavailable("control loop stopped".into())
    })?;

    Ok(Json(json!({ "ok": true })))
}

// ─── GET /api/mt5/health ──────────────────────────────────────────────────────

pub async fn health_check(State(state): State<IngressState>) -> impl IntoResponse {
    let status = state.status.borrow().clone();
    Json(json!({
        "ok":     true,
        "status": status,
    }))
}

//! # host::mt5
//!
//! **MT5 Desk** — order management through the expert advisor's HTTP adapter.
//!
//! ## MT5 EA API Contract (MQL5 side)
//! ```text
//! POST /order/send          → { "retcode": 10009, "order": 123456, "comment": "Request completed" }
//! GET  /positions?symbol=X  → [ { "ticket", "symbol", "magic", "lots", "open_price" } ]
//! GET  /history?symbol=X    → [ { "ticket", "symbol", "magic", "close_time", "close_price", "profit", "comment" } ]
//! ```
//! retcode 10009 = `TRADE_RETCODE_DONE`, the only success.

use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use tracing::{error, info, warn};

use super::{OrderDesk, OrderRequest};
use crate::config::Config;
use crate::error::BridgeError;
use crate::models::{HistoricalPosition, OpenPosition, Ticket};

/// `TRADE_RETCODE_DONE`
pub const RETCODE_DONE: u32 = 10009;

/// Response from `/order/send`.
#[derive(Debug, serde::Deserialize)]
pub struct Mt5OrderResponse {
    pub retcode: u32,
    /// Ticket, present when `retcode == 10009`.
    pub order:   Option<Ticket>,
    pub comment: Option<String>,
}

pub struct Mt5Desk {
    client:   reqwest::Client,
    base_url: String,
    timeout:  Duration,
}

impl Mt5Desk {
    pub fn new(config: &Config) -> Self {
        Self {
            client:   reqwest::Client::new(),
            base_url: config.mt5_base_url.clone(),
            timeout:  config.request_timeout,
        }
    }

    async fn get_list<T: DeserializeOwned>(
        &self,
        resource: &str,
        symbol: &str,
    ) -> Result<Vec<T>, BridgeError> {
        let url = format!("{}/{resource}", self.base_url);

        let response = self
            .client
            .get(&url)
            .query(&[("symbol", symbol)])
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| BridgeError::Network(format!("MT5 {resource}: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(BridgeError::Network(format!("MT5 {resource}: HTTP {status}: {body}")));
        }

        response
            .json()
            .await
            .map_err(|e| BridgeError::Network(format!("MT5 {resource}: bad body: {e}")))
    }
}

#[async_trait]
impl OrderDesk for Mt5Desk {
    async fn submit(&self, order: &OrderRequest) -> Result<Ticket, BridgeError> {
        let url = format!("{}/order/send", self.base_url);

        info!(
            symbol  = %order.symbol,
            action  = %order.action,
            volume  = order.volume,
            price   = order.price,
            sl      = order.sl,
            tp      = order.tp,
            mt5_url = %url,
            "🚀 [EXECUTOR] Sending order to MT5"
        );

        // ── HTTP POST ─────────────────────────────────────────────────────────
        let response = self
            .client
            .post(&url)
            .json(order)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| {
                error!(error = %e, "MT5 unreachable");
                BridgeError::Execution(format!("MT5 unreachable: {e}"))
            })?;

        // ── HTTP Status ───────────────────────────────────────────────────────
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            error!(http_status = %status, body = %body, "MT5 returned HTTP error");
            return Err(BridgeError::Execution(format!("MT5 HTTP {status}: {body}")));
        }

        // ── Parse Response ────────────────────────────────────────────────────
        let mt5_resp: Mt5OrderResponse = response.json().await.map_err(|e| {
            error!(error = %e, "MT5 response parse failed");
            BridgeError::Execution(format!("MT5 response parse error: {e}"))
        })?;

        // ── Check retcode ─────────────────────────────────────────────────────
        if mt5_resp.retcode != RETCODE_DONE {
            let msg = format!(
                "MT5 rejected: retcode={} comment={}",
                mt5_resp.retcode,
                mt5_resp.comment.as_deref().unwrap_or("unknown")
            );
            warn!("{msg}");
            return Err(BridgeError::Execution(msg));
        }

        let ticket = mt5_resp
            .order
            .ok_or_else(|| BridgeError::Execution("MT5 reported success without a ticket".into()))?;

        info!(ticket, "✅ [EXECUTOR] MT5 accepted order");
        Ok(ticket)
    }

    async fn open_positions(&self, symbol: &str) -> Result<Vec<OpenPosition>, BridgeError> {
        self.get_list("positions", symbol).await
    }

    async fn history(&self, symbol: &str) -> Result<Vec<HistoricalPosition>, BridgeError> {
        self.get_list("history", symbol).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Direction;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn desk_for(server: &MockServer) -> Mt5Desk {
        let config = Config {
            mt5_base_url:    server.uri(),
            request_timeout: Duration::from_millis(500),
            ..Config::default()
        };
        Mt5Desk::new(&config)
    }

    fn order() -> OrderRequest {
        OrderRequest {
            symbol:  "EURUSD".into(),
            action:  Direction::Buy,
            volume:  0.01,
            price:   1.10012,
            sl:      1.0990,
            tp:      1.1030,
            comment: "SYNC|0.80".into(),
            magic:   420001,
        }
    }

    #[tokio::test]
    async fn done_retcode_returns_ticket() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/order/send"))
            .and(body_partial_json(json!({ "action": "BUY", "magic": 420001 })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "retcode": 10009, "order": 5551, "comment": "Request completed",
            })))
            .mount(&server)
            .await;

        assert_eq!(desk_for(&server).submit(&order()).await.unwrap(), 5551);
    }

    #[tokio::test]
    async fn other_retcode_is_an_execution_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/order/send"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "retcode": 10019, "comment": "No money",
            })))
            .mount(&server)
            .await;

        let err = desk_for(&server).submit(&order()).await.unwrap_err();
        assert!(matches!(err, BridgeError::Execution(msg) if msg.contains("10019")));
    }

    #[tokio::test]
    async fn history_is_fetched_per_symbol() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/history"))
            .and(query_param("symbol", "EURUSD"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                { "ticket": 9, "symbol": "EURUSD", "magic": 420001,
                  "close_time": 100.0, "close_price": 1.1, "profit": 2.0 },
            ])))
            .mount(&server)
            .await;

        let history = desk_for(&server).history("EURUSD").await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].ticket, 9);
        assert_eq!(history[0].comment, "");
    }
}

//! # backend — Remote decision service client
//!
//! | Method | Path           | Used by                   |
//! |--------|----------------|---------------------------|
//! | GET    | `/api/health`  | ConnectionHealthMonitor   |
//! | POST   | `/api/ticks`   | TickUploader              |
//! | GET    | `/api/signals` | SignalPoller              |
//! | POST   | `/api/trades`  | ReportOutbox (open/close) |
//!
//! Every call carries the bearer token (when configured) and the fixed
//! request timeout. Transport failures and non-2xx statuses come back as
//! [`BridgeError::Network`]; a 2xx returns the raw body text and the caller
//! decides what an acceptable body looks like.

use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use crate::config::Config;
use crate::error::BridgeError;
use crate::models::{Tick, TickUpload, TradeReport};

#[async_trait]
pub trait Backend: Send + Sync {
    async fn health(&self) -> Result<String, BridgeError>;

    async fn upload_ticks(&self, symbol: &str, ticks: &[Tick]) -> Result<String, BridgeError>;

    async fn fetch_signal(&self) -> Result<String, BridgeError>;

    async fn report_trade(&self, report: &TradeReport) -> Result<String, BridgeError>;
}

// ─── reqwest implementation ───────────────────────────────────────────────────

pub struct HttpBackend {
    client:   reqwest::Client,
    base_url: String,
    api_key:  String,
    timeout:  Duration,
}

impl HttpBackend {
    pub fn new(config: &Config) -> Self {
        Self {
            client:   reqwest::Client::new(),
            base_url: config.backend_url.clone(),
            api_key:  config.backend_api_key.clone(),
            timeout:  config.request_timeout,
        }
    }

    async fn send(
        &self,
        request: reqwest::RequestBuilder,
        what: &'static str,
    ) -> Result<String, BridgeError> {
        let request = if self.api_key.is_empty() {
            request
        } else {
            request.bearer_auth(&self.api_key)
        };

        let response = request
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| BridgeError::Network(format!("{what}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BridgeError::Network(format!("{what}: HTTP {status}: {body}")));
        }

        let body = response
            .text()
            .await
            .map_err(|e| BridgeError::Network(format!("{what}: reading body: {e}")))?;

        debug!(what, bytes = body.len(), "backend responded");
        Ok(body)
    }
}

#[async_trait]
impl Backend for HttpBackend {
    async fn health(&self) -> Result<String, BridgeError> {
        let url = format!("{}/api/health", self.base_url);
        self.send(self.client.get(url), "health").await
    }

    async fn upload_ticks(&self, symbol: &str, ticks: &[Tick]) -> Result<String, BridgeError> {
        let url = format!("{}/api/ticks", self.base_url);
        let body = TickUpload { symbol, ticks };
        self.send(self.client.post(url).json(&body), "upload ticks").await
    }

    async fn fetch_signal(&self) -> Result<String, BridgeError> {
        let url = format!("{}/api/signals", self.base_url);
        self.send(self.client.get(url), "fetch signal").await
    }

    async fn report_trade(&self, report: &TradeReport) -> Result<String, BridgeError> {
        let url = format!("{}/api/trades", self.base_url);
        self.send(self.client.post(url).json(report), "report trade").await
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TradeClose;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn backend_for(server: &MockServer, api_key: &str) -> HttpBackend {
        let config = Config {
            backend_url:     server.uri(),
            backend_api_key: api_key.to_string(),
            request_timeout: Duration::from_millis(500),
            ..Config::default()
        };
        HttpBackend::new(&config)
    }

    #[tokio::test]
    async fn uploads_ticks_with_bearer_token() {
        let server = MockServer::start().await;
        let ticks = [Tick { timestamp: 1.5, bid: 1.1, ask: 1.1002, spread: 20.0, volume: 3 }];

        Mock::given(method("POST"))
            .and(path("/api/ticks"))
            .and(header("authorization", "Bearer secret"))
            .and(body_json(json!({
                "symbol": "EURUSD",
                "ticks": [{ "timestamp": 1.5, "bid": 1.1, "ask": 1.1002, "spread": 20.0, "volume": 3 }],
            })))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"status":"success"}"#))
            .expect(1)
            .mount(&server)
            .await;

        let body = backend_for(&server, "secret").upload_ticks("EURUSD", &ticks).await.unwrap();
        assert!(body.contains("success"));
    }

    #[tokio::test]
    async fn non_success_status_is_a_network_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/signals"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let err = backend_for(&server, "").fetch_signal().await.unwrap_err();
        assert!(matches!(err, BridgeError::Network(msg) if msg.contains("500")));
    }

    #[tokio::test]
    async fn slow_response_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/health"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string("healthy")
                    .set_delay(Duration::from_secs(2)),
            )
            .mount(&server)
            .await;

        let err = backend_for(&server, "").health().await.unwrap_err();
        assert!(matches!(err, BridgeError::Network(_)));
    }

    #[tokio::test]
    async fn close_report_posts_bare_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/trades"))
            .and(body_json(json!({
                "ticket": 77, "close_price": 1.2, "profit": -3.5,
                "close_time": 10.0, "comment": "sl",
            })))
            .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
            .expect(1)
            .mount(&server)
            .await;

        let report = TradeReport::Closed(TradeClose {
            ticket:      77,
            close_price: 1.2,
            profit:      -3.5,
            close_time:  10.0,
            comment:     "sl".into(),
        });
        assert_eq!(backend_for(&server, "").report_trade(&report).await.unwrap(), "ok");
    }
}

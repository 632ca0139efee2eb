//! # engine::health
//!
//! **Connection Health Monitor** — `GET /api/health` at attach, then again
//! every `HEALTH_RECHECK_SECS` for as long as the session is not connected.
//!
//! The backend answers `{"status": "healthy", ...}`. A bare `healthy` / `ok`
//! body is accepted as well.

use std::time::Duration;

use tracing::{info, warn};

use crate::backend::Backend;
use crate::engine::parser::FieldExtractor;
use crate::error::BridgeError;
use crate::state::{ConnectionState, Session};

const HEALTHY_TOKENS: [&str; 2] = ["healthy", "ok"];

fn is_healthy_token(raw: &str) -> bool {
    let raw = raw.trim().trim_matches('"').trim();
    HEALTHY_TOKENS.iter().any(|t| raw.eq_ignore_ascii_case(t))
}

/// `true` when a health response body reports the service healthy.
pub fn is_healthy(body: &str) -> bool {
    let body = body.trim();
    if body.is_empty() {
        return false;
    }
    match FieldExtractor::new(body).text("status") {
        Ok(Some(status)) => is_healthy_token(&status),
        _ => is_healthy_token(body),
    }
}

#[derive(Debug, Clone)]
pub struct ConnectionHealthMonitor {
    recheck_ms: Option<u64>,
}

impl ConnectionHealthMonitor {
    /// `None` disables the periodic re-check; attach still checks once.
    pub fn new(recheck: Option<Duration>) -> Self {
        Self {
            recheck_ms: recheck.map(|d| d.as_millis() as u64),
        }
    }

    pub fn recheck_due(&self, session: &Session, now_ms: u64) -> bool {
        let Some(every) = self.recheck_ms else {
            return false;
        };
        if session.connection == ConnectionState::Connected {
            return false;
        }
        session
            .last_health_ms
            .map_or(true, |last| now_ms.saturating_sub(last) >= every)
    }

    pub async fn check_health(
        &self,
        session: &mut Session,
        backend: &dyn Backend,
        now_ms: u64,
    ) -> ConnectionState {
        session.last_health_ms = Some(now_ms);

        let verdict = match backend.health().await {
            Ok(body) if is_healthy(&body) => Ok(()),
            Ok(body) => Err(BridgeError::Network(format!("health: unexpected body {body:?}"))),
            Err(e) => Err(e),
        };

        match verdict {
            Ok(()) => {
                session.mark_reachable();
                info!("💚 Backend healthy");
            }
            Err(e) => {
                warn!(error = %e, connection = ?session.connection, "Backend health check failed");
                session.mark_unreachable(&e);
            }
        }
        session.connection
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::fake::FakeBackend;

    #[test]
    fn recognises_healthy_bodies() {
        assert!(is_healthy(r#"{"status": "healthy", "timestamp": "2025-01-01T00:00:00"}"#));
        assert!(is_healthy(r#"{"status":"OK"}"#));
        assert!(is_healthy("healthy"));
        assert!(!is_healthy(r#"{"status":"degraded"}"#));
        assert!(!is_healthy(""));
        assert!(!is_healthy("<html>maintenance</html>"));
    }

    #[tokio::test]
    async fn startup_failure_stays_offline() {
        let backend = FakeBackend::new();
        backend.with(|s| s.health = None);
        let monitor = ConnectionHealthMonitor::new(Some(Duration::from_secs(60)));
        let mut session = Session::new("EURUSD", 10);

        let state = monitor.check_health(&mut session, &backend, 0).await;
        assert_eq!(state, ConnectionState::Offline);
        assert_eq!(session.last_health_ms, Some(0));
    }

    #[tokio::test]
    async fn recheck_only_while_disconnected() {
        let backend = FakeBackend::new();
        let monitor = ConnectionHealthMonitor::new(Some(Duration::from_secs(60)));
        let mut session = Session::new("EURUSD", 10);
        session.last_health_ms = Some(0);

        assert!(!monitor.recheck_due(&session, 59_999));
        assert!(monitor.recheck_due(&session, 60_000));

        monitor.check_health(&mut session, &backend, 60_000).await;
        assert_eq!(session.connection, ConnectionState::Connected);
        assert!(!monitor.recheck_due(&session, 500_000));
    }

    #[test]
    fn disabled_recheck_is_never_due() {
        let monitor = ConnectionHealthMonitor::new(None);
        let session = Session::new("EURUSD", 10);
        assert!(!monitor.recheck_due(&session, u64::MAX));
    }
}

//! # engine::uploader
//!
//! **Tick Uploader** — ships the session batch to `POST /api/ticks`.
//!
//! Due when the batch is full or when `flush_interval` has passed since the
//! last successful flush, whichever comes first. An empty batch is never
//! sent. The batch is cleared only after the backend answers 2xx with a
//! non-empty body; on any failure it is left exactly as it was and the next
//! trigger tries again.

use std::time::Duration;

use tracing::{debug, info};

use crate::backend::Backend;
use crate::error::BridgeError;
use crate::state::Session;

#[derive(Debug, Clone)]
pub struct TickUploader {
    flush_interval_ms: u64,
}

impl TickUploader {
    pub fn new(flush_interval: Duration) -> Self {
        Self {
            flush_interval_ms: flush_interval.as_millis() as u64,
        }
    }

    pub fn is_due(&self, session: &Session, now_ms: u64) -> bool {
        if session.batch.is_empty() {
            return false;
        }
        session.batch.is_full()
            || now_ms.saturating_sub(session.last_flush_ms) >= self.flush_interval_ms
    }

    /// Uploads the whole batch. Returns the number of ticks accepted.
    pub async fn flush(
        &self,
        session: &mut Session,
        backend: &dyn Backend,
        now_ms: u64,
    ) -> Result<usize, BridgeError> {
        if session.batch.is_empty() {
            return Ok(0);
        }

        let sent = session.batch.len();
        debug!(sent, "📤 Uploading tick batch");

        let body = backend.upload_ticks(&session.symbol, session.batch.ticks()).await?;
        if body.trim().is_empty() {
            return Err(BridgeError::Network("upload ticks: empty response body".into()));
        }

        session.batch.clear();
        session.last_flush_ms = now_ms;
        session.stats.ticks_uploaded += sent as u64;
        info!(sent, "✅ Tick batch accepted");
        Ok(sent)
    }
}

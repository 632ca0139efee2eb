//! # engine::poller
//!
//! **Signal Poller** — asks `GET /api/signals` for a pending instruction on
//! every poll tick and decodes the answer.
//!
//! The backend keeps serving its latest signal until a new one replaces it,
//! so the poller remembers the fingerprint of the last signal it handed out
//! and reports a re-served one as "no signal". Each instruction is therefore
//! attempted at most once.

use tracing::{debug, info};

use crate::backend::Backend;
use crate::engine::parser::{FieldExtractor, ParseError};
use crate::error::BridgeError;
use crate::models::Signal;
use crate::state::Session;

/// Reserved token the backend sends when nothing is pending.
pub const NO_SIGNAL: &str = "no_signal";

#[derive(Debug)]
pub enum PollOutcome {
    Signal(Signal),
    NoSignal,
    /// Always [`BridgeError::Parse`]. Treated like [`PollOutcome::NoSignal`].
    Malformed(BridgeError),
    /// Treated like [`PollOutcome::NoSignal`], but degrades connectivity.
    TransportFailed(BridgeError),
}

/// Decodes one `/api/signals` body. `Ok(None)` means nothing is pending.
pub fn decode(body: &str) -> Result<Option<Signal>, ParseError> {
    let body = body.trim();
    if body.is_empty() || body.trim_matches('"') == NO_SIGNAL {
        return Ok(None);
    }

    let fields = FieldExtractor::new(body);
    if fields.text("status")?.as_deref() == Some(NO_SIGNAL) {
        return Ok(None);
    }

    let direction = fields
        .text("direction")?
        .ok_or_else(|| ParseError::MissingField("direction".into()))?;

    Ok(Some(Signal {
        direction,
        entry_price: fields.number("entry_price")?,
        stop_loss:   fields.number("sl")?,
        take_profit: fields.number("tp")?,
        confidence:  fields.number_or("confidence", 0.0)?,
        timestamp:   fields.text("timestamp")?,
    }))
}

#[derive(Debug, Clone, Default)]
pub struct SignalPoller;

impl SignalPoller {
    pub async fn poll(&self, session: &mut Session, backend: &dyn Backend) -> PollOutcome {
        let body = match backend.fetch_signal().await {
            Ok(body) => body,
            Err(e) => return PollOutcome::TransportFailed(e),
        };

        let signal = match decode(&body) {
            Ok(Some(signal)) => signal,
            Ok(None) => return PollOutcome::NoSignal,
            Err(e) => return PollOutcome::Malformed(BridgeError::from(e)),
        };

        let fingerprint = signal.timestamp.clone().unwrap_or_else(|| body.trim().to_string());
        if session.last_signal.as_deref() == Some(fingerprint.as_str()) {
            debug!("Signal already handled — ignoring re-served copy");
            return PollOutcome::NoSignal;
        }
        session.last_signal = Some(fingerprint);
        session.stats.signals_received += 1;

        info!(
            direction  = %signal.direction,
            entry      = signal.entry_price,
            sl         = signal.stop_loss,
            tp         = signal.take_profit,
            confidence = signal.confidence,
            "📡 Signal received"
        );
        PollOutcome::Signal(signal)
    }
}

//! # state
//!
//! [`Session`] is the one context object the control loop owns: tick batch,
//! close watermark, connectivity, timers and counters. Every component call
//! receives it explicitly; nothing else holds mutable bridge state.
//!
//! A read-only [`BridgeStatus`] snapshot is published after every event so
//! the ingress health route can answer without touching the session.

use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::BridgeError;
use crate::models::{Quote, TickBatch, Ticket};

// ─── ConnectionState ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConnectionState {
    /// Never reached the backend (startup health check failed).
    Offline,
    Connected,
    /// Was connected, the last exchange failed.
    Degraded,
}

// ─── Watermark ────────────────────────────────────────────────────────────────

/// Highest ticket already reported as closed. Only ever moves up.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct Watermark(Ticket);

impl Watermark {
    pub fn new(ticket: Ticket) -> Self {
        Self(ticket)
    }

    #[inline]
    pub fn get(&self) -> Ticket {
        self.0
    }

    /// Raises the watermark to `ticket`; lower values are ignored.
    pub fn advance(&mut self, ticket: Ticket) {
        self.0 = self.0.max(ticket);
    }
}

// ─── Counters ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SessionStats {
    pub ticks_seen:       u64,
    pub ticks_dropped:    u64,
    pub ticks_uploaded:   u64,
    pub signals_received: u64,
    pub signals_rejected: u64,
    pub orders_filled:    u64,
    pub orders_failed:    u64,
    pub closes_reported:  u64,
}

// ─── Session ──────────────────────────────────────────────────────────────────

pub struct Session {
    pub id:         Uuid,
    pub symbol:     String,
    pub batch:      TickBatch,
    /// `None` until derived from order history.
    pub watermark:  Option<Watermark>,
    pub connection: ConnectionState,
    /// Monotonic ms of the last successful flush (or of attach).
    pub last_flush_ms: u64,
    /// Monotonic ms of the last health check, if any.
    pub last_health_ms: Option<u64>,
    /// Wall time (unix seconds) the session attached.
    pub attached_at:  f64,
    pub latest_quote: Option<Quote>,
    /// Fingerprint of the last signal taken off the wire.
    pub last_signal:  Option<String>,
    pub stats:        SessionStats,
}

impl Session {
    pub fn new(symbol: &str, capacity: usize) -> Self {
        Self {
            id:             Uuid::new_v4(),
            symbol:         symbol.to_string(),
            batch:          TickBatch::new(capacity),
            watermark:      None,
            connection:     ConnectionState::Offline,
            last_flush_ms:  0,
            last_health_ms: None,
            attached_at:    0.0,
            latest_quote:   None,
            last_signal:    None,
            stats:          SessionStats::default(),
        }
    }

    /// Drops everything tied to the previous attachment.
    pub fn reset(&mut self, now_ms: u64, wall_secs: f64) {
        self.batch.clear();
        self.watermark = None;
        self.connection = ConnectionState::Offline;
        self.last_flush_ms = now_ms;
        self.last_health_ms = None;
        self.attached_at = wall_secs;
        self.latest_quote = None;
        self.last_signal = None;
        self.stats = SessionStats::default();
    }

    /// Records a successful exchange with the backend.
    pub fn mark_reachable(&mut self) {
        if self.connection != ConnectionState::Connected {
            info!(previous = ?self.connection, "🔌 Backend reachable — connection restored");
            self.connection = ConnectionState::Connected;
        }
    }

    /// Records a failed exchange with the backend.
    pub fn mark_unreachable(&mut self, error: &BridgeError) {
        if self.connection == ConnectionState::Connected {
            warn!(error = %error, "⚠️ Backend exchange failed — connection degraded");
            self.connection = ConnectionState::Degraded;
        }
    }

    pub fn status(&self) -> BridgeStatus {
        BridgeStatus {
            session_id:  self.id,
            symbol:      self.symbol.clone(),
            connection:  self.connection,
            batch_len:   self.batch.len(),
            batch_cap:   self.batch.capacity(),
            watermark:   self.watermark.map(|w| w.get()),
            has_quote:   self.latest_quote.is_some(),
            stats:       self.stats,
        }
    }
}

// ─── Status snapshot ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BridgeStatus {
    pub session_id: Uuid,
    pub symbol:     String,
    pub connection: ConnectionState,
    pub batch_len:  usize,
    pub batch_cap:  usize,
    pub watermark:  Option<Ticket>,
    pub has_quote:  bool,
    pub stats:      SessionStats,
}

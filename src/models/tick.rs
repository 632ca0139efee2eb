//! # models::tick
//!
//! [`Quote`] is the raw market pulse MetaTrader 5 pushes to the bridge on
//! every price update. [`Tick`] is the immutable snapshot the collector keeps
//! in a [`TickBatch`] until the uploader ships it to the backend.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::unix_seconds;

// ─── Quote ────────────────────────────────────────────────────────────────────

/// Current quote for the session symbol, mirroring the MQL5 `MqlTick` fields
/// the expert advisor forwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    /// Trading symbol, e.g. `"EURUSD"`.
    pub symbol: String,
    pub bid: f64,
    pub ask: f64,
    /// Spread in points, as reported by the terminal.
    pub spread: f64,
    /// Tick volume (0 for most Forex quotes).
    #[serde(default)]
    pub volume: u64,
    /// Terminal time of the quote. Defaults to arrival time when omitted.
    #[serde(default = "Utc::now")]
    pub time: DateTime<Utc>,
}

// ─── Tick ─────────────────────────────────────────────────────────────────────

/// One timestamped market quote as uploaded to `/api/ticks`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Tick {
    /// Unix seconds.
    pub timestamp: f64,
    pub bid: f64,
    pub ask: f64,
    pub spread: f64,
    pub volume: u64,
}

impl Tick {
    pub fn from_quote(quote: &Quote) -> Self {
        Self {
            timestamp: unix_seconds(quote.time),
            bid:       quote.bid,
            ask:       quote.ask,
            spread:    quote.spread,
            volume:    quote.volume,
        }
    }
}

// ─── TickBatch ────────────────────────────────────────────────────────────────

/// Ordered, capacity-bounded buffer of ticks awaiting upload.
///
/// `len()` never exceeds `capacity()`: [`TickBatch::try_push`] refuses the tick
/// instead of growing.
#[derive(Debug, Clone)]
pub struct TickBatch {
    ticks:    Vec<Tick>,
    capacity: usize,
}

impl TickBatch {
    pub fn new(capacity: usize) -> Self {
        Self {
            ticks: Vec::with_capacity(capacity),
            capacity,
        }
    }

    /// Appends `tick` unless the batch is full. Returns whether it was kept.
    pub fn try_push(&mut self, tick: Tick) -> bool {
        if self.is_full() {
            return false;
        }
        self.ticks.push(tick);
        true
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.ticks.len() >= self.capacity
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.ticks.is_empty()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.ticks.len()
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn ticks(&self) -> &[Tick] {
        &self.ticks
    }

    pub fn clear(&mut self) {
        self.ticks.clear();
    }
}

// ─── Wire body ────────────────────────────────────────────────────────────────

/// Body of `POST /api/ticks`.
#[derive(Debug, Serialize)]
pub struct TickUpload<'a> {
    pub symbol: &'a str,
    pub ticks:  &'a [Tick],
}

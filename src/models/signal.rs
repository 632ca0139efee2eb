//! # models::signal
//!
//! [`Signal`] is the trade instruction served by the remote decision service
//! on `GET /api/signals`. The bridge never produces signals itself; it only
//! decodes, validates and (at most once) executes them.

use serde::{Deserialize, Serialize};

// ─── Direction ────────────────────────────────────────────────────────────────

/// Side of a market order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Direction {
    Buy,
    Sell,
}

impl Direction {
    /// Case-insensitive `"BUY"` / `"SELL"`; anything else is not tradable.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "BUY" => Some(Self::Buy),
            "SELL" => Some(Self::Sell),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Buy => "BUY",
            Self::Sell => "SELL",
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─── Signal ───────────────────────────────────────────────────────────────────

/// A decoded instruction. Discarded after one validate/execute attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct Signal {
    /// Trimmed direction string exactly as served; see [`Signal::side`].
    pub direction:   String,
    pub entry_price: f64,
    pub stop_loss:   f64,
    pub take_profit: f64,
    pub confidence:  f64,
    /// Backend-side creation time, used to recognise a re-served signal.
    pub timestamp:   Option<String>,
}

impl Signal {
    /// The tradable side, or `None` for an unrecognised direction.
    pub fn side(&self) -> Option<Direction> {
        Direction::parse(&self.direction)
    }
}

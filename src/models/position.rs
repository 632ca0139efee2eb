//! # models::position
//!
//! Host-side position views and the trade lifecycle reports the bridge sends
//! to `POST /api/trades`.
//!
//! `OpenPosition` / `HistoricalPosition` = what the terminal tells us.
//! `TradeOpen` / `TradeClose`            = what we tell the backend.

use serde::{Deserialize, Serialize};

use crate::models::Direction;

/// Position handle assigned by the terminal. Unique and increasing per session.
pub type Ticket = u64;

// ─── Host views ───────────────────────────────────────────────────────────────

/// A position currently open in the terminal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenPosition {
    pub ticket: Ticket,
    pub symbol: String,
    /// Strategy identifier ("magic number") the order was tagged with.
    pub magic:  u64,
    #[serde(default)]
    pub lots:   f64,
    #[serde(default)]
    pub open_price: f64,
}

/// A closed position from the terminal's order history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoricalPosition {
    pub ticket:      Ticket,
    pub symbol:      String,
    pub magic:       u64,
    /// Unix seconds.
    pub close_time:  f64,
    pub close_price: f64,
    pub profit:      f64,
    #[serde(default)]
    pub comment:     String,
}

// ─── Lifecycle reports ────────────────────────────────────────────────────────

/// Open event, created when an order is filled.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TradeOpen {
    pub ticket:     Ticket,
    pub symbol:     String,
    #[serde(rename = "type")]
    pub direction:  Direction,
    pub lots:       f64,
    pub open_price: f64,
    /// Unix seconds.
    pub open_time:  f64,
    pub sl:         f64,
    pub tp:         f64,
}

/// Close event, created when close detection finds a new ticket.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TradeClose {
    pub ticket:      Ticket,
    pub close_price: f64,
    pub profit:      f64,
    /// Unix seconds.
    pub close_time:  f64,
    pub comment:     String,
}

impl From<&HistoricalPosition> for TradeClose {
    fn from(closed: &HistoricalPosition) -> Self {
        Self {
            ticket:      closed.ticket,
            close_price: closed.close_price,
            profit:      closed.profit,
            close_time:  closed.close_time,
            comment:     closed.comment.clone(),
        }
    }
}

/// Either lifecycle event. Serialises as the bare inner body.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum TradeReport {
    Opened(TradeOpen),
    Closed(TradeClose),
}

impl TradeReport {
    pub fn ticket(&self) -> Ticket {
        match self {
            Self::Opened(open) => open.ticket,
            Self::Closed(close) => close.ticket,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Opened(_) => "open",
            Self::Closed(_) => "close",
        }
    }
}

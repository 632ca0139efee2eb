//! # host — Terminal order-management capability
//!
//! The bridge never talks to the venue directly. It asks the host terminal to
//! submit market orders and to enumerate open and historical positions.
//!
//! * [`mt5::Mt5Desk`]     — HTTP adapter exposed by the MT5 expert advisor.
//! * [`paper::PaperDesk`] — in-memory fills for `MT5_BASE_URL=mock`.

pub mod mt5;
pub mod paper;

use async_trait::async_trait;
use serde::Serialize;

use crate::error::BridgeError;
use crate::models::{Direction, HistoricalPosition, OpenPosition, Ticket};

/// Market order handed to the terminal.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderRequest {
    pub symbol:  String,
    /// `"BUY"` | `"SELL"`
    pub action:  Direction,
    pub volume:  f64,
    /// Live ask (BUY) or bid (SELL) at submission.
    pub price:   f64,
    pub sl:      f64,
    pub tp:      f64,
    pub comment: String,
    /// Strategy identifier for later correlation.
    pub magic:   u64,
}

#[async_trait]
pub trait OrderDesk: Send + Sync {
    /// Submits a market order. Returns the position ticket on a fill.
    async fn submit(&self, order: &OrderRequest) -> Result<Ticket, BridgeError>;

    async fn open_positions(&self, symbol: &str) -> Result<Vec<OpenPosition>, BridgeError>;

    /// Closed positions for `symbol`, any order.
    async fn history(&self, symbol: &str) -> Result<Vec<HistoricalPosition>, BridgeError>;
}

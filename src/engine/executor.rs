//! # engine::executor
//!
//! The **Order Executor** — turns an accepted signal into a market order on
//! the terminal and builds the open report for the backend.
//!
//! ```text
//! Signal + Direction + Quote
//!     │  price  = ask (BUY) | bid (SELL)
//!     │  volume = LOT_SIZE,  sl/tp from the signal
//!     │  magic  = MAGIC_NUMBER, comment = "<ORDER_COMMENT>|<confidence>"
//!     ▼
//! OrderDesk::submit ──► ticket ──► TradeOpen
//! ```
//!
//! A failed submission is logged and dropped. The signal is not retried.

use chrono::{DateTime, Utc};
use tracing::{error, info};

use crate::config::Config;
use crate::error::BridgeError;
use crate::host::{OrderDesk, OrderRequest};
use crate::models::{unix_seconds, Direction, Quote, Signal, TradeOpen};

// ─── Executor ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct OrderExecutor {
    symbol:         String,
    lot_size:       f64,
    magic:          u64,
    comment_prefix: String,
}

impl OrderExecutor {
    pub fn new(config: &Config) -> Self {
        Self {
            symbol:         config.symbol.clone(),
            lot_size:       config.lot_size,
            magic:          config.magic,
            comment_prefix: config.order_comment.clone(),
        }
    }

    pub fn build_order(&self, signal: &Signal, side: Direction, quote: &Quote) -> OrderRequest {
        let price = match side {
            Direction::Buy => quote.ask,
            Direction::Sell => quote.bid,
        };

        OrderRequest {
            symbol:  self.symbol.clone(),
            action:  side,
            volume:  self.lot_size,
            price,
            sl:      signal.stop_loss,
            tp:      signal.take_profit,
            comment: format!("{}|{:.2}", self.comment_prefix, signal.confidence),
            magic:   self.magic,
        }
    }

    /// Submits the order and returns the open report on a fill.
    pub async fn execute(
        &self,
        desk: &dyn OrderDesk,
        signal: &Signal,
        side: Direction,
        quote: &Quote,
        now: DateTime<Utc>,
    ) -> Result<TradeOpen, BridgeError> {
        let order = self.build_order(signal, side, quote);

        let ticket = desk.submit(&order).await.map_err(|e| {
            error!(error = %e, action = %side, "❌ [EXECUTOR] Order failed");
            e
        })?;

        info!(ticket, action = %side, price = order.price, "✅ [EXECUTOR] Position opened");

        Ok(TradeOpen {
            ticket,
            symbol:     order.symbol,
            direction:  side,
            lots:       order.volume,
            open_price: order.price,
            open_time:  unix_seconds(now),
            sl:         order.sl,
            tp:         order.tp,
        })
    }
}

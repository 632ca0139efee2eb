//! Domain models shared across the bridge.

pub mod position;
pub mod signal;
pub mod tick;

use chrono::{DateTime, Utc};

pub use position::{HistoricalPosition, OpenPosition, Ticket, TradeClose, TradeOpen, TradeReport};
pub use signal::{Direction, Signal};
pub use tick::{Quote, Tick, TickBatch, TickUpload};

/// Unix seconds with millisecond precision, the time format of every wire body.
#[inline]
pub fn unix_seconds(time: DateTime<Utc>) -> f64 {
    time.timestamp_millis() as f64 / 1000.0
}

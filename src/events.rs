//! # events
//!
//! [`BridgeEvent`] — everything the control loop reacts to. The terminal's
//! callbacks arrive over HTTP ingress; the timers are driven by the loop
//! itself.

use crate::models::Quote;

#[derive(Debug, Clone, PartialEq)]
pub enum BridgeEvent {
    /// New quote for the session symbol.
    TickArrived(Quote),

    /// The terminal's position set changed (fill, close, modification).
    TradeChanged,

    /// Signal poll period elapsed.
    PollDue,

    /// Health re-check period elapsed.
    HealthDue,

    /// Detach: final flush, drain reports, stop.
    Shutdown,
}

impl BridgeEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::TickArrived(_) => "TICK_ARRIVED",
            Self::TradeChanged => "TRADE_CHANGED",
            Self::PollDue => "POLL_DUE",
            Self::HealthDue => "HEALTH_DUE",
            Self::Shutdown => "SHUTDOWN",
        }
    }
}

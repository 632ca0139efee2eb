//! # engine::validator
//!
//! **Signal Validator** — the last gate before an order reaches the terminal.
//!
//! ```text
//! decoded signal
//!     │
//!     ├─ [1] Spread          spread ≤ max_spread
//!     ├─ [2] Position count  our open positions < max_positions
//!     ├─ [3] Direction       BUY | SELL
//!     └─ [4] Price deviation BUY:  entry ≤ ask + slippage
//!                            SELL: entry ≥ bid − slippage
//! ```
//!
//! Checks short-circuit in this order. The verdict depends only on its
//! inputs, so the same signal against the same market always gets the same
//! answer. A rejected signal is never retried.

use tracing::debug;

use crate::models::{Direction, Quote, Signal};

// ─── Config ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct RiskLimits {
    /// Widest acceptable spread, in the terminal's points.
    pub max_spread:         f64,
    /// Open positions carrying our magic number must stay below this.
    pub max_positions:      usize,
    /// Max distance between the signal's entry and the live price.
    pub slippage_tolerance: f64,
}

// ─── Verdict ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum RejectReason {
    SpreadTooWide { spread: f64, max: f64 },
    TooManyPositions { open: usize, max: usize },
    UnknownDirection(String),
    PriceDeviation { direction: Direction, entry: f64, limit: f64 },
}

impl RejectReason {
    /// Short machine-friendly tag for logs and counters.
    pub fn code(&self) -> &'static str {
        match self {
            Self::SpreadTooWide { .. } => "spread",
            Self::TooManyPositions { .. } => "position_count",
            Self::UnknownDirection(_) => "direction",
            Self::PriceDeviation { .. } => "price_deviation",
        }
    }
}

impl std::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SpreadTooWide { spread, max } => {
                write!(f, "spread {spread} exceeds max {max}")
            }
            Self::TooManyPositions { open, max } => {
                write!(f, "{open} open positions, max {max}")
            }
            Self::UnknownDirection(raw) => write!(f, "unknown direction {raw:?}"),
            Self::PriceDeviation { direction: Direction::Buy, entry, limit } => {
                write!(f, "BUY entry {entry} above limit {limit}")
            }
            Self::PriceDeviation { direction: Direction::Sell, entry, limit } => {
                write!(f, "SELL entry {entry} below limit {limit}")
            }
        }
    }
}

// ─── Validator ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct SignalValidator {
    limits: RiskLimits,
}

impl SignalValidator {
    pub fn new(limits: RiskLimits) -> Self {
        Self { limits }
    }

    /// Check [1] alone. Runs before the open positions are looked up, so a
    /// wide market rejects without touching the terminal.
    pub fn check_spread(&self, quote: &Quote) -> Result<(), RejectReason> {
        if quote.spread > self.limits.max_spread {
            return Err(RejectReason::SpreadTooWide {
                spread: quote.spread,
                max:    self.limits.max_spread,
            });
        }
        Ok(())
    }

    /// Accepts with the tradable side or rejects with the first failed check.
    ///
    /// `open_positions` counts only positions tagged with this session's
    /// magic number.
    pub fn validate(
        &self,
        signal: &Signal,
        quote: &Quote,
        open_positions: usize,
    ) -> Result<Direction, RejectReason> {
        // [1] Spread
        self.check_spread(quote)?;

        // [2] Position count
        if open_positions >= self.limits.max_positions {
            return Err(RejectReason::TooManyPositions {
                open: open_positions,
                max:  self.limits.max_positions,
            });
        }

        // [3] Direction
        let direction = signal
            .side()
            .ok_or_else(|| RejectReason::UnknownDirection(signal.direction.clone()))?;

        // [4] Price deviation against the side we would actually fill on
        let (within, limit) = match direction {
            Direction::Buy => {
                let limit = quote.ask + self.limits.slippage_tolerance;
                (signal.entry_price <= limit, limit)
            }
            Direction::Sell => {
                let limit = quote.bid - self.limits.slippage_tolerance;
                (signal.entry_price >= limit, limit)
            }
        };
        if !within {
            return Err(RejectReason::PriceDeviation {
                direction,
                entry: signal.entry_price,
                limit,
            });
        }

        debug!(%direction, entry = signal.entry_price, spread = quote.spread, "✅ Signal passed all checks");
        Ok(direction)
    }
}

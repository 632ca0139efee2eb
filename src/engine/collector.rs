//! # engine::collector
//!
//! **Tick Collector** — turns the latest quote into a [`Tick`] and appends it
//! to the session batch.
//!
//! A full batch drops the new tick rather than queueing it: backpressure, not
//! a retry buffer. Space only comes back when an upload succeeds.

use tracing::trace;

use crate::models::{Quote, Tick};
use crate::state::Session;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Collected {
    Appended(Tick),
    Dropped,
}

/// Samples `quote` into `session.batch`.
pub fn collect(session: &mut Session, quote: &Quote) -> Collected {
    let tick = Tick::from_quote(quote);
    session.stats.ticks_seen += 1;

    if session.batch.try_push(tick) {
        Collected::Appended(tick)
    } else {
        session.stats.ticks_dropped += 1;
        trace!(capacity = session.batch.capacity(), "Batch full — tick dropped");
        Collected::Dropped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn quote(bid: f64) -> Quote {
        Quote {
            symbol: "EURUSD".into(),
            bid,
            ask:    bid + 0.0002,
            spread: 20.0,
            volume: 1,
            time:   Utc::now(),
        }
    }

    #[test]
    fn appends_until_capacity_then_drops() {
        let mut session = Session::new("EURUSD", 4);

        for n in 0..10 {
            let outcome = collect(&mut session, &quote(1.1 + n as f64 * 0.0001));
            assert!(session.batch.len() <= 4);
            assert_eq!(matches!(outcome, Collected::Appended(_)), n < 4);
        }

        assert_eq!(session.stats.ticks_seen, 10);
        assert_eq!(session.stats.ticks_dropped, 6);
        assert_eq!(session.batch.ticks()[0].bid, 1.1);
    }
}

//! # engine::reporter
//!
//! **Trade Reporter** — close detection against a monotonic watermark.
//!
//! The watermark is the highest ticket already accounted for. At attach it is
//! derived from the full order history so positions closed before this
//! session are never re-reported. On every `TradeChanged` the history is
//! scanned again and every matching ticket above the watermark becomes a
//! [`TradeClose`], oldest ticket first.
//!
//! The watermark orders by ticket, not by close time. A position that closes
//! after a higher-ticket position was already reported sits at or below the
//! watermark and is never reported.

use tracing::info;

use crate::models::{HistoricalPosition, TradeClose};
use crate::state::{Session, Watermark};

#[derive(Debug, Clone)]
pub struct TradeReporter {
    symbol: String,
    magic:  u64,
}

impl TradeReporter {
    pub fn new(symbol: &str, magic: u64) -> Self {
        Self {
            symbol: symbol.to_string(),
            magic,
        }
    }

    fn is_ours(&self, position: &HistoricalPosition) -> bool {
        position.symbol == self.symbol && position.magic == self.magic
    }

    /// Highest matching ticket in `history`, or 0 for an empty history.
    ///
    /// With `closed_before` set, only positions closed strictly before that
    /// unix time count. Used when history could not be read at attach.
    pub fn derive_watermark(
        &self,
        history: &[HistoricalPosition],
        closed_before: Option<f64>,
    ) -> Watermark {
        let max = history
            .iter()
            .filter(|p| self.is_ours(p))
            .filter(|p| closed_before.map_or(true, |cutoff| p.close_time < cutoff))
            .map(|p| p.ticket)
            .max()
            .unwrap_or(0);
        Watermark::new(max)
    }

    /// Closes above the session watermark, ascending by ticket. Advances the
    /// watermark past everything returned.
    pub fn report_closed(
        &self,
        session: &mut Session,
        history: &[HistoricalPosition],
    ) -> Vec<TradeClose> {
        let Some(watermark) = session.watermark.as_mut() else {
            return Vec::new();
        };

        let floor = watermark.get();
        let mut fresh: Vec<&HistoricalPosition> = history
            .iter()
            .filter(|p| self.is_ours(p) && p.ticket > floor)
            .collect();
        fresh.sort_by_key(|p| p.ticket);
        fresh.dedup_by_key(|p| p.ticket);

        if let Some(last) = fresh.last() {
            watermark.advance(last.ticket);
            info!(
                count = fresh.len(),
                watermark = watermark.get(),
                "📕 Closed positions detected"
            );
        }

        session.stats.closes_reported += fresh.len() as u64;
        fresh.into_iter().map(TradeClose::from).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MAGIC: u64 = 420001;

    fn closed(ticket: u64, magic: u64, close_time: f64) -> HistoricalPosition {
        HistoricalPosition {
            ticket,
            symbol: "EURUSD".into(),
            magic,
            close_time,
            close_price: 1.1,
            profit: 1.0,
            comment: "tp".into(),
        }
    }

    fn session_at(mark: u64) -> Session {
        let mut session = Session::new("EURUSD", 10);
        session.watermark = Some(Watermark::new(mark));
        session
    }

    #[test]
    fn watermark_ignores_foreign_positions() {
        let reporter = TradeReporter::new("EURUSD", MAGIC);
        let mut foreign_symbol = closed(90, MAGIC, 1.0);
        foreign_symbol.symbol = "GBPUSD".into();
        let history = [closed(10, MAGIC, 1.0), closed(40, 7, 1.0), foreign_symbol];

        assert_eq!(reporter.derive_watermark(&history, None).get(), 10);
        assert_eq!(reporter.derive_watermark(&[], None).get(), 0);
    }

    #[test]
    fn cutoff_excludes_later_closes() {
        let reporter = TradeReporter::new("EURUSD", MAGIC);
        let history = [closed(10, MAGIC, 100.0), closed(11, MAGIC, 200.0)];
        assert_eq!(reporter.derive_watermark(&history, Some(150.0)).get(), 10);
    }

    #[test]
    fn reports_every_new_close_in_ticket_order() {
        let reporter = TradeReporter::new("EURUSD", MAGIC);
        let mut session = session_at(10);
        let history = [
            closed(14, MAGIC, 5.0),
            closed(9, MAGIC, 1.0),
            closed(12, MAGIC, 6.0),
            closed(13, 7, 6.0),
        ];

        let closes = reporter.report_closed(&mut session, &history);
        let tickets: Vec<_> = closes.iter().map(|c| c.ticket).collect();
        assert_eq!(tickets, vec![12, 14]);
        assert_eq!(session.watermark.map(|w| w.get()), Some(14));
        assert_eq!(session.stats.closes_reported, 2);

        assert!(reporter.report_closed(&mut session, &history).is_empty());
    }

    #[test]
    fn lower_ticket_closing_later_is_not_reported() {
        let reporter = TradeReporter::new("EURUSD", MAGIC);
        let mut session = session_at(10);

        let first = reporter.report_closed(&mut session, &[closed(12, MAGIC, 5.0)]);
        assert_eq!(first.len(), 1);

        let later = [closed(12, MAGIC, 5.0), closed(11, MAGIC, 9.0)];
        assert!(reporter.report_closed(&mut session, &later).is_empty());
        assert_eq!(session.watermark.map(|w| w.get()), Some(12));
    }

    #[test]
    fn nothing_reported_before_watermark_is_known() {
        let reporter = TradeReporter::new("EURUSD", MAGIC);
        let mut session = Session::new("EURUSD", 10);
        assert!(reporter.report_closed(&mut session, &[closed(1, MAGIC, 1.0)]).is_empty());
    }
}

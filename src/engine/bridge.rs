//! # engine::bridge
//!
//! **Bridge Loop** — the one task that owns the [`Session`] and reacts to
//! [`BridgeEvent`]s.
//!
//! ```text
//!  TickArrived ──► collect ──► flush if due ──────────────► POST /api/ticks
//!  PollDue     ──► flush if due ─► poll ─► validate ─► execute ─► outbox (open)
//!  TradeChanged ─► history ─► closes above watermark ─────► outbox (close)
//!  HealthDue   ──► GET /api/health while not connected
//!  Shutdown    ──► final flush ─► drain outbox
//! ```
//!
//! Components never see each other; the loop hands each one the session and
//! the capability it needs. After every event the status snapshot is
//! republished on a `watch` channel.

use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, trace, warn};
use uuid::Uuid;

use super::collector::{collect, Collected};
use super::executor::OrderExecutor;
use super::health::ConnectionHealthMonitor;
use super::outbox::{OutboxStats, ReportOutbox, RetryPolicy};
use super::poller::{PollOutcome, SignalPoller};
use super::reporter::TradeReporter;
use super::uploader::TickUploader;
use super::validator::SignalValidator;
use crate::backend::Backend;
use crate::clock::Clock;
use crate::config::Config;
use crate::error::BridgeError;
use crate::events::BridgeEvent;
use crate::host::OrderDesk;
use crate::models::{unix_seconds, Quote, Signal, TradeOpen, TradeReport};
use crate::state::{BridgeStatus, Session};

/// Granularity of the health timer; the monitor decides when a check is due.
const HEALTH_TICK: Duration = Duration::from_secs(1);

pub struct BridgeLoop {
    session:         Session,
    magic:           u64,
    trading_enabled: bool,
    poll_interval:   Duration,

    backend: Arc<dyn Backend>,
    desk:    Arc<dyn OrderDesk>,
    clock:   Arc<dyn Clock>,

    uploader:  TickUploader,
    poller:    SignalPoller,
    validator: SignalValidator,
    executor:  OrderExecutor,
    reporter:  TradeReporter,
    health:    ConnectionHealthMonitor,
    outbox:    ReportOutbox,

    status: watch::Sender<BridgeStatus>,
}

impl BridgeLoop {
    /// Must be called inside a Tokio runtime: spawns the report outbox.
    pub fn new(
        config: &Config,
        backend: Arc<dyn Backend>,
        desk: Arc<dyn OrderDesk>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let session = Session::new(&config.symbol, config.buffer_capacity);
        let (status, _) = watch::channel(session.status());
        let outbox = ReportOutbox::spawn(
            Arc::clone(&backend),
            config.report_queue_capacity,
            RetryPolicy::default(),
        );

        Self {
            session,
            magic:           config.magic,
            trading_enabled: config.trading_enabled,
            poll_interval:   config.poll_interval,
            backend,
            desk,
            clock,
            uploader:  TickUploader::new(config.flush_interval),
            poller:    SignalPoller,
            validator: SignalValidator::new(config.risk.clone()),
            executor:  OrderExecutor::new(config),
            reporter:  TradeReporter::new(&config.symbol, config.magic),
            health:    ConnectionHealthMonitor::new(config.health_recheck),
            outbox,
            status,
        }
    }

    pub fn session_id(&self) -> Uuid {
        self.session.id
    }

    pub fn subscribe(&self) -> watch::Receiver<BridgeStatus> {
        self.status.subscribe()
    }

    fn publish(&self) {
        self.status.send_replace(self.session.status());
    }

    // ─── Lifecycle ────────────────────────────────────────────────────────────

    /// Starts a fresh session: health check, then watermark from history.
    pub async fn attach(&mut self) {
        let now_ms = self.clock.now_ms();
        self.session.reset(now_ms, unix_seconds(self.clock.wall()));

        let connection = self.health.check_health(&mut self.session, &*self.backend, now_ms).await;

        match self.desk.history(&self.session.symbol).await {
            Ok(history) => {
                let mark = self.reporter.derive_watermark(&history, None);
                self.session.watermark = Some(mark);
            }
            Err(e) => warn!(error = %e, "Order history unavailable — watermark deferred"),
        }

        info!(
            session_id = %self.session.id,
            symbol     = %self.session.symbol,
            connection = ?connection,
            watermark  = ?self.session.watermark.map(|w| w.get()),
            trading    = self.trading_enabled,
            "🔗 Session attached"
        );
        self.publish();
    }

    /// Drives the session until `Shutdown` or until every event sender is gone.
    pub async fn run(mut self, mut events: mpsc::Receiver<BridgeEvent>) -> OutboxStats {
        self.attach().await;

        let mut poll = interval(self.poll_interval);
        poll.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut health = interval(HEALTH_TICK);
        health.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            let event = tokio::select! {
                maybe = events.recv() => maybe.unwrap_or(BridgeEvent::Shutdown),
                _ = poll.tick() => BridgeEvent::PollDue,
                _ = health.tick() => BridgeEvent::HealthDue,
            };

            if self.handle(event).await.is_break() {
                break;
            }
        }

        self.shutdown().await
    }

    /// Drains the report outbox. Call after `Shutdown` has been handled.
    pub async fn shutdown(self) -> OutboxStats {
        let stats = self.session.stats;
        let outbox = self.outbox.close().await;
        info!(?stats, delivered = outbox.delivered, abandoned = outbox.abandoned, "🛑 Session detached");
        outbox
    }

    // ─── Dispatch ─────────────────────────────────────────────────────────────

    pub async fn handle(&mut self, event: BridgeEvent) -> ControlFlow<()> {
        trace!(event = event.name(), "Dispatching");
        let flow = match event {
            BridgeEvent::TickArrived(quote) => {
                self.on_tick(quote).await;
                ControlFlow::Continue(())
            }
            BridgeEvent::PollDue => {
                self.flush_if_due().await;
                self.on_poll().await;
                ControlFlow::Continue(())
            }
            BridgeEvent::TradeChanged => {
                self.on_trade_changed().await;
                ControlFlow::Continue(())
            }
            BridgeEvent::HealthDue => {
                let now_ms = self.clock.now_ms();
                if self.health.recheck_due(&self.session, now_ms) {
                    self.health.check_health(&mut self.session, &*self.backend, now_ms).await;
                }
                ControlFlow::Continue(())
            }
            BridgeEvent::Shutdown => {
                self.final_flush().await;
                ControlFlow::Break(())
            }
        };
        self.publish();
        flow
    }

    // ─── Ticks ────────────────────────────────────────────────────────────────

    async fn on_tick(&mut self, quote: Quote) {
        if quote.symbol != self.session.symbol {
            warn!(got = %quote.symbol, expected = %self.session.symbol, "Tick for foreign symbol ignored");
            return;
        }

        match collect(&mut self.session, &quote) {
            Collected::Appended(tick) => trace!(bid = tick.bid, ask = tick.ask, pending = self.session.batch.len(), "Tick collected"),
            Collected::Dropped => debug!(dropped = self.session.stats.ticks_dropped, "Tick dropped — batch full"),
        }
        self.session.latest_quote = Some(quote);
        self.flush_if_due().await;
    }

    async fn flush_if_due(&mut self) {
        let now_ms = self.clock.now_ms();
        if !self.uploader.is_due(&self.session, now_ms) {
            return;
        }
        match self.uploader.flush(&mut self.session, &*self.backend, now_ms).await {
            Ok(_) => self.session.mark_reachable(),
            Err(e) => {
                warn!(error = %e, pending = self.session.batch.len(), "Tick upload failed — batch kept");
                self.session.mark_unreachable(&e);
            }
        }
    }

    async fn final_flush(&mut self) {
        if self.session.batch.is_empty() {
            return;
        }
        let now_ms = self.clock.now_ms();
        if let Err(e) = self.uploader.flush(&mut self.session, &*self.backend, now_ms).await {
            warn!(error = %e, lost = self.session.batch.len(), "Final tick upload failed");
        }
    }

    // ─── Signals ──────────────────────────────────────────────────────────────

    async fn on_poll(&mut self) {
        if !self.trading_enabled || self.session.latest_quote.is_none() {
            return;
        }

        let signal = match self.poller.poll(&mut self.session, &*self.backend).await {
            PollOutcome::Signal(signal) => signal,
            PollOutcome::NoSignal => {
                self.session.mark_reachable();
                return;
            }
            PollOutcome::Malformed(e) => {
                warn!(error = %e, "Malformed signal — ignored");
                self.session.mark_reachable();
                return;
            }
            PollOutcome::TransportFailed(e) => {
                debug!(error = %e, "Signal poll failed");
                self.session.mark_unreachable(&e);
                return;
            }
        };
        self.session.mark_reachable();

        match self.attempt(&signal).await {
            Ok(open) => {
                self.session.stats.orders_filled += 1;
                self.outbox.enqueue(TradeReport::Opened(open)).await;
            }
            Err(BridgeError::Validation(reason)) => {
                self.session.stats.signals_rejected += 1;
                info!(reason = reason.code(), detail = %reason, "🛑 Signal rejected");
            }
            Err(e) => {
                self.session.stats.orders_failed += 1;
                error!(error = %e, "Signal not executed");
            }
        }
    }

    async fn attempt(&self, signal: &Signal) -> Result<TradeOpen, BridgeError> {
        let quote = self
            .session
            .latest_quote
            .as_ref()
            .ok_or_else(|| BridgeError::Execution("no live quote".into()))?;

        self.validator
            .check_spread(quote)
            .map_err(BridgeError::Validation)?;

        let ours = self
            .desk
            .open_positions(&self.session.symbol)
            .await?
            .iter()
            .filter(|p| p.magic == self.magic)
            .count();

        let side = self
            .validator
            .validate(signal, quote, ours)
            .map_err(BridgeError::Validation)?;

        self.executor
            .execute(&*self.desk, signal, side, quote, self.clock.wall())
            .await
    }

    // ─── Closes ───────────────────────────────────────────────────────────────

    async fn on_trade_changed(&mut self) {
        let history = match self.desk.history(&self.session.symbol).await {
            Ok(history) => history,
            Err(e) => {
                warn!(error = %e, "Order history unavailable — close detection skipped");
                return;
            }
        };

        if self.session.watermark.is_none() {
            let mark = self
                .reporter
                .derive_watermark(&history, Some(self.session.attached_at));
            info!(watermark = mark.get(), "Watermark derived from history");
            self.session.watermark = Some(mark);
        }

        for close in self.reporter.report_closed(&mut self.session, &history) {
            self.outbox.enqueue(TradeReport::Closed(close)).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    use crate::backend::fake::FakeBackend;
    use crate::clock::ManualClock;
    use crate::host::paper::PaperDesk;
    use crate::models::{HistoricalPosition, OpenPosition};
    use crate::state::ConnectionState;

    const BUY: &str = r#"{"direction":"BUY","entry_price":1.1002,"sl":1.0970,"tp":1.1060,"confidence":0.9,"timestamp":"t1"}"#;

    struct Harness {
        bridge:  BridgeLoop,
        backend: Arc<FakeBackend>,
        desk:    Arc<PaperDesk>,
        clock:   Arc<ManualClock>,
    }

    fn harness(config: Config) -> Harness {
        let backend = Arc::new(FakeBackend::new());
        let desk = Arc::new(PaperDesk::new(100));
        let clock = Arc::new(ManualClock::new());
        let bridge = BridgeLoop::new(&config, backend.clone(), desk.clone(), clock.clone());
        Harness { bridge, backend, desk, clock }
    }

    fn quote(symbol: &str, spread: f64) -> Quote {
        Quote {
            symbol: symbol.into(),
            bid:    1.1000,
            ask:    1.1002,
            spread,
            volume: 1,
            time:   Utc::now(),
        }
    }

    fn history(ticket: u64, magic: u64, close_time: f64) -> HistoricalPosition {
        HistoricalPosition {
            ticket,
            symbol: "EURUSD".into(),
            magic,
            close_time,
            close_price: 1.1,
            profit: 3.0,
            comment: String::new(),
        }
    }

    #[tokio::test]
    async fn failed_upload_keeps_full_batch_until_success() {
        let mut h = harness(Config { buffer_capacity: 500, ..Config::default() });
        h.bridge.attach().await;
        h.backend.with(|s| s.upload_fails = true);

        for _ in 0..500 {
            h.bridge.handle(BridgeEvent::TickArrived(quote("EURUSD", 20.0))).await;
        }
        assert_eq!(h.bridge.session.batch.len(), 500);

        h.bridge.handle(BridgeEvent::TickArrived(quote("EURUSD", 20.0))).await;
        assert_eq!(h.bridge.session.batch.len(), 500);
        assert_eq!(h.bridge.session.stats.ticks_dropped, 1);
        assert_eq!(h.bridge.session.connection, ConnectionState::Degraded);

        h.backend.with(|s| s.upload_fails = false);
        h.bridge.handle(BridgeEvent::TickArrived(quote("EURUSD", 20.0))).await;
        assert_eq!(h.bridge.session.batch.len(), 0);
        assert_eq!(h.bridge.session.connection, ConnectionState::Connected);
        assert_eq!(h.backend.with(|s| s.uploads[0].len()), 500);
    }

    #[tokio::test]
    async fn partial_batch_flushes_after_interval() {
        let mut h = harness(Config { trading_enabled: false, ..Config::default() });
        h.bridge.attach().await;

        for _ in 0..3 {
            h.bridge.handle(BridgeEvent::TickArrived(quote("EURUSD", 20.0))).await;
        }
        h.clock.advance(29_000);
        h.bridge.handle(BridgeEvent::PollDue).await;
        assert!(h.backend.with(|s| s.uploads.is_empty()));

        h.clock.advance(1_000);
        h.bridge.handle(BridgeEvent::PollDue).await;
        assert_eq!(h.backend.with(|s| s.uploads.len()), 1);
        assert!(h.bridge.session.batch.is_empty());
    }

    #[tokio::test]
    async fn accepted_signal_opens_once_and_reports() {
        let mut h = harness(Config::default());
        h.bridge.attach().await;
        h.backend.with(|s| s.signal = Some(BUY.into()));

        h.bridge.handle(BridgeEvent::TickArrived(quote("EURUSD", 20.0))).await;
        h.bridge.handle(BridgeEvent::PollDue).await;
        h.bridge.handle(BridgeEvent::PollDue).await;

        assert_eq!(h.desk.open_count(), 1);
        assert_eq!(h.bridge.session.stats.orders_filled, 1);

        let stats = h.bridge.shutdown().await;
        assert_eq!(stats.delivered, 1);
        h.backend.with(|s| match &s.reports[0] {
            TradeReport::Opened(open) => {
                assert_eq!(open.ticket, 100);
                assert_eq!(open.open_price, 1.1002);
            }
            other => panic!("expected open report, got {other:?}"),
        });
    }

    #[tokio::test]
    async fn wide_spread_rejects_before_positions_are_read() {
        let mut h = harness(Config::default());
        h.bridge.attach().await;
        h.desk.set_positions_available(false);
        h.backend.with(|s| s.signal = Some(BUY.into()));

        h.bridge.handle(BridgeEvent::TickArrived(quote("EURUSD", 25.0))).await;
        h.bridge.handle(BridgeEvent::PollDue).await;

        assert_eq!(h.bridge.session.stats.signals_rejected, 1);
        assert_eq!(h.bridge.session.stats.orders_failed, 0);
        assert_eq!(h.desk.open_count(), 0);
    }

    #[tokio::test]
    async fn unreadable_positions_fail_an_acceptable_spread() {
        let mut h = harness(Config::default());
        h.bridge.attach().await;
        h.desk.set_positions_available(false);
        h.backend.with(|s| s.signal = Some(BUY.into()));

        h.bridge.handle(BridgeEvent::TickArrived(quote("EURUSD", 20.0))).await;
        h.bridge.handle(BridgeEvent::PollDue).await;

        assert_eq!(h.bridge.session.stats.signals_rejected, 0);
        assert_eq!(h.bridge.session.stats.orders_failed, 1);
        assert_eq!(h.desk.open_count(), 0);
    }

    #[tokio::test]
    async fn position_cap_rejects_signal() {
        let mut h = harness(Config::default());
        for ticket in 1..=3 {
            h.desk.seed_open(OpenPosition {
                ticket,
                symbol: "EURUSD".into(),
                magic: 420001,
                lots: 0.01,
                open_price: 1.1,
            });
        }
        h.bridge.attach().await;
        h.backend.with(|s| s.signal = Some(BUY.into()));

        h.bridge.handle(BridgeEvent::TickArrived(quote("EURUSD", 20.0))).await;
        h.bridge.handle(BridgeEvent::PollDue).await;

        assert_eq!(h.bridge.session.stats.signals_rejected, 1);
        assert_eq!(h.desk.open_count(), 3);
    }

    #[tokio::test]
    async fn polling_waits_for_quote_and_trading_flag() {
        let mut h = harness(Config::default());
        h.bridge.attach().await;
        h.bridge.handle(BridgeEvent::PollDue).await;
        assert_eq!(h.backend.with(|s| s.signal_fetches), 0);

        let mut off = harness(Config { trading_enabled: false, ..Config::default() });
        off.bridge.attach().await;
        off.bridge.handle(BridgeEvent::TickArrived(quote("EURUSD", 20.0))).await;
        off.bridge.handle(BridgeEvent::PollDue).await;
        assert_eq!(off.backend.with(|s| s.signal_fetches), 0);
    }

    #[tokio::test]
    async fn new_closes_are_reported_above_watermark() {
        let mut h = harness(Config::default());
        h.desk.seed_history(history(40, 420001, 1.0));
        h.bridge.attach().await;
        assert_eq!(h.bridge.status.borrow().watermark, Some(40));

        h.backend.with(|s| s.signal = Some(BUY.into()));
        h.bridge.handle(BridgeEvent::TickArrived(quote("EURUSD", 20.0))).await;
        h.bridge.handle(BridgeEvent::PollDue).await;
        h.desk.close(100, 1.1050, 48.0, 2_000_000_000.0);

        h.bridge.handle(BridgeEvent::TradeChanged).await;
        h.bridge.handle(BridgeEvent::TradeChanged).await;
        assert_eq!(h.bridge.session.stats.closes_reported, 1);
        assert_eq!(h.bridge.session.watermark.map(|w| w.get()), Some(100));

        h.bridge.shutdown().await;
        let kinds: Vec<_> = h.backend.with(|s| s.reports.iter().map(|r| r.kind()).collect());
        assert_eq!(kinds, vec!["open", "close"]);
    }

    #[tokio::test]
    async fn deferred_watermark_skips_pre_session_closes() {
        let mut h = harness(Config::default());
        h.desk.set_history_available(false);
        h.bridge.attach().await;
        assert_eq!(h.bridge.session.watermark, None);

        let attached = h.bridge.session.attached_at;
        h.desk.set_history_available(true);
        h.desk.seed_history(history(7, 420001, attached - 60.0));
        h.desk.seed_history(history(8, 420001, attached + 5.0));

        h.bridge.handle(BridgeEvent::TradeChanged).await;
        assert_eq!(h.bridge.session.watermark.map(|w| w.get()), Some(8));
        assert_eq!(h.bridge.session.stats.closes_reported, 1);
    }

    #[tokio::test]
    async fn poll_failure_degrades_and_health_recovers() {
        let mut h = harness(Config::default());
        h.bridge.attach().await;
        assert_eq!(h.bridge.session.connection, ConnectionState::Connected);

        h.backend.with(|s| s.signal = None);
        h.bridge.handle(BridgeEvent::TickArrived(quote("EURUSD", 20.0))).await;
        h.bridge.handle(BridgeEvent::PollDue).await;
        assert_eq!(h.bridge.session.connection, ConnectionState::Degraded);

        h.clock.advance(60_000);
        h.bridge.handle(BridgeEvent::HealthDue).await;
        assert_eq!(h.bridge.subscribe().borrow().connection, ConnectionState::Connected);
    }

    #[tokio::test]
    async fn foreign_symbol_tick_is_ignored() {
        let mut h = harness(Config::default());
        h.bridge.attach().await;
        h.bridge.handle(BridgeEvent::TickArrived(quote("GBPUSD", 20.0))).await;
        assert!(h.bridge.session.batch.is_empty());
        assert!(h.bridge.session.latest_quote.is_none());
    }

    #[tokio::test]
    async fn run_flushes_on_shutdown() {
        let h = harness(Config::default());
        let (tx, rx) = mpsc::channel(16);
        let task = tokio::spawn(h.bridge.run(rx));

        tx.send(BridgeEvent::TickArrived(quote("EURUSD", 20.0))).await.unwrap();
        tx.send(BridgeEvent::Shutdown).await.unwrap();
        task.await.unwrap();

        assert_eq!(h.backend.with(|s| s.uploads.len()), 1);
    }
}

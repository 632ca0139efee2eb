//! # engine::outbox
//!
//! **Report Outbox** — delivers open and close reports to `POST /api/trades`
//! on its own task so a slow backend never stalls the control loop.
//!
//! ```text
//! BridgeLoop ──enqueue──► [bounded mpsc] ──► worker ──► Backend::report_trade
//!                                               │  fail
//!                                               └── sleep 250ms, 500ms, 1s … 30s, retry
//! ```
//!
//! Delivery is at-least-once: a report leaves the queue only after the
//! backend acknowledges it with a 2xx and a non-empty body. On shutdown the
//! worker stops backing off and gives every remaining report one last try.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::backend::Backend;
use crate::error::BridgeError;
use crate::models::TradeReport;

// ─── Retry policy ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub initial: Duration,
    pub max:     Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            initial: Duration::from_millis(250),
            max:     Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (0-based).
    pub fn delay(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt.min(31)).unwrap_or(u32::MAX);
        self.initial.saturating_mul(factor).min(self.max)
    }
}

// ─── Outbox handle ────────────────────────────────────────────────────────────

/// What the worker did over its lifetime.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OutboxStats {
    pub delivered: u64,
    pub abandoned: u64,
}

pub struct ReportOutbox {
    tx:     mpsc::Sender<TradeReport>,
    stop:   watch::Sender<bool>,
    handle: JoinHandle<OutboxStats>,
}

impl ReportOutbox {
    pub fn spawn(backend: Arc<dyn Backend>, capacity: usize, policy: RetryPolicy) -> Self {
        let (tx, rx) = mpsc::channel(capacity);
        let (stop, stop_rx) = watch::channel(false);

        let worker = Worker { backend, policy, stop: stop_rx, stats: OutboxStats::default() };
        let handle = tokio::spawn(worker.run(rx));

        Self { tx, stop, handle }
    }

    /// Queues a report. When `REPORT_QUEUE_CAPACITY` reports are already
    /// pending this waits for space, stalling the control loop (and tick
    /// sampling) until the worker delivers one.
    pub async fn enqueue(&self, report: TradeReport) {
        let ticket = report.ticket();
        let kind = report.kind();

        let report = match self.tx.try_send(report) {
            Ok(()) => {
                debug!(ticket, kind, "📮 Trade report queued");
                return;
            }
            Err(mpsc::error::TrySendError::Full(report)) => {
                warn!(
                    ticket,
                    kind,
                    capacity = self.tx.max_capacity(),
                    "Report outbox full — control loop waits for delivery"
                );
                report
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                error!(ticket, kind, "Report outbox is closed — report lost");
                return;
            }
        };

        match self.tx.send(report).await {
            Ok(()) => debug!(ticket, kind, "📮 Trade report queued after wait"),
            Err(_) => error!(ticket, kind, "Report outbox is closed — report lost"),
        }
    }

    /// Stops accepting reports, drains the queue and waits for the worker.
    pub async fn close(self) -> OutboxStats {
        let _ = self.stop.send(true);
        drop(self.tx);
        match self.handle.await {
            Ok(stats) => stats,
            Err(e) => {
                error!(error = %e, "Report outbox worker panicked");
                OutboxStats::default()
            }
        }
    }
}

// ─── Worker ───────────────────────────────────────────────────────────────────

struct Worker {
    backend: Arc<dyn Backend>,
    policy:  RetryPolicy,
    stop:    watch::Receiver<bool>,
    stats:   OutboxStats,
}

impl Worker {
    fn stopping(&self) -> bool {
        *self.stop.borrow() || self.stop.has_changed().is_err()
    }

    async fn deliver(&self, report: &TradeReport) -> Result<(), BridgeError> {
        let body = self.backend.report_trade(report).await?;
        if body.trim().is_empty() {
            return Err(BridgeError::Network("report trade: empty response body".into()));
        }
        Ok(())
    }

    async fn deliver_until_accepted(&mut self, report: TradeReport) {
        let mut attempt = 0u32;
        loop {
            match self.deliver(&report).await {
                Ok(()) => {
                    self.stats.delivered += 1;
                    info!(ticket = report.ticket(), kind = report.kind(), "✅ Trade report delivered");
                    return;
                }
                Err(e) if self.stopping() => {
                    self.stats.abandoned += 1;
                    error!(ticket = report.ticket(), kind = report.kind(), error = %e, "Trade report abandoned at shutdown");
                    return;
                }
                Err(e) => {
                    let delay = self.policy.delay(attempt);
                    attempt = attempt.saturating_add(1);
                    warn!(ticket = report.ticket(), attempt, ?delay, error = %e, "Trade report failed — retrying");
                    tokio::select! {
                        _ = tokio::time::sleep(delay) => {}
                        _ = self.stop.changed() => {}
                    }
                }
            }
        }
    }

    async fn run(mut self, mut rx: mpsc::Receiver<TradeReport>) -> OutboxStats {
        loop {
            if self.stopping() {
                break;
            }
            tokio::select! {
                maybe = rx.recv() => match maybe {
                    Some(report) => self.deliver_until_accepted(report).await,
                    None => break,
                },
                _ = self.stop.changed() => {}
            }
        }

        rx.close();
        while let Some(report) = rx.recv().await {
            self.deliver_until_accepted(report).await;
        }

        info!(delivered = self.stats.delivered, abandoned = self.stats.abandoned, "📪 Report outbox drained");
        self.stats
    }
}

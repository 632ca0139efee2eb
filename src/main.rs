//! # MT5 Sync Bridge — terminal ⇄ decision-service bridge
//!
//! ## Architecture Overview
//!
//! ```text
//!  ┌──────────────┐  POST /api/mt5/tick    ┌───────────────────────┐  POST /api/ticks   ┌─────────────┐
//!  │  MetaTrader  │ ─────────────────────▶ │  ingress (axum)       │ ─────────────────▶ │             │
//!  │  5 (EA)      │  POST /api/mt5/trade   │        │ BridgeEvent   │  GET  /api/signals │  Decision   │
//!  │              │                        │        ▼              │ ◀───────────────── │  backend    │
//!  │              │ ◀── POST /order/send ─ │  BridgeLoop (Session) │                    │             │
//!  │              │ ◀── GET  /history ──── │        │ TradeReport  │  POST /api/trades  │             │
//!  └──────────────┘                        │  ReportOutbox task ───┼──────────────────▶ │             │
//!                                          └───────────────────────┘                    └─────────────┘
//! ```
//!
//! Configuration is read from the environment (see [`config`]).

use std::sync::Arc;

use anyhow::Context;
use tokio::sync::mpsc;
use tracing::{error, info, info_span, Instrument};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod auth;
mod backend;
mod clock;
mod config;
mod engine;
mod error;
mod events;
mod host;
mod models;
mod routes;
mod state;

use backend::{Backend, HttpBackend};
use clock::SystemClock;
use config::Config;
use engine::bridge::BridgeLoop;
use events::BridgeEvent;
use host::{mt5::Mt5Desk, paper::PaperDesk, OrderDesk};
use routes::mt5::IngressState;

// ─── Entry Point ──────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── 1. Load .env ──────────────────────────────────────────────────────────
    dotenvy::dotenv().ok();

    // ── 2. Structured logging ─────────────────────────────────────────────────
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(
            EnvFilter::from_default_env()
                .add_directive("mt5_sync_bridge=debug".parse()?)
                .add_directive("tower_http=info".parse()?)
                .add_directive("reqwest=warn".parse()?),
        )
        .init();

    info!(r#"

  ╔═══════════════════════════════════════════════╗
  ║        MT5 SYNC BRIDGE — Terminal Link        ║
  ║   Ticks · Signals · Orders · Trade Reports    ║
  ╚═══════════════════════════════════════════════╝"#);

    // ── 3. Configuration ──────────────────────────────────────────────────────
    let config = Config::from_env().context("loading configuration from environment")?;
    info!(
        symbol  = %config.symbol,
        backend = %config.backend_url,
        mt5     = %config.mt5_base_url,
        trading = config.trading_enabled,
        "⚙️ Configuration loaded"
    );

    // ── 4. Capabilities ───────────────────────────────────────────────────────
    let backend: Arc<dyn Backend> = Arc::new(HttpBackend::new(&config));
    let desk: Arc<dyn OrderDesk> = if config.mt5_base_url == "mock" {
        info!("🎭 MT5_BASE_URL=mock — orders fill on the in-memory paper desk");
        Arc::new(PaperDesk::new(1))
    } else {
        Arc::new(Mt5Desk::new(&config))
    };

    // ── 5. Control loop ───────────────────────────────────────────────────────
    let (events, rx) = mpsc::channel(config.event_queue_capacity);
    let bridge = BridgeLoop::new(&config, backend, desk, Arc::new(SystemClock::new()));
    let status = bridge.subscribe();
    let span = info_span!("session", id = %bridge.session_id());
    let bridge_task = tokio::spawn(bridge.run(rx).instrument(span));

    // ── 6. Ingress ────────────────────────────────────────────────────────────
    let ingress = IngressState {
        events: events.clone(),
        status,
        symbol: config.symbol.clone(),
    };
    let app = routes::router(ingress, &config.bridge_api_key);

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("binding {}", config.bind_addr))?;
    info!(addr = %config.bind_addr, "🚀 MT5 Sync Bridge listening");

    // ── 7. Serve until Ctrl-C, then detach ───────────────────────────────────
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!(error = %e, "Failed to listen for Ctrl-C");
            }
            info!("Shutdown requested");
            let _ = events.send(BridgeEvent::Shutdown).await;
        })
        .await?;

    let outbox = bridge_task.await.context("control loop panicked")?;
    info!(delivered = outbox.delivered, abandoned = outbox.abandoned, "👋 Bye");

    Ok(())
}

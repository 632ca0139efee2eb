//! Control-loop components. Each one is a plain value the [`bridge::BridgeLoop`]
//! calls with the session it owns.

pub mod bridge;
pub mod collector;
pub mod executor;
pub mod health;
pub mod outbox;
pub mod parser;
pub mod poller;
pub mod reporter;
pub mod uploader;
pub mod validator;

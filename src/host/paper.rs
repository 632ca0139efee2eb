//! # host::paper
//!
//! In-memory order desk. Fills every order at its requested price and hands
//! out increasing tickets, so the whole loop can run without a terminal.

use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use tracing::info;

use super::{OrderDesk, OrderRequest};
use crate::error::BridgeError;
use crate::models::{HistoricalPosition, OpenPosition, Ticket};

#[derive(Debug, Default)]
struct Book {
    next_ticket:    Ticket,
    open:           Vec<OpenPosition>,
    history:        Vec<HistoricalPosition>,
    reject_next:    Option<String>,
    history_down:   bool,
    positions_down: bool,
}

pub struct PaperDesk {
    book: Mutex<Book>,
}

impl PaperDesk {
    pub fn new(first_ticket: Ticket) -> Self {
        Self {
            book: Mutex::new(Book {
                next_ticket: first_ticket,
                ..Book::default()
            }),
        }
    }

    fn book(&self) -> MutexGuard<'_, Book> {
        self.book.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
impl PaperDesk {
    pub fn seed_open(&self, position: OpenPosition) {
        self.book().open.push(position);
    }

    pub fn seed_history(&self, closed: HistoricalPosition) {
        self.book().history.push(closed);
    }

    /// Moves an open position into history.
    pub fn close(&self, ticket: Ticket, close_price: f64, profit: f64, close_time: f64) {
        let mut book = self.book();
        if let Some(at) = book.open.iter().position(|p| p.ticket == ticket) {
            let position = book.open.remove(at);
            book.history.push(HistoricalPosition {
                ticket,
                symbol: position.symbol,
                magic: position.magic,
                close_time,
                close_price,
                profit,
                comment: String::new(),
            });
        }
    }

    pub fn reject_next(&self, reason: &str) {
        self.book().reject_next = Some(reason.to_string());
    }

    /// Makes `history` fail until re-enabled.
    pub fn set_history_available(&self, available: bool) {
        self.book().history_down = !available;
    }

    /// Makes `open_positions` fail until re-enabled.
    pub fn set_positions_available(&self, available: bool) {
        self.book().positions_down = !available;
    }

    pub fn open_count(&self) -> usize {
        self.book().open.len()
    }
}

#[async_trait]
impl OrderDesk for PaperDesk {
    async fn submit(&self, order: &OrderRequest) -> Result<Ticket, BridgeError> {
        let mut book = self.book();

        if let Some(reason) = book.reject_next.take() {
            return Err(BridgeError::Execution(format!("paper desk rejected: {reason}")));
        }

        let ticket = book.next_ticket;
        book.next_ticket += 1;
        book.open.push(OpenPosition {
            ticket,
            symbol:     order.symbol.clone(),
            magic:      order.magic,
            lots:       order.volume,
            open_price: order.price,
        });

        info!(ticket, action = %order.action, price = order.price, "🎭 [PAPER] Order filled");
        Ok(ticket)
    }

    async fn open_positions(&self, symbol: &str) -> Result<Vec<OpenPosition>, BridgeError> {
        let book = self.book();
        if book.positions_down {
            return Err(BridgeError::Network("paper desk positions unavailable".into()));
        }
        Ok(book.open.iter().filter(|p| p.symbol == symbol).cloned().collect())
    }

    async fn history(&self, symbol: &str) -> Result<Vec<HistoricalPosition>, BridgeError> {
        let book = self.book();
        if book.history_down {
            return Err(BridgeError::Network("paper desk history unavailable".into()));
        }
        Ok(book.history.iter().filter(|p| p.symbol == symbol).cloned().collect())
    }
}

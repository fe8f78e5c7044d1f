//! # Terminal Events
//!
//! What the engine tells the outside world. The engine never formats text;
//! the console turns these into lines on the screen.
//!
//! ```text
//! DeviceReader ──► Terminal::route_card ──► emitter.emit(LoggedIn { .. })
//!                                                 │
//!                                                 ▼
//!                                    ChannelEmitter ──► console printer
//! ```

use std::fmt;

use tokio::sync::mpsc;

use micropay_core::Money;

// =============================================================================
// Event Types
// =============================================================================

/// Why a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogoutReason {
    /// Operator pressed the logout key.
    Operator,
    /// No activity for longer than the configured timeout.
    Inactivity,
}

impl fmt::Display for LogoutReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogoutReason::Operator => write!(f, "operator"),
            LogoutReason::Inactivity => write!(f, "inactivity"),
        }
    }
}

/// An observable state change or report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TerminalEvent {
    /// A known card was swiped.
    LoggedIn { member: String, balance: Money },

    /// A card with no account was swiped. Session unchanged.
    UnknownCustomer,

    /// The session was cleared.
    LoggedOut { reason: LogoutReason },

    /// A barcode not in the ledger was scanned.
    UnknownProduct { barcode: String },

    /// A product was scanned with nobody logged in.
    PriceCheck { product: String, price: Money },

    /// A product was bought by the logged-in customer.
    Purchased {
        product: String,
        price: Money,
        balance: Money,
    },

    /// A purchase was attempted but the ledger refused it.
    PurchaseFailed { product: String, message: String },
}

// =============================================================================
// Event Emitter Trait
// =============================================================================

/// Receives engine events (implemented by the console).
pub trait TerminalEventEmitter: Send + Sync {
    fn emit(&self, event: TerminalEvent);
}

/// No-op event emitter for testing.
pub struct NoOpEmitter;

impl TerminalEventEmitter for NoOpEmitter {
    fn emit(&self, _event: TerminalEvent) {}
}

/// Forwards events into an unbounded channel.
///
/// A closed receiver is ignored; events are informational.
pub struct ChannelEmitter {
    tx: mpsc::UnboundedSender<TerminalEvent>,
}

impl ChannelEmitter {
    /// Creates an emitter and the receiver that drains it.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<TerminalEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (ChannelEmitter { tx }, rx)
    }
}

impl TerminalEventEmitter for ChannelEmitter {
    fn emit(&self, event: TerminalEvent) {
        let _ = self.tx.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_channel_emitter_forwards() {
        let (emitter, mut rx) = ChannelEmitter::new();
        emitter.emit(TerminalEvent::UnknownCustomer);
        assert_eq!(rx.recv().await, Some(TerminalEvent::UnknownCustomer));

        drop(rx);
        // Must not panic once nobody listens.
        emitter.emit(TerminalEvent::UnknownCustomer);
    }

    #[test]
    fn test_logout_reason_display() {
        assert_eq!(LogoutReason::Inactivity.to_string(), "inactivity");
    }
}

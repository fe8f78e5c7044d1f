//! # Channel State & Capture
//!
//! Per-channel gate plus a one-shot capture slot.
//!
//! ## Capture Rendezvous
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  AdminFlow                      ChannelState           DeviceReader     │
//! │     │                          (channel lock)               │           │
//! │     │  arm() ─────────────────► slot = Some(tx)             │           │
//! │     │                            gate = enabled             │           │
//! │     │  pending.wait() ...                                   │           │
//! │     │                                                       │ token     │
//! │     │                           route(token) ◄──────────────┘           │
//! │     │                            tx.send(token)                         │
//! │     │ ◄──────────────────────── slot = None                             │
//! │     │  Ok(token)                 gate = disabled                        │
//! │                                                                         │
//! │  Delivery and the "is this a capture?" decision happen under the same   │
//! │  lock, so a token is either captured or routed normally, never both.    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use tokio::sync::oneshot;
use tracing::debug;

use micropay_core::Channel;

use crate::error::{TerminalError, TerminalResult};

// =============================================================================
// Routing Decision
// =============================================================================

/// What to do with a token that arrived on a channel.
#[derive(Debug, PartialEq, Eq)]
pub enum Dispatch<T> {
    /// Gate closed; the token was drained and discarded.
    Dropped,
    /// Handed to the armed capture.
    Captured,
    /// Normal processing (login / purchase).
    Route(T),
}

// =============================================================================
// Channel State
// =============================================================================

/// Gate and capture slot for one channel.
#[derive(Debug)]
pub struct ChannelState<T> {
    channel: Channel,
    enabled: bool,
    capture: Option<oneshot::Sender<T>>,
}

impl<T> ChannelState<T> {
    /// An enabled channel with no capture armed.
    pub fn new(channel: Channel) -> Self {
        ChannelState {
            channel,
            enabled: true,
            capture: None,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// True while a capture is armed and its waiter is still listening.
    pub fn is_armed(&self) -> bool {
        self.capture.as_ref().is_some_and(|tx| !tx.is_closed())
    }

    /// Opens or closes the gate. Closing it releases any armed capture, which
    /// wakes the waiter with `CaptureAborted`.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
        if !enabled && self.capture.take().is_some() {
            debug!(channel = %self.channel, "Gate closed, armed capture released");
        }
    }

    /// Arms a capture and opens the gate.
    ///
    /// A slot whose waiter has gone away counts as free.
    pub fn arm(&mut self) -> TerminalResult<PendingCapture<T>> {
        if self.is_armed() {
            return Err(TerminalError::CaptureAlreadyArmed {
                channel: self.channel,
            });
        }

        let (tx, rx) = oneshot::channel();
        self.capture = Some(tx);
        self.enabled = true;

        debug!(channel = %self.channel, "Capture armed");
        Ok(PendingCapture {
            channel: self.channel,
            rx,
        })
    }

    /// Decides what an incoming token means. Must be called with the channel
    /// lock held for as long as the caller acts on the decision.
    pub fn dispatch(&mut self, token: T) -> Dispatch<T> {
        if !self.enabled {
            return Dispatch::Dropped;
        }

        match self.capture.take() {
            Some(tx) => match tx.send(token) {
                Ok(()) => {
                    // The admin flow still owns the channel.
                    self.enabled = false;
                    debug!(channel = %self.channel, "Token captured");
                    Dispatch::Captured
                }
                // Waiter gone: treat as if nothing was armed.
                Err(token) => Dispatch::Route(token),
            },
            None => Dispatch::Route(token),
        }
    }
}

// =============================================================================
// Pending Capture
// =============================================================================

/// The waiting side of an armed capture.
#[derive(Debug)]
pub struct PendingCapture<T> {
    channel: Channel,
    rx: oneshot::Receiver<T>,
}

impl<T> PendingCapture<T> {
    pub fn channel(&self) -> Channel {
        self.channel
    }

    /// Suspends until the next token on the channel. No timeout.
    ///
    /// ## Errors
    /// `CaptureAborted` if the slot was released (gate closed) before a
    /// token arrived.
    pub async fn wait(self) -> TerminalResult<T> {
        self.rx.await.map_err(|_| TerminalError::CaptureAborted {
            channel: self.channel,
        })
    }

    /// Abandons the capture. Same as dropping it.
    pub fn cancel(self) {
        debug!(channel = %self.channel, "Capture cancelled");
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

//! # Inactivity Monitor
//!
//! The only source of automatic logout. Ticks at a fixed period and ends the
//! session once it has been idle longer than the timeout.
//!
//! ```text
//!   tick ──► now - last_activity > timeout ? ──yes──► logout(Inactivity)
//!    ▲                    │ no                         (no-op while an admin
//!    └────────────────────┘                             flow owns the card
//!                                                       channel)
//! ```

use std::time::{Duration, Instant};

use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::terminal::Terminal;

// =============================================================================
// Configuration
// =============================================================================

/// Monitor timing.
#[derive(Debug, Clone, Copy)]
pub struct MonitorConfig {
    /// Tick period.
    pub check_interval: Duration,

    /// Idle time after which the session ends.
    pub timeout: Duration,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        MonitorConfig {
            check_interval: Duration::from_secs(1),
            timeout: Duration::from_secs(30),
        }
    }
}

// =============================================================================
// Monitor
// =============================================================================

/// Handle for stopping a running monitor.
#[derive(Clone)]
pub struct MonitorHandle {
    shutdown_tx: mpsc::Sender<()>,
}

impl MonitorHandle {
    pub async fn shutdown(&self) {
        let _ = self.shutdown_tx.send(()).await;
    }
}

/// Periodic idle check against one terminal.
pub struct InactivityMonitor {
    terminal: Terminal,
    config: MonitorConfig,
}

impl InactivityMonitor {
    pub fn new(terminal: Terminal, config: MonitorConfig) -> Self {
        InactivityMonitor { terminal, config }
    }

    /// One check as of `now`. Returns true if it logged the session out.
    pub async fn check_at(&self, now: Instant) -> bool {
        self.terminal.logout_if_idle(now, self.config.timeout).await
    }

    /// Spawns the monitor loop.
    pub fn spawn(self) -> (MonitorHandle, tokio::task::JoinHandle<()>) {
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
        let task = tokio::spawn(self.run(shutdown_rx));
        (MonitorHandle { shutdown_tx }, task)
    }

    async fn run(self, mut shutdown_rx: mpsc::Receiver<()>) {
        info!(
            interval = ?self.config.check_interval,
            timeout = ?self.config.timeout,
            "Inactivity monitor starting"
        );

        let mut interval = tokio::time::interval(self.config.check_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if self.check_at(Instant::now()).await {
                        debug!("Session expired");
                    }
                }

                _ = shutdown_rx.recv() => {
                    info!("Inactivity monitor shutting down");
                    break;
                }
            }
        }

        info!("Inactivity monitor stopped");
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

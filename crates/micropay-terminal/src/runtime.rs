//! # Terminal Runtime
//!
//! Starts and stops the background tasks around one [`Terminal`]: a reader
//! per device and the inactivity monitor.
//!
//! ```text
//!   TerminalRuntime::start
//!     ├── DeviceReader(card)     ──┐
//!     ├── DeviceReader(barcode)  ──┼──► Terminal
//!     └── InactivityMonitor      ──┘
//! ```

use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{info, warn};

use micropay_core::Channel;

use crate::config::TerminalConfig;
use crate::device::{serial_sources, DeviceReader, DeviceReaderHandle, EventSource};
use crate::monitor::{InactivityMonitor, MonitorConfig, MonitorHandle};
use crate::terminal::{Router, Terminal};

/// How long shutdown waits for each task to finish.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

/// Owns the reader and monitor tasks of a running terminal.
pub struct TerminalRuntime {
    terminal: Terminal,
    readers: Vec<(DeviceReaderHandle, JoinHandle<()>)>,
    monitor: Option<(MonitorHandle, JoinHandle<()>)>,
}

impl TerminalRuntime {
    /// Opens the configured serial devices and starts every task.
    pub fn start(terminal: Terminal, config: &TerminalConfig) -> Self {
        let (card, barcode) = serial_sources(
            &config.devices.card_path,
            &config.devices.barcode_path,
            config.frame_config(),
        );

        info!(
            card = ?config.devices.card_path,
            barcode = ?config.devices.barcode_path,
            "Starting terminal runtime"
        );
        Self::start_with_sources(terminal, card, barcode, config.monitor_config())
    }

    /// Starts every task on caller-supplied sources.
    pub fn start_with_sources<C, B>(
        terminal: Terminal,
        card: C,
        barcode: B,
        monitor: MonitorConfig,
    ) -> Self
    where
        C: EventSource + 'static,
        B: EventSource + 'static,
        Terminal: Router<C::Token> + Router<B::Token>,
    {
        let readers = vec![
            DeviceReader::spawn(Channel::Card, card, terminal.clone()),
            DeviceReader::spawn(Channel::Barcode, barcode, terminal.clone()),
        ];
        let monitor = InactivityMonitor::new(terminal.clone(), monitor).spawn();

        TerminalRuntime {
            terminal,
            readers,
            monitor: Some(monitor),
        }
    }

    pub fn terminal(&self) -> &Terminal {
        &self.terminal
    }

    /// Stops all tasks and waits for them to finish.
    pub async fn shutdown(mut self) {
        info!("Shutting down terminal runtime");

        if let Some((handle, task)) = self.monitor.take() {
            handle.shutdown().await;
            if tokio::time::timeout(SHUTDOWN_GRACE, task).await.is_err() {
                warn!("Inactivity monitor did not stop in time");
            }
        }

        for (handle, task) in self.readers.drain(..) {
            handle.shutdown().await;
            if tokio::time::timeout(SHUTDOWN_GRACE, task).await.is_err() {
                warn!(channel = %handle.channel(), "Device reader did not stop in time");
            }
        }

        info!("Terminal runtime stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use micropay_core::{BarcodeToken, CardToken, Money};
    use micropay_db::{Database, DbConfig};

    use crate::device::ScriptedSource;

    #[tokio::test]
    async fn test_scripted_swipe_logs_in_and_shutdown_completes() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let token = CardToken::from_swipe(b"C1\r");
        db.accounts()
            .create(&token, "Alice", Money::from_minor(500))
            .await
            .unwrap();
        let terminal = Terminal::new(db);

        let runtime = TerminalRuntime::start_with_sources(
            terminal.clone(),
            ScriptedSource::new([token]),
            ScriptedSource::<BarcodeToken>::new([]),
            MonitorConfig::default(),
        );

        for _ in 0..200 {
            if terminal.session().await.is_logged_in() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert!(runtime.terminal().session().await.is_logged_in());

        tokio::time::timeout(Duration::from_secs(10), runtime.shutdown())
            .await
            .unwrap();
    }
}

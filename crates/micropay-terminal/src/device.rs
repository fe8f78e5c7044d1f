//! # Device Readers
//!
//! Turns the two serial byte streams into tokens and feeds them to the
//! terminal.
//!
//! ## Reader Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  /dev/ttyS0 ──► FrameStream ──► CardSource ─────┐                      │
//! │                  (reopen w/                     │                      │
//! │                   backoff)                      ▼                      │
//! │                                          DeviceReader task             │
//! │  /dev/ttyUSB0 ─► FrameStream ──► BarcodeSource ─┘   │                  │
//! │                                                     │ Router::route    │
//! │                                                     ▼                  │
//! │                                                 Terminal               │
//! │                                                                         │
//! │  A read error or EOF never reaches the terminal: the stream logs a     │
//! │  DeviceFault and reopens the device after an exponential backoff.      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::collections::VecDeque;
use std::io;
use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use backoff::backoff::Backoff;
use backoff::ExponentialBackoff;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use micropay_core::{BarcodeToken, CardToken, Channel};

use crate::error::TerminalError;
use crate::terminal::Router;

// =============================================================================
// Event Source
// =============================================================================

/// A lazy sequence of tokens, one per physical scan.
///
/// Strictly sequential: one call to `next` at a time. Device sources never
/// end; `None` only comes from finite sources used in tests and tooling.
#[async_trait]
pub trait EventSource: Send {
    type Token: Send + 'static;

    async fn next(&mut self) -> Option<Self::Token>;
}

/// Replays a fixed list of tokens, then ends.
pub struct ScriptedSource<T> {
    tokens: VecDeque<T>,
}

impl<T> ScriptedSource<T> {
    pub fn new(tokens: impl IntoIterator<Item = T>) -> Self {
        ScriptedSource {
            tokens: tokens.into_iter().collect(),
        }
    }
}

#[async_trait]
impl<T: Send + 'static> EventSource for ScriptedSource<T> {
    type Token = T;

    async fn next(&mut self) -> Option<T> {
        self.tokens.pop_front()
    }
}

// =============================================================================
// Device Opener
// =============================================================================

/// Opens (and reopens) the byte stream behind a device.
#[async_trait]
pub trait DeviceOpener: Send + Sync {
    type Reader: AsyncRead + Unpin + Send;

    async fn open(&self) -> io::Result<Self::Reader>;

    /// Name for log lines.
    fn describe(&self) -> String;
}

/// A character device (or any file) opened read-only.
///
/// Line settings such as baud rate are left to the system (`stty`).
#[derive(Debug, Clone)]
pub struct SerialDevice {
    path: PathBuf,
}

impl SerialDevice {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        SerialDevice { path: path.into() }
    }
}

#[async_trait]
impl DeviceOpener for SerialDevice {
    type Reader = tokio::fs::File;

    async fn open(&self) -> io::Result<tokio::fs::File> {
        tokio::fs::File::open(&self.path).await
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

// =============================================================================
// Frame Stream
// =============================================================================

/// Framing and reconnect settings for one device.
#[derive(Debug, Clone)]
pub struct FrameConfig {
    /// Byte that ends every frame (included in the frame).
    pub terminator: u8,

    /// First reopen delay.
    pub initial_backoff: Duration,

    /// Reopen delay ceiling.
    pub max_backoff: Duration,
}

impl Default for FrameConfig {
    fn default() -> Self {
        FrameConfig {
            terminator: b'\r',
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(30),
        }
    }
}

/// Terminator-framed reader that reopens its device on any failure.
pub struct FrameStream<O: DeviceOpener> {
    opener: O,
    config: FrameConfig,
    reader: Option<BufReader<O::Reader>>,
    backoff: ExponentialBackoff,
    buf: Vec<u8>,
}

impl<O: DeviceOpener> FrameStream<O> {
    pub fn new(opener: O, config: FrameConfig) -> Self {
        let backoff = ExponentialBackoff {
            initial_interval: config.initial_backoff,
            max_interval: config.max_backoff,
            multiplier: 2.0,
            max_elapsed_time: None, // Devices are retried forever
            ..Default::default()
        };

        FrameStream {
            opener,
            config,
            reader: None,
            backoff,
            buf: Vec::with_capacity(64),
        }
    }

    /// Returns the next complete frame, terminator included.
    ///
    /// Never fails: open and read errors are logged and retried.
    pub async fn next_frame(&mut self) -> Vec<u8> {
        loop {
            if self.reader.is_none() {
                match self.opener.open().await {
                    Ok(reader) => {
                        info!(device = %self.opener.describe(), "Device opened");
                        self.reader = Some(BufReader::new(reader));
                    }
                    Err(e) => {
                        self.fault(e.to_string()).await;
                        continue;
                    }
                }
            }

            match self.read_frame().await {
                Ok(Some(frame)) => {
                    self.backoff.reset();
                    return frame;
                }
                Ok(None) => {
                    self.reader = None;
                    self.fault("end of stream".to_string()).await;
                }
                Err(e) => {
                    self.reader = None;
                    self.fault(e.to_string()).await;
                }
            }
        }
    }

    /// Reads up to the next terminator. `Ok(None)` on end of stream.
    async fn read_frame(&mut self) -> io::Result<Option<Vec<u8>>> {
        let Some(reader) = self.reader.as_mut() else {
            return Ok(None);
        };

        // Partial bytes stay in `buf` if this future is dropped mid-read.
        let n = reader.read_until(self.config.terminator, &mut self.buf).await?;
        if n == 0 || self.buf.last() != Some(&self.config.terminator) {
            if !self.buf.is_empty() {
                warn!(
                    device = %self.opener.describe(),
                    bytes = self.buf.len(),
                    "Discarding unterminated frame"
                );
                self.buf.clear();
            }
            return Ok(None);
        }

        Ok(Some(std::mem::take(&mut self.buf)))
    }

    async fn fault(&mut self, message: String) {
        let fault = TerminalError::DeviceFault {
            device: self.opener.describe(),
            message,
        };

        // ExponentialBackoff without max_elapsed_time always yields a delay.
        let delay = self
            .backoff
            .next_backoff()
            .unwrap_or(self.config.max_backoff);

        warn!(error = %fault, ?delay, "Device unavailable, reopening after backoff");
        tokio::time::sleep(delay).await;
    }
}

// =============================================================================
// Token Sources
// =============================================================================

/// Card reader: every frame becomes a hashed token.
pub struct CardSource<O: DeviceOpener> {
    frames: FrameStream<O>,
}

impl<O: DeviceOpener> CardSource<O> {
    pub fn new(opener: O, config: FrameConfig) -> Self {
        CardSource {
            frames: FrameStream::new(opener, config),
        }
    }
}

#[async_trait]
impl<O: DeviceOpener> EventSource for CardSource<O> {
    type Token = CardToken;

    async fn next(&mut self) -> Option<CardToken> {
        let frame = self.frames.next_frame().await;
        Some(CardToken::from_swipe(&frame))
    }
}

/// Barcode scanner: frames are reduced to digits; frames with none are
/// skipped.
pub struct BarcodeSource<O: DeviceOpener> {
    frames: FrameStream<O>,
}

impl<O: DeviceOpener> BarcodeSource<O> {
    pub fn new(opener: O, config: FrameConfig) -> Self {
        BarcodeSource {
            frames: FrameStream::new(opener, config),
        }
    }
}

#[async_trait]
impl<O: DeviceOpener> EventSource for BarcodeSource<O> {
    type Token = BarcodeToken;

    async fn next(&mut self) -> Option<BarcodeToken> {
        loop {
            let frame = self.frames.next_frame().await;
            match BarcodeToken::from_scan(&frame) {
                Ok(code) => return Some(code),
                Err(e) => debug!(error = %e, "Skipping barcode frame"),
            }
        }
    }
}

// =============================================================================
// Device Reader Task
// =============================================================================

/// Handle for stopping a running device reader.
#[derive(Clone)]
pub struct DeviceReaderHandle {
    channel: Channel,
    shutdown_tx: mpsc::Sender<()>,
}

impl DeviceReaderHandle {
    pub fn channel(&self) -> Channel {
        self.channel
    }

    /// Stops the reader. Returns once the signal is queued; a reader that
    /// has already stopped is not an error.
    pub async fn shutdown(&self) {
        let _ = self.shutdown_tx.send(()).await;
    }
}

/// Pumps one source into a router until shut down or the source ends.
pub struct DeviceReader;

impl DeviceReader {
    /// Spawns the reader task.
    ///
    /// Routing errors are logged; they never stop the reader.
    pub fn spawn<S, R>(
        channel: Channel,
        source: S,
        router: R,
    ) -> (DeviceReaderHandle, tokio::task::JoinHandle<()>)
    where
        S: EventSource + 'static,
        R: Router<S::Token> + 'static,
    {
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
        let task = tokio::spawn(Self::run(channel, source, router, shutdown_rx));
        (DeviceReaderHandle { channel, shutdown_tx }, task)
    }

    async fn run<S, R>(channel: Channel, mut source: S, router: R, mut shutdown_rx: mpsc::Receiver<()>)
    where
        S: EventSource,
        R: Router<S::Token>,
    {
        info!(%channel, "Device reader starting");

        loop {
            tokio::select! {
                token = source.next() => {
                    let Some(token) = token else {
                        info!(%channel, "Source ended");
                        break;
                    };

                    if let Err(e) = router.route(token).await {
                        if e.is_operator_error() {
                            warn!(%channel, error = %e, "Routing rejected token");
                        } else {
                            error!(%channel, error = %e, "Routing failed");
                        }
                    }
                }

                _ = shutdown_rx.recv() => {
                    info!(%channel, "Device reader shutting down");
                    break;
                }
            }
        }

        info!(%channel, "Device reader stopped");
    }
}

/// Convenience for building both sources from device paths.
pub fn serial_sources(
    card_path: impl Into<PathBuf>,
    barcode_path: impl Into<PathBuf>,
    config: FrameConfig,
) -> (CardSource<SerialDevice>, BarcodeSource<SerialDevice>) {
    (
        CardSource::new(SerialDevice::new(card_path), config.clone()),
        BarcodeSource::new(SerialDevice::new(barcode_path), config),
    )
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TerminalResult;
    use std::sync::{Arc, Mutex};
    use tokio::io::{AsyncWriteExt, DuplexStream};

    /// Hands out queued streams; errors once the queue is empty.
    struct QueuedOpener {
        streams: Mutex<VecDeque<io::Result<DuplexStream>>>,
        opens: Arc<Mutex<usize>>,
    }

    impl QueuedOpener {
        fn new(streams: Vec<io::Result<DuplexStream>>) -> (Self, Arc<Mutex<usize>>) {
            let opens = Arc::new(Mutex::new(0));
            (
                QueuedOpener {
                    streams: Mutex::new(streams.into()),
                    opens: opens.clone(),
                },
                opens,
            )
        }
    }

    #[async_trait]
    impl DeviceOpener for QueuedOpener {
        type Reader = DuplexStream;

        async fn open(&self) -> io::Result<DuplexStream> {
            *self.opens.lock().unwrap() += 1;
            let next = self.streams.lock().unwrap().pop_front();
            next.unwrap_or_else(|| Err(io::Error::new(io::ErrorKind::NotFound, "gone")))
        }

        fn describe(&self) -> String {
            "test-device".to_string()
        }
    }

    fn fast() -> FrameConfig {
        FrameConfig {
            terminator: b'\r',
            initial_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(5),
        }
    }

    async fn stream_with(bytes: &[u8]) -> DuplexStream {
        let (mut writer, reader) = tokio::io::duplex(256);
        writer.write_all(bytes).await.unwrap();
        // Dropping the writer ends the stream after the bytes are read.
        drop(writer);
        reader
    }

    #[tokio::test]
    async fn test_card_frames_are_hashed_with_terminator() {
        let (opener, _) = QueuedOpener::new(vec![Ok(stream_with(b";4711?\r;4712?\r").await)]);
        let mut source = CardSource::new(opener, fast());

        assert_eq!(source.next().await, Some(CardToken::from_swipe(b";4711?\r")));
        assert_eq!(source.next().await, Some(CardToken::from_swipe(b";4712?\r")));
    }

    #[tokio::test]
    async fn test_barcode_frames_without_digits_are_skipped() {
        let (opener, _) = QueuedOpener::new(vec![Ok(stream_with(b"\r57-01 234\r").await)]);
        let mut source = BarcodeSource::new(opener, fast());

        assert_eq!(source.next().await, Some("5701234".parse().unwrap()));
    }

    #[tokio::test]
    async fn test_reopens_after_open_failure_and_eof() {
        let (opener, opens) = QueuedOpener::new(vec![
            Err(io::Error::new(io::ErrorKind::PermissionDenied, "busy")),
            Ok(stream_with(b"1\r").await),
            Ok(stream_with(b"2\r").await),
        ]);
        let mut source = BarcodeSource::new(opener, fast());

        assert_eq!(source.next().await.unwrap().as_str(), "1");
        // First stream hits EOF, so the device is reopened.
        assert_eq!(source.next().await.unwrap().as_str(), "2");
        assert_eq!(*opens.lock().unwrap(), 3);
    }

    #[tokio::test]
    async fn test_unterminated_tail_is_discarded() {
        let (opener, _) = QueuedOpener::new(vec![
            Ok(stream_with(b"12").await),
            Ok(stream_with(b"34\r").await),
        ]);
        let mut source = BarcodeSource::new(opener, fast());

        assert_eq!(source.next().await.unwrap().as_str(), "34");
    }

    struct Collect(Arc<Mutex<Vec<String>>>);

    #[async_trait]
    impl Router<BarcodeToken> for Collect {
        async fn route(&self, token: BarcodeToken) -> TerminalResult<()> {
            self.0.lock().unwrap().push(token.to_string());
            if token.as_str() == "2" {
                return Err(TerminalError::UnknownProduct {
                    barcode: token.to_string(),
                });
            }
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_reader_survives_routing_errors() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let source = ScriptedSource::new(["1", "2", "3"].map(|c| c.parse::<BarcodeToken>().unwrap()));

        let (_handle, task) = DeviceReader::spawn(Channel::Barcode, source, Collect(seen.clone()));
        task.await.unwrap();

        assert_eq!(*seen.lock().unwrap(), vec!["1", "2", "3"]);
    }

    #[tokio::test]
    async fn test_reader_stops_on_shutdown() {
        let (opener, _) = QueuedOpener::new(vec![]);
        let source = BarcodeSource::new(opener, fast());
        let seen = Arc::new(Mutex::new(Vec::new()));

        let (handle, task) = DeviceReader::spawn(Channel::Barcode, source, Collect(seen.clone()));
        assert_eq!(handle.channel(), Channel::Barcode);
        handle.shutdown().await;

        tokio::time::timeout(Duration::from_secs(2), task)
            .await
            .unwrap()
            .unwrap();
        assert!(seen.lock().unwrap().is_empty());
    }
}

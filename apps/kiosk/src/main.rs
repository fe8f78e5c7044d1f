//! # Micropay Kiosk Entry Point
//!
//! Runs one self-service terminal: a card reader, a barcode scanner, and an
//! operator keyboard in front of a local ledger.
//!
//! ## Startup Sequence
//! 1. Parse arguments (`--config <path>`)
//! 2. Load configuration (file, then `MICROPAY_*` environment)
//! 3. Initialize tracing (stderr or the configured log file)
//! 4. Open the ledger and run migrations
//! 5. Start device readers and the inactivity monitor
//! 6. Run the console until the keyboard closes or a signal arrives

mod console;

use std::fs::{File, OpenOptions};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use micropay_db::Database;
use micropay_terminal::config::LoggingSettings;
use micropay_terminal::{ChannelEmitter, Terminal, TerminalConfig, TerminalRuntime};

use crate::console::{print_events, spawn_key_reader, Console, RawModeGuard};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let Some(config_path) = parse_args()? else {
        return Ok(());
    };

    let config = TerminalConfig::load(config_path)?;
    init_tracing(&config.logging)?;

    info!("Starting micropay kiosk");

    if let Some(parent) = config.database.path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let db = Database::new(config.db_config()).await?;
    info!("Ledger ready");

    let (emitter, events) = ChannelEmitter::new();
    let terminal = Terminal::with_emitter(db.clone(), Arc::new(emitter));
    let runtime = TerminalRuntime::start(terminal.clone(), &config);

    let printer = tokio::spawn(print_events(events, config.display.currency.clone()));

    {
        let _raw = RawModeGuard::enable()?;
        let mut console = Console::new(spawn_key_reader(), config.display.currency.clone());

        tokio::select! {
            _ = console.run(&terminal) => info!("Keyboard closed"),
            _ = shutdown_signal() => {}
        }
    }

    runtime.shutdown().await;
    printer.abort();
    db.close().await;

    info!("Micropay kiosk stopped");
    Ok(())
}

/// Returns `Some(config path)` to run, or `None` after printing help.
fn parse_args() -> Result<Option<Option<PathBuf>>, Box<dyn std::error::Error>> {
    let mut config = None;
    let mut args = std::env::args().skip(1);

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" | "-c" => {
                let path = args.next().ok_or("--config needs a path")?;
                config = Some(PathBuf::from(path));
            }
            "--help" | "-h" => {
                println!("Usage: micropay [--config <terminal.toml>]");
                if let Some(path) = TerminalConfig::default_config_path() {
                    println!("Default config: {}", path.display());
                }
                return Ok(None);
            }
            other => return Err(format!("unknown argument: {other}").into()),
        }
    }

    Ok(Some(config))
}

/// Initializes the tracing subscriber.
///
/// `RUST_LOG` wins over the configured filter. With a log file configured,
/// the console stays free of log lines.
fn init_tracing(settings: &LoggingSettings) -> Result<(), Box<dyn std::error::Error>> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&settings.filter));

    match &settings.file {
        Some(path) => {
            let file: File = OpenOptions::new().create(true).append(true).open(path)?;
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .init();
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install signal handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}

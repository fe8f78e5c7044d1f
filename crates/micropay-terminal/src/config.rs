//! # Terminal Configuration
//!
//! Device paths, ledger location, and session timing.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     MICROPAY_DB_PATH=/var/lib/micropay/ledger.db                       │
//! │     MICROPAY_CARD_DEVICE=/dev/ttyS1                                    │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/micropay/terminal.toml (Linux)                           │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! │     /dev/ttyS0 card, /dev/ttyUSB0 barcode, 30 s idle timeout           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! # terminal.toml
//! [database]
//! path = "/var/lib/micropay/ledger.db"
//!
//! [devices]
//! card_path = "/dev/ttyS0"
//! barcode_path = "/dev/ttyUSB0"
//! terminator = 13
//!
//! [session]
//! inactivity_timeout_secs = 30
//! check_interval_secs = 1
//!
//! [display]
//! currency = "DKK"
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};

use micropay_db::DbConfig;

use crate::device::FrameConfig;
use crate::error::{TerminalError, TerminalResult};
use crate::monitor::MonitorConfig;

// =============================================================================
// Database Settings
// =============================================================================

/// Where the ledger lives.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseSettings {
    /// SQLite file path.
    #[serde(default = "default_db_path")]
    pub path: PathBuf,

    /// Pool size.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_db_path() -> PathBuf {
    directories::ProjectDirs::from("org", "micropay", "micropay")
        .map(|dirs| dirs.data_dir().join("ledger.db"))
        .unwrap_or_else(|| PathBuf::from("micropay.db"))
}

fn default_max_connections() -> u32 {
    5
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        DatabaseSettings {
            path: default_db_path(),
            max_connections: default_max_connections(),
        }
    }
}

// =============================================================================
// Device Settings
// =============================================================================

/// Reader device nodes and framing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceSettings {
    /// Magnetic card reader.
    #[serde(default = "default_card_path")]
    pub card_path: PathBuf,

    /// Barcode scanner.
    #[serde(default = "default_barcode_path")]
    pub barcode_path: PathBuf,

    /// Frame terminator byte (13 = carriage return).
    #[serde(default = "default_terminator")]
    pub terminator: u8,

    /// First reopen delay after a device fault (milliseconds).
    #[serde(default = "default_initial_backoff")]
    pub initial_backoff_ms: u64,

    /// Reopen delay ceiling (seconds).
    #[serde(default = "default_max_backoff")]
    pub max_backoff_secs: u64,
}

fn default_card_path() -> PathBuf {
    PathBuf::from("/dev/ttyS0")
}

fn default_barcode_path() -> PathBuf {
    PathBuf::from("/dev/ttyUSB0")
}

fn default_terminator() -> u8 {
    b'\r'
}

fn default_initial_backoff() -> u64 {
    500
}

fn default_max_backoff() -> u64 {
    30
}

impl Default for DeviceSettings {
    fn default() -> Self {
        DeviceSettings {
            card_path: default_card_path(),
            barcode_path: default_barcode_path(),
            terminator: default_terminator(),
            initial_backoff_ms: default_initial_backoff(),
            max_backoff_secs: default_max_backoff(),
        }
    }
}

// =============================================================================
// Session Settings
// =============================================================================

/// Inactivity timing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSettings {
    /// Idle seconds after which the session ends.
    #[serde(default = "default_inactivity_timeout")]
    pub inactivity_timeout_secs: u64,

    /// Monitor tick period (seconds).
    #[serde(default = "default_check_interval")]
    pub check_interval_secs: u64,
}

fn default_inactivity_timeout() -> u64 {
    30
}

fn default_check_interval() -> u64 {
    1
}

impl Default for SessionSettings {
    fn default() -> Self {
        SessionSettings {
            inactivity_timeout_secs: default_inactivity_timeout(),
            check_interval_secs: default_check_interval(),
        }
    }
}

// =============================================================================
// Logging & Display
// =============================================================================

/// Log sink and filter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// Log file. Logs go to stderr when unset.
    #[serde(default)]
    pub file: Option<PathBuf>,

    /// `tracing_subscriber::EnvFilter` directive, used when `RUST_LOG` is unset.
    #[serde(default = "default_log_filter")]
    pub filter: String,
}

fn default_log_filter() -> String {
    "info,micropay=debug,sqlx=warn".to_string()
}

impl Default for LoggingSettings {
    fn default() -> Self {
        LoggingSettings {
            file: None,
            filter: default_log_filter(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisplaySettings {
    /// Currency label printed after amounts.
    #[serde(default = "default_currency")]
    pub currency: String,
}

fn default_currency() -> String {
    "DKK".to_string()
}

impl Default for DisplaySettings {
    fn default() -> Self {
        DisplaySettings {
            currency: default_currency(),
        }
    }
}

// =============================================================================
// Main Terminal Configuration
// =============================================================================

/// Complete terminal configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TerminalConfig {
    #[serde(default)]
    pub database: DatabaseSettings,

    #[serde(default)]
    pub devices: DeviceSettings,

    #[serde(default)]
    pub session: SessionSettings,

    #[serde(default)]
    pub logging: LoggingSettings,

    #[serde(default)]
    pub display: DisplaySettings,
}

impl TerminalConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (terminal.toml)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> TerminalResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading terminal config from file");
                let contents = std::fs::read_to_string(&path)?;
                config = toml::from_str(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Loads config or returns default if load fails.
    pub fn load_or_default(config_path: Option<PathBuf>) -> Self {
        Self::load(config_path).unwrap_or_else(|e| {
            warn!("Failed to load terminal config: {}. Using defaults.", e);
            Self::default()
        })
    }

    /// Saves configuration to file.
    pub fn save(&self, config_path: Option<PathBuf>) -> TerminalResult<()> {
        let path = config_path
            .or_else(Self::default_config_path)
            .ok_or_else(|| TerminalError::Config("No config path available".into()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(&path, contents)?;

        info!(?path, "Terminal config saved");
        Ok(())
    }

    /// Validates the configuration.
    pub fn validate(&self) -> TerminalResult<()> {
        if self.database.path.as_os_str().is_empty() {
            return Err(TerminalError::Config("database.path must not be empty".into()));
        }

        if self.database.max_connections == 0 {
            return Err(TerminalError::Config(
                "database.max_connections must be greater than 0".into(),
            ));
        }

        if self.devices.card_path.as_os_str().is_empty()
            || self.devices.barcode_path.as_os_str().is_empty()
        {
            return Err(TerminalError::Config("device paths must not be empty".into()));
        }

        if self.session.inactivity_timeout_secs == 0 {
            return Err(TerminalError::Config(
                "session.inactivity_timeout_secs must be greater than 0".into(),
            ));
        }

        if self.session.check_interval_secs == 0 {
            return Err(TerminalError::Config(
                "session.check_interval_secs must be greater than 0".into(),
            ));
        }

        if self.session.check_interval_secs > self.session.inactivity_timeout_secs {
            return Err(TerminalError::Config(format!(
                "session.check_interval_secs ({}) exceeds the inactivity timeout ({})",
                self.session.check_interval_secs, self.session.inactivity_timeout_secs
            )));
        }

        Ok(())
    }

    /// Applies environment variable overrides.
    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(path) = var("MICROPAY_DB_PATH") {
            debug!(path = %path, "Overriding database path from environment");
            self.database.path = PathBuf::from(path);
        }

        if let Some(path) = var("MICROPAY_CARD_DEVICE") {
            debug!(path = %path, "Overriding card device from environment");
            self.devices.card_path = PathBuf::from(path);
        }

        if let Some(path) = var("MICROPAY_BARCODE_DEVICE") {
            debug!(path = %path, "Overriding barcode device from environment");
            self.devices.barcode_path = PathBuf::from(path);
        }

        if let Some(secs) = var("MICROPAY_INACTIVITY_TIMEOUT") {
            match secs.parse::<u64>() {
                Ok(s) => self.session.inactivity_timeout_secs = s,
                Err(_) => warn!(value = %secs, "Ignoring non-numeric MICROPAY_INACTIVITY_TIMEOUT"),
            }
        }
    }

    /// Returns the default config file path.
    pub fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("org", "micropay", "micropay")
            .map(|dirs| dirs.config_dir().join("terminal.toml"))
    }

    // =========================================================================
    // Convenience Methods
    // =========================================================================

    pub fn db_config(&self) -> DbConfig {
        DbConfig::new(&self.database.path).max_connections(self.database.max_connections)
    }

    pub fn frame_config(&self) -> FrameConfig {
        FrameConfig {
            terminator: self.devices.terminator,
            initial_backoff: Duration::from_millis(self.devices.initial_backoff_ms),
            max_backoff: Duration::from_secs(self.devices.max_backoff_secs),
        }
    }

    pub fn monitor_config(&self) -> MonitorConfig {
        MonitorConfig {
            check_interval: Duration::from_secs(self.session.check_interval_secs),
            timeout: Duration::from_secs(self.session.inactivity_timeout_secs),
        }
    }
}

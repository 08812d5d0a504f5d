/// Structured logging for the station manager
///
/// Provides context-rich logging with a source tag and an optional station
/// code on every entry. Entries are emitted as `tracing` events; the
/// subscriber installed by `init_logger` writes them to the console or to
/// an append-mode log file.

use std::fmt;
use std::fs::OpenOptions;
use std::sync::Mutex;

use tracing_subscriber::EnvFilter;

use crate::model::InventoryError;

// ---------------------------------------------------------------------------
// Log Levels
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogLevel::Debug => write!(f, "DEBUG"),
            LogLevel::Info => write!(f, "INFO"),
            LogLevel::Warning => write!(f, "WARN"),
            LogLevel::Error => write!(f, "ERROR"),
        }
    }
}

impl std::str::FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "debug" | "trace" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" | "warning" => Ok(LogLevel::Warning),
            "error" => Ok(LogLevel::Error),
            other => Err(format!("unknown log level '{}'", other)),
        }
    }
}

impl LogLevel {
    fn as_filter(self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warning => "warn",
            LogLevel::Error => "error",
        }
    }
}

// ---------------------------------------------------------------------------
// Sources
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    Store,
    Inventory,
    Import,
    Auth,
    System,
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Source::Store => write!(f, "STORE"),
            Source::Inventory => write!(f, "INVENTORY"),
            Source::Import => write!(f, "IMPORT"),
            Source::Auth => write!(f, "AUTH"),
            Source::System => write!(f, "SYS"),
        }
    }
}

// ---------------------------------------------------------------------------
// Failure Classification
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureType {
    /// Expected failure - station unknown to the inventory, nothing to fill in
    Expected,
    /// Unexpected failure - indicates service degradation or configuration issue
    Unexpected,
    /// Unknown - cannot determine if this is expected or not
    Unknown,
}

impl fmt::Display for FailureType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureType::Expected => write!(f, "EXPECTED"),
            FailureType::Unexpected => write!(f, "UNEXPECTED"),
            FailureType::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

// ---------------------------------------------------------------------------
// Logger Configuration
// ---------------------------------------------------------------------------

/// Install the global subscriber.
///
/// `RUST_LOG`, when set, takes precedence over `min_level`. Calling this a
/// second time returns an error and leaves the first subscriber in place.
pub fn init_logger(
    min_level: LogLevel,
    log_file: Option<&str>,
    console_timestamps: bool,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(min_level.as_filter()));

    match log_file {
        Some(path) => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .try_init()
        }
        None if console_timestamps => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .try_init(),
        None => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .without_time()
            .with_target(false)
            .try_init(),
    }
}

// ---------------------------------------------------------------------------
// Public Logging Functions
// ---------------------------------------------------------------------------

/// Log a general informational message
pub fn info(source: Source, station: Option<&str>, message: &str) {
    tracing::info!(source = %source, station = station.unwrap_or("-"), "{}", message);
}

/// Log a warning message
pub fn warn(source: Source, station: Option<&str>, message: &str) {
    tracing::warn!(source = %source, station = station.unwrap_or("-"), "{}", message);
}

/// Log an error message
pub fn error(source: Source, station: Option<&str>, message: &str) {
    tracing::error!(source = %source, station = station.unwrap_or("-"), "{}", message);
}

/// Log a debug message
pub fn debug(source: Source, station: Option<&str>, message: &str) {
    tracing::debug!(source = %source, station = station.unwrap_or("-"), "{}", message);
}

// ---------------------------------------------------------------------------
// Failure Classification Helpers
// ---------------------------------------------------------------------------

/// Classify an inventory failure by its kind
pub fn classify_inventory_failure(err: &InventoryError) -> FailureType {
    match err {
        // Station unknown upstream; the record is stored without descriptions
        InventoryError::Http(404) => FailureType::Expected,
        InventoryError::Http(_) | InventoryError::Request(_) | InventoryError::MissingToken => {
            FailureType::Unexpected
        }
        // Usually a malformed period-start value in a single record
        InventoryError::Parse(_) => FailureType::Unknown,
    }
}

/// Log an enrichment failure with automatic classification
pub fn log_inventory_failure(station_code: &str, operation: &str, err: &InventoryError) {
    let failure_type = classify_inventory_failure(err);
    let message = format!("{} failed [{}]: {}", operation, failure_type, err);

    match failure_type {
        FailureType::Expected => debug(Source::Inventory, Some(station_code), &message),
        FailureType::Unexpected => error(Source::Inventory, Some(station_code), &message),
        FailureType::Unknown => warn(Source::Inventory, Some(station_code), &message),
    }
}

// ---------------------------------------------------------------------------
// Import Summary Logging
// ---------------------------------------------------------------------------

/// Log a summary of one import run
pub fn log_import_summary(imported: usize, ignored: usize, errors: usize) {
    let message = format!(
        "Import complete: {} imported, {} ignored, {} errors",
        imported, ignored, errors
    );

    if errors == 0 {
        info(Source::Import, None, &message);
    } else if imported == 0 {
        error(Source::Import, None, &message);
    } else {
        warn(Source::Import, None, &message);
    }
}

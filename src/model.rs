/// Shared data types for the station manager.
///
/// Import report structures, list filters and the error types used across
/// the store, inventory, auth and configuration layers. No I/O lives here.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Import report
// ---------------------------------------------------------------------------

/// A line skipped by policy (duplicate code, too few columns).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IgnoredLine {
    pub line: usize,
    pub reason: String,
    pub content: String,
}

/// A line rejected because one of its fields could not be interpreted.
///
/// Line `0` is reserved for failures that are not tied to a line of the
/// payload (e.g. the existing-codes preload).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineError {
    pub line: usize,
    pub error: String,
    pub content: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportSummary {
    /// Every line of the decoded payload, header and blank lines included.
    pub total_lines: usize,
    /// `imported + ignored + errors`; header and blank lines are not counted.
    pub processed: usize,
}

/// Result of one import run. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportReport {
    pub imported: usize,
    pub ignored: Vec<IgnoredLine>,
    pub errors: Vec<LineError>,
    pub summary: ImportSummary,
}

impl ImportReport {
    pub fn new(
        imported: usize,
        ignored: Vec<IgnoredLine>,
        errors: Vec<LineError>,
        total_lines: usize,
    ) -> Self {
        let processed = imported + ignored.len() + errors.len();
        Self {
            imported,
            ignored,
            errors,
            summary: ImportSummary {
                total_lines,
                processed,
            },
        }
    }
}

// ---------------------------------------------------------------------------
// List filter
// ---------------------------------------------------------------------------

/// Optional constraints for `list_all`. `None` leaves a flag unconstrained.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StationFilter {
    pub manual_data: Option<bool>,
    pub forecast_enabled: Option<bool>,
}

impl StationFilter {
    pub fn is_empty(&self) -> bool {
        self.manual_data.is_none() && self.forecast_enabled.is_none()
    }
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Infrastructure failure in the station store.
///
/// "Not found" is never an error: lookups return `Option` and deletes
/// return a count.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store connection failed: {0}")]
    Connection(String),
    #[error("{operation} failed: {message}")]
    Operation {
        operation: &'static str,
        message: String,
    },
    #[error("stored record could not be read: {0}")]
    Corrupt(String),
}

impl StoreError {
    pub fn operation(operation: &'static str, err: impl std::fmt::Display) -> Self {
        StoreError::Operation {
            operation,
            message: err.to_string(),
        }
    }
}

/// Errors raised by the remote inventory service or its token endpoint.
#[derive(Debug, thiserror::Error)]
pub enum InventoryError {
    /// Non-2xx HTTP response.
    #[error("HTTP error: {0}")]
    Http(u16),
    /// Connection failure or timeout.
    #[error("Request failed: {0}")]
    Request(String),
    /// The response body (or a field in it) could not be interpreted.
    #[error("Parse error: {0}")]
    Parse(String),
    /// The token endpoint answered without a token.
    #[error("token endpoint returned no token")]
    MissingToken,
}

impl From<reqwest::Error> for InventoryError {
    fn from(err: reqwest::Error) -> Self {
        match err.status() {
            Some(status) => InventoryError::Http(status.as_u16()),
            None if err.is_decode() => InventoryError::Parse(err.to_string()),
            None => InventoryError::Request(err.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("invalid username or password")]
    InvalidCredentials,
    #[error("invalid or expired token")]
    InvalidToken,
    #[error("token expired")]
    TokenExpired,
    #[error("access denied")]
    Forbidden,
}

impl AuthError {
    /// HTTP status an API layer should answer with.
    pub fn status_code(&self) -> u16 {
        match self {
            AuthError::Forbidden => 403,
            _ => 401,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("required field '{0}' is blank")]
    BlankField(&'static str),
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required setting {0}")]
    Missing(&'static str),
    #[error("invalid value for {name}: {value}")]
    Invalid { name: &'static str, value: String },
    #[error("cannot read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot parse config file {path}: {source}")]
    Toml {
        path: String,
        #[source]
        source: toml::de::Error,
    },
}

/// Errors surfaced by `StationCatalog` operations.
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_processed_counts_imported_ignored_and_errors() {
        let report = ImportReport::new(
            3,
            vec![IgnoredLine {
                line: 4,
                reason: "duplicate within file".into(),
                content: "x".into(),
            }],
            vec![
                LineError {
                    line: 0,
                    error: "preload".into(),
                    content: String::new(),
                },
                LineError {
                    line: 5,
                    error: "bad".into(),
                    content: "y".into(),
                },
            ],
            9,
        );
        assert_eq!(report.summary.processed, 6);
        assert_eq!(report.summary.total_lines, 9);
    }

    #[test]
    fn test_report_serializes_with_expected_keys() {
        let report = ImportReport::new(1, vec![], vec![], 2);
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["imported"], 1);
        assert_eq!(json["summary"]["total_lines"], 2);
        assert_eq!(json["summary"]["processed"], 1);
        assert!(json["ignored"].as_array().unwrap().is_empty());
    }

    #[test]
    fn test_auth_error_status_codes() {
        assert_eq!(AuthError::InvalidCredentials.status_code(), 401);
        assert_eq!(AuthError::TokenExpired.status_code(), 401);
        assert_eq!(AuthError::Forbidden.status_code(), 403);
    }

    #[test]
    fn test_empty_filter() {
        assert!(StationFilter::default().is_empty());
        let filter = StationFilter {
            manual_data: Some(true),
            ..Default::default()
        };
        assert!(!filter.is_empty());
    }
}

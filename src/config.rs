//! Service settings.
//!
//! Loaded from environment variables (a `.env` file is read first when
//! present) or from a TOML file passed on the command line.

use std::env;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::model::ConfigError;

const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Settings {
    /// Credentials accepted by the login operation.
    pub user_name: String,
    pub user_password: String,
    /// Signing key for access tokens. Falls back to `user_password`.
    #[serde(default)]
    pub token_secret: Option<String>,

    pub database_url: String,
    /// Upper bound for every network call (store connect, token, inventory).
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Token endpoint of the inventory provider.
    pub inventory_auth_url: String,
    /// Station inventory endpoint.
    pub inventory_url: String,
    pub inventory_identifier: String,
    pub inventory_password: String,

    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub log_file: Option<String>,
}

fn default_request_timeout() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Settings {
    /// Read settings from the TOML file at `path`, or from the environment
    /// when no path is given.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::from_toml_file(path),
            None => {
                dotenv::dotenv().ok();
                Self::from_lookup(|name| env::var(name).ok())
            }
        }
    }

    pub fn from_toml_file(path: &Path) -> Result<Self, ConfigError> {
        let display = path.display().to_string();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: display.clone(),
            source,
        })?;
        Self::from_toml_str(&text).map_err(|source| ConfigError::Toml {
            path: display,
            source,
        })
    }

    pub fn from_toml_str(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    /// Build settings from a variable lookup. Split out from `load` so tests
    /// don't have to mutate the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |name: &'static str| -> Result<String, ConfigError> {
            lookup(name)
                .filter(|v| !v.trim().is_empty())
                .ok_or(ConfigError::Missing(name))
        };

        let request_timeout_secs = match lookup("REQUEST_TIMEOUT") {
            Some(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid {
                name: "REQUEST_TIMEOUT",
                value: raw.clone(),
            })?,
            None => DEFAULT_REQUEST_TIMEOUT_SECS,
        };

        Ok(Settings {
            user_name: required("USER_NAME")?,
            user_password: required("USER_PASSWORD")?,
            token_secret: lookup("TOKEN_SECRET").filter(|v| !v.is_empty()),
            database_url: required("DATABASE_URL")?,
            request_timeout_secs,
            inventory_auth_url: required("ANA_API_URL")?,
            inventory_url: required("ANA_API_INVENTARIO_URL")?,
            inventory_identifier: required("ANA_IDENTIFICADOR")?,
            inventory_password: required("ANA_SENHA")?,
            log_level: lookup("LOG_LEVEL").unwrap_or_else(default_log_level),
            log_file: lookup("LOG_FILE").filter(|v| !v.is_empty()),
        })
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn token_secret(&self) -> &str {
        self.token_secret.as_deref().unwrap_or(&self.user_password)
    }
}

//! Remote station inventory.
//!
//! The inventory provider publishes descriptive metadata (names, river,
//! coordinates, start of the rating-scale period) keyed by station code.
//! Requests carry a bearer token obtained from a separate endpoint; see
//! [`auth`].

pub mod auth;
pub mod client;

use serde::{Deserialize, Deserializer};

use crate::model::InventoryError;

pub use auth::{BearerSource, InventoryAuth, TokenCache, TOKEN_TTL};
pub use client::HttpInventoryClient;

// ============================================================================
// Response Structures
// ============================================================================

/// Body of an inventory lookup. `items` may be absent or `null` when the
/// code is unknown.
#[derive(Debug, Default, Clone, PartialEq, Deserialize)]
pub struct InventoryResponse {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub items: Vec<InventoryRecord>,
}

impl InventoryResponse {
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// One inventory entry. Numeric fields are kept as text, the way the
/// station record stores them.
#[derive(Debug, Default, Clone, PartialEq, Deserialize)]
pub struct InventoryRecord {
    #[serde(rename = "Estacao_Nome", default, deserialize_with = "text_or_number")]
    pub station_name: Option<String>,
    #[serde(rename = "Bacia_Nome", default, deserialize_with = "text_or_number")]
    pub basin_name: Option<String>,
    #[serde(rename = "Rio_Nome", default, deserialize_with = "text_or_number")]
    pub river_name: Option<String>,
    #[serde(rename = "Altitude", default, deserialize_with = "text_or_number")]
    pub altitude: Option<String>,
    #[serde(rename = "Latitude", default, deserialize_with = "text_or_number")]
    pub latitude: Option<String>,
    #[serde(rename = "Longitude", default, deserialize_with = "text_or_number")]
    pub longitude: Option<String>,
    /// `"YYYY-MM-DD HH:MM:SS[.f]"`.
    #[serde(
        rename = "Data_Periodo_Escala_Inicio",
        default,
        deserialize_with = "text_or_number"
    )]
    pub scale_period_start: Option<String>,
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<Vec<InventoryRecord>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<InventoryRecord>>::deserialize(deserializer)?.unwrap_or_default())
}

fn text_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        None | Some(serde_json::Value::Null) => None,
        Some(serde_json::Value::String(s)) => Some(s),
        Some(other) => Some(other.to_string()),
    })
}

// ============================================================================
// Client contract
// ============================================================================

/// Looks up inventory metadata for a station code.
///
/// An unknown code is an empty response, not an error. Network and HTTP
/// failures are errors.
pub trait InventoryClient {
    fn fetch(&self, code: &str) -> Result<InventoryResponse, InventoryError>;
}

impl<T: InventoryClient + ?Sized> InventoryClient for &T {
    fn fetch(&self, code: &str) -> Result<InventoryResponse, InventoryError> {
        (**self).fetch(code)
    }
}

impl<T: InventoryClient + ?Sized> InventoryClient for Box<T> {
    fn fetch(&self, code: &str) -> Result<InventoryResponse, InventoryError> {
        (**self).fetch(code)
    }
}

/// Client that never finds anything. Used when the service runs offline.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoInventory;

impl InventoryClient for NoInventory {
    fn fetch(&self, _code: &str) -> Result<InventoryResponse, InventoryError> {
        Ok(InventoryResponse::default())
    }
}

// ============================================================================
// Tests
// ============================================================================

//! HTTP client for the station inventory endpoint.

use std::time::Duration;

use super::auth::{BearerSource, InventoryAuth};
use super::{InventoryClient, InventoryResponse};
use crate::config::Settings;
use crate::model::InventoryError;

/// Query parameter name expected by the inventory endpoint.
const STATION_CODE_PARAM: &str = "Código da Estação";

pub struct HttpInventoryClient {
    client: reqwest::blocking::Client,
    inventory_url: String,
    auth: InventoryAuth,
}

impl HttpInventoryClient {
    pub fn new(
        client: reqwest::blocking::Client,
        inventory_url: impl Into<String>,
        auth: InventoryAuth,
    ) -> Self {
        Self {
            client,
            inventory_url: inventory_url.into(),
            auth,
        }
    }

    /// Build a client whose requests (token and lookups) are bounded by the
    /// configured timeout.
    pub fn from_settings(settings: &Settings) -> Result<Self, InventoryError> {
        let client = build_http_client(settings.request_timeout())?;
        let auth = InventoryAuth::new(
            client.clone(),
            &settings.inventory_auth_url,
            &settings.inventory_identifier,
            &settings.inventory_password,
        );
        Ok(Self::new(client, &settings.inventory_url, auth))
    }
}

pub fn build_http_client(timeout: Duration) -> Result<reqwest::blocking::Client, InventoryError> {
    reqwest::blocking::Client::builder()
        .timeout(timeout)
        .connect_timeout(timeout)
        .build()
        .map_err(|e| InventoryError::Request(e.to_string()))
}

impl HttpInventoryClient {
    fn lookup(&self, bearer: &str, code: &str) -> Result<InventoryResponse, InventoryError> {
        let response = self
            .client
            .get(&self.inventory_url)
            .header("Authorization", bearer)
            .header("accept", "*/*")
            .query(&[(STATION_CODE_PARAM, code)])
            .send()?;

        if !response.status().is_success() {
            return Err(InventoryError::Http(response.status().as_u16()));
        }

        let body = response.text()?;
        parse_inventory_body(&body)
    }
}

impl InventoryClient for HttpInventoryClient {
    fn fetch(&self, code: &str) -> Result<InventoryResponse, InventoryError> {
        with_token_retry(&self.auth, |bearer| self.lookup(bearer, code))
    }
}

/// Run `request` with the current bearer. A 401 means the provider revoked
/// the token before our TTL ran out: drop it and try once more with a new one.
fn with_token_retry<A, T, F>(auth: &A, mut request: F) -> Result<T, InventoryError>
where
    A: BearerSource + ?Sized,
    F: FnMut(&str) -> Result<T, InventoryError>,
{
    let bearer = auth.bearer()?;
    match request(&bearer) {
        Err(InventoryError::Http(401)) => {
            auth.invalidate();
            let bearer = auth.bearer()?;
            request(&bearer)
        }
        other => other,
    }
}

/// An empty body means "nothing known about this code".
fn parse_inventory_body(body: &str) -> Result<InventoryResponse, InventoryError> {
    if body.trim().is_empty() || body.trim() == "null" {
        return Ok(InventoryResponse::default());
    }
    serde_json::from_str(body).map_err(|e| InventoryError::Parse(e.to_string()))
}

/// Station entity for the monitoring-station catalog.
///
/// A station is keyed by its `code`. The required fields identify how the
/// station's telemetry is read (point, NOAA id, converter, sensor, basin);
/// the seven descriptive fields are filled from the remote inventory when
/// missing. Required fields are never touched by enrichment.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::model::{StationFilter, ValidationError};

// ---------------------------------------------------------------------------
// Descriptive fields
// ---------------------------------------------------------------------------

/// Names of the fields the inventory service can fill in.
pub const DESCRIPTIVE_FIELDS: [&str; 7] = [
    "station_name",
    "basin_name",
    "river_name",
    "altitude",
    "latitude",
    "longitude",
    "scale_period_start",
];

// ---------------------------------------------------------------------------
// Station
// ---------------------------------------------------------------------------

/// A monitoring station record.
///
/// JSON bodies accept the Portuguese field names used in legacy
/// station files (`codigo_estacao`, `ponto`, ...) as aliases.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Station {
    #[serde(alias = "ponto")]
    pub point: String,
    /// Unique key.
    #[serde(alias = "codigo_estacao")]
    pub code: String,
    #[serde(alias = "id_noaa")]
    pub noaa_id: String,
    #[serde(alias = "conversor")]
    pub converter: i64,
    pub sensor: String,
    #[serde(alias = "bacia")]
    pub basin: String,

    #[serde(default, alias = "nome_estacao", skip_serializing_if = "Option::is_none")]
    pub station_name: Option<String>,
    #[serde(default, alias = "nome_bacia", skip_serializing_if = "Option::is_none")]
    pub basin_name: Option<String>,
    #[serde(default, alias = "rio_nome", skip_serializing_if = "Option::is_none")]
    pub river_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub altitude: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latitude: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub longitude: Option<String>,
    #[serde(
        default,
        alias = "data_periodo_escala_inicio",
        skip_serializing_if = "Option::is_none"
    )]
    pub scale_period_start: Option<NaiveDateTime>,

    #[serde(default, alias = "dado_manual")]
    pub is_manual_data: bool,
    #[serde(default, alias = "data_forecast")]
    pub is_forecast_enabled: bool,

    #[serde(default, alias = "cota_min", skip_serializing_if = "Option::is_none")]
    pub min_stage: Option<i64>,
    #[serde(default, alias = "janela", skip_serializing_if = "Option::is_none")]
    pub window: Option<i64>,
    #[serde(default, alias = "previsao", skip_serializing_if = "Option::is_none")]
    pub forecast_horizon: Option<i64>,
}

impl Station {
    /// Builds a station from its required fields; everything else is unset.
    pub fn new(
        point: impl Into<String>,
        code: impl Into<String>,
        noaa_id: impl Into<String>,
        converter: i64,
        sensor: impl Into<String>,
        basin: impl Into<String>,
    ) -> Self {
        Self {
            point: point.into(),
            code: code.into(),
            noaa_id: noaa_id.into(),
            converter,
            sensor: sensor.into(),
            basin: basin.into(),
            station_name: None,
            basin_name: None,
            river_name: None,
            altitude: None,
            latitude: None,
            longitude: None,
            scale_period_start: None,
            is_manual_data: false,
            is_forecast_enabled: false,
            min_stage: None,
            window: None,
            forecast_horizon: None,
        }
    }

    /// Rejects records whose required text fields are blank.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let required = [
            ("code", &self.code),
            ("point", &self.point),
            ("noaa_id", &self.noaa_id),
            ("sensor", &self.sensor),
            ("basin", &self.basin),
        ];
        for (name, value) in required {
            if value.trim().is_empty() {
                return Err(ValidationError::BlankField(name));
            }
        }
        Ok(())
    }

    /// Descriptive fields that are unset or contain only whitespace.
    pub fn missing_descriptive_fields(&self) -> Vec<&'static str> {
        let text = [
            &self.station_name,
            &self.basin_name,
            &self.river_name,
            &self.altitude,
            &self.latitude,
            &self.longitude,
        ];
        let mut missing: Vec<&'static str> = text
            .iter()
            .zip(DESCRIPTIVE_FIELDS)
            .filter(|(value, _)| is_blank(value))
            .map(|(_, name)| name)
            .collect();
        if self.scale_period_start.is_none() {
            missing.push("scale_period_start");
        }
        missing
    }

    /// True if any descriptive field is missing or blank.
    pub fn needs_enrichment(&self) -> bool {
        !self.missing_descriptive_fields().is_empty()
    }

    pub fn matches(&self, filter: &StationFilter) -> bool {
        filter.manual_data.is_none_or(|m| m == self.is_manual_data)
            && filter
                .forecast_enabled
                .is_none_or(|f| f == self.is_forecast_enabled)
    }
}

fn is_blank(value: &Option<String>) -> bool {
    value.as_deref().is_none_or(|s| s.trim().is_empty())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

//! PostgreSQL-backed station store.
//!
//! Stations live in a single `stations` table with a unique `code` column.
//! Every session is bounded by the configured timeout, so a stalled server
//! fails the call instead of hanging it.
//! Batch upserts run one statement per station outside a transaction, so a
//! rejected row only lowers the written count.

use std::str::FromStr;
use std::time::Duration;

use chrono::NaiveDateTime;
use postgres::{Client, NoTls, Row};

use super::StationStore;
use crate::logging::{self, Source};
use crate::model::{StationFilter, StoreError};
use crate::stations::Station;

const CREATE_TABLE: &str = "
    CREATE TABLE IF NOT EXISTS stations (
        code                TEXT PRIMARY KEY,
        point               TEXT NOT NULL,
        noaa_id             TEXT NOT NULL,
        converter           BIGINT NOT NULL,
        sensor              TEXT NOT NULL,
        basin               TEXT NOT NULL,
        station_name        TEXT,
        basin_name          TEXT,
        river_name          TEXT,
        altitude            TEXT,
        latitude            TEXT,
        longitude           TEXT,
        scale_period_start  TIMESTAMP,
        is_manual_data      BOOLEAN NOT NULL DEFAULT FALSE,
        is_forecast_enabled BOOLEAN NOT NULL DEFAULT FALSE,
        min_stage           BIGINT,
        window_size         BIGINT,
        forecast_horizon    BIGINT
    )
";

const UPSERT: &str = "
    INSERT INTO stations (
        code, point, noaa_id, converter, sensor, basin,
        station_name, basin_name, river_name, altitude, latitude, longitude,
        scale_period_start, is_manual_data, is_forecast_enabled,
        min_stage, window_size, forecast_horizon
    )
    VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18)
    ON CONFLICT (code) DO UPDATE SET
        point = EXCLUDED.point,
        noaa_id = EXCLUDED.noaa_id,
        converter = EXCLUDED.converter,
        sensor = EXCLUDED.sensor,
        basin = EXCLUDED.basin,
        station_name = EXCLUDED.station_name,
        basin_name = EXCLUDED.basin_name,
        river_name = EXCLUDED.river_name,
        altitude = EXCLUDED.altitude,
        latitude = EXCLUDED.latitude,
        longitude = EXCLUDED.longitude,
        scale_period_start = EXCLUDED.scale_period_start,
        is_manual_data = EXCLUDED.is_manual_data,
        is_forecast_enabled = EXCLUDED.is_forecast_enabled,
        min_stage = EXCLUDED.min_stage,
        window_size = EXCLUDED.window_size,
        forecast_horizon = EXCLUDED.forecast_horizon
";

const SELECT_COLUMNS: &str = "
    SELECT code, point, noaa_id, converter, sensor, basin,
           station_name, basin_name, river_name, altitude, latitude, longitude,
           scale_period_start, is_manual_data, is_forecast_enabled,
           min_stage, window_size, forecast_horizon
    FROM stations
";

pub struct PgStationStore {
    client: Client,
}

impl PgStationStore {
    /// Connect, failing fast after `timeout`, and make sure the table exists.
    pub fn connect(database_url: &str, timeout: Duration) -> Result<Self, StoreError> {
        let config = connection_config(database_url, timeout)?;

        let client = config.connect(NoTls).map_err(|e| {
            logging::error(Source::Store, None, &format!("connection failed: {}", e));
            StoreError::Connection(e.to_string())
        })?;

        Self::from_client(client)
    }

    pub fn from_client(mut client: Client) -> Result<Self, StoreError> {
        client
            .batch_execute(CREATE_TABLE)
            .map_err(|e| StoreError::operation("preparing stations table", e))?;
        Ok(Self { client })
    }

    fn execute_upsert(&mut self, station: &Station) -> Result<u64, postgres::Error> {
        self.client.execute(
            UPSERT,
            &[
                &station.code,
                &station.point,
                &station.noaa_id,
                &station.converter,
                &station.sensor,
                &station.basin,
                &station.station_name,
                &station.basin_name,
                &station.river_name,
                &station.altitude,
                &station.latitude,
                &station.longitude,
                &station.scale_period_start,
                &station.is_manual_data,
                &station.is_forecast_enabled,
                &station.min_stage,
                &station.window,
                &station.forecast_horizon,
            ],
        )
    }
}

/// Parse `database_url` and bound every phase of a session by `timeout`:
/// the connect, each statement (server-side `statement_timeout`), and a dead
/// peer (TCP keepalives).
fn connection_config(
    database_url: &str,
    timeout: Duration,
) -> Result<postgres::Config, StoreError> {
    let mut config = postgres::Config::from_str(database_url)
        .map_err(|e| StoreError::Connection(e.to_string()))?;

    let statement_timeout = format!("-c statement_timeout={}", timeout.as_millis());
    let options = match config.get_options() {
        Some(existing) if !existing.trim().is_empty() => {
            format!("{} {}", existing, statement_timeout)
        }
        _ => statement_timeout,
    };

    config
        .connect_timeout(timeout)
        .options(&options)
        .keepalives(true)
        .keepalives_idle(timeout);
    Ok(config)
}

fn station_from_row(row: &Row) -> Result<Station, postgres::Error> {
    Ok(Station {
        code: row.try_get(0)?,
        point: row.try_get(1)?,
        noaa_id: row.try_get(2)?,
        converter: row.try_get(3)?,
        sensor: row.try_get(4)?,
        basin: row.try_get(5)?,
        station_name: row.try_get(6)?,
        basin_name: row.try_get(7)?,
        river_name: row.try_get(8)?,
        altitude: row.try_get(9)?,
        latitude: row.try_get(10)?,
        longitude: row.try_get(11)?,
        scale_period_start: row.try_get::<_, Option<NaiveDateTime>>(12)?,
        is_manual_data: row.try_get(13)?,
        is_forecast_enabled: row.try_get(14)?,
        min_stage: row.try_get(15)?,
        window: row.try_get(16)?,
        forecast_horizon: row.try_get(17)?,
    })
}

fn stations_from_rows(rows: &[Row]) -> Result<Vec<Station>, StoreError> {
    rows.iter()
        .map(|row| station_from_row(row).map_err(|e| StoreError::Corrupt(e.to_string())))
        .collect()
}

/// WHERE clause for the set flags, with positional parameters.
fn filter_clause(filter: &StationFilter) -> (String, Vec<bool>) {
    let mut conditions = Vec::new();
    let mut params = Vec::new();
    if let Some(manual) = filter.manual_data {
        params.push(manual);
        conditions.push(format!("is_manual_data = ${}", params.len()));
    }
    if let Some(forecast) = filter.forecast_enabled {
        params.push(forecast);
        conditions.push(format!("is_forecast_enabled = ${}", params.len()));
    }
    if conditions.is_empty() {
        (String::new(), params)
    } else {
        (format!(" WHERE {}", conditions.join(" AND ")), params)
    }
}

impl StationStore for PgStationStore {
    fn upsert_one(&mut self, station: &Station) -> Result<(), StoreError> {
        self.execute_upsert(station).map_err(|e| {
            logging::error(Source::Store, Some(&station.code), &format!("upsert failed: {}", e));
            StoreError::operation("saving station", e)
        })?;
        Ok(())
    }

    fn upsert_many(&mut self, stations: &[Station]) -> Result<usize, StoreError> {
        let mut written = 0;
        let mut failed = 0;

        for station in stations {
            match self.execute_upsert(station) {
                Ok(rows) => written += rows as usize,
                Err(e) if self.client.is_closed() => {
                    logging::error(
                        Source::Store,
                        Some(&station.code),
                        &format!("connection lost during batch after {} writes: {}", written, e),
                    );
                    return Err(StoreError::Connection(e.to_string()));
                }
                Err(e) => {
                    failed += 1;
                    logging::warn(
                        Source::Store,
                        Some(&station.code),
                        &format!("batch upsert rejected: {}", e),
                    );
                }
            }
        }

        if failed > 0 {
            logging::warn(
                Source::Store,
                None,
                &format!("batch upsert partially applied: {} written, {} failed", written, failed),
            );
        }
        Ok(written)
    }

    fn list_all(&mut self, filter: Option<&StationFilter>) -> Result<Vec<Station>, StoreError> {
        let (clause, params) = filter.map(filter_clause).unwrap_or_default();
        let query = format!("{}{} ORDER BY code", SELECT_COLUMNS, clause);
        let params: Vec<&(dyn postgres::types::ToSql + Sync)> = params
            .iter()
            .map(|p| p as &(dyn postgres::types::ToSql + Sync))
            .collect();

        let rows = self
            .client
            .query(query.as_str(), &params)
            .map_err(|e| StoreError::operation("listing stations", e))?;
        stations_from_rows(&rows)
    }

    fn find_by_code(&mut self, code: &str) -> Result<Option<Station>, StoreError> {
        let query = format!("{} WHERE code = $1", SELECT_COLUMNS);
        let row = self
            .client
            .query_opt(query.as_str(), &[&code])
            .map_err(|e| StoreError::operation("finding station", e))?;
        row.map(|row| station_from_row(&row).map_err(|e| StoreError::Corrupt(e.to_string())))
            .transpose()
    }

    fn delete_by_code(&mut self, code: &str) -> Result<usize, StoreError> {
        let deleted = self
            .client
            .execute("DELETE FROM stations WHERE code = $1", &[&code])
            .map_err(|e| StoreError::operation("removing station", e))?;
        Ok(deleted as usize)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

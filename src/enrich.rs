//! Station enrichment from the remote inventory.
//!
//! Stations with any missing or blank descriptive field are looked up by
//! code and the inventory's values are copied in. Enrichment is best-effort:
//! `enrich_best_effort` swallows every failure and leaves the station as it
//! was, so a dead inventory never blocks a write.

use chrono::{NaiveDate, NaiveDateTime};

use crate::inventory::{InventoryClient, InventoryRecord};
use crate::logging::{self, Source};
use crate::model::InventoryError;
use crate::stations::Station;

/// Used when the inventory has no start date for the scale period.
pub fn default_period_start() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(1900, 1, 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .unwrap_or_default()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnrichOutcome {
    /// Every descriptive field was already set; no lookup was made.
    NotNeeded,
    /// The inventory had no record for the code.
    NotFound,
    /// Fields were copied from this many inventory records.
    Enriched(usize),
}

pub struct StationEnricher<C> {
    client: C,
}

impl<C: InventoryClient> StationEnricher<C> {
    pub fn new(client: C) -> Self {
        Self { client }
    }

    /// Fill descriptive fields from the inventory.
    ///
    /// On error the station is left untouched: values are merged into a
    /// copy that is only written back once every record has been applied.
    pub fn enrich(&self, station: &mut Station) -> Result<EnrichOutcome, InventoryError> {
        if !station.needs_enrichment() {
            return Ok(EnrichOutcome::NotNeeded);
        }

        let response = self.client.fetch(&station.code)?;
        if response.is_empty() {
            logging::warn(
                Source::Inventory,
                Some(&station.code),
                "no additional information found for station",
            );
            return Ok(EnrichOutcome::NotFound);
        }

        let mut enriched = station.clone();
        for record in &response.items {
            apply_record(&mut enriched, record)?;
        }
        *station = enriched;

        logging::debug(
            Source::Inventory,
            Some(&station.code),
            &format!("enriched from {} inventory record(s)", response.items.len()),
        );
        Ok(EnrichOutcome::Enriched(response.items.len()))
    }

    /// `enrich`, with every failure logged and discarded.
    pub fn enrich_best_effort(&self, station: &mut Station) -> Option<EnrichOutcome> {
        match self.enrich(station) {
            Ok(outcome) => Some(outcome),
            Err(err) => {
                logging::log_inventory_failure(&station.code, "enrichment", &err);
                None
            }
        }
    }
}

/// Copy one record's descriptive fields. Later records overwrite earlier ones.
fn apply_record(station: &mut Station, record: &InventoryRecord) -> Result<(), InventoryError> {
    station.station_name = record.station_name.clone();
    station.basin_name = record.basin_name.clone();
    station.river_name = record.river_name.clone();
    station.altitude = record.altitude.clone();
    station.latitude = record.latitude.clone();
    station.longitude = record.longitude.clone();
    station.scale_period_start = Some(match record.scale_period_start.as_deref() {
        Some(raw) if !raw.trim().is_empty() => parse_period_start(raw)?,
        _ => default_period_start(),
    });
    Ok(())
}

/// Parse `"YYYY-MM-DD HH:MM:SS[.f]"` (or a bare date) after swapping the
/// date/time space for `T`.
pub fn parse_period_start(raw: &str) -> Result<NaiveDateTime, InventoryError> {
    let iso = raw.trim().replacen(' ', "T", 1);
    NaiveDateTime::parse_from_str(&iso, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(&iso, "%Y-%m-%dT%H:%M"))
        .or_else(|_| {
            NaiveDate::parse_from_str(&iso, "%Y-%m-%d")
                .map(|d| d.and_hms_opt(0, 0, 0).unwrap_or_default())
        })
        .map_err(|e| InventoryError::Parse(format!("period start '{}': {}", raw, e)))
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inventory::InventoryResponse;
    use std::cell::Cell;

    struct StubClient {
        response: Result<InventoryResponse, u16>,
        calls: Cell<usize>,
    }

    impl StubClient {
        fn returning(items: Vec<InventoryRecord>) -> Self {
            Self {
                response: Ok(InventoryResponse { items }),
                calls: Cell::new(0),
            }
        }

        fn failing(status: u16) -> Self {
            Self {
                response: Err(status),
                calls: Cell::new(0),
            }
        }
    }

    impl InventoryClient for StubClient {
        fn fetch(&self, _code: &str) -> Result<InventoryResponse, InventoryError> {
            self.calls.set(self.calls.get() + 1);
            self.response.clone().map_err(InventoryError::Http)
        }
    }

    fn record(name: &str, start: Option<&str>) -> InventoryRecord {
        InventoryRecord {
            station_name: Some(name.to_string()),
            basin_name: Some("ATLANTICO".to_string()),
            river_name: Some("RIO PIRANHAS".to_string()),
            altitude: Some("12".to_string()),
            latitude: Some("-5.5".to_string()),
            longitude: Some("-36.9".to_string()),
            scale_period_start: start.map(str::to_string),
        }
    }

    fn bare_station() -> Station {
        Station::new("Rio Acu", "001", "N1", 5, "Sen1", "Bacia1")
    }

    #[test]
    fn test_complete_station_is_not_looked_up() {
        let stub = StubClient::returning(vec![record("ACU", None)]);
        let enricher = StationEnricher::new(&stub);

        let mut station = bare_station();
        enricher.enrich(&mut station).unwrap();
        assert_eq!(stub.calls.get(), 1);

        let before = station.clone();
        assert_eq!(enricher.enrich(&mut station).unwrap(), EnrichOutcome::NotNeeded);
        assert_eq!(stub.calls.get(), 1, "complete station must not trigger a fetch");
        assert_eq!(station, before);
    }

    #[test]
    fn test_empty_response_leaves_station_unchanged() {
        let stub = StubClient::returning(vec![]);
        let enricher = StationEnricher::new(&stub);
        let mut station = bare_station();

        assert_eq!(enricher.enrich(&mut station).unwrap(), EnrichOutcome::NotFound);
        assert_eq!(station, bare_station());
    }

    #[test]
    fn test_fields_copied_and_missing_start_defaults() {
        let stub = StubClient::returning(vec![record("ACU", None)]);
        let enricher = StationEnricher::new(&stub);
        let mut station = bare_station();

        assert_eq!(enricher.enrich(&mut station).unwrap(), EnrichOutcome::Enriched(1));
        assert_eq!(station.station_name.as_deref(), Some("ACU"));
        assert_eq!(station.river_name.as_deref(), Some("RIO PIRANHAS"));
        assert_eq!(station.scale_period_start, Some(default_period_start()));
        // required fields untouched
        assert_eq!(station.code, "001");
        assert_eq!(station.basin, "Bacia1");
    }

    #[test]
    fn test_blank_start_defaults_to_sentinel() {
        let stub = StubClient::returning(vec![record("ACU", Some("  "))]);
        let enricher = StationEnricher::new(&stub);
        let mut station = bare_station();

        enricher.enrich(&mut station).unwrap();
        assert_eq!(
            station.scale_period_start.unwrap().to_string(),
            "1900-01-01 00:00:00"
        );
    }

    #[test]
    fn test_last_record_wins() {
        let stub = StubClient::returning(vec![
            record("FIRST", Some("1990-01-01 00:00:00")),
            record("SECOND", Some("2001-03-15 06:30:00.0")),
        ]);
        let enricher = StationEnricher::new(&stub);
        let mut station = bare_station();

        assert_eq!(enricher.enrich(&mut station).unwrap(), EnrichOutcome::Enriched(2));
        assert_eq!(station.station_name.as_deref(), Some("SECOND"));
        assert_eq!(
            station.scale_period_start,
            NaiveDate::from_ymd_opt(2001, 3, 15).and_then(|d| d.and_hms_opt(6, 30, 0))
        );
    }

    #[test]
    fn test_unparseable_start_is_error_and_station_untouched() {
        let stub = StubClient::returning(vec![record("ACU", Some("sometime in 1990"))]);
        let enricher = StationEnricher::new(&stub);
        let mut station = bare_station();

        let err = enricher.enrich(&mut station).unwrap_err();
        assert!(matches!(err, InventoryError::Parse(_)));
        assert_eq!(station, bare_station());
    }

    #[test]
    fn test_best_effort_swallows_fetch_failure() {
        let stub = StubClient::failing(500);
        let enricher = StationEnricher::new(&stub);
        let mut station = bare_station();

        assert_eq!(enricher.enrich_best_effort(&mut station), None);
        assert_eq!(station, bare_station());
    }

    #[test]
    fn test_parse_period_start_formats() {
        let expected = NaiveDate::from_ymd_opt(1994, 3, 1)
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .unwrap();
        assert_eq!(parse_period_start("1994-03-01 00:00:00").unwrap(), expected);
        assert_eq!(parse_period_start("1994-03-01 00:00:00.0").unwrap(), expected);
        assert_eq!(parse_period_start("1994-03-01T00:00:00").unwrap(), expected);
        assert_eq!(parse_period_start("1994-03-01").unwrap(), expected);
        assert!(parse_period_start("03/01/1994").is_err());
    }
}

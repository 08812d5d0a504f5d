//! Station catalog operations.
//!
//! Wires a [`StationStore`] to a [`StationEnricher`]. Reads are open; every
//! mutation takes a [`Principal`], which can only come from a verified
//! access token.

use std::collections::HashSet;

use crate::auth::Principal;
use crate::enrich::StationEnricher;
use crate::import::{self, ImportTarget, TextEncoding};
use crate::inventory::InventoryClient;
use crate::logging::{self, Source};
use crate::model::{CatalogError, ImportReport, StationFilter, StoreError};
use crate::stations::Station;
use crate::store::StationStore;

pub struct StationCatalog<S, C> {
    store: S,
    enricher: StationEnricher<C>,
}

impl<S: StationStore, C: InventoryClient> StationCatalog<S, C> {
    pub fn new(store: S, inventory: C) -> Self {
        Self {
            store,
            enricher: StationEnricher::new(inventory),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Validate, enrich if needed, then upsert. Returns the stored record.
    pub fn save(&mut self, principal: &Principal, mut station: Station) -> Result<Station, CatalogError> {
        station.validate()?;
        self.enricher.enrich_best_effort(&mut station);
        self.store.upsert_one(&station)?;
        logging::info(
            Source::Store,
            Some(&station.code),
            &format!("station saved by {}", principal.subject()),
        );
        Ok(station)
    }

    /// Batch form of `save`. The whole batch is validated before anything
    /// is enriched or written; returns the number of records written.
    pub fn save_many(
        &mut self,
        principal: &Principal,
        mut stations: Vec<Station>,
    ) -> Result<usize, CatalogError> {
        if stations.is_empty() {
            return Ok(0);
        }
        for station in &stations {
            station.validate()?;
        }
        for station in &mut stations {
            self.enricher.enrich_best_effort(station);
        }

        let written = self.store.upsert_many(&stations)?;
        logging::info(
            Source::Store,
            None,
            &format!(
                "{} of {} stations saved by {}",
                written,
                stations.len(),
                principal.subject()
            ),
        );
        Ok(written)
    }

    pub fn list(&mut self, filter: Option<&StationFilter>) -> Result<Vec<Station>, CatalogError> {
        Ok(self.store.list_all(filter)?)
    }

    pub fn find(&mut self, code: &str) -> Result<Option<Station>, CatalogError> {
        Ok(self.store.find_by_code(code)?)
    }

    /// Returns 1 if the station existed, 0 otherwise.
    pub fn remove(&mut self, principal: &Principal, code: &str) -> Result<usize, CatalogError> {
        let removed = self.store.delete_by_code(code)?;
        if removed > 0 {
            logging::info(
                Source::Store,
                Some(code),
                &format!("station removed by {}", principal.subject()),
            );
        }
        Ok(removed)
    }

    /// Import a delimited station file. Rows that survive the duplicate
    /// policy are enriched best-effort before the batch write.
    pub fn import(
        &mut self,
        principal: &Principal,
        payload: &[u8],
        encoding: TextEncoding,
        upsert_existing: bool,
    ) -> Result<ImportReport, CatalogError> {
        logging::info(
            Source::Import,
            None,
            &format!(
                "import of {} bytes ({}) started by {}",
                payload.len(),
                encoding,
                principal.subject()
            ),
        );
        Ok(import::run_import(self, payload, encoding, upsert_existing)?)
    }
}

impl<S: StationStore, C: InventoryClient> ImportTarget for StationCatalog<S, C> {
    fn existing_codes(&mut self) -> Result<HashSet<String>, StoreError> {
        Ok(self
            .store
            .list_all(None)?
            .into_iter()
            .map(|station| station.code)
            .collect())
    }

    fn write_batch(&mut self, mut stations: Vec<Station>) -> Result<usize, StoreError> {
        for station in &mut stations {
            self.enricher.enrich_best_effort(station);
        }
        self.store.upsert_many(&stations)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{Authenticator, CredentialAuthenticator, HmacTokenProvider};
    use crate::inventory::{InventoryRecord, InventoryResponse, NoInventory};
    use crate::model::{InventoryError, ValidationError};
    use crate::store::MemoryStationStore;

    struct DeadInventory;

    impl InventoryClient for DeadInventory {
        fn fetch(&self, _code: &str) -> Result<InventoryResponse, InventoryError> {
            Err(InventoryError::Request("connection refused".into()))
        }
    }

    struct FixedInventory(InventoryRecord);

    impl InventoryClient for FixedInventory {
        fn fetch(&self, _code: &str) -> Result<InventoryResponse, InventoryError> {
            Ok(InventoryResponse {
                items: vec![self.0.clone()],
            })
        }
    }

    fn principal() -> Principal {
        let auth = CredentialAuthenticator::new("admin", "pw", HmacTokenProvider::new("k"));
        let token = auth.authenticate("admin", "pw").unwrap().access_token;
        auth.authorize(&token).unwrap()
    }

    fn station(code: &str) -> Station {
        Station::new("Rio Acu", code, "N1", 5, "Sen1", "Bacia1")
    }

    #[test]
    fn test_save_succeeds_when_inventory_is_down() {
        let mut catalog = StationCatalog::new(MemoryStationStore::new(), DeadInventory);
        let saved = catalog.save(&principal(), station("001")).unwrap();
        assert_eq!(saved, station("001"));
        assert_eq!(catalog.find("001").unwrap(), Some(station("001")));
    }

    #[test]
    fn test_save_enriches_missing_fields() {
        let inventory = FixedInventory(InventoryRecord {
            station_name: Some("ACU".into()),
            river_name: Some("RIO PIRANHAS".into()),
            ..Default::default()
        });
        let mut catalog = StationCatalog::new(MemoryStationStore::new(), inventory);

        let saved = catalog.save(&principal(), station("001")).unwrap();
        assert_eq!(saved.station_name.as_deref(), Some("ACU"));
        let stored = catalog.find("001").unwrap().unwrap();
        assert_eq!(stored.river_name.as_deref(), Some("RIO PIRANHAS"));
        assert!(stored.scale_period_start.is_some());
    }

    #[test]
    fn test_save_rejects_blank_required_field() {
        let mut catalog = StationCatalog::new(MemoryStationStore::new(), NoInventory);
        let mut bad = station("001");
        bad.sensor = "  ".into();

        let err = catalog.save(&principal(), bad).unwrap_err();
        assert!(matches!(
            err,
            CatalogError::Validation(ValidationError::BlankField("sensor"))
        ));
        assert!(catalog.store().is_empty());
    }

    #[test]
    fn test_save_many() {
        let mut catalog = StationCatalog::new(MemoryStationStore::new(), DeadInventory);
        assert_eq!(catalog.save_many(&principal(), vec![]).unwrap(), 0);

        let written = catalog
            .save_many(&principal(), vec![station("001"), station("002")])
            .unwrap();
        assert_eq!(written, 2);
        assert_eq!(catalog.list(None).unwrap().len(), 2);
    }

    #[test]
    fn test_save_many_writes_nothing_if_one_station_is_invalid() {
        let mut catalog = StationCatalog::new(MemoryStationStore::new(), NoInventory);
        let mut bad = station("002");
        bad.code = String::new();

        assert!(catalog.save_many(&principal(), vec![station("001"), bad]).is_err());
        assert!(catalog.store().is_empty());
    }

    #[test]
    fn test_remove_reports_count() {
        let store: MemoryStationStore = [station("001")].into_iter().collect();
        let mut catalog = StationCatalog::new(store, NoInventory);
        assert_eq!(catalog.remove(&principal(), "001").unwrap(), 1);
        assert_eq!(catalog.remove(&principal(), "001").unwrap(), 0);
        assert_eq!(catalog.find("001").unwrap(), None);
    }

    #[test]
    fn test_list_applies_filter() {
        let mut forecast = station("002");
        forecast.is_forecast_enabled = true;
        let store: MemoryStationStore = [station("001"), forecast].into_iter().collect();
        let mut catalog = StationCatalog::new(store, NoInventory);

        let filter = StationFilter {
            manual_data: None,
            forecast_enabled: Some(true),
        };
        let codes: Vec<_> = catalog
            .list(Some(&filter))
            .unwrap()
            .into_iter()
            .map(|s| s.code)
            .collect();
        assert_eq!(codes, vec!["002"]);
    }

    #[test]
    fn test_import_skips_codes_already_stored() {
        let store: MemoryStationStore = [station("001")].into_iter().collect();
        let mut catalog = StationCatalog::new(store, NoInventory);

        let report = catalog
            .import(
                &principal(),
                b"p,001,N1,1,s,b\np,002,N2,1,s,b\n",
                TextEncoding::Utf8,
                false,
            )
            .unwrap();
        assert_eq!(report.imported, 1);
        assert_eq!(report.ignored.len(), 1);
        assert_eq!(report.ignored[0].reason, import::REASON_DUPLICATE_IN_STORE);
        assert_eq!(catalog.store().len(), 2);
        // the stored 001 keeps its point
        assert_eq!(catalog.find("001").unwrap().unwrap().point, "Rio Acu");
    }

    #[test]
    fn test_import_with_upsert_existing_overwrites() {
        let store: MemoryStationStore = [station("001")].into_iter().collect();
        let mut catalog = StationCatalog::new(store, NoInventory);

        let report = catalog
            .import(&principal(), b"Novo,001,N9,2,s,b", TextEncoding::Utf8, true)
            .unwrap();
        assert_eq!(report.imported, 1);
        assert!(report.ignored.is_empty());
        assert_eq!(catalog.find("001").unwrap().unwrap().point, "Novo");
    }

    #[test]
    fn test_import_enriches_written_rows() {
        let inventory = FixedInventory(InventoryRecord {
            station_name: Some("ACU".into()),
            basin_name: Some("ATLANTICO".into()),
            ..Default::default()
        });
        let mut catalog = StationCatalog::new(MemoryStationStore::new(), inventory);

        let report = catalog
            .import(&principal(), b"Rio Acu,001,N1,5,Sen1,Bacia1", TextEncoding::Utf8, false)
            .unwrap();
        assert_eq!(report.imported, 1);

        let stored = catalog.find("001").unwrap().unwrap();
        assert_eq!(stored.station_name.as_deref(), Some("ACU"));
        assert_eq!(stored.basin_name.as_deref(), Some("ATLANTICO"));
        assert_eq!(stored.basin, "Bacia1", "required fields are never enriched");
    }

    #[test]
    fn test_import_writes_every_row_when_inventory_is_down() {
        let mut catalog = StationCatalog::new(MemoryStationStore::new(), DeadInventory);

        let report = catalog
            .import(
                &principal(),
                b"p,001,N1,1,s,b\np,002,N2,1,s,b\n",
                TextEncoding::Utf8,
                false,
            )
            .unwrap();
        assert_eq!(report.imported, 2);
        assert!(report.errors.is_empty());
        assert_eq!(
            catalog.find("002").unwrap(),
            Some(Station::new("p", "002", "N2", 1, "s", "b"))
        );
    }
}

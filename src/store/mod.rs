//! Station persistence.
//!
//! Every write is an upsert keyed on `code`, so a store never holds two
//! records with the same code. Infrastructure failures surface as
//! [`StoreError`]; a missing record is a normal empty result.

pub mod pg;

use std::collections::BTreeMap;

use crate::model::{StationFilter, StoreError};
use crate::stations::Station;

pub use self::pg::PgStationStore;

pub trait StationStore {
    /// Insert or replace the record with `station.code`.
    fn upsert_one(&mut self, station: &Station) -> Result<(), StoreError>;

    /// Upsert a batch and return how many records were written. Individual
    /// record failures reduce the count instead of failing the batch.
    fn upsert_many(&mut self, stations: &[Station]) -> Result<usize, StoreError>;

    fn list_all(&mut self, filter: Option<&StationFilter>) -> Result<Vec<Station>, StoreError>;

    fn find_by_code(&mut self, code: &str) -> Result<Option<Station>, StoreError>;

    /// Returns the number of removed records (0 or 1).
    fn delete_by_code(&mut self, code: &str) -> Result<usize, StoreError>;
}

impl<S: StationStore + ?Sized> StationStore for Box<S> {
    fn upsert_one(&mut self, station: &Station) -> Result<(), StoreError> {
        (**self).upsert_one(station)
    }

    fn upsert_many(&mut self, stations: &[Station]) -> Result<usize, StoreError> {
        (**self).upsert_many(stations)
    }

    fn list_all(&mut self, filter: Option<&StationFilter>) -> Result<Vec<Station>, StoreError> {
        (**self).list_all(filter)
    }

    fn find_by_code(&mut self, code: &str) -> Result<Option<Station>, StoreError> {
        (**self).find_by_code(code)
    }

    fn delete_by_code(&mut self, code: &str) -> Result<usize, StoreError> {
        (**self).delete_by_code(code)
    }
}

// ---------------------------------------------------------------------------
// In-memory store
// ---------------------------------------------------------------------------

/// Store kept in a map ordered by code. Listing returns stations sorted by
/// code.
#[derive(Debug, Default, Clone)]
pub struct MemoryStationStore {
    stations: BTreeMap<String, Station>,
}

impl MemoryStationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.stations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stations.is_empty()
    }
}

impl FromIterator<Station> for MemoryStationStore {
    fn from_iter<I: IntoIterator<Item = Station>>(iter: I) -> Self {
        Self {
            stations: iter
                .into_iter()
                .map(|station| (station.code.clone(), station))
                .collect(),
        }
    }
}

impl StationStore for MemoryStationStore {
    fn upsert_one(&mut self, station: &Station) -> Result<(), StoreError> {
        self.stations.insert(station.code.clone(), station.clone());
        Ok(())
    }

    fn upsert_many(&mut self, stations: &[Station]) -> Result<usize, StoreError> {
        for station in stations {
            self.stations.insert(station.code.clone(), station.clone());
        }
        Ok(stations.len())
    }

    fn list_all(&mut self, filter: Option<&StationFilter>) -> Result<Vec<Station>, StoreError> {
        Ok(self
            .stations
            .values()
            .filter(|station| filter.is_none_or(|f| station.matches(f)))
            .cloned()
            .collect())
    }

    fn find_by_code(&mut self, code: &str) -> Result<Option<Station>, StoreError> {
        Ok(self.stations.get(code).cloned())
    }

    fn delete_by_code(&mut self, code: &str) -> Result<usize, StoreError> {
        Ok(usize::from(self.stations.remove(code).is_some()))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn station(code: &str) -> Station {
        Station::new("p", code, "N", 1, "s", "b")
    }

    #[test]
    fn test_upsert_replaces_existing_code() {
        let mut store = MemoryStationStore::new();
        store.upsert_one(&station("001")).unwrap();

        let mut updated = station("001");
        updated.sensor = "new sensor".into();
        store.upsert_one(&updated).unwrap();

        assert_eq!(store.len(), 1);
        assert_eq!(
            store.find_by_code("001").unwrap().unwrap().sensor,
            "new sensor"
        );
    }

    #[test]
    fn test_upsert_many_reports_written_count() {
        let mut store: MemoryStationStore = [station("001")].into_iter().collect();
        let written = store
            .upsert_many(&[station("001"), station("002"), station("003")])
            .unwrap();
        assert_eq!(written, 3);
        assert_eq!(store.len(), 3);
    }

    #[test]
    fn test_find_missing_code_is_none_not_error() {
        let mut store = MemoryStationStore::new();
        assert!(store.find_by_code("404").unwrap().is_none());
    }

    #[test]
    fn test_delete_returns_removed_count() {
        let mut store: MemoryStationStore = [station("001")].into_iter().collect();
        assert_eq!(store.delete_by_code("001").unwrap(), 1);
        assert_eq!(store.delete_by_code("001").unwrap(), 0);
        assert!(store.is_empty());
    }

    #[test]
    fn test_list_all_is_sorted_and_filtered() {
        let mut manual = station("002");
        manual.is_manual_data = true;
        let mut store: MemoryStationStore =
            [station("003"), manual, station("001")].into_iter().collect();

        let codes: Vec<_> = store
            .list_all(None)
            .unwrap()
            .into_iter()
            .map(|s| s.code)
            .collect();
        assert_eq!(codes, vec!["001", "002", "003"]);

        let filter = StationFilter {
            manual_data: Some(true),
            forecast_enabled: None,
        };
        let manual_only = store.list_all(Some(&filter)).unwrap();
        assert_eq!(manual_only.len(), 1);
        assert_eq!(manual_only[0].code, "002");
    }
}

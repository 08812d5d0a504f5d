//! Catalog of hydrological monitoring stations.
//!
//! Stations are stored in PostgreSQL, imported in bulk from delimited files,
//! and enriched with descriptive metadata from a remote inventory service.
//! Mutating operations require an access token issued by [`auth`].

pub mod auth;
pub mod catalog;
pub mod cli;
pub mod config;
pub mod enrich;
pub mod import;
pub mod inventory;
pub mod logging;
pub mod model;
pub mod stations;
pub mod store;

pub use catalog::StationCatalog;
pub use stations::Station;

//! Lakhua - offline reverse geocoding over precomputed H3 lookup tables
//!
//! Each supported H3 resolution has a JSON table mapping cell strings to an
//! administrative location. Lookups convert a coordinate to a cell and walk
//! from the finest resolution to coarser ancestors until a table matches.
//!
//! The free functions in this module share one process-wide geocoder reading
//! the default data directory. Build a [`ReverseGeocoder`] directly to use
//! another data layout.

pub mod cell;
pub mod config;
pub mod geocoder;
pub mod models;
pub mod store;

use std::sync::OnceLock;

pub use config::{ResolutionRange, StoreConfig};
pub use geocoder::{GeocodeOptions, ReverseGeocoder};
pub use models::{GeocodeResult, LocationRecord, ResolutionTable};
pub use store::{ResolutionCache, StoreReader, TableOverrides, TableSource};

static DEFAULT_GEOCODER: OnceLock<ReverseGeocoder> = OnceLock::new();

/// The shared geocoder used by the free functions
pub fn default_geocoder() -> &'static ReverseGeocoder {
    DEFAULT_GEOCODER.get_or_init(|| ReverseGeocoder::from_config(StoreConfig::default()))
}

/// Reverse geocode a coordinate with the shared geocoder
pub fn geocode(lat: f64, lon: f64, options: &GeocodeOptions) -> Option<GeocodeResult> {
    default_geocoder().geocode(lat, lon, options)
}

/// Reverse geocode an H3 cell string with the shared geocoder
pub fn geocode_cell(cell: &str, options: &GeocodeOptions) -> Option<GeocodeResult> {
    default_geocoder().geocode_cell(cell, options)
}

/// Reverse geocode many coordinates with the shared geocoder, keeping input order
pub fn geocode_batch(
    points: &[(f64, f64)],
    options: &GeocodeOptions,
) -> Vec<Option<GeocodeResult>> {
    default_geocoder().geocode_batch(points, options)
}

/// Replace the shared geocoder's tables. Pass `None` to go back to the data files.
pub fn set_stores_for_testing(stores: Option<TableOverrides>) {
    default_geocoder().cache().set_test_override(stores);
}

/// Drop the shared geocoder's loaded tables so the next lookup rereads them
pub fn clear_store_cache() {
    default_geocoder().cache().clear_cache();
}

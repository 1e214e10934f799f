//! Reverse geocoding over the resolution cache.

use h3o::CellIndex;
use rayon::prelude::*;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, trace};

use super::{GeocodeOptions, NormalizedOptions};
use crate::cell;
use crate::config::{ResolutionRange, StoreConfig};
use crate::models::GeocodeResult;
use crate::store::{ResolutionCache, StoreReader, TableSource};

/// Looks up the administrative location for a coordinate or cell.
///
/// Lookups start at the cell's own resolution (clamped into the supported
/// range) and, with fallback enabled, walk to coarser ancestors until a table
/// has an entry. The finest match wins.
pub struct ReverseGeocoder<S = StoreReader> {
    cache: Arc<ResolutionCache<S>>,
    range: ResolutionRange,
}

impl ReverseGeocoder<StoreReader> {
    /// Geocoder reading the data files described by `config`
    pub fn from_config(config: StoreConfig) -> Self {
        Self::new(Arc::new(ResolutionCache::from_config(config)))
    }
}

impl<S: TableSource> ReverseGeocoder<S> {
    pub fn new(cache: Arc<ResolutionCache<S>>) -> Self {
        let range = ResolutionRange::from_resolutions(cache.resolutions());
        Self { cache, range }
    }

    pub fn cache(&self) -> &ResolutionCache<S> {
        &self.cache
    }

    pub fn range(&self) -> ResolutionRange {
        self.range
    }

    /// Geocode an encoded cell such as `"8560145bfffffff"`.
    ///
    /// Invalid cells return `None`.
    pub fn geocode_cell(&self, cell: &str, options: &GeocodeOptions) -> Option<GeocodeResult> {
        let opts = options.normalize(self.range);

        let Some(index) = cell::parse_cell(cell) else {
            if opts.debug {
                info!(target: "lakhua::debug", "invalid h3 index provided: {:?}", cell);
            }
            return None;
        };

        self.walk(index, &opts)
    }

    /// Geocode a latitude/longitude pair in degrees.
    ///
    /// Non-finite or out-of-range coordinates return `None`.
    pub fn geocode(&self, lat: f64, lon: f64, options: &GeocodeOptions) -> Option<GeocodeResult> {
        if !lat.is_finite() || !lon.is_finite() {
            return None;
        }
        if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lon) {
            return None;
        }

        let opts = options.normalize(self.range);
        let index = cell::cell_from_coordinate(lat, lon, opts.resolution)?;
        self.geocode_cell(&cell::cell_to_string(index), options)
    }

    /// Geocode many points in parallel. Results keep the input order.
    pub fn geocode_batch(
        &self,
        points: &[(f64, f64)],
        options: &GeocodeOptions,
    ) -> Vec<Option<GeocodeResult>> {
        points
            .par_iter()
            .map(|&(lat, lon)| self.geocode(lat, lon, options))
            .collect()
    }

    fn walk(&self, index: CellIndex, opts: &NormalizedOptions) -> Option<GeocodeResult> {
        let started = Instant::now();
        let native = cell::resolution_of(index);
        let start = self.range.clamp(native);
        let end = if opts.fallback { self.range.min } else { start };

        for resolution in (end..=start).rev() {
            let candidate = if resolution == native {
                index
            } else {
                // Coarse input cells have no ancestor at a finer resolution
                match cell::parent_at_resolution(index, resolution) {
                    Some(parent) => parent,
                    None => continue,
                }
            };
            let key = cell::cell_to_string(candidate);
            let table = self.cache.get_table(resolution, opts.debug);

            let lookup_started = Instant::now();
            let found = table.get(&key);
            let lookup_ms = lookup_started.elapsed().as_secs_f64() * 1000.0;
            if opts.debug {
                info!(
                    target: "lakhua::debug",
                    "lookup key {} in r{} took {:.3}ms",
                    key,
                    resolution,
                    lookup_ms
                );
            } else {
                trace!("lookup {} in r{}: hit={}", key, resolution, found.is_some());
            }

            if let Some(location) = found {
                if opts.debug {
                    info!(
                        target: "lakhua::debug",
                        "match found in {:.3}ms",
                        started.elapsed().as_secs_f64() * 1000.0
                    );
                }
                return Some(GeocodeResult {
                    location: location.clone(),
                    matched_cell: key,
                    matched_resolution: resolution,
                });
            }
        }

        if opts.debug {
            info!(
                target: "lakhua::debug",
                "no match found in {:.3}ms",
                started.elapsed().as_secs_f64() * 1000.0
            );
        }
        None
    }
}

//! Per-call geocoding options.

use crate::config::ResolutionRange;

/// Options accepted by the geocoding calls.
///
/// Unset fields take their defaults during normalization: the finest
/// supported resolution, fallback enabled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GeocodeOptions {
    /// Resolution used to turn coordinates into a cell
    pub resolution: Option<u8>,
    /// Walk up to coarser resolutions when the exact cell has no entry
    pub fallback: Option<bool>,
    /// Log timing for table loads and lookups
    pub debug: bool,
}

impl GeocodeOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_resolution(mut self, resolution: u8) -> Self {
        self.resolution = Some(resolution);
        self
    }

    pub fn with_fallback(mut self, fallback: bool) -> Self {
        self.fallback = Some(fallback);
        self
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Resolve defaults and clamp the resolution into `range`
    pub fn normalize(&self, range: ResolutionRange) -> NormalizedOptions {
        let resolution = self
            .resolution
            .map(|r| range.clamp(r))
            .unwrap_or_else(|| range.default_resolution());

        NormalizedOptions {
            resolution,
            fallback: self.fallback.unwrap_or(true),
            debug: self.debug,
        }
    }
}

/// Options with every default applied
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NormalizedOptions {
    pub resolution: u8,
    pub fallback: bool,
    pub debug: bool,
}

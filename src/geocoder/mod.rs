//! Reverse geocoding with resolution fallback.

mod options;
mod service;

pub use options::{GeocodeOptions, NormalizedOptions};
pub use service::ReverseGeocoder;

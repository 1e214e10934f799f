//! Core data models for the reverse geocoder.

pub mod location;

pub use location::{GeocodeResult, LocationRecord, ResolutionTable};

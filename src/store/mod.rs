//! Lookup table storage.
//!
//! `StoreReader` turns a resolution into a table read from disk, and
//! `ResolutionCache` keeps every configured resolution in memory after the
//! first lookup.

mod cache;
mod reader;

pub use cache::{ResolutionCache, TableOverrides};
pub use reader::{StoreError, StoreReader};

use crate::models::ResolutionTable;

/// Supplier of per-resolution lookup tables.
///
/// Implementations must not fail: missing or broken data reads as an empty
/// table.
pub trait TableSource: Send + Sync {
    fn read(&self, resolution: u8) -> ResolutionTable;
}

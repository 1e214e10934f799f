//! Reads one resolution's lookup table from disk.

use std::fs;
use std::io;
use std::path::PathBuf;
use thiserror::Error;
use tracing::{debug, warn};

use super::TableSource;
use crate::config::StoreConfig;
use crate::models::ResolutionTable;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// File-backed table source.
///
/// A missing, unreadable or malformed file reads as an empty table, so a bad
/// file for one resolution never blocks lookups at the others.
#[derive(Debug, Clone)]
pub struct StoreReader {
    config: StoreConfig,
}

impl StoreReader {
    pub fn new(config: StoreConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Read the table, surfacing the failure cause.
    ///
    /// `Ok(None)` means the file doesn't exist.
    pub fn try_read(&self, resolution: u8) -> Result<Option<ResolutionTable>, StoreError> {
        let path = self.config.data_file_path(resolution);
        let raw = match fs::read(&path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(StoreError::Io { path, source }),
        };

        serde_json::from_slice(&raw)
            .map(Some)
            .map_err(|source| StoreError::Parse { path, source })
    }
}

impl TableSource for StoreReader {
    fn read(&self, resolution: u8) -> ResolutionTable {
        match self.try_read(resolution) {
            Ok(Some(table)) => {
                debug!("Read {} cells for r{}", table.len(), resolution);
                table
            }
            Ok(None) => {
                debug!(
                    "No data file for r{} at {}",
                    resolution,
                    self.config.data_file_path(resolution).display()
                );
                ResolutionTable::new()
            }
            Err(e) => {
                warn!("Treating r{} as empty: {}", resolution, e);
                ResolutionTable::new()
            }
        }
    }
}

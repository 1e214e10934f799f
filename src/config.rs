//! Resolution constants and data store configuration.

use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Coarsest resolution with a lookup table
pub const MIN_RESOLUTION: u8 = 4;
/// Finest resolution with a lookup table
pub const MAX_RESOLUTION: u8 = 5;
pub const DEFAULT_RESOLUTION: u8 = MAX_RESOLUTION;
pub const SUPPORTED_RESOLUTIONS: &[u8] = &[4, 5];

pub const DATA_DIR_NAME: &str = "data";
pub const DATA_FILE_PREFIX: &str = "reverse_geo_";
pub const DATA_FILE_EXTENSION: &str = "json";

/// Overrides the data directory when set
pub const DATA_DIR_ENV: &str = "LAKHUA_DATA_DIR";

/// Finest resolution the H3 grid defines
const H3_MAX_RESOLUTION: u8 = 15;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("at least one resolution must be configured")]
    NoResolutions,
    #[error("resolution {0} is outside the H3 range 0..=15")]
    InvalidResolution(u8),
}

/// Inclusive range of resolutions the geocoder walks over
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolutionRange {
    pub min: u8,
    pub max: u8,
}

impl ResolutionRange {
    /// Range spanned by a resolution list, or the default range if it's empty
    pub fn from_resolutions(resolutions: &[u8]) -> Self {
        match (resolutions.iter().min(), resolutions.iter().max()) {
            (Some(&min), Some(&max)) => Self { min, max },
            _ => Self::default(),
        }
    }

    /// Clamp a resolution into the range
    pub fn clamp(&self, resolution: u8) -> u8 {
        resolution.clamp(self.min, self.max)
    }

    /// The resolution used when a caller doesn't pick one
    pub fn default_resolution(&self) -> u8 {
        self.max
    }
}

impl Default for ResolutionRange {
    fn default() -> Self {
        Self {
            min: MIN_RESOLUTION,
            max: MAX_RESOLUTION,
        }
    }
}

/// Where the per-resolution data files live and which resolutions to load.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub data_dir: PathBuf,
    pub file_prefix: String,
    pub resolutions: Vec<u8>,
}

/// Data files shipped with the crate
pub fn bundled_data_dir() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join(DATA_DIR_NAME)
}

impl Default for StoreConfig {
    fn default() -> Self {
        let data_dir = std::env::var_os(DATA_DIR_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(bundled_data_dir);

        Self {
            data_dir,
            file_prefix: DATA_FILE_PREFIX.to_string(),
            resolutions: SUPPORTED_RESOLUTIONS.to_vec(),
        }
    }
}

impl StoreConfig {
    /// Default layout rooted at another data directory
    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            ..Self::default()
        }
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: StoreConfig = toml::from_str(&content)?;
        config.validated()
    }

    /// Sort and dedupe the resolution list, rejecting empty or out-of-grid sets
    pub fn validated(mut self) -> Result<Self, ConfigError> {
        if self.resolutions.is_empty() {
            return Err(ConfigError::NoResolutions);
        }
        if let Some(&bad) = self.resolutions.iter().find(|&&r| r > H3_MAX_RESOLUTION) {
            return Err(ConfigError::InvalidResolution(bad));
        }
        self.resolutions.sort_unstable();
        self.resolutions.dedup();
        Ok(self)
    }

    pub fn range(&self) -> ResolutionRange {
        ResolutionRange::from_resolutions(&self.resolutions)
    }

    /// `<data_dir>/<prefix><resolution>.json`
    pub fn data_file_path(&self, resolution: u8) -> PathBuf {
        self.data_dir.join(format!(
            "{}{}.{}",
            self.file_prefix, resolution, DATA_FILE_EXTENSION
        ))
    }
}

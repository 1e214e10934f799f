//! Location records and lookup results.

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};

/// Administrative location attached to a cell in the lookup tables.
///
/// `district` and `pincode` keep the difference between a field that was
/// omitted from the data file (`None`) and one that was present but empty
/// (`Some("")`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocationRecord {
    pub city: String,
    pub state: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub district: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pincode: Option<String>,
}

impl LocationRecord {
    pub fn new(city: impl Into<String>, state: impl Into<String>) -> Self {
        Self {
            city: city.into(),
            state: state.into(),
            district: None,
            pincode: None,
        }
    }

    pub fn with_district(mut self, district: impl Into<String>) -> Self {
        self.district = Some(district.into());
        self
    }

    pub fn with_pincode(mut self, pincode: impl Into<String>) -> Self {
        self.pincode = Some(pincode.into());
        self
    }
}

/// Cell string -> location, for a single resolution
pub type ResolutionTable = HashMap<String, LocationRecord>;

/// A successful lookup: the record plus the cell and resolution that matched
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeocodeResult {
    #[serde(flatten)]
    pub location: LocationRecord,
    /// Encoded cell that was found in a table. This is an ancestor of the
    /// queried cell when the match came from a coarser resolution.
    #[serde(rename = "matched_h3")]
    pub matched_cell: String,
    pub matched_resolution: u8,
}

impl GeocodeResult {
    pub fn city(&self) -> &str {
        &self.location.city
    }

    pub fn state(&self) -> &str {
        &self.location.state
    }

    pub fn district(&self) -> Option<&str> {
        self.location.district.as_deref()
    }

    pub fn pincode(&self) -> Option<&str> {
        self.location.pincode.as_deref()
    }
}

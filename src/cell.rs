//! Spatial cell primitives backed by H3.
//!
//! The geocoder only needs a handful of operations from the hexagonal grid:
//! coordinate -> cell, string <-> cell, resolution and ancestor lookup.

use h3o::{CellIndex, LatLng, Resolution};

/// Parse a cell string, returning `None` for anything that isn't a valid cell
pub fn parse_cell(cell: &str) -> Option<CellIndex> {
    cell.parse::<CellIndex>().ok()
}

pub fn is_valid_cell(cell: &str) -> bool {
    parse_cell(cell).is_some()
}

/// Cell containing a coordinate at the given resolution.
///
/// Returns `None` for non-finite coordinates or a resolution the grid
/// doesn't define.
pub fn cell_from_coordinate(lat: f64, lon: f64, resolution: u8) -> Option<CellIndex> {
    let resolution = Resolution::try_from(resolution).ok()?;
    let point = LatLng::new(lat, lon).ok()?;
    Some(point.to_cell(resolution))
}

pub fn resolution_of(cell: CellIndex) -> u8 {
    u8::from(cell.resolution())
}

/// Ancestor of `cell` at a coarser (or equal) resolution
pub fn parent_at_resolution(cell: CellIndex, resolution: u8) -> Option<CellIndex> {
    let resolution = Resolution::try_from(resolution).ok()?;
    cell.parent(resolution)
}

/// Lowercase hex form used as the key in the data files
pub fn cell_to_string(cell: CellIndex) -> String {
    cell.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_cell() {
        let cell = parse_cell("8560145bfffffff").unwrap();
        assert_eq!(resolution_of(cell), 5);
        assert_eq!(cell_to_string(cell), "8560145bfffffff");

        assert!(!is_valid_cell("not-a-cell"));
        assert!(!is_valid_cell(""));
        assert!(!is_valid_cell("ffffffffffffffff"));
        assert!(!is_valid_cell(" 8560145bfffffff"));
        assert!(!is_valid_cell("8560145bfffffff\n"));
    }

    #[test]
    fn test_parent_chain() {
        let parent = parse_cell("8460145ffffffff").unwrap();
        let child = parent.children(Resolution::Five).next().unwrap();

        assert_eq!(resolution_of(child), 5);
        assert_eq!(parent_at_resolution(child, 4), Some(parent));
        assert_eq!(parent_at_resolution(child, 5), Some(child));
        // Can't go finer than the cell itself
        assert_eq!(parent_at_resolution(parent, 5), None);
    }

    #[test]
    fn test_cell_from_coordinate() {
        let cell = cell_from_coordinate(28.6139, 77.2090, 5).unwrap();
        assert_eq!(resolution_of(cell), 5);

        let coarse = cell_from_coordinate(28.6139, 77.2090, 4).unwrap();
        assert_eq!(parent_at_resolution(cell, 4), Some(coarse));

        assert!(cell_from_coordinate(f64::NAN, 77.0, 5).is_none());
        assert!(cell_from_coordinate(28.0, 77.0, 16).is_none());
    }
}

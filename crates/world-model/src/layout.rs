//! World layout grid: the biome tile map produced by the spatial generator.
//!
//! Cells are keyed by `"x,y"` strings on the wire so the payload stays a
//! plain JSON object. Absent keys mean "no land there" and are not rendered.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Parses a `"x,y"` cell key. Whitespace around the components is tolerated.
pub fn parse_coord_key(key: &str) -> Option<(i64, i64)> {
    let (x, y) = key.split_once(',')?;
    let x = x.trim().parse().ok()?;
    let y = y.trim().parse().ok()?;
    Some((x, y))
}

/// The biome tile grid.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorldLayout {
    pub width: u32,
    pub height: u32,
    /// `"x,y"` key to biome definition id.
    #[serde(default)]
    pub cells: HashMap<String, String>,
}

impl Default for WorldLayout {
    fn default() -> Self {
        Self {
            width: 1,
            height: 1,
            cells: HashMap::new(),
        }
    }
}

impl WorldLayout {
    /// Creates an empty layout of the given size.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width: width.max(1),
            height: height.max(1),
            cells: HashMap::new(),
        }
    }

    /// Returns the biome id at a coordinate, if the cell is occupied.
    pub fn cell(&self, x: i64, y: i64) -> Option<&str> {
        self.cells.get(&format!("{},{}", x, y)).map(String::as_str)
    }

    /// Checks grid bounds.
    pub fn in_bounds(&self, x: i64, y: i64) -> bool {
        x >= 0 && y >= 0 && (x as u64) < self.width as u64 && (y as u64) < self.height as u64
    }

    /// Iterates occupied cells with parsed, in-bounds coordinates.
    ///
    /// Keys that fail to parse or point outside the grid are skipped; a
    /// malformed cell never aborts rendering.
    pub fn iter_cells(&self) -> impl Iterator<Item = ((i64, i64), &str)> {
        self.cells.iter().filter_map(|(key, biome)| {
            let coord = parse_coord_key(key)?;
            if self.in_bounds(coord.0, coord.1) {
                Some((coord, biome.as_str()))
            } else {
                tracing::warn!("layout cell {:?} outside {}x{} grid, skipped", key, self.width, self.height);
                None
            }
        })
    }

    /// Number of occupied, valid cells.
    pub fn occupied_count(&self) -> usize {
        self.iter_cells().count()
    }

    /// Sets a cell; fixture and test helper.
    pub fn set_cell(&mut self, x: i64, y: i64, biome_id: impl Into<String>) {
        self.cells.insert(format!("{},{}", x, y), biome_id.into());
    }
}

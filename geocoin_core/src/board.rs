use std::collections::HashMap;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::GeoPoint;

/// Fixed-point precision applied to degrees before flooring, so that
/// repeated lookups of nearly-identical coordinates cannot drift across
/// cell boundaries.
const COORD_SCALE: f64 = 100_000.0;

/// A canonical discrete grid unit identified by an integer pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Cell {
    pub i: i64,
    pub j: i64,
}

/// Maps continuous geographic coordinates to canonical grid cells.
///
/// Cells are interned: repeated lookups of the same `(i, j)` return the
/// same `Rc<Cell>`, so callers can compare cells by pointer identity and
/// use them as map keys without re-deriving anything.
#[derive(Debug)]
pub struct GridIndex {
    tile_width: f64,
    known_cells: HashMap<(i64, i64), Rc<Cell>>,
}

impl GridIndex {
    pub fn new(tile_width: f64) -> Self {
        GridIndex {
            tile_width,
            known_cells: HashMap::new(),
        }
    }

    pub fn tile_width(&self) -> f64 {
        self.tile_width
    }

    fn canonical(&mut self, i: i64, j: i64) -> Rc<Cell> {
        Rc::clone(
            self.known_cells
                .entry((i, j))
                .or_insert_with(|| Rc::new(Cell { i, j })),
        )
    }

    /// Returns the canonical cell containing `point`, creating and
    /// caching it on first access. Any finite coordinate is valid.
    pub fn cell_for(&mut self, point: GeoPoint) -> Rc<Cell> {
        let i = (point.lat * COORD_SCALE / self.tile_width).floor() as i64;
        let j = (point.lng * COORD_SCALE / self.tile_width).floor() as i64;
        self.canonical(i, j)
    }

    /// The geographic rectangle covered by `cell`, as a
    /// (south-west, north-east) corner pair.
    pub fn bounds_for(&self, cell: &Cell) -> (GeoPoint, GeoPoint) {
        let south_west = GeoPoint::new(cell.i as f64 * self.tile_width, cell.j as f64 * self.tile_width);
        let north_east = GeoPoint::new(
            (cell.i + 1) as f64 * self.tile_width,
            (cell.j + 1) as f64 * self.tile_width,
        );
        (south_west, north_east)
    }

    /// All cells within Chebyshev distance `radius` of the cell
    /// containing `point`, inclusive, in row-major order (i ascending
    /// outer, j ascending inner). Always exactly `(2*radius+1)^2` cells.
    pub fn cells_near(&mut self, point: GeoPoint, radius: u32) -> Vec<Rc<Cell>> {
        let origin = self.cell_for(point);
        let r = radius as i64;
        let mut result = Vec::with_capacity(((2 * r + 1) * (2 * r + 1)) as usize);
        for di in -r..=r {
            for dj in -r..=r {
                result.push(self.canonical(origin.i + di, origin.j + dj));
            }
        }
        result
    }
}

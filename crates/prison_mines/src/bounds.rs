//! # Mine Bounds
//!
//! Axis-aligned integer region of a mine plus the world it lives in.
//!
//! Bounds are immutable. Resizing builds a new value through
//! [`Bounds::resized`].

use serde::{Deserialize, Serialize};

use crate::error::{MineError, MineResult};

/// Largest region a mine may cover, in cells.
pub const MAX_MINE_CELLS: u64 = 1 << 26;

/// One face (or the four side faces) of a mine region.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Edge {
    /// +y face.
    Top,
    /// -y face.
    Bottom,
    /// -z face.
    North,
    /// +x face.
    East,
    /// +z face.
    South,
    /// -x face.
    West,
    /// North, east, south and west together.
    Walls,
}

/// A point in a world. Used for teleport destinations and player positions.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Location {
    /// World identifier.
    pub world: String,
    /// X coordinate.
    pub x: f64,
    /// Y coordinate.
    pub y: f64,
    /// Z coordinate.
    pub z: f64,
}

impl Location {
    /// Creates a location.
    #[must_use]
    pub fn new(world: impl Into<String>, x: f64, y: f64, z: f64) -> Self {
        Self {
            world: world.into(),
            x,
            y,
            z,
        }
    }

    /// Block coordinates of the cell containing this location.
    #[inline]
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn block_coords(&self) -> (i32, i32, i32) {
        (
            self.x.floor() as i32,
            self.y.floor() as i32,
            self.z.floor() as i32,
        )
    }
}

/// Inclusive integer region of a mine.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Bounds {
    world: String,
    min_x: i32,
    min_y: i32,
    min_z: i32,
    max_x: i32,
    max_y: i32,
    max_z: i32,
}

impl Bounds {
    /// Creates bounds from two arbitrary corners. Each axis is normalized so
    /// that min <= max.
    #[must_use]
    pub fn new(world: impl Into<String>, a: [i32; 3], b: [i32; 3]) -> Self {
        Self {
            world: world.into(),
            min_x: a[0].min(b[0]),
            min_y: a[1].min(b[1]),
            min_z: a[2].min(b[2]),
            max_x: a[0].max(b[0]),
            max_y: a[1].max(b[1]),
            max_z: a[2].max(b[2]),
        }
    }

    /// World identifier.
    #[inline]
    #[must_use]
    pub fn world(&self) -> &str {
        &self.world
    }

    /// Minimum x.
    #[inline]
    #[must_use]
    pub const fn min_x(&self) -> i32 {
        self.min_x
    }

    /// Minimum y.
    #[inline]
    #[must_use]
    pub const fn min_y(&self) -> i32 {
        self.min_y
    }

    /// Minimum z.
    #[inline]
    #[must_use]
    pub const fn min_z(&self) -> i32 {
        self.min_z
    }

    /// Maximum x.
    #[inline]
    #[must_use]
    pub const fn max_x(&self) -> i32 {
        self.max_x
    }

    /// Maximum y.
    #[inline]
    #[must_use]
    pub const fn max_y(&self) -> i32 {
        self.max_y
    }

    /// Maximum z.
    #[inline]
    #[must_use]
    pub const fn max_z(&self) -> i32 {
        self.max_z
    }

    /// Cells along x.
    #[inline]
    #[must_use]
    #[allow(clippy::cast_sign_loss)]
    pub const fn width_x(&self) -> u64 {
        (self.max_x as i64 - self.min_x as i64 + 1) as u64
    }

    /// Cells along y. This is also the number of scan levels.
    #[inline]
    #[must_use]
    #[allow(clippy::cast_sign_loss)]
    pub const fn height(&self) -> u64 {
        (self.max_y as i64 - self.min_y as i64 + 1) as u64
    }

    /// Cells along z.
    #[inline]
    #[must_use]
    #[allow(clippy::cast_sign_loss)]
    pub const fn width_z(&self) -> u64 {
        (self.max_z as i64 - self.min_z as i64 + 1) as u64
    }

    /// Total number of cells in the region. Saturates at `u64::MAX`.
    #[inline]
    #[must_use]
    pub const fn total_cells(&self) -> u64 {
        self.width_x()
            .saturating_mul(self.height())
            .saturating_mul(self.width_z())
    }

    /// Fails unless the region fits in [`MAX_MINE_CELLS`].
    ///
    /// # Errors
    ///
    /// Returns [`MineError::InvalidBounds`] for oversized regions.
    pub fn check_volume(&self) -> MineResult<()> {
        let cells = self.total_cells();
        if cells > MAX_MINE_CELLS {
            return Err(MineError::InvalidBounds(format!(
                "region of {cells} cells exceeds the {MAX_MINE_CELLS} cell limit"
            )));
        }
        Ok(())
    }

    /// Returns true if the cell lies inside the region.
    #[inline]
    #[must_use]
    pub const fn contains(&self, x: i32, y: i32, z: i32) -> bool {
        x >= self.min_x
            && x <= self.max_x
            && y >= self.min_y
            && y <= self.max_y
            && z >= self.min_z
            && z <= self.max_z
    }

    /// Containment used for player checks: the column of the mine from one
    /// block below the floor to any height above the top counts as inside.
    #[must_use]
    pub fn within_include_top_bottom(&self, location: &Location) -> bool {
        if location.world != self.world {
            return false;
        }
        let (x, y, z) = location.block_coords();
        x >= self.min_x
            && x <= self.max_x
            && z >= self.min_z
            && z <= self.max_z
            && y >= self.min_y - 1
    }

    /// Center of the region in world space.
    #[must_use]
    pub fn center(&self) -> Location {
        Location::new(
            self.world.clone(),
            (f64::from(self.min_x) + f64::from(self.max_x) + 1.0) / 2.0,
            (f64::from(self.min_y) + f64::from(self.max_y) + 1.0) / 2.0,
            (f64::from(self.min_z) + f64::from(self.max_z) + 1.0) / 2.0,
        )
    }

    /// Straight line distance from the center. `None` for another world.
    #[must_use]
    pub fn distance_from_center(&self, location: &Location) -> Option<f64> {
        if location.world != self.world {
            return None;
        }
        let c = self.center();
        let (dx, dy, dz) = (location.x - c.x, location.y - c.y, location.z - c.z);
        Some((dx * dx + dy * dy + dz * dz).sqrt())
    }

    /// Location above the middle of the top face. Used as the fallback
    /// teleport target when a mine has no spawn.
    #[must_use]
    pub fn top_center(&self) -> Location {
        let c = self.center();
        Location::new(self.world.clone(), c.x, f64::from(self.max_y) + 2.0, c.z)
    }

    /// True if the cell lies on at least two boundary faces at once, i.e. an
    /// edge or corner of the box rather than a flat face.
    #[inline]
    #[must_use]
    pub const fn is_edge(&self, x: i32, y: i32, z: i32) -> bool {
        let x_edge = x == self.min_x || x == self.max_x;
        let y_edge = y == self.min_y || y == self.max_y;
        let z_edge = z == self.min_z || z == self.max_z;
        (x_edge && y_edge) || (x_edge && z_edge) || (y_edge && z_edge)
    }

    /// Returns new bounds with one edge moved outward by `amount` cells.
    /// A negative amount shrinks the region.
    ///
    /// # Errors
    ///
    /// Returns [`MineError::InvalidBounds`] if the result would be inverted,
    /// leaves the `i32` coordinate range or exceeds [`MAX_MINE_CELLS`].
    pub fn resized(&self, edge: Edge, amount: i32) -> MineResult<Self> {
        let overflow = || {
            MineError::InvalidBounds(format!("resizing {edge:?} by {amount} leaves the coordinate range"))
        };
        let grow = |v: i32| v.checked_add(amount).ok_or_else(overflow);
        let shrink = |v: i32| v.checked_sub(amount).ok_or_else(overflow);

        let mut next = self.clone();
        match edge {
            Edge::Top => next.max_y = grow(next.max_y)?,
            Edge::Bottom => next.min_y = shrink(next.min_y)?,
            Edge::North => next.min_z = shrink(next.min_z)?,
            Edge::South => next.max_z = grow(next.max_z)?,
            Edge::East => next.max_x = grow(next.max_x)?,
            Edge::West => next.min_x = shrink(next.min_x)?,
            Edge::Walls => {
                next.min_x = shrink(next.min_x)?;
                next.max_x = grow(next.max_x)?;
                next.min_z = shrink(next.min_z)?;
                next.max_z = grow(next.max_z)?;
            }
        }

        if next.min_x > next.max_x || next.min_y > next.max_y || next.min_z > next.max_z {
            return Err(MineError::InvalidBounds(format!(
                "resizing {edge:?} by {amount} collapses the region"
            )));
        }
        next.check_volume()?;
        Ok(next)
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn cube() -> Bounds {
        Bounds::new("world", [0, 0, 0], [2, 2, 2])
    }

    #[test]
    fn test_corners_are_normalized() {
        let b = Bounds::new("world", [10, 5, -3], [0, 20, 7]);
        assert_eq!((b.min_x(), b.min_y(), b.min_z()), (0, 5, -3));
        assert_eq!((b.max_x(), b.max_y(), b.max_z()), (10, 20, 7));
        assert_eq!(b.total_cells(), 11 * 16 * 11);
    }

    #[test]
    fn test_edge_membership_of_cube() {
        let b = cube();
        let mut corners = 0;
        let mut edge_midpoints = 0;
        let mut non_edges = 0;

        for x in 0..=2 {
            for y in 0..=2 {
                for z in 0..=2 {
                    let on_faces = [x != 1, y != 1, z != 1].iter().filter(|f| **f).count();
                    match on_faces {
                        3 => {
                            assert!(b.is_edge(x, y, z));
                            corners += 1;
                        }
                        2 => {
                            assert!(b.is_edge(x, y, z));
                            edge_midpoints += 1;
                        }
                        _ => {
                            assert!(!b.is_edge(x, y, z));
                            non_edges += 1;
                        }
                    }
                }
            }
        }

        assert_eq!(corners, 8);
        assert_eq!(edge_midpoints, 12);
        assert_eq!(non_edges, 7);
        assert!(!b.is_edge(1, 1, 1));
        assert!(!b.is_edge(1, 1, 0));
    }

    #[test]
    fn test_resize_grows_and_shrinks() {
        let b = cube();
        let taller = b.resized(Edge::Top, 3).unwrap();
        assert_eq!(taller.max_y(), 5);
        assert_eq!(taller.min_y(), 0);

        let walls = b.resized(Edge::Walls, 1).unwrap();
        assert_eq!((walls.min_x(), walls.max_x()), (-1, 3));
        assert_eq!((walls.min_z(), walls.max_z()), (-1, 3));
        assert_eq!(walls.height(), 3);

        let thinner = b.resized(Edge::West, -2).unwrap();
        assert_eq!(thinner.width_x(), 1);

        assert!(b.resized(Edge::Bottom, -3).is_err());
        // Original value is untouched
        assert_eq!(b, cube());
    }

    #[test]
    fn test_resize_out_of_range_is_rejected() {
        let b = cube();
        for edge in [Edge::Top, Edge::East, Edge::South, Edge::Walls] {
            assert!(matches!(b.resized(edge, i32::MAX), Err(MineError::InvalidBounds(_))));
        }
        for edge in [Edge::Bottom, Edge::West, Edge::North] {
            assert!(matches!(b.resized(edge, i32::MAX), Err(MineError::InvalidBounds(_))));
        }
        // Pulling the top below the floor
        assert!(matches!(b.resized(Edge::Top, i32::MIN), Err(MineError::InvalidBounds(_))));
        assert!(matches!(b.resized(Edge::Walls, 100_000), Err(MineError::InvalidBounds(_))));
        assert_eq!(b, cube());
    }

    #[test]
    fn test_huge_region_saturates_and_fails_volume_check() {
        let b = Bounds::new("world", [i32::MIN; 3], [i32::MAX; 3]);
        assert_eq!(b.width_x(), 1 << 32);
        assert_eq!(b.total_cells(), u64::MAX);
        assert!(matches!(b.check_volume(), Err(MineError::InvalidBounds(_))));
        assert!(cube().check_volume().is_ok());
    }

    #[test]
    fn test_containment_above_top() {
        let b = Bounds::new("world", [0, 10, 0], [9, 19, 9]);
        assert!(b.within_include_top_bottom(&Location::new("world", 5.5, 40.0, 5.5)));
        assert!(b.within_include_top_bottom(&Location::new("world", 0.0, 9.0, 9.9)));
        assert!(!b.within_include_top_bottom(&Location::new("world", 5.5, 8.0, 5.5)));
        assert!(!b.within_include_top_bottom(&Location::new("world", 10.0, 12.0, 5.0)));
        assert!(!b.within_include_top_bottom(&Location::new("nether", 5.0, 12.0, 5.0)));
    }

    #[test]
    fn test_center_and_distance() {
        let b = Bounds::new("world", [0, 0, 0], [9, 9, 9]);
        let c = b.center();
        assert!((c.x - 5.0).abs() < f64::EPSILON);
        let d = b.distance_from_center(&Location::new("world", 5.0, 5.0, 15.0)).unwrap();
        assert!((d - 10.0).abs() < 1e-9);
        assert!(b.distance_from_center(&Location::new("other", 0.0, 0.0, 0.0)).is_none());
    }
}

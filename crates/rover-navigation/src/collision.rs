//! Point and segment feasibility queries against an occupancy grid.
//!
//! Anything outside the grid is treated as an obstacle. Segments are checked by
//! sampling at half-cell spacing rather than exact rasterization, which is enough
//! to catch single-cell walls crossed at any angle.

#![warn(missing_docs)]

use crate::geometry::{GridIndex, WorldPoint};
use crate::map::OccupancyGrid;

/// Fraction of a cell used as the sampling step along segments.
pub const SEGMENT_SAMPLE_FRACTION: f64 = 0.5;

/// Read-only collision oracle over a grid snapshot.
#[derive(Debug, Clone, Copy)]
pub struct CollisionChecker<'a> {
    grid: &'a OccupancyGrid,
}

impl<'a> CollisionChecker<'a> {
    /// Creates a checker borrowing `grid` for the duration of the queries.
    pub fn new(grid: &'a OccupancyGrid) -> Self {
        Self { grid }
    }

    /// The grid being queried.
    pub fn grid(&self) -> &'a OccupancyGrid {
        self.grid
    }

    /// Returns true if `point` lies inside the grid on a free cell.
    pub fn is_point_free(&self, point: WorldPoint) -> bool {
        match self.grid.world_to_grid(point) {
            Some(index) => !self.grid.is_occupied(index),
            None => false,
        }
    }

    /// Returns true if every sample along the segment `a -> b` is free.
    ///
    /// A zero-length segment is free regardless of the cell it sits in.
    pub fn is_segment_free(&self, a: WorldPoint, b: WorldPoint) -> bool {
        if a == b {
            return true;
        }
        let dist = a.distance(&b);
        if !dist.is_finite() {
            return false;
        }

        let spacing = self.grid.resolution() * SEGMENT_SAMPLE_FRACTION;
        let steps = ((dist / spacing).ceil() as usize).max(1);

        (0..=steps).all(|i| self.is_point_free(a.lerp(&b, i as f64 / steps as f64)))
    }

    /// Like [`is_segment_free`](Self::is_segment_free), but samples at the start
    /// of the segment may be blocked as long as every sample after the first
    /// free one is free.
    ///
    /// Used for segments leaving the robot's own position, which can sit inside
    /// an inflation margin after the map grows around it.
    pub fn is_departure_free(&self, a: WorldPoint, b: WorldPoint) -> bool {
        if a == b {
            return true;
        }
        let dist = a.distance(&b);
        if !dist.is_finite() {
            return false;
        }

        let spacing = self.grid.resolution() * SEGMENT_SAMPLE_FRACTION;
        let steps = ((dist / spacing).ceil() as usize).max(1);

        let mut samples = (0..=steps).map(|i| self.is_point_free(a.lerp(&b, i as f64 / steps as f64)));
        samples.by_ref().any(|free| free) && samples.all(|free| free)
    }

    /// Center of the free cell closest to `point`, searching cells up to
    /// `max_distance` away. Returns `point` itself when it is already free.
    pub fn nearest_free_point(&self, point: WorldPoint, max_distance: f64) -> Option<WorldPoint> {
        if self.is_point_free(point) {
            return Some(point);
        }
        let center = self.grid.world_to_grid(point)?;
        let reach = (max_distance / self.grid.resolution()).ceil() as usize;

        let rows = center.row.saturating_sub(reach)..=(center.row + reach).min(self.grid.rows() - 1);
        let cols = center.col.saturating_sub(reach)..=(center.col + reach).min(self.grid.cols() - 1);

        let mut best: Option<(f64, WorldPoint)> = None;
        for row in rows {
            for col in cols.clone() {
                let index = GridIndex::new(row, col);
                if self.grid.is_occupied(index) {
                    continue;
                }
                let Some(p) = self.grid.grid_to_world(index) else {
                    continue;
                };
                let d = p.distance(&point);
                if d <= max_distance && best.is_none_or(|(bd, _)| d < bd) {
                    best = Some((d, p));
                }
            }
        }
        best.map(|(_, p)| p)
    }

    /// Returns true if every consecutive segment of `path` is free.
    pub fn is_path_free(&self, path: &[WorldPoint]) -> bool {
        path.windows(2).all(|w| self.is_segment_free(w[0], w[1]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn empty_grid() -> OccupancyGrid {
        OccupancyGrid::new(100, 100, 0.1, WorldPoint::new(-5.0, -5.0)).unwrap()
    }

    #[test]
    fn test_out_of_bounds_is_not_free() {
        let grid = empty_grid();
        let checker = CollisionChecker::new(&grid);

        for p in [
            WorldPoint::new(-5.01, 0.0),
            WorldPoint::new(5.0, 0.0),
            WorldPoint::new(0.0, 5.5),
            WorldPoint::new(0.0, -7.0),
            WorldPoint::new(100.0, 100.0),
            WorldPoint::new(f64::NAN, 0.0),
        ] {
            assert!(!checker.is_point_free(p), "{} should not be free", p);
        }
        assert!(checker.is_point_free(WorldPoint::new(-5.0, -5.0)));
        assert!(checker.is_point_free(WorldPoint::new(4.99, 4.99)));
    }

    #[test]
    fn test_zero_length_segment_is_free() {
        let mut grid = empty_grid();
        grid.fill_occupied();
        let checker = CollisionChecker::new(&grid);

        for p in [
            WorldPoint::new(0.0, 0.0),
            WorldPoint::new(1.23, -4.5),
            WorldPoint::new(50.0, 50.0),
        ] {
            assert!(checker.is_segment_free(p, p));
        }
    }

    #[test]
    fn test_empty_grid_segments_are_free() {
        let grid = empty_grid();
        let checker = CollisionChecker::new(&grid);

        let points = [
            WorldPoint::new(-4.95, -4.95),
            WorldPoint::new(4.95, 4.95),
            WorldPoint::new(-4.95, 4.95),
            WorldPoint::new(0.0, 0.0),
            WorldPoint::new(3.3, -1.7),
        ];
        for a in points {
            for b in points {
                assert!(checker.is_segment_free(a, b), "{} -> {}", a, b);
            }
        }
    }

    #[test]
    fn test_fully_occupied_grid() {
        let mut grid = empty_grid();
        grid.fill_occupied();
        let checker = CollisionChecker::new(&grid);

        for row in (0..100).step_by(7) {
            for col in (0..100).step_by(11) {
                let p = grid.grid_to_world(GridIndex::new(row, col)).unwrap();
                assert!(!checker.is_point_free(p));
            }
        }
        assert!(!checker.is_segment_free(WorldPoint::new(0.0, 0.0), WorldPoint::new(0.01, 0.0)));
    }

    #[test]
    fn test_segment_leaving_grid_is_blocked() {
        let grid = empty_grid();
        let checker = CollisionChecker::new(&grid);
        assert!(!checker.is_segment_free(WorldPoint::new(4.0, 0.0), WorldPoint::new(6.0, 0.0)));
    }

    #[test]
    fn test_blocked_endpoint() {
        let mut grid = empty_grid();
        grid.mark_occupied(grid.world_to_grid(WorldPoint::new(2.0, 2.0)).unwrap())
            .unwrap();
        let checker = CollisionChecker::new(&grid);
        assert!(!checker.is_segment_free(WorldPoint::new(0.0, 0.0), WorldPoint::new(2.0, 2.0)));
        assert!(!checker.is_segment_free(WorldPoint::new(2.0, 2.0), WorldPoint::new(0.0, 0.0)));
    }

    #[test]
    fn test_half_cell_sampling_catches_thin_wall() {
        let mut grid = empty_grid();
        // One-cell-thick vertical wall at column 50 (x in [0.0, 0.1))
        for row in 0..100 {
            grid.mark_occupied(GridIndex::new(row, 50)).unwrap();
        }
        let checker = CollisionChecker::new(&grid);

        // Straight across
        assert!(!checker.is_segment_free(WorldPoint::new(-0.35, 0.0), WorldPoint::new(0.35, 0.0)));
        // Steep diagonal crossing
        assert!(!checker.is_segment_free(
            WorldPoint::new(-0.3, -2.0),
            WorldPoint::new(0.4, 2.1)
        ));
        // Shallow diagonal crossing
        assert!(!checker.is_segment_free(
            WorldPoint::new(-4.0, -0.73),
            WorldPoint::new(3.9, 0.61)
        ));
        // Parallel to the wall on either side
        assert!(checker.is_segment_free(WorldPoint::new(-0.05, -4.0), WorldPoint::new(-0.05, 4.0)));
        assert!(checker.is_segment_free(WorldPoint::new(0.15, -4.0), WorldPoint::new(0.15, 4.0)));
    }

    #[test]
    fn test_half_cell_sampling_catches_clipped_corner() {
        let mut grid = OccupancyGrid::new(10, 10, 0.1, WorldPoint::new(0.0, 0.0)).unwrap();
        // Single cell covering x, y in [0.5, 0.6)
        grid.mark_occupied(GridIndex::new(5, 5)).unwrap();
        let checker = CollisionChecker::new(&grid);

        // Diagonal x + y = 1.04 crosses the cell's lower-left corner for x in [0.5, 0.54]
        let a = WorldPoint::new(0.42, 0.62);
        let b = WorldPoint::new(0.62, 0.42);

        // Samples one full cell apart step over the corner entirely
        let steps = (a.distance(&b) / grid.resolution()).ceil() as usize;
        assert_eq!(steps, 3);
        assert!((0..=steps).all(|i| checker.is_point_free(a.lerp(&b, i as f64 / steps as f64))));

        // Half-cell sampling lands a sample at (0.52, 0.52)
        assert_eq!(SEGMENT_SAMPLE_FRACTION, 0.5);
        assert!(!checker.is_segment_free(a, b));

        // The parallel diagonal x + y = 0.98 misses the cell
        assert!(checker.is_segment_free(WorldPoint::new(0.36, 0.62), WorldPoint::new(0.56, 0.42)));
    }

    #[test]
    fn test_departure_from_blocked_start() {
        let mut grid = empty_grid();
        // Three-cell-wide band around x = 0, as left by inflation
        for row in 0..100 {
            for col in 49..=51 {
                grid.mark_occupied(GridIndex::new(row, col)).unwrap();
            }
        }
        let checker = CollisionChecker::new(&grid);
        let inside = WorldPoint::new(0.05, 0.05);

        assert!(!checker.is_segment_free(inside, WorldPoint::new(-1.0, 0.0)));
        assert!(checker.is_departure_free(inside, WorldPoint::new(-1.0, 0.0)));
        // Crossing the whole band and re-entering is still blocked
        assert!(!checker.is_departure_free(WorldPoint::new(-1.0, 0.0), WorldPoint::new(1.0, 0.0)));
        // Ending inside an obstacle is blocked
        assert!(!checker.is_departure_free(inside, WorldPoint::new(0.12, 0.05)));
        assert!(checker.is_departure_free(inside, inside));
    }

    #[test]
    fn test_nearest_free_point() {
        let mut grid = empty_grid();
        for row in 0..100 {
            for col in 49..=51 {
                grid.mark_occupied(GridIndex::new(row, col)).unwrap();
            }
        }
        let checker = CollisionChecker::new(&grid);

        let free = WorldPoint::new(2.0, 2.0);
        assert_eq!(checker.nearest_free_point(free, 0.5), Some(free));

        // From x = 0.0 (column 50) the closest free centers are x = -0.15 and x = 0.25
        let p = checker.nearest_free_point(WorldPoint::new(0.0, 0.05), 1.0).unwrap();
        assert!((p.x - -0.15).abs() < 1e-9 && (p.y - 0.05).abs() < 1e-9);

        assert!(checker.nearest_free_point(WorldPoint::new(0.0, 0.05), 0.1).is_none());
        assert!(checker.nearest_free_point(WorldPoint::new(9.0, 0.0), 1.0).is_none());
    }

    #[test]
    fn test_is_path_free() {
        let mut grid = empty_grid();
        grid.mark_occupied(grid.world_to_grid(WorldPoint::new(1.0, 1.0)).unwrap())
            .unwrap();
        let checker = CollisionChecker::new(&grid);

        let clear = [
            WorldPoint::new(0.0, 0.0),
            WorldPoint::new(0.0, 2.0),
            WorldPoint::new(2.0, 2.0),
        ];
        let blocked = [
            WorldPoint::new(0.0, 0.0),
            WorldPoint::new(2.0, 2.0),
        ];
        assert!(checker.is_path_free(&clear));
        assert!(!checker.is_path_free(&blocked));
        assert!(checker.is_path_free(&clear[..1]));
    }
}

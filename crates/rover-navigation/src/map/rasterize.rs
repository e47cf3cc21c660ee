//! Converts static obstacle polygons into occupied grid cells.

use crate::geometry::{GridIndex, WorldPoint};
use crate::map::OccupancyGrid;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A rectangular wall segment as reported by the simulator's scene geometry.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WallRect {
    /// Center of the wall in world coordinates.
    pub center: WorldPoint,
    /// Extent along the wall's local x-axis (m).
    pub length: f64,
    /// Extent along the wall's local y-axis (m).
    pub width: f64,
    /// Rotation of the local frame about world z (rad).
    #[cfg_attr(feature = "serde", serde(default))]
    pub yaw: f64,
}

impl WallRect {
    /// Creates a wall rectangle.
    pub const fn new(center: WorldPoint, length: f64, width: f64, yaw: f64) -> Self {
        Self {
            center,
            length,
            width,
            yaw,
        }
    }

    /// Corner points in world coordinates, counter-clockwise from the local (+x, +y) corner.
    pub fn corners(&self) -> [WorldPoint; 4] {
        let (hl, hw) = (self.length / 2.0, self.width / 2.0);
        let (s, c) = self.yaw.sin_cos();
        [(hl, hw), (-hl, hw), (-hl, -hw), (hl, -hw)].map(|(bx, by)| {
            WorldPoint::new(
                self.center.x + c * bx - s * by,
                self.center.y + s * bx + c * by,
            )
        })
    }
}

/// Even-odd point-in-polygon test. Points exactly on an edge may land on either side.
pub fn point_in_polygon(p: &WorldPoint, polygon: &[WorldPoint]) -> bool {
    if polygon.len() < 3 {
        return false;
    }
    let mut inside = false;
    let mut j = polygon.len() - 1;
    for i in 0..polygon.len() {
        let (a, b) = (&polygon[i], &polygon[j]);
        if (a.y > p.y) != (b.y > p.y) {
            let x_cross = a.x + (p.y - a.y) * (b.x - a.x) / (b.y - a.y);
            if p.x < x_cross {
                inside = !inside;
            }
        }
        j = i;
    }
    inside
}

/// Marks every cell whose center lies inside one of `polygons` as occupied.
///
/// # Returns
/// The number of cells newly marked occupied.
pub fn rasterize_polygons<P: AsRef<[WorldPoint]>>(
    grid: &mut OccupancyGrid,
    polygons: &[P],
) -> usize {
    let mut marked = 0;

    for polygon in polygons {
        let polygon = polygon.as_ref();
        if polygon.len() < 3 || !polygon.iter().all(WorldPoint::is_finite) {
            continue;
        }

        let Some((cols, rows)) = cell_span(grid, polygon) else {
            continue;
        };

        for row in rows.0..=rows.1 {
            for col in cols.0..=cols.1 {
                let index = GridIndex::new(row, col);
                let Some(center) = grid.grid_to_world(index) else {
                    continue;
                };
                if point_in_polygon(&center, polygon)
                    && !grid.is_occupied(index)
                    && grid.mark_occupied(index).is_ok()
                {
                    marked += 1;
                }
            }
        }
    }

    marked
}

/// Column and row index ranges of the polygon's bounding box, clipped to the grid.
fn cell_span(
    grid: &OccupancyGrid,
    polygon: &[WorldPoint],
) -> Option<((usize, usize), (usize, usize))> {
    let (mut x_min, mut x_max) = (f64::INFINITY, f64::NEG_INFINITY);
    let (mut y_min, mut y_max) = (f64::INFINITY, f64::NEG_INFINITY);
    for p in polygon {
        x_min = x_min.min(p.x);
        x_max = x_max.max(p.x);
        y_min = y_min.min(p.y);
        y_max = y_max.max(p.y);
    }

    let origin = grid.origin();
    let res = grid.resolution();
    let clip = |lo: f64, hi: f64, o: f64, n: usize| -> Option<(usize, usize)> {
        let lo = ((lo - o) / res).floor();
        let hi = ((hi - o) / res).floor();
        if hi < 0.0 || lo >= n as f64 {
            return None;
        }
        Some((lo.max(0.0) as usize, (hi as usize).min(n - 1)))
    };

    Some((
        clip(x_min, x_max, origin.x, grid.cols())?,
        clip(y_min, y_max, origin.y, grid.rows())?,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::FRAC_PI_2;
    const EPSILON: f64 = 1e-9;

    #[test]
    fn test_corners_axis_aligned() {
        let wall = WallRect::new(WorldPoint::new(1.0, 2.0), 4.0, 0.2, 0.0);
        let c = wall.corners();
        assert!((c[0].x - 3.0).abs() < EPSILON && (c[0].y - 2.1).abs() < EPSILON);
        assert!((c[2].x - -1.0).abs() < EPSILON && (c[2].y - 1.9).abs() < EPSILON);
    }

    #[test]
    fn test_corners_rotated() {
        let wall = WallRect::new(WorldPoint::new(0.0, 0.0), 2.0, 0.2, FRAC_PI_2);
        let c = wall.corners();
        // Local +x now points along world +y
        assert!((c[0].x - -0.1).abs() < EPSILON);
        assert!((c[0].y - 1.0).abs() < EPSILON);
    }

    #[test]
    fn test_point_in_polygon() {
        let square = [
            WorldPoint::new(0.0, 0.0),
            WorldPoint::new(1.0, 0.0),
            WorldPoint::new(1.0, 1.0),
            WorldPoint::new(0.0, 1.0),
        ];
        assert!(point_in_polygon(&WorldPoint::new(0.5, 0.5), &square));
        assert!(!point_in_polygon(&WorldPoint::new(1.5, 0.5), &square));
        assert!(!point_in_polygon(&WorldPoint::new(0.5, -0.1), &square));
        assert!(!point_in_polygon(&WorldPoint::new(0.5, 0.5), &square[..2]));
    }

    #[test]
    fn test_rasterize_horizontal_wall() {
        let mut grid = OccupancyGrid::new(10, 10, 0.1, WorldPoint::new(0.0, 0.0)).unwrap();
        // Covers the centers of row 5, columns 2..=7
        let wall = WallRect::new(WorldPoint::new(0.5, 0.55), 0.6, 0.08, 0.0);

        let marked = rasterize_polygons(&mut grid, &[wall.corners()]);
        assert_eq!(marked, 6);
        for col in 2..=7 {
            assert!(grid.is_occupied(GridIndex::new(5, col)));
        }
        assert!(!grid.is_occupied(GridIndex::new(5, 1)));
        assert!(!grid.is_occupied(GridIndex::new(4, 4)));

        // Re-rasterizing marks nothing new
        assert_eq!(rasterize_polygons(&mut grid, &[wall.corners()]), 0);
    }

    #[test]
    fn test_rasterize_rotated_wall() {
        let mut grid = OccupancyGrid::new(10, 10, 0.1, WorldPoint::new(0.0, 0.0)).unwrap();
        // Vertical wall along column 3
        let wall = WallRect::new(WorldPoint::new(0.35, 0.5), 0.6, 0.08, FRAC_PI_2);

        rasterize_polygons(&mut grid, &[wall.corners()]);
        for row in 2..=7 {
            assert!(grid.is_occupied(GridIndex::new(row, 3)));
        }
        assert_eq!(grid.occupied_count(), 6);
    }

    #[test]
    fn test_rasterize_clips_to_grid() {
        let mut grid = OccupancyGrid::new(10, 10, 0.1, WorldPoint::new(0.0, 0.0)).unwrap();
        let big = [
            WorldPoint::new(-5.0, -5.0),
            WorldPoint::new(0.22, -5.0),
            WorldPoint::new(0.22, 5.0),
            WorldPoint::new(-5.0, 5.0),
        ];
        let outside = [
            WorldPoint::new(2.0, 2.0),
            WorldPoint::new(3.0, 2.0),
            WorldPoint::new(3.0, 3.0),
        ];
        let marked = rasterize_polygons(&mut grid, &[&big[..], &outside[..]]);
        // Columns 0 and 1 have centers at 0.05 and 0.15
        assert_eq!(marked, 20);
    }
}

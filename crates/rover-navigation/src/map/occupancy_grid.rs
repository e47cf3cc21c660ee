//! Occupancy grid used for collision checking.
//!
//! Each cell stores an occupancy value in `[0, 1]`. Binary maps use `0.0` for free
//! space and `1.0` for obstacles; graded maps are thresholded at
//! [`OCCUPIED_THRESHOLD`].

#![warn(missing_docs)]

use crate::error::NavigationError;
use crate::geometry::{GridIndex, WorldPoint};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Cells with a value strictly above this threshold are occupied.
pub const OCCUPIED_THRESHOLD: f32 = 0.5;

/// Value written into cells that are marked occupied.
pub const OCCUPIED: f32 = 1.0;

/// Value of a free cell.
pub const FREE: f32 = 0.0;

/// Axis-aligned rectangle in world coordinates.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MapBounds {
    /// Minimum x (m).
    pub x_min: f64,
    /// Maximum x (m).
    pub x_max: f64,
    /// Minimum y (m).
    pub y_min: f64,
    /// Maximum y (m).
    pub y_max: f64,
}

impl MapBounds {
    /// Creates new bounds. No ordering check is done here.
    pub const fn new(x_min: f64, x_max: f64, y_min: f64, y_max: f64) -> Self {
        Self {
            x_min,
            x_max,
            y_min,
            y_max,
        }
    }

    /// Returns true if the bounds are finite and not inverted.
    pub fn is_valid(&self) -> bool {
        [self.x_min, self.x_max, self.y_min, self.y_max]
            .iter()
            .all(|v| v.is_finite())
            && self.x_min <= self.x_max
            && self.y_min <= self.y_max
    }

    /// Returns true if `p` lies inside the bounds (edges included).
    pub fn contains(&self, p: &WorldPoint) -> bool {
        p.x >= self.x_min && p.x <= self.x_max && p.y >= self.y_min && p.y <= self.y_max
    }
}

/// A 2D occupancy grid indexed `[row][col]`.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct OccupancyGrid {
    /// Number of rows (cells along world y).
    rows: usize,
    /// Number of columns (cells along world x).
    cols: usize,
    /// Resolution of the grid in meters per cell.
    resolution: f64,
    /// World coordinate of the outer corner of cell [0][0].
    origin: WorldPoint,
    /// Row-major occupancy values.
    data: Vec<f32>,
}

impl OccupancyGrid {
    /// Creates a new, entirely free grid.
    ///
    /// # Arguments
    /// * `rows` - Number of cells along world y
    /// * `cols` - Number of cells along world x
    /// * `resolution` - Meters per cell
    /// * `origin` - World coordinate of the corner of cell [0][0]
    pub fn new(
        rows: usize,
        cols: usize,
        resolution: f64,
        origin: WorldPoint,
    ) -> Result<Self, NavigationError> {
        if rows == 0 || cols == 0 {
            return Err(NavigationError::InvalidDimensions(
                "Rows and columns must be non-zero",
            ));
        }
        if !(resolution.is_finite() && resolution > 0.0) {
            return Err(NavigationError::InvalidResolution(
                "Resolution must be positive and finite",
            ));
        }
        if !origin.is_finite() {
            return Err(NavigationError::InvalidDimensions("Origin must be finite"));
        }

        let total_cells = rows
            .checked_mul(cols)
            .ok_or(NavigationError::InvalidDimensions(
                "Grid dimensions too large, would cause overflow",
            ))?;

        Ok(OccupancyGrid {
            rows,
            cols,
            resolution,
            origin,
            data: vec![FREE; total_cells],
        })
    }

    /// Creates a grid covering `bounds` at `resolution`, rounding the cell counts up.
    pub fn from_bounds(bounds: MapBounds, resolution: f64) -> Result<Self, NavigationError> {
        if !bounds.is_valid() {
            return Err(NavigationError::InvalidDimensions(
                "Bounds must be finite and ordered",
            ));
        }
        if !(resolution.is_finite() && resolution > 0.0) {
            return Err(NavigationError::InvalidResolution(
                "Resolution must be positive and finite",
            ));
        }
        let cols = ((bounds.x_max - bounds.x_min) / resolution).ceil() as usize;
        let rows = ((bounds.y_max - bounds.y_min) / resolution).ceil() as usize;
        Self::new(
            rows,
            cols,
            resolution,
            WorldPoint::new(bounds.x_min, bounds.y_min),
        )
    }

    /// Number of rows.
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Number of columns.
    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Meters per cell.
    pub fn resolution(&self) -> f64 {
        self.resolution
    }

    /// World coordinate of the corner of cell [0][0].
    pub fn origin(&self) -> WorldPoint {
        self.origin
    }

    /// World-space rectangle covered by the grid.
    pub fn bounds(&self) -> MapBounds {
        MapBounds::new(
            self.origin.x,
            self.origin.x + self.cols as f64 * self.resolution,
            self.origin.y,
            self.origin.y + self.rows as f64 * self.resolution,
        )
    }

    fn get_index(&self, index: GridIndex) -> Option<usize> {
        (index.row < self.rows && index.col < self.cols).then(|| index.row * self.cols + index.col)
    }

    /// Converts world coordinates to a grid index.
    /// Returns None if the point is outside the grid or not finite.
    pub fn world_to_grid(&self, point: WorldPoint) -> Option<GridIndex> {
        if !point.is_finite() {
            return None;
        }
        let col_f = ((point.x - self.origin.x) / self.resolution).floor();
        let row_f = ((point.y - self.origin.y) / self.resolution).floor();

        if col_f < 0.0 || row_f < 0.0 || col_f >= self.cols as f64 || row_f >= self.rows as f64 {
            return None;
        }

        Some(GridIndex::new(row_f as usize, col_f as usize))
    }

    /// Converts a grid index to world coordinates (center of cell).
    pub fn grid_to_world(&self, index: GridIndex) -> Option<WorldPoint> {
        self.get_index(index)?;
        Some(WorldPoint::new(
            self.origin.x + (index.col as f64 + 0.5) * self.resolution,
            self.origin.y + (index.row as f64 + 0.5) * self.resolution,
        ))
    }

    /// Gets the occupancy value of a cell.
    pub fn value(&self, index: GridIndex) -> Result<f32, NavigationError> {
        self.get_index(index)
            .map(|i| self.data[i])
            .ok_or(NavigationError::OutOfBounds("Grid index out of bounds"))
    }

    /// Sets the occupancy value of a cell. The value is clamped to `[0, 1]`.
    pub fn set_value(&mut self, index: GridIndex, value: f32) -> Result<(), NavigationError> {
        let i = self
            .get_index(index)
            .ok_or(NavigationError::OutOfBounds("Grid index out of bounds"))?;
        self.data[i] = value.clamp(FREE, OCCUPIED);
        Ok(())
    }

    /// Marks a cell as occupied.
    pub fn mark_occupied(&mut self, index: GridIndex) -> Result<(), NavigationError> {
        self.set_value(index, OCCUPIED)
    }

    /// Marks the cell containing `point` as occupied.
    /// Returns false when the point falls outside the grid.
    pub fn mark_occupied_at_world(&mut self, point: WorldPoint) -> bool {
        match self.world_to_grid(point) {
            Some(index) => self.mark_occupied(index).is_ok(),
            None => false,
        }
    }

    /// Returns true if the cell is occupied. Indices outside the grid count as occupied.
    pub fn is_occupied(&self, index: GridIndex) -> bool {
        match self.get_index(index) {
            Some(i) => self.data[i] > OCCUPIED_THRESHOLD,
            None => true,
        }
    }

    /// Number of occupied cells.
    pub fn occupied_count(&self) -> usize {
        self.data.iter().filter(|&&v| v > OCCUPIED_THRESHOLD).count()
    }

    /// Gets a reference to the underlying row-major data.
    pub fn data(&self) -> &[f32] {
        &self.data
    }

    /// Clears the entire grid, setting all cells free.
    pub fn clear(&mut self) {
        self.data.fill(FREE);
    }

    /// Marks every cell occupied.
    pub fn fill_occupied(&mut self) {
        self.data.fill(OCCUPIED);
    }

    /// Dilates the occupied region `iterations` times with a 4-connected
    /// structuring element.
    ///
    /// Each pass marks every cell that shares an edge with an occupied cell, so
    /// after `n` passes obstacles have grown by a Manhattan distance of `n` cells.
    /// Dilation is destructive: the pre-inflation map is not kept.
    pub fn inflate(&mut self, iterations: usize) {
        for _ in 0..iterations {
            let snapshot = self.data.clone();
            let mut changed = false;

            for row in 0..self.rows {
                for col in 0..self.cols {
                    if snapshot[row * self.cols + col] <= OCCUPIED_THRESHOLD {
                        continue;
                    }
                    for (dr, dc) in [(-1isize, 0isize), (1, 0), (0, -1), (0, 1)] {
                        let (Some(r), Some(c)) =
                            (row.checked_add_signed(dr), col.checked_add_signed(dc))
                        else {
                            continue;
                        };
                        if let Some(i) = self.get_index(GridIndex::new(r, c)) {
                            if self.data[i] <= OCCUPIED_THRESHOLD {
                                self.data[i] = OCCUPIED;
                                changed = true;
                            }
                        }
                    }
                }
            }

            if !changed {
                break;
            }
        }
    }

    /// Inflates obstacles by a radius in meters, using
    /// `ceil(radius / resolution)` dilation passes.
    ///
    /// # Returns
    /// The number of passes requested.
    pub fn inflate_by_radius(&mut self, radius: f64) -> Result<usize, NavigationError> {
        if !(radius.is_finite() && radius > 0.0) {
            return Err(NavigationError::InvalidInflationRadius(
                "Inflation radius must be positive",
            ));
        }
        let iterations = (radius / self.resolution).ceil() as usize;
        self.inflate(iterations);
        Ok(iterations)
    }
}

impl std::fmt::Display for OccupancyGrid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(
            f,
            "OccupancyGrid ({}x{}, resolution: {:.3}m)",
            self.rows, self.cols, self.resolution
        )?;
        writeln!(f, "Origin: ({:.3}, {:.3})", self.origin.x, self.origin.y)?;

        // Highest row first so +y points up
        for row in (0..self.rows).rev() {
            for col in 0..self.cols {
                let c = if self.is_occupied(GridIndex::new(row, col)) {
                    '#'
                } else {
                    '.'
                };
                write!(f, "{}", c)?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    const EPSILON: f64 = 1e-9;

    fn grid_10x10() -> OccupancyGrid {
        OccupancyGrid::new(10, 10, 0.1, WorldPoint::new(0.0, 0.0)).unwrap()
    }

    #[test]
    fn test_grid_creation() {
        let grid = OccupancyGrid::new(20, 10, 0.1, WorldPoint::new(-1.0, -0.5)).unwrap();
        assert_eq!(grid.rows(), 20);
        assert_eq!(grid.cols(), 10);
        assert_eq!(grid.resolution(), 0.1);
        assert_eq!(grid.data().len(), 200);
        assert_eq!(grid.occupied_count(), 0);

        let bounds = grid.bounds();
        assert!((bounds.x_min - -1.0).abs() < EPSILON);
        assert!((bounds.x_max - 0.0).abs() < EPSILON);
        assert!((bounds.y_min - -0.5).abs() < EPSILON);
        assert!((bounds.y_max - 1.5).abs() < EPSILON);
    }

    #[test]
    fn test_invalid_creation() {
        let origin = WorldPoint::new(0.0, 0.0);
        assert!(matches!(
            OccupancyGrid::new(0, 10, 0.1, origin),
            Err(NavigationError::InvalidDimensions(_))
        ));
        assert!(matches!(
            OccupancyGrid::new(10, 0, 0.1, origin),
            Err(NavigationError::InvalidDimensions(_))
        ));
        assert!(matches!(
            OccupancyGrid::new(10, 10, 0.0, origin),
            Err(NavigationError::InvalidResolution(_))
        ));
        assert!(matches!(
            OccupancyGrid::new(10, 10, f64::NAN, origin),
            Err(NavigationError::InvalidResolution(_))
        ));
        assert!(matches!(
            OccupancyGrid::new(usize::MAX, 2, 0.1, origin),
            Err(NavigationError::InvalidDimensions(_))
        ));
    }

    #[test]
    fn test_from_bounds() {
        let grid =
            OccupancyGrid::from_bounds(MapBounds::new(-5.0, 5.0, -5.0, 5.0), 0.1).unwrap();
        assert_eq!(grid.rows(), 100);
        assert_eq!(grid.cols(), 100);
        assert_eq!(grid.origin(), WorldPoint::new(-5.0, -5.0));

        assert!(OccupancyGrid::from_bounds(MapBounds::new(1.0, -1.0, 0.0, 1.0), 0.1).is_err());
    }

    #[test]
    fn test_coordinate_conversion() {
        let grid = OccupancyGrid::new(10, 10, 0.1, WorldPoint::new(-0.5, -0.5)).unwrap();

        // World (0.0, 0.0) should map to grid (5, 5)
        assert_eq!(
            grid.world_to_grid(WorldPoint::new(0.0, 0.0)),
            Some(GridIndex::new(5, 5))
        );
        // x selects the column, y selects the row
        assert_eq!(
            grid.world_to_grid(WorldPoint::new(-0.45, 0.35)),
            Some(GridIndex::new(8, 0))
        );

        // Grid (5, 5) should map to world center of cell (0.05, 0.05)
        let center = grid.grid_to_world(GridIndex::new(5, 5)).unwrap();
        assert!((center.x - 0.05).abs() < EPSILON);
        assert!((center.y - 0.05).abs() < EPSILON);

        // Round trip through the cell center
        let idx = GridIndex::new(2, 7);
        let p = grid.grid_to_world(idx).unwrap();
        assert_eq!(grid.world_to_grid(p), Some(idx));

        // Out of bounds, including points just below the origin that would
        // truncate to index 0
        assert!(grid.world_to_grid(WorldPoint::new(0.5, 0.0)).is_none());
        assert!(grid.world_to_grid(WorldPoint::new(-0.51, 0.0)).is_none());
        assert!(grid.world_to_grid(WorldPoint::new(0.0, -0.501)).is_none());
        assert!(grid.world_to_grid(WorldPoint::new(f64::NAN, 0.0)).is_none());
        assert!(grid.grid_to_world(GridIndex::new(10, 0)).is_none());
    }

    #[test]
    fn test_value_operations() {
        let mut grid = grid_10x10();
        let idx = GridIndex::new(2, 3);

        grid.mark_occupied(idx).unwrap();
        assert!(grid.is_occupied(idx));
        assert_eq!(grid.value(idx).unwrap(), OCCUPIED);

        // Graded values are thresholded at 0.5
        grid.set_value(idx, 0.5).unwrap();
        assert!(!grid.is_occupied(idx));
        grid.set_value(idx, 0.51).unwrap();
        assert!(grid.is_occupied(idx));

        // Values are clamped into [0, 1]
        grid.set_value(idx, 255.0).unwrap();
        assert_eq!(grid.value(idx).unwrap(), OCCUPIED);

        assert!(matches!(
            grid.set_value(GridIndex::new(10, 0), OCCUPIED),
            Err(NavigationError::OutOfBounds(_))
        ));
        assert!(matches!(
            grid.value(GridIndex::new(0, 10)),
            Err(NavigationError::OutOfBounds(_))
        ));
        assert!(grid.is_occupied(GridIndex::new(0, 10)));

        assert!(grid.mark_occupied_at_world(WorldPoint::new(0.95, 0.05)));
        assert!(grid.is_occupied(GridIndex::new(0, 9)));
        assert!(!grid.mark_occupied_at_world(WorldPoint::new(1.5, 0.05)));

        grid.clear();
        assert_eq!(grid.occupied_count(), 0);
        grid.fill_occupied();
        assert_eq!(grid.occupied_count(), 100);
    }

    #[test]
    fn test_inflate_single_cell() {
        let mut grid = grid_10x10();
        grid.mark_occupied(GridIndex::new(5, 5)).unwrap();

        grid.inflate(1);
        // Center plus its four edge neighbors
        assert_eq!(grid.occupied_count(), 5);
        assert!(grid.is_occupied(GridIndex::new(4, 5)));
        assert!(grid.is_occupied(GridIndex::new(6, 5)));
        assert!(grid.is_occupied(GridIndex::new(5, 4)));
        assert!(grid.is_occupied(GridIndex::new(5, 6)));
        assert!(!grid.is_occupied(GridIndex::new(4, 4)));

        grid.inflate(1);
        // Diamond of Manhattan radius 2
        assert_eq!(grid.occupied_count(), 13);
        assert!(grid.is_occupied(GridIndex::new(4, 4)));
        assert!(grid.is_occupied(GridIndex::new(3, 5)));
        assert!(!grid.is_occupied(GridIndex::new(3, 4)));
    }

    #[test]
    fn test_inflate_at_border() {
        let mut grid = grid_10x10();
        grid.mark_occupied(GridIndex::new(0, 0)).unwrap();
        grid.inflate(1);
        assert_eq!(grid.occupied_count(), 3);
    }

    #[test]
    fn test_inflate_by_radius() {
        let mut grid = grid_10x10();
        grid.mark_occupied(GridIndex::new(5, 5)).unwrap();

        // 0.25 m at 0.1 m/cell rounds up to 3 passes
        assert_eq!(grid.inflate_by_radius(0.25).unwrap(), 3);
        assert!(grid.is_occupied(GridIndex::new(5, 8)));
        assert!(grid.is_occupied(GridIndex::new(6, 7)));
        assert!(!grid.is_occupied(GridIndex::new(5, 9)));

        assert!(matches!(
            grid.inflate_by_radius(0.0),
            Err(NavigationError::InvalidInflationRadius(_))
        ));
    }

    #[test]
    fn test_display() {
        let mut grid = OccupancyGrid::new(3, 4, 0.1, WorldPoint::new(0.0, 0.0)).unwrap();
        grid.mark_occupied(GridIndex::new(2, 0)).unwrap();

        let display_str = format!("{}", grid);
        assert!(display_str.contains("OccupancyGrid (3x4"));
        // Top row printed first
        let rows: Vec<&str> = display_str.lines().skip(2).collect();
        assert_eq!(rows, vec!["#...", "....", "...."]);
    }
}

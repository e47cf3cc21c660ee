//! Map-related functionality for navigation.
//!
//! This module provides the occupancy grid used by the collision checker and the
//! map sources that fill it: static wall rasterization and range-scan accumulation.

pub mod occupancy_grid;
pub mod rasterize;
pub mod scan;

pub use occupancy_grid::{MapBounds, OCCUPIED_THRESHOLD, OccupancyGrid};
pub use rasterize::{WallRect, point_in_polygon, rasterize_polygons};
pub use scan::{LaserScan, accumulate_scan};

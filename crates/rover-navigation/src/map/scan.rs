//! Accumulates planar range scans into an occupancy grid.

use crate::geometry::{Pose, WorldPoint};
use crate::map::OccupancyGrid;

/// A single planar range scan with evenly spaced beams.
#[derive(Debug, Clone, PartialEq)]
pub struct LaserScan {
    /// Measured ranges (m), one per beam.
    pub ranges: Vec<f64>,
    /// Angle of the first beam in the body frame (rad).
    pub angle_min: f64,
    /// Angle of the last beam in the body frame (rad).
    pub angle_max: f64,
    /// Returns at or beyond this range are treated as "no hit".
    pub max_range: f64,
}

impl LaserScan {
    /// Angle of beam `i`. Beams span `angle_min..=angle_max`.
    pub fn beam_angle(&self, i: usize) -> f64 {
        let n = self.ranges.len();
        if n <= 1 {
            return self.angle_min;
        }
        self.angle_min + (self.angle_max - self.angle_min) * i as f64 / (n - 1) as f64
    }

    /// World-frame hit points for all valid returns, given the sensor pose.
    pub fn hit_points(&self, pose: &Pose) -> Vec<WorldPoint> {
        let (s, c) = pose.theta.sin_cos();
        self.ranges
            .iter()
            .enumerate()
            .filter(|&(_, &r)| r.is_finite() && r > 0.0 && r < self.max_range)
            .map(|(i, &r)| {
                let (bs, bc) = self.beam_angle(i).sin_cos();
                let (bx, by) = (r * bc, r * bs);
                WorldPoint::new(pose.x + c * bx - s * by, pose.y + s * bx + c * by)
            })
            .collect()
    }
}

/// Marks the cells hit by `scan`, taken at `pose`, as occupied.
///
/// Hits outside the grid are dropped. Cells are never cleared, so the grid only
/// accumulates obstacles over time.
///
/// # Returns
/// The number of hits that landed inside the grid.
pub fn accumulate_scan(grid: &mut OccupancyGrid, pose: &Pose, scan: &LaserScan) -> usize {
    scan.hit_points(pose)
        .into_iter()
        .filter(|p| grid.mark_occupied_at_world(*p))
        .count()
}

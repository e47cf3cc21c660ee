use anyhow::Context;
use rover_navigation::{OccupancyGrid, WallRect, WorldPoint, rasterize_polygons};
use tracing::info;

use crate::settings::Settings;

/// Maps derived from the configured scene.
#[derive(Debug, Clone)]
pub struct World {
    /// Ground-truth walls, used by the simulated lidar.
    pub truth: OccupancyGrid,
    /// Raw obstacles known to the robot at start-up, before inflation.
    pub known: OccupancyGrid,
    /// Inflation margin applied to the known map before planning (m).
    pub robot_radius: f64,
}

impl World {
    pub fn build(settings: &Settings) -> anyhow::Result<Self> {
        let m = &settings.map;
        let empty = OccupancyGrid::new(m.rows, m.cols, m.resolution, m.origin)
            .context("invalid map geometry")?;

        let mut truth = empty.clone();
        let marked = rasterize_walls(&mut truth, &settings.walls);
        info!(
            walls = settings.walls.len(),
            cells = marked,
            rows = m.rows,
            cols = m.cols,
            resolution = m.resolution,
            "Rasterized walls"
        );

        let known = if m.walls_known { truth.clone() } else { empty };
        Ok(World {
            truth,
            known,
            robot_radius: m.robot_radius,
        })
    }
}

pub fn rasterize_walls(grid: &mut OccupancyGrid, walls: &[WallRect]) -> usize {
    let polygons: Vec<[WorldPoint; 4]> = walls.iter().map(WallRect::corners).collect();
    rasterize_polygons(grid, &polygons)
}

/// Returns an inflated copy of `raw` for planning. Zero radius returns it unchanged.
pub fn inflated(raw: &OccupancyGrid, robot_radius: f64) -> anyhow::Result<OccupancyGrid> {
    let mut grid = raw.clone();
    if robot_radius > 0.0 {
        grid.inflate_by_radius(robot_radius)
            .context("failed to inflate map")?;
    }
    Ok(grid)
}

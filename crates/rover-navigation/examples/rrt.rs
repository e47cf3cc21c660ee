use rover_navigation::geometry::GridIndex;
use rover_navigation::{
    CollisionChecker, MapBounds, OccupancyGrid, RrtConfig, RrtPlanner, StepPolicy, WallRect,
    WorldPoint, rasterize_polygons,
};
use std::collections::HashSet;

fn main() {
    // 10 m x 5 m room at 0.25 m per cell
    let bounds = MapBounds::new(0.0, 10.0, 0.0, 5.0);
    let mut grid = OccupancyGrid::from_bounds(bounds, 0.25).unwrap();

    let walls = [
        WallRect::new(WorldPoint::new(3.0, 1.5), 3.0, 0.3, std::f64::consts::FRAC_PI_2),
        WallRect::new(WorldPoint::new(6.5, 3.5), 3.0, 0.3, std::f64::consts::FRAC_PI_2),
        WallRect::new(WorldPoint::new(8.0, 1.0), 1.5, 0.3, 0.6),
    ];
    let polygons: Vec<[WorldPoint; 4]> = walls.iter().map(WallRect::corners).collect();
    let marked = rasterize_polygons(&mut grid, &polygons);
    grid.inflate(1);

    println!("Map ({} wall cells before inflation):", marked);
    println!("{}", grid);

    let start = WorldPoint::new(0.6, 0.6);
    let goal = WorldPoint::new(9.4, 4.4);

    let mut config = RrtConfig::new(bounds);
    config.max_iterations = 5000;
    config.step_policy = StepPolicy::ClampToSample;
    config.seed = Some(42);
    let mut planner = RrtPlanner::new(config).unwrap();

    let checker = CollisionChecker::new(&grid);
    let result = planner.plan(start, goal, &checker);
    println!("{}", result);

    let Some(path) = result.path else {
        println!("\nNo path found.");
        return;
    };

    println!("\nPath:");
    for p in &path {
        println!("  {}", p);
    }

    // Mark cells along each segment at quarter-cell spacing
    let mut path_cells: HashSet<GridIndex> = HashSet::new();
    for w in path.windows(2) {
        let steps = (w[0].distance(&w[1]) / (grid.resolution() * 0.25)).ceil().max(1.0) as usize;
        for i in 0..=steps {
            if let Some(idx) = grid.world_to_grid(w[0].lerp(&w[1], i as f64 / steps as f64)) {
                path_cells.insert(idx);
            }
        }
    }
    let start_cell = grid.world_to_grid(start);
    let goal_cell = grid.world_to_grid(goal);

    println!("\nMap with path:");
    for row in (0..grid.rows()).rev() {
        for col in 0..grid.cols() {
            let idx = GridIndex::new(row, col);
            if Some(idx) == start_cell {
                print!("S");
            } else if Some(idx) == goal_cell {
                print!("G");
            } else if path_cells.contains(&idx) {
                print!("*");
            } else if grid.is_occupied(idx) {
                print!("#");
            } else {
                print!(".");
            }
        }
        println!();
    }
}

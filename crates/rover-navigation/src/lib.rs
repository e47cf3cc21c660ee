#![doc = "Occupancy-grid navigation for a differential-drive robot."]
#![doc = ""]
#![doc = "The crate builds occupancy grids from wall geometry and range scans, answers"]
#![doc = "point and segment collision queries, plans collision-free paths with a"]
#![doc = "rapidly-exploring random tree and follows them with a proportional controller."]

pub mod collision;
pub mod controller;
pub mod error;
pub mod geometry;
pub mod map;
pub mod navigator;
pub mod rrt;

pub use collision::CollisionChecker;
pub use controller::{ControlOutput, ControllerConfig, FollowStatus, IdleBehavior, PathFollower};
pub use error::NavigationError;
pub use geometry::{GridIndex, Pose, Twist, WorldPoint, normalize_angle};
pub use map::{LaserScan, MapBounds, OccupancyGrid, WallRect, accumulate_scan, rasterize_polygons};
pub use navigator::{
    DEFAULT_ESCAPE_RADIUS, Navigator, NavigatorConfig, NavigatorOutput, NavigatorState, NavigatorStats,
};
pub use rrt::{PlanResult, RrtConfig, RrtPlanner, StepPolicy, TreeNode};

//! Goal-directed navigation loop tying the planner to the path follower.

use crate::collision::CollisionChecker;
use crate::controller::{ControllerConfig, FollowStatus, PathFollower};
use crate::error::NavigationError;
use crate::geometry::{Pose, Twist, WorldPoint};
use crate::map::OccupancyGrid;
use crate::rrt::{RrtConfig, RrtPlanner};

use std::fmt;
use tracing::{debug, info, warn};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Parameters of a navigation run.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NavigatorConfig {
    /// Goal position in world coordinates.
    pub goal: WorldPoint,
    /// Planner parameters.
    pub rrt: RrtConfig,
    /// Follower gains and limits.
    pub controller: ControllerConfig,
    /// Ticks to wait before the first plan, e.g. to let a scan sweep fill the map.
    #[cfg_attr(feature = "serde", serde(default))]
    pub planning_delay_ticks: u64,
    /// How far to look for a free cell to plan from when the robot stands
    /// inside an obstacle or its inflation margin (m).
    #[cfg_attr(feature = "serde", serde(default = "default_escape_radius"))]
    pub escape_radius: f64,
}

/// Default search distance for a free planning start (m).
pub const DEFAULT_ESCAPE_RADIUS: f64 = 1.0;

#[cfg(feature = "serde")]
fn default_escape_radius() -> f64 {
    DEFAULT_ESCAPE_RADIUS
}

/// High-level state reported after each tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavigatorState {
    /// No path is active. Either waiting for the planning delay or the last
    /// plan failed.
    Idle,
    /// Tracking the waypoint at `index`.
    Following {
        /// Index of the current target waypoint.
        index: usize,
    },
    /// The active path was blocked and discarded on this tick.
    Replanning,
    /// The goal was reached. The navigator holds still from here on.
    GoalReached,
}

impl fmt::Display for NavigatorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NavigatorState::Idle => write!(f, "idle"),
            NavigatorState::Following { index } => write!(f, "following waypoint {}", index),
            NavigatorState::Replanning => write!(f, "replanning"),
            NavigatorState::GoalReached => write!(f, "goal reached"),
        }
    }
}

/// Command and state produced by one navigator tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NavigatorOutput {
    /// Velocity command for the actuation sink.
    pub twist: Twist,
    /// State after this tick.
    pub state: NavigatorState,
}

/// Planning statistics accumulated over a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NavigatorStats {
    /// Plans started.
    pub plans_attempted: u64,
    /// Plans that exhausted their iteration budget.
    pub plans_failed: u64,
    /// Paths discarded because they became blocked.
    pub replans_triggered: u64,
}

/// Drives a robot to a fixed goal, one control tick at a time.
#[derive(Debug)]
pub struct Navigator {
    goal: WorldPoint,
    planning_delay_ticks: u64,
    escape_radius: f64,
    planner: RrtPlanner,
    follower: PathFollower,
    ticks: u64,
    goal_reached: bool,
    stats: NavigatorStats,
}

impl Navigator {
    /// Builds a navigator, validating the planner and controller configuration.
    pub fn new(config: NavigatorConfig) -> Result<Self, NavigationError> {
        if !(config.escape_radius.is_finite() && config.escape_radius >= 0.0) {
            return Err(NavigationError::InvalidPlannerConfig(
                "escape_radius must be non-negative",
            ));
        }
        Ok(Self {
            goal: config.goal,
            planning_delay_ticks: config.planning_delay_ticks,
            escape_radius: config.escape_radius,
            planner: RrtPlanner::new(config.rrt)?,
            follower: PathFollower::new(config.controller)?,
            ticks: 0,
            goal_reached: false,
            stats: NavigatorStats::default(),
        })
    }

    /// The goal this navigator drives to.
    pub fn goal(&self) -> WorldPoint {
        self.goal
    }

    /// Returns true once the goal has been reached. Stays true for the rest of
    /// the run.
    pub fn is_goal_reached(&self) -> bool {
        self.goal_reached
    }

    /// Planning counters accumulated so far.
    pub fn stats(&self) -> NavigatorStats {
        self.stats
    }

    /// The path currently being followed, if any.
    pub fn path(&self) -> Option<&[WorldPoint]> {
        self.follower.path()
    }

    /// Runs one tick against the latest pose and map.
    ///
    /// The follower runs first so that a path invalidated on this tick is
    /// re-planned immediately with the same map snapshot. A failed plan leaves
    /// the robot idling and is retried on the next tick.
    pub fn tick(&mut self, pose: &Pose, grid: &OccupancyGrid) -> NavigatorOutput {
        self.ticks = self.ticks.saturating_add(1);

        if self.goal_reached {
            return NavigatorOutput {
                twist: Twist::stop(),
                state: NavigatorState::GoalReached,
            };
        }

        let checker = CollisionChecker::new(grid);
        let out = self.follower.tick(pose, &checker);
        debug!(
            tick = self.ticks,
            vx = out.twist.vx,
            wz = out.twist.wz,
            status = ?out.status,
            "Follower tick"
        );

        let state = match out.status {
            FollowStatus::GoalReached => {
                info!(x = pose.x, y = pose.y, "Goal reached");
                self.goal_reached = true;
                return NavigatorOutput {
                    twist: Twist::stop(),
                    state: NavigatorState::GoalReached,
                };
            }
            FollowStatus::Following { index } => NavigatorState::Following { index },
            FollowStatus::ReplanNeeded => {
                self.stats.replans_triggered += 1;
                NavigatorState::Replanning
            }
            FollowStatus::Idle => NavigatorState::Idle,
        };

        if !self.follower.has_path() && self.ticks > self.planning_delay_ticks {
            self.plan_from(pose, &checker);
        }

        NavigatorOutput {
            twist: out.twist,
            state,
        }
    }

    fn plan_from(&mut self, pose: &Pose, checker: &CollisionChecker<'_>) {
        self.stats.plans_attempted += 1;
        let position = pose.position();

        // Inflation can grow around the robot. Plan from the closest free cell
        // and reach it first.
        let Some(start) = checker
            .nearest_free_point(position, self.escape_radius)
            .filter(|p| checker.is_departure_free(position, *p))
        else {
            self.stats.plans_failed += 1;
            warn!(
                position = %position,
                escape_radius = self.escape_radius,
                "Robot is inside an obstacle with no free cell nearby"
            );
            return;
        };
        if start != position {
            debug!(position = %position, start = %start, "Planning from nearest free cell");
        }

        let result = self.planner.plan(start, self.goal, checker);

        match result.path {
            Some(mut path) => {
                if start != position {
                    path.insert(0, position);
                }
                info!(
                    waypoints = path.len(),
                    iterations = result.iterations,
                    tree_size = result.tree.len(),
                    "Path found"
                );
                self.follower.set_path(path);
            }
            None => {
                self.stats.plans_failed += 1;
                warn!(
                    start = %start,
                    goal = %self.goal,
                    iterations = result.iterations,
                    "No path found, retrying next tick"
                );
            }
        }
    }
}

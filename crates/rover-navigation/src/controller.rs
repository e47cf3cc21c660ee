//! Waypoint-following controller.
//!
//! Each tick the follower re-validates the remaining path against the current
//! grid, steps past waypoints that are already within reach, and produces a
//! proportional forward/turn command toward the current target. Large heading
//! errors make the robot rotate in place before translating.

use crate::collision::CollisionChecker;
use crate::error::NavigationError;
use crate::geometry::{Pose, Twist, WorldPoint, normalize_angle};

use core::f64::consts::PI;
use tracing::{debug, warn};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Command issued while no path is active.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "mode", rename_all = "snake_case"))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum IdleBehavior {
    /// Hold still.
    Stop,
    /// Rotate in place, e.g. to sweep a range sensor while waiting for a plan.
    Rotate {
        /// Turn rate (rad/s), positive is counter-clockwise.
        rate: f64,
    },
}

impl IdleBehavior {
    /// The twist commanded by this behavior.
    pub fn twist(&self) -> Twist {
        match *self {
            IdleBehavior::Stop => Twist::stop(),
            IdleBehavior::Rotate { rate } => Twist::new(0.0, rate),
        }
    }
}

/// Gains and limits of the path follower.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ControllerConfig {
    /// Proportional gain from heading error (rad) to turn rate (rad/s).
    pub kp_yaw: f64,
    /// Proportional gain from distance (m) to forward speed (m/s).
    pub kp_speed: f64,
    /// Forward speed limit (m/s).
    pub max_speed: f64,
    /// Turn rate limit (rad/s), applied symmetrically.
    pub max_turn_rate: f64,
    /// A waypoint closer than this (m) counts as reached.
    pub waypoint_radius: f64,
    /// Above this absolute heading error (rad) the robot only rotates.
    pub heading_error_threshold: f64,
    /// Command issued while no path is active.
    pub idle_behavior: IdleBehavior,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            kp_yaw: 0.5,
            kp_speed: 2.0,
            max_speed: 0.306,
            max_turn_rate: 1.57,
            waypoint_radius: 0.1,
            heading_error_threshold: 20f64.to_radians(),
            idle_behavior: IdleBehavior::Rotate { rate: 0.4 },
        }
    }
}

impl ControllerConfig {
    /// Checks that gains and limits are usable.
    pub fn validate(&self) -> Result<(), NavigationError> {
        let non_negative = |v: f64| v.is_finite() && v >= 0.0;
        if !non_negative(self.kp_yaw) || !non_negative(self.kp_speed) {
            return Err(NavigationError::InvalidControllerConfig(
                "gains must be non-negative and finite",
            ));
        }
        if !non_negative(self.max_speed) || !non_negative(self.max_turn_rate) {
            return Err(NavigationError::InvalidControllerConfig(
                "speed limits must be non-negative and finite",
            ));
        }
        if !(self.waypoint_radius.is_finite() && self.waypoint_radius > 0.0) {
            return Err(NavigationError::InvalidControllerConfig(
                "waypoint radius must be positive",
            ));
        }
        if !(self.heading_error_threshold > 0.0 && self.heading_error_threshold <= PI) {
            return Err(NavigationError::InvalidControllerConfig(
                "heading error threshold must be in (0, PI]",
            ));
        }
        if let IdleBehavior::Rotate { rate } = self.idle_behavior {
            if !rate.is_finite() {
                return Err(NavigationError::InvalidControllerConfig(
                    "idle rotation rate must be finite",
                ));
            }
        }
        Ok(())
    }
}

/// What the follower did on a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FollowStatus {
    /// No path is active; the idle command was issued.
    Idle,
    /// Tracking the waypoint at `index`.
    Following {
        /// Index of the current target waypoint.
        index: usize,
    },
    /// The last waypoint was reached on this tick and the path was released.
    GoalReached,
    /// The remaining path became blocked on this tick and was discarded.
    ReplanNeeded,
}

/// Command and status produced by one follower tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ControlOutput {
    /// Velocity command for the actuation sink.
    pub twist: Twist,
    /// What happened on this tick.
    pub status: FollowStatus,
}

/// Follows a waypoint path one control tick at a time.
#[derive(Debug, Clone)]
pub struct PathFollower {
    config: ControllerConfig,
    path: Option<Vec<WorldPoint>>,
    index: usize,
}

impl PathFollower {
    /// Creates a follower with no active path.
    pub fn new(config: ControllerConfig) -> Result<Self, NavigationError> {
        config.validate()?;
        Ok(Self {
            config,
            path: None,
            index: 0,
        })
    }

    /// The follower configuration.
    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    /// Installs a new path.
    ///
    /// The first waypoint of a planned path is the robot's own start position,
    /// so tracking begins at index 1 whenever there is more than one point. An
    /// empty path clears the follower.
    pub fn set_path(&mut self, path: Vec<WorldPoint>) {
        if path.is_empty() {
            self.clear_path();
            return;
        }
        self.index = if path.len() > 1 { 1 } else { 0 };
        self.path = Some(path);
    }

    /// Drops the active path and resets the waypoint index.
    pub fn clear_path(&mut self) {
        self.path = None;
        self.index = 0;
    }

    /// Returns true while a path is active.
    pub fn has_path(&self) -> bool {
        self.path.is_some()
    }

    /// The active path, if any.
    pub fn path(&self) -> Option<&[WorldPoint]> {
        self.path.as_deref()
    }

    /// Index of the current target waypoint.
    pub fn waypoint_index(&self) -> usize {
        self.index
    }

    /// The current target waypoint, if a path is active.
    pub fn current_target(&self) -> Option<WorldPoint> {
        self.path.as_ref().and_then(|p| p.get(self.index).copied())
    }

    /// Returns true if the segment from `position` to the current target, or any
    /// remaining path segment after it, is blocked.
    ///
    /// Occupied samples at the very start of the first segment are ignored: a
    /// robot standing inside an inflation margin may still drive out of it.
    pub fn is_path_blocked(&self, position: WorldPoint, checker: &CollisionChecker<'_>) -> bool {
        let Some(path) = self.path.as_deref() else {
            return false;
        };
        let Some(target) = path.get(self.index) else {
            return false;
        };
        !checker.is_departure_free(position, *target) || !checker.is_path_free(&path[self.index..])
    }

    /// Runs one control tick.
    pub fn tick(&mut self, pose: &Pose, checker: &CollisionChecker<'_>) -> ControlOutput {
        if self.is_path_blocked(pose.position(), checker) {
            warn!(
                waypoint_index = self.index,
                x = pose.x,
                y = pose.y,
                "Path blocked by new obstacle, discarding"
            );
            self.clear_path();
            return ControlOutput {
                twist: Twist::stop(),
                status: FollowStatus::ReplanNeeded,
            };
        }

        let Some(path) = self.path.as_deref() else {
            return ControlOutput {
                twist: self.config.idle_behavior.twist(),
                status: FollowStatus::Idle,
            };
        };

        while let Some(target) = path.get(self.index) {
            let dx = target.x - pose.x;
            let dy = target.y - pose.y;
            let distance = dx.hypot(dy);

            if distance < self.config.waypoint_radius {
                self.index += 1;
                debug!(waypoint_index = self.index, "Waypoint reached");
                continue;
            }

            let heading_error = normalize_angle(dy.atan2(dx) - pose.theta);
            return ControlOutput {
                twist: self.track(distance, heading_error),
                status: FollowStatus::Following { index: self.index },
            };
        }

        self.clear_path();
        ControlOutput {
            twist: Twist::stop(),
            status: FollowStatus::GoalReached,
        }
    }

    /// Proportional command toward a target `distance` away at `heading_error`.
    fn track(&self, distance: f64, heading_error: f64) -> Twist {
        let c = &self.config;
        let wz = (c.kp_yaw * heading_error).clamp(-c.max_turn_rate, c.max_turn_rate);

        // Rotate in place before translating on sharp turns
        let vx = if heading_error.abs() > c.heading_error_threshold {
            0.0
        } else {
            (c.kp_speed * distance).clamp(0.0, c.max_speed)
        };

        Twist { vx, wz }
    }
}

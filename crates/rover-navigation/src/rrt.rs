//! Rapidly-exploring random tree (RRT) planner.
//!
//! The planner grows a tree of collision-free straight segments from the start
//! position by repeatedly sampling a random point in the map bounds, extending the
//! nearest tree node toward it, and connecting to the goal as soon as a new node
//! lands within one step of it with a clear line of sight.
//!
//! This is a feasibility planner: the returned path is collision-free but not
//! shortest, and sampling is purely uniform (no goal bias).

use crate::collision::CollisionChecker;
use crate::error::NavigationError;
use crate::geometry::WorldPoint;
use crate::map::MapBounds;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::fmt;
use tracing::debug;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// How far a new node is placed from its nearest tree node.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StepPolicy {
    /// Always step the full expand distance toward the sample, even when that
    /// passes beyond the sample itself.
    #[default]
    Fixed,
    /// Step `min(expand_distance, distance_to_sample)`, so a close sample becomes
    /// the new node exactly.
    ClampToSample,
}

/// Planner parameters. Immutable for the duration of a `plan` call.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RrtConfig {
    /// Step length used to grow the tree (m).
    pub expand_distance: f64,
    /// Upper bound on sampling iterations per plan.
    pub max_iterations: usize,
    /// Rectangle that random samples are drawn from.
    pub bounds: MapBounds,
    /// Step length policy.
    #[cfg_attr(feature = "serde", serde(default))]
    pub step_policy: StepPolicy,
    /// Fixed RNG seed for reproducible plans. `None` seeds from the OS.
    #[cfg_attr(feature = "serde", serde(default))]
    pub seed: Option<u64>,
}

impl RrtConfig {
    /// Default step of 0.5 m and 500 iterations over `bounds`.
    pub fn new(bounds: MapBounds) -> Self {
        Self {
            expand_distance: 0.5,
            max_iterations: 500,
            bounds,
            step_policy: StepPolicy::Fixed,
            seed: None,
        }
    }

    /// Checks that the parameters describe a runnable search.
    pub fn validate(&self) -> Result<(), NavigationError> {
        if !(self.expand_distance.is_finite() && self.expand_distance > 0.0) {
            return Err(NavigationError::InvalidPlannerConfig(
                "expand distance must be positive and finite",
            ));
        }
        if self.max_iterations == 0 {
            return Err(NavigationError::InvalidPlannerConfig(
                "max iterations must be non-zero",
            ));
        }
        if !self.bounds.is_valid() {
            return Err(NavigationError::InvalidPlannerConfig(
                "sampling bounds must be finite and ordered",
            ));
        }
        Ok(())
    }
}

/// A node of the search tree. `parent` indexes into the same tree; only the root has none.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TreeNode {
    /// Node position in world coordinates.
    pub point: WorldPoint,
    /// Index of the parent node.
    pub parent: Option<usize>,
}

/// Outcome of a planning call with search metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct PlanResult {
    /// Start-to-goal waypoints, or `None` when no path was found within the budget.
    pub path: Option<Vec<WorldPoint>>,
    /// Number of sampling iterations consumed.
    pub iterations: usize,
    /// The search tree as grown, root first.
    pub tree: Vec<TreeNode>,
}

impl PlanResult {
    fn success(path: Vec<WorldPoint>, iterations: usize, tree: Vec<TreeNode>) -> Self {
        Self {
            path: Some(path),
            iterations,
            tree,
        }
    }

    fn failure(iterations: usize, tree: Vec<TreeNode>) -> Self {
        Self {
            path: None,
            iterations,
            tree,
        }
    }

    /// Returns true if a path was found.
    pub fn is_success(&self) -> bool {
        self.path.is_some()
    }

    /// Returns the path if one was found.
    pub fn into_path(self) -> Option<Vec<WorldPoint>> {
        self.path
    }
}

impl fmt::Display for PlanResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.path {
            Some(path) => write!(
                f,
                "PlanResult {{ success: true, waypoints: {}, iterations: {}, tree_size: {} }}",
                path.len(),
                self.iterations,
                self.tree.len()
            ),
            None => write!(
                f,
                "PlanResult {{ success: false, iterations: {}, tree_size: {} }}",
                self.iterations,
                self.tree.len()
            ),
        }
    }
}

/// RRT planner holding its configuration and random number generator.
#[derive(Debug, Clone)]
pub struct RrtPlanner {
    config: RrtConfig,
    rng: StdRng,
}

impl RrtPlanner {
    /// Creates a planner. The RNG is seeded from `config.seed` when present.
    pub fn new(config: RrtConfig) -> Result<Self, NavigationError> {
        config.validate()?;
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Ok(Self { config, rng })
    }

    /// The planner configuration.
    pub fn config(&self) -> &RrtConfig {
        &self.config
    }

    /// Plans from `start` to `goal` using the planner's own RNG.
    pub fn plan(
        &mut self,
        start: WorldPoint,
        goal: WorldPoint,
        checker: &CollisionChecker<'_>,
    ) -> PlanResult {
        grow(&self.config, start, goal, checker, &mut self.rng)
    }

    /// Plans from `start` to `goal` drawing samples from `rng`.
    pub fn plan_with_rng<R: Rng + ?Sized>(
        &self,
        start: WorldPoint,
        goal: WorldPoint,
        checker: &CollisionChecker<'_>,
        rng: &mut R,
    ) -> PlanResult {
        grow(&self.config, start, goal, checker, rng)
    }
}

/// Index of the node closest to `target`. Ties go to the earliest node.
fn nearest_node(tree: &[TreeNode], target: &WorldPoint) -> usize {
    let mut best = 0;
    let mut best_dist_sq = f64::INFINITY;
    for (i, node) in tree.iter().enumerate() {
        let dx = node.point.x - target.x;
        let dy = node.point.y - target.y;
        let d = dx * dx + dy * dy;
        if d < best_dist_sq {
            best = i;
            best_dist_sq = d;
        }
    }
    best
}

/// Walks parent links from `leaf` to the root and returns root-to-leaf points.
fn extract_path(tree: &[TreeNode], leaf: usize) -> Vec<WorldPoint> {
    let mut path = Vec::new();
    let mut current = Some(leaf);
    while let Some(i) = current {
        path.push(tree[i].point);
        current = tree[i].parent;
    }
    path.reverse();
    path
}

fn grow<R: Rng + ?Sized>(
    config: &RrtConfig,
    start: WorldPoint,
    goal: WorldPoint,
    checker: &CollisionChecker<'_>,
    rng: &mut R,
) -> PlanResult {
    let mut tree = vec![TreeNode {
        point: start,
        parent: None,
    }];

    if !start.is_finite() || !goal.is_finite() {
        return PlanResult::failure(0, tree);
    }

    let bounds = &config.bounds;
    let step = config.expand_distance;

    for iteration in 1..=config.max_iterations {
        let sample = WorldPoint::new(
            rng.random_range(bounds.x_min..=bounds.x_max),
            rng.random_range(bounds.y_min..=bounds.y_max),
        );

        let nearest_idx = nearest_node(&tree, &sample);
        let nearest = tree[nearest_idx].point;
        let dist = nearest.distance(&sample);
        if dist == 0.0 {
            // No direction to extend in
            continue;
        }

        let step_len = match config.step_policy {
            StepPolicy::Fixed => step,
            StepPolicy::ClampToSample => step.min(dist),
        };
        let candidate = nearest.lerp(&sample, step_len / dist);

        if !checker.is_segment_free(nearest, candidate) {
            continue;
        }
        tree.push(TreeNode {
            point: candidate,
            parent: Some(nearest_idx),
        });
        let new_idx = tree.len() - 1;

        if candidate.distance(&goal) <= step && checker.is_segment_free(candidate, goal) {
            tree.push(TreeNode {
                point: goal,
                parent: Some(new_idx),
            });
            let path = extract_path(&tree, tree.len() - 1);
            debug!(
                iterations = iteration,
                tree_size = tree.len(),
                waypoints = path.len(),
                "RRT reached goal"
            );
            return PlanResult::success(path, iteration, tree);
        }
    }

    debug!(
        iterations = config.max_iterations,
        tree_size = tree.len(),
        "RRT exhausted iteration budget"
    );
    PlanResult::failure(config.max_iterations, tree)
}

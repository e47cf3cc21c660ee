use std::sync::Arc;
use std::time::Duration;

use rover_navigation::{
    Navigator, NavigatorState, NavigatorStats, OccupancyGrid, Pose, Twist, accumulate_scan,
};
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::time;
use tracing::{debug, info, warn};

use crate::blackboard::{Blackboard, State, snapshot};
use crate::bus::Topic;
use crate::sim::ScanFrame;
use crate::world::inflated;

/// How a navigation run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    GoalReached,
    TickBudgetExhausted,
    Interrupted,
}

#[derive(Debug, Clone, Copy)]
pub struct NavReport {
    pub outcome: Outcome,
    pub ticks: u64,
    pub stats: NavigatorStats,
}

impl NavReport {
    /// Report for a run cut short, built from the last state the task published.
    pub fn interrupted(state: &State) -> Self {
        NavReport {
            outcome: Outcome::Interrupted,
            ticks: state.nav_ticks,
            stats: state.nav_stats,
        }
    }
}

/// Map state owned by the navigation task.
///
/// Scan hits accumulate into `raw`; the inflated planning grid is rebuilt
/// lazily after new obstacles arrive.
pub struct NavMap {
    raw: OccupancyGrid,
    planning: OccupancyGrid,
    robot_radius: f64,
    dirty: bool,
}

impl NavMap {
    pub fn new(raw: OccupancyGrid, robot_radius: f64) -> anyhow::Result<Self> {
        let planning = inflated(&raw, robot_radius)?;
        Ok(Self {
            raw,
            planning,
            robot_radius,
            dirty: false,
        })
    }

    /// Adds scan hits. Returns the number of newly occupied cells.
    pub fn add_scan(&mut self, frame: &ScanFrame) -> usize {
        let before = self.raw.occupied_count();
        accumulate_scan(&mut self.raw, &frame.pose, &frame.scan);
        let added = self.raw.occupied_count() - before;
        if added > 0 {
            self.dirty = true;
        }
        added
    }

    /// The inflated grid, rebuilt if scans added obstacles since the last call.
    pub fn planning_grid(&mut self) -> anyhow::Result<&OccupancyGrid> {
        if self.dirty {
            self.planning = inflated(&self.raw, self.robot_radius)?;
            self.dirty = false;
        }
        Ok(&self.planning)
    }
}

/// Periodic navigation loop. Runs until the goal is reached or `max_ticks`
/// ticks have elapsed.
pub struct NavTask {
    pub navigator: Navigator,
    pub map: NavMap,
    pub period: Duration,
    pub max_ticks: u64,
}

impl NavTask {
    pub async fn run(
        self,
        bb: Blackboard,
        mut pose_rx: broadcast::Receiver<Arc<Pose>>,
        mut scan_rx: broadcast::Receiver<Arc<ScanFrame>>,
        twist_tx: Topic<Twist>,
    ) -> anyhow::Result<NavReport> {
        let NavTask {
            mut navigator,
            mut map,
            period,
            max_ticks,
        } = self;
        info!(goal = %navigator.goal(), ?period, "Navigation task started.");
        let mut ticker = time::interval(period);
        ticker.set_missed_tick_behavior(time::MissedTickBehavior::Skip);
        let mut pose = snapshot(&bb).pose;
        let mut ticks: u64 = 0;

        let outcome = loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if ticks >= max_ticks {
                        warn!(ticks, "Tick budget exhausted before reaching the goal");
                        break Outcome::TickBudgetExhausted;
                    }
                    ticks += 1;

                    let grid = map.planning_grid()?;
                    let out = navigator.tick(&pose, grid);
                    debug!(
                        x = pose.x,
                        y = pose.y,
                        vx = out.twist.vx,
                        wz = out.twist.wz,
                        state = %out.state,
                        "Navigation tick"
                    );
                    twist_tx.publish(out.twist);
                    {
                        let mut g = bb.write();
                        g.nav_state = out.state;
                        g.nav_ticks = ticks;
                        g.nav_stats = navigator.stats();
                    }

                    if out.state == NavigatorState::GoalReached {
                        break Outcome::GoalReached;
                    }
                }
                res = pose_rx.recv() => match res {
                    Ok(p) => pose = *p,
                    Err(RecvError::Lagged(n)) => debug!(skipped = n, "Pose subscriber lagged"),
                    Err(RecvError::Closed) => anyhow::bail!("pose topic closed"),
                },
                res = scan_rx.recv() => match res {
                    Ok(frame) => {
                        let added = map.add_scan(&frame);
                        if added > 0 {
                            debug!(added, "Scan added obstacles");
                        }
                    }
                    Err(RecvError::Lagged(n)) => debug!(skipped = n, "Scan subscriber lagged"),
                    Err(RecvError::Closed) => anyhow::bail!("scan topic closed"),
                },
            }
        };

        twist_tx.publish(Twist::stop());
        Ok(NavReport {
            outcome,
            ticks,
            stats: navigator.stats(),
        })
    }
}

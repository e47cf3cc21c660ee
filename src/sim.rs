use parking_lot::RwLock;
use rover_navigation::{LaserScan, OccupancyGrid, Pose, Twist, WorldPoint, normalize_angle};
use spin_sleep::SpinSleeper;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{debug, info};

use crate::blackboard::{Blackboard, touch_cmd};
use crate::bus::Topic;
use crate::settings::LidarSettings;

/// A lidar scan together with the pose it was taken from.
#[derive(Debug, Clone)]
pub struct ScanFrame {
    pub pose: Pose,
    pub scan: LaserScan,
}

/// Unicycle model step: forward along the heading, then turn.
pub fn integrate(pose: &Pose, twist: &Twist, dt: f64) -> Pose {
    let (s, c) = pose.theta.sin_cos();
    Pose::new(
        pose.x + twist.vx * c * dt,
        pose.y + twist.vx * s * dt,
        normalize_angle(pose.theta + twist.wz * dt),
    )
}

/// Ray-marches each beam through `truth` at half-cell steps. Beams that leave
/// the map or reach `max_range` report `max_range` (no hit).
pub fn cast_scan(truth: &OccupancyGrid, pose: &Pose, lidar: &LidarSettings) -> LaserScan {
    let half_fov = lidar.fov_deg.to_radians() / 2.0;
    let mut scan = LaserScan {
        ranges: vec![lidar.max_range; lidar.beams],
        angle_min: -half_fov,
        angle_max: half_fov,
        max_range: lidar.max_range,
    };
    let step = truth.resolution() * 0.5;

    for i in 0..scan.ranges.len() {
        let (s, c) = (pose.theta + scan.beam_angle(i)).sin_cos();
        let mut r = step;
        while r < lidar.max_range {
            let p = WorldPoint::new(pose.x + r * c, pose.y + r * s);
            match truth.world_to_grid(p) {
                Some(idx) if truth.is_occupied(idx) => {
                    scan.ranges[i] = r;
                    break;
                }
                Some(_) => r += step,
                None => break,
            }
        }
    }
    scan
}

pub struct PhysicsThread {
    pub start: Pose,
    pub dt: f64,
    pub truth: OccupancyGrid,
    pub lidar: LidarSettings,
}

impl PhysicsThread {
    /// Spawns the physics loop: integrates the last applied command, publishes
    /// the pose every step and a lidar frame every `lidar.every_steps` steps.
    pub fn spawn(
        self,
        bb: Blackboard,
        applied: Arc<RwLock<Twist>>,
        pose_topic: Topic<Pose>,
        scan_topic: Topic<ScanFrame>,
        shutdown: Arc<AtomicBool>,
    ) -> std::io::Result<JoinHandle<()>> {
        std::thread::Builder::new()
            .name("physics".into())
            .spawn(move || {
                info!("Physics thread started.");
                let sleeper = SpinSleeper::new(10_000);
                let period = Duration::from_secs_f64(self.dt);
                let mut pose = self.start;
                let mut step: u64 = 0;

                while !shutdown.load(Ordering::Relaxed) {
                    let twist = *applied.read();
                    pose = integrate(&pose, &twist, self.dt);
                    pose_topic.publish(pose);
                    bb.write().pose = pose;

                    if self.lidar.enabled && step % u64::from(self.lidar.every_steps) == 0 {
                        let scan = cast_scan(&self.truth, &pose, &self.lidar);
                        scan_topic.publish(ScanFrame { pose, scan });
                    }

                    step += 1;
                    sleeper.sleep(period);
                }
                debug!(steps = step, "Physics thread stopped.");
            })
    }
}

/// Spawns the control thread: applies twists from the command topic and
/// refreshes the command timestamp the watchdog monitors.
pub fn spawn_control(
    bb: Blackboard,
    applied: Arc<RwLock<Twist>>,
    twist_topic: &Topic<Twist>,
    shutdown: Arc<AtomicBool>,
) -> std::io::Result<JoinHandle<()>> {
    let mut twist_rx = twist_topic.subscribe();
    std::thread::Builder::new()
        .name("control".into())
        .spawn(move || {
            info!("Control thread started.");
            let sleeper = SpinSleeper::new(1_000);
            while !shutdown.load(Ordering::Relaxed) {
                while let Ok(twist) = twist_rx.try_recv() {
                    *applied.write() = *twist;
                    touch_cmd(&bb, *twist);
                }
                sleeper.sleep(Duration::from_micros(1_000));
            }
            // Leave the robot stopped
            *applied.write() = Twist::stop();
            debug!("Control thread stopped.");
        })
}

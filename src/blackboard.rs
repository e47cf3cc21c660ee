use parking_lot::RwLock;
use rover_navigation::{NavigatorState, NavigatorStats, Pose, Twist};
use std::{sync::Arc, time::Instant};

/// Shared run state, written by the simulator and navigation tasks and read by
/// the watchdog and the final report.
#[derive(Clone, Debug)]
pub struct State {
    pub pose: Pose,
    /// Last command applied by the control thread.
    pub twist: Twist,
    pub nav_state: NavigatorState,
    pub nav_ticks: u64,
    pub nav_stats: NavigatorStats,
    pub last_cmd_ts: Instant,
    pub faults: Vec<String>,
}

impl State {
    pub fn new(pose: Pose) -> Self {
        State {
            pose,
            twist: Twist::stop(),
            nav_state: NavigatorState::Idle,
            nav_ticks: 0,
            nav_stats: NavigatorStats::default(),
            last_cmd_ts: Instant::now(),
            faults: Vec::new(),
        }
    }
}

pub type Blackboard = Arc<RwLock<State>>;

pub fn new_blackboard(pose: Pose) -> Blackboard {
    Arc::new(RwLock::new(State::new(pose)))
}

pub fn snapshot(bb: &Blackboard) -> State {
    bb.read().clone()
}

pub fn touch_cmd(bb: &Blackboard, twist: Twist) {
    let mut g = bb.write();
    g.twist = twist;
    g.last_cmd_ts = Instant::now();
}

/// Records a fault once. Returns true if it was not already raised.
pub fn raise_fault(bb: &Blackboard, msg: &str) -> bool {
    let mut g = bb.write();
    if g.faults.iter().any(|s| s == msg) {
        return false;
    }
    g.faults.push(msg.to_string());
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raise_fault_deduplicates() {
        let bb = new_blackboard(Pose::default());
        assert!(raise_fault(&bb, "cmd_vel timeout"));
        assert!(!raise_fault(&bb, "cmd_vel timeout"));
        assert!(raise_fault(&bb, "other"));
        assert_eq!(snapshot(&bb).faults.len(), 2);
    }

    #[test]
    fn test_touch_cmd_records_twist() {
        let bb = new_blackboard(Pose::default());
        let before = snapshot(&bb).last_cmd_ts;
        touch_cmd(&bb, Twist::new(0.1, 0.2));
        let s = snapshot(&bb);
        assert_eq!(s.twist, Twist::new(0.1, 0.2));
        assert!(s.last_cmd_ts >= before);
    }
}

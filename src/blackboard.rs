use occupy_map::Odometry;
use parking_lot::RwLock;
use std::{sync::Arc, time::Instant};

#[derive(Clone)]
pub struct State {
    pub pose: Odometry,
    pub last_scan_ts: Instant,
    pub scans_sent: u64,
    pub safe: bool,
    pub faults: Vec<String>,
}

impl Default for State {
    fn default() -> Self {
        State {
            pose: Odometry::default(),
            last_scan_ts: Instant::now(),
            scans_sent: 0,
            safe: true,
            faults: Vec::new(),
        }
    }
}

pub type Blackboard = Arc<RwLock<State>>;

pub fn snapshot(bb: &Blackboard) -> State {
    (*bb.read()).clone()
}

pub fn set_pose(bb: &Blackboard, pose: Odometry) {
    bb.write().pose = pose;
}

/// Heartbeat for a scan handed to the map; pose-only ticks do not count.
pub fn record_scan(bb: &Blackboard) {
    let mut g = bb.write();
    g.last_scan_ts = Instant::now();
    g.scans_sent += 1;
}

pub fn raise_fault(bb: &Blackboard, msg: &str) {
    let mut g = bb.write();
    if !g.faults.iter().any(|s| s == msg) {
        g.faults.push(msg.to_string());
    }
}

pub fn clear_fault(bb: &Blackboard, msg: &str) {
    bb.write().faults.retain(|s| s != msg);
}

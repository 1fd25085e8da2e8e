use std::sync::Arc;
use std::time::{Duration, Instant};

use occupy_map::{CloudSnapshot, Position, SharedMap};
use tokio::sync::broadcast;
use tokio::time;

use crate::blackboard::{Blackboard, clear_fault, raise_fault, snapshot};

pub const UNSAFE_FAULT: &str = "unsafe position";
pub const SCAN_TIMEOUT_FAULT: &str = "scan timeout";

/// Outcome of one monitor tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Verdict {
    pub safe: bool,
    pub scan_stale: bool,
}

/// Checks the latest vehicle pose against the map and, when a `scan_timeout`
/// is given, the scan heartbeat against it, recording faults on the blackboard.
pub fn evaluate(
    map: &SharedMap,
    bb: &Blackboard,
    check_distance: f64,
    scan_timeout: Option<Duration>,
) -> Verdict {
    let state = snapshot(bb);
    let safe = {
        let guard = map.read();
        let height = guard.config().vehicle_height;
        let query = Position::new(state.pose.position.x, state.pose.position.y, height);
        guard.check_safety(&query, check_distance)
    };

    if safe {
        clear_fault(bb, UNSAFE_FAULT);
    } else {
        raise_fault(bb, UNSAFE_FAULT);
    }
    bb.write().safe = safe;

    let scan_stale = scan_timeout
        .is_some_and(|timeout| Instant::now() - state.last_scan_ts > timeout);
    if scan_stale {
        raise_fault(bb, SCAN_TIMEOUT_FAULT);
    } else {
        clear_fault(bb, SCAN_TIMEOUT_FAULT);
    }

    Verdict { safe, scan_stale }
}

/// Periodic safety check of the vehicle position, plus a log of each published snapshot.
pub async fn safety_task(
    map: SharedMap,
    bb: Blackboard,
    mut snapshot_rx: broadcast::Receiver<Arc<CloudSnapshot>>,
    check_distance: f64,
    period: Duration,
    scan_timeout: Option<Duration>,
) -> anyhow::Result<()> {
    tracing::info!(?period, check_distance, "Safety monitor started.");
    let mut ticker = time::interval(period);
    let mut was_safe = true;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let verdict = evaluate(&map, &bb, check_distance, scan_timeout);
                if !verdict.safe && was_safe {
                    let pose = snapshot(&bb).pose;
                    tracing::warn!(%pose, check_distance, "Vehicle neighborhood is unsafe");
                } else if verdict.safe && !was_safe {
                    tracing::info!("Vehicle neighborhood is safe again");
                }
                if verdict.scan_stale {
                    let scans_sent = snapshot(&bb).scans_sent;
                    tracing::warn!(?scan_timeout, scans_sent, "No scan received within timeout");
                }
                was_safe = verdict.safe;
            }
            received = snapshot_rx.recv() => {
                match received {
                    Ok(cloud) => {
                        tracing::debug!(
                            frame = cloud.frame_id,
                            pass = cloud.pass,
                            raw = cloud.raw.len(),
                            inflated = cloud.inflated.len(),
                            "Cloud snapshot published"
                        );
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "Safety monitor lagged behind cloud snapshots");
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        tracing::error!("Cloud snapshot topic closed. Safety monitor cannot continue.");
                        return Err(anyhow::anyhow!("Cloud snapshot topic closed for safety monitor"));
                    }
                }
            }
        }
    }
}

//! Async plumbing around a shared [`OccupyMap`].
//!
//! Scan updates go through a depth-1 mailbox: an update that has not been
//! consumed yet is replaced by a newer one, since every pass rederives the
//! grid from the latest authoritative set anyway. Each pass runs under the
//! map's write lock, so readers (safety queries, the publisher) see either the
//! previous or the next complete grid, never a partially stamped one.
//! Reading the grid without taking the read lock is not supported.

use parking_lot::RwLock;
use std::{sync::Arc, time::Duration};
use tokio::sync::{broadcast, watch};
use tokio::time;
use tracing::{debug, error, info, warn};

use crate::accumulator::MergeOutcome;
use crate::geometry::{Odometry, PointCloud};
use crate::map::{CloudSnapshot, OccupyMap};

/// Map shared between the update task and its readers.
pub type SharedMap = Arc<RwLock<OccupyMap>>;

/// Period of the cloud publisher.
pub const PUBLISH_PERIOD: Duration = Duration::from_millis(200);

/// A scan observation waiting to be merged.
#[derive(Debug, Clone, PartialEq)]
pub enum ScanUpdate {
    /// One-shot global scan in the world frame.
    Global(PointCloud),
    /// Local scan already expressed in the world frame.
    World(PointCloud),
    /// Local scan in the vehicle frame with its pose sample.
    Local {
        /// Points in the vehicle frame.
        scan: PointCloud,
        /// Vehicle pose when the scan was taken.
        odom: Odometry,
    },
}

/// Wraps a map for sharing across tasks.
pub fn share(map: OccupyMap) -> SharedMap {
    Arc::new(RwLock::new(map))
}

/// Applies one update under the write lock.
pub fn apply_update(map: &SharedMap, update: &ScanUpdate) -> MergeOutcome {
    let mut guard = map.write();
    match update {
        ScanUpdate::Global(scan) => guard.ingest_global(scan.clone()),
        ScanUpdate::World(scan) => guard.ingest_world(scan.clone()),
        ScanUpdate::Local { scan, odom } => guard.ingest_local(scan, odom),
    }
}

/// Producer side of the depth-1 scan mailbox.
#[derive(Debug)]
pub struct ScanMailbox {
    tx: watch::Sender<Option<Arc<ScanUpdate>>>,
}

impl ScanMailbox {
    /// Creates a mailbox and the receiver the map task consumes.
    pub fn channel() -> (Self, watch::Receiver<Option<Arc<ScanUpdate>>>) {
        let (tx, rx) = watch::channel(None);
        (Self { tx }, rx)
    }

    /// Posts an update, replacing any update not yet consumed.
    pub fn submit(&self, update: ScanUpdate) {
        self.tx.send_replace(Some(Arc::new(update)));
    }

    /// Returns true once the map task has dropped its receiver.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Consumes scan updates and runs inflation passes until the mailbox closes.
///
/// # Arguments
/// * `map` - The shared map to update
/// * `updates` - Receiver side of a [`ScanMailbox`]
pub async fn run_map_task(
    map: SharedMap,
    mut updates: watch::Receiver<Option<Arc<ScanUpdate>>>,
) -> anyhow::Result<()> {
    info!("Map update task started.");

    loop {
        if updates.changed().await.is_err() {
            error!("Scan mailbox closed. Map update task cannot continue.");
            return Err(anyhow::anyhow!("Scan mailbox closed for map update task"));
        }

        let latest = updates.borrow_and_update().clone();
        let Some(update) = latest else {
            continue;
        };

        let outcome = apply_update(&map, &update);
        let guard = map.read();
        debug!(
            ?outcome,
            pass = guard.passes(),
            raw = guard.raw_cloud().len(),
            inflated = guard.inflated_cloud().len(),
            "Scan update processed"
        );
    }
}

/// Publishes a [`CloudSnapshot`] of the latest completed pass every `period`.
///
/// Snapshots are only built while someone is subscribed.
pub async fn run_publish_task(
    map: SharedMap,
    period: Duration,
    snapshot_tx: broadcast::Sender<Arc<CloudSnapshot>>,
) -> anyhow::Result<()> {
    info!(?period, "Cloud publish task started.");
    let mut ticker = time::interval(period);

    loop {
        ticker.tick().await;
        if snapshot_tx.receiver_count() == 0 {
            continue;
        }
        let snapshot = map.read().snapshot();
        if let Err(e) = snapshot_tx.send(Arc::new(snapshot)) {
            warn!("Failed to publish cloud snapshot: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MapConfig;
    use crate::geometry::Position;

    fn shared_map() -> SharedMap {
        let config = MapConfig {
            origin: [0.0, 0.0, 0.0],
            size: [20.0, 20.0, 2.0],
            resolution: 1.0,
            obstacle_inflation: 1.0,
            vehicle_height: 1.0,
            vertical_band_cells: 1,
            ..MapConfig::default()
        };
        share(OccupyMap::new(config, 1, 1).unwrap())
    }

    async fn wait_for_passes(map: &SharedMap, passes: u64) {
        for _ in 0..200 {
            if map.read().passes() >= passes {
                return;
            }
            time::sleep(Duration::from_millis(5)).await;
        }
        panic!("map never reached {} passes", passes);
    }

    #[test]
    fn test_mailbox_keeps_latest_only() {
        let (mailbox, mut rx) = ScanMailbox::channel();
        mailbox.submit(ScanUpdate::World(vec![Position::new(1.0, 1.0, 1.0)]));
        mailbox.submit(ScanUpdate::World(vec![Position::new(2.0, 2.0, 1.0)]));

        assert!(rx.has_changed().unwrap());
        let latest = rx.borrow_and_update().clone().unwrap();
        assert_eq!(*latest, ScanUpdate::World(vec![Position::new(2.0, 2.0, 1.0)]));
        assert!(!rx.has_changed().unwrap());
    }

    #[test]
    fn test_apply_update() {
        let map = shared_map();
        let outcome = apply_update(&map, &ScanUpdate::Global(vec![Position::new(10.5, 10.5, 1.5)]));
        assert_eq!(outcome, MergeOutcome::Merged);
        assert_eq!(map.read().grid().occupied_count(), 8);
    }

    #[tokio::test]
    async fn test_map_task_processes_updates() {
        let map = shared_map();
        let (mailbox, rx) = ScanMailbox::channel();
        let task = tokio::spawn(run_map_task(map.clone(), rx));

        mailbox.submit(ScanUpdate::Global(vec![Position::new(10.5, 10.5, 1.5)]));
        wait_for_passes(&map, 1).await;
        assert_eq!(map.read().grid().occupied_count(), 8);

        drop(mailbox);
        let result = task.await.unwrap();
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_publish_task_sends_snapshots() {
        let map = shared_map();
        apply_update(&map, &ScanUpdate::World(vec![Position::new(10.5, 10.5, 1.5)]));

        let (tx, mut rx) = broadcast::channel(4);
        let task = tokio::spawn(run_publish_task(map.clone(), Duration::from_millis(10), tx));

        let snapshot = rx.recv().await.unwrap();
        assert_eq!(snapshot.pass, 1);
        assert_eq!(snapshot.raw.len(), 1);
        assert_eq!(snapshot.inflated.len(), 8);
        task.abort();
    }
}

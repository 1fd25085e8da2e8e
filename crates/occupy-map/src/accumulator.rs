//! Point cloud accumulation: the authoritative point set behind every
//! inflation pass.
//!
//! Scans are either latched once (global mode), merged as world-frame scans,
//! or fused with a pose sample behind a movement gate. Merged scans are kept
//! either by unbounded concatenation or in a [`SlideWindow`] of the last `N`
//! scans, and the result is passed through a [`PointReducer`].

#![warn(missing_docs)]

use std::collections::HashMap;
use tracing::debug;

use crate::geometry::{Odometry, PointCloud, Position};

/// Minimum movement on x or y (meters) since the last fused pose for a new merge.
pub const MOVEMENT_GATE: f64 = 0.1;

/// Leaf size (meters) used when reducing world-frame scans.
pub const WORLD_FRAME_LEAF_SIZE: f64 = 0.05;

/// Leaf size (meters) used when reducing pose-fused scans.
pub const POSE_FUSED_LEAF_SIZE: f64 = 0.2;

/// Point-set reduction service.
///
/// Given a point set and a cubic leaf size, returns roughly one representative
/// point per occupied leaf cell.
pub trait PointReducer: Send + Sync {
    /// Reduces `points` to about one point per leaf of edge `leaf_size`.
    fn reduce(&self, points: &[Position], leaf_size: f64) -> PointCloud;
}

/// Voxel-grid downsampling: every occupied leaf cell is replaced by the
/// centroid of its points.
///
/// Output order follows the first point seen in each leaf. Points with a
/// non-finite coordinate are dropped. A non-positive or non-finite leaf size
/// returns the input unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct VoxelGridFilter;

impl PointReducer for VoxelGridFilter {
    fn reduce(&self, points: &[Position], leaf_size: f64) -> PointCloud {
        if points.is_empty() || !leaf_size.is_finite() || leaf_size <= 0.0 {
            return points.to_vec();
        }

        let inv_leaf = 1.0 / leaf_size;
        let mut leaves: HashMap<(i64, i64, i64), usize> = HashMap::with_capacity(points.len());
        let mut sums: Vec<(Position, usize)> = Vec::new();

        for p in points {
            if !p.iter().all(|c| c.is_finite()) {
                continue;
            }
            let key = (
                (p.x * inv_leaf).floor() as i64,
                (p.y * inv_leaf).floor() as i64,
                (p.z * inv_leaf).floor() as i64,
            );
            let slot = *leaves.entry(key).or_insert_with(|| {
                sums.push((Position::zeros(), 0));
                sums.len() - 1
            });
            sums[slot].0 += p;
            sums[slot].1 += 1;
        }

        sums.into_iter()
            .map(|(sum, count)| sum / count as f64)
            .collect()
    }
}

/// Fixed-capacity ring of the most recent scans.
///
/// Inserting into a full window replaces the oldest scan.
#[derive(Debug, Clone)]
pub struct SlideWindow {
    slots: Vec<Option<PointCloud>>,
    write: usize,
}

impl SlideWindow {
    /// Creates an empty window holding up to `capacity` scans.
    ///
    /// A capacity of zero is raised to one.
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: vec![None; capacity.max(1)],
            write: 0,
        }
    }

    /// Maximum number of scans kept.
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Number of scans currently held.
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    /// Returns true if no scan has been inserted yet.
    pub fn is_empty(&self) -> bool {
        self.slots.iter().all(Option::is_none)
    }

    /// Stores `scan` in the slot under the write pointer and advances it.
    pub fn insert(&mut self, scan: PointCloud) {
        self.slots[self.write] = Some(scan);
        self.write = (self.write + 1) % self.slots.len();
    }

    /// Concatenates every held scan, in slot order.
    pub fn concat(&self) -> PointCloud {
        let total = self.slots.iter().flatten().map(Vec::len).sum();
        let mut points = Vec::with_capacity(total);
        for scan in self.slots.iter().flatten() {
            points.extend_from_slice(scan);
        }
        points
    }
}

/// Outcome of a merge attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    /// The authoritative set was rebuilt and an inflation pass is due.
    Merged,
    /// The movement gate suppressed the merge; the authoritative set is unchanged.
    Gated,
    /// A global scan was already latched; the call had no effect.
    AlreadyLatched,
}

impl MergeOutcome {
    /// Returns true if the authoritative set changed.
    pub fn is_merged(&self) -> bool {
        matches!(self, MergeOutcome::Merged)
    }
}

/// Builds the authoritative point set from incoming scans.
pub struct PointAccumulator {
    window: Option<SlideWindow>,
    reducer: Box<dyn PointReducer>,
    points: PointCloud,
    global_latched: bool,
    last_fused: Option<Odometry>,
    skipped_last: bool,
    fresh: bool,
}

impl PointAccumulator {
    /// Creates an accumulator with the default [`VoxelGridFilter`] reducer.
    ///
    /// # Arguments
    /// * `window_capacity` - Number of scans to keep, or `None` for unbounded concatenation
    pub fn new(window_capacity: Option<usize>) -> Self {
        Self::with_reducer(window_capacity, Box::new(VoxelGridFilter))
    }

    /// Creates an accumulator with a custom reducer.
    pub fn with_reducer(window_capacity: Option<usize>, reducer: Box<dyn PointReducer>) -> Self {
        Self {
            window: window_capacity.map(SlideWindow::new),
            reducer,
            points: PointCloud::new(),
            global_latched: false,
            last_fused: None,
            skipped_last: false,
            fresh: false,
        }
    }

    /// The current authoritative point set.
    pub fn points(&self) -> &[Position] {
        &self.points
    }

    /// Whether the last merge attempt produced new data.
    pub fn is_fresh(&self) -> bool {
        self.fresh
    }

    /// Whether a global scan has been latched.
    pub fn is_global(&self) -> bool {
        self.global_latched
    }

    /// Whether a sliding window bounds the history.
    pub fn is_windowed(&self) -> bool {
        self.window.is_some()
    }

    /// Pose stored by the last successful pose-fused merge.
    pub fn last_fused_pose(&self) -> Option<&Odometry> {
        self.last_fused.as_ref()
    }

    /// Accepts the first global scan as the authoritative set and latches.
    ///
    /// Later calls are no-ops returning [`MergeOutcome::AlreadyLatched`].
    pub fn set_global(&mut self, scan: PointCloud) -> MergeOutcome {
        if self.global_latched {
            return MergeOutcome::AlreadyLatched;
        }
        self.global_latched = true;
        self.points = scan;
        self.fresh = true;
        MergeOutcome::Merged
    }

    /// Merges a scan that is already expressed in the world frame.
    ///
    /// No movement gate applies; the merged set is reduced at
    /// [`WORLD_FRAME_LEAF_SIZE`].
    pub fn merge_world(&mut self, scan: PointCloud) -> MergeOutcome {
        self.merge(scan, WORLD_FRAME_LEAF_SIZE);
        MergeOutcome::Merged
    }

    /// Fuses a vehicle-frame scan with its pose sample.
    ///
    /// The merge proceeds if the vehicle moved more than [`MOVEMENT_GATE`] on x
    /// or y since the last fused pose, if the authoritative set is empty, or if
    /// the previous attempt was gated. Otherwise the freshness flag is cleared
    /// and the set is left untouched.
    pub fn merge_with_pose(&mut self, scan: &[Position], odom: &Odometry) -> MergeOutcome {
        let last = self.last_fused.map(|o| o.position).unwrap_or_else(Position::zeros);
        let moved = (odom.position.x - last.x).abs() > MOVEMENT_GATE
            || (odom.position.y - last.y).abs() > MOVEMENT_GATE;

        if !(moved || self.points.is_empty() || self.skipped_last) {
            self.skipped_last = true;
            self.fresh = false;
            debug!(pose = %odom, "Scan merge gated, vehicle has not moved");
            return MergeOutcome::Gated;
        }

        self.skipped_last = false;
        let transformed = odom.to_world(scan);
        self.merge(transformed, POSE_FUSED_LEAF_SIZE);
        self.last_fused = Some(*odom);
        MergeOutcome::Merged
    }

    fn merge(&mut self, scan: PointCloud, leaf_size: f64) {
        let merged = match self.window.as_mut() {
            Some(window) => {
                window.insert(scan);
                window.concat()
            }
            None => {
                let mut merged = std::mem::take(&mut self.points);
                merged.extend(scan);
                merged
            }
        };
        let before = merged.len();
        self.points = self.reducer.reduce(&merged, leaf_size);
        self.fresh = true;
        debug!(
            merged = before,
            reduced = self.points.len(),
            leaf_size,
            "Rebuilt authoritative point set"
        );
    }
}

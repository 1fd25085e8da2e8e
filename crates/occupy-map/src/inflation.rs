//! Stamping the grid from the authoritative point set and peer footprints.

use std::time::{Duration, Instant};
use tracing::{debug, info};

use crate::config::GridGeometry;
use crate::geometry::{PointCloud, Position};
use crate::grid::GridStore;
use crate::stencil::StencilSet;

/// Spacing (meters) between points of the display-only border outline.
pub const BORDER_SPACING: f64 = 0.1;

/// Every this many passes the pass duration is logged at `info`.
const TIMING_LOG_INTERVAL: u64 = 50;

/// Summary of one inflation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PassStats {
    /// Whether the grid was zeroed before stamping.
    pub cleared: bool,
    /// Obstacle points that fell inside the map and were stamped.
    pub stamped_points: usize,
    /// Footprint points stamped for peer vehicles.
    pub peer_points: usize,
    /// Size of the inflated visualization cloud after the pass.
    pub inflated_points: usize,
    /// Wall time spent in the pass.
    pub elapsed: Duration,
}

/// Runs inflation passes over a [`GridStore`] and owns the per-pass
/// visualization cloud.
#[derive(Debug, Clone)]
pub struct InflationEngine {
    stencils: StencilSet,
    inflated: PointCloud,
    border: PointCloud,
    show_border: bool,
    passes: u64,
}

impl InflationEngine {
    /// Creates an engine using `stencils`. The border outline is derived from
    /// `geometry` and merged into the visualization cloud only if `show_border`.
    pub fn new(stencils: StencilSet, geometry: &GridGeometry, show_border: bool) -> Self {
        Self {
            stencils,
            inflated: PointCloud::new(),
            border: border_outline(geometry),
            show_border,
            passes: 0,
        }
    }

    /// The stencils used by this engine.
    pub fn stencils(&self) -> &StencilSet {
        &self.stencils
    }

    /// Inflated visualization cloud from the last completed pass.
    pub fn inflated_cloud(&self) -> &[Position] {
        &self.inflated
    }

    /// Display-only outline of the map's xy extent.
    pub fn border(&self) -> &[Position] {
        &self.border
    }

    /// Number of passes run so far.
    pub fn passes(&self) -> u64 {
        self.passes
    }

    /// Runs one pass.
    ///
    /// # Arguments
    /// * `grid` - Grid to stamp
    /// * `points` - Authoritative obstacle points
    /// * `peer_footprint` - Footprint cloud of the peer vehicles
    /// * `reset` - Whether to zero occupancy and cost before stamping
    ///
    /// An empty `points` set stamps nothing and keeps the previous
    /// visualization cloud, although the grid is still zeroed when `reset`.
    pub fn run(
        &mut self,
        grid: &mut GridStore,
        points: &[Position],
        peer_footprint: &[Position],
        reset: bool,
    ) -> PassStats {
        let start = Instant::now();
        if reset {
            grid.clear();
        }

        let mut stats = PassStats {
            cleared: reset,
            ..PassStats::default()
        };
        if points.is_empty() {
            stats.inflated_points = self.inflated.len();
            stats.elapsed = start.elapsed();
            return stats;
        }

        self.inflated.clear();

        for p in peer_footprint {
            grid.set_occupancy(p, 1);
        }
        stats.peer_points = peer_footprint.len();

        for p in points {
            if !grid.is_in_map(p) {
                continue;
            }
            stats.stamped_points += 1;

            for o in self.stencils.cost.offsets() {
                let mut target = p + o.offset;
                target.z = p.z;
                grid.update_cost(&target, o.weight());
            }

            for target in self.stencils.obstacle.apply(p) {
                if !grid.is_in_map(&target) {
                    continue;
                }
                self.inflated.push(target);
                grid.set_occupancy(&target, 1);
            }
        }

        self.inflated.extend_from_slice(peer_footprint);
        if self.show_border {
            self.inflated.extend_from_slice(&self.border);
        }

        self.passes += 1;
        stats.inflated_points = self.inflated.len();
        stats.elapsed = start.elapsed();

        debug!(
            pass = self.passes,
            stamped = stats.stamped_points,
            peers = stats.peer_points,
            inflated = stats.inflated_points,
            "Inflation pass complete"
        );
        if self.passes % TIMING_LOG_INTERVAL == 0 {
            info!(pass = self.passes, elapsed = ?stats.elapsed, "Inflation pass timing");
        }
        stats
    }
}

/// Points every [`BORDER_SPACING`] meters along the edges of the map's xy
/// extent, at the bottom of the vertical band.
pub fn border_outline(geometry: &GridGeometry) -> PointCloud {
    let min = geometry.min_range;
    let max = geometry.max_range;
    let steps_x = ((max.x - min.x) / BORDER_SPACING) as usize;
    let steps_y = ((max.y - min.y) / BORDER_SPACING) as usize;

    let mut border = PointCloud::with_capacity(2 * (steps_x + steps_y));
    for i in 0..steps_x {
        let x = min.x + i as f64 * BORDER_SPACING;
        border.push(Position::new(x, min.y, min.z));
        border.push(Position::new(x, max.y, min.z));
    }
    for i in 0..steps_y {
        let y = min.y + i as f64 * BORDER_SPACING;
        border.push(Position::new(min.x, y, min.z));
        border.push(Position::new(max.x, y, min.z));
    }
    border
}

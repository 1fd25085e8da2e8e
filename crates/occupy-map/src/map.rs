//! The occupancy map facade: accumulation, inflation, peers and queries.

#![warn(missing_docs)]

use tracing::{debug, info};

use crate::accumulator::{MergeOutcome, PointAccumulator, PointReducer, VoxelGridFilter};
use crate::config::MapConfig;
use crate::error::MapError;
use crate::geometry::{Odometry, PointCloud, Position, VoxelIndex};
use crate::grid::{GridStore, Lookup, Occupancy};
use crate::inflation::{InflationEngine, PassStats};
use crate::peers::{AgentPose, PeerTable};
use crate::stencil::StencilSet;

/// Frame id attached to published clouds.
pub const WORLD_FRAME: &str = "world";

/// Immutable copy of the clouds produced by the latest completed pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CloudSnapshot {
    /// Frame the points are expressed in.
    pub frame_id: &'static str,
    /// Number of passes completed when the snapshot was taken.
    pub pass: u64,
    /// The authoritative (raw, non-inflated) point set.
    pub raw: PointCloud,
    /// Inflated obstacle points, peer footprints and optional border outline.
    pub inflated: PointCloud,
}

/// A 3D occupancy map for a ground vehicle.
///
/// The grid is rederived from the authoritative point set on every accepted
/// update; in global or windowed mode it is zeroed first, otherwise stamps
/// accumulate.
pub struct OccupyMap {
    config: MapConfig,
    grid: GridStore,
    engine: InflationEngine,
    accumulator: PointAccumulator,
    peers: PeerTable,
    peer_footprint: PointCloud,
}

impl OccupyMap {
    /// Creates a map for vehicle `vehicle_id` in a fleet of `swarm_size`,
    /// reducing merged scans with [`VoxelGridFilter`].
    ///
    /// # Returns
    /// * `Result<Self, MapError>` - The map, or the configuration error
    pub fn new(config: MapConfig, vehicle_id: u32, swarm_size: u32) -> Result<Self, MapError> {
        Self::with_reducer(config, vehicle_id, swarm_size, Box::new(VoxelGridFilter))
    }

    /// Creates a map using a custom point reducer.
    pub fn with_reducer(
        config: MapConfig,
        vehicle_id: u32,
        swarm_size: u32,
        reducer: Box<dyn PointReducer>,
    ) -> Result<Self, MapError> {
        let geometry = config.geometry()?;
        let stencils = StencilSet::from_config(&config);
        info!(
            dims = ?geometry.dims.as_slice(),
            resolution = geometry.resolution,
            peer_offsets = stencils.peer.len(),
            obstacle_offsets = stencils.obstacle.len(),
            cost_offsets = stencils.cost.len(),
            window = config.window_size,
            "Occupancy map initialized"
        );

        Ok(Self {
            engine: InflationEngine::new(stencils, &geometry, config.show_border),
            grid: GridStore::new(geometry),
            accumulator: PointAccumulator::with_reducer(config.window_capacity(), reducer),
            peers: PeerTable::new(vehicle_id, swarm_size),
            peer_footprint: PointCloud::new(),
            config,
        })
    }

    /// Gets the configuration the map was built from.
    pub fn config(&self) -> &MapConfig {
        &self.config
    }

    /// Gets the underlying grid.
    pub fn grid(&self) -> &GridStore {
        &self.grid
    }

    /// Gets the precomputed stencils.
    pub fn stencils(&self) -> &StencilSet {
        self.engine.stencils()
    }

    /// Gets the peer table.
    pub fn peers(&self) -> &PeerTable {
        &self.peers
    }

    /// Ingests a one-shot global scan in the world frame.
    ///
    /// Only the first call has an effect; it latches the scan as the
    /// authoritative set and runs a pass.
    pub fn ingest_global(&mut self, scan: PointCloud) -> MergeOutcome {
        let outcome = self.accumulator.set_global(scan);
        match outcome {
            MergeOutcome::Merged => {
                info!(points = self.accumulator.points().len(), "Global point cloud latched");
                self.inflate();
            }
            _ => debug!("Global point cloud already latched, ignoring"),
        }
        outcome
    }

    /// Ingests a local scan already expressed in the world frame and runs a pass.
    pub fn ingest_world(&mut self, scan: PointCloud) -> MergeOutcome {
        let outcome = self.accumulator.merge_world(scan);
        self.inflate();
        outcome
    }

    /// Ingests a vehicle-frame scan with its pose sample.
    ///
    /// Runs a pass only if the movement gate lets the merge through.
    pub fn ingest_local(&mut self, scan: &[Position], odom: &Odometry) -> MergeOutcome {
        let outcome = self.accumulator.merge_with_pose(scan, odom);
        if outcome.is_merged() {
            self.inflate();
        }
        outcome
    }

    /// Whether the last ingestion produced a new pass.
    pub fn is_fresh(&self) -> bool {
        self.accumulator.is_fresh()
    }

    /// Records the latest report for peer `id` and rebuilds the peer footprint.
    ///
    /// The footprint is stamped by the next pass. Returns false if the report
    /// was ignored.
    pub fn update_peer(&mut self, id: u32, pose: AgentPose) -> bool {
        let accepted = self.peers.update(id, pose);
        if accepted {
            self.peer_footprint = self.peers.footprint(&self.engine.stencils().peer);
        }
        accepted
    }

    /// Records a batch of peer reports and rebuilds the footprint once.
    ///
    /// Returns the number of reports accepted.
    pub fn update_peers<I>(&mut self, reports: I) -> usize
    where
        I: IntoIterator<Item = (u32, AgentPose)>,
    {
        let accepted = reports
            .into_iter()
            .filter(|(id, pose)| self.peers.update(*id, *pose))
            .count();
        if accepted > 0 {
            self.peer_footprint = self.peers.footprint(&self.engine.stencils().peer);
        }
        accepted
    }

    /// Marks peer `id` as stale and drops it from the footprint.
    pub fn invalidate_peer(&mut self, id: u32) {
        self.peers.invalidate(id);
        self.peer_footprint = self.peers.footprint(&self.engine.stencils().peer);
    }

    /// Footprint cloud of the valid peers, stamped by the next pass.
    pub fn peer_footprint(&self) -> &[Position] {
        &self.peer_footprint
    }

    /// Runs an inflation pass over the current authoritative set.
    pub fn inflate(&mut self) -> PassStats {
        let reset = self.accumulator.is_global() || self.accumulator.is_windowed();
        self.engine.run(
            &mut self.grid,
            self.accumulator.points(),
            &self.peer_footprint,
            reset,
        )
    }

    /// The authoritative point set.
    pub fn raw_cloud(&self) -> &[Position] {
        self.accumulator.points()
    }

    /// Inflated cloud from the latest completed pass.
    pub fn inflated_cloud(&self) -> &[Position] {
        self.engine.inflated_cloud()
    }

    /// Number of passes completed.
    pub fn passes(&self) -> u64 {
        self.engine.passes()
    }

    /// Copies the clouds of the latest completed pass for publishing.
    pub fn snapshot(&self) -> CloudSnapshot {
        CloudSnapshot {
            frame_id: WORLD_FRAME,
            pass: self.engine.passes(),
            raw: self.raw_cloud().to_vec(),
            inflated: self.inflated_cloud().to_vec(),
        }
    }

    /// Gets the occupancy at a world position.
    pub fn occupancy_at(&self, pos: &Position) -> Lookup<Occupancy> {
        self.grid.occupancy_at(pos)
    }

    /// Gets the occupancy of a voxel index.
    pub fn occupancy(&self, idx: &VoxelIndex) -> Lookup<Occupancy> {
        self.grid.occupancy(idx)
    }

    /// Gets the proximity cost at a world position.
    pub fn cost_at(&self, pos: &Position) -> Lookup<f64> {
        self.grid.cost_at(pos)
    }

    /// Checks whether `pos` is safe; see [`GridStore::check_safety`].
    pub fn check_safety(&self, pos: &Position, check_distance: f64) -> bool {
        self.grid.check_safety(pos, check_distance)
    }

    /// Converts a world position into a voxel index.
    pub fn position_to_index(&self, pos: &Position) -> VoxelIndex {
        self.grid.position_to_index(pos)
    }

    /// Converts a voxel index into its center position.
    pub fn index_to_position(&self, idx: &VoxelIndex) -> Position {
        self.grid.index_to_position(idx)
    }

    /// Returns true if `pos` lies inside the mapped region.
    pub fn is_in_map(&self, pos: &Position) -> bool {
        self.grid.is_in_map(pos)
    }
}

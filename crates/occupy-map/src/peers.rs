//! Peer vehicles treated as dynamic obstacles.
//!
//! The table tracks the latest reported position of every fleet member
//! except this vehicle. [`PeerTable::footprint`] expands each valid peer
//! with the peer stencil into the cloud the inflation pass stamps.

use std::collections::BTreeMap;
use tracing::{debug, warn};

use crate::geometry::{PointCloud, Position};
use crate::stencil::Stencil;

/// Latest report from one peer vehicle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AgentPose {
    /// Peer position in the world frame.
    pub position: Position,
    /// Whether the position has been received and is current.
    pub valid: bool,
}

impl AgentPose {
    /// Creates a peer report.
    pub const fn new(position: Position, valid: bool) -> Self {
        Self { position, valid }
    }
}

/// Positions of the other vehicles in the fleet, keyed by vehicle id.
///
/// Fleet ids run from 1 to `swarm_size`. Reports for this vehicle's own id or
/// for ids outside the fleet are ignored.
#[derive(Debug, Clone)]
pub struct PeerTable {
    self_id: u32,
    swarm_size: u32,
    agents: BTreeMap<u32, AgentPose>,
}

impl PeerTable {
    /// Creates an empty table for vehicle `self_id` in a fleet of `swarm_size`.
    pub fn new(self_id: u32, swarm_size: u32) -> Self {
        Self {
            self_id,
            swarm_size,
            agents: BTreeMap::new(),
        }
    }

    /// Records the latest report for peer `id`.
    ///
    /// Returns false if the report was ignored.
    pub fn update(&mut self, id: u32, pose: AgentPose) -> bool {
        if id == self.self_id {
            return false;
        }
        if id == 0 || id > self.swarm_size {
            warn!(id, swarm_size = self.swarm_size, "Ignoring report from vehicle outside the fleet");
            return false;
        }
        self.agents.insert(id, pose);
        true
    }

    /// Marks peer `id` as no longer valid, keeping its last position.
    pub fn invalidate(&mut self, id: u32) {
        if let Some(agent) = self.agents.get_mut(&id) {
            agent.valid = false;
        }
    }

    /// Gets the latest report for peer `id`.
    pub fn get(&self, id: u32) -> Option<&AgentPose> {
        self.agents.get(&id)
    }

    /// Iterates over valid peers in id order.
    pub fn valid_peers(&self) -> impl Iterator<Item = (u32, &AgentPose)> {
        self.agents
            .iter()
            .filter(|(_, agent)| agent.valid)
            .map(|(&id, agent)| (id, agent))
    }

    /// Expands every valid peer by `stencil` into a footprint cloud.
    ///
    /// Footprint points keep the peer's height. Nothing is bounds-checked here;
    /// points outside the map are dropped when stamped.
    pub fn footprint(&self, stencil: &Stencil) -> PointCloud {
        let mut cloud = PointCloud::with_capacity(self.agents.len() * stencil.len());
        for (id, agent) in self.valid_peers() {
            cloud.extend(stencil.apply(&agent.position));
            debug!(id, x = agent.position.x, y = agent.position.y, "Peer footprint generated");
        }
        cloud
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Vector3;

    #[test]
    fn test_update_skips_self_and_outsiders() {
        let mut table = PeerTable::new(2, 3);
        let pose = AgentPose::new(Vector3::new(1.0, 1.0, 0.1), true);
        assert!(table.update(1, pose));
        assert!(!table.update(2, pose));
        assert!(!table.update(0, pose));
        assert!(!table.update(4, pose));
        assert!(table.update(3, pose));
        assert_eq!(table.valid_peers().count(), 2);
    }

    #[test]
    fn test_footprint_only_valid_peers() {
        let mut table = PeerTable::new(1, 3);
        table.update(2, AgentPose::new(Vector3::new(0.0, 0.0, 0.1), true));
        table.update(3, AgentPose::new(Vector3::new(2.0, 0.0, 0.1), false));
        let stencil = Stencil::double_ring(1, 0.2);
        let cloud = table.footprint(&stencil);
        assert_eq!(cloud.len(), stencil.len());
        assert!(cloud.iter().all(|p| p.z == 0.1 && p.x.abs() < 0.5));
    }

    #[test]
    fn test_invalidate() {
        let mut table = PeerTable::new(1, 2);
        table.update(2, AgentPose::new(Vector3::new(0.0, 0.0, 0.0), true));
        table.invalidate(2);
        assert_eq!(table.valid_peers().count(), 0);
        assert!(!table.get(2).unwrap().valid);
        assert!(table.footprint(&Stencil::square_ring(1, 0.2)).is_empty());
    }
}

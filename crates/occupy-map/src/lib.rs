#![warn(missing_docs)]
#![doc = "3D occupancy-grid mapping and obstacle inflation for ground vehicles."]
#![doc = ""]
#![doc = "Point observations are accumulated into an authoritative point set, which"]
#![doc = "is stamped into a binary occupancy grid and an obstacle-proximity cost map"]
#![doc = "with precomputed stencils. Peer vehicles are injected as dynamic obstacles,"]
#![doc = "and planners query the result through occupancy, cost and safety lookups."]

pub mod accumulator;
pub mod config;
pub mod error;
pub mod geometry;
pub mod grid;
pub mod inflation;
pub mod map;
pub mod peers;
pub mod safety;
pub mod service;
pub mod stencil;

pub use accumulator::{MergeOutcome, PointReducer, SlideWindow, VoxelGridFilter};
pub use config::{GridGeometry, MapConfig};
pub use error::MapError;
pub use geometry::{Odometry, PointCloud, Position, VoxelIndex};
pub use grid::{GridStore, Lookup, Occupancy};
pub use map::{CloudSnapshot, OccupyMap};
pub use peers::AgentPose;
pub use service::{ScanMailbox, ScanUpdate, SharedMap};

//! Geometric primitives shared by the mapping components.
//!
//! Positions are world-frame meters, voxel indices are signed so that
//! positions left of the origin map to negative (invalid) indices instead of
//! wrapping.

use nalgebra::{Rotation3, UnitQuaternion, Vector3};
use std::fmt;

/// A point in world coordinates (meters).
pub type Position = Vector3<f64>;

/// A voxel index. Valid iff every component lies in `[0, dimension)`.
pub type VoxelIndex = Vector3<i64>;

/// An unordered batch of world-frame points.
pub type PointCloud = Vec<Position>;

/// A vehicle pose sample paired with a local scan.
///
/// Only the translation and the yaw extracted from `orientation` are used when
/// fusing scans: mapping assumes a planar vehicle, so roll and pitch are ignored.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Odometry {
    /// Vehicle position in the world frame.
    pub position: Position,
    /// Vehicle orientation in the world frame.
    pub orientation: UnitQuaternion<f64>,
}

impl Odometry {
    /// Creates an odometry sample from a position and a full orientation.
    pub const fn new(position: Position, orientation: UnitQuaternion<f64>) -> Self {
        Self {
            position,
            orientation,
        }
    }

    /// Creates an odometry sample for a vehicle at `(x, y, z)` heading `yaw` radians.
    pub fn planar(x: f64, y: f64, z: f64, yaw: f64) -> Self {
        Self {
            position: Vector3::new(x, y, z),
            orientation: UnitQuaternion::from_euler_angles(0.0, 0.0, yaw),
        }
    }

    /// Heading around the world z axis, in radians.
    pub fn yaw(&self) -> f64 {
        self.orientation.euler_angles().2
    }

    /// Transforms vehicle-frame points into the world frame using translation and yaw only.
    pub fn to_world(&self, points: &[Position]) -> PointCloud {
        let rotation = Rotation3::from_axis_angle(&Vector3::z_axis(), self.yaw());
        points
            .iter()
            .map(|p| rotation * p + self.position)
            .collect()
    }
}

impl Default for Odometry {
    fn default() -> Self {
        Self {
            position: Position::zeros(),
            orientation: UnitQuaternion::identity(),
        }
    }
}

impl fmt::Display for Odometry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "(x: {:.2}, y: {:.2}, z: {:.2}, yaw: {:.2} rad)",
            self.position.x,
            self.position.y,
            self.position.z,
            self.yaw()
        )
    }
}

//! Map configuration and the grid geometry derived from it.
//!
//! [`MapConfig`] carries the user-facing parameters (meters, cells and flags).
//! [`MapConfig::geometry`] validates them and derives the immutable
//! [`GridGeometry`] every other component works from.

#![warn(missing_docs)]

use nalgebra::Vector3;
use tracing::warn;

use crate::error::MapError;

/// Tolerance applied at every map boundary by [`GridGeometry::is_in_map`].
pub const BOUNDARY_EPSILON: f64 = 1e-4;

/// Parameters of an occupancy map.
///
/// Defaults match a 10 m x 10 m x 2 m map centered on the world origin at
/// 0.2 m resolution, for a ground vehicle driving at 0.1 m height.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(default)
)]
pub struct MapConfig {
    /// World coordinates (meters) of the grid corner with the lowest x, y and z.
    pub origin: [f64; 3],
    /// Extent of the map along each axis (meters).
    pub size: [f64; 3],
    /// Edge length of one voxel (meters).
    pub resolution: f64,
    /// Inflation radius stamped around peer vehicles (meters).
    pub self_inflation: f64,
    /// Inflation radius stamped around every obstacle point (meters).
    pub obstacle_inflation: f64,
    /// Extra cells beyond the obstacle inflation radius covered by the cost stencil.
    pub cost_margin_cells: u32,
    /// Number of scans kept by the sliding window. Zero or negative keeps every scan.
    pub window_size: i32,
    /// Height (meters) of the plane the vehicle maps on.
    pub vehicle_height: f64,
    /// Half-width of the vertical band around `vehicle_height`, in cells.
    pub vertical_band_cells: u32,
    /// Whether the display-only border outline is merged into the inflated cloud.
    pub show_border: bool,
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            origin: [-5.0, -5.0, -0.5],
            size: [10.0, 10.0, 2.0],
            resolution: 0.2,
            self_inflation: 0.6,
            obstacle_inflation: 0.3,
            cost_margin_cells: 5,
            window_size: -1,
            vehicle_height: 0.1,
            vertical_band_cells: 2,
            show_border: false,
        }
    }
}

impl MapConfig {
    /// Capacity of the sliding window, or `None` when every scan is kept.
    pub fn window_capacity(&self) -> Option<usize> {
        usize::try_from(self.window_size).ok().filter(|&n| n > 0)
    }

    /// Validates the configuration and derives the grid geometry.
    ///
    /// # Returns
    /// * `Result<GridGeometry, MapError>` - The derived geometry, or the first
    ///   configuration problem found
    pub fn geometry(&self) -> Result<GridGeometry, MapError> {
        if !self.resolution.is_finite() || self.resolution <= 0.0 {
            return Err(MapError::InvalidResolution("Resolution must be positive"));
        }
        for radius in [self.self_inflation, self.obstacle_inflation] {
            if !radius.is_finite() || radius < 0.0 {
                return Err(MapError::InvalidRadius(
                    "Inflation radii must be finite and non-negative",
                ));
            }
        }

        let origin = Vector3::from(self.origin);
        let size = Vector3::from(self.size);
        let inv_resolution = 1.0 / self.resolution;

        let mut dims = Vector3::<usize>::zeros();
        for i in 0..3 {
            if !size[i].is_finite() || size[i] <= 0.0 {
                return Err(MapError::InvalidDimensions(
                    "Map size must be positive on every axis",
                ));
            }
            dims[i] = (size[i] * inv_resolution).ceil() as usize;
        }

        // Stencils wider than the grid could never stamp anything new
        let xy_extent = dims.x.max(dims.y) as f64;
        let peer_cells = (self.self_inflation / self.resolution).ceil() + 1.0;
        let cost_cells = (self.obstacle_inflation / self.resolution).ceil()
            + f64::from(self.cost_margin_cells);
        if peer_cells > xy_extent || cost_cells > xy_extent {
            return Err(MapError::InvalidRadius(
                "Inflation radii must not exceed the map extent",
            ));
        }

        // Check for potential overflow in data allocation
        let total_cells = dims
            .iter()
            .try_fold(1usize, |acc, &dim| acc.checked_mul(dim))
            .ok_or(MapError::InvalidDimensions(
                "Map dimensions too large, would cause overflow",
            ))?;

        let mut min_range = origin;
        let mut max_range = origin + size;
        let band = f64::from(self.vertical_band_cells) * self.resolution;
        min_range.z = self.vehicle_height - band;
        max_range.z = self.vehicle_height + band;

        if min_range.z < origin.z || max_range.z > origin.z + size.z {
            warn!(
                band_min = min_range.z,
                band_max = max_range.z,
                grid_min = origin.z,
                grid_max = origin.z + size.z,
                "Vertical band extends past the grid z extent; cells outside the grid are dropped"
            );
        }

        Ok(GridGeometry {
            origin,
            size,
            resolution: self.resolution,
            inv_resolution,
            dims,
            total_cells,
            min_range,
            max_range,
        })
    }
}

/// Immutable geometry of a voxel grid, derived once from a [`MapConfig`].
#[derive(Debug, Clone, PartialEq)]
pub struct GridGeometry {
    /// World coordinates of voxel (0, 0, 0)'s lower corner.
    pub origin: Vector3<f64>,
    /// Map extent in meters.
    pub size: Vector3<f64>,
    /// Voxel edge length in meters.
    pub resolution: f64,
    /// `1 / resolution`.
    pub inv_resolution: f64,
    /// Number of voxels along each axis, `ceil(size / resolution)`.
    pub dims: Vector3<usize>,
    /// Product of `dims`.
    pub total_cells: usize,
    /// Lower corner of the in-map region (z replaced by the vertical band).
    pub min_range: Vector3<f64>,
    /// Upper corner of the in-map region (z replaced by the vertical band).
    pub max_range: Vector3<f64>,
}

impl GridGeometry {
    /// Returns true when `pos` lies strictly inside the mapped region.
    ///
    /// A position within [`BOUNDARY_EPSILON`] of any boundary is outside. On the
    /// vertical axis the region is the band around the vehicle height, not the
    /// grid's z extent.
    pub fn is_in_map(&self, pos: &Vector3<f64>) -> bool {
        (0..3).all(|i| {
            pos[i] >= self.min_range[i] + BOUNDARY_EPSILON
                && pos[i] <= self.max_range[i] - BOUNDARY_EPSILON
        })
    }
}

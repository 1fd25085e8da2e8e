//! Neighborhood safety check consumed by planners and controllers.

use crate::geometry::{Position, VoxelIndex};
use crate::grid::{GridStore, Occupancy};

/// A neighborhood with more occupied voxels than this is unsafe.
pub const SAFETY_OCCUPIED_LIMIT: usize = 5;

impl GridStore {
    /// Checks whether `pos` is safe to occupy.
    ///
    /// Scans the square xy-neighborhood of half-width
    /// `floor(check_distance / resolution)` voxels around the voxel containing
    /// `pos`, on its own layer. The position is unsafe if it is outside the
    /// map, if any scanned voxel center is outside the map, or if more than
    /// [`SAFETY_OCCUPIED_LIMIT`] scanned voxels are occupied.
    ///
    /// # Arguments
    /// * `pos` - Position to check, in world coordinates
    /// * `check_distance` - Neighborhood half-width in meters
    ///
    /// # Returns
    /// * `bool` - True if the position is safe
    pub fn check_safety(&self, pos: &Position, check_distance: f64) -> bool {
        if !self.is_in_map(pos) {
            return false;
        }

        let center = self.position_to_index(pos);
        let half_width = (check_distance / self.resolution()).floor().max(0.0) as i64;
        let mut occupied = 0;

        for ix in -half_width..=half_width {
            for iy in -half_width..=half_width {
                let neighbor = center + VoxelIndex::new(ix, iy, 0);
                if !self.is_in_map(&self.index_to_position(&neighbor)) {
                    return false;
                }
                match self.occupancy(&neighbor).in_bounds() {
                    Some(Occupancy::Occupied) => occupied += 1,
                    Some(Occupancy::Free) => {}
                    // In the band but past the grid's z extent. Treated like an
                    // off-map neighbor rather than counted as one occupied cell,
                    // so the query fails even with fewer than five such cells.
                    None => return false,
                }
            }
        }

        occupied <= SAFETY_OCCUPIED_LIMIT
    }
}

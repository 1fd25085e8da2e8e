//! Dense voxel storage for occupancy and proximity cost.
//!
//! The grid keeps two parallel flat arrays addressed by the linear index
//! `x * (ny * nz) + y * nz + z`. Occupancy holds `0` (free) or `1` (occupied),
//! cost holds non-negative scalars that only ever grow within a pass.
//!
//! Out-of-map access is never an error: writes are silent no-ops and reads
//! return [`Lookup::OutOfBounds`].

#![warn(missing_docs)]

use nalgebra::Vector3;
use std::fmt;

use crate::config::GridGeometry;
use crate::geometry::{Position, VoxelIndex};

/// Sentinel returned by the numeric accessors for out-of-map lookups.
pub const OUT_OF_BOUNDS: i8 = -1;

/// Result of a grid lookup.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Lookup<T> {
    /// The position or index lies inside the grid.
    InBounds(T),
    /// The position or index lies outside the grid.
    OutOfBounds,
}

impl<T> Lookup<T> {
    /// Converts into an `Option`, dropping the out-of-bounds case.
    pub fn in_bounds(self) -> Option<T> {
        match self {
            Lookup::InBounds(value) => Some(value),
            Lookup::OutOfBounds => None,
        }
    }
}

/// Binary occupancy state of a voxel.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Occupancy {
    /// Nothing has been stamped into the voxel during the current pass.
    Free = 0,
    /// An obstacle, inflated obstacle or peer footprint covers the voxel.
    Occupied = 1,
}

impl Occupancy {
    /// Converts a stored cell value into an occupancy state.
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Occupancy::Free),
            1 => Some(Occupancy::Occupied),
            _ => None,
        }
    }
}

impl Lookup<Occupancy> {
    /// Returns `-1` out of bounds, `0` for free and `1` for occupied cells.
    pub fn as_i8(&self) -> i8 {
        match self {
            Lookup::InBounds(occupancy) => *occupancy as i8,
            Lookup::OutOfBounds => OUT_OF_BOUNDS,
        }
    }

    /// Returns true only for in-bounds occupied cells.
    pub fn is_occupied(&self) -> bool {
        matches!(self, Lookup::InBounds(Occupancy::Occupied))
    }
}

impl Lookup<f64> {
    /// Returns the stored cost, or `-1.0` out of bounds.
    pub fn or_sentinel(&self) -> f64 {
        match self {
            Lookup::InBounds(cost) => *cost,
            Lookup::OutOfBounds => f64::from(OUT_OF_BOUNDS),
        }
    }
}

/// Occupancy and cost arrays over a fixed grid geometry.
#[derive(Debug, Clone)]
pub struct GridStore {
    geometry: GridGeometry,
    occupancy: Vec<u8>,
    cost: Vec<f64>,
}

impl GridStore {
    /// Creates an all-free, zero-cost grid for the given geometry.
    pub fn new(geometry: GridGeometry) -> Self {
        let total = geometry.total_cells;
        Self {
            geometry,
            occupancy: vec![0; total],
            cost: vec![0.0; total],
        }
    }

    /// Gets the geometry of the grid.
    pub fn geometry(&self) -> &GridGeometry {
        &self.geometry
    }

    /// Gets the number of voxels along each axis.
    pub fn dims(&self) -> &Vector3<usize> {
        &self.geometry.dims
    }

    /// Gets the voxel edge length in meters.
    pub fn resolution(&self) -> f64 {
        self.geometry.resolution
    }

    /// Converts a world position into the index of the voxel containing it.
    ///
    /// Uses `floor`, so positions below the origin yield negative components.
    /// The result is not bounds-checked.
    pub fn position_to_index(&self, pos: &Position) -> VoxelIndex {
        let g = &self.geometry;
        VoxelIndex::from_fn(|i, _| ((pos[i] - g.origin[i]) * g.inv_resolution).floor() as i64)
    }

    /// Converts a voxel index into the world position of the voxel center.
    pub fn index_to_position(&self, idx: &VoxelIndex) -> Position {
        let g = &self.geometry;
        Position::from_fn(|i, _| (idx[i] as f64 + 0.5) * g.resolution + g.origin[i])
    }

    /// Returns true when `pos` lies inside the mapped region.
    ///
    /// See [`GridGeometry::is_in_map`] for the boundary and vertical band rules.
    pub fn is_in_map(&self, pos: &Position) -> bool {
        self.geometry.is_in_map(pos)
    }

    /// Returns true when every component of `idx` lies in `[0, dimension)`.
    pub fn is_valid_index(&self, idx: &VoxelIndex) -> bool {
        (0..3).all(|i| idx[i] >= 0 && (idx[i] as u64) < self.geometry.dims[i] as u64)
    }

    /// Calculates the linear array index of a voxel, or `None` if it lies outside the grid.
    pub fn linear_index(&self, idx: &VoxelIndex) -> Option<usize> {
        if !self.is_valid_index(idx) {
            return None;
        }
        let dims = &self.geometry.dims;
        let (x, y, z) = (idx.x as usize, idx.y as usize, idx.z as usize);
        Some(x * dims.y * dims.z + y * dims.z + z)
    }

    /// Linear index of the voxel containing an in-map position.
    fn cell_of(&self, pos: &Position) -> Option<usize> {
        if !self.is_in_map(pos) {
            return None;
        }
        // The vertical band may extend past the grid's z extent
        self.linear_index(&self.position_to_index(pos))
    }

    /// Sets the occupancy of the voxel containing `pos`.
    ///
    /// Values other than `0` and `1` and out-of-map positions are ignored.
    pub fn set_occupancy(&mut self, pos: &Position, value: u8) {
        if Occupancy::from_u8(value).is_none() {
            return;
        }
        if let Some(cell) = self.cell_of(pos) {
            self.occupancy[cell] = value;
        }
    }

    /// Raises the cost of the voxel containing `pos` to `cost` if it is higher
    /// than the stored value. Out-of-map positions are ignored.
    pub fn update_cost(&mut self, pos: &Position, cost: f64) {
        if let Some(cell) = self.cell_of(pos) {
            if cost > self.cost[cell] {
                self.cost[cell] = cost;
            }
        }
    }

    /// Gets the occupancy of the voxel containing `pos`.
    pub fn occupancy_at(&self, pos: &Position) -> Lookup<Occupancy> {
        match self.cell_of(pos) {
            Some(cell) => Lookup::InBounds(self.stored_occupancy(cell)),
            None => Lookup::OutOfBounds,
        }
    }

    /// Gets the occupancy of a voxel by index.
    pub fn occupancy(&self, idx: &VoxelIndex) -> Lookup<Occupancy> {
        match self.linear_index(idx) {
            Some(cell) => Lookup::InBounds(self.stored_occupancy(cell)),
            None => Lookup::OutOfBounds,
        }
    }

    /// Gets the cost of the voxel containing `pos`.
    pub fn cost_at(&self, pos: &Position) -> Lookup<f64> {
        match self.cell_of(pos) {
            Some(cell) => Lookup::InBounds(self.cost[cell]),
            None => Lookup::OutOfBounds,
        }
    }

    fn stored_occupancy(&self, cell: usize) -> Occupancy {
        if self.occupancy[cell] == 0 {
            Occupancy::Free
        } else {
            Occupancy::Occupied
        }
    }

    /// Resets every voxel to free and every cost to zero.
    pub fn clear(&mut self) {
        self.occupancy.fill(0);
        self.cost.fill(0.0);
    }

    /// Gets the raw occupancy array.
    pub fn occupancy_data(&self) -> &[u8] {
        &self.occupancy
    }

    /// Gets the raw cost array.
    pub fn cost_data(&self) -> &[f64] {
        &self.cost
    }

    /// Number of occupied voxels.
    pub fn occupied_count(&self) -> usize {
        self.occupancy.iter().filter(|&&v| v == 1).count()
    }
}

impl fmt::Display for GridStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let g = &self.geometry;
        writeln!(
            f,
            "GridStore ({}x{}x{}, resolution: {:.3}m)",
            g.dims.x, g.dims.y, g.dims.z, g.resolution
        )?;
        writeln!(
            f,
            "Origin: ({:.3}, {:.3}, {:.3})",
            g.origin.x, g.origin.y, g.origin.z
        )?;

        // Only layers that intersect the vertical band can ever be stamped
        for z_idx in 0..g.dims.z {
            let height = g.origin.z + (z_idx as f64 + 0.5) * g.resolution;
            if height < g.min_range.z || height > g.max_range.z {
                continue;
            }
            writeln!(f, "Layer Z={} (height: {:.3}m):", z_idx, height)?;
            for y_idx in (0..g.dims.y).rev() {
                for x_idx in 0..g.dims.x {
                    let idx = VoxelIndex::new(x_idx as i64, y_idx as i64, z_idx as i64);
                    let symbol = if self.occupancy(&idx).is_occupied() { '#' } else { '.' };
                    write!(f, "{}", symbol)?;
                }
                writeln!(f)?;
            }
        }
        Ok(())
    }
}

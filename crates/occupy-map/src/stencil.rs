//! Precomputed neighborhood offsets stamped around points.
//!
//! Every stencil is built from a square ring: for a radius of `r` cells the
//! rows `x = -r` and `x = r` contribute every `y` in `[-r, r]`, while interior
//! rows contribute only `y = -r` and `y = r`. The result is the outline of a
//! square, not a filled square or a disk, and all offsets lie in the ground
//! plane (`z = 0`).

#![warn(missing_docs)]

use nalgebra::Vector3;

use crate::config::MapConfig;
use crate::geometry::Position;

/// A single offset of a stencil.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StencilOffset {
    /// Offset in cells along x and y.
    pub cell: (i64, i64),
    /// Offset in meters (`cell * resolution`, z = 0).
    pub offset: Position,
    /// Squared distance from the stamped point in cells², for weighted stencils.
    pub squared_distance: Option<i64>,
}

impl StencilOffset {
    fn new(x: i64, y: i64, resolution: f64) -> Self {
        Self {
            cell: (x, y),
            offset: Vector3::new(x as f64 * resolution, y as f64 * resolution, 0.0),
            squared_distance: None,
        }
    }

    /// Cost contributed at this offset: the inverse squared distance.
    ///
    /// Unweighted offsets and the stencil center contribute `1.0`.
    pub fn weight(&self) -> f64 {
        match self.squared_distance {
            Some(d2) if d2 > 0 => 1.0 / d2 as f64,
            _ => 1.0,
        }
    }
}

/// An ordered list of offsets applied relative to a stamped point.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Stencil {
    offsets: Vec<StencilOffset>,
}

impl Stencil {
    /// Builds the square ring of radius `r` cells.
    ///
    /// A radius of zero yields the single center offset.
    pub fn square_ring(r: i64, resolution: f64) -> Self {
        let mut stencil = Self::default();
        stencil.push_ring(r, resolution);
        stencil
    }

    /// Builds two nested square rings of radius `r` and `r + 1` cells, giving a
    /// footprint outline two cells thick.
    pub fn double_ring(r: i64, resolution: f64) -> Self {
        let mut stencil = Self::default();
        stencil.push_ring(r, resolution);
        stencil.push_ring(r.saturating_add(1), resolution);
        stencil
    }

    /// Builds the cost stencil: the square ring of radius `outer` cells, keeping
    /// offsets within `outer` of the center and weighting each by its squared
    /// distance.
    pub fn cost_ring(outer: i64, resolution: f64) -> Self {
        let limit = outer.saturating_mul(outer);
        let mut ring = Self::square_ring(outer, resolution);
        ring.offsets.retain_mut(|o| {
            let d2 = o.cell.0 * o.cell.0 + o.cell.1 * o.cell.1;
            o.squared_distance = Some(d2);
            d2 <= limit
        });
        ring
    }

    fn push_ring(&mut self, r: i64, resolution: f64) {
        if r <= 0 {
            self.offsets.push(StencilOffset::new(0, 0, resolution));
            return;
        }
        for x in -r..=r {
            if x.abs() == r {
                for y in -r..=r {
                    self.offsets.push(StencilOffset::new(x, y, resolution));
                }
            } else {
                self.offsets.push(StencilOffset::new(x, -r, resolution));
                self.offsets.push(StencilOffset::new(x, r, resolution));
            }
        }
    }

    /// Gets the offsets in enumeration order.
    pub fn offsets(&self) -> &[StencilOffset] {
        &self.offsets
    }

    /// Number of offsets.
    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    /// Returns true if the stencil has no offsets.
    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }

    /// Positions covered by the stencil when centered on `center`.
    pub fn apply<'a>(&'a self, center: &'a Position) -> impl Iterator<Item = Position> + 'a {
        self.offsets.iter().map(move |o| center + o.offset)
    }
}

/// Converts a radius in meters into a radius in cells, rounding up.
pub fn radius_in_cells(radius: f64, resolution: f64) -> i64 {
    (radius / resolution).ceil() as i64
}

/// The three stencils used by an inflation pass.
#[derive(Debug, Clone, PartialEq)]
pub struct StencilSet {
    /// Footprint stamped around each peer vehicle.
    pub peer: Stencil,
    /// Offsets marked occupied around each obstacle point.
    pub obstacle: Stencil,
    /// Inverse-distance weighted offsets raising the cost map around each obstacle point.
    pub cost: Stencil,
}

impl StencilSet {
    /// Precomputes every stencil from the map configuration.
    pub fn from_config(config: &MapConfig) -> Self {
        let resolution = config.resolution;
        let peer_r = radius_in_cells(config.self_inflation, resolution);
        let obstacle_r = radius_in_cells(config.obstacle_inflation, resolution);
        let cost_r = obstacle_r.saturating_add(i64::from(config.cost_margin_cells));

        Self {
            peer: Stencil::double_ring(peer_r, resolution),
            obstacle: Stencil::square_ring(obstacle_r, resolution),
            cost: Stencil::cost_ring(cost_r, resolution),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn cells(stencil: &Stencil) -> HashSet<(i64, i64)> {
        stencil.offsets().iter().map(|o| o.cell).collect()
    }

    #[test]
    fn test_square_ring_radius_one() {
        let ring = Stencil::square_ring(1, 0.5);
        assert_eq!(ring.len(), 8);
        assert!(!cells(&ring).contains(&(0, 0)));
        assert!(cells(&ring).contains(&(-1, -1)));
        assert!(cells(&ring).contains(&(0, 1)));
    }

    #[test]
    fn test_square_ring_is_outline_only() {
        let ring = Stencil::square_ring(2, 1.0);
        // 2 boundary rows of 5 + 3 interior rows of 2
        assert_eq!(ring.len(), 16);
        let set = cells(&ring);
        assert_eq!(set.len(), 16);
        assert!(!set.contains(&(0, 0)));
        assert!(!set.contains(&(1, 1)));
        assert!(set.contains(&(2, 0)));
        assert!(set.contains(&(0, -2)));
        assert!(ring.offsets().iter().all(|o| o.offset.z == 0.0));
    }

    #[test]
    fn test_square_ring_enumeration_order() {
        let ring = Stencil::square_ring(1, 1.0);
        let order: Vec<_> = ring.offsets().iter().map(|o| o.cell).collect();
        assert_eq!(
            order,
            vec![(-1, -1), (-1, 0), (-1, 1), (0, -1), (0, 1), (1, -1), (1, 0), (1, 1)]
        );
    }

    #[test]
    fn test_zero_radius_is_center() {
        let ring = Stencil::square_ring(0, 0.2);
        assert_eq!(ring.len(), 1);
        assert_eq!(ring.offsets()[0].cell, (0, 0));
    }

    #[test]
    fn test_double_ring() {
        let ring = Stencil::double_ring(3, 0.2);
        assert_eq!(ring.len(), 8 * 3 + 8 * 4);
    }

    #[test]
    fn test_offsets_scale_with_resolution() {
        let ring = Stencil::square_ring(2, 0.25);
        let corner = ring.offsets().iter().find(|o| o.cell == (2, -2)).unwrap();
        assert!((corner.offset - Vector3::new(0.5, -0.5, 0.0)).norm() < 1e-12);
    }

    #[test]
    fn test_cost_ring_keeps_axis_points() {
        // Only the four axis points of the outline lie within the outer radius
        let cost = Stencil::cost_ring(4, 0.2);
        assert_eq!(cells(&cost), HashSet::from([(-4, 0), (4, 0), (0, -4), (0, 4)]));
        for o in cost.offsets() {
            assert_eq!(o.squared_distance, Some(16));
            assert!((o.weight() - 1.0 / 16.0).abs() < 1e-12);
        }
    }

    #[test]
    fn test_cost_ring_zero_radius_weight() {
        let cost = Stencil::cost_ring(0, 0.2);
        assert_eq!(cost.len(), 1);
        assert_eq!(cost.offsets()[0].squared_distance, Some(0));
        assert_eq!(cost.offsets()[0].weight(), 1.0);
    }

    #[test]
    fn test_stencil_set_from_default_config() {
        let set = StencilSet::from_config(&MapConfig::default());
        // ceil(0.6 / 0.2) = 3 and ceil(0.3 / 0.2) = 2
        assert_eq!(set.peer.len(), 24 + 32);
        assert_eq!(set.obstacle.len(), 16);
        assert_eq!(set.cost.len(), 4);
        assert!(set.cost.offsets().iter().all(|o| o.squared_distance == Some(49)));
    }

    #[test]
    fn test_apply() {
        let ring = Stencil::square_ring(1, 1.0);
        let center = Vector3::new(5.0, 5.0, 0.3);
        let covered: Vec<_> = ring.apply(&center).collect();
        assert_eq!(covered.len(), 8);
        assert!(covered.iter().all(|p| p.z == 0.3));
        assert!(covered.contains(&Vector3::new(4.0, 4.0, 0.3)));
    }
}

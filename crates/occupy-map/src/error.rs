//! This module defines the error types used by the `occupy-map` crate.

#![warn(missing_docs)]

use thiserror::Error;

/// Error type for occupancy map construction.
///
/// Only misconfiguration surfaces as an error. Out-of-bounds positions and
/// invalid occupancy values are handled as silent no-ops or sentinel lookups,
/// since sensor noise routinely produces them.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MapError {
    /// Error for invalid map resolution.
    /// This variant is returned when a map resolution is provided that is not positive.
    #[error("Invalid map resolution: {0}")]
    InvalidResolution(&'static str),
    /// Error for invalid map dimensions.
    /// This variant is returned when any grid axis would hold zero cells.
    #[error("Invalid map dimensions: {0}")]
    InvalidDimensions(&'static str),
    /// Error for invalid inflation radii.
    /// This variant is returned when an inflation radius is negative or not finite.
    #[error("Invalid inflation radius: {0}")]
    InvalidRadius(&'static str),
}

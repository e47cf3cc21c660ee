//! This module defines the error types used by the `rover-navigation` crate.

#![warn(missing_docs)]

/// Error type for navigation setup.
///
/// Only construction and validation fail with this type. Runtime outcomes such as
/// "no path found" or "path blocked" are reported through result states instead.
#[derive(Debug, Clone, PartialEq)]
pub enum NavigationError {
    /// Error for invalid grid resolution.
    /// This variant is returned when a resolution is not a positive, finite number.
    InvalidResolution(&'static str),
    /// Error for invalid grid dimensions.
    /// This variant is returned when the row or column count is zero or overflows.
    InvalidDimensions(&'static str),
    /// Error for out-of-bounds cell access.
    OutOfBounds(&'static str),
    /// Error for an inflation radius that is not positive.
    InvalidInflationRadius(&'static str),
    /// Error for planner parameters that cannot produce a search.
    InvalidPlannerConfig(&'static str),
    /// Error for controller gains or limits that are out of range.
    InvalidControllerConfig(&'static str),
}

impl core::fmt::Display for NavigationError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            NavigationError::InvalidResolution(msg) => write!(f, "Invalid grid resolution: {}", msg),
            NavigationError::InvalidDimensions(msg) => write!(f, "Invalid grid dimensions: {}", msg),
            NavigationError::OutOfBounds(msg) => write!(f, "Grid access out of bounds: {}", msg),
            NavigationError::InvalidInflationRadius(msg) => {
                write!(f, "Invalid inflation radius: {}", msg)
            }
            NavigationError::InvalidPlannerConfig(msg) => {
                write!(f, "Invalid planner configuration: {}", msg)
            }
            NavigationError::InvalidControllerConfig(msg) => {
                write!(f, "Invalid controller configuration: {}", msg)
            }
        }
    }
}

impl core::error::Error for NavigationError {}

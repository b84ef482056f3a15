//! Coordinate math shared across the workspace.
//!
//! Thin wrappers over the `geo` crate's haversine implementations, fixing
//! the units the rest of the system works in: kilometers for distance,
//! compass degrees in `[0, 360)` for bearing.

use geo::{HaversineBearing, HaversineDistance, Point};

/// Great-circle distance between two points, in kilometers.
pub fn distance_km(a: Point, b: Point) -> f64 {
    a.haversine_distance(&b) / 1000.0
}

/// Initial compass bearing from `a` to `b`, in degrees `[0, 360)`.
///
/// Used to rotate vehicle markers toward their direction of travel.
pub fn bearing_deg(a: Point, b: Point) -> f64 {
    a.haversine_bearing(b).rem_euclid(360.0)
}

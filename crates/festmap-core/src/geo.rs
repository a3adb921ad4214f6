//! Identity of points of interest.

use crate::types::Location;

/// Distance, in raw degrees, under which two coordinates count as the same
/// place (roughly 10 m of latitude).
///
/// This is a planar distance over `(lat, lng)` degrees, not a geodesic one: a
/// degree of longitude shrinks towards the poles, so the effective radius
/// narrows east-west as latitude grows. Changing it to a great-circle
/// distance would change which submissions merge, so it stays as is.
pub const MATCH_DISTANCE_DEGREES: f64 = 0.000_09;

/// Whether `a` and `b` denote the same point of interest.
///
/// True when the names are equal after trimming and case folding, or when the
/// coordinates lie strictly closer than [`MATCH_DISTANCE_DEGREES`]. No other
/// field takes part.
#[must_use]
pub fn is_same_location(a: &Location, b: &Location) -> bool {
    names_match(&a.name, &b.name) || degree_distance(a, b) < MATCH_DISTANCE_DEGREES
}

fn names_match(a: &str, b: &str) -> bool {
    a.trim().to_lowercase() == b.trim().to_lowercase()
}

fn degree_distance(a: &Location, b: &Location) -> f64 {
    (b.lat - a.lat).hypot(b.lng - a.lng)
}

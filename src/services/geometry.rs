//! Containment evaluator for zone geometry
//!
//! Pure functions, no state. Coordinates are projected to planar meters with
//! an equirectangular approximation, valid for zone spans of a few kilometers.
//! Boundary points count as inside for both circles and polygons so vehicles
//! moving along a zone edge do not flap between enter and exit.

use crate::domain::types::Position;
use crate::domain::zone::{distinct_points, Zone, ZoneGeometry};

/// Meters per degree of latitude
const METERS_PER_DEG_LAT: f64 = 111_132.0;
/// Meters per degree of longitude at the equator, scaled by cos(lat) locally
const METERS_PER_DEG_LON: f64 = 111_320.0;

/// Slack applied to boundary comparisons so points computed to lie exactly on
/// an edge or radius survive f64 rounding
const BOUNDARY_EPS_M: f64 = 1e-6;

/// Project a position to planar meters
fn project(p: Position) -> (f64, f64) {
    let x = p.lon * METERS_PER_DEG_LON * p.lat.to_radians().cos();
    let y = p.lat * METERS_PER_DEG_LAT;
    (x, y)
}

/// Planar distance in meters between two positions
pub fn distance_m(a: Position, b: Position) -> f64 {
    let (ax, ay) = project(a);
    let (bx, by) = project(b);
    (ax - bx).hypot(ay - by)
}

/// Whether `position` is inside `zone`, boundary inclusive.
///
/// Malformed geometry fails closed: a degenerate polygon or a non-finite
/// projection never contains, and never aborts evaluation of other zones.
pub fn contains(zone: &Zone, position: Position) -> bool {
    match &zone.geometry {
        ZoneGeometry::Circle { center, radius_m } => {
            let dist = distance_m(position, *center);
            dist.is_finite() && dist <= radius_m + BOUNDARY_EPS_M
        }
        ZoneGeometry::Polygon { points } => {
            if distinct_points(points) < 3 {
                return false;
            }
            let pt = project(position);
            if !pt.0.is_finite() || !pt.1.is_finite() {
                return false;
            }
            let ring: Vec<(f64, f64)> = points.iter().map(|p| project(*p)).collect();
            if ring.iter().any(|(x, y)| !x.is_finite() || !y.is_finite()) {
                return false;
            }
            on_ring_boundary(pt, &ring) || point_in_ring(pt, &ring)
        }
    }
}

/// Distance from a point to a segment, for the boundary-inclusive edge test
fn segment_distance(pt: (f64, f64), a: (f64, f64), b: (f64, f64)) -> f64 {
    let (dx, dy) = (b.0 - a.0, b.1 - a.1);
    let len2 = dx * dx + dy * dy;
    if len2 == 0.0 {
        return (pt.0 - a.0).hypot(pt.1 - a.1);
    }
    let t = (((pt.0 - a.0) * dx + (pt.1 - a.1) * dy) / len2).clamp(0.0, 1.0);
    (pt.0 - (a.0 + t * dx)).hypot(pt.1 - (a.1 + t * dy))
}

/// Whether the point lies on an edge or vertex of the ring
fn on_ring_boundary(pt: (f64, f64), ring: &[(f64, f64)]) -> bool {
    let n = ring.len();
    (0..n).any(|i| segment_distance(pt, ring[i], ring[(i + 1) % n]) <= BOUNDARY_EPS_M)
}

/// Standard ray-casting test; the ring is implicitly closed
fn point_in_ring(pt: (f64, f64), ring: &[(f64, f64)]) -> bool {
    let mut inside = false;
    let mut j = ring.len() - 1;
    for i in 0..ring.len() {
        let (xi, yi) = ring[i];
        let (xj, yj) = ring[j];
        if (yi > pt.1) != (yj > pt.1) {
            let x_cross = xi + (pt.1 - yi) * (xj - xi) / (yj - yi);
            if pt.0 < x_cross {
                inside = !inside;
            }
        }
        j = i;
    }
    inside
}

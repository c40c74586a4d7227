//! # Geographic Utilities
//!
//! Core geographic computation utilities for tour paths.
//!
//! This module provides the fundamental geographic operations used throughout the
//! navigation engine. All functions are designed to be efficient and accurate at
//! city scale, where a walking tour lives.
//!
//! ## Overview
//!
//! | Function | Description |
//! |----------|-------------|
//! | [`haversine_distance`] | Great-circle distance between two points |
//! | [`polyline_length`] | Total length of a path in meters |
//! | [`point_to_segment_distance`] | Distance from a point to a path edge |
//! | [`project_onto_segment`] | Clamped projection of a point onto an edge |
//! | [`initial_bearing`] | Initial compass bearing between two points |
//! | [`interpolate`] | Linear interpolation along an edge |
//!
//! ## Coordinate System
//!
//! All functions expect WGS84 coordinates (latitude/longitude in degrees), which is
//! the standard used by GPS receivers and mapping services.
//!
//! ## Algorithm Notes
//!
//! Distances use the haversine formula (spherical Earth), accurate to within 0.3%
//! for practical purposes. Point-to-edge projection treats longitude/latitude as a
//! local Cartesian plane, which is acceptable at route scale (a few kilometers);
//! only the final distance to the projected point is computed on the sphere.

use geo::{Bearing, Distance, Haversine, Point};

use crate::GeoPoint;

// =============================================================================
// Distance Functions
// =============================================================================

/// Calculate the great-circle distance between two points using the Haversine formula.
///
/// Returns the distance in meters along the Earth's surface (assuming a spherical
/// Earth with radius 6,371 km).
///
/// # Example
///
/// ```rust
/// use tour_nav::{GeoPoint, geo_utils};
///
/// let london = GeoPoint::new(51.5074, -0.1278);
/// let paris = GeoPoint::new(48.8566, 2.3522);
///
/// let distance = geo_utils::haversine_distance(&london, &paris);
/// assert!((distance - 343_560.0).abs() < 1000.0); // ~344 km
/// ```
#[inline]
pub fn haversine_distance(p1: &GeoPoint, p2: &GeoPoint) -> f64 {
    let point1 = Point::new(p1.longitude, p1.latitude);
    let point2 = Point::new(p2.longitude, p2.latitude);
    Haversine::distance(point1, point2)
}

/// Calculate the total length of a polyline in meters.
///
/// Sums the haversine distance between consecutive points. Empty or single-point
/// paths return 0.0.
pub fn polyline_length(points: &[GeoPoint]) -> f64 {
    if points.len() < 2 {
        return 0.0;
    }

    points
        .windows(2)
        .map(|w| haversine_distance(&w[0], &w[1]))
        .sum()
}

// =============================================================================
// Segment Projection
// =============================================================================

/// Project a point onto the segment `a`–`b`, clamped to the segment.
///
/// The projection is computed in a locally-planar approximation: longitude and
/// latitude are treated as Cartesian coordinates, which holds well at route scale.
/// The projection parameter is clamped to `[0, 1]` so the result always lies on
/// the segment.
///
/// Returns the projected point and the clamped parameter `t` (0 at `a`, 1 at `b`).
/// A degenerate segment (`a == b`) returns `(a, 0.0)`.
pub fn project_onto_segment(point: &GeoPoint, a: &GeoPoint, b: &GeoPoint) -> (GeoPoint, f64) {
    let dx = b.longitude - a.longitude;
    let dy = b.latitude - a.latitude;

    let length_sq = dx * dx + dy * dy;
    if length_sq == 0.0 {
        return (*a, 0.0);
    }

    let t = ((point.longitude - a.longitude) * dx + (point.latitude - a.latitude) * dy) / length_sq;
    let t = t.clamp(0.0, 1.0);

    (interpolate(a, b, t), t)
}

/// Distance in meters from `point` to the segment `a`–`b`.
///
/// Projects the point onto the segment in the planar approximation (clamped to the
/// segment), then returns the great-circle distance to the projected point. A
/// degenerate segment (`a == b`) falls back to [`haversine_distance`]`(point, a)`.
///
/// # Example
///
/// ```rust
/// use tour_nav::{GeoPoint, geo_utils};
///
/// let a = GeoPoint::new(51.500, -0.130);
/// let b = GeoPoint::new(51.500, -0.120);
/// let p = GeoPoint::new(51.501, -0.125); // north of the segment midpoint
///
/// let dist = geo_utils::point_to_segment_distance(&p, &a, &b);
/// assert!(dist > 100.0 && dist < 120.0); // ~111m per 0.001 degree latitude
/// ```
pub fn point_to_segment_distance(point: &GeoPoint, a: &GeoPoint, b: &GeoPoint) -> f64 {
    let (projected, _) = project_onto_segment(point, a, b);
    haversine_distance(point, &projected)
}

/// Linear interpolation between two points.
///
/// `t = 0` yields `a`, `t = 1` yields `b`. The parameter is not clamped.
#[inline]
pub fn interpolate(a: &GeoPoint, b: &GeoPoint, t: f64) -> GeoPoint {
    GeoPoint::new(
        a.latitude + t * (b.latitude - a.latitude),
        a.longitude + t * (b.longitude - a.longitude),
    )
}

// =============================================================================
// Bearing
// =============================================================================

/// Initial compass bearing from `p1` to `p2` in degrees, normalized to `[0, 360)`.
///
/// North is 0°, East is 90°. Used to classify the direction of a branch fork
/// relative to the parent path.
pub fn initial_bearing(p1: &GeoPoint, p2: &GeoPoint) -> f64 {
    let point1 = Point::new(p1.longitude, p1.latitude);
    let point2 = Point::new(p2.longitude, p2.latitude);
    let bearing = Haversine::bearing(point1, point2);
    bearing.rem_euclid(360.0)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn approx_eq(a: f64, b: f64, epsilon: f64) -> bool {
        (a - b).abs() < epsilon
    }

    #[test]
    fn test_haversine_distance_same_point() {
        let p = GeoPoint::new(51.5074, -0.1278);
        assert_eq!(haversine_distance(&p, &p), 0.0);
    }

    #[test]
    fn test_haversine_distance_symmetric() {
        let p1 = GeoPoint::new(51.5074, -0.1278);
        let p2 = GeoPoint::new(51.5090, -0.1300);
        assert!(approx_eq(
            haversine_distance(&p1, &p2),
            haversine_distance(&p2, &p1),
            1e-9,
        ));
    }

    #[test]
    fn test_haversine_distance_known_value() {
        // London to Paris is approximately 344 km
        let london = GeoPoint::new(51.5074, -0.1278);
        let paris = GeoPoint::new(48.8566, 2.3522);
        let dist = haversine_distance(&london, &paris);
        assert!(approx_eq(dist, 343_560.0, 5000.0)); // Within 5km
    }

    #[test]
    fn test_polyline_length_empty() {
        let empty: Vec<GeoPoint> = vec![];
        assert_eq!(polyline_length(&empty), 0.0);
    }

    #[test]
    fn test_polyline_length_single_point() {
        let single = vec![GeoPoint::new(51.5074, -0.1278)];
        assert_eq!(polyline_length(&single), 0.0);
    }

    #[test]
    fn test_polyline_length_two_points() {
        let path = vec![
            GeoPoint::new(51.5074, -0.1278),
            GeoPoint::new(51.5080, -0.1280),
        ];
        let length = polyline_length(&path);
        assert!(length > 0.0);
        assert!(length < 100.0); // Should be about 68m
    }

    #[test]
    fn test_project_onto_segment_midpoint() {
        let a = GeoPoint::new(51.500, -0.130);
        let b = GeoPoint::new(51.500, -0.120);
        let p = GeoPoint::new(51.501, -0.125);

        let (projected, t) = project_onto_segment(&p, &a, &b);
        assert!(approx_eq(t, 0.5, 0.001));
        assert!(approx_eq(projected.latitude, 51.500, 1e-9));
        assert!(approx_eq(projected.longitude, -0.125, 1e-9));
    }

    #[test]
    fn test_project_onto_segment_clamps_before_start() {
        let a = GeoPoint::new(51.500, -0.130);
        let b = GeoPoint::new(51.500, -0.120);
        let p = GeoPoint::new(51.500, -0.140); // beyond a

        let (projected, t) = project_onto_segment(&p, &a, &b);
        assert_eq!(t, 0.0);
        assert_eq!(projected, a);
    }

    #[test]
    fn test_project_onto_segment_clamps_past_end() {
        let a = GeoPoint::new(51.500, -0.130);
        let b = GeoPoint::new(51.500, -0.120);
        let p = GeoPoint::new(51.500, -0.110); // beyond b

        let (projected, t) = project_onto_segment(&p, &a, &b);
        assert_eq!(t, 1.0);
        assert_eq!(projected, b);
    }

    #[test]
    fn test_point_to_segment_distance_degenerate() {
        let a = GeoPoint::new(51.500, -0.130);
        let p = GeoPoint::new(51.501, -0.130);
        let dist = point_to_segment_distance(&p, &a, &a);
        assert!(approx_eq(dist, haversine_distance(&p, &a), 1e-9));
    }

    #[test]
    fn test_point_on_segment_distance_zero() {
        let a = GeoPoint::new(51.500, -0.130);
        let b = GeoPoint::new(51.500, -0.120);
        let p = GeoPoint::new(51.500, -0.125);
        assert!(point_to_segment_distance(&p, &a, &b) < 0.5);
    }

    #[test]
    fn test_interpolate_endpoints() {
        let a = GeoPoint::new(51.500, -0.130);
        let b = GeoPoint::new(51.510, -0.120);
        assert_eq!(interpolate(&a, &b, 0.0), a);
        assert_eq!(interpolate(&a, &b, 1.0), b);

        let mid = interpolate(&a, &b, 0.5);
        assert!(approx_eq(mid.latitude, 51.505, 1e-9));
        assert!(approx_eq(mid.longitude, -0.125, 1e-9));
    }

    #[test]
    fn test_initial_bearing_north() {
        let a = GeoPoint::new(51.500, -0.125);
        let b = GeoPoint::new(51.510, -0.125);
        let bearing = initial_bearing(&a, &b);
        assert!(approx_eq(bearing, 0.0, 1.0));
    }

    #[test]
    fn test_initial_bearing_east() {
        let a = GeoPoint::new(51.500, -0.130);
        let b = GeoPoint::new(51.500, -0.120);
        let bearing = initial_bearing(&a, &b);
        assert!(approx_eq(bearing, 90.0, 1.0));
    }

    #[test]
    fn test_initial_bearing_range() {
        let a = GeoPoint::new(51.510, -0.125);
        let b = GeoPoint::new(51.500, -0.126); // roughly south, slightly west
        let bearing = initial_bearing(&a, &b);
        assert!((0.0..360.0).contains(&bearing));
        assert!(bearing > 175.0 && bearing < 185.0);
    }
}

//! # Projection Engine
//!
//! Nearest-point-on-polyline projection.
//!
//! Projecting a free position (a GPS fix, a dragged checkpoint) onto the path is
//! the bridge between the map plane and the one-dimensional world of progress,
//! events and narration. The scan is linear over the path's edges, which is fine
//! for tour paths capped in the hundreds of vertices.

use crate::geo_utils::{haversine_distance, project_onto_segment};
use crate::GeoPoint;

/// Result of projecting a position onto a path.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Projection {
    /// Nearest point on the path.
    pub position: GeoPoint,
    /// Index of the edge the nearest point lies on (lower vertex index).
    pub edge_index: usize,
    /// Fraction along that edge, in `[0, 1]`.
    pub fraction: f64,
    /// Great-circle distance from the queried position to the path, in meters.
    pub distance_meters: f64,
}

/// Project a position onto the nearest edge of a path.
///
/// Every edge is considered with a clamped planar projection (see
/// [`crate::geo_utils::project_onto_segment`]) and the minimum great-circle
/// distance wins. Later edges win ties, so a position sitting exactly on a
/// shared vertex projects to the start of the outgoing edge, which is the
/// convention the event sequencer's ordering rules rely on.
///
/// Returns `None` if the path has fewer than 2 vertices.
///
/// # Example
///
/// ```rust
/// use tour_nav::{GeoPoint, project};
///
/// let path = vec![
///     GeoPoint::new(51.500, -0.1278),
///     GeoPoint::new(51.501, -0.1278),
///     GeoPoint::new(51.502, -0.1278),
/// ];
///
/// let fix = GeoPoint::new(51.5015, -0.1280);
/// let projection = project(&fix, &path).unwrap();
///
/// assert_eq!(projection.edge_index, 1);
/// assert!(projection.distance_meters < 20.0);
/// ```
pub fn project(point: &GeoPoint, path: &[GeoPoint]) -> Option<Projection> {
    if path.len() < 2 {
        return None;
    }

    let mut best: Option<Projection> = None;

    for (edge_index, w) in path.windows(2).enumerate() {
        let (position, fraction) = project_onto_segment(point, &w[0], &w[1]);
        let distance_meters = haversine_distance(point, &position);

        let closer = match &best {
            Some(current) => distance_meters <= current.distance_meters,
            None => true,
        };
        if closer {
            best = Some(Projection { position, edge_index, fraction, distance_meters });
        }
    }

    best
}

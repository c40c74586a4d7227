//! # Path Index
//!
//! Cumulative-distance table over a path polyline.
//!
//! A [`PathIndex`] converts between a traveler's progress fraction (0 at the start
//! of the route, 1 at the end) and a position on the path expressed as an edge
//! index plus a fraction along that edge. It backs live progress reporting,
//! preview scrubbing and the passed/remaining split shown on the map.
//!
//! Degenerate paths (empty or single vertex) are handled without errors: the
//! table collapses to `[0.0]` and every progress conversion returns the identity
//! result for a zero-length route.

use crate::geo_utils::{haversine_distance, interpolate};
use crate::GeoPoint;

/// Cumulative distances along a path.
///
/// Entry `i` is the distance in meters from the start of the path to vertex `i`.
/// The table is monotonically non-decreasing; the last entry is the total path
/// length.
///
/// # Example
///
/// ```rust
/// use tour_nav::{GeoPoint, PathIndex};
///
/// let path = vec![
///     GeoPoint::new(51.500, -0.1278),
///     GeoPoint::new(51.501, -0.1278),
///     GeoPoint::new(51.502, -0.1278),
/// ];
///
/// let index = PathIndex::from_path(&path);
/// assert_eq!(index.cumulative().len(), 3);
/// assert!(index.total_length() > 200.0); // ~111m per vertex step
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct PathIndex {
    cumulative: Vec<f64>,
}

impl PathIndex {
    /// Build the cumulative-distance table for a path.
    ///
    /// Empty and single-vertex paths yield the single-entry table `[0.0]`.
    pub fn from_path(points: &[GeoPoint]) -> Self {
        if points.len() < 2 {
            return Self { cumulative: vec![0.0] };
        }

        let mut cumulative = Vec::with_capacity(points.len());
        cumulative.push(0.0);
        for w in points.windows(2) {
            let last = *cumulative.last().unwrap_or(&0.0);
            cumulative.push(last + haversine_distance(&w[0], &w[1]));
        }

        Self { cumulative }
    }

    /// The cumulative-distance table, one entry per vertex.
    #[inline]
    pub fn cumulative(&self) -> &[f64] {
        &self.cumulative
    }

    /// Total path length in meters.
    #[inline]
    pub fn total_length(&self) -> f64 {
        *self.cumulative.last().unwrap_or(&0.0)
    }

    /// Length in meters of the edge starting at `edge_index`.
    ///
    /// Returns 0.0 for an out-of-range edge.
    pub fn edge_length(&self, edge_index: usize) -> f64 {
        match (self.cumulative.get(edge_index), self.cumulative.get(edge_index + 1)) {
            (Some(start), Some(end)) => end - start,
            _ => 0.0,
        }
    }

    /// Convert an on-path position (edge index + fraction along the edge) to a
    /// progress fraction in `[0, 1]`.
    ///
    /// A zero-length path yields 0.
    pub fn progress_from_projection(&self, edge_index: usize, fraction: f64) -> f64 {
        let total = self.total_length();
        if total <= 0.0 {
            return 0.0;
        }

        let start = match self.cumulative.get(edge_index) {
            Some(d) => *d,
            None => return 1.0,
        };
        let traveled = start + fraction.clamp(0.0, 1.0) * self.edge_length(edge_index);
        (traveled / total).clamp(0.0, 1.0)
    }

    /// Convert a progress fraction back to an on-path position.
    ///
    /// Inverse of [`progress_from_projection`](Self::progress_from_projection);
    /// used for scrubbing, simulation, and re-deriving a clamped position from a
    /// monotonic progress value. The returned fraction is relative to the edge's
    /// own length. A zero-length path yields `(0, 0.0)`.
    pub fn progress_to_projection(&self, progress: f64) -> (usize, f64) {
        let total = self.total_length();
        if total <= 0.0 || self.cumulative.len() < 2 {
            return (0, 0.0);
        }

        let target = progress.clamp(0.0, 1.0) * total;
        let last_edge = self.cumulative.len() - 2;

        for edge in 0..=last_edge {
            let end = self.cumulative[edge + 1];
            if target <= end || edge == last_edge {
                let length = self.edge_length(edge);
                let fraction = if length > 0.0 {
                    ((target - self.cumulative[edge]) / length).clamp(0.0, 1.0)
                } else {
                    0.0
                };
                return (edge, fraction);
            }
        }

        (last_edge, 1.0)
    }
}

/// Position on a path at a given progress fraction.
///
/// Pure scrubbing helper for preview and simulation UIs. Returns `None` for an
/// empty path; a single-vertex path returns that vertex for any progress.
pub fn interpolate_along_path(points: &[GeoPoint], progress: f64) -> Option<GeoPoint> {
    if points.is_empty() {
        return None;
    }
    if points.len() == 1 {
        return Some(points[0]);
    }

    let index = PathIndex::from_path(points);
    let (edge, fraction) = index.progress_to_projection(progress);
    Some(interpolate(&points[edge], &points[edge + 1], fraction))
}

/// Split a path at an on-path position into passed and remaining polylines.
///
/// Both halves include the interpolated split point, so rendering them end to
/// end reproduces the original path. Out-of-range edges are clamped to the last
/// edge. Paths with fewer than 2 vertices split into a full copy and an empty
/// remainder.
pub fn split_at(points: &[GeoPoint], edge_index: usize, fraction: f64) -> (Vec<GeoPoint>, Vec<GeoPoint>) {
    if points.len() < 2 {
        return (points.to_vec(), Vec::new());
    }

    let edge = edge_index.min(points.len() - 2);
    let split_point = interpolate(&points[edge], &points[edge + 1], fraction.clamp(0.0, 1.0));

    let mut passed: Vec<GeoPoint> = points[..=edge].to_vec();
    passed.push(split_point);

    let mut remaining = vec![split_point];
    remaining.extend_from_slice(&points[edge + 1..]);

    (passed, remaining)
}

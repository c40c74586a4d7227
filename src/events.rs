//! # Event Sequencer
//!
//! Deterministic ordering of tour content along a path.
//!
//! Narration, checkpoints, branch forks and the finish line are flattened into a
//! single ordered list of [`TourEvent`]s. Each event gets a `sort_key` of
//! `edge_index + offset` with the offset chosen so ordering is deterministic:
//!
//! - Segments sit at `edge + 0.01`: narration begins as soon as the edge starts,
//!   before any checkpoint on that edge is reached.
//! - Checkpoints sit at `edge + fraction` from their projection onto the path,
//!   with the fraction clamped to `[0.02, 0.99]` so a co-located segment on the
//!   same edge always precedes them.
//! - Forks sit at their anchor, `fork.path_index + fork.fraction`.
//! - The finish sorts last at `len(path)`.
//!
//! Each branch runs the same algorithm over its own path and collections and is
//! self-contained: its sequence ends with a merge event when a merge anchor
//! exists, and is selected by the consumer once the fork is reached.

use log::debug;

use crate::geo_utils::initial_bearing;
use crate::projection::project;
use crate::{vertex_positions, Branch, Checkpoint, Finish, Route, Segment, Vertex};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Offset on an edge where segment narration begins.
const SEGMENT_OFFSET: f64 = 0.01;

/// Checkpoint offsets are clamped to this range so they stay inside their edge
/// and always sort after a co-located segment.
const CHECKPOINT_MIN_OFFSET: f64 = 0.02;
const CHECKPOINT_MAX_OFFSET: f64 = 0.99;

/// Bearing difference below which a fork counts as straight ahead, in degrees.
const FORK_STRAIGHT_TOLERANCE: f64 = 20.0;

/// Which way a branch departs from its parent path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "ffi", derive(uniffi::Enum))]
pub enum ForkDirection {
    Left,
    Right,
    Straight,
}

/// One entry in a tour's ordered content sequence.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "ffi", derive(uniffi::Enum))]
pub enum TourEventKind {
    /// Narration for the edge starting at `path_index`.
    Segment { path_index: u32 },
    /// A checkpoint was reached.
    Checkpoint { checkpoint_id: String },
    /// A branch diverges here; its own sequence takes over if taken.
    Fork { branch_id: String, direction: ForkDirection },
    /// The branch rejoins its parent path.
    Merge { branch_id: String },
    /// End of the route.
    Finish,
}

/// An event with its position along the path.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct TourEvent {
    pub kind: TourEventKind,
    /// `edge_index + offset_on_edge`; the finish sorts last at `len(path)`.
    pub sort_key: f64,
}

/// Build the ordered event sequence for a route's main path.
///
/// Fork events are emitted for branches forked directly from the main path;
/// nested branches appear in their parent branch's sequence instead.
///
/// # Example
///
/// ```rust
/// use tour_nav::{build_route_events, Checkpoint, GeoPoint, Route, Segment, TourEventKind, Vertex};
///
/// let path: Vec<Vertex> = (0..6)
///     .map(|i| Vertex::at(GeoPoint::new(51.500 + i as f64 * 0.001, -0.1278)))
///     .collect();
/// let mut route = Route::new(path);
/// route.segments.push(Segment::with_text(3, "A quiet alley"));
///
/// let events = build_route_events(&route);
/// assert!(matches!(events[0].kind, TourEventKind::Segment { path_index: 3 }));
/// assert!((events[0].sort_key - 3.01).abs() < 1e-9);
/// ```
pub fn build_route_events(route: &Route) -> Vec<TourEvent> {
    let forks: Vec<&Branch> = route.branches.iter().filter(|b| b.parent_id.is_none()).collect();
    let events = build_events(
        &route.path,
        &route.checkpoints,
        &route.segments,
        route.finish.as_ref(),
        &forks,
    );
    debug!("sequenced {} events on main path", events.len());
    events
}

/// Build the ordered event sequence for one branch.
///
/// The branch's own path, checkpoints and segments are sequenced with the same
/// rules as the main path; a merge event is appended at the end when the branch
/// has a merge anchor. Returns `None` for an unknown branch id.
pub fn build_branch_events(route: &Route, branch_id: &str) -> Option<Vec<TourEvent>> {
    let branch = route.branch(branch_id)?;
    let forks: Vec<&Branch> = route
        .branches
        .iter()
        .filter(|b| b.parent_id.as_deref() == Some(branch_id))
        .collect();

    let mut events = build_events(&branch.path, &branch.checkpoints, &branch.segments, None, &forks);

    if branch.merge.is_some() {
        events.push(TourEvent {
            kind: TourEventKind::Merge { branch_id: branch.id.clone() },
            sort_key: branch.path.len() as f64,
        });
    }

    debug!("sequenced {} events on branch {}", events.len(), branch_id);
    Some(events)
}

fn build_events(
    path: &[Vertex],
    checkpoints: &[Checkpoint],
    segments: &[Segment],
    finish: Option<&Finish>,
    forks: &[&Branch],
) -> Vec<TourEvent> {
    let positions = vertex_positions(path);
    let mut events = Vec::new();

    for segment in segments {
        events.push(TourEvent {
            kind: TourEventKind::Segment { path_index: segment.path_index },
            sort_key: segment.path_index as f64 + SEGMENT_OFFSET,
        });
    }

    for checkpoint in checkpoints {
        // Checkpoints on a degenerate path have no edge to sort onto
        if let Some(projection) = project(&checkpoint.position, &positions) {
            let offset = projection.fraction.clamp(CHECKPOINT_MIN_OFFSET, CHECKPOINT_MAX_OFFSET);
            events.push(TourEvent {
                kind: TourEventKind::Checkpoint { checkpoint_id: checkpoint.id.clone() },
                sort_key: projection.edge_index as f64 + offset,
            });
        }
    }

    for branch in forks {
        events.push(TourEvent {
            kind: TourEventKind::Fork {
                branch_id: branch.id.clone(),
                direction: classify_fork_direction(path, branch),
            },
            sort_key: branch.fork.path_index as f64 + branch.fork.fraction,
        });
    }

    // Stable sort: insertion order breaks ties
    events.sort_by(|a, b| a.sort_key.partial_cmp(&b.sort_key).unwrap_or(std::cmp::Ordering::Equal));

    if finish.is_some() {
        events.push(TourEvent { kind: TourEventKind::Finish, sort_key: path.len() as f64 });
    }

    events
}

/// Classify which way a branch departs from its parent.
///
/// Compares the parent edge's bearing at the fork anchor with the bearing of the
/// branch's first edge. Degenerate geometry (missing edges) counts as straight.
fn classify_fork_direction(parent_path: &[Vertex], branch: &Branch) -> ForkDirection {
    let edge = branch.fork.path_index as usize;
    let (Some(a), Some(b)) = (parent_path.get(edge), parent_path.get(edge + 1)) else {
        return ForkDirection::Straight;
    };
    let (Some(ba), Some(bb)) = (branch.path.first(), branch.path.get(1)) else {
        return ForkDirection::Straight;
    };

    let parent_bearing = initial_bearing(&a.position, &b.position);
    let branch_bearing = initial_bearing(&ba.position, &bb.position);

    // Signed difference in (-180, 180]
    let delta = (branch_bearing - parent_bearing + 540.0).rem_euclid(360.0) - 180.0;

    if delta.abs() <= FORK_STRAIGHT_TOLERANCE {
        ForkDirection::Straight
    } else if delta < 0.0 {
        ForkDirection::Left
    } else {
        ForkDirection::Right
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo_utils::interpolate;
    use crate::{BranchAnchor, GeoPoint};

    fn northbound_path(n: usize) -> Vec<Vertex> {
        (0..n)
            .map(|i| Vertex::at(GeoPoint::new(51.500 + i as f64 * 0.001, -0.1278)))
            .collect()
    }

    fn branch_from(id: &str, parent_id: Option<&str>, fork: BranchAnchor, path: Vec<Vertex>) -> Branch {
        Branch {
            id: id.to_string(),
            parent_id: parent_id.map(str::to_string),
            fork,
            merge: None,
            path,
            checkpoints: Vec::new(),
            segments: Vec::new(),
        }
    }

    #[test]
    fn test_segment_precedes_checkpoint_on_same_edge() {
        let path = northbound_path(6);
        let mut route = Route::new(path.clone());
        route.segments.push(Segment::with_text(3, "narration"));

        // Checkpoint projecting at fraction 0.3 on edge 3
        let on_edge = interpolate(&path[3].position, &path[4].position, 0.3);
        route.checkpoints.push(Checkpoint::new("cp-1", "stop", on_edge));

        let events = build_route_events(&route);
        assert_eq!(events.len(), 2);
        assert!(matches!(events[0].kind, TourEventKind::Segment { path_index: 3 }));
        assert!((events[0].sort_key - 3.01).abs() < 1e-9);
        assert!(matches!(events[1].kind, TourEventKind::Checkpoint { .. }));
        assert!((events[1].sort_key - 3.3).abs() < 0.01);
    }

    #[test]
    fn test_checkpoint_offset_floored_at_vertex() {
        let path = northbound_path(4);
        let mut route = Route::new(path.clone());
        route.segments.push(Segment::with_text(2, "narration"));
        // Checkpoint exactly on vertex 2: projection fraction would be 0
        route.checkpoints.push(Checkpoint::new("cp-1", "stop", path[2].position));

        let events = build_route_events(&route);
        let checkpoint = events
            .iter()
            .find(|e| matches!(e.kind, TourEventKind::Checkpoint { .. }))
            .unwrap();
        let segment = events
            .iter()
            .find(|e| matches!(e.kind, TourEventKind::Segment { .. }))
            .unwrap();

        assert!((checkpoint.sort_key - 2.02).abs() < 1e-9);
        assert!(segment.sort_key < checkpoint.sort_key);
    }

    #[test]
    fn test_finish_sorts_last() {
        let path = northbound_path(4);
        let last = path.last().unwrap().position;
        let mut route = Route::new(path);
        route.segments.push(Segment::with_text(2, "late narration"));
        route.finish_index = Some(3);
        route.finish = Some(Finish { position: last, path_index: 3, coins_reward: 50 });

        let events = build_route_events(&route);
        assert!(matches!(events.last().unwrap().kind, TourEventKind::Finish));
        assert_eq!(events.last().unwrap().sort_key, 4.0);
    }

    #[test]
    fn test_fork_sorted_by_anchor() {
        let path = northbound_path(5);
        let mut route = Route::new(path);
        route.segments.push(Segment::with_text(1, "before the fork"));
        route.segments.push(Segment::with_text(3, "after the fork"));
        route.branches.push(branch_from(
            "b-1",
            None,
            BranchAnchor { path_index: 2, fraction: 0.4 },
            vec![
                Vertex::at(GeoPoint::new(51.5024, -0.1278)),
                Vertex::at(GeoPoint::new(51.5024, -0.1290)),
            ],
        ));

        let events = build_route_events(&route);
        let kinds: Vec<&TourEventKind> = events.iter().map(|e| &e.kind).collect();
        assert!(matches!(kinds[0], TourEventKind::Segment { path_index: 1 }));
        assert!(matches!(kinds[1], TourEventKind::Fork { .. }));
        assert!(matches!(kinds[2], TourEventKind::Segment { path_index: 3 }));
    }

    #[test]
    fn test_fork_direction_left_and_right() {
        // Parent heads north; branch west is a left fork, branch east a right fork
        let path = northbound_path(4);
        let mut route = Route::new(path);
        route.branches.push(branch_from(
            "west",
            None,
            BranchAnchor { path_index: 1, fraction: 0.0 },
            vec![
                Vertex::at(GeoPoint::new(51.501, -0.1278)),
                Vertex::at(GeoPoint::new(51.501, -0.1300)),
            ],
        ));
        route.branches.push(branch_from(
            "east",
            None,
            BranchAnchor { path_index: 2, fraction: 0.0 },
            vec![
                Vertex::at(GeoPoint::new(51.502, -0.1278)),
                Vertex::at(GeoPoint::new(51.502, -0.1250)),
            ],
        ));

        let events = build_route_events(&route);
        let directions: Vec<ForkDirection> = events
            .iter()
            .filter_map(|e| match &e.kind {
                TourEventKind::Fork { direction, .. } => Some(*direction),
                _ => None,
            })
            .collect();
        assert_eq!(directions, vec![ForkDirection::Left, ForkDirection::Right]);
    }

    #[test]
    fn test_branch_sequence_self_contained_with_merge_last() {
        let path = northbound_path(4);
        let mut route = Route::new(path);

        let mut branch = branch_from(
            "b-1",
            None,
            BranchAnchor { path_index: 1, fraction: 0.5 },
            northbound_path(3),
        );
        branch.merge = Some(BranchAnchor { path_index: 2, fraction: 0.5 });
        branch.segments.push(Segment::with_text(1, "detour narration"));
        branch
            .checkpoints
            .push(Checkpoint::new("cp-b", "detour stop", branch.path[1].position));
        route.branches.push(branch);

        let events = build_branch_events(&route, "b-1").unwrap();
        assert_eq!(events.len(), 3);
        // Segment narrates at 1.01; the vertex-bound checkpoint floors to 1.02
        assert!(matches!(events[0].kind, TourEventKind::Segment { path_index: 1 }));
        assert!(matches!(events[1].kind, TourEventKind::Checkpoint { .. }));
        assert!(events[0].sort_key < events[1].sort_key);
        assert!(matches!(events.last().unwrap().kind, TourEventKind::Merge { .. }));
        assert_eq!(events.last().unwrap().sort_key, 3.0);

        // The main sequence does not contain the branch's events
        let main_events = build_route_events(&route);
        assert!(main_events
            .iter()
            .all(|e| !matches!(e.kind, TourEventKind::Merge { .. })));
    }

    #[test]
    fn test_unknown_branch() {
        let route = Route::new(northbound_path(3));
        assert!(build_branch_events(&route, "missing").is_none());
    }
}

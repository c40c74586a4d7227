//! # Path Topology Editor
//!
//! Atomic mutation operations over a [`Route`].
//!
//! Several collections reference path vertices and edges by index: segments,
//! bound checkpoints, start/finish markers and branch anchors. Any operation
//! that changes the vertex count must renumber all of them in the same call, so
//! a dangling path index cannot be constructed through this API. Every
//! operation either fully applies or returns an [`EditError`] with no mutation.
//!
//! Operations target either the main path or a branch's path through
//! [`EditScope`]; index shifts cover the scoped collections plus the fork/merge
//! anchors of branches parented on the edited path.
//!
//! A bounded undo stack keeps full-state snapshots taken immediately before
//! each accepted mutation; the oldest snapshots are discarded once the capacity
//! is reached.

use std::collections::VecDeque;

use log::debug;
use thiserror::Error;

use crate::geo_utils::haversine_distance;
use crate::projection::project;
use crate::{vertex_positions, Branch, Checkpoint, GeoPoint, Route, Vertex};

/// Maximum number of undo snapshots retained.
const UNDO_CAPACITY: usize = 32;

/// Dividers within this distance of a merged vertex lose their divider flag.
const DIVIDER_CLEAR_RADIUS_METERS: f64 = 10.0;

/// Projections inside this band of an edge endpoint bind to the existing
/// vertex instead of inserting a new one.
const ENDPOINT_FRACTION: f64 = 0.01;

/// Which path an editing operation targets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditScope {
    /// The route's main path.
    Main,
    /// The path of the branch with this id.
    Branch(String),
}

/// A rejected editing operation. The route is untouched when one is returned.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EditError {
    #[error("vertex index {index} out of bounds for a path of {len} vertices")]
    OutOfBounds { index: usize, len: usize },
    #[error("vertex index {0} is not interior")]
    NotInterior(usize),
    #[error("merge rejected: both adjacent edges carry content")]
    MergeWouldDiscardContent,
    #[error("unknown checkpoint id {0}")]
    UnknownCheckpoint(String),
    #[error("unknown branch id {0}")]
    UnknownBranch(String),
    #[error("path has fewer than 2 vertices")]
    PathTooShort,
}

/// Editor owning a [`Route`] and its undo history.
///
/// # Example
///
/// ```rust
/// use tour_nav::{EditScope, GeoPoint, Route, RouteEditor, Vertex};
///
/// let route = Route::new(vec![
///     Vertex::at(GeoPoint::new(51.500, -0.1278)),
///     Vertex::at(GeoPoint::new(51.502, -0.1278)),
/// ]);
///
/// let mut editor = RouteEditor::new(route);
/// editor
///     .insert_vertex(&EditScope::Main, 1, GeoPoint::new(51.501, -0.1278))
///     .unwrap();
/// assert_eq!(editor.route().path.len(), 3);
///
/// editor.undo();
/// assert_eq!(editor.route().path.len(), 2);
/// ```
#[derive(Debug, Clone)]
pub struct RouteEditor {
    route: Route,
    undo_stack: VecDeque<Route>,
}

impl RouteEditor {
    pub fn new(route: Route) -> Self {
        Self { route, undo_stack: VecDeque::new() }
    }

    /// The current route state.
    pub fn route(&self) -> &Route {
        &self.route
    }

    /// Consume the editor, returning the edited route.
    pub fn into_route(self) -> Route {
        self.route
    }

    /// Restore the route state from before the most recent accepted mutation.
    ///
    /// Returns `false` when there is nothing to undo.
    pub fn undo(&mut self) -> bool {
        match self.undo_stack.pop_back() {
            Some(previous) => {
                self.route = previous;
                true
            }
            None => false,
        }
    }

    /// Splice a vertex into the scoped path at `index`.
    ///
    /// Every dependent path-index reference at or after `index` is incremented:
    /// scoped segments and bound checkpoints, the main path's start/finish
    /// markers, and fork/merge anchors of branches parented on the scoped path.
    pub fn insert_vertex(
        &mut self,
        scope: &EditScope,
        index: usize,
        point: GeoPoint,
    ) -> Result<(), EditError> {
        let len = self.scoped_path_len(scope)?;
        if index > len {
            return Err(EditError::OutOfBounds { index, len });
        }

        self.push_snapshot();
        insert_and_shift(&mut self.route, scope, index, Vertex::at(point));
        debug!("inserted vertex {index} ({scope:?})");
        Ok(())
    }

    /// Remove the vertex at `index` from the scoped path.
    ///
    /// Segments anchored on either adjacent edge are dropped, checkpoints bound
    /// exactly to the vertex are deleted, and a start/finish marker on the
    /// vertex is cleared (the finish payload becomes `None`). All remaining
    /// references after the vertex are decremented; anchors of child branches
    /// on either adjacent edge re-anchor to the surviving edge.
    pub fn delete_vertex(&mut self, scope: &EditScope, index: usize) -> Result<(), EditError> {
        let len = self.scoped_path_len(scope)?;
        if index >= len {
            return Err(EditError::OutOfBounds { index, len });
        }

        self.push_snapshot();

        let path = scoped_path_mut(&mut self.route, scope).expect("scope validated");
        path.remove(index);
        let new_len = path.len();

        let segments = scoped_segments_mut(&mut self.route, scope).expect("scope validated");
        segments.retain(|s| {
            let edge = s.path_index as usize;
            edge + 1 != index && edge != index
        });
        for segment in segments.iter_mut() {
            if segment.path_index as usize > index {
                segment.path_index -= 1;
            }
        }

        let checkpoints = scoped_checkpoints_mut(&mut self.route, scope).expect("scope validated");
        checkpoints.retain(|c| c.bound_to_path_index != Some(index as u32));
        for checkpoint in checkpoints.iter_mut() {
            if let Some(bound) = checkpoint.bound_to_path_index {
                if bound as usize > index {
                    checkpoint.bound_to_path_index = Some(bound - 1);
                }
            }
        }

        if *scope == EditScope::Main {
            match self.route.start_index.map(|i| i as usize) {
                Some(start) if start == index => self.route.start_index = None,
                Some(start) if start > index => self.route.start_index = Some(start as u32 - 1),
                _ => {}
            }
            match self.route.finish_index.map(|i| i as usize) {
                Some(finish) if finish == index => {
                    self.route.finish_index = None;
                    self.route.finish = None;
                }
                Some(finish) if finish > index => {
                    self.route.finish_index = Some(finish as u32 - 1);
                    if let Some(payload) = self.route.finish.as_mut() {
                        payload.path_index = finish as u32 - 1;
                    }
                }
                _ => {}
            }
        }

        let max_edge = new_len.saturating_sub(2) as u32;
        for branch in child_branches_mut(&mut self.route, scope) {
            reanchor_after_delete(&mut branch.fork, index, max_edge);
            if let Some(merge) = branch.merge.as_mut() {
                reanchor_after_delete(merge, index, max_edge);
            }
        }

        debug!("deleted vertex {index} ({scope:?})");
        Ok(())
    }

    /// Merge the narrative stretches meeting at an interior vertex.
    ///
    /// The two adjacent edges' segments are inspected for authored content.
    /// Both carrying content is rejected; content is never silently discarded.
    /// Otherwise the surviving content (if any) is canonicalized onto the
    /// earlier edge and the vertex becomes a pass-through junction
    /// (`is_merged`); the geometry is unchanged. Divider checkpoints within
    /// 10 m of the merge point lose their divider flag, since the physical
    /// split they marked is gone.
    pub fn merge_at_vertex(&mut self, scope: &EditScope, index: usize) -> Result<(), EditError> {
        let len = self.scoped_path_len(scope)?;
        if index >= len {
            return Err(EditError::OutOfBounds { index, len });
        }
        if index == 0 || index + 1 == len {
            return Err(EditError::NotInterior(index));
        }

        let earlier_edge = (index - 1) as u32;
        let later_edge = index as u32;

        let segments = scoped_segments(&self.route, scope).expect("scope validated");
        let earlier_has_content = segments
            .iter()
            .any(|s| s.path_index == earlier_edge && s.has_content());
        let later_has_content = segments
            .iter()
            .any(|s| s.path_index == later_edge && s.has_content());

        if earlier_has_content && later_has_content {
            return Err(EditError::MergeWouldDiscardContent);
        }

        self.push_snapshot();

        let segments = scoped_segments_mut(&mut self.route, scope).expect("scope validated");
        if later_has_content {
            // Keep the later edge's content, canonicalized onto the earlier edge
            segments.retain(|s| s.path_index != earlier_edge);
            for segment in segments.iter_mut() {
                if segment.path_index == later_edge {
                    segment.path_index = earlier_edge;
                }
            }
        } else if earlier_has_content {
            segments.retain(|s| s.path_index != later_edge);
        } else {
            segments.retain(|s| s.path_index != earlier_edge && s.path_index != later_edge);
        }

        let path = scoped_path_mut(&mut self.route, scope).expect("scope validated");
        path[index].is_merged = true;
        let merge_point = path[index].position;

        let checkpoints = scoped_checkpoints_mut(&mut self.route, scope).expect("scope validated");
        for checkpoint in checkpoints.iter_mut() {
            if checkpoint.is_divider
                && haversine_distance(&checkpoint.position, &merge_point)
                    <= DIVIDER_CLEAR_RADIUS_METERS
            {
                checkpoint.is_divider = false;
            }
        }

        debug!("merged segments at vertex {index} ({scope:?})");
        Ok(())
    }

    /// Enable or disable a checkpoint's divider flag.
    ///
    /// Enabling requires the checkpoint to coincide with a path vertex, since a
    /// divider is a physical split of the path rather than a cosmetic flag. A
    /// checkpoint not already bound to a vertex is projected onto its path: a
    /// strictly interior projection inserts a vertex there (sharing the same
    /// index-shift logic as [`insert_vertex`](Self::insert_vertex)) and binds
    /// the checkpoint to it; a projection at an edge endpoint binds to the
    /// existing endpoint vertex with no path mutation.
    pub fn set_divider(&mut self, checkpoint_id: &str, enabled: bool) -> Result<(), EditError> {
        let (scope, checkpoint_index) = self
            .locate_checkpoint(checkpoint_id)
            .ok_or_else(|| EditError::UnknownCheckpoint(checkpoint_id.to_string()))?;

        if !enabled {
            self.push_snapshot();
            let checkpoints = scoped_checkpoints_mut(&mut self.route, &scope).expect("scope located");
            checkpoints[checkpoint_index].is_divider = false;
            return Ok(());
        }

        let checkpoints = scoped_checkpoints(&self.route, &scope).expect("scope located");
        let checkpoint = &checkpoints[checkpoint_index];

        if checkpoint.bound_to_path_index.is_some() {
            self.push_snapshot();
            let checkpoints = scoped_checkpoints_mut(&mut self.route, &scope).expect("scope located");
            checkpoints[checkpoint_index].is_divider = true;
            debug!("divider enabled on already-bound checkpoint {checkpoint_id}");
            return Ok(());
        }

        let positions = vertex_positions(scoped_path(&self.route, &scope).expect("scope located"));
        let projection = project(&checkpoint.position, &positions).ok_or(EditError::PathTooShort)?;

        self.push_snapshot();

        let interior = projection.fraction > ENDPOINT_FRACTION
            && projection.fraction < 1.0 - ENDPOINT_FRACTION;
        let vertex_index = if interior {
            let insert_at = projection.edge_index + 1;
            insert_and_shift(&mut self.route, &scope, insert_at, Vertex::at(projection.position));
            insert_at
        } else if projection.fraction <= ENDPOINT_FRACTION {
            projection.edge_index
        } else {
            projection.edge_index + 1
        };

        let vertex_position = scoped_path(&self.route, &scope).expect("scope located")[vertex_index].position;
        let checkpoints = scoped_checkpoints_mut(&mut self.route, &scope).expect("scope located");
        let checkpoint = &mut checkpoints[checkpoint_index];
        checkpoint.bound_to_path_index = Some(vertex_index as u32);
        checkpoint.position = vertex_position;
        checkpoint.is_divider = true;

        debug!(
            "divider enabled on checkpoint {checkpoint_id} at vertex {vertex_index} (inserted: {interior})"
        );
        Ok(())
    }

    /// Move a vertex in place.
    ///
    /// Checkpoints bound to the vertex move with it, and the finish payload's
    /// position follows the finish vertex. No index shifting is needed.
    pub fn drag_vertex(
        &mut self,
        scope: &EditScope,
        index: usize,
        new_position: GeoPoint,
    ) -> Result<(), EditError> {
        let len = self.scoped_path_len(scope)?;
        if index >= len {
            return Err(EditError::OutOfBounds { index, len });
        }

        self.push_snapshot();

        let path = scoped_path_mut(&mut self.route, scope).expect("scope validated");
        path[index].position = new_position;

        let checkpoints = scoped_checkpoints_mut(&mut self.route, scope).expect("scope validated");
        for checkpoint in checkpoints.iter_mut() {
            if checkpoint.bound_to_path_index == Some(index as u32) {
                checkpoint.position = new_position;
            }
        }

        if *scope == EditScope::Main && self.route.finish_index == Some(index as u32) {
            if let Some(finish) = self.route.finish.as_mut() {
                finish.position = new_position;
            }
        }

        Ok(())
    }

    fn scoped_path_len(&self, scope: &EditScope) -> Result<usize, EditError> {
        scoped_path(&self.route, scope)
            .map(|p| p.len())
            .ok_or_else(|| match scope {
                EditScope::Branch(id) => EditError::UnknownBranch(id.clone()),
                EditScope::Main => unreachable!("main path always exists"),
            })
    }

    fn locate_checkpoint(&self, checkpoint_id: &str) -> Option<(EditScope, usize)> {
        if let Some(i) = self.route.checkpoints.iter().position(|c| c.id == checkpoint_id) {
            return Some((EditScope::Main, i));
        }
        for branch in &self.route.branches {
            if let Some(i) = branch.checkpoints.iter().position(|c| c.id == checkpoint_id) {
                return Some((EditScope::Branch(branch.id.clone()), i));
            }
        }
        None
    }

    fn push_snapshot(&mut self) {
        if self.undo_stack.len() == UNDO_CAPACITY {
            self.undo_stack.pop_front();
        }
        self.undo_stack.push_back(self.route.clone());
    }
}

// ============================================================================
// Scope resolution & shift helpers
// ============================================================================

fn scoped_path<'a>(route: &'a Route, scope: &EditScope) -> Option<&'a Vec<Vertex>> {
    match scope {
        EditScope::Main => Some(&route.path),
        EditScope::Branch(id) => route.branches.iter().find(|b| &b.id == id).map(|b| &b.path),
    }
}

fn scoped_path_mut<'a>(route: &'a mut Route, scope: &EditScope) -> Option<&'a mut Vec<Vertex>> {
    match scope {
        EditScope::Main => Some(&mut route.path),
        EditScope::Branch(id) => route
            .branches
            .iter_mut()
            .find(|b| &b.id == id)
            .map(|b| &mut b.path),
    }
}

fn scoped_segments<'a>(route: &'a Route, scope: &EditScope) -> Option<&'a Vec<crate::Segment>> {
    match scope {
        EditScope::Main => Some(&route.segments),
        EditScope::Branch(id) => route.branches.iter().find(|b| &b.id == id).map(|b| &b.segments),
    }
}

fn scoped_segments_mut<'a>(
    route: &'a mut Route,
    scope: &EditScope,
) -> Option<&'a mut Vec<crate::Segment>> {
    match scope {
        EditScope::Main => Some(&mut route.segments),
        EditScope::Branch(id) => route
            .branches
            .iter_mut()
            .find(|b| &b.id == id)
            .map(|b| &mut b.segments),
    }
}

fn scoped_checkpoints<'a>(route: &'a Route, scope: &EditScope) -> Option<&'a Vec<Checkpoint>> {
    match scope {
        EditScope::Main => Some(&route.checkpoints),
        EditScope::Branch(id) => route.branches.iter().find(|b| &b.id == id).map(|b| &b.checkpoints),
    }
}

fn scoped_checkpoints_mut<'a>(
    route: &'a mut Route,
    scope: &EditScope,
) -> Option<&'a mut Vec<Checkpoint>> {
    match scope {
        EditScope::Main => Some(&mut route.checkpoints),
        EditScope::Branch(id) => route
            .branches
            .iter_mut()
            .find(|b| &b.id == id)
            .map(|b| &mut b.checkpoints),
    }
}

fn child_branches_mut<'a>(
    route: &'a mut Route,
    scope: &EditScope,
) -> impl Iterator<Item = &'a mut Branch> {
    let scope = scope.clone();
    route.branches.iter_mut().filter(move |b| match &scope {
        EditScope::Main => b.parent_id.is_none(),
        EditScope::Branch(id) => b.parent_id.as_deref() == Some(id.as_str()),
    })
}

/// Splice a vertex into the scoped path and renumber every dependent
/// path-index reference at or after the insertion point.
///
/// Shared by `insert_vertex` and the divider-binding path of `set_divider`, so
/// both shift references identically.
fn insert_and_shift(route: &mut Route, scope: &EditScope, index: usize, vertex: Vertex) {
    let path = scoped_path_mut(route, scope).expect("scope validated by caller");
    path.insert(index, vertex);

    let index = index as u32;

    let segments = scoped_segments_mut(route, scope).expect("scope validated by caller");
    for segment in segments.iter_mut() {
        if segment.path_index >= index {
            segment.path_index += 1;
        }
    }

    let checkpoints = scoped_checkpoints_mut(route, scope).expect("scope validated by caller");
    for checkpoint in checkpoints.iter_mut() {
        if let Some(bound) = checkpoint.bound_to_path_index {
            if bound >= index {
                checkpoint.bound_to_path_index = Some(bound + 1);
            }
        }
    }

    if *scope == EditScope::Main {
        if let Some(start) = route.start_index {
            if start >= index {
                route.start_index = Some(start + 1);
            }
        }
        if let Some(finish) = route.finish_index {
            if finish >= index {
                route.finish_index = Some(finish + 1);
                if let Some(payload) = route.finish.as_mut() {
                    payload.path_index = finish + 1;
                }
            }
        }
    }

    for branch in child_branches_mut(route, scope) {
        if branch.fork.path_index >= index {
            branch.fork.path_index += 1;
        }
        if let Some(merge) = branch.merge.as_mut() {
            if merge.path_index >= index {
                merge.path_index += 1;
            }
        }
    }
}

/// Renumber a branch anchor after a vertex deletion.
///
/// Anchors on either adjacent edge land on the surviving fused edge; anchors
/// past the vertex decrement. The result is clamped to the shrunken path's
/// edge range.
fn reanchor_after_delete(anchor: &mut crate::BranchAnchor, index: usize, max_edge: u32) {
    let edge = anchor.path_index as usize;
    if edge + 1 == index || edge == index {
        anchor.path_index = index.saturating_sub(1) as u32;
    } else if edge > index {
        anchor.path_index -= 1;
    }
    anchor.path_index = anchor.path_index.min(max_edge);
}

// ============================================================================
// Tests
// ============================================================================

//! # Tour Nav
//!
//! Path and navigation engine for guided walking tours.
//!
//! This library provides:
//! - The route data model: a polyline path annotated with checkpoints, narrative
//!   segments, an optional branching alternate path and a finish line
//! - Deterministic ordering of tour content along a (possibly branching) path
//! - Topology editing that keeps every index-based reference consistent
//! - A live navigation session turning noisy GPS fixes into monotonic progress
//!   and one-shot content triggers
//!
//! ## Features
//!
//! - **`serde`** - Enable serde derives on the route model
//! - **`ffi`** - Enable FFI bindings for mobile platforms (iOS/Android)
//! - **`full`** - Enable all features
//!
//! ## Quick Start
//!
//! ```rust
//! use tour_nav::{
//!     build_route_events, Checkpoint, GeoPoint, NavigationSession, RawFix, Route,
//!     SessionConfig, Vertex,
//! };
//!
//! // A short route going north, with one checkpoint halfway
//! let path: Vec<Vertex> = (0..4)
//!     .map(|i| Vertex::at(GeoPoint::new(51.500 + i as f64 * 0.001, -0.1278)))
//!     .collect();
//!
//! let mut route = Route::new(path);
//! route.checkpoints.push(Checkpoint::new("cp-1", "Fountain", GeoPoint::new(51.5015, -0.1278)));
//!
//! // Preview: the ordered event list
//! let events = build_route_events(&route);
//! assert_eq!(events.len(), 1);
//!
//! // Travel: feed fixes into a session
//! let mut session = NavigationSession::from_route(&route, SessionConfig::default());
//! session.start();
//! let update = session.advance(&RawFix::new(51.5015, -0.1278, 5.0));
//! assert!(update.triggered_checkpoint.is_some());
//! ```

use crate::geo_utils::haversine_distance;

pub mod editor;
pub mod events;
pub mod geo_utils;
pub mod path_index;
pub mod projection;
pub mod session;

pub use editor::{EditError, EditScope, RouteEditor};
pub use events::{build_branch_events, build_route_events, ForkDirection, TourEvent, TourEventKind};
pub use path_index::{interpolate_along_path, split_at, PathIndex};
pub use projection::{project, Projection};
pub use session::{
    LocationProvider, NavigationSession, ProviderStatus, RawFix, SessionConfig, SessionSnapshot,
    SessionState, SessionUpdate, TourHooks, TourTracker, WakeLock,
};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

#[cfg(feature = "ffi")]
uniffi::setup_scaffolding!();

/// Initialize logging for Android (only used in FFI)
#[cfg(all(feature = "ffi", target_os = "android"))]
fn init_logging() {
    use android_logger::Config;
    use log::LevelFilter;

    android_logger::init_once(
        Config::default()
            .with_max_level(LevelFilter::Debug)
            .with_tag("TourNavRust"),
    );
}

#[cfg(all(feature = "ffi", not(target_os = "android")))]
fn init_logging() {
    // No-op on non-Android platforms
}

// ============================================================================
// Core Types
// ============================================================================

/// Default trigger radius for a checkpoint, in meters.
pub const DEFAULT_TRIGGER_RADIUS_METERS: f64 = 20.0;

/// A geographic coordinate with latitude and longitude.
///
/// # Example
/// ```
/// use tour_nav::GeoPoint;
/// let point = GeoPoint::new(51.5074, -0.1278); // London
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    /// Create a new geographic point.
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }

    /// Check if the point has valid coordinates.
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && self.latitude >= -90.0
            && self.latitude <= 90.0
            && self.longitude >= -180.0
            && self.longitude <= 180.0
    }
}

/// A single vertex of a path polyline.
///
/// The span between two consecutive vertices is an edge, referenced everywhere
/// by the index of its lower vertex (the "path index").
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct Vertex {
    pub position: GeoPoint,
    /// Marks a fork point where a branch diverges.
    pub is_junction: bool,
    /// Marks a pass-through vertex left behind by a segment merge.
    pub is_merged: bool,
}

impl Vertex {
    /// A plain vertex at a position, with no flags set.
    pub fn at(position: GeoPoint) -> Self {
        Self { position, is_junction: false, is_merged: false }
    }
}

/// An authored point of interest with a trigger radius and optional coin reward.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct Checkpoint {
    pub id: String,
    pub title: String,
    pub position: GeoPoint,
    /// Radius within which a raw fix triggers this checkpoint, in meters.
    pub trigger_radius_meters: f64,
    pub coins_reward: u32,
    /// Authored presentation order.
    pub order: u32,
    /// When pinned to a path vertex, the vertex index. A bound checkpoint's
    /// position always equals its bound vertex's position.
    pub bound_to_path_index: Option<u32>,
    /// A divider physically splits the path at its location.
    pub is_divider: bool,
    /// True when the checkpoint carries no authored content.
    pub is_empty: bool,
}

impl Checkpoint {
    /// Create a checkpoint with the default trigger radius and no reward.
    pub fn new(id: &str, title: &str, position: GeoPoint) -> Self {
        Self {
            id: id.to_string(),
            title: title.to_string(),
            position,
            trigger_radius_meters: DEFAULT_TRIGGER_RADIUS_METERS,
            coins_reward: 0,
            order: 0,
            bound_to_path_index: None,
            is_divider: false,
            is_empty: true,
        }
    }
}

/// Authored narrative content attached to a specific path edge.
///
/// A segment exists only if it carries content; empty segments are not
/// persisted.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct Segment {
    /// Edge this segment narrates, as the lower vertex index.
    pub path_index: u32,
    pub title: String,
    pub text: String,
    pub photos: Vec<String>,
    pub audio: Option<String>,
}

impl Segment {
    /// A text-only segment on an edge.
    pub fn with_text(path_index: u32, text: &str) -> Self {
        Self {
            path_index,
            title: String::new(),
            text: text.to_string(),
            photos: Vec::new(),
            audio: None,
        }
    }

    /// True if any authored field is non-empty.
    pub fn has_content(&self) -> bool {
        !self.title.is_empty()
            || !self.text.is_empty()
            || !self.photos.is_empty()
            || self.audio.is_some()
    }
}

/// Anchor tying a branch to a position on its parent path.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct BranchAnchor {
    /// Edge of the parent path the anchor sits on.
    pub path_index: u32,
    /// Fraction along that edge, in `[0, 1)`.
    pub fraction: f64,
}

/// An alternate path diverging from a parent path at a fork anchor, optionally
/// rejoining at a merge anchor.
///
/// Branches form a forest rooted at the main path: `parent_id` is `None` for
/// branches forked from the main path, or another branch's id.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct Branch {
    pub id: String,
    pub parent_id: Option<String>,
    pub fork: BranchAnchor,
    pub merge: Option<BranchAnchor>,
    pub path: Vec<Vertex>,
    pub checkpoints: Vec<Checkpoint>,
    pub segments: Vec<Segment>,
}

/// The finish line of a path, with its reward.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct Finish {
    pub position: GeoPoint,
    /// Vertex index the finish sits on.
    pub path_index: u32,
    pub coins_reward: u32,
}

/// The route aggregate: a path with its annotations, supplied by a persistence
/// layer and mutated through [`RouteEditor`].
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct Route {
    pub path: Vec<Vertex>,
    pub checkpoints: Vec<Checkpoint>,
    pub segments: Vec<Segment>,
    pub branches: Vec<Branch>,
    /// Start vertex index, if set.
    pub start_index: Option<u32>,
    /// Finish vertex index, if set. The [`Finish`] payload's `path_index`
    /// mirrors this value.
    pub finish_index: Option<u32>,
    pub finish: Option<Finish>,
}

impl Route {
    /// A route over a bare path, with no annotations.
    pub fn new(path: Vec<Vertex>) -> Self {
        Self { path, ..Self::default() }
    }

    /// The path's vertex positions as a plain polyline.
    pub fn path_positions(&self) -> Vec<GeoPoint> {
        vertex_positions(&self.path)
    }

    /// Look up a branch by id.
    pub fn branch(&self, branch_id: &str) -> Option<&Branch> {
        self.branches.iter().find(|b| b.id == branch_id)
    }
}

/// Extract the positions of a vertex list as a plain polyline.
pub fn vertex_positions(path: &[Vertex]) -> Vec<GeoPoint> {
    path.iter().map(|v| v.position).collect()
}

/// Distance in meters between a checkpoint and a position.
///
/// Convenience used by trigger evaluation and divider clearing.
#[inline]
pub(crate) fn checkpoint_distance(checkpoint: &Checkpoint, position: &GeoPoint) -> f64 {
    haversine_distance(&checkpoint.position, position)
}

// ============================================================================
// FFI Exports (only when feature enabled)
// ============================================================================

#[cfg(feature = "ffi")]
mod ffi {
    use super::*;
    use log::info;

    /// Projection result with FFI-friendly field types.
    #[derive(Debug, Clone, uniffi::Record)]
    pub struct FfiProjection {
        pub position: GeoPoint,
        pub edge_index: u32,
        pub fraction: f64,
        pub distance_meters: f64,
    }

    /// Project a position onto a path polyline.
    #[uniffi::export]
    pub fn ffi_project(point: GeoPoint, path: Vec<GeoPoint>) -> Option<FfiProjection> {
        init_logging();
        crate::project(&point, &path).map(|p| FfiProjection {
            position: p.position,
            edge_index: p.edge_index as u32,
            fraction: p.fraction,
            distance_meters: p.distance_meters,
        })
    }

    /// Position on a path at a progress fraction (preview scrubbing).
    #[uniffi::export]
    pub fn ffi_interpolate_along_path(path: Vec<GeoPoint>, progress: f64) -> Option<GeoPoint> {
        init_logging();
        crate::interpolate_along_path(&path, progress)
    }

    /// Build the ordered event list for a route's main path.
    #[uniffi::export]
    pub fn ffi_route_events(route: Route) -> Vec<TourEvent> {
        init_logging();
        let events = crate::build_route_events(&route);
        info!("[TourNavRust] route events: {}", events.len());
        events
    }

    /// Build the ordered event list for one branch of a route.
    #[uniffi::export]
    pub fn ffi_branch_events(route: Route, branch_id: String) -> Vec<TourEvent> {
        init_logging();
        crate::build_branch_events(&route, &branch_id).unwrap_or_default()
    }

    /// Replay a sequence of raw fixes through a fresh session and return the
    /// final snapshot. Used for simulation and preview playback.
    #[uniffi::export]
    pub fn ffi_replay_fixes(route: Route, fixes: Vec<RawFix>) -> SessionSnapshot {
        init_logging();
        info!("[TourNavRust] replaying {} fixes", fixes.len());

        let mut session = NavigationSession::from_route(&route, SessionConfig::default());
        session.start();
        for fix in &fixes {
            session.advance(fix);
        }
        session.snapshot()
    }

    /// Get default session configuration.
    #[uniffi::export]
    pub fn default_session_config() -> SessionConfig {
        SessionConfig::default()
    }
}

// ============================================================================
// Tests
// ============================================================================

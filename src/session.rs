//! # Navigation Session
//!
//! Live-tracking state machine for a traveler following a tour.
//!
//! The session turns noisy raw GPS fixes into monotonic progress along the path
//! and one-shot content triggers. The whole pipeline is a single synchronous
//! transition, [`NavigationSession::advance`], invoked once per fix in arrival
//! order. Whatever concurrency primitive the host platform offers (a channel
//! consumer, a location-API callback) sits outside this module.
//!
//! Per fix:
//! 1. Exponential smoothing of the raw position (the first fix seeds directly).
//! 2. Projection of the smoothed position onto the path; distances beyond the
//!    off-route threshold raise an advisory flag that never blocks progress.
//! 3. Progress clamping: reported progress is the maximum seen so far, so
//!    jitter or signal loss can never move it backward.
//! 4. The passed/remaining split is recomputed from the clamped progress, not
//!    from the raw, possibly-regressed projection.
//! 5. Triggering runs off the raw fix for accurate radius behavior: at most one
//!    new checkpoint per fix, each rewarded exactly once; the finish triggers
//!    once within its own radius.
//!
//! [`TourTracker`] owns a session together with the platform abstractions: a
//! push-based location provider, a best-effort wake lock, and the media/reward
//! hooks the consumer supplies.

use std::collections::HashSet;

use log::{debug, info};

use crate::geo_utils::haversine_distance;
use crate::path_index::{split_at, PathIndex};
use crate::projection::project;
use crate::{checkpoint_distance, Checkpoint, Finish, GeoPoint, Route, Segment};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A raw position fix from the location provider.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct RawFix {
    pub latitude: f64,
    pub longitude: f64,
    pub accuracy_meters: f64,
}

impl RawFix {
    pub fn new(latitude: f64, longitude: f64, accuracy_meters: f64) -> Self {
        Self { latitude, longitude, accuracy_meters }
    }

    /// The fix position, without the accuracy estimate.
    pub fn position(&self) -> GeoPoint {
        GeoPoint::new(self.latitude, self.longitude)
    }
}

/// Session lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Tracking,
}

/// Tuning knobs for live tracking.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct SessionConfig {
    /// Weight of each incoming fix in the exponential moving average.
    /// Default: 0.5
    pub smoothing_factor: f64,
    /// Distance from the path beyond which the off-route flag raises (advisory
    /// only). Default: 50.0 meters
    pub off_route_threshold_meters: f64,
    /// Proximity within which the finish triggers. Default: 30.0 meters
    pub finish_radius_meters: f64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            smoothing_factor: 0.5,
            off_route_threshold_meters: 50.0,
            finish_radius_meters: 30.0,
        }
    }
}

/// What a single fix newly caused, for the owner's media/reward hooks.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionUpdate {
    /// Checkpoint triggered by this fix, if any.
    pub triggered_checkpoint: Option<Checkpoint>,
    /// True when this fix reached the finish.
    pub finish_reached: bool,
}

/// Full session state exposed to the UI after each fix.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct SessionSnapshot {
    /// Fraction of the path traveled, in `[0, 1]`, monotonically non-decreasing.
    pub progress: f64,
    pub distance_remaining_meters: f64,
    pub is_off_route: bool,
    /// Ids of all checkpoints triggered so far, sorted.
    pub triggered_ids: Vec<String>,
    /// Most recently triggered checkpoint.
    pub active_checkpoint: Option<Checkpoint>,
    /// Segment narrating the edge the traveler is currently on.
    pub active_segment: Option<Segment>,
    pub finish_reached: bool,
    pub total_coins: u32,
}

/// Live navigation over one path context.
///
/// Owns its own smoothing, clamping and trigger state; no state is shared
/// between sessions. Entering tracking resets everything, so a restarted
/// session never inherits stale progress.
///
/// # Example
///
/// ```rust
/// use tour_nav::{GeoPoint, NavigationSession, RawFix, Route, SessionConfig, Vertex};
///
/// let route = Route::new(vec![
///     Vertex::at(GeoPoint::new(51.500, -0.1278)),
///     Vertex::at(GeoPoint::new(51.504, -0.1278)),
/// ]);
///
/// let mut session = NavigationSession::from_route(&route, SessionConfig::default());
/// session.start();
/// session.advance(&RawFix::new(51.502, -0.1278, 8.0));
///
/// let snapshot = session.snapshot();
/// assert!(snapshot.progress > 0.4 && snapshot.progress < 0.6);
/// ```
#[derive(Debug, Clone)]
pub struct NavigationSession {
    config: SessionConfig,
    state: SessionState,
    path: Vec<GeoPoint>,
    index: PathIndex,
    checkpoints: Vec<Checkpoint>,
    segments: Vec<Segment>,
    finish: Option<Finish>,

    smoothed: Option<GeoPoint>,
    progress: f64,
    is_off_route: bool,
    triggered_ids: HashSet<String>,
    active_checkpoint: Option<Checkpoint>,
    active_segment: Option<Segment>,
    finish_reached: bool,
    total_coins: u32,
    passed: Vec<GeoPoint>,
    remaining: Vec<GeoPoint>,
}

impl NavigationSession {
    /// Create an idle session over an explicit path context.
    pub fn new(
        path: Vec<GeoPoint>,
        checkpoints: Vec<Checkpoint>,
        segments: Vec<Segment>,
        finish: Option<Finish>,
        config: SessionConfig,
    ) -> Self {
        let index = PathIndex::from_path(&path);
        Self {
            config,
            state: SessionState::Idle,
            path,
            index,
            checkpoints,
            segments,
            finish,
            smoothed: None,
            progress: 0.0,
            is_off_route: false,
            triggered_ids: HashSet::new(),
            active_checkpoint: None,
            active_segment: None,
            finish_reached: false,
            total_coins: 0,
            passed: Vec::new(),
            remaining: Vec::new(),
        }
    }

    /// Create an idle session over a route's main path.
    pub fn from_route(route: &Route, config: SessionConfig) -> Self {
        Self::new(
            route.path_positions(),
            route.checkpoints.clone(),
            route.segments.clone(),
            route.finish.clone(),
            config,
        )
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn finish(&self) -> Option<&Finish> {
        self.finish.as_ref()
    }

    /// Vertices already traveled, ending at the current split point.
    pub fn passed_path(&self) -> &[GeoPoint] {
        &self.passed
    }

    /// Vertices still ahead, starting at the current split point.
    pub fn remaining_path(&self) -> &[GeoPoint] {
        &self.remaining
    }

    /// Enter tracking, resetting all live state.
    pub fn start(&mut self) {
        self.reset_live_state();
        self.remaining = self.path.clone();
        self.state = SessionState::Tracking;
        info!("session tracking started ({} vertices)", self.path.len());
    }

    /// Leave tracking and release all transient state.
    pub fn stop(&mut self) {
        self.reset_live_state();
        self.state = SessionState::Idle;
        info!("session stopped");
    }

    fn reset_live_state(&mut self) {
        self.smoothed = None;
        self.progress = 0.0;
        self.is_off_route = false;
        self.triggered_ids.clear();
        self.active_checkpoint = None;
        self.active_segment = None;
        self.finish_reached = false;
        self.total_coins = 0;
        self.passed.clear();
        self.remaining.clear();
    }

    /// Process one raw fix. The single state transition of the session.
    ///
    /// Fixes arriving while the session is idle are ignored.
    pub fn advance(&mut self, fix: &RawFix) -> SessionUpdate {
        if self.state != SessionState::Tracking {
            return SessionUpdate::default();
        }

        let raw = fix.position();
        debug!(
            "fix ({:.6}, {:.6}) accuracy {:.0}m",
            fix.latitude, fix.longitude, fix.accuracy_meters
        );

        // 1. Smoothing: the first fix seeds the filter directly
        let smoothed = match self.smoothed {
            Some(previous) => GeoPoint::new(
                previous.latitude + self.config.smoothing_factor * (raw.latitude - previous.latitude),
                previous.longitude
                    + self.config.smoothing_factor * (raw.longitude - previous.longitude),
            ),
            None => raw,
        };
        self.smoothed = Some(smoothed);

        // 2-4. Projection, monotonic progress, passed/remaining split
        if let Some(projection) = project(&smoothed, &self.path) {
            self.is_off_route = projection.distance_meters > self.config.off_route_threshold_meters;

            let raw_progress = self
                .index
                .progress_from_projection(projection.edge_index, projection.fraction);

            // The split is derived from the clamped progress: when the smoothed
            // position regresses, the re-derived projection wins over the raw one
            let (edge, fraction) = if raw_progress >= self.progress {
                self.progress = raw_progress;
                (projection.edge_index, projection.fraction)
            } else {
                self.index.progress_to_projection(self.progress)
            };

            let (passed, remaining) = split_at(&self.path, edge, fraction);
            self.passed = passed;
            self.remaining = remaining;
            self.active_segment = self
                .segments
                .iter()
                .find(|s| s.path_index as usize == edge)
                .cloned();
        }

        // 5. Triggering, keyed off the raw fix
        let mut update = SessionUpdate::default();

        let hit = self.checkpoints.iter().position(|c| {
            !self.triggered_ids.contains(&c.id)
                && checkpoint_distance(c, &raw) <= c.trigger_radius_meters
        });
        if let Some(i) = hit {
            let checkpoint = self.checkpoints[i].clone();
            self.triggered_ids.insert(checkpoint.id.clone());
            self.total_coins += checkpoint.coins_reward;
            info!(
                "checkpoint {} triggered (+{} coins)",
                checkpoint.id, checkpoint.coins_reward
            );
            self.active_checkpoint = Some(checkpoint.clone());
            update.triggered_checkpoint = Some(checkpoint);
        }

        if !self.finish_reached {
            if let Some(finish) = &self.finish {
                if haversine_distance(&finish.position, &raw) <= self.config.finish_radius_meters {
                    self.finish_reached = true;
                    self.total_coins += finish.coins_reward;
                    update.finish_reached = true;
                    info!("finish reached (+{} coins)", finish.coins_reward);
                }
            }
        }

        update
    }

    /// Current session state for the UI.
    pub fn snapshot(&self) -> SessionSnapshot {
        let mut triggered_ids: Vec<String> = self.triggered_ids.iter().cloned().collect();
        triggered_ids.sort();

        SessionSnapshot {
            progress: self.progress,
            distance_remaining_meters: self.index.total_length() * (1.0 - self.progress),
            is_off_route: self.is_off_route,
            triggered_ids,
            active_checkpoint: self.active_checkpoint.clone(),
            active_segment: self.active_segment.clone(),
            finish_reached: self.finish_reached,
            total_coins: self.total_coins,
        }
    }
}

// ============================================================================
// Platform abstractions
// ============================================================================

/// Status of the push-based location provider.
///
/// Errors pause the stream of fixes; they never corrupt in-progress session
/// state, and resuming simply continues accumulating fixes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderStatus {
    Active,
    PermissionDenied,
    SignalUnavailable,
    Stopped,
}

/// Push-based location source with start/stop control.
///
/// The provider delivers fixes to [`TourTracker::on_fix`] from whatever
/// callback mechanism the platform offers.
pub trait LocationProvider: Send {
    fn start(&mut self) -> ProviderStatus;
    fn stop(&mut self);
}

/// Platform wake lock keeping the device awake during an active session.
///
/// Acquisition is best-effort and revocable by the platform; failure is a
/// non-fatal flag, never an error that halts tracking.
pub trait WakeLock: Send {
    /// Attempt to acquire; returns whether the lock is held.
    fn acquire(&mut self) -> bool;
    fn release(&mut self);
}

/// Consumer hooks for media playback and reward logic, both external.
pub trait TourHooks: Send {
    fn on_checkpoint_triggered(&mut self, _checkpoint: &Checkpoint) {}
    fn on_finish_reached(&mut self, _finish: &Finish) {}
}

/// Owner of a live session and its platform collaborators.
pub struct TourTracker {
    session: NavigationSession,
    provider: Box<dyn LocationProvider>,
    wake_lock: Option<Box<dyn WakeLock>>,
    hooks: Option<Box<dyn TourHooks>>,
    provider_status: ProviderStatus,
    wake_lock_held: bool,
}

impl TourTracker {
    pub fn new(session: NavigationSession, provider: Box<dyn LocationProvider>) -> Self {
        Self {
            session,
            provider,
            wake_lock: None,
            hooks: None,
            provider_status: ProviderStatus::Stopped,
            wake_lock_held: false,
        }
    }

    pub fn with_wake_lock(mut self, wake_lock: Box<dyn WakeLock>) -> Self {
        self.wake_lock = Some(wake_lock);
        self
    }

    pub fn with_hooks(mut self, hooks: Box<dyn TourHooks>) -> Self {
        self.hooks = Some(hooks);
        self
    }

    pub fn session(&self) -> &NavigationSession {
        &self.session
    }

    pub fn provider_status(&self) -> ProviderStatus {
        self.provider_status
    }

    /// Whether the wake lock is currently held. Non-fatal either way.
    pub fn wake_lock_held(&self) -> bool {
        self.wake_lock_held
    }

    /// Start tracking: fresh session state, provider started, wake lock
    /// requested best-effort.
    pub fn start(&mut self) {
        self.session.start();
        self.provider_status = self.provider.start();
        self.wake_lock_held = match self.wake_lock.as_mut() {
            Some(lock) => lock.acquire(),
            None => false,
        };
    }

    /// Stop tracking and release the provider and wake lock.
    pub fn stop(&mut self) {
        self.provider.stop();
        self.provider_status = ProviderStatus::Stopped;
        if let Some(lock) = self.wake_lock.as_mut() {
            lock.release();
        }
        self.wake_lock_held = false;
        self.session.stop();
    }

    /// Feed one fix through the session and fire the consumer hooks for
    /// anything it newly triggered.
    pub fn on_fix(&mut self, fix: &RawFix) -> SessionSnapshot {
        let update = self.session.advance(fix);

        if let Some(hooks) = self.hooks.as_mut() {
            if let Some(checkpoint) = &update.triggered_checkpoint {
                hooks.on_checkpoint_triggered(checkpoint);
            }
            if update.finish_reached {
                if let Some(finish) = &self.session.finish {
                    hooks.on_finish_reached(finish);
                }
            }
        }

        self.session.snapshot()
    }

    /// Record a provider status change. Errors pause the stream of fixes;
    /// session state is preserved and tracking resumes when fixes return.
    pub fn on_provider_status(&mut self, status: ProviderStatus) {
        if status != self.provider_status {
            info!("location provider status: {status:?}");
        }
        self.provider_status = status;
    }

    /// The platform revoked the wake lock (e.g. loss of foreground). Re-request
    /// silently; failure stays a non-fatal flag.
    pub fn on_wake_lock_released(&mut self) {
        self.wake_lock_held = match self.wake_lock.as_mut() {
            Some(lock) => lock.acquire(),
            None => false,
        };
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Route, Vertex};
    use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
    use std::sync::{Arc, Mutex};

    /// 5 vertices going north, ~445m total.
    fn sample_route() -> Route {
        let path: Vec<Vertex> = (0..5)
            .map(|i| Vertex::at(GeoPoint::new(51.500 + i as f64 * 0.001, -0.1278)))
            .collect();
        Route::new(path)
    }

    fn tracking_session(route: &Route) -> NavigationSession {
        let mut session = NavigationSession::from_route(route, SessionConfig::default());
        session.start();
        session
    }

    #[test]
    fn test_idle_session_ignores_fixes() {
        let route = sample_route();
        let mut session = NavigationSession::from_route(&route, SessionConfig::default());

        let update = session.advance(&RawFix::new(51.502, -0.1278, 5.0));
        assert_eq!(update, SessionUpdate::default());
        assert_eq!(session.snapshot().progress, 0.0);
    }

    #[test]
    fn test_first_fix_seeds_smoothing() {
        let route = sample_route();
        let mut session = tracking_session(&route);

        // Without seeding, smoothing toward a default would halve this jump
        session.advance(&RawFix::new(51.502, -0.1278, 5.0));
        let snapshot = session.snapshot();
        assert!(snapshot.progress > 0.45 && snapshot.progress < 0.55);
    }

    #[test]
    fn test_progress_monotonic_under_backward_fixes() {
        let route = sample_route();
        let mut session = tracking_session(&route);

        let latitudes = [51.5005, 51.501, 51.5025, 51.503, 51.501, 51.5005, 51.5035];
        let mut last_progress = 0.0;
        for lat in latitudes {
            session.advance(&RawFix::new(lat, -0.1278, 5.0));
            let progress = session.snapshot().progress;
            assert!(
                progress >= last_progress,
                "progress regressed from {last_progress} to {progress}"
            );
            last_progress = progress;
        }
    }

    #[test]
    fn test_split_follows_clamped_progress() {
        let route = sample_route();
        let mut session = tracking_session(&route);

        for _ in 0..6 {
            session.advance(&RawFix::new(51.503, -0.1278, 5.0));
        }
        let forward_split = *session.passed_path().last().unwrap();

        // Adversarial backward fix: reported split must not move backward
        session.advance(&RawFix::new(51.5005, -0.1278, 5.0));
        let after_split = *session.passed_path().last().unwrap();
        assert!(after_split.latitude >= forward_split.latitude - 1e-9);

        // Both halves share the split point
        assert_eq!(session.passed_path().last(), session.remaining_path().first());
    }

    #[test]
    fn test_off_route_is_advisory() {
        let route = sample_route();
        let mut session = tracking_session(&route);

        session.advance(&RawFix::new(51.502, -0.1278, 5.0));
        assert!(!session.snapshot().is_off_route);
        let progress_on_route = session.snapshot().progress;

        // ~700m west of the path
        session.advance(&RawFix::new(51.5025, -0.138, 5.0));
        let snapshot = session.snapshot();
        assert!(snapshot.is_off_route);
        // Progress is clamped, never pushed backward by the detour
        assert!(snapshot.progress >= progress_on_route);
    }

    #[test]
    fn test_checkpoint_triggers_exactly_once() {
        let mut route = sample_route();
        let mut checkpoint = Checkpoint::new("cp-1", "Fountain", route.path[2].position);
        checkpoint.coins_reward = 10;
        route.checkpoints.push(checkpoint);

        let mut session = tracking_session(&route);

        // 10 consecutive fixes ~11m from the checkpoint, inside its 20m radius
        for _ in 0..10 {
            session.advance(&RawFix::new(51.5021, -0.1278, 5.0));
        }

        let snapshot = session.snapshot();
        assert_eq!(snapshot.triggered_ids, vec!["cp-1".to_string()]);
        assert_eq!(snapshot.active_checkpoint.as_ref().unwrap().id, "cp-1");
        assert_eq!(snapshot.total_coins, 10); // not 100
    }

    #[test]
    fn test_one_checkpoint_per_fix() {
        let mut route = sample_route();
        let position = route.path[2].position;
        let mut first = Checkpoint::new("cp-first", "North gate", position);
        first.coins_reward = 5;
        let mut second = Checkpoint::new("cp-second", "South gate", position);
        second.coins_reward = 7;
        route.checkpoints.push(first);
        route.checkpoints.push(second);

        let mut session = tracking_session(&route);

        // Overlapping radii: the first in iteration order wins the first fix
        session.advance(&RawFix::new(51.502, -0.1278, 5.0));
        let snapshot = session.snapshot();
        assert_eq!(snapshot.triggered_ids, vec!["cp-first".to_string()]);
        assert_eq!(snapshot.total_coins, 5);

        session.advance(&RawFix::new(51.502, -0.1278, 5.0));
        let snapshot = session.snapshot();
        assert_eq!(snapshot.triggered_ids.len(), 2);
        assert_eq!(snapshot.total_coins, 12);
    }

    #[test]
    fn test_finish_triggers_exactly_once() {
        let mut route = sample_route();
        let finish_position = route.path[4].position;
        route.finish_index = Some(4);
        route.finish = Some(Finish { position: finish_position, path_index: 4, coins_reward: 50 });

        let mut session = tracking_session(&route);

        let update = session.advance(&RawFix::new(51.5041, -0.1278, 5.0));
        assert!(update.finish_reached);

        for _ in 0..5 {
            let update = session.advance(&RawFix::new(51.5041, -0.1278, 5.0));
            assert!(!update.finish_reached); // already reached, not re-reported
        }

        let snapshot = session.snapshot();
        assert!(snapshot.finish_reached);
        assert_eq!(snapshot.total_coins, 50);
    }

    #[test]
    fn test_active_segment_tracks_current_edge() {
        let mut route = sample_route();
        route.segments.push(crate::Segment::with_text(2, "along the park"));

        let mut session = tracking_session(&route);
        session.advance(&RawFix::new(51.5025, -0.1278, 5.0));

        let snapshot = session.snapshot();
        assert_eq!(snapshot.active_segment.unwrap().text, "along the park");
    }

    #[test]
    fn test_restart_resets_session_state() {
        let mut route = sample_route();
        let mut checkpoint = Checkpoint::new("cp-1", "Fountain", route.path[2].position);
        checkpoint.coins_reward = 10;
        route.checkpoints.push(checkpoint);

        let mut session = tracking_session(&route);
        session.advance(&RawFix::new(51.502, -0.1278, 5.0));
        assert!(session.snapshot().progress > 0.0);
        assert_eq!(session.snapshot().total_coins, 10);

        session.stop();
        assert_eq!(session.state(), SessionState::Idle);

        session.start();
        let snapshot = session.snapshot();
        assert_eq!(snapshot.progress, 0.0);
        assert_eq!(snapshot.total_coins, 0);
        assert!(snapshot.triggered_ids.is_empty());

        // The checkpoint can trigger again in the fresh session
        session.advance(&RawFix::new(51.502, -0.1278, 5.0));
        assert_eq!(session.snapshot().total_coins, 10);
    }

    #[test]
    fn test_degenerate_path_session() {
        let route = Route::new(vec![Vertex::at(GeoPoint::new(51.5, -0.1278))]);
        let mut session = tracking_session(&route);

        session.advance(&RawFix::new(51.5, -0.1278, 5.0));
        let snapshot = session.snapshot();
        assert_eq!(snapshot.progress, 0.0);
        assert_eq!(snapshot.distance_remaining_meters, 0.0);
    }

    // ------------------------------------------------------------------
    // TourTracker
    // ------------------------------------------------------------------

    struct StubProvider {
        started: Arc<AtomicBool>,
    }

    impl LocationProvider for StubProvider {
        fn start(&mut self) -> ProviderStatus {
            self.started.store(true, Ordering::SeqCst);
            ProviderStatus::Active
        }

        fn stop(&mut self) {
            self.started.store(false, Ordering::SeqCst);
        }
    }

    struct StubWakeLock {
        grant: bool,
        acquires: Arc<AtomicU32>,
    }

    impl WakeLock for StubWakeLock {
        fn acquire(&mut self) -> bool {
            self.acquires.fetch_add(1, Ordering::SeqCst);
            self.grant
        }

        fn release(&mut self) {}
    }

    struct RecordingHooks {
        events: Arc<Mutex<Vec<String>>>,
    }

    impl TourHooks for RecordingHooks {
        fn on_checkpoint_triggered(&mut self, checkpoint: &Checkpoint) {
            self.events.lock().unwrap().push(format!("checkpoint:{}", checkpoint.id));
        }

        fn on_finish_reached(&mut self, finish: &Finish) {
            self.events.lock().unwrap().push(format!("finish:{}", finish.coins_reward));
        }
    }

    fn tracker_route() -> Route {
        let mut route = sample_route();
        let mut checkpoint = Checkpoint::new("cp-1", "Fountain", route.path[2].position);
        checkpoint.coins_reward = 10;
        route.checkpoints.push(checkpoint);
        route.finish_index = Some(4);
        route.finish = Some(Finish {
            position: route.path[4].position,
            path_index: 4,
            coins_reward: 50,
        });
        route
    }

    #[test]
    fn test_tracker_fires_hooks_once() {
        let route = tracker_route();
        let events = Arc::new(Mutex::new(Vec::new()));
        let started = Arc::new(AtomicBool::new(false));

        let session = NavigationSession::from_route(&route, SessionConfig::default());
        let mut tracker = TourTracker::new(session, Box::new(StubProvider { started: started.clone() }))
            .with_hooks(Box::new(RecordingHooks { events: events.clone() }));

        tracker.start();
        assert!(started.load(Ordering::SeqCst));
        assert_eq!(tracker.provider_status(), ProviderStatus::Active);

        for _ in 0..3 {
            tracker.on_fix(&RawFix::new(51.502, -0.1278, 5.0));
        }
        for _ in 0..3 {
            tracker.on_fix(&RawFix::new(51.504, -0.1278, 5.0));
        }

        let events = events.lock().unwrap();
        assert_eq!(*events, vec!["checkpoint:cp-1".to_string(), "finish:50".to_string()]);
    }

    #[test]
    fn test_tracker_wake_lock_rerequest() {
        let route = tracker_route();
        let acquires = Arc::new(AtomicU32::new(0));
        let started = Arc::new(AtomicBool::new(false));

        let session = NavigationSession::from_route(&route, SessionConfig::default());
        let mut tracker = TourTracker::new(session, Box::new(StubProvider { started }))
            .with_wake_lock(Box::new(StubWakeLock { grant: true, acquires: acquires.clone() }));

        tracker.start();
        assert!(tracker.wake_lock_held());

        // Platform revokes the lock; the tracker silently re-requests
        tracker.on_wake_lock_released();
        assert!(tracker.wake_lock_held());
        assert_eq!(acquires.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_tracker_wake_lock_failure_is_nonfatal() {
        let route = tracker_route();
        let acquires = Arc::new(AtomicU32::new(0));
        let started = Arc::new(AtomicBool::new(false));

        let session = NavigationSession::from_route(&route, SessionConfig::default());
        let mut tracker = TourTracker::new(session, Box::new(StubProvider { started }))
            .with_wake_lock(Box::new(StubWakeLock { grant: false, acquires }));

        tracker.start();
        assert!(!tracker.wake_lock_held());

        // Tracking continues regardless
        let snapshot = tracker.on_fix(&RawFix::new(51.502, -0.1278, 5.0));
        assert!(snapshot.progress > 0.0);
    }

    #[test]
    fn test_tracker_provider_error_pauses_without_corrupting() {
        let route = tracker_route();
        let started = Arc::new(AtomicBool::new(false));

        let session = NavigationSession::from_route(&route, SessionConfig::default());
        let mut tracker = TourTracker::new(session, Box::new(StubProvider { started }));

        tracker.start();
        tracker.on_fix(&RawFix::new(51.502, -0.1278, 5.0));
        let before = tracker.session().snapshot();

        tracker.on_provider_status(ProviderStatus::SignalUnavailable);
        assert_eq!(tracker.provider_status(), ProviderStatus::SignalUnavailable);
        assert_eq!(tracker.session().snapshot(), before);

        // Fixes resume and keep accumulating on the same state
        tracker.on_provider_status(ProviderStatus::Active);
        let after = tracker.on_fix(&RawFix::new(51.5035, -0.1278, 5.0));
        assert!(after.progress >= before.progress);
    }
}

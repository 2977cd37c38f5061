//! Location, heading and geocode requests.
//!
//! A [`Request`] is the envelope every consumer registers with the manager:
//! identity, lifecycle state, background eligibility, timeout and delivery
//! sinks. The kind-specific part lives in [`RequestKind`].
//!
//! Callers keep the [`RequestId`] returned at construction and use it to pause,
//! resume or cancel. The request itself is owned by the registry once
//! registered.
//!
//! # Example
//!
//! ```
//! use locus::request::Request;
//! use locus::settings::{Accuracy, ActivityHint, Frequency};
//!
//! let request = Request::location(Accuracy::HOUSE, Frequency::Continuous)
//!     .with_activity(ActivityHint::Fitness)
//!     .on_reading(|reading| println!("{:.5},{:.5}", reading.latitude, reading.longitude));
//! let id = request.id();
//! # let _ = id;
//! ```

pub mod callback;
mod state;

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

use crate::auth::{AuthorizationLevel, AuthorizationStatus};
use crate::background::AppState;
use crate::error::LocationError;
use crate::geocode::{GeocodeQuery, Placemark};
use crate::reading::{HeadingReading, Reading};
use crate::settings::{Accuracy, ActivityHint, Frequency, Requirements};

pub use callback::{
    CallbackExecutor, CallbackExecutorRef, CallbackQueue, InlineExecutor, Job, QueuedExecutor,
};
pub use state::RequestState;

/// Receives location readings.
pub type ReadingCallback = Arc<dyn Fn(&Reading) + Send + Sync>;
/// Receives heading readings.
pub type HeadingCallback = Arc<dyn Fn(&HeadingReading) + Send + Sync>;
/// Receives geocoding results.
pub type PlacesCallback = Arc<dyn Fn(&[Placemark]) + Send + Sync>;
/// Receives errors.
pub type ErrorCallback = Arc<dyn Fn(&LocationError) + Send + Sync>;
/// Receives `(old, new)` authorization status changes.
pub type AuthorizationCallback = Arc<dyn Fn(AuthorizationStatus, AuthorizationStatus) + Send + Sync>;

// =============================================================================
// Identity
// =============================================================================

static NEXT_REQUEST_ID: AtomicU64 = AtomicU64::new(1);

/// Opaque request handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct RequestId(u64);

impl RequestId {
    fn next() -> Self {
        RequestId(NEXT_REQUEST_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

// =============================================================================
// Kinds
// =============================================================================

/// Whether a location request keeps running or completes on first fix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum LocationMode {
    Continuous,
    OneShot,
}

/// Location-specific request data.
#[derive(Clone)]
pub struct LocationRequest {
    pub requirements: Requirements,
    pub mode: LocationMode,
    on_reading: Option<ReadingCallback>,
}

impl LocationRequest {
    /// Returns true if `reading` is good enough to be delivered.
    ///
    /// Continuous requests accept every reading. One-shot requests with a
    /// meter threshold only accept readings within it.
    pub fn accepts(&self, reading: &Reading) -> bool {
        match (self.mode, self.requirements.accuracy.threshold_meters()) {
            (LocationMode::OneShot, Some(limit)) => reading.horizontal_accuracy <= limit,
            _ => true,
        }
    }
}

/// Heading-specific request data.
#[derive(Clone)]
pub struct HeadingRequest {
    /// Minimum change in degrees before a new heading is reported. `None`
    /// takes the manager's configured default at registration.
    pub filter_degrees: Option<f64>,
    on_heading: Option<HeadingCallback>,
}

/// Geocode-specific request data.
#[derive(Clone)]
pub struct GeocodeRequest {
    pub query: GeocodeQuery,
    in_flight: bool,
    on_places: Option<PlacesCallback>,
}

/// The kind-specific part of a request.
#[derive(Clone)]
pub enum RequestKind {
    Location(LocationRequest),
    Heading(HeadingRequest),
    Geocode(GeocodeRequest),
}

impl RequestKind {
    pub fn name(&self) -> &'static str {
        match self {
            RequestKind::Location(l) => match l.mode {
                LocationMode::Continuous => "location",
                LocationMode::OneShot => "one-shot-location",
            },
            RequestKind::Heading(_) => "heading",
            RequestKind::Geocode(_) => "geocode",
        }
    }
}

/// Result of handing an event to a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// The request did not want the event.
    Skipped,
    /// The event was delivered; the request keeps running.
    Delivered,
    /// The event was delivered and finished the request.
    Completed,
}

// =============================================================================
// Request
// =============================================================================

/// A registered consumer of location services.
#[derive(Clone)]
pub struct Request {
    id: RequestId,
    kind: RequestKind,
    state: RequestState,
    background: bool,
    timeout: Option<Duration>,
    timer_armed: bool,
    delivered: bool,
    on_error: Option<ErrorCallback>,
    on_authorization: Option<AuthorizationCallback>,
}

impl Request {
    fn with_kind(kind: RequestKind) -> Self {
        Self {
            id: RequestId::next(),
            kind,
            state: RequestState::Idle,
            background: false,
            timeout: None,
            timer_armed: false,
            delivered: false,
            on_error: None,
            on_authorization: None,
        }
    }

    /// Continuous location updates.
    pub fn location(accuracy: Accuracy, frequency: Frequency) -> Self {
        Self::with_kind(RequestKind::Location(LocationRequest {
            requirements: Requirements::new(accuracy, frequency),
            mode: LocationMode::Continuous,
            on_reading: None,
        }))
    }

    /// A single fix meeting `accuracy`, then the request completes.
    pub fn one_shot(accuracy: Accuracy) -> Self {
        Self::with_kind(RequestKind::Location(LocationRequest {
            requirements: Requirements::new(accuracy, Frequency::Continuous),
            mode: LocationMode::OneShot,
            on_reading: None,
        }))
    }

    /// Continuous compass updates.
    pub fn heading(filter_degrees: f64) -> Self {
        Self::with_kind(RequestKind::Heading(HeadingRequest {
            filter_degrees: Some(filter_degrees),
            on_heading: None,
        }))
    }

    /// Continuous compass updates with the manager's default filter.
    pub fn default_heading() -> Self {
        Self::with_kind(RequestKind::Heading(HeadingRequest {
            filter_degrees: None,
            on_heading: None,
        }))
    }

    /// A single forward or reverse geocoding lookup.
    pub fn geocode(query: GeocodeQuery) -> Self {
        Self::with_kind(RequestKind::Geocode(GeocodeRequest {
            query,
            in_flight: false,
            on_places: None,
        }))
    }

    // -------------------------------------------------------------------------
    // Builders
    // -------------------------------------------------------------------------

    /// Sets the activity hint. Ignored for non-location requests.
    pub fn with_activity(mut self, activity: ActivityHint) -> Self {
        if let RequestKind::Location(l) = &mut self.kind {
            l.requirements.activity = activity;
        }
        self
    }

    /// Marks the request as allowed to run while the app is in background.
    pub fn with_background(mut self, background: bool) -> Self {
        self.background = background;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Sets the reading sink. Ignored for non-location requests.
    pub fn on_reading<F>(mut self, f: F) -> Self
    where
        F: Fn(&Reading) + Send + Sync + 'static,
    {
        if let RequestKind::Location(l) = &mut self.kind {
            l.on_reading = Some(Arc::new(f));
        }
        self
    }

    /// Sets the heading sink. Ignored for non-heading requests.
    pub fn on_heading<F>(mut self, f: F) -> Self
    where
        F: Fn(&HeadingReading) + Send + Sync + 'static,
    {
        if let RequestKind::Heading(h) = &mut self.kind {
            h.on_heading = Some(Arc::new(f));
        }
        self
    }

    /// Sets the places sink. Ignored for non-geocode requests.
    pub fn on_places<F>(mut self, f: F) -> Self
    where
        F: Fn(&[Placemark]) + Send + Sync + 'static,
    {
        if let RequestKind::Geocode(g) = &mut self.kind {
            g.on_places = Some(Arc::new(f));
        }
        self
    }

    pub fn on_error<F>(mut self, f: F) -> Self
    where
        F: Fn(&LocationError) + Send + Sync + 'static,
    {
        self.on_error = Some(Arc::new(f));
        self
    }

    pub fn on_authorization_change<F>(mut self, f: F) -> Self
    where
        F: Fn(AuthorizationStatus, AuthorizationStatus) + Send + Sync + 'static,
    {
        self.on_authorization = Some(Arc::new(f));
        self
    }

    // -------------------------------------------------------------------------
    // Accessors
    // -------------------------------------------------------------------------

    pub fn id(&self) -> RequestId {
        self.id
    }

    pub fn kind(&self) -> &RequestKind {
        &self.kind
    }

    pub fn state(&self) -> &RequestState {
        &self.state
    }

    pub fn is_running(&self) -> bool {
        self.state.is_running()
    }

    pub fn is_background(&self) -> bool {
        self.background
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Location requirements, for location requests.
    pub fn requirements(&self) -> Option<&Requirements> {
        match &self.kind {
            RequestKind::Location(l) => Some(&l.requirements),
            _ => None,
        }
    }

    /// Heading filter, for heading requests.
    pub fn heading_filter(&self) -> Option<f64> {
        match &self.kind {
            RequestKind::Heading(h) => h.filter_degrees,
            _ => None,
        }
    }

    /// Returns true for requests that drive the location or heading sensor.
    pub fn uses_sensor(&self) -> bool {
        matches!(self.kind, RequestKind::Location(_) | RequestKind::Heading(_))
    }

    /// Returns true if the request may run in `app_state`.
    pub fn is_eligible(&self, app_state: AppState) -> bool {
        match app_state {
            AppState::Foreground => true,
            AppState::Background => self.background,
        }
    }

    /// Access level this request needs from the platform.
    ///
    /// Background location requests need `Always`; everything else is served
    /// by `WhenInUse`.
    pub fn required_level(&self) -> AuthorizationLevel {
        match &self.kind {
            RequestKind::Location(_) if self.background => AuthorizationLevel::Always,
            _ => AuthorizationLevel::WhenInUse,
        }
    }

    /// Returns true for kinds that complete on first delivery.
    pub(crate) fn is_one_shot(&self) -> bool {
        match &self.kind {
            RequestKind::Location(l) => l.mode == LocationMode::OneShot,
            RequestKind::Heading(_) => false,
            RequestKind::Geocode(_) => true,
        }
    }

    pub(crate) fn set_default_timeout(&mut self, timeout: Duration) {
        if self.timeout.is_none() && self.is_one_shot() {
            self.timeout = Some(timeout);
        }
    }

    pub(crate) fn set_default_heading_filter(&mut self, filter_degrees: f64) {
        if let RequestKind::Heading(h) = &mut self.kind {
            h.filter_degrees.get_or_insert(filter_degrees);
        }
    }

    // -------------------------------------------------------------------------
    // State transitions
    // -------------------------------------------------------------------------

    fn transition(&mut self, next: RequestState) -> bool {
        if !self.state.can_transition_to(&next) {
            tracing::trace!(
                request = %self.id,
                from = %self.state,
                to = %next,
                "Rejected request state transition"
            );
            return false;
        }
        tracing::debug!(request = %self.id, from = %self.state, to = %next, "Request state changed");
        self.state = next;
        true
    }

    /// Moves to `Running`. Returns true if the state changed.
    pub fn resume(&mut self) -> bool {
        self.transition(RequestState::Running)
    }

    /// Moves `Running` to `Paused`. Returns true if the state changed.
    pub fn pause(&mut self) -> bool {
        self.transition(RequestState::Paused)
    }

    /// Moves to `Idle`. Returns true if the state changed.
    pub fn cancel(&mut self) -> bool {
        self.transition(RequestState::Idle)
    }

    /// Parks the request until authorization resolves.
    pub fn await_authorization(&mut self) -> bool {
        self.transition(RequestState::WaitingForAuthorization)
    }

    // -------------------------------------------------------------------------
    // Dispatch
    // -------------------------------------------------------------------------

    /// Hands a location reading to the request.
    pub fn dispatch_reading(&mut self, reading: &Reading, executor: &dyn CallbackExecutor) -> Dispatch {
        if !self.state.is_running() {
            return Dispatch::Skipped;
        }
        let RequestKind::Location(location) = &self.kind else {
            return Dispatch::Skipped;
        };
        if !location.accepts(reading) {
            tracing::trace!(
                request = %self.id,
                accuracy = reading.horizontal_accuracy,
                "Reading not accurate enough for one-shot request"
            );
            return Dispatch::Skipped;
        }

        if let Some(cb) = &location.on_reading {
            let cb = Arc::clone(cb);
            let reading = reading.clone();
            executor.execute(Box::new(move || cb(&reading)));
        }
        let completed = location.mode == LocationMode::OneShot;
        self.delivered = true;

        if completed {
            Dispatch::Completed
        } else {
            Dispatch::Delivered
        }
    }

    /// Hands a heading reading to the request.
    pub fn dispatch_heading(&mut self, heading: &HeadingReading, executor: &dyn CallbackExecutor) -> Dispatch {
        if !self.state.is_running() {
            return Dispatch::Skipped;
        }
        let RequestKind::Heading(h) = &self.kind else {
            return Dispatch::Skipped;
        };

        if let Some(cb) = &h.on_heading {
            let cb = Arc::clone(cb);
            let heading = heading.clone();
            executor.execute(Box::new(move || cb(&heading)));
        }
        self.delivered = true;
        Dispatch::Delivered
    }

    /// Hands geocoding results to the request, completing it.
    pub fn dispatch_places(&mut self, places: &[Placemark], executor: &dyn CallbackExecutor) -> Dispatch {
        if !self.state.is_running() {
            return Dispatch::Skipped;
        }
        let RequestKind::Geocode(g) = &mut self.kind else {
            return Dispatch::Skipped;
        };

        g.in_flight = false;
        if let Some(cb) = &g.on_places {
            let cb = Arc::clone(cb);
            let places = places.to_vec();
            executor.execute(Box::new(move || cb(&places)));
        }
        self.delivered = true;
        Dispatch::Completed
    }

    /// Delivers an error.
    ///
    /// Non-fatal errors are delivered as-is. Fatal errors move the request to
    /// `Failed` and are delivered once; a request that already failed gets
    /// nothing. Returns true if the request state changed.
    pub fn dispatch_error(&mut self, error: LocationError, executor: &dyn CallbackExecutor) -> bool {
        let changed = if error.is_fatal() {
            if !self.transition(RequestState::Failed(error.clone())) {
                return false;
            }
            tracing::info!(request = %self.id, error = %error, "Request failed");
            true
        } else {
            false
        };

        if let Some(cb) = &self.on_error {
            let cb = Arc::clone(cb);
            executor.execute(Box::new(move || cb(&error)));
        }
        changed
    }

    /// Tells the request the authorization status changed.
    pub fn dispatch_authorization_change(
        &self,
        old: AuthorizationStatus,
        new: AuthorizationStatus,
        executor: &dyn CallbackExecutor,
    ) {
        if let Some(cb) = &self.on_authorization {
            let cb = Arc::clone(cb);
            executor.execute(Box::new(move || cb(old, new)));
        }
    }

    // -------------------------------------------------------------------------
    // Timer and geocode bookkeeping (driven by the manager)
    // -------------------------------------------------------------------------

    /// Returns true if an armed timer should be disarmed now.
    ///
    /// The window runs from registration regardless of pauses or parking;
    /// only the first delivery or a failure ends it early.
    pub(crate) fn should_disarm_timer(&self) -> bool {
        self.timer_armed && (self.delivered || self.state.is_failed())
    }

    pub(crate) fn set_timer_armed(&mut self, armed: bool) {
        self.timer_armed = armed;
    }

    pub(crate) fn timer_armed(&self) -> bool {
        self.timer_armed
    }

    pub(crate) fn geocode_in_flight(&self) -> Option<bool> {
        match &self.kind {
            RequestKind::Geocode(g) => Some(g.in_flight),
            _ => None,
        }
    }

    pub(crate) fn set_geocode_in_flight(&mut self, in_flight: bool) {
        if let RequestKind::Geocode(g) = &mut self.kind {
            g.in_flight = in_flight;
        }
    }

    pub(crate) fn geocode_query(&self) -> Option<&GeocodeQuery> {
        match &self.kind {
            RequestKind::Geocode(g) => Some(&g.query),
            _ => None,
        }
    }
}

impl fmt::Debug for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Request")
            .field("id", &self.id)
            .field("kind", &self.kind.name())
            .field("state", &self.state)
            .field("background", &self.background)
            .field("timeout", &self.timeout)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use parking_lot::Mutex;

    fn reading(accuracy: f64) -> Reading {
        Reading::new(51.5, -0.12, accuracy, Utc::now())
    }

    fn counter() -> (Arc<Mutex<usize>>, impl Fn(&Reading) + Send + Sync + 'static) {
        let hits = Arc::new(Mutex::new(0usize));
        let h = Arc::clone(&hits);
        (hits, move |_: &Reading| *h.lock() += 1)
    }

    #[test]
    fn test_ids_are_unique() {
        let a = Request::one_shot(Accuracy::Any);
        let b = Request::one_shot(Accuracy::Any);
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn test_idle_request_skips_readings() {
        let (hits, cb) = counter();
        let mut req = Request::location(Accuracy::Any, Frequency::Continuous).on_reading(cb);

        assert_eq!(req.dispatch_reading(&reading(5.0), &InlineExecutor), Dispatch::Skipped);
        assert_eq!(*hits.lock(), 0);
    }

    #[test]
    fn test_continuous_request_keeps_running() {
        let (hits, cb) = counter();
        let mut req = Request::location(Accuracy::Any, Frequency::Continuous).on_reading(cb);
        req.resume();

        assert_eq!(req.dispatch_reading(&reading(500.0), &InlineExecutor), Dispatch::Delivered);
        assert_eq!(req.dispatch_reading(&reading(5.0), &InlineExecutor), Dispatch::Delivered);
        assert_eq!(*hits.lock(), 2);
        assert!(req.is_running());
    }

    #[test]
    fn test_one_shot_waits_for_threshold() {
        let (hits, cb) = counter();
        let mut req = Request::one_shot(Accuracy::HOUSE).on_reading(cb);
        req.resume();

        assert_eq!(req.dispatch_reading(&reading(65.0), &InlineExecutor), Dispatch::Skipped);
        assert_eq!(req.dispatch_reading(&reading(10.0), &InlineExecutor), Dispatch::Completed);
        assert_eq!(*hits.lock(), 1);
    }

    #[test]
    fn test_one_shot_best_accepts_any_reading() {
        let mut req = Request::one_shot(Accuracy::Best);
        req.resume();
        assert_eq!(req.dispatch_reading(&reading(900.0), &InlineExecutor), Dispatch::Completed);
    }

    #[test]
    fn test_fatal_error_delivered_once() {
        let errors = Arc::new(Mutex::new(Vec::new()));
        let e = Arc::clone(&errors);
        let mut req = Request::location(Accuracy::Any, Frequency::Continuous)
            .on_error(move |err| e.lock().push(err.clone()));
        req.resume();

        assert!(req.dispatch_error(LocationError::ServiceUnavailable, &InlineExecutor));
        assert!(!req.dispatch_error(LocationError::ServiceUnavailable, &InlineExecutor));

        assert_eq!(*errors.lock(), vec![LocationError::ServiceUnavailable]);
        assert_eq!(
            req.state(),
            &RequestState::Failed(LocationError::ServiceUnavailable)
        );
    }

    #[test]
    fn test_sensor_error_keeps_request_running() {
        let errors = Arc::new(Mutex::new(0));
        let e = Arc::clone(&errors);
        let mut req = Request::heading(1.0).on_error(move |_| *e.lock() += 1);
        req.resume();

        assert!(!req.dispatch_error(LocationError::Sensor("interference".into()), &InlineExecutor));
        assert_eq!(*errors.lock(), 1);
        assert!(req.is_running());
    }

    #[test]
    fn test_failed_request_can_resume() {
        let mut req = Request::location(Accuracy::Any, Frequency::Continuous);
        req.resume();
        req.dispatch_error(LocationError::ServiceUnavailable, &InlineExecutor);
        assert!(req.resume());
        assert!(req.is_running());
    }

    #[test]
    fn test_geocode_completes_on_places() {
        let got = Arc::new(Mutex::new(Vec::new()));
        let g = Arc::clone(&got);
        let mut req = Request::geocode(GeocodeQuery::coordinate(48.85, 2.35))
            .on_places(move |places| g.lock().extend_from_slice(places));
        req.resume();
        req.set_geocode_in_flight(true);

        let places = vec![Placemark::at(48.85, 2.35).with_locality("Paris")];
        assert_eq!(req.dispatch_places(&places, &InlineExecutor), Dispatch::Completed);
        assert_eq!(*got.lock(), places);
        assert_eq!(req.geocode_in_flight(), Some(false));
    }

    #[test]
    fn test_default_timeout_only_for_one_shot_kinds() {
        let mut continuous = Request::location(Accuracy::Any, Frequency::Continuous);
        continuous.set_default_timeout(Duration::from_secs(30));
        assert_eq!(continuous.timeout(), None);

        let mut one_shot = Request::one_shot(Accuracy::Any);
        one_shot.set_default_timeout(Duration::from_secs(30));
        assert_eq!(one_shot.timeout(), Some(Duration::from_secs(30)));

        let mut explicit = Request::one_shot(Accuracy::Any).with_timeout(Duration::from_secs(5));
        explicit.set_default_timeout(Duration::from_secs(30));
        assert_eq!(explicit.timeout(), Some(Duration::from_secs(5)));
    }

    #[test]
    fn test_timer_survives_pause_until_delivery() {
        let mut req = Request::location(Accuracy::Any, Frequency::Continuous)
            .with_timeout(Duration::from_secs(10));
        req.set_timer_armed(true);
        req.resume();
        req.pause();
        assert!(!req.should_disarm_timer());

        req.resume();
        req.dispatch_reading(&reading(20.0), &InlineExecutor);
        assert!(req.should_disarm_timer());

        req.set_timer_armed(false);
        req.pause();
        req.resume();
        assert!(!req.timer_armed());
        assert!(!req.should_disarm_timer());
    }

    #[test]
    fn test_required_level() {
        let foreground = Request::location(Accuracy::Any, Frequency::Continuous);
        let background = Request::one_shot(Accuracy::Any).with_background(true);
        let heading = Request::heading(1.0).with_background(true);

        assert_eq!(foreground.required_level(), AuthorizationLevel::WhenInUse);
        assert_eq!(background.required_level(), AuthorizationLevel::Always);
        assert_eq!(heading.required_level(), AuthorizationLevel::WhenInUse);
    }

    #[test]
    fn test_builders_ignore_mismatched_kinds() {
        let req = Request::heading(2.0).with_activity(ActivityHint::Airborne);
        assert!(req.requirements().is_none());
        assert_eq!(req.heading_filter(), Some(2.0));
    }
}

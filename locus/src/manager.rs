//! Central coordinator for location requests.
//!
//! [`LocationManager`] owns the registry, the hardware adapter, the
//! authorization gate and the background bridge. Every entry point takes
//! `&mut self` and runs to completion, so no arbitration ever observes a
//! half-updated registry.
//!
//! # Recompute
//!
//! Any operation that changes a request's state ends with a recompute:
//!
//! 1. Start lookups for running geocode requests, cancel stopped ones.
//! 2. No running location or heading requests: stop the hardware.
//! 3. Location services disabled: fail running sensor requests, stop.
//! 4. Background needed but host not background capable: fail running
//!    location requests, stop location updates, start over.
//! 5. Check authorization. Denied fails sensor requests. A shortfall parks
//!    the running requests the current status does not cover, prompts once,
//!    and arbitration carries on with the requests that remain.
//! 6. Arbitrate and apply location settings. If significant-change
//!    monitoring is unsupported, fail the requests pinned to it and retry.
//! 7. Arbitrate and apply the heading filter.
//!
//! The background bridge and per-request timers are synced afterwards.
//!
//! # Timeouts
//!
//! A request with a timeout gets its timer at registration. The window keeps
//! running while the request is paused, idle or waiting for authorization,
//! and ends early only on first delivery, failure or cancel.

use std::time::Duration;

use serde::Serialize;

use crate::auth::{
    AuthorizationDecision, AuthorizationGate, AuthorizationLevel, AuthorizationStatus, StatusUpdate,
};
use crate::background::{AppState, BackgroundBridge, ExtensionToken, HostRuntime, NullHostRuntime};
use crate::error::LocationError;
use crate::geocode::{Geocoder, NullGeocoder, Placemark};
use crate::hardware::{ApplyOutcome, HardwareAdapter, LocationHardware};
use crate::reading::{HeadingReading, LastKnownReading, Reading};
use crate::registry::Registry;
use crate::request::{
    CallbackExecutorRef, Dispatch, InlineExecutor, Request, RequestId, RequestState,
};
use crate::settings::{arbitrate, arbitrate_heading, ArbitratedSettings, Frequency};
use crate::timer::{ManualTimeouts, TimeoutScheduler};

/// Default runtime extension requested while running in background.
pub const DEFAULT_BACKGROUND_EXTENSION: Duration = Duration::from_secs(170);

/// Default heading filter in degrees.
pub const DEFAULT_HEADING_FILTER: f64 = 1.0;

/// Tunables for the manager.
#[derive(Debug, Clone, PartialEq)]
pub struct ManagerConfig {
    /// Duration of each background runtime extension.
    pub background_extension: Duration,
    /// Timeout given to one-shot location and geocode requests that set none.
    pub default_timeout: Option<Duration>,
    /// Filter given to heading requests that set none.
    pub default_heading_filter: f64,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            background_extension: DEFAULT_BACKGROUND_EXTENSION,
            default_timeout: None,
            default_heading_filter: DEFAULT_HEADING_FILTER,
        }
    }
}

impl ManagerConfig {
    pub fn with_background_extension(mut self, extension: Duration) -> Self {
        self.background_extension = extension;
        self
    }

    pub fn with_default_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.default_timeout = timeout;
        self
    }

    pub fn with_default_heading_filter(mut self, degrees: f64) -> Self {
        self.default_heading_filter = degrees;
        self
    }
}

// =============================================================================
// Snapshot
// =============================================================================

/// Serializable view of one registered request.
#[derive(Debug, Clone, Serialize)]
pub struct RequestSnapshot {
    pub id: RequestId,
    pub kind: &'static str,
    pub state: RequestState,
    pub background: bool,
    pub timeout: Option<Duration>,
}

/// Serializable view of the manager.
#[derive(Debug, Clone, Serialize)]
pub struct ManagerSnapshot {
    pub requests: Vec<RequestSnapshot>,
    pub settings: Option<ArbitratedSettings>,
    pub heading_filter: Option<f64>,
    pub authorization: AuthorizationStatus,
    pub prompt_in_flight: bool,
    pub app_state: AppState,
    pub bridge_active: bool,
    pub bridge_windows: u64,
    pub best_reading: Option<Reading>,
    pub latest_reading: Option<Reading>,
}

// =============================================================================
// Builder
// =============================================================================

/// Builds a [`LocationManager`].
pub struct ManagerBuilder {
    hardware: Box<dyn LocationHardware>,
    host: Box<dyn HostRuntime>,
    geocoder: Box<dyn Geocoder>,
    timeouts: Box<dyn TimeoutScheduler>,
    executor: CallbackExecutorRef,
    config: ManagerConfig,
}

impl ManagerBuilder {
    pub fn host(mut self, host: impl HostRuntime + 'static) -> Self {
        self.host = Box::new(host);
        self
    }

    pub fn geocoder(mut self, geocoder: impl Geocoder + 'static) -> Self {
        self.geocoder = Box::new(geocoder);
        self
    }

    pub fn timeouts(mut self, timeouts: impl TimeoutScheduler + 'static) -> Self {
        self.timeouts = Box::new(timeouts);
        self
    }

    pub fn executor(mut self, executor: CallbackExecutorRef) -> Self {
        self.executor = executor;
        self
    }

    pub fn config(mut self, config: ManagerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> LocationManager {
        let gate = AuthorizationGate::new(self.hardware.authorization_status());
        let app_state = self.host.current_app_state();
        tracing::debug!(
            authorization = %gate.status(),
            app_state = %app_state,
            "Location manager created"
        );

        LocationManager {
            registry: Registry::new(),
            adapter: HardwareAdapter::new(self.hardware),
            gate,
            bridge: BackgroundBridge::new(self.config.background_extension),
            host: self.host,
            timeouts: self.timeouts,
            geocoder: self.geocoder,
            executor: self.executor,
            last_known: LastKnownReading::new(),
            app_state,
            config: self.config,
        }
    }
}

// =============================================================================
// Manager
// =============================================================================

enum Pass {
    Done,
    Again,
}

/// Registry and scheduler for location requests.
pub struct LocationManager {
    registry: Registry,
    adapter: HardwareAdapter,
    gate: AuthorizationGate,
    bridge: BackgroundBridge,
    host: Box<dyn HostRuntime>,
    timeouts: Box<dyn TimeoutScheduler>,
    geocoder: Box<dyn Geocoder>,
    executor: CallbackExecutorRef,
    last_known: LastKnownReading,
    app_state: AppState,
    config: ManagerConfig,
}

impl LocationManager {
    /// Starts building a manager around `hardware`.
    ///
    /// Defaults: a foreground-only host, no geocoder, manual timers and
    /// inline callbacks.
    pub fn builder(hardware: impl LocationHardware + 'static) -> ManagerBuilder {
        ManagerBuilder {
            hardware: Box::new(hardware),
            host: Box::new(NullHostRuntime::default()),
            geocoder: Box::new(NullGeocoder),
            timeouts: Box::new(ManualTimeouts::new()),
            executor: std::sync::Arc::new(InlineExecutor),
            config: ManagerConfig::default(),
        }
    }

    // -------------------------------------------------------------------------
    // Accessors
    // -------------------------------------------------------------------------

    pub fn request(&self, id: RequestId) -> Option<&Request> {
        self.registry.get(id)
    }

    pub fn state_of(&self, id: RequestId) -> Option<&RequestState> {
        self.registry.get(id).map(|r| r.state())
    }

    pub fn len(&self) -> usize {
        self.registry.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registry.is_empty()
    }

    pub fn app_state(&self) -> AppState {
        self.app_state
    }

    pub fn authorization_status(&self) -> AuthorizationStatus {
        self.gate.status()
    }

    pub fn applied_settings(&self) -> Option<&ArbitratedSettings> {
        self.adapter.last_applied()
    }

    pub fn last_known(&self) -> &LastKnownReading {
        &self.last_known
    }

    pub fn is_bridge_active(&self) -> bool {
        self.bridge.is_active()
    }

    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    // -------------------------------------------------------------------------
    // Registry operations
    // -------------------------------------------------------------------------

    /// Registers requests. Already registered ids are skipped.
    ///
    /// Returns the ids that were accepted.
    pub fn register(&mut self, requests: impl IntoIterator<Item = Request>) -> Vec<RequestId> {
        let mut accepted = Vec::new();

        for mut request in requests {
            let id = request.id();
            if self.registry.contains(id) {
                tracing::debug!(request = %id, "Request already registered");
                continue;
            }
            if let Some(timeout) = self.config.default_timeout {
                request.set_default_timeout(timeout);
            }
            request.set_default_heading_filter(self.config.default_heading_filter);
            if let Some(after) = request.timeout() {
                self.timeouts.schedule(id, after);
                request.set_timer_armed(true);
            }

            if request.is_eligible(self.app_state) {
                request.resume();
            }
            tracing::debug!(
                request = %id,
                kind = request.kind().name(),
                state = %request.state(),
                "Request registered"
            );
            self.registry.insert(request);
            accepted.push(id);
        }

        if !accepted.is_empty() {
            self.recompute();
        }
        accepted
    }

    /// Cancels and removes requests. Unknown ids are ignored.
    pub fn cancel(&mut self, ids: &[RequestId]) {
        let mut changed = false;
        for &id in ids {
            if let Some(mut request) = self.retire(id) {
                request.cancel();
                tracing::debug!(request = %id, "Request canceled");
                changed = true;
            }
        }
        if changed {
            self.recompute();
        }
    }

    pub fn pause(&mut self, ids: &[RequestId]) {
        let mut changed = false;
        for &id in ids {
            if let Some(request) = self.registry.get_mut(id) {
                changed |= request.pause();
            }
        }
        if changed {
            self.recompute();
        }
    }

    /// Resumes requests eligible for the current app state.
    pub fn resume(&mut self, ids: &[RequestId]) {
        let app_state = self.app_state;
        let mut changed = false;
        for &id in ids {
            if let Some(request) = self.registry.get_mut(id) {
                if !request.is_eligible(app_state) {
                    tracing::debug!(request = %id, app_state = %app_state, "Request not eligible to resume");
                    continue;
                }
                changed |= request.resume();
            }
        }
        if changed {
            self.recompute();
        }
    }

    // -------------------------------------------------------------------------
    // Sensor events
    // -------------------------------------------------------------------------

    /// Handles a batch of location readings from the sensor.
    pub fn on_readings(&mut self, readings: &[Reading]) {
        for reading in readings {
            self.last_known.observe(reading);
        }

        let Some(latest) = readings
            .iter()
            .filter(|r| r.is_valid())
            .max_by_key(|r| r.timestamp)
        else {
            return;
        };

        let executor = self.executor.as_ref();
        let mut completed = Vec::new();
        let mut delivered = 0usize;
        for request in self.registry.locations_mut() {
            match request.dispatch_reading(latest, executor) {
                Dispatch::Completed => completed.push(request.id()),
                Dispatch::Delivered => delivered += 1,
                Dispatch::Skipped => {}
            }
        }
        tracing::debug!(
            delivered,
            completed = completed.len(),
            accuracy = latest.horizontal_accuracy,
            "Reading fanned out"
        );

        if completed.is_empty() {
            self.sync_timers();
        } else {
            for id in completed {
                self.retire(id);
            }
            self.recompute();
        }
    }

    /// Delivers a transient sensor error to every running sensor request.
    pub fn on_sensor_error(&mut self, message: impl Into<String>) {
        let error = LocationError::Sensor(message.into());
        tracing::warn!(error = %error, "Sensor reported an error");

        let executor = self.executor.as_ref();
        for request in self.registry.sensor_requests_mut() {
            if request.is_running() {
                request.dispatch_error(error.clone(), executor);
            }
        }
    }

    pub fn on_heading(&mut self, heading: &HeadingReading) {
        let executor = self.executor.as_ref();
        for request in self.registry.headings_mut() {
            request.dispatch_heading(heading, executor);
        }
        self.sync_timers();
    }

    /// Completes or fails a geocode request.
    pub fn on_geocode_result(&mut self, id: RequestId, result: Result<Vec<Placemark>, String>) {
        let executor = self.executor.as_ref();
        let Some(request) = self.registry.get_mut(id) else {
            tracing::debug!(request = %id, "Geocode result for unknown request");
            return;
        };
        if request.geocode_in_flight() != Some(true) {
            tracing::debug!(request = %id, "Geocode result without a lookup in flight");
            return;
        }

        match result {
            Ok(places) => {
                if request.dispatch_places(&places, executor) == Dispatch::Completed {
                    self.retire(id);
                }
            }
            Err(message) => {
                request.set_geocode_in_flight(false);
                request.dispatch_error(LocationError::Geocoding(message), executor);
            }
        }
        self.recompute();
    }

    /// Handles a fired timer. Ignored unless the timer for `id` is armed.
    pub fn on_timeout(&mut self, id: RequestId) {
        let executor = self.executor.as_ref();
        let Some(request) = self.registry.get_mut(id) else {
            return;
        };
        if !request.timer_armed() {
            tracing::trace!(request = %id, "Ignoring timeout for disarmed timer");
            return;
        }
        request.set_timer_armed(false);
        self.timeouts.cancel(id);

        let window = request.timeout().unwrap_or_default();
        if request.dispatch_error(LocationError::Timeout(window), executor) {
            self.recompute();
        }
    }

    // -------------------------------------------------------------------------
    // Platform events
    // -------------------------------------------------------------------------

    pub fn on_authorization_change(&mut self, status: AuthorizationStatus) {
        let (old, new) = match self.gate.update(status) {
            StatusUpdate::Unchanged => return,
            StatusUpdate::Kept(status) => {
                self.settle_waiting_requests(status);
                self.recompute();
                return;
            }
            StatusUpdate::Changed { old, new } => (old, new),
        };

        let executor = self.executor.as_ref();
        for request in self.registry.iter() {
            request.dispatch_authorization_change(old, new, executor);
        }

        if new.is_denied() {
            self.fail_sensor_requests(LocationError::AuthorizationDenied(new), true);
        } else if new.is_granted() {
            let app_state = self.app_state;
            for request in self.registry.iter_mut() {
                if request.is_eligible(app_state) {
                    request.resume();
                }
            }
        }
        self.recompute();
    }

    pub fn on_app_state_change(&mut self, app_state: AppState) {
        if app_state == self.app_state {
            return;
        }
        tracing::info!(from = %self.app_state, to = %app_state, "App state changed");
        self.app_state = app_state;

        for request in self.registry.iter_mut() {
            let eligible = request.is_eligible(app_state);
            if !eligible && request.is_running() {
                request.pause();
            } else if eligible
                && matches!(request.state(), RequestState::Idle | RequestState::Paused)
            {
                request.resume();
            }
        }

        if app_state == AppState::Foreground {
            self.bridge.stop(self.host.as_mut());
        }
        self.recompute();
    }

    /// Renews a runtime extension that is about to expire.
    pub fn on_runtime_expiring(&mut self, token: ExtensionToken) {
        self.bridge
            .on_expiring(token, self.host.as_mut(), &mut self.adapter);
    }

    // -------------------------------------------------------------------------
    // Snapshot and teardown
    // -------------------------------------------------------------------------

    pub fn snapshot(&self) -> ManagerSnapshot {
        ManagerSnapshot {
            requests: self
                .registry
                .iter()
                .map(|r| RequestSnapshot {
                    id: r.id(),
                    kind: r.kind().name(),
                    state: r.state().clone(),
                    background: r.is_background(),
                    timeout: r.timeout(),
                })
                .collect(),
            settings: self.adapter.last_applied().copied(),
            heading_filter: self.adapter.heading_filter(),
            authorization: self.gate.status(),
            prompt_in_flight: self.gate.prompt_in_flight(),
            app_state: self.app_state,
            bridge_active: self.bridge.is_active(),
            bridge_windows: self.bridge.windows(),
            best_reading: self.last_known.best().cloned(),
            latest_reading: self.last_known.latest().cloned(),
        }
    }

    /// Cancels every request and releases hardware and runtime extensions.
    pub fn shutdown(&mut self) {
        for id in self.registry.ids() {
            if let Some(mut request) = self.retire(id) {
                request.cancel();
            }
        }
        self.adapter.stop_all();
        self.bridge.stop(self.host.as_mut());
        tracing::info!("Location manager shut down");
    }

    // -------------------------------------------------------------------------
    // Recompute
    // -------------------------------------------------------------------------

    fn recompute(&mut self) {
        while let Pass::Again = self.recompute_pass() {}
        self.sync_bridge();
        self.sync_timers();
    }

    fn recompute_pass(&mut self) -> Pass {
        self.sync_geocoding();

        if !self.registry.has_running_sensor_requests() {
            tracing::debug!("No running sensor requests, stopping hardware");
            self.adapter.apply(None);
            self.adapter.apply_heading(None);
            return Pass::Done;
        }

        if !self.adapter.services_enabled() {
            self.fail_sensor_requests(LocationError::ServiceUnavailable, false);
            self.adapter.apply(None);
            self.adapter.apply_heading(None);
            return Pass::Done;
        }

        let needs_background = self.registry.has_running_background_location();
        if needs_background && !self.adapter.is_background_capable() {
            self.fail_location_requests(LocationError::BackgroundModeNotConfigured, |_| true);
            self.adapter.apply(None);
            return Pass::Again;
        }

        let required = if needs_background {
            AuthorizationLevel::Always
        } else {
            AuthorizationLevel::WhenInUse
        };
        match self.gate.evaluate(required) {
            AuthorizationDecision::Sufficient => {}
            AuthorizationDecision::Denied(status) => {
                self.fail_sensor_requests(LocationError::AuthorizationDenied(status), true);
                return Pass::Again;
            }
            AuthorizationDecision::AwaitingPrompt => {
                self.park_uncovered_requests();
                return Pass::Again;
            }
            AuthorizationDecision::Prompt => {
                self.park_uncovered_requests();
                self.gate.begin_prompt();
                if let Err(error) = self.adapter.request_authorization(required) {
                    tracing::warn!(error = %error, "Authorization prompt failed");
                    self.gate.abandon_prompt();
                    self.fail_waiting_requests(error);
                }
                return Pass::Again;
            }
        }

        let settings = arbitrate(&self.registry.running_requirements());
        tracing::debug!(settings = ?settings, "Arbitrated location settings");
        if self.adapter.apply(settings) == ApplyOutcome::Unsupported {
            self.fail_location_requests(LocationError::SignificantChangeUnsupported, |r| {
                r.requirements()
                    .map_or(false, |req| req.frequency == Frequency::Significant)
            });
            let settings = arbitrate(&self.registry.running_requirements());
            self.adapter.apply(settings);
        }

        let heading = arbitrate_heading(self.registry.running_heading_filters());
        self.adapter.apply_heading(heading);

        Pass::Done
    }

    fn sync_geocoding(&mut self) {
        for request in self.registry.geocodes_mut() {
            let id = request.id();
            match (request.is_running(), request.geocode_in_flight()) {
                (true, Some(false)) => {
                    if let Some(query) = request.geocode_query() {
                        tracing::debug!(request = %id, query = %query, "Starting geocode lookup");
                        self.geocoder.geocode(id, query);
                    }
                    request.set_geocode_in_flight(true);
                }
                (false, Some(true)) => {
                    tracing::debug!(request = %id, "Canceling geocode lookup");
                    self.geocoder.cancel(id);
                    request.set_geocode_in_flight(false);
                }
                _ => {}
            }
        }
    }

    fn sync_bridge(&mut self) {
        let wanted = self.app_state == AppState::Background
            && self.registry.has_running_background_location();
        if wanted {
            self.bridge.start(self.host.as_mut(), &mut self.adapter);
        } else if self.bridge.is_active() {
            self.bridge.stop(self.host.as_mut());
        }
    }

    fn sync_timers(&mut self) {
        for request in self.registry.iter_mut() {
            if request.should_disarm_timer() {
                self.timeouts.cancel(request.id());
                request.set_timer_armed(false);
            }
        }
    }

    // -------------------------------------------------------------------------
    // Helpers
    // -------------------------------------------------------------------------

    /// Removes a request and releases its timer and lookup.
    fn retire(&mut self, id: RequestId) -> Option<Request> {
        let mut request = self.registry.remove(id)?;
        if request.timer_armed() {
            self.timeouts.cancel(id);
            request.set_timer_armed(false);
        }
        if request.geocode_in_flight() == Some(true) {
            self.geocoder.cancel(id);
            request.set_geocode_in_flight(false);
        }
        Some(request)
    }

    /// Fails running (and optionally waiting) location and heading requests.
    fn fail_sensor_requests(&mut self, error: LocationError, include_waiting: bool) {
        let executor = self.executor.as_ref();
        for request in self.registry.sensor_requests_mut() {
            let affected = request.is_running()
                || (include_waiting
                    && *request.state() == RequestState::WaitingForAuthorization);
            if affected {
                request.dispatch_error(error.clone(), executor);
            }
        }
    }

    fn fail_location_requests<F>(&mut self, error: LocationError, filter: F)
    where
        F: Fn(&Request) -> bool,
    {
        let executor = self.executor.as_ref();
        for request in self.registry.locations_mut() {
            if request.is_running() && filter(request) {
                request.dispatch_error(error.clone(), executor);
            }
        }
    }

    /// Parks running sensor requests the current status does not cover.
    fn park_uncovered_requests(&mut self) {
        let status = self.gate.status();
        for request in self.registry.sensor_requests_mut() {
            if request.is_running() && !status.satisfies(request.required_level()) {
                request.await_authorization();
            }
        }
    }

    fn fail_waiting_requests(&mut self, error: LocationError) {
        let executor = self.executor.as_ref();
        for request in self.registry.sensor_requests_mut() {
            if *request.state() == RequestState::WaitingForAuthorization {
                request.dispatch_error(error.clone(), executor);
            }
        }
    }

    /// Resolves parked requests after the user answered a prompt by keeping
    /// `status`: covered requests resume, the rest fail.
    fn settle_waiting_requests(&mut self, status: AuthorizationStatus) {
        let app_state = self.app_state;
        let executor = self.executor.as_ref();
        for request in self.registry.sensor_requests_mut() {
            if *request.state() != RequestState::WaitingForAuthorization {
                continue;
            }
            if status.satisfies(request.required_level()) && request.is_eligible(app_state) {
                request.resume();
            } else {
                request.dispatch_error(LocationError::AuthorizationDenied(status), executor);
            }
        }
    }
}

impl std::fmt::Debug for LocationManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocationManager")
            .field("requests", &self.registry.len())
            .field("adapter", &self.adapter)
            .field("authorization", &self.gate.status())
            .field("app_state", &self.app_state)
            .field("bridge", &self.bridge)
            .finish()
    }
}

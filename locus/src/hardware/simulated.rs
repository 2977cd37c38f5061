//! Simulated location sensor.
//!
//! [`SimulatedHardware`] implements [`LocationHardware`] by recording every
//! call. The paired [`HardwareLog`] is the test-side handle: it reads the
//! recorded calls and the resulting sensor state, and flips capability flags
//! (services enabled, background capable, significant-change support,
//! authorization status).

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use crate::auth::{AuthorizationLevel, AuthorizationStatus};
use crate::error::LocationError;
use crate::settings::{Accuracy, ActivityHint};

use super::{HardwareCommand, LocationHardware};

/// One recorded driver call.
#[derive(Debug, Clone, PartialEq)]
pub enum HardwareEvent {
    Command(HardwareCommand),
    AuthorizationRequested(AuthorizationLevel),
}

/// What the simulated sensor is currently doing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SensorState {
    pub accuracy: Option<Accuracy>,
    pub activity: Option<ActivityHint>,
    pub continuous: bool,
    pub significant: bool,
    pub deferred: Option<(f64, Duration)>,
    pub heading: Option<f64>,
}

#[derive(Debug)]
struct Inner {
    events: Vec<HardwareEvent>,
    sensor: SensorState,
    services_enabled: bool,
    background_capable: bool,
    supports_significant: bool,
    authorization: AuthorizationStatus,
    authorization_error: Option<LocationError>,
}

/// Test-side view of a [`SimulatedHardware`].
#[derive(Debug, Clone)]
pub struct HardwareLog {
    inner: Arc<Mutex<Inner>>,
}

impl HardwareLog {
    pub fn events(&self) -> Vec<HardwareEvent> {
        self.inner.lock().events.clone()
    }

    /// Recorded driver commands, without authorization requests.
    pub fn commands(&self) -> Vec<HardwareCommand> {
        self.inner
            .lock()
            .events
            .iter()
            .filter_map(|e| match e {
                HardwareEvent::Command(c) => Some(*c),
                HardwareEvent::AuthorizationRequested(_) => None,
            })
            .collect()
    }

    pub fn count<F>(&self, predicate: F) -> usize
    where
        F: Fn(&HardwareEvent) -> bool,
    {
        self.inner.lock().events.iter().filter(|e| predicate(e)).count()
    }

    pub fn clear(&self) {
        self.inner.lock().events.clear();
    }

    pub fn sensor(&self) -> SensorState {
        self.inner.lock().sensor.clone()
    }

    pub fn authorization_requests(&self) -> usize {
        self.count(|e| matches!(e, HardwareEvent::AuthorizationRequested(_)))
    }

    pub fn set_services_enabled(&self, enabled: bool) {
        self.inner.lock().services_enabled = enabled;
    }

    pub fn set_background_capable(&self, capable: bool) {
        self.inner.lock().background_capable = capable;
    }

    pub fn set_supports_significant(&self, supported: bool) {
        self.inner.lock().supports_significant = supported;
    }

    /// Sets the status the driver reports. Does not notify the manager.
    pub fn set_authorization_status(&self, status: AuthorizationStatus) {
        self.inner.lock().authorization = status;
    }

    /// Makes subsequent permission prompts fail with `error`.
    pub fn fail_authorization_requests(&self, error: Option<LocationError>) {
        self.inner.lock().authorization_error = error;
    }
}

/// Recording implementation of [`LocationHardware`].
#[derive(Debug)]
pub struct SimulatedHardware {
    log: HardwareLog,
}

impl SimulatedHardware {
    /// Creates a capable, authorized, enabled sensor and its log handle.
    pub fn new() -> (Self, HardwareLog) {
        let log = HardwareLog {
            inner: Arc::new(Mutex::new(Inner {
                events: Vec::new(),
                sensor: SensorState::default(),
                services_enabled: true,
                background_capable: true,
                supports_significant: true,
                authorization: AuthorizationStatus::Always,
                authorization_error: None,
            })),
        };
        (Self { log: log.clone() }, log)
    }

    fn record(&mut self, command: HardwareCommand) {
        let mut inner = self.log.inner.lock();
        let sensor = &mut inner.sensor;
        match command {
            HardwareCommand::SetAccuracy(a) => sensor.accuracy = Some(a),
            HardwareCommand::SetActivityHint(h) => sensor.activity = Some(h),
            HardwareCommand::StartContinuous => sensor.continuous = true,
            HardwareCommand::StopContinuous => sensor.continuous = false,
            HardwareCommand::StartSignificantChange => sensor.significant = true,
            HardwareCommand::StopSignificantChange => sensor.significant = false,
            HardwareCommand::AllowDeferred { distance, timeout } => {
                sensor.deferred = Some((distance, timeout))
            }
            HardwareCommand::DisallowDeferred => sensor.deferred = None,
            HardwareCommand::StartHeading(f) => sensor.heading = Some(f),
            HardwareCommand::StopHeading => sensor.heading = None,
            HardwareCommand::RequestLocation => {}
        }
        inner.events.push(HardwareEvent::Command(command));
    }
}

impl LocationHardware for SimulatedHardware {
    fn set_accuracy(&mut self, accuracy: Accuracy) {
        self.record(HardwareCommand::SetAccuracy(accuracy));
    }

    fn set_activity_hint(&mut self, activity: ActivityHint) {
        self.record(HardwareCommand::SetActivityHint(activity));
    }

    fn start_continuous(&mut self) {
        self.record(HardwareCommand::StartContinuous);
    }

    fn stop_continuous(&mut self) {
        self.record(HardwareCommand::StopContinuous);
    }

    fn start_significant_change_monitoring(&mut self) {
        self.record(HardwareCommand::StartSignificantChange);
    }

    fn stop_significant_change_monitoring(&mut self) {
        self.record(HardwareCommand::StopSignificantChange);
    }

    fn allow_deferred_updates(&mut self, distance: f64, timeout: Duration) {
        self.record(HardwareCommand::AllowDeferred { distance, timeout });
    }

    fn disallow_deferred_updates(&mut self) {
        self.record(HardwareCommand::DisallowDeferred);
    }

    fn start_heading_updates(&mut self, filter_degrees: f64) {
        self.record(HardwareCommand::StartHeading(filter_degrees));
    }

    fn stop_heading_updates(&mut self) {
        self.record(HardwareCommand::StopHeading);
    }

    fn request_location(&mut self) {
        self.record(HardwareCommand::RequestLocation);
    }

    fn supports_significant_change_monitoring(&self) -> bool {
        self.log.inner.lock().supports_significant
    }

    fn is_background_capable(&self) -> bool {
        self.log.inner.lock().background_capable
    }

    fn services_enabled(&self) -> bool {
        self.log.inner.lock().services_enabled
    }

    fn authorization_status(&self) -> AuthorizationStatus {
        self.log.inner.lock().authorization
    }

    fn request_authorization(&mut self, level: AuthorizationLevel) -> Result<(), LocationError> {
        let mut inner = self.log.inner.lock();
        inner.events.push(HardwareEvent::AuthorizationRequested(level));
        match &inner.authorization_error {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }
}

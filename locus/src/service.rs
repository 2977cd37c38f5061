//! Async front end for the location manager.
//!
//! The [`LocationManager`] is single-writer by construction. The service
//! runs it inside one tokio task and feeds it [`Command`]s over an unbounded
//! channel, so every operation runs to completion before the next starts.
//!
//! # Usage
//!
//! ```ignore
//! let (service, inbox) = LocationService::channel();
//! let task = inbox
//!     .with_lifecycle(app_state_rx)
//!     .spawn(LocationManager::builder(hardware).host(host));
//!
//! let id = service.submit_location_request(
//!     Accuracy::HOUSE,
//!     Frequency::Continuous,
//!     ActivityHint::Fitness,
//!     None,
//!     |reading| println!("{:?}", reading),
//!     |error| eprintln!("{}", error),
//! )?;
//!
//! service.readings(vec![reading])?;
//! service.shutdown();
//! task.await?;
//! ```

use std::collections::HashMap;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::auth::AuthorizationStatus;
use crate::background::{AppState, ExtensionToken};
use crate::error::LocationError;
use crate::geocode::{GeocodeQuery, Placemark};
use crate::manager::{LocationManager, ManagerBuilder, ManagerSnapshot};
use crate::reading::{HeadingReading, Reading};
use crate::request::{Request, RequestId};
use crate::settings::{Accuracy, ActivityHint, Frequency};
use crate::timer::TimeoutScheduler;

/// Errors returned by [`LocationService`] calls.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("location service is shutting down")]
    ShuttingDown,
}

/// Work items for the service task.
pub(crate) enum Command {
    Register(Vec<Request>),
    Cancel(Vec<RequestId>),
    Pause(Vec<RequestId>),
    Resume(Vec<RequestId>),
    Readings(Vec<Reading>),
    SensorError(String),
    Heading(HeadingReading),
    Authorization(AuthorizationStatus),
    AppState(AppState),
    GeocodeResult {
        id: RequestId,
        result: Result<Vec<Placemark>, String>,
    },
    TimeoutFired(RequestId),
    RuntimeExpiring(ExtensionToken),
    Snapshot(oneshot::Sender<ManagerSnapshot>),
}

impl Command {
    fn name(&self) -> &'static str {
        match self {
            Command::Register(_) => "register",
            Command::Cancel(_) => "cancel",
            Command::Pause(_) => "pause",
            Command::Resume(_) => "resume",
            Command::Readings(_) => "readings",
            Command::SensorError(_) => "sensor_error",
            Command::Heading(_) => "heading",
            Command::Authorization(_) => "authorization",
            Command::AppState(_) => "app_state",
            Command::GeocodeResult { .. } => "geocode_result",
            Command::TimeoutFired(_) => "timeout",
            Command::RuntimeExpiring(_) => "runtime_expiring",
            Command::Snapshot(_) => "snapshot",
        }
    }
}

// =============================================================================
// Timers
// =============================================================================

/// Timer scheduler backed by tokio sleeps.
///
/// Each armed request owns one spawned task that posts
/// `Command::TimeoutFired` back to the service. Re-arming or canceling aborts
/// the task. Must be used from within a tokio runtime.
pub struct TokioTimeouts {
    tx: mpsc::WeakUnboundedSender<Command>,
    timers: HashMap<RequestId, JoinHandle<()>>,
}

impl TokioTimeouts {
    pub(crate) fn new(tx: mpsc::WeakUnboundedSender<Command>) -> Self {
        Self {
            tx,
            timers: HashMap::new(),
        }
    }
}

impl TimeoutScheduler for TokioTimeouts {
    fn schedule(&mut self, id: RequestId, after: Duration) {
        self.timers.retain(|_, handle| !handle.is_finished());

        let tx = self.tx.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(after).await;
            if let Some(tx) = tx.upgrade() {
                let _ = tx.send(Command::TimeoutFired(id));
            }
        });
        if let Some(previous) = self.timers.insert(id, handle) {
            previous.abort();
        }
    }

    fn cancel(&mut self, id: RequestId) {
        if let Some(handle) = self.timers.remove(&id) {
            handle.abort();
        }
    }
}

impl Drop for TokioTimeouts {
    fn drop(&mut self) {
        for (_, handle) in self.timers.drain() {
            handle.abort();
        }
    }
}

// =============================================================================
// Service handle
// =============================================================================

/// Cloneable handle for submitting work to the service task.
#[derive(Clone)]
pub struct LocationService {
    tx: mpsc::UnboundedSender<Command>,
    shutdown: CancellationToken,
}

/// Receiving half of the service, consumed when the task starts.
pub struct ServiceInbox {
    rx: mpsc::UnboundedReceiver<Command>,
    weak_tx: mpsc::WeakUnboundedSender<Command>,
    shutdown: CancellationToken,
    lifecycle: Option<watch::Receiver<AppState>>,
}

impl LocationService {
    /// Creates a service handle and the inbox that drives it.
    pub fn channel() -> (LocationService, ServiceInbox) {
        let (tx, rx) = mpsc::unbounded_channel();
        let shutdown = CancellationToken::new();
        let inbox = ServiceInbox {
            rx,
            weak_tx: tx.downgrade(),
            shutdown: shutdown.clone(),
            lifecycle: None,
        };
        (LocationService { tx, shutdown }, inbox)
    }

    fn send(&self, command: Command) -> Result<(), ServiceError> {
        if self.shutdown.is_cancelled() {
            return Err(ServiceError::ShuttingDown);
        }
        self.tx.send(command).map_err(|_| ServiceError::ShuttingDown)
    }

    // -------------------------------------------------------------------------
    // Requests
    // -------------------------------------------------------------------------

    /// Registers a fully built request.
    pub fn submit(&self, request: Request) -> Result<RequestId, ServiceError> {
        let id = request.id();
        self.send(Command::Register(vec![request]))?;
        Ok(id)
    }

    /// Registers a continuous location request.
    pub fn submit_location_request<R, E>(
        &self,
        accuracy: Accuracy,
        frequency: Frequency,
        activity: ActivityHint,
        timeout: Option<Duration>,
        on_reading: R,
        on_error: E,
    ) -> Result<RequestId, ServiceError>
    where
        R: Fn(&Reading) + Send + Sync + 'static,
        E: Fn(&LocationError) + Send + Sync + 'static,
    {
        let mut request = Request::location(accuracy, frequency)
            .with_activity(activity)
            .on_reading(on_reading)
            .on_error(on_error);
        if let Some(timeout) = timeout {
            request = request.with_timeout(timeout);
        }
        self.submit(request)
    }

    /// Registers a reverse (or forward) geocoding lookup.
    pub fn submit_reverse_geocode<P, E>(
        &self,
        query: GeocodeQuery,
        timeout: Option<Duration>,
        on_places: P,
        on_error: E,
    ) -> Result<RequestId, ServiceError>
    where
        P: Fn(&[Placemark]) + Send + Sync + 'static,
        E: Fn(&LocationError) + Send + Sync + 'static,
    {
        let mut request = Request::geocode(query).on_places(on_places).on_error(on_error);
        if let Some(timeout) = timeout {
            request = request.with_timeout(timeout);
        }
        self.submit(request)
    }

    /// Registers a heading request. `None` uses the configured default filter.
    pub fn submit_heading_request<H, E>(
        &self,
        filter_degrees: Option<f64>,
        on_heading: H,
        on_error: E,
    ) -> Result<RequestId, ServiceError>
    where
        H: Fn(&HeadingReading) + Send + Sync + 'static,
        E: Fn(&LocationError) + Send + Sync + 'static,
    {
        let request = match filter_degrees {
            Some(filter) => Request::heading(filter),
            None => Request::default_heading(),
        };
        self.submit(request.on_heading(on_heading).on_error(on_error))
    }

    pub fn cancel(&self, ids: Vec<RequestId>) -> Result<(), ServiceError> {
        self.send(Command::Cancel(ids))
    }

    pub fn pause(&self, ids: Vec<RequestId>) -> Result<(), ServiceError> {
        self.send(Command::Pause(ids))
    }

    pub fn resume(&self, ids: Vec<RequestId>) -> Result<(), ServiceError> {
        self.send(Command::Resume(ids))
    }

    // -------------------------------------------------------------------------
    // Platform event feeds
    // -------------------------------------------------------------------------

    pub fn readings(&self, readings: Vec<Reading>) -> Result<(), ServiceError> {
        self.send(Command::Readings(readings))
    }

    pub fn sensor_error(&self, message: impl Into<String>) -> Result<(), ServiceError> {
        self.send(Command::SensorError(message.into()))
    }

    pub fn heading(&self, heading: HeadingReading) -> Result<(), ServiceError> {
        self.send(Command::Heading(heading))
    }

    pub fn authorization_changed(&self, status: AuthorizationStatus) -> Result<(), ServiceError> {
        self.send(Command::Authorization(status))
    }

    pub fn app_state_changed(&self, state: AppState) -> Result<(), ServiceError> {
        self.send(Command::AppState(state))
    }

    pub fn geocode_result(
        &self,
        id: RequestId,
        result: Result<Vec<Placemark>, String>,
    ) -> Result<(), ServiceError> {
        self.send(Command::GeocodeResult { id, result })
    }

    pub fn runtime_expiring(&self, token: ExtensionToken) -> Result<(), ServiceError> {
        self.send(Command::RuntimeExpiring(token))
    }

    // -------------------------------------------------------------------------
    // Introspection and teardown
    // -------------------------------------------------------------------------

    /// Returns the manager state after every previously sent command ran.
    pub async fn snapshot(&self) -> Result<ManagerSnapshot, ServiceError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Snapshot(reply))?;
        rx.await.map_err(|_| ServiceError::ShuttingDown)
    }

    /// Stops the service task. The manager releases all hardware on exit.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown.is_cancelled()
    }
}

// =============================================================================
// Service task
// =============================================================================

impl ServiceInbox {
    /// Subscribes the service to app lifecycle changes.
    pub fn with_lifecycle(mut self, lifecycle: watch::Receiver<AppState>) -> Self {
        self.lifecycle = Some(lifecycle);
        self
    }

    /// Spawns the service task onto the current runtime.
    pub fn spawn(self, builder: ManagerBuilder) -> JoinHandle<()> {
        tokio::spawn(self.run(builder))
    }

    /// Runs the service until shutdown or until every handle is dropped.
    pub async fn run(self, builder: ManagerBuilder) {
        let ServiceInbox {
            mut rx,
            weak_tx,
            shutdown,
            mut lifecycle,
        } = self;

        let mut manager = builder.timeouts(TokioTimeouts::new(weak_tx)).build();
        if let Some(rx) = lifecycle.as_mut() {
            let initial = *rx.borrow_and_update();
            manager.on_app_state_change(initial);
        }
        tracing::info!("Location service started");

        loop {
            tokio::select! {
                biased;

                _ = shutdown.cancelled() => {
                    tracing::info!("Location service shutdown requested");
                    break;
                }

                command = rx.recv() => match command {
                    Some(command) => handle(&mut manager, command),
                    None => {
                        tracing::debug!("All service handles dropped");
                        break;
                    }
                },

                state = next_app_state(&mut lifecycle) => match state {
                    Some(state) => manager.on_app_state_change(state),
                    None => {
                        tracing::debug!("Lifecycle publisher dropped, unsubscribing");
                        lifecycle = None;
                    }
                },
            }
        }

        manager.shutdown();
        tracing::info!("Location service stopped");
    }
}

async fn next_app_state(lifecycle: &mut Option<watch::Receiver<AppState>>) -> Option<AppState> {
    match lifecycle {
        Some(rx) => match rx.changed().await {
            Ok(()) => Some(*rx.borrow_and_update()),
            Err(_) => None,
        },
        None => std::future::pending().await,
    }
}

fn handle(manager: &mut LocationManager, command: Command) {
    tracing::trace!(command = command.name(), "Service command");
    match command {
        Command::Register(requests) => {
            manager.register(requests);
        }
        Command::Cancel(ids) => manager.cancel(&ids),
        Command::Pause(ids) => manager.pause(&ids),
        Command::Resume(ids) => manager.resume(&ids),
        Command::Readings(readings) => manager.on_readings(&readings),
        Command::SensorError(message) => manager.on_sensor_error(message),
        Command::Heading(heading) => manager.on_heading(&heading),
        Command::Authorization(status) => manager.on_authorization_change(status),
        Command::AppState(state) => manager.on_app_state_change(state),
        Command::GeocodeResult { id, result } => manager.on_geocode_result(id, result),
        Command::TimeoutFired(id) => manager.on_timeout(id),
        Command::RuntimeExpiring(token) => manager.on_runtime_expiring(token),
        Command::Snapshot(reply) => {
            let _ = reply.send(manager.snapshot());
        }
    }
}

//! Per-request timeout timers.
//!
//! The manager arms a timer when a request with a timeout is registered and
//! disarms it on first delivery, failure or cancel. Firings come back through
//! `LocationManager::on_timeout`, which ignores requests whose timer is no
//! longer armed.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use crate::request::RequestId;

/// Schedules timer firings for requests.
pub trait TimeoutScheduler: Send {
    /// Arms (or re-arms) the timer for `id`.
    fn schedule(&mut self, id: RequestId, after: Duration);
    /// Disarms the timer for `id`, if any.
    fn cancel(&mut self, id: RequestId);
}

/// Scheduler that records armed timers without firing them.
///
/// Tests and the simulator fire timers by calling `on_timeout` themselves.
/// Clones share state, so a handle kept outside the manager sees every
/// schedule and cancel.
#[derive(Debug, Clone, Default)]
pub struct ManualTimeouts {
    armed: Arc<Mutex<HashMap<RequestId, Duration>>>,
}

impl ManualTimeouts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_armed(&self, id: RequestId) -> bool {
        self.armed.lock().contains_key(&id)
    }

    pub fn armed_for(&self, id: RequestId) -> Option<Duration> {
        self.armed.lock().get(&id).copied()
    }

    pub fn armed_count(&self) -> usize {
        self.armed.lock().len()
    }
}

impl TimeoutScheduler for ManualTimeouts {
    fn schedule(&mut self, id: RequestId, after: Duration) {
        self.armed.lock().insert(id, after);
    }

    fn cancel(&mut self, id: RequestId) {
        self.armed.lock().remove(&id);
    }
}

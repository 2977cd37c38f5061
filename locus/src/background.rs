//! Background runtime bridge.
//!
//! While the app is in background and a background-eligible location request
//! runs, the host must be asked to keep the process alive. The bridge holds one
//! runtime extension at a time and polls the sensor once per extension window.
//!
//! # Lifecycle
//!
//! ```text
//! start()                 -> extend_runtime(d) = T1, poll
//! on_expiring(T1)         -> end(T1), extend_runtime(d) = T2, poll
//! on_expiring(T1) again   -> ignored (stale token)
//! stop()                  -> end(T2)
//! ```

use std::fmt;
use std::time::Duration;

use serde::Serialize;

use crate::hardware::HardwareAdapter;

/// Whether the host app is on screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum AppState {
    Foreground,
    Background,
}

impl fmt::Display for AppState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppState::Foreground => write!(f, "foreground"),
            AppState::Background => write!(f, "background"),
        }
    }
}

/// Handle for one granted runtime extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct ExtensionToken(pub u64);

impl fmt::Display for ExtensionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ext-{}", self.0)
    }
}

/// OS background-execution services.
///
/// Expiry is reported asynchronously by the host through
/// `LocationManager::on_runtime_expiring`.
pub trait HostRuntime: Send {
    fn extend_runtime(&mut self, duration: Duration) -> ExtensionToken;
    fn end_runtime_extension(&mut self, token: ExtensionToken);
    fn current_app_state(&self) -> AppState;
}

/// Host that grants every extension and is always in foreground.
#[derive(Debug, Default)]
pub struct NullHostRuntime {
    next_token: u64,
}

impl HostRuntime for NullHostRuntime {
    fn extend_runtime(&mut self, _duration: Duration) -> ExtensionToken {
        self.next_token += 1;
        ExtensionToken(self.next_token)
    }

    fn end_runtime_extension(&mut self, _token: ExtensionToken) {}

    fn current_app_state(&self) -> AppState {
        AppState::Foreground
    }
}

/// Keeps the process alive while background location work is pending.
#[derive(Debug)]
pub struct BackgroundBridge {
    extension: Duration,
    active: Option<ExtensionToken>,
    windows: u64,
}

impl BackgroundBridge {
    pub fn new(extension: Duration) -> Self {
        Self {
            extension,
            active: None,
            windows: 0,
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    pub fn active_token(&self) -> Option<ExtensionToken> {
        self.active
    }

    /// Number of extension windows granted so far.
    pub fn windows(&self) -> u64 {
        self.windows
    }

    /// Requests an extension and polls the sensor. No-op if already active.
    pub fn start(&mut self, host: &mut dyn HostRuntime, adapter: &mut HardwareAdapter) {
        if self.active.is_some() {
            return;
        }
        let token = host.extend_runtime(self.extension);
        self.active = Some(token);
        self.windows += 1;
        tracing::info!(token = %token, extension_secs = self.extension.as_secs(), "Background runtime bridge started");
        adapter.poll();
    }

    /// Renews the extension that is about to expire.
    ///
    /// Returns false if `token` is not the active extension.
    pub fn on_expiring(
        &mut self,
        token: ExtensionToken,
        host: &mut dyn HostRuntime,
        adapter: &mut HardwareAdapter,
    ) -> bool {
        if self.active != Some(token) {
            tracing::debug!(token = %token, "Ignoring expiry for stale runtime extension");
            return false;
        }
        host.end_runtime_extension(token);
        let renewed = host.extend_runtime(self.extension);
        self.active = Some(renewed);
        self.windows += 1;
        tracing::debug!(old = %token, new = %renewed, "Runtime extension renewed");
        adapter.poll();
        true
    }

    /// Ends the active extension, if any.
    pub fn stop(&mut self, host: &mut dyn HostRuntime) {
        if let Some(token) = self.active.take() {
            host.end_runtime_extension(token);
            tracing::info!(token = %token, "Background runtime bridge stopped");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hardware::simulated::{HardwareEvent, SimulatedHardware};
    use crate::hardware::HardwareCommand;

    #[derive(Default)]
    struct RecordingHost {
        next: u64,
        ended: Vec<ExtensionToken>,
    }

    impl HostRuntime for RecordingHost {
        fn extend_runtime(&mut self, _duration: Duration) -> ExtensionToken {
            self.next += 1;
            ExtensionToken(self.next)
        }

        fn end_runtime_extension(&mut self, token: ExtensionToken) {
            self.ended.push(token);
        }

        fn current_app_state(&self) -> AppState {
            AppState::Background
        }
    }

    fn adapter() -> (HardwareAdapter, crate::hardware::simulated::HardwareLog) {
        let (hw, log) = SimulatedHardware::new();
        (HardwareAdapter::new(Box::new(hw)), log)
    }

    #[test]
    fn test_start_extends_and_polls_once() {
        let (mut adapter, log) = adapter();
        let mut host = RecordingHost::default();
        let mut bridge = BackgroundBridge::new(Duration::from_secs(170));

        bridge.start(&mut host, &mut adapter);
        bridge.start(&mut host, &mut adapter);

        assert_eq!(bridge.active_token(), Some(ExtensionToken(1)));
        assert_eq!(log.count(|e| *e == HardwareEvent::Command(HardwareCommand::RequestLocation)), 1);
    }

    #[test]
    fn test_expiry_renews_and_ignores_stale_tokens() {
        let (mut adapter, log) = adapter();
        let mut host = RecordingHost::default();
        let mut bridge = BackgroundBridge::new(Duration::from_secs(170));
        bridge.start(&mut host, &mut adapter);

        assert!(bridge.on_expiring(ExtensionToken(1), &mut host, &mut adapter));
        assert!(!bridge.on_expiring(ExtensionToken(1), &mut host, &mut adapter));

        assert_eq!(bridge.active_token(), Some(ExtensionToken(2)));
        assert_eq!(host.ended, vec![ExtensionToken(1)]);
        assert_eq!(bridge.windows(), 2);
        assert_eq!(log.count(|e| *e == HardwareEvent::Command(HardwareCommand::RequestLocation)), 2);
    }

    #[test]
    fn test_stop_ends_active_extension() {
        let (mut adapter, _log) = adapter();
        let mut host = RecordingHost::default();
        let mut bridge = BackgroundBridge::new(Duration::from_secs(170));
        bridge.start(&mut host, &mut adapter);

        bridge.stop(&mut host);
        bridge.stop(&mut host);

        assert!(!bridge.is_active());
        assert_eq!(host.ended, vec![ExtensionToken(1)]);
    }
}

//! Executes reconciliation plans against the driver.

use crate::auth::{AuthorizationLevel, AuthorizationStatus};
use crate::error::LocationError;
use crate::settings::ArbitratedSettings;

use super::{reconcile, HardwareCommand, LocationHardware};

/// What [`HardwareAdapter::apply`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// Settings matched the last applied ones; nothing was sent.
    Unchanged,
    /// New settings were applied.
    Applied,
    /// Location updates were stopped.
    Stopped,
    /// Significant-change monitoring is unavailable; updates were stopped.
    Unsupported,
}

/// Owns the driver and remembers the last configuration it applied.
pub struct HardwareAdapter {
    hardware: Box<dyn LocationHardware>,
    last_applied: Option<ArbitratedSettings>,
    heading_filter: Option<f64>,
}

impl HardwareAdapter {
    pub fn new(hardware: Box<dyn LocationHardware>) -> Self {
        Self {
            hardware,
            last_applied: None,
            heading_filter: None,
        }
    }

    pub fn last_applied(&self) -> Option<&ArbitratedSettings> {
        self.last_applied.as_ref()
    }

    pub fn heading_filter(&self) -> Option<f64> {
        self.heading_filter
    }

    /// Brings location updates in line with `desired`.
    ///
    /// `None` always stops the hardware, even if it is believed stopped.
    pub fn apply(&mut self, desired: Option<ArbitratedSettings>) -> ApplyOutcome {
        let supports = self.hardware.supports_significant_change_monitoring();
        let plan = reconcile(self.last_applied.as_ref(), desired.as_ref(), supports);
        self.run(&plan.commands);

        match desired {
            None => {
                if self.last_applied.take().is_some() {
                    tracing::info!("Location updates stopped");
                }
                ApplyOutcome::Stopped
            }
            Some(_) if plan.unsupported => {
                self.last_applied = None;
                tracing::warn!("Significant-change monitoring unsupported, location updates stopped");
                ApplyOutcome::Unsupported
            }
            Some(_) if plan.commands.is_empty() => ApplyOutcome::Unchanged,
            Some(settings) => {
                tracing::info!(settings = %settings, "Location hardware configured");
                self.last_applied = Some(settings);
                ApplyOutcome::Applied
            }
        }
    }

    /// Starts heading updates with `filter`, or stops them on `None`.
    ///
    /// Returns true if any command was sent.
    pub fn apply_heading(&mut self, filter: Option<f64>) -> bool {
        if filter == self.heading_filter {
            return false;
        }
        match filter {
            Some(degrees) => {
                self.run(&[HardwareCommand::StartHeading(degrees)]);
                tracing::info!(filter_degrees = degrees, "Heading updates started");
            }
            None => {
                self.run(&[HardwareCommand::StopHeading]);
                tracing::info!("Heading updates stopped");
            }
        }
        self.heading_filter = filter;
        true
    }

    /// Stops location and heading updates regardless of cached state.
    pub fn stop_all(&mut self) {
        self.apply(None);
        self.run(&[HardwareCommand::StopHeading]);
        self.heading_filter = None;
    }

    /// Asks the driver for one fix.
    pub fn poll(&mut self) {
        self.run(&[HardwareCommand::RequestLocation]);
    }

    pub fn services_enabled(&self) -> bool {
        self.hardware.services_enabled()
    }

    pub fn is_background_capable(&self) -> bool {
        self.hardware.is_background_capable()
    }

    pub fn supports_significant_change_monitoring(&self) -> bool {
        self.hardware.supports_significant_change_monitoring()
    }

    pub fn authorization_status(&self) -> AuthorizationStatus {
        self.hardware.authorization_status()
    }

    pub fn request_authorization(&mut self, level: AuthorizationLevel) -> Result<(), LocationError> {
        tracing::info!(level = ?level, "Requesting location authorization");
        self.hardware.request_authorization(level)
    }

    fn run(&mut self, commands: &[HardwareCommand]) {
        for command in commands {
            tracing::trace!(command = ?command, "Hardware command");
            command.execute(self.hardware.as_mut());
        }
    }
}

impl std::fmt::Debug for HardwareAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HardwareAdapter")
            .field("last_applied", &self.last_applied)
            .field("heading_filter", &self.heading_filter)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hardware::simulated::{HardwareEvent, SimulatedHardware};
    use crate::settings::{Accuracy, ActivityHint, Frequency};

    fn settings(accuracy: Accuracy, frequency: Frequency) -> ArbitratedSettings {
        ArbitratedSettings::new(accuracy, frequency, ActivityHint::Other)
    }

    #[test]
    fn test_identical_apply_sends_nothing() {
        let (hw, log) = SimulatedHardware::new();
        let mut adapter = HardwareAdapter::new(Box::new(hw));
        let s = settings(Accuracy::HOUSE, Frequency::Continuous);

        assert_eq!(adapter.apply(Some(s)), ApplyOutcome::Applied);
        let after_first = log.events().len();
        assert_eq!(adapter.apply(Some(s)), ApplyOutcome::Unchanged);
        assert_eq!(log.events().len(), after_first);
        assert!(log.sensor().continuous);
    }

    #[test]
    fn test_none_stops_even_when_cache_empty() {
        let (hw, log) = SimulatedHardware::new();
        let mut adapter = HardwareAdapter::new(Box::new(hw));

        assert_eq!(adapter.apply(None), ApplyOutcome::Stopped);
        assert_eq!(adapter.apply(None), ApplyOutcome::Stopped);
        assert_eq!(
            log.count(|e| *e == HardwareEvent::Command(HardwareCommand::StopContinuous)),
            2
        );
    }

    #[test]
    fn test_unsupported_clears_cache() {
        let (hw, log) = SimulatedHardware::new();
        log.set_supports_significant(false);
        let mut adapter = HardwareAdapter::new(Box::new(hw));

        adapter.apply(Some(settings(Accuracy::HOUSE, Frequency::Continuous)));
        let outcome = adapter.apply(Some(settings(Accuracy::CITY, Frequency::Significant)));

        assert_eq!(outcome, ApplyOutcome::Unsupported);
        assert!(adapter.last_applied().is_none());
        assert!(!log.sensor().continuous);
        assert!(!log.sensor().significant);
    }

    #[test]
    fn test_heading_filter_cached() {
        let (hw, log) = SimulatedHardware::new();
        let mut adapter = HardwareAdapter::new(Box::new(hw));

        assert!(!adapter.apply_heading(None));
        assert!(adapter.apply_heading(Some(5.0)));
        assert!(!adapter.apply_heading(Some(5.0)));
        assert!(adapter.apply_heading(Some(1.0)));
        assert!(adapter.apply_heading(None));

        assert_eq!(log.sensor().heading, None);
        assert_eq!(
            log.count(|e| matches!(e, HardwareEvent::Command(HardwareCommand::StartHeading(_)))),
            2
        );
    }
}

//! Location hardware abstraction.
//!
//! The sensor driver is modelled by [`LocationHardware`]. Configuration is
//! split into a pure decision step and an effect step:
//!
//! - [`reconcile`] compares the last applied settings with the desired ones
//!   and returns the [`HardwareCommand`]s to issue.
//! - [`HardwareAdapter`] executes those commands and caches what it applied,
//!   so identical settings never reach the driver twice.
//!
//! # Command plans
//!
//! ```text
//! desired = None            stop continuous, stop significant, disallow deferred
//! desired = current         (nothing)
//! otherwise                 set activity hint, set accuracy, then:
//!   Significant             stop continuous, disallow deferred, start significant
//!   Significant, no support stop continuous, stop significant, disallow deferred
//!   WhenTravelled(m, t)     stop significant, start continuous, allow deferred(m, t)
//!   Continuous              stop significant, start continuous, disallow deferred
//! ```

mod adapter;
pub mod simulated;

use std::time::Duration;

use serde::Serialize;

use crate::auth::{AuthorizationLevel, AuthorizationStatus};
use crate::error::LocationError;
use crate::settings::{Accuracy, ActivityHint, ArbitratedSettings, Frequency};

pub use adapter::{ApplyOutcome, HardwareAdapter};

/// Sensor driver capability.
///
/// Commands are fire-and-forget. Events flow back through the manager's
/// `on_readings`, `on_sensor_error`, `on_heading` and
/// `on_authorization_change`.
pub trait LocationHardware: Send {
    fn set_accuracy(&mut self, accuracy: Accuracy);
    fn set_activity_hint(&mut self, activity: ActivityHint);

    fn start_continuous(&mut self);
    fn stop_continuous(&mut self);

    fn start_significant_change_monitoring(&mut self);
    fn stop_significant_change_monitoring(&mut self);

    fn allow_deferred_updates(&mut self, distance: f64, timeout: Duration);
    fn disallow_deferred_updates(&mut self);

    fn start_heading_updates(&mut self, filter_degrees: f64);
    fn stop_heading_updates(&mut self);

    /// Requests a single fix.
    fn request_location(&mut self);

    fn supports_significant_change_monitoring(&self) -> bool;
    /// Returns true if the host is configured for background location.
    fn is_background_capable(&self) -> bool;
    /// Returns false when location services are disabled system-wide.
    fn services_enabled(&self) -> bool;
    fn authorization_status(&self) -> AuthorizationStatus;

    /// Shows the permission prompt. The answer arrives later as an
    /// authorization change.
    fn request_authorization(&mut self, level: AuthorizationLevel) -> Result<(), LocationError>;
}

/// A single driver call.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum HardwareCommand {
    SetAccuracy(Accuracy),
    SetActivityHint(ActivityHint),
    StartContinuous,
    StopContinuous,
    StartSignificantChange,
    StopSignificantChange,
    AllowDeferred { distance: f64, timeout: Duration },
    DisallowDeferred,
    StartHeading(f64),
    StopHeading,
    RequestLocation,
}

impl HardwareCommand {
    pub fn execute(&self, hardware: &mut dyn LocationHardware) {
        match *self {
            HardwareCommand::SetAccuracy(a) => hardware.set_accuracy(a),
            HardwareCommand::SetActivityHint(h) => hardware.set_activity_hint(h),
            HardwareCommand::StartContinuous => hardware.start_continuous(),
            HardwareCommand::StopContinuous => hardware.stop_continuous(),
            HardwareCommand::StartSignificantChange => hardware.start_significant_change_monitoring(),
            HardwareCommand::StopSignificantChange => hardware.stop_significant_change_monitoring(),
            HardwareCommand::AllowDeferred { distance, timeout } => {
                hardware.allow_deferred_updates(distance, timeout)
            }
            HardwareCommand::DisallowDeferred => hardware.disallow_deferred_updates(),
            HardwareCommand::StartHeading(filter) => hardware.start_heading_updates(filter),
            HardwareCommand::StopHeading => hardware.stop_heading_updates(),
            HardwareCommand::RequestLocation => hardware.request_location(),
        }
    }
}

/// Commands needed to move the hardware from one configuration to another.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Reconciliation {
    pub commands: Vec<HardwareCommand>,
    /// The desired configuration needs significant-change monitoring, which
    /// the hardware lacks. The plan stops all location updates instead.
    pub unsupported: bool,
}

const STOP_ALL: [HardwareCommand; 3] = [
    HardwareCommand::StopContinuous,
    HardwareCommand::StopSignificantChange,
    HardwareCommand::DisallowDeferred,
];

/// Plans the driver calls that turn `current` into `desired`.
pub fn reconcile(
    current: Option<&ArbitratedSettings>,
    desired: Option<&ArbitratedSettings>,
    supports_significant: bool,
) -> Reconciliation {
    let Some(desired) = desired else {
        return Reconciliation {
            commands: STOP_ALL.to_vec(),
            unsupported: false,
        };
    };

    if current == Some(desired) {
        return Reconciliation::default();
    }

    if desired.frequency() == Frequency::Significant && !supports_significant {
        return Reconciliation {
            commands: STOP_ALL.to_vec(),
            unsupported: true,
        };
    }

    let mut commands = vec![
        HardwareCommand::SetActivityHint(desired.activity()),
        HardwareCommand::SetAccuracy(desired.accuracy()),
    ];

    match desired.frequency() {
        Frequency::Significant => commands.extend([
            HardwareCommand::StopContinuous,
            HardwareCommand::DisallowDeferred,
            HardwareCommand::StartSignificantChange,
        ]),
        Frequency::WhenTravelled { meters, timeout } => commands.extend([
            HardwareCommand::StopSignificantChange,
            HardwareCommand::StartContinuous,
            HardwareCommand::AllowDeferred {
                distance: meters,
                timeout,
            },
        ]),
        Frequency::Continuous => commands.extend([
            HardwareCommand::StopSignificantChange,
            HardwareCommand::StartContinuous,
            HardwareCommand::DisallowDeferred,
        ]),
    }

    Reconciliation {
        commands,
        unsupported: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(accuracy: Accuracy, frequency: Frequency) -> ArbitratedSettings {
        ArbitratedSettings::new(accuracy, frequency, ActivityHint::Other)
    }

    #[test]
    fn test_none_stops_everything() {
        let current = settings(Accuracy::HOUSE, Frequency::Continuous);
        for cur in [None, Some(&current)] {
            let plan = reconcile(cur, None, true);
            assert_eq!(plan.commands, STOP_ALL.to_vec());
            assert!(!plan.unsupported);
        }
    }

    #[test]
    fn test_identical_settings_issue_nothing() {
        let s = settings(Accuracy::HOUSE, Frequency::Continuous);
        let plan = reconcile(Some(&s), Some(&s), true);
        assert!(plan.commands.is_empty());
    }

    #[test]
    fn test_continuous_plan() {
        let s = settings(Accuracy::HOUSE, Frequency::Continuous);
        let plan = reconcile(None, Some(&s), true);
        assert_eq!(
            plan.commands,
            vec![
                HardwareCommand::SetActivityHint(ActivityHint::Other),
                HardwareCommand::SetAccuracy(Accuracy::HOUSE),
                HardwareCommand::StopSignificantChange,
                HardwareCommand::StartContinuous,
                HardwareCommand::DisallowDeferred,
            ]
        );
    }

    #[test]
    fn test_when_travelled_plan_allows_deferred() {
        let s = settings(
            Accuracy::BLOCK,
            Frequency::WhenTravelled {
                meters: 250.0,
                timeout: Duration::from_secs(60),
            },
        );
        let plan = reconcile(None, Some(&s), true);
        assert_eq!(
            plan.commands.last(),
            Some(&HardwareCommand::AllowDeferred {
                distance: 250.0,
                timeout: Duration::from_secs(60),
            })
        );
        assert!(plan.commands.contains(&HardwareCommand::StartContinuous));
    }

    #[test]
    fn test_significant_plan() {
        let s = settings(Accuracy::CITY, Frequency::Significant);
        let plan = reconcile(None, Some(&s), true);
        assert_eq!(
            &plan.commands[2..],
            &[
                HardwareCommand::StopContinuous,
                HardwareCommand::DisallowDeferred,
                HardwareCommand::StartSignificantChange,
            ]
        );
    }

    #[test]
    fn test_significant_unsupported_stops_all() {
        let s = settings(Accuracy::CITY, Frequency::Significant);
        let plan = reconcile(None, Some(&s), false);
        assert!(plan.unsupported);
        assert_eq!(plan.commands, STOP_ALL.to_vec());
    }
}

//! Error taxonomy for location requests.
//!
//! Every error a request can observe is a [`LocationError`]. Errors are split
//! into two classes:
//!
//! - **Fatal**: the request moves to `Failed` and the error is delivered once.
//! - **Non-fatal**: the error is delivered and the request keeps running
//!   (currently only wrapped sensor errors).
//!
//! Arbitration never produces an error; a configuration that cannot be
//! satisfied is expressed as `None` settings or as a fatal error delivered to
//! the affected requests.

use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

use crate::auth::AuthorizationStatus;

/// Errors delivered to request error sinks.
#[derive(Debug, Clone, PartialEq, Error, Serialize)]
pub enum LocationError {
    /// Location services are disabled at the OS level.
    #[error("location services are disabled")]
    ServiceUnavailable,

    /// The user (or a policy) refused location access.
    #[error("location authorization denied (status: {0})")]
    AuthorizationDenied(AuthorizationStatus),

    /// A background-eligible request was registered but the host is not
    /// configured for background location updates.
    #[error("background location mode is not configured for this host")]
    BackgroundModeNotConfigured,

    /// Significant-change monitoring was requested on hardware without it.
    #[error("significant-change monitoring is not supported by this device")]
    SignificantChangeUnsupported,

    /// No successful delivery happened within the request's timeout window.
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// Transient error reported by the sensor driver.
    #[error("sensor error: {0}")]
    Sensor(String),

    /// The geocoding collaborator failed to resolve the query.
    #[error("geocoding failed: {0}")]
    Geocoding(String),
}

impl LocationError {
    /// Returns true if this error ends the request (transition to `Failed`).
    pub fn is_fatal(&self) -> bool {
        !matches!(self, LocationError::Sensor(_))
    }

    /// Short machine-friendly name, used in logs and snapshots.
    pub fn kind(&self) -> &'static str {
        match self {
            LocationError::ServiceUnavailable => "service_unavailable",
            LocationError::AuthorizationDenied(_) => "authorization_denied",
            LocationError::BackgroundModeNotConfigured => "background_mode_not_configured",
            LocationError::SignificantChangeUnsupported => "significant_change_unsupported",
            LocationError::Timeout(_) => "timeout",
            LocationError::Sensor(_) => "sensor",
            LocationError::Geocoding(_) => "geocoding",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_sensor_errors_are_recoverable() {
        assert!(!LocationError::Sensor("glitch".to_string()).is_fatal());

        assert!(LocationError::ServiceUnavailable.is_fatal());
        assert!(LocationError::AuthorizationDenied(AuthorizationStatus::Denied).is_fatal());
        assert!(LocationError::BackgroundModeNotConfigured.is_fatal());
        assert!(LocationError::SignificantChangeUnsupported.is_fatal());
        assert!(LocationError::Timeout(Duration::from_secs(5)).is_fatal());
        assert!(LocationError::Geocoding("no results".to_string()).is_fatal());
    }

    #[test]
    fn test_display_includes_context() {
        let err = LocationError::AuthorizationDenied(AuthorizationStatus::Restricted);
        assert!(err.to_string().contains("restricted"));

        let err = LocationError::Timeout(Duration::from_secs(5));
        assert!(err.to_string().contains("5s"));
    }
}

//! Request lifecycle state machine.
//!
//! ```text
//!            register/resume                  pause
//!   Idle ----------------------> Running ----------------> Paused
//!    |                          ^   |   ^                    |
//!    | needs permission         |   |   +------ resume ------+
//!    v                  granted |   |
//!   WaitingForAuthorization ----+   | fatal error
//!                                   v
//!                                 Failed(e) --resume--> Running
//!
//!   any --cancel--> Idle (removed from the registry)
//! ```

use std::fmt;

use serde::Serialize;

use crate::error::LocationError;

/// Lifecycle state of a request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum RequestState {
    Idle,
    Running,
    Paused,
    WaitingForAuthorization,
    Failed(LocationError),
}

impl RequestState {
    /// Returns true if moving from `self` to `next` is a legal transition.
    pub fn can_transition_to(&self, next: &RequestState) -> bool {
        use RequestState::*;

        match (self, next) {
            (Idle, Idle) => false,
            (_, Idle) => true,
            (Failed(_), Failed(_)) => false,
            (_, Failed(_)) => true,
            (Idle | WaitingForAuthorization | Paused | Failed(_), Running) => true,
            (Idle | Running, WaitingForAuthorization) => true,
            (Running, Paused) => true,
            _ => false,
        }
    }

    pub fn is_running(&self) -> bool {
        matches!(self, RequestState::Running)
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, RequestState::Failed(_))
    }

    pub fn name(&self) -> &'static str {
        match self {
            RequestState::Idle => "idle",
            RequestState::Running => "running",
            RequestState::Paused => "paused",
            RequestState::WaitingForAuthorization => "waiting-for-authorization",
            RequestState::Failed(_) => "failed",
        }
    }
}

impl fmt::Display for RequestState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestState::Failed(e) => write!(f, "failed ({})", e.kind()),
            other => f.write_str(other.name()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use RequestState::*;

    fn failed() -> RequestState {
        Failed(LocationError::ServiceUnavailable)
    }

    #[test]
    fn test_resume_targets() {
        for from in [Idle, WaitingForAuthorization, Paused, failed()] {
            assert!(from.can_transition_to(&Running), "{} -> running", from);
        }
        assert!(!Running.can_transition_to(&Running));
    }

    #[test]
    fn test_pause_only_from_running() {
        assert!(Running.can_transition_to(&Paused));
        for from in [Idle, Paused, WaitingForAuthorization, failed()] {
            assert!(!from.can_transition_to(&Paused), "{} -> paused", from);
        }
    }

    #[test]
    fn test_waiting_only_from_idle_or_running() {
        assert!(Idle.can_transition_to(&WaitingForAuthorization));
        assert!(Running.can_transition_to(&WaitingForAuthorization));
        assert!(!Paused.can_transition_to(&WaitingForAuthorization));
        assert!(!failed().can_transition_to(&WaitingForAuthorization));
    }

    #[test]
    fn test_failed_to_failed_is_rejected() {
        assert!(!failed().can_transition_to(&Failed(LocationError::Timeout(
            std::time::Duration::from_secs(1)
        ))));
        assert!(Running.can_transition_to(&failed()));
        assert!(Paused.can_transition_to(&failed()));
    }

    #[test]
    fn test_cancel_from_anywhere() {
        for from in [Running, Paused, WaitingForAuthorization, failed()] {
            assert!(from.can_transition_to(&Idle));
        }
    }
}

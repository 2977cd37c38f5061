//! Authorization gate.
//!
//! Tracks the last permission status reported by the platform and enforces
//! prompt-once discipline: while a permission prompt is on screen, further
//! recomputes wait for the answer instead of prompting again.
//!
//! # Decision table
//!
//! ```text
//! status            required=WhenInUse   required=Always
//! ----------------  -------------------  ---------------
//! NotDetermined     Prompt               Prompt
//! Restricted        Denied               Denied
//! Denied            Denied               Denied
//! WhenInUse         Sufficient           Prompt
//! Always            Sufficient           Sufficient
//! ```
//!
//! `Prompt` becomes `AwaitingPrompt` once a prompt has been issued, until the
//! next status report. A report that repeats the current status while a
//! prompt is on screen is the user keeping the level they had.

use std::fmt;

use serde::Serialize;

/// Permission status as reported by the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum AuthorizationStatus {
    NotDetermined,
    Restricted,
    Denied,
    WhenInUse,
    Always,
}

impl AuthorizationStatus {
    /// Returns true if the user or a policy refused access.
    pub fn is_denied(&self) -> bool {
        matches!(
            self,
            AuthorizationStatus::Denied | AuthorizationStatus::Restricted
        )
    }

    /// Returns true if any level of access is granted.
    pub fn is_granted(&self) -> bool {
        matches!(
            self,
            AuthorizationStatus::WhenInUse | AuthorizationStatus::Always
        )
    }

    /// Returns true if this status covers the `required` level.
    pub fn satisfies(&self, required: AuthorizationLevel) -> bool {
        match (self, required) {
            (AuthorizationStatus::Always, _) => true,
            (AuthorizationStatus::WhenInUse, AuthorizationLevel::WhenInUse) => true,
            _ => false,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            AuthorizationStatus::NotDetermined => "not-determined",
            AuthorizationStatus::Restricted => "restricted",
            AuthorizationStatus::Denied => "denied",
            AuthorizationStatus::WhenInUse => "when-in-use",
            AuthorizationStatus::Always => "always",
        }
    }
}

impl fmt::Display for AuthorizationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Access level a configuration needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AuthorizationLevel {
    WhenInUse,
    Always,
}

/// Outcome of checking the gate against a required level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthorizationDecision {
    /// Hardware may be configured.
    Sufficient,
    /// Access was refused; affected requests fail.
    Denied(AuthorizationStatus),
    /// Access is short; a prompt should be issued now.
    Prompt,
    /// Access is short and a prompt is already on screen.
    AwaitingPrompt,
}

/// What a status report meant to the gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusUpdate {
    /// Same status and no prompt on screen.
    Unchanged,
    /// Same status reported while a prompt was on screen.
    Kept(AuthorizationStatus),
    /// The status changed.
    Changed {
        old: AuthorizationStatus,
        new: AuthorizationStatus,
    },
}

/// Last known permission status plus the in-flight prompt flag.
#[derive(Debug, Clone)]
pub struct AuthorizationGate {
    last_status: AuthorizationStatus,
    prompt_in_flight: bool,
}

impl AuthorizationGate {
    pub fn new(initial: AuthorizationStatus) -> Self {
        Self {
            last_status: initial,
            prompt_in_flight: false,
        }
    }

    pub fn status(&self) -> AuthorizationStatus {
        self.last_status
    }

    pub fn prompt_in_flight(&self) -> bool {
        self.prompt_in_flight
    }

    /// Records a status report.
    ///
    /// Any report answers the outstanding prompt, whether or not the status
    /// changed.
    pub fn update(&mut self, status: AuthorizationStatus) -> StatusUpdate {
        let answered = std::mem::replace(&mut self.prompt_in_flight, false);
        if status == self.last_status {
            if answered {
                tracing::info!(status = %status, "Authorization prompt answered without change");
                return StatusUpdate::Kept(status);
            }
            return StatusUpdate::Unchanged;
        }
        let old = self.last_status;
        self.last_status = status;
        tracing::info!(old = %old, new = %status, "Authorization status changed");
        StatusUpdate::Changed { old, new: status }
    }

    pub fn evaluate(&self, required: AuthorizationLevel) -> AuthorizationDecision {
        if self.last_status.is_denied() {
            AuthorizationDecision::Denied(self.last_status)
        } else if self.last_status.satisfies(required) {
            AuthorizationDecision::Sufficient
        } else if self.prompt_in_flight {
            AuthorizationDecision::AwaitingPrompt
        } else {
            AuthorizationDecision::Prompt
        }
    }

    /// Marks a prompt as shown.
    pub fn begin_prompt(&mut self) {
        self.prompt_in_flight = true;
    }

    /// Clears the prompt flag after the platform rejected the prompt request.
    pub fn abandon_prompt(&mut self) {
        self.prompt_in_flight = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decision_table() {
        use AuthorizationDecision::*;
        use AuthorizationLevel as L;
        use AuthorizationStatus as S;

        let cases = [
            (S::NotDetermined, L::WhenInUse, Prompt),
            (S::NotDetermined, L::Always, Prompt),
            (S::Restricted, L::WhenInUse, Denied(S::Restricted)),
            (S::Denied, L::Always, Denied(S::Denied)),
            (S::WhenInUse, L::WhenInUse, Sufficient),
            (S::WhenInUse, L::Always, Prompt),
            (S::Always, L::WhenInUse, Sufficient),
            (S::Always, L::Always, Sufficient),
        ];

        for (status, level, expected) in cases {
            let gate = AuthorizationGate::new(status);
            assert_eq!(gate.evaluate(level), expected, "{} / {:?}", status, level);
        }
    }

    #[test]
    fn test_prompt_once_until_status_changes() {
        let mut gate = AuthorizationGate::new(AuthorizationStatus::NotDetermined);
        assert_eq!(
            gate.evaluate(AuthorizationLevel::WhenInUse),
            AuthorizationDecision::Prompt
        );

        gate.begin_prompt();
        assert_eq!(
            gate.evaluate(AuthorizationLevel::WhenInUse),
            AuthorizationDecision::AwaitingPrompt
        );

        let change = gate.update(AuthorizationStatus::WhenInUse);
        assert_eq!(
            change,
            StatusUpdate::Changed {
                old: AuthorizationStatus::NotDetermined,
                new: AuthorizationStatus::WhenInUse,
            }
        );
        assert!(!gate.prompt_in_flight());
    }

    #[test]
    fn test_repeated_status_is_not_a_change() {
        let mut gate = AuthorizationGate::new(AuthorizationStatus::Always);
        assert_eq!(gate.update(AuthorizationStatus::Always), StatusUpdate::Unchanged);
        assert!(!gate.prompt_in_flight());
    }

    #[test]
    fn test_declined_upgrade_answers_prompt() {
        let mut gate = AuthorizationGate::new(AuthorizationStatus::WhenInUse);
        assert_eq!(
            gate.evaluate(AuthorizationLevel::Always),
            AuthorizationDecision::Prompt
        );
        gate.begin_prompt();

        assert_eq!(
            gate.update(AuthorizationStatus::WhenInUse),
            StatusUpdate::Kept(AuthorizationStatus::WhenInUse)
        );
        assert!(!gate.prompt_in_flight());
        assert_eq!(gate.update(AuthorizationStatus::WhenInUse), StatusUpdate::Unchanged);
    }
}

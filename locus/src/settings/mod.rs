//! Requirement value types and the arbitrated hardware configuration.
//!
//! Each location request states what it needs as an [`Accuracy`], a
//! [`Frequency`] and an [`ActivityHint`]. The [`arbitrator`] folds the running
//! requests into a single [`ArbitratedSettings`] that satisfies all of them.
//!
//! # Ordering
//!
//! ```text
//! Accuracy:   Navigation < Best < Meters(m) (by m) < Any        (lower = finer)
//! Frequency:  Continuous < WhenTravelled(m, t) (by m, then t) < Significant
//! Activity:   Other(0) < Fitness(1) < OtherNavigation(2)
//!             < AutomotiveNavigation(3) < Airborne(4)            (higher wins)
//! ```

pub mod arbitrator;

use std::cmp::Ordering;
use std::fmt;
use std::time::Duration;

use serde::Serialize;

pub use arbitrator::{arbitrate, arbitrate_heading};

// =============================================================================
// Accuracy
// =============================================================================

/// Desired horizontal accuracy of location readings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum Accuracy {
    /// Highest precision plus additional sensor data, for turn-by-turn use.
    Navigation,
    /// Best precision the hardware offers.
    Best,
    /// Accurate to within the given number of meters.
    Meters(f64),
    /// No accuracy requirement.
    Any,
}

impl Accuracy {
    /// Within 5 meters.
    pub const ROOM: Accuracy = Accuracy::Meters(5.0);
    /// Within 10 meters.
    pub const HOUSE: Accuracy = Accuracy::Meters(10.0);
    /// Within 100 meters.
    pub const BLOCK: Accuracy = Accuracy::Meters(100.0);
    /// Within 1 kilometer.
    pub const NEIGHBORHOOD: Accuracy = Accuracy::Meters(1_000.0);
    /// Within 3 kilometers.
    pub const CITY: Accuracy = Accuracy::Meters(3_000.0);

    /// Position of this accuracy on the precision scale (lower is finer).
    pub fn order_value(&self) -> f64 {
        match self {
            Accuracy::Navigation => -2.0,
            Accuracy::Best => -1.0,
            Accuracy::Meters(m) => m.max(0.0),
            Accuracy::Any => f64::INFINITY,
        }
    }

    /// Maximum horizontal error a reading may have to satisfy a one-shot
    /// request, or `None` when every reading qualifies.
    pub fn threshold_meters(&self) -> Option<f64> {
        match self {
            Accuracy::Meters(m) => Some(*m),
            Accuracy::Navigation | Accuracy::Best | Accuracy::Any => None,
        }
    }

    /// Returns true if `self` asks for at least the precision of `other`.
    pub fn is_at_least_as_fine_as(&self, other: &Accuracy) -> bool {
        self.order_value() <= other.order_value()
    }

    /// Maps meter values that cannot be ordered or compared onto the scale.
    ///
    /// NaN and positive infinity mean no requirement; negative values clamp
    /// to zero.
    pub fn normalized(self) -> Accuracy {
        match self {
            Accuracy::Meters(m) if m.is_nan() || m == f64::INFINITY => Accuracy::Any,
            Accuracy::Meters(m) if m < 0.0 => Accuracy::Meters(0.0),
            other => other,
        }
    }
}

impl fmt::Display for Accuracy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Accuracy::Navigation => write!(f, "navigation"),
            Accuracy::Best => write!(f, "best"),
            Accuracy::Meters(m) => write!(f, "{}m", m),
            Accuracy::Any => write!(f, "any"),
        }
    }
}

// =============================================================================
// Frequency
// =============================================================================

/// How often the hardware should produce readings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum Frequency {
    /// Every update the sensor produces.
    Continuous,
    /// Batched delivery after travelling `meters` or after `timeout`.
    WhenTravelled { meters: f64, timeout: Duration },
    /// Only significant location changes (cell-tower granularity).
    Significant,
}

impl Frequency {
    /// Compares granularity; `Less` means `self` delivers more often.
    pub fn granularity_cmp(&self, other: &Frequency) -> Ordering {
        match (self, other) {
            (Frequency::Continuous, Frequency::Continuous) => Ordering::Equal,
            (Frequency::Continuous, _) => Ordering::Less,
            (_, Frequency::Continuous) => Ordering::Greater,
            (Frequency::Significant, Frequency::Significant) => Ordering::Equal,
            (Frequency::Significant, _) => Ordering::Greater,
            (_, Frequency::Significant) => Ordering::Less,
            (
                Frequency::WhenTravelled {
                    meters: m1,
                    timeout: t1,
                },
                Frequency::WhenTravelled {
                    meters: m2,
                    timeout: t2,
                },
            ) => m1.total_cmp(m2).then_with(|| t1.cmp(t2)),
        }
    }

    /// Returns true if `self` delivers at least as often as `other`.
    pub fn is_at_least_as_fine_as(&self, other: &Frequency) -> bool {
        self.granularity_cmp(other) != Ordering::Greater
    }

    /// Clamps a NaN or negative travel distance to zero.
    pub fn normalized(self) -> Frequency {
        match self {
            Frequency::WhenTravelled { meters, timeout } if meters.is_nan() || meters < 0.0 => {
                Frequency::WhenTravelled {
                    meters: 0.0,
                    timeout,
                }
            }
            other => other,
        }
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Frequency::Continuous => write!(f, "continuous"),
            Frequency::WhenTravelled { meters, timeout } => {
                write!(f, "every {}m or {}s", meters, timeout.as_secs())
            }
            Frequency::Significant => write!(f, "significant"),
        }
    }
}

// =============================================================================
// Activity hint
// =============================================================================

/// What the user is doing, passed to the sensor so it can tune power usage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ActivityHint {
    Other,
    Fitness,
    OtherNavigation,
    AutomotiveNavigation,
    Airborne,
}

impl ActivityHint {
    /// Arbitration priority; the highest priority among running requests wins.
    pub fn priority(&self) -> u8 {
        match self {
            ActivityHint::Other => 0,
            ActivityHint::Fitness => 1,
            ActivityHint::OtherNavigation => 2,
            ActivityHint::AutomotiveNavigation => 3,
            ActivityHint::Airborne => 4,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ActivityHint::Other => "other",
            ActivityHint::Fitness => "fitness",
            ActivityHint::OtherNavigation => "other-navigation",
            ActivityHint::AutomotiveNavigation => "automotive-navigation",
            ActivityHint::Airborne => "airborne",
        }
    }
}

impl Default for ActivityHint {
    fn default() -> Self {
        ActivityHint::Other
    }
}

impl fmt::Display for ActivityHint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// =============================================================================
// Requirements
// =============================================================================

/// What a single location request asks of the hardware.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Requirements {
    pub accuracy: Accuracy,
    pub frequency: Frequency,
    pub activity: ActivityHint,
}

impl Requirements {
    /// Builds requirements, normalizing values that would not compare.
    pub fn new(accuracy: Accuracy, frequency: Frequency) -> Self {
        Self {
            accuracy: accuracy.normalized(),
            frequency: frequency.normalized(),
            activity: ActivityHint::default(),
        }
    }

    /// Returns true if `settings` serve these requirements at least as well
    /// as asked.
    pub fn is_served_by(&self, settings: &ArbitratedSettings) -> bool {
        settings.accuracy.is_at_least_as_fine_as(&self.accuracy)
            && settings.frequency.is_at_least_as_fine_as(&self.frequency)
            && settings.activity.priority() >= self.activity.priority()
    }
}

// =============================================================================
// Arbitrated settings
// =============================================================================

/// The single configuration applied to the location hardware.
///
/// Only the arbitrator can build one, so every value in circulation is the
/// result of folding real requests. Equality is used to skip redundant
/// hardware reconfiguration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ArbitratedSettings {
    accuracy: Accuracy,
    frequency: Frequency,
    activity: ActivityHint,
}

impl ArbitratedSettings {
    pub(crate) fn new(accuracy: Accuracy, frequency: Frequency, activity: ActivityHint) -> Self {
        Self {
            accuracy,
            frequency,
            activity,
        }
    }

    pub fn accuracy(&self) -> Accuracy {
        self.accuracy
    }

    pub fn frequency(&self) -> Frequency {
        self.frequency
    }

    pub fn activity(&self) -> ActivityHint {
        self.activity
    }
}

impl fmt::Display for ArbitratedSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "accuracy={}, frequency={}, activity={}",
            self.accuracy, self.frequency, self.activity
        )
    }
}

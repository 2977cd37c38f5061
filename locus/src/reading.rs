//! Sensor readings and the last-known-reading cache.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// A single position fix from the location sensor.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Reading {
    pub latitude: f64,
    pub longitude: f64,
    /// Radius of uncertainty in meters. Negative means the fix is invalid.
    pub horizontal_accuracy: f64,
    pub altitude: Option<f64>,
    /// Ground speed in m/s.
    pub speed: Option<f64>,
    /// Course over ground in degrees from true north.
    pub course: Option<f64>,
    pub timestamp: DateTime<Utc>,
}

impl Reading {
    pub fn new(
        latitude: f64,
        longitude: f64,
        horizontal_accuracy: f64,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            latitude,
            longitude,
            horizontal_accuracy,
            altitude: None,
            speed: None,
            course: None,
            timestamp,
        }
    }

    pub fn with_altitude(mut self, altitude: f64) -> Self {
        self.altitude = Some(altitude);
        self
    }

    pub fn with_motion(mut self, speed: f64, course: f64) -> Self {
        self.speed = Some(speed);
        self.course = Some(course);
        self
    }

    pub fn is_valid(&self) -> bool {
        self.horizontal_accuracy >= 0.0
    }
}

/// A compass reading.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HeadingReading {
    /// Degrees relative to magnetic north.
    pub magnetic_heading: f64,
    /// Degrees relative to true north, when the device knows its position.
    pub true_heading: Option<f64>,
    /// Maximum deviation in degrees.
    pub accuracy: f64,
    pub timestamp: DateTime<Utc>,
}

/// Best and most recent readings seen so far.
///
/// `best` is replaced only by a strictly more accurate reading, `latest` only
/// by a strictly newer one. Invalid readings never enter the cache.
#[derive(Debug, Clone, Default, Serialize)]
pub struct LastKnownReading {
    best: Option<Reading>,
    latest: Option<Reading>,
}

impl LastKnownReading {
    pub fn new() -> Self {
        Self::default()
    }

    /// Folds one reading into the cache.
    pub fn observe(&mut self, reading: &Reading) {
        if !reading.is_valid() {
            tracing::trace!(
                accuracy = reading.horizontal_accuracy,
                "Ignoring reading with invalid accuracy"
            );
            return;
        }

        let more_accurate = self
            .best
            .as_ref()
            .map_or(true, |b| reading.horizontal_accuracy < b.horizontal_accuracy);
        if more_accurate {
            self.best = Some(reading.clone());
        }

        let newer = self
            .latest
            .as_ref()
            .map_or(true, |l| reading.timestamp > l.timestamp);
        if newer {
            self.latest = Some(reading.clone());
        }
    }

    pub fn best(&self) -> Option<&Reading> {
        self.best.as_ref()
    }

    pub fn latest(&self) -> Option<&Reading> {
        self.latest.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(secs: i64, accuracy: f64) -> Reading {
        Reading::new(
            47.6,
            -122.3,
            accuracy,
            Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap(),
        )
    }

    #[test]
    fn test_first_reading_fills_both_slots() {
        let mut cache = LastKnownReading::new();
        cache.observe(&at(0, 25.0));
        assert_eq!(cache.best().unwrap().horizontal_accuracy, 25.0);
        assert_eq!(cache.latest().unwrap().horizontal_accuracy, 25.0);
    }

    #[test]
    fn test_best_and_latest_track_independently() {
        let mut cache = LastKnownReading::new();
        cache.observe(&at(0, 5.0));
        cache.observe(&at(10, 50.0));

        assert_eq!(cache.best().unwrap().horizontal_accuracy, 5.0);
        assert_eq!(cache.latest().unwrap().horizontal_accuracy, 50.0);
    }

    #[test]
    fn test_equal_values_do_not_replace() {
        let mut cache = LastKnownReading::new();
        cache.observe(&at(0, 10.0).with_altitude(1.0));
        cache.observe(&at(0, 10.0).with_altitude(2.0));

        assert_eq!(cache.best().unwrap().altitude, Some(1.0));
        assert_eq!(cache.latest().unwrap().altitude, Some(1.0));
    }

    #[test]
    fn test_negative_accuracy_is_ignored() {
        let mut cache = LastKnownReading::new();
        cache.observe(&at(0, -1.0));
        assert!(cache.best().is_none());
        assert!(cache.latest().is_none());
    }
}

//! Folds running requests into one hardware configuration.
//!
//! The policy is a pure min/max fold:
//!
//! - accuracy: the finest (lowest order value) requested
//! - frequency: the finest granularity requested
//! - activity: the highest priority requested
//!
//! Input order is registration order. Every comparison is strict, so on a tie
//! the first-registered request keeps its value.

use super::{ArbitratedSettings, Requirements};

/// Derives the settings that serve every request in `requests`.
///
/// Returns `None` when there is nothing to serve.
pub fn arbitrate<'a, I>(requests: I) -> Option<ArbitratedSettings>
where
    I: IntoIterator<Item = &'a Requirements>,
{
    let mut iter = requests.into_iter();
    let first = iter.next()?;

    let mut accuracy = first.accuracy;
    let mut frequency = first.frequency;
    let mut activity = first.activity;

    for req in iter {
        if req.accuracy.order_value() < accuracy.order_value() {
            accuracy = req.accuracy;
        }
        if req.frequency.granularity_cmp(&frequency).is_lt() {
            frequency = req.frequency;
        }
        if req.activity.priority() > activity.priority() {
            activity = req.activity;
        }
    }

    Some(ArbitratedSettings::new(accuracy, frequency, activity))
}

/// Picks the finest heading filter (smallest degree delta) among running
/// heading requests.
pub fn arbitrate_heading<I>(filters: I) -> Option<f64>
where
    I: IntoIterator<Item = f64>,
{
    filters
        .into_iter()
        .filter(|f| !f.is_nan())
        .fold(None, |best: Option<f64>, f| match best {
            Some(b) if b <= f => Some(b),
            _ => Some(f.max(0.0)),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::{Accuracy, ActivityHint, Frequency};
    use std::time::Duration;

    fn req(accuracy: Accuracy, frequency: Frequency) -> Requirements {
        Requirements::new(accuracy, frequency)
    }

    #[test]
    fn test_empty_input_yields_none() {
        let none: Vec<Requirements> = Vec::new();
        assert_eq!(arbitrate(&none), None);
    }

    #[test]
    fn test_single_request_passes_through() {
        let only = [req(Accuracy::BLOCK, Frequency::Significant)];
        let settings = arbitrate(&only).unwrap();
        assert_eq!(settings.accuracy(), Accuracy::BLOCK);
        assert_eq!(settings.frequency(), Frequency::Significant);
        assert_eq!(settings.activity(), ActivityHint::Other);
    }

    #[test]
    fn test_finest_accuracy_and_frequency_win() {
        let requests = [
            req(Accuracy::HOUSE, Frequency::Continuous),
            req(Accuracy::Meters(50.0), Frequency::Significant),
        ];
        let settings = arbitrate(&requests).unwrap();
        assert_eq!(settings.accuracy(), Accuracy::HOUSE);
        assert_eq!(settings.frequency(), Frequency::Continuous);
    }

    #[test]
    fn test_when_travelled_prefers_shorter_distance() {
        let requests = [
            req(
                Accuracy::Any,
                Frequency::WhenTravelled {
                    meters: 200.0,
                    timeout: Duration::from_secs(30),
                },
            ),
            req(
                Accuracy::Any,
                Frequency::WhenTravelled {
                    meters: 100.0,
                    timeout: Duration::from_secs(300),
                },
            ),
            req(Accuracy::Any, Frequency::Significant),
        ];
        let settings = arbitrate(&requests).unwrap();
        assert_eq!(
            settings.frequency(),
            Frequency::WhenTravelled {
                meters: 100.0,
                timeout: Duration::from_secs(300),
            }
        );
    }

    #[test]
    fn test_highest_activity_priority_wins() {
        let mut fitness = req(Accuracy::Any, Frequency::Continuous);
        fitness.activity = ActivityHint::Fitness;
        let mut driving = req(Accuracy::Any, Frequency::Continuous);
        driving.activity = ActivityHint::AutomotiveNavigation;

        let settings = arbitrate(&[fitness, driving]).unwrap();
        assert_eq!(settings.activity(), ActivityHint::AutomotiveNavigation);
    }

    #[test]
    fn test_heading_picks_smallest_filter() {
        assert_eq!(arbitrate_heading(Vec::new()), None);
        assert_eq!(arbitrate_heading(vec![5.0, 1.0, 10.0]), Some(1.0));
        assert_eq!(arbitrate_heading(vec![f64::NAN, 3.0]), Some(3.0));
    }

    // =========================================================================
    // Property-based tests
    // =========================================================================

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        fn accuracy_strategy() -> impl Strategy<Value = Accuracy> {
            prop_oneof![
                Just(Accuracy::Navigation),
                Just(Accuracy::Best),
                (0.0f64..10_000.0).prop_map(Accuracy::Meters),
                Just(Accuracy::Any),
            ]
        }

        fn frequency_strategy() -> impl Strategy<Value = Frequency> {
            prop_oneof![
                Just(Frequency::Continuous),
                (1.0f64..5_000.0, 1u64..3_600).prop_map(|(meters, secs)| {
                    Frequency::WhenTravelled {
                        meters,
                        timeout: Duration::from_secs(secs),
                    }
                }),
                Just(Frequency::Significant),
            ]
        }

        fn activity_strategy() -> impl Strategy<Value = ActivityHint> {
            prop_oneof![
                Just(ActivityHint::Other),
                Just(ActivityHint::Fitness),
                Just(ActivityHint::OtherNavigation),
                Just(ActivityHint::AutomotiveNavigation),
                Just(ActivityHint::Airborne),
            ]
        }

        fn requirements_strategy() -> impl Strategy<Value = Requirements> {
            (accuracy_strategy(), frequency_strategy(), activity_strategy()).prop_map(
                |(accuracy, frequency, activity)| Requirements {
                    accuracy,
                    frequency,
                    activity,
                },
            )
        }

        proptest! {
            /// Every running request is served at least as finely as it asked.
            #[test]
            fn prop_never_under_serves(requests in prop::collection::vec(requirements_strategy(), 1..16)) {
                let settings = arbitrate(&requests).unwrap();
                for r in &requests {
                    prop_assert!(r.is_served_by(&settings), "{:?} under-served by {}", r, settings);
                }
            }

            /// The result is always one of the requested values, never invented.
            #[test]
            fn prop_result_is_drawn_from_inputs(requests in prop::collection::vec(requirements_strategy(), 1..16)) {
                let settings = arbitrate(&requests).unwrap();
                prop_assert!(requests.iter().any(|r| r.accuracy == settings.accuracy()));
                prop_assert!(requests.iter().any(|r| r.frequency == settings.frequency()));
                prop_assert!(requests.iter().any(|r| r.activity == settings.activity()));
            }
        }
    }
}

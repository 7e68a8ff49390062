//! Rolling period averages over accumulated samples.

use crate::analyzers::period::Period;
use crate::analyzers::utility::{mean, stddev};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

/// A sample that can be bucketed into a period window.
pub trait TimedSample {
    /// Instant used to decide which window the sample falls into.
    fn representative_at(&self) -> DateTime<Utc>;
    /// Sample value in seconds.
    fn seconds(&self) -> f64;
}

/// Per-period averages plus the flags selecting which periods are maintained.
///
/// [`RollingAverages::recompute`] is a full pass over the given samples and keeps
/// no state between calls other than the result.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RollingAverages {
    enabled: BTreeMap<Period, bool>,
    averages: BTreeMap<Period, f64>,
}

impl RollingAverages {
    pub fn new(enabled: &[Period]) -> Self {
        let enabled = Period::ALL
            .iter()
            .map(|p| (*p, enabled.contains(p)))
            .collect();
        Self {
            enabled,
            averages: BTreeMap::new(),
        }
    }

    pub fn is_enabled(&self, period: Period) -> bool {
        self.enabled.get(&period).copied().unwrap_or(false)
    }

    /// Enables or disables a period. Disabling drops its current average.
    pub fn set_enabled(&mut self, period: Period, enabled: bool) {
        self.enabled.insert(period, enabled);
        if !enabled {
            self.averages.remove(&period);
        }
    }

    /// Average for `period`, or `None` when the period is disabled or no sample
    /// fell into its window at the last recompute.
    pub fn get(&self, period: Period) -> Option<f64> {
        self.averages.get(&period).copied()
    }

    pub fn enabled_periods(&self) -> impl Iterator<Item = Period> + '_ {
        self.enabled
            .iter()
            .filter(|(_, on)| **on)
            .map(|(period, _)| *period)
    }

    pub fn recompute<S: TimedSample>(&mut self, samples: &[S], as_of: DateTime<Utc>) {
        let mut averages = BTreeMap::new();

        for period in self.enabled_periods() {
            let window = period.window(as_of);
            let values: Vec<f64> = samples
                .iter()
                .filter(|s| window.contains(s.representative_at()))
                .map(TimedSample::seconds)
                .collect();

            if let Some(avg) = mean(&values) {
                averages.insert(period, avg);
            }
        }

        self.averages = averages;
    }
}

/// Population standard deviation of all sample values, `None` without samples.
/// A single sample gives `Some(0.0)`.
pub fn sample_stddev<S: TimedSample>(samples: &[S]) -> Option<f64> {
    let values: Vec<f64> = samples.iter().map(TimedSample::seconds).collect();
    mean(&values).map(|m| stddev(&values, m))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    struct Fixed(DateTime<Utc>, f64);

    impl TimedSample for Fixed {
        fn representative_at(&self) -> DateTime<Utc> {
            self.0
        }
        fn seconds(&self) -> f64 {
            self.1
        }
    }

    fn at(d: u32, h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, d, h, m, 0).unwrap()
    }

    #[test]
    fn test_only_current_window_counts() {
        let samples = vec![
            Fixed(at(10, 9, 30), 100.0),
            Fixed(at(10, 10, 5), 200.0),
            Fixed(at(10, 10, 50), 400.0),
        ];
        let mut avg = RollingAverages::new(&Period::ALL);
        avg.recompute(&samples, at(10, 10, 59));

        assert_eq!(avg.get(Period::Hour), Some(300.0));
        let day = avg.get(Period::Day).unwrap();
        assert!((day - 233.333).abs() < 0.01);
    }

    #[test]
    fn test_empty_window_is_undefined() {
        let samples = vec![Fixed(at(1, 0, 0), 60.0)];
        let mut avg = RollingAverages::new(&[Period::Hour, Period::Month]);
        avg.recompute(&samples, at(20, 12, 0));

        assert_eq!(avg.get(Period::Hour), None);
        assert_eq!(avg.get(Period::Month), Some(60.0));
        assert_eq!(avg.get(Period::Year), None);
    }

    #[test]
    fn test_recompute_is_idempotent() {
        let samples = vec![Fixed(at(3, 4, 0), 10.0), Fixed(at(3, 4, 20), 30.0)];
        let mut avg = RollingAverages::new(&Period::ALL);
        avg.recompute(&samples, at(3, 4, 30));
        let first = avg.clone();
        avg.recompute(&samples, at(3, 4, 30));
        assert_eq!(avg, first);
    }

    #[test]
    fn test_sample_stddev() {
        assert_eq!(sample_stddev::<Fixed>(&[]), None);
        assert_eq!(sample_stddev(&[Fixed(at(1, 0, 0), 90.0)]), Some(0.0));
        let spread = [Fixed(at(1, 0, 0), 100.0), Fixed(at(1, 1, 0), 300.0)];
        assert_eq!(sample_stddev(&spread), Some(100.0));
    }

    #[test]
    fn test_disabling_clears_average() {
        let samples = vec![Fixed(at(3, 4, 0), 10.0)];
        let mut avg = RollingAverages::new(&Period::ALL);
        avg.recompute(&samples, at(3, 4, 30));
        avg.set_enabled(Period::Hour, false);

        assert!(!avg.is_enabled(Period::Hour));
        assert_eq!(avg.get(Period::Hour), None);
        assert_eq!(avg.get(Period::Day), Some(10.0));
    }
}

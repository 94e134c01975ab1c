use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// Time Series Primitives
// ============================================================================

/// A single parsed sample: timestamp, engineered feature values and the
/// metered output. Immutable once parsed; the whole set is regenerated
/// whenever the raw input text changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub timestamp: NaiveDateTime,
    /// Feature values, parallel to the feature order used at fit time.
    pub features: Vec<f64>,
    pub target: f64,
}

impl Observation {
    pub fn new(timestamp: NaiveDateTime, features: Vec<f64>, target: f64) -> Self {
        Self {
            timestamp,
            features,
            target,
        }
    }
}

/// One day of a metered series (attribution trees work at day resolution).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DailyPoint {
    pub date: NaiveDate,
    pub value: f64,
}

impl DailyPoint {
    pub fn new(date: NaiveDate, value: f64) -> Self {
        Self { date, value }
    }
}

impl fmt::Display for DailyPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {:.3}", self.date, self.value)
    }
}

// ============================================================================
// Date Ranges
// ============================================================================

/// Inclusive date range. Both boundary dates are part of the range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }

    /// Number of days covered, boundaries included.
    pub fn num_days(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..={}", self.start, self.end)
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_date_range_inclusive_boundaries() {
        let range = DateRange::new(d(2024, 3, 1), d(2024, 3, 31));

        assert!(range.contains(d(2024, 3, 1)));
        assert!(range.contains(d(2024, 3, 31)));
        assert!(range.contains(d(2024, 3, 15)));
        assert!(!range.contains(d(2024, 2, 29)));
        assert!(!range.contains(d(2024, 4, 1)));
    }

    #[test]
    fn test_date_range_num_days() {
        let range = DateRange::new(d(2024, 3, 1), d(2024, 3, 31));
        assert_eq!(range.num_days(), 31);

        let single = DateRange::new(d(2024, 3, 1), d(2024, 3, 1));
        assert_eq!(single.num_days(), 1);
    }

    #[test]
    fn test_observation_serialization() {
        let ts = d(2024, 1, 2).and_hms_opt(13, 30, 0).unwrap();
        let obs = Observation::new(ts, vec![2024.0, 1.0, 2.0, 13.0], 42.5);

        let json = serde_json::to_string(&obs).unwrap();
        let back: Observation = serde_json::from_str(&json).unwrap();
        assert_eq!(obs, back);
    }
}

//! Feature engineering for consumption estimation
//!
//! Derives calendar-based features from timestamps and assembles the named,
//! ordered feature matrix the regression core consumes.

use chrono::{Datelike, NaiveDateTime, Timelike};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use thiserror::Error;

use crate::domain::Observation;
use crate::ingest::Table;

/// Calendar features derivable from a timestamp.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum CalendarFeature {
    Year,
    Month,
    Day,
    Hour,
    DayOfWeek,
    IsWeekend,
}

impl CalendarFeature {
    /// Numeric value of this feature for a timestamp.
    pub fn value(&self, ts: NaiveDateTime) -> f64 {
        match self {
            Self::Year => ts.year() as f64,
            Self::Month => ts.month() as f64,
            Self::Day => ts.day() as f64,
            Self::Hour => ts.hour() as f64,
            // 0 = Monday .. 6 = Sunday
            Self::DayOfWeek => ts.weekday().num_days_from_monday() as f64,
            Self::IsWeekend => {
                if ts.weekday().num_days_from_monday() >= 5 {
                    1.0
                } else {
                    0.0
                }
            }
        }
    }
}

/// The calendar features the predictor derives by default.
pub const DEFAULT_CALENDAR: &[CalendarFeature] = &[
    CalendarFeature::Year,
    CalendarFeature::Month,
    CalendarFeature::Day,
    CalendarFeature::Hour,
];

#[derive(Debug, Error)]
pub enum FeatureError {
    #[error("feature set is empty")]
    Empty,

    #[error("duplicate feature name '{0}'")]
    Duplicate(String),

    #[error("target column '{0}' not found in input")]
    UnknownTarget(String),

    #[error("locked feature '{0}' is not in the feature set")]
    UnknownLocked(String),
}

/// Ordered list of named inputs. Each name maps to one column position in the
/// feature matrix; the order is part of every regression result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureSet {
    names: Vec<String>,
}

impl FeatureSet {
    pub fn new(names: Vec<String>) -> Result<Self, FeatureError> {
        if names.is_empty() {
            return Err(FeatureError::Empty);
        }
        for (i, name) in names.iter().enumerate() {
            if names[..i].contains(name) {
                return Err(FeatureError::Duplicate(name.clone()));
            }
        }
        Ok(Self { names })
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }

    /// Resolve locked feature names to column positions. Membership is
    /// checked here, at regression time, not earlier.
    pub fn resolve_locked(&self, locked: &[String]) -> Result<Vec<usize>, FeatureError> {
        locked
            .iter()
            .map(|name| {
                self.position(name)
                    .ok_or_else(|| FeatureError::UnknownLocked(name.clone()))
            })
            .collect()
    }
}

/// Named feature matrix plus the timestamps its rows were derived from.
#[derive(Debug, Clone)]
pub struct FeatureMatrix {
    pub set: FeatureSet,
    pub matrix: Array2<f64>,
    pub timestamps: Vec<NaiveDateTime>,
}

/// Split a table into observations: per row, every column except the target
/// becomes a feature value (in table order), the target becomes the output.
pub fn observations_from_table(
    table: &Table,
    target: &str,
) -> Result<(FeatureSet, Vec<Observation>), FeatureError> {
    let target_values = table
        .column(target)
        .ok_or_else(|| FeatureError::UnknownTarget(target.to_string()))?;

    let feature_columns: Vec<_> = table.columns.iter().filter(|c| c.name != target).collect();
    let set = FeatureSet::new(feature_columns.iter().map(|c| c.name.clone()).collect())?;

    let observations = (0..table.len())
        .map(|row| {
            Observation::new(
                table.timestamps[row],
                feature_columns.iter().map(|c| c.values[row]).collect(),
                target_values[row],
            )
        })
        .collect();

    Ok((set, observations))
}

impl FeatureMatrix {
    /// Assemble the design matrix and target vector from observations.
    pub fn from_observations(
        set: FeatureSet,
        observations: &[Observation],
    ) -> (Self, Array1<f64>) {
        let rows = observations.len();
        let cols = set.len();

        let mut flat = Vec::with_capacity(rows * cols);
        let mut targets = Vec::with_capacity(rows);
        let mut timestamps = Vec::with_capacity(rows);
        for obs in observations {
            flat.extend(obs.features.iter().copied());
            targets.push(obs.target);
            timestamps.push(obs.timestamp);
        }
        let matrix = Array2::from_shape_vec((rows, cols), flat)
            .expect("row-major fill matches declared shape");

        (
            Self {
                set,
                matrix,
                timestamps,
            },
            Array1::from(targets),
        )
    }

    /// Build a feature matrix straight from a parsed table. Returns the
    /// target vector alongside.
    pub fn from_table(table: &Table, target: &str) -> Result<(Self, Array1<f64>), FeatureError> {
        let (set, observations) = observations_from_table(table, target)?;
        Ok(Self::from_observations(set, &observations))
    }

    /// Append calendar features derived from the row timestamps.
    pub fn with_calendar(self, calendar: &[CalendarFeature]) -> Result<Self, FeatureError> {
        let rows = self.matrix.nrows();
        let old_cols = self.matrix.ncols();
        let new_cols = old_cols + calendar.len();

        let mut names = self.set.names().to_vec();
        names.extend(calendar.iter().map(|f| f.to_string()));
        let set = FeatureSet::new(names)?;

        let mut flat = Vec::with_capacity(rows * new_cols);
        for (row_idx, ts) in self.timestamps.iter().enumerate() {
            flat.extend(self.matrix.row(row_idx).iter().copied());
            flat.extend(calendar.iter().map(|f| f.value(*ts)));
        }
        let matrix = Array2::from_shape_vec((rows, new_cols), flat)
            .expect("row-major fill matches declared shape");

        Ok(Self {
            set,
            matrix,
            timestamps: self.timestamps,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::parse_table;
    use chrono::NaiveDate;

    fn ts(y: i32, m: u32, d: u32, h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d).unwrap().and_hms_opt(h, 0, 0).unwrap()
    }

    #[test]
    fn test_calendar_feature_values() {
        // 2024-03-09 is a Saturday
        let t = ts(2024, 3, 9, 17);
        assert_eq!(CalendarFeature::Year.value(t), 2024.0);
        assert_eq!(CalendarFeature::Month.value(t), 3.0);
        assert_eq!(CalendarFeature::Day.value(t), 9.0);
        assert_eq!(CalendarFeature::Hour.value(t), 17.0);
        assert_eq!(CalendarFeature::DayOfWeek.value(t), 5.0);
        assert_eq!(CalendarFeature::IsWeekend.value(t), 1.0);

        let monday = ts(2024, 3, 11, 8);
        assert_eq!(CalendarFeature::DayOfWeek.value(monday), 0.0);
        assert_eq!(CalendarFeature::IsWeekend.value(monday), 0.0);
    }

    #[test]
    fn test_feature_set_rejects_duplicates() {
        let err = FeatureSet::new(vec!["a".into(), "b".into(), "a".into()]).unwrap_err();
        assert!(matches!(err, FeatureError::Duplicate(name) if name == "a"));
    }

    #[test]
    fn test_resolve_locked() {
        let set = FeatureSet::new(vec!["a".into(), "b".into(), "c".into()]).unwrap();
        assert_eq!(set.resolve_locked(&["c".into(), "a".into()]).unwrap(), vec![2, 0]);

        let err = set.resolve_locked(&["nope".into()]).unwrap_err();
        assert!(matches!(err, FeatureError::UnknownLocked(name) if name == "nope"));
    }

    #[test]
    fn test_observations_carry_rows() {
        let text = "t;press;total\n01.02.2024 00:00;1;10\n01.02.2024 01:00;3;20\n";
        let table = parse_table(text, None).unwrap();

        let (set, obs) = observations_from_table(&table, "total").unwrap();
        assert_eq!(set.names(), &["press".to_string()]);
        assert_eq!(obs.len(), 2);
        assert_eq!(obs[1].features, vec![3.0]);
        assert_eq!(obs[1].target, 20.0);
        assert_eq!(obs[0].timestamp, ts(2024, 2, 1, 0));
    }

    #[test]
    fn test_from_table_splits_target() {
        let text = "t;press;saw;total\n\
                    01.02.2024 00:00;1;2;10\n\
                    01.02.2024 01:00;3;4;20\n";
        let table = parse_table(text, None).unwrap();

        let (fm, y) = FeatureMatrix::from_table(&table, "total").unwrap();
        assert_eq!(fm.set.names(), &["press".to_string(), "saw".to_string()]);
        assert_eq!(fm.matrix.shape(), &[2, 2]);
        assert_eq!(fm.matrix[[1, 0]], 3.0);
        assert_eq!(y.to_vec(), vec![10.0, 20.0]);
    }

    #[test]
    fn test_with_calendar_appends_columns() {
        let text = "t;press;total\n09.03.2024 17:00;1;10\n";
        let table = parse_table(text, None).unwrap();
        let (fm, _) = FeatureMatrix::from_table(&table, "total").unwrap();

        let fm = fm.with_calendar(DEFAULT_CALENDAR).unwrap();
        assert_eq!(
            fm.set.names(),
            &[
                "press".to_string(),
                "year".to_string(),
                "month".to_string(),
                "day".to_string(),
                "hour".to_string()
            ]
        );
        assert_eq!(fm.matrix.shape(), &[1, 5]);
        assert_eq!(fm.matrix[[0, 1]], 2024.0);
        assert_eq!(fm.matrix[[0, 4]], 17.0);
    }
}

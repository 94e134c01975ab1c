//! Constrained multivariate regression with baseline locking
//!
//! Estimates per-feature energy rates in two stages: an unconstrained
//! no-intercept preliminary fit over all features, then a with-intercept
//! correction fit over the unlocked features against the target minus the
//! locked features' preliminary contribution. Locked features keep their
//! preliminary rate in the final model.
//!
//! The two stages differ on purpose: stage one fits without an intercept,
//! stage two with one.

pub mod metrics;

pub use metrics::FitMetrics;

use chrono::{DateTime, Utc};
use linfa::dataset::Dataset;
use linfa::traits::Fit;
use linfa_linear::LinearRegression;
use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::features::{FeatureError, FeatureSet};

#[derive(Debug, Error)]
pub enum RegressionError {
    #[error("no samples to fit")]
    EmptySamples,

    #[error("feature/target length mismatch: {rows} rows, {targets} targets")]
    LengthMismatch { rows: usize, targets: usize },

    #[error("feature set names {names} features but the matrix has {columns} columns")]
    FeatureCount { names: usize, columns: usize },

    #[error(transparent)]
    Feature(#[from] FeatureError),

    #[error("least-squares solver failed: {0}")]
    Solver(String),
}

/// Fitted rate model: `target ≈ intercept + Σ rate_i * feature_i`.
///
/// The intercept belongs to the unlocked baselines; locked features carry
/// their preliminary rate unchanged. Recomputed on every estimate action,
/// serialized only when the session is exported.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateModel {
    pub model_id: Uuid,
    pub fitted_at: DateTime<Utc>,
    pub sample_count: usize,
    /// Intercept to be distributed among the unlocked baselines.
    pub intercept: f64,
    /// Per-feature rates, parallel to `feature_order`.
    pub rates: Vec<f64>,
    pub feature_order: Vec<String>,
    pub locked_features: Vec<String>,
}

impl RateModel {
    pub fn is_locked(&self, name: &str) -> bool {
        self.locked_features.iter().any(|f| f == name)
    }

    pub fn rate(&self, name: &str) -> Option<f64> {
        self.feature_order
            .iter()
            .position(|f| f == name)
            .map(|i| self.rates[i])
    }

    /// Apply the model to one feature row (parallel to `feature_order`).
    pub fn predict_row(&self, features: &[f64]) -> f64 {
        self.intercept
            + self
                .rates
                .iter()
                .zip(features.iter())
                .map(|(rate, value)| rate * value)
                .sum::<f64>()
    }

    /// Apply the model to every row of a feature matrix.
    pub fn predict(&self, x: &Array2<f64>) -> Array1<f64> {
        let mut out = Array1::zeros(x.nrows());
        for (row_idx, row) in x.axis_iter(Axis(0)).enumerate() {
            let dot: f64 = self
                .rates
                .iter()
                .zip(row.iter())
                .map(|(rate, value)| rate * value)
                .sum();
            out[row_idx] = self.intercept + dot;
        }
        out
    }
}

/// Fit the two-stage locked-baseline model.
///
/// Underdetermined systems (rows ≤ features + 1) are not rejected here; the
/// solver's answer is returned as-is and a singular system surfaces as
/// [`RegressionError::Solver`]. Callers wanting stability must check sample
/// counts themselves.
pub fn fit_locked(
    x: &Array2<f64>,
    y: &Array1<f64>,
    features: &FeatureSet,
    locked: &[String],
) -> Result<RateModel, RegressionError> {
    if x.nrows() == 0 {
        return Err(RegressionError::EmptySamples);
    }
    if x.nrows() != y.len() {
        return Err(RegressionError::LengthMismatch {
            rows: x.nrows(),
            targets: y.len(),
        });
    }
    if features.len() != x.ncols() {
        return Err(RegressionError::FeatureCount {
            names: features.len(),
            columns: x.ncols(),
        });
    }

    let locked_idx = features.resolve_locked(locked)?;

    // Stage 1: unconstrained, no-intercept fit over all features.
    let (preliminary, _) = least_squares(x, y, false)?;

    // Known consumption of the locked features, subtracted per sample.
    let mut adjusted = y.clone();
    for &j in &locked_idx {
        let rate = preliminary[j];
        for (row, value) in adjusted.iter_mut().enumerate() {
            *value -= rate * x[[row, j]];
        }
    }

    let unlocked_idx: Vec<usize> =
        (0..features.len()).filter(|i| !locked_idx.contains(i)).collect();

    let (intercept, rates) = if unlocked_idx.is_empty() {
        // Everything locked: nothing left to solve for, the adjusted target's
        // mean is the whole remaining baseline.
        let intercept = adjusted.mean().unwrap_or(0.0);
        (intercept, preliminary.to_vec())
    } else {
        // Stage 2: with-intercept fit over the unlocked columns only.
        let x_unlocked = x.select(Axis(1), &unlocked_idx);
        let (correction, intercept) = least_squares(&x_unlocked, &adjusted, true)?;

        let mut rates = preliminary.to_vec();
        for (slot, &col) in unlocked_idx.iter().enumerate() {
            rates[col] = correction[slot];
        }
        (intercept, rates)
    };

    Ok(RateModel {
        model_id: Uuid::new_v4(),
        fitted_at: Utc::now(),
        sample_count: x.nrows(),
        intercept,
        rates,
        feature_order: features.names().to_vec(),
        locked_features: locked.to_vec(),
    })
}

fn least_squares(
    x: &Array2<f64>,
    y: &Array1<f64>,
    intercept: bool,
) -> Result<(Array1<f64>, f64), RegressionError> {
    let dataset = Dataset::new(x.clone(), y.clone());
    let fitted = LinearRegression::new()
        .with_intercept(intercept)
        .fit(&dataset)
        .map_err(|e| RegressionError::Solver(format!("{e:?}")))?;

    let params = fitted.params().to_owned();
    let intercept = if intercept { fitted.intercept() } else { 0.0 };
    Ok((params, intercept))
}

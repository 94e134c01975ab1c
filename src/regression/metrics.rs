//! Fit quality metrics
//!
//! MAE, RMSE, MAPE and R² over the training window, reported next to every
//! estimate so a poor fit is visible before the rates are trusted.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FitMetrics {
    /// Mean Absolute Error
    pub mae: f64,
    /// Root Mean Square Error
    pub rmse: f64,
    /// Mean Absolute Percentage Error (%)
    pub mape: f64,
    /// R² (coefficient of determination)
    pub r2: f64,
    /// Number of samples evaluated
    pub sample_count: usize,
}

#[derive(Debug, Clone, Error)]
pub enum MetricsError {
    #[error("dimension mismatch: actual={actual}, predicted={predicted}")]
    DimensionMismatch { actual: usize, predicted: usize },

    #[error("empty data provided")]
    EmptyData,
}

impl FitMetrics {
    /// Calculate metrics from actual and predicted values.
    pub fn calculate(actual: &[f64], predicted: &[f64]) -> Result<Self, MetricsError> {
        if actual.len() != predicted.len() {
            return Err(MetricsError::DimensionMismatch {
                actual: actual.len(),
                predicted: predicted.len(),
            });
        }
        if actual.is_empty() {
            return Err(MetricsError::EmptyData);
        }

        let n = actual.len();
        let mut abs_sum = 0.0;
        let mut sq_sum = 0.0;
        let mut pct_sum = 0.0;
        let mut pct_count = 0usize;

        for (a, p) in actual.iter().zip(predicted.iter()) {
            let error = a - p;
            abs_sum += error.abs();
            sq_sum += error * error;

            // Percentage error skips near-zero actuals
            if a.abs() > 1e-6 {
                pct_sum += (error.abs() / a.abs()) * 100.0;
                pct_count += 1;
            }
        }

        let mae = abs_sum / n as f64;
        let rmse = (sq_sum / n as f64).sqrt();
        let mape = if pct_count == 0 {
            0.0
        } else {
            pct_sum / pct_count as f64
        };

        let mean_actual = actual.iter().sum::<f64>() / n as f64;
        let total_variance: f64 = actual.iter().map(|a| (a - mean_actual).powi(2)).sum();
        let r2 = if total_variance > 1e-10 {
            1.0 - (sq_sum / total_variance)
        } else {
            0.0
        };

        Ok(FitMetrics {
            mae,
            rmse,
            mape,
            r2,
            sample_count: n,
        })
    }
}

impl fmt::Display for FitMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "MAE={:.3}, RMSE={:.3}, MAPE={:.2}%, R²={:.3} over {} samples",
            self.mae, self.rmse, self.mape, self.r2, self.sample_count
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_perfect_fit() {
        let actual = vec![1.0, 2.0, 3.0, 4.0, 5.0];
        let metrics = FitMetrics::calculate(&actual, &actual).unwrap();

        assert_eq!(metrics.mae, 0.0);
        assert_eq!(metrics.rmse, 0.0);
        assert_eq!(metrics.mape, 0.0);
        assert_eq!(metrics.r2, 1.0);
        assert_eq!(metrics.sample_count, 5);
    }

    #[test]
    fn test_fit_with_errors() {
        let actual = vec![100.0, 200.0, 300.0, 400.0, 500.0];
        let predicted = vec![110.0, 190.0, 310.0, 390.0, 510.0];

        let metrics = FitMetrics::calculate(&actual, &predicted).unwrap();

        assert!((metrics.mae - 10.0).abs() < 1e-9);
        assert!(metrics.mape < 10.0);
        assert!(metrics.r2 > 0.95);
    }

    #[test]
    fn test_dimension_mismatch() {
        let result = FitMetrics::calculate(&[1.0, 2.0, 3.0], &[1.0, 2.0]);
        assert!(matches!(
            result,
            Err(MetricsError::DimensionMismatch { actual: 3, predicted: 2 })
        ));
    }

    #[test]
    fn test_empty_data() {
        assert!(matches!(
            FitMetrics::calculate(&[], &[]),
            Err(MetricsError::EmptyData)
        ));
    }

    #[test]
    fn test_mape_skips_zero_actuals() {
        let actual = vec![0.0, 100.0];
        let predicted = vec![5.0, 110.0];
        let metrics = FitMetrics::calculate(&actual, &predicted).unwrap();
        // Only the second sample contributes to MAPE
        assert!((metrics.mape - 10.0).abs() < 1e-9);
    }
}

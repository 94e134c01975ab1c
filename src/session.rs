//! Predictor session document
//!
//! The energy predictor's own import/export schema. Only this tool reads
//! it; the shape (camelCase keys, the five top-level sections) is preserved
//! exactly so existing session files keep round-tripping.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::domain::DateRange;
use crate::formula::{Formula, FormulaError};

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PredictorSession {
    #[serde(default)]
    pub managed_categories: Vec<ManagedCategory>,
    #[serde(default)]
    pub calculated_columns: Vec<CalculatedColumn>,
    #[serde(default)]
    pub allocations: Vec<Allocation>,
    #[serde(default)]
    pub time_range: Option<DateRange>,
    /// Per-dataset visibility flags. Opaque view state, preserved as-is.
    #[serde(default)]
    pub dataset_display_states: BTreeMap<String, bool>,
}

/// A consumer category under management. `locked` categories keep their
/// pre-estimated rate through the next estimate (the regression lock set).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManagedCategory {
    pub name: String,
    #[serde(default)]
    pub locked: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub baseline_rate: Option<f64>,
}

/// A user-defined column computed from other columns via a formula.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalculatedColumn {
    pub name: String,
    pub formula: String,
}

impl CalculatedColumn {
    pub fn compile(&self) -> Result<Formula, FormulaError> {
        Formula::parse(&self.formula)
    }
}

/// How the fit intercept is split across categories.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Allocation {
    pub category: String,
    pub share: f64,
}

impl PredictorSession {
    /// Names of the categories whose rates are locked for the next fit.
    pub fn locked_feature_names(&self) -> Vec<String> {
        self.managed_categories
            .iter()
            .filter(|c| c.locked)
            .map(|c| c.name.clone())
            .collect()
    }

    /// Compile every calculated column. A formula that does not parse fails
    /// the whole session load, once, up front.
    pub fn compile_columns(&self) -> Result<Vec<(String, Formula)>, FormulaError> {
        self.calculated_columns
            .iter()
            .map(|c| c.compile().map(|f| (c.name.clone(), f)))
            .collect()
    }

    /// Distribute an intercept across the allocation shares. Shares are
    /// normalized by their sum; with no usable shares nothing is returned.
    pub fn distribute_intercept(&self, intercept: f64) -> Vec<(String, f64)> {
        let total: f64 = self.allocations.iter().map(|a| a.share).sum();
        if total <= 0.0 {
            return Vec::new();
        }
        self.allocations
            .iter()
            .map(|a| (a.category.clone(), intercept * a.share / total))
            .collect()
    }
}

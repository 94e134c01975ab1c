//! Hierarchical loss/attribution accounting
//!
//! Models a plant as a tree of metered energy nodes and reconciles each
//! node's recorded input against its children, modeled technical loss and
//! modeled unmeasured consumption over a date range.

pub mod traversal;

pub use traversal::{document_report, system_report, NodeReport};

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::domain::{DailyPoint, DateRange};

// ============================================================================
// Loss Models
// ============================================================================

/// Technical loss at a node, evaluated per day against the day load.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "model", content = "param", rename_all = "lowercase")]
pub enum LossModel {
    None,
    /// `load * param / 100`
    Percent(f64),
    /// `param * load²`
    Quadratic(f64),
    /// Flat amount per day
    Fixed(f64),
}

impl Default for LossModel {
    fn default() -> Self {
        Self::None
    }
}

impl LossModel {
    pub fn daily_loss(&self, load: f64) -> f64 {
        match self {
            Self::None => 0.0,
            Self::Percent(p) => load * p / 100.0,
            Self::Quadratic(p) => p * load * load,
            Self::Fixed(p) => *p,
        }
    }
}

/// Consumption that is real but not separately metered by any child. Unlike
/// [`LossModel`] this is evaluated against the node's own recorded input,
/// not the day load.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "model", content = "param", rename_all = "lowercase")]
pub enum UnmeasuredModel {
    None,
    /// `input * param / 100`
    Percent(f64),
    /// Flat amount per day
    Fixed(f64),
}

impl Default for UnmeasuredModel {
    fn default() -> Self {
        Self::None
    }
}

impl UnmeasuredModel {
    pub fn daily_amount(&self, input: f64) -> f64 {
        match self {
            Self::None => 0.0,
            Self::Percent(p) => input * p / 100.0,
            Self::Fixed(p) => *p,
        }
    }
}

// ============================================================================
// Node Tree
// ============================================================================

/// A metered node. Children are exclusively owned by their parent; a node's
/// efficiency is only meaningful where the children's series share dates
/// with the parent's.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnergyNode {
    pub name: String,
    #[serde(default)]
    pub series: Vec<DailyPoint>,
    #[serde(default)]
    pub children: Vec<EnergyNode>,
    #[serde(default)]
    pub loss: LossModel,
    #[serde(default)]
    pub unmeasured: UnmeasuredModel,
}

impl EnergyNode {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            series: Vec::new(),
            children: Vec::new(),
            loss: LossModel::None,
            unmeasured: UnmeasuredModel::None,
        }
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// Recorded value on one day. Duplicate entries for a date sum up;
    /// a day without an entry reads as zero.
    pub fn value_on(&self, date: NaiveDate) -> f64 {
        self.series
            .iter()
            .filter(|p| p.date == date)
            .map(|p| p.value)
            .sum()
    }

    /// Recorded input total over a range, boundaries included.
    pub fn recorded_total(&self, range: DateRange) -> f64 {
        self.series
            .iter()
            .filter(|p| range.contains(p.date))
            .map(|p| p.value)
            .sum()
    }
}

// ============================================================================
// System Document
// ============================================================================

/// Canvas position of a node in the sankey view. Opaque to computation,
/// preserved on round-trip.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SankeyPosition {
    pub x: f64,
    pub y: f64,
}

/// A display grouping of consumer nodes into one production line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductionLine {
    pub name: String,
    #[serde(default)]
    pub consumers: Vec<String>,
}

/// The energy-system tool's own document schema. Other tools define their
/// own; there is no cross-tool compatibility guarantee.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemDocument {
    #[serde(default)]
    pub systems: Vec<EnergyNode>,
    #[serde(default)]
    pub production_lines: Vec<ProductionLine>,
    #[serde(default)]
    pub sankey_positions: BTreeMap<String, SankeyPosition>,
}

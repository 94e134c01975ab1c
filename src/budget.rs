//! Budget planner ledger
//!
//! The budget tool's own document schema (`startBalance` + `entries`) and
//! the running-balance computation behind its table view.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BudgetPlan {
    #[serde(default)]
    pub start_balance: f64,
    #[serde(default)]
    pub entries: Vec<BudgetEntry>,
}

/// One planned income (positive) or expense (negative).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BudgetEntry {
    pub date: NaiveDate,
    pub label: String,
    pub amount: f64,
}

/// One row of the rendered ledger: the entry plus the balance after it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BalanceRow {
    pub date: NaiveDate,
    pub label: String,
    pub amount: f64,
    pub balance: f64,
}

impl BudgetPlan {
    /// Entries sorted by date (stable, so same-day entries keep their input
    /// order) with the cumulative balance after each one.
    pub fn ledger(&self) -> Vec<BalanceRow> {
        let mut sorted = self.entries.clone();
        sorted.sort_by_key(|e| e.date);

        let mut balance = self.start_balance;
        sorted
            .into_iter()
            .map(|entry| {
                balance += entry.amount;
                BalanceRow {
                    date: entry.date,
                    label: entry.label,
                    amount: entry.amount,
                    balance,
                }
            })
            .collect()
    }

    pub fn final_balance(&self) -> f64 {
        self.start_balance + self.entries.iter().map(|e| e.amount).sum::<f64>()
    }
}

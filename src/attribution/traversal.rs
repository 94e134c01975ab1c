//! Per-day accounting over the node tree
//!
//! Walks each system pre-order and reconciles every node for a date range:
//! recorded input vs. children, technical loss, unmeasured consumption, the
//! unexplained residual and an efficiency percentage.

use chrono::NaiveDate;
use itertools::Itertools;
use serde::{Deserialize, Serialize};

use super::{EnergyNode, SystemDocument};
use crate::domain::DateRange;

/// One report row. `depth` is the node's distance from its system root,
/// used for display indentation (parent rows precede child rows).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeReport {
    pub name: String,
    pub depth: usize,
    pub recorded_input: f64,
    pub children_total: f64,
    pub technical_loss: f64,
    pub unmeasured: f64,
    pub useful_output: f64,
    pub unexplained: f64,
    pub efficiency_percent: f64,
}

/// Report over every system in a document, in document order.
pub fn document_report(doc: &SystemDocument, range: DateRange) -> Vec<NodeReport> {
    doc.systems
        .iter()
        .flat_map(|system| system_report(system, range))
        .collect()
}

/// Pre-order report over one system. Nodes with zero recorded input and
/// zero children sum are skipped, not zero-filled; their subtrees are still
/// visited. Callers needing complete coverage must not rely on this output
/// alone.
pub fn system_report(root: &EnergyNode, range: DateRange) -> Vec<NodeReport> {
    let mut rows = Vec::new();
    visit(root, 0, range, &mut rows);
    rows
}

fn visit(node: &EnergyNode, depth: usize, range: DateRange, rows: &mut Vec<NodeReport>) {
    if let Some(report) = node_report(node, depth, range) {
        rows.push(report);
    }
    for child in &node.children {
        visit(child, depth + 1, range, rows);
    }
}

fn node_report(node: &EnergyNode, depth: usize, range: DateRange) -> Option<NodeReport> {
    let recorded_input = node.recorded_total(range);
    let children_total: f64 = node
        .children
        .iter()
        .map(|child| child.recorded_total(range))
        .sum();

    // Display policy: nothing recorded anywhere means no row.
    if recorded_input == 0.0 && children_total == 0.0 {
        return None;
    }

    let mut technical_loss = 0.0;
    let mut unmeasured = 0.0;
    for day in active_days(node, range) {
        let load = if node.is_leaf() {
            node.value_on(day)
        } else {
            node.children.iter().map(|c| c.value_on(day)).sum()
        };
        technical_loss += node.loss.daily_loss(load);
        unmeasured += node.unmeasured.daily_amount(node.value_on(day));
    }

    let useful_output = children_total + unmeasured;

    let (unexplained, efficiency_percent) = if node.is_leaf() {
        let denominator = recorded_input + technical_loss;
        let efficiency = if denominator > 0.0 {
            recorded_input / denominator * 100.0
        } else {
            0.0
        };
        (0.0, efficiency)
    } else {
        let unexplained = recorded_input - useful_output - technical_loss;
        let efficiency = if recorded_input > 0.0 {
            useful_output / recorded_input * 100.0
        } else {
            0.0
        };
        (unexplained, efficiency)
    };

    Some(NodeReport {
        name: node.name.clone(),
        depth,
        recorded_input,
        children_total,
        technical_loss,
        unmeasured,
        useful_output,
        unexplained,
        efficiency_percent,
    })
}

/// Days the node or any direct child recorded inside the range. Days where
/// parent and children do not overlap still count; the gap shows up as
/// unexplained energy.
fn active_days(node: &EnergyNode, range: DateRange) -> Vec<NaiveDate> {
    node.series
        .iter()
        .map(|p| p.date)
        .chain(
            node.children
                .iter()
                .flat_map(|child| child.series.iter().map(|p| p.date)),
        )
        .filter(|date| range.contains(*date))
        .sorted()
        .dedup()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attribution::{LossModel, UnmeasuredModel};
    use crate::domain::DailyPoint;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, day).unwrap()
    }

    fn may() -> DateRange {
        DateRange::new(d(1), d(31))
    }

    fn leaf(name: &str, points: &[(u32, f64)]) -> EnergyNode {
        let mut node = EnergyNode::new(name);
        node.series = points.iter().map(|&(day, v)| DailyPoint::new(d(day), v)).collect();
        node
    }

    #[test]
    fn test_leaf_fixed_loss_efficiency() {
        let mut node = leaf("pump", &[(1, 100.0)]);
        node.loss = LossModel::Fixed(10.0);

        let rows = system_report(&node, may());
        assert_eq!(rows.len(), 1);
        let row = &rows[0];

        assert_eq!(row.recorded_input, 100.0);
        assert_eq!(row.technical_loss, 10.0);
        assert_eq!(row.unexplained, 0.0); // leaf policy
        assert!((row.efficiency_percent - 90.909).abs() < 0.001);
    }

    #[test]
    fn test_parent_unexplained_and_efficiency() {
        let mut parent = leaf("feed", &[(1, 100.0)]);
        parent.children.push(leaf("press", &[(1, 80.0)]));

        let rows = system_report(&parent, may());
        let row = rows.iter().find(|r| r.name == "feed").unwrap();

        assert_eq!(row.children_total, 80.0);
        assert_eq!(row.unexplained, 20.0);
        assert_eq!(row.efficiency_percent, 80.0);
    }

    #[test]
    fn test_percent_loss_uses_children_load() {
        // Parent loss is percent-of-load; load is the children's day sum,
        // not the parent's own input.
        let mut parent = leaf("feed", &[(1, 100.0)]);
        parent.loss = LossModel::Percent(10.0);
        parent.children.push(leaf("press", &[(1, 60.0)]));
        parent.children.push(leaf("saw", &[(1, 20.0)]));

        let rows = system_report(&parent, may());
        let row = rows.iter().find(|r| r.name == "feed").unwrap();

        assert_eq!(row.technical_loss, 8.0); // 10% of 80, not of 100
        assert_eq!(row.unexplained, 100.0 - 80.0 - 8.0);
    }

    #[test]
    fn test_unmeasured_uses_own_input() {
        let mut parent = leaf("feed", &[(1, 100.0)]);
        parent.unmeasured = UnmeasuredModel::Percent(5.0);
        parent.children.push(leaf("press", &[(1, 80.0)]));

        let rows = system_report(&parent, may());
        let row = rows.iter().find(|r| r.name == "feed").unwrap();

        assert_eq!(row.unmeasured, 5.0); // 5% of the recorded 100
        assert_eq!(row.useful_output, 85.0);
        assert_eq!(row.unexplained, 100.0 - 85.0);
        assert_eq!(row.efficiency_percent, 85.0);
    }

    #[test]
    fn test_fixed_models_accumulate_per_day() {
        let mut node = leaf("pump", &[(1, 50.0), (2, 50.0), (3, 50.0)]);
        node.loss = LossModel::Fixed(2.0);

        let rows = system_report(&node, may());
        assert_eq!(rows[0].technical_loss, 6.0); // 3 active days
    }

    #[test]
    fn test_range_boundaries_inclusive() {
        let node = leaf("pump", &[(1, 10.0), (15, 20.0), (31, 30.0)]);

        let rows = system_report(&node, DateRange::new(d(1), d(31)));
        assert_eq!(rows[0].recorded_input, 60.0);

        let rows = system_report(&node, DateRange::new(d(2), d(30)));
        assert_eq!(rows[0].recorded_input, 20.0);
    }

    #[test]
    fn test_empty_nodes_skipped_but_subtree_visited() {
        let mut root = EnergyNode::new("site"); // no series of its own
        let mut hall = EnergyNode::new("hall"); // nothing recorded at all
        hall.children.push(leaf("press", &[(1, 40.0)]));
        root.children.push(hall);

        let rows = system_report(&root, may());
        let names: Vec<&str> = rows.iter().map(|r| r.name.as_str()).collect();

        // "site" has zero input and zero children sum (hall records nothing),
        // "hall" stays because its children sum is nonzero.
        assert_eq!(names, vec!["hall", "press"]);
    }

    #[test]
    fn test_preorder_and_depth() {
        let mut root = leaf("site", &[(1, 100.0)]);
        let mut hall = leaf("hall", &[(1, 70.0)]);
        hall.children.push(leaf("press", &[(1, 40.0)]));
        root.children.push(hall);
        root.children.push(leaf("office", &[(1, 20.0)]));

        let rows = system_report(&root, may());
        let order: Vec<(&str, usize)> =
            rows.iter().map(|r| (r.name.as_str(), r.depth)).collect();
        assert_eq!(
            order,
            vec![("site", 0), ("hall", 1), ("press", 2), ("office", 1)]
        );
    }

    #[test]
    fn test_zero_input_parent_reports_zero_efficiency() {
        let mut parent = EnergyNode::new("unmetered");
        parent.children.push(leaf("press", &[(1, 30.0)]));

        let rows = system_report(&parent, may());
        let row = rows.iter().find(|r| r.name == "unmetered").unwrap();

        assert_eq!(row.efficiency_percent, 0.0);
        assert_eq!(row.unexplained, -30.0);
    }

    #[test]
    fn test_document_report_covers_all_systems() {
        let mut doc = SystemDocument::default();
        doc.systems.push(leaf("a", &[(1, 1.0)]));
        doc.systems.push(leaf("b", &[(1, 2.0)]));

        let rows = document_report(&doc, may());
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].name, "a");
        assert_eq!(rows[1].name, "b");
    }
}

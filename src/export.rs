//! Locale-aware delimited export
//!
//! Writes tables, attribution reports and rate models back out in the same
//! locale the inputs use: semicolon delimiter, `DD.MM.YYYY` timestamps,
//! comma decimals. A value ingested as `12,5` re-exports as `12,5`.

use thiserror::Error;

use crate::attribution::NodeReport;
use crate::ingest::Table;
use crate::regression::RateModel;

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("writing delimited output: {0}")]
    Csv(#[from] csv::Error),

    #[error("export produced invalid UTF-8")]
    Utf8,
}

#[derive(Debug, Clone, Copy)]
pub struct ExportOptions {
    pub delimiter: u8,
    /// Restore comma decimal separators on output.
    pub decimal_comma: bool,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            delimiter: b';',
            decimal_comma: true,
        }
    }
}

/// Format one number in the configured locale.
pub fn format_number(value: f64, opts: &ExportOptions) -> String {
    let text = format!("{value}");
    if opts.decimal_comma {
        text.replace('.', ",")
    } else {
        text
    }
}

fn writer(opts: &ExportOptions) -> csv::Writer<Vec<u8>> {
    csv::WriterBuilder::new()
        .delimiter(opts.delimiter)
        .from_writer(Vec::new())
}

fn finish(wtr: csv::Writer<Vec<u8>>) -> Result<String, ExportError> {
    let bytes = wtr.into_inner().map_err(|e| ExportError::Csv(e.into_error().into()))?;
    String::from_utf8(bytes).map_err(|_| ExportError::Utf8)
}

/// Re-export a parsed table. Timestamps come back in `DD.MM.YYYY HH:mm`.
pub fn write_table(table: &Table, opts: &ExportOptions) -> Result<String, ExportError> {
    let mut wtr = writer(opts);

    let mut header = vec![table.timestamp_header.clone()];
    header.extend(table.column_names().iter().map(|n| n.to_string()));
    wtr.write_record(&header)?;

    for row in 0..table.len() {
        let mut record = vec![table.timestamps[row].format("%d.%m.%Y %H:%M").to_string()];
        for column in &table.columns {
            record.push(format_number(column.values[row], opts));
        }
        wtr.write_record(&record)?;
    }

    finish(wtr)
}

/// Export an attribution report. Node names are indented by depth, matching
/// the parent-before-children row grouping of the on-screen table.
pub fn write_attribution_report(
    rows: &[NodeReport],
    opts: &ExportOptions,
) -> Result<String, ExportError> {
    let mut wtr = writer(opts);
    wtr.write_record([
        "node",
        "recorded_input",
        "children_total",
        "technical_loss",
        "unmeasured",
        "useful_output",
        "unexplained",
        "efficiency_percent",
    ])?;

    for row in rows {
        let name = format!("{}{}", "  ".repeat(row.depth), row.name);
        wtr.write_record([
            name,
            format_number(row.recorded_input, opts),
            format_number(row.children_total, opts),
            format_number(row.technical_loss, opts),
            format_number(row.unmeasured, opts),
            format_number(row.useful_output, opts),
            format_number(row.unexplained, opts),
            format_number(row.efficiency_percent, opts),
        ])?;
    }

    finish(wtr)
}

/// Export a fitted rate model: one row per feature plus the intercept row.
pub fn write_rate_model(model: &RateModel, opts: &ExportOptions) -> Result<String, ExportError> {
    let mut wtr = writer(opts);
    wtr.write_record(["feature", "rate", "locked"])?;

    for (name, rate) in model.feature_order.iter().zip(model.rates.iter()) {
        wtr.write_record([
            name.clone(),
            format_number(*rate, opts),
            if model.is_locked(name) { "yes" } else { "no" }.to_string(),
        ])?;
    }
    wtr.write_record([
        "(intercept)".to_string(),
        format_number(model.intercept, opts),
        "no".to_string(),
    ])?;

    finish(wtr)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::parse_table;

    #[test]
    fn test_format_number_locale() {
        let comma = ExportOptions::default();
        assert_eq!(format_number(12.5, &comma), "12,5");
        assert_eq!(format_number(-0.25, &comma), "-0,25");
        assert_eq!(format_number(7.0, &comma), "7");

        let dot = ExportOptions {
            decimal_comma: false,
            ..Default::default()
        };
        assert_eq!(format_number(12.5, &dot), "12.5");
    }

    #[test]
    fn test_table_round_trip_restores_comma() {
        let text = "Zeit;Halle 1\n01.02.2024 00:00;12,5\n01.02.2024 01:00;7\n";
        let table = parse_table(text, None).unwrap();

        let out = write_table(&table, &ExportOptions::default()).unwrap();
        assert!(out.contains("12,5"));
        assert!(out.contains("01.02.2024 00:00"));

        // And the export parses back to the same table
        let back = parse_table(&out, None).unwrap();
        assert_eq!(back, table);
    }

    #[test]
    fn test_tab_delimiter() {
        let text = "t;v\n01.02.2024 00:00;1,5\n";
        let table = parse_table(text, None).unwrap();

        let opts = ExportOptions {
            delimiter: b'\t',
            ..Default::default()
        };
        let out = write_table(&table, &opts).unwrap();
        assert!(out.starts_with("t\tv"));
    }
}

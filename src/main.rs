use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn};

use energy_workbench::attribution::{document_report, SystemDocument};
use energy_workbench::budget::BudgetPlan;
use energy_workbench::config::Config;
use energy_workbench::domain::DateRange;
use energy_workbench::export;
use energy_workbench::features::{CalendarFeature, FeatureMatrix};
use energy_workbench::formula::calculated_column;
use energy_workbench::ingest::{self, Column};
use energy_workbench::regression::{fit_locked, FitMetrics};
use energy_workbench::session::PredictorSession;
use energy_workbench::telemetry::init_tracing;

#[derive(Parser)]
#[command(name = "ewb", version, about = "Energy Workbench")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Estimate per-consumer rates from a delimited meter export
    Estimate {
        /// Meter export (semicolon- or tab-delimited)
        #[arg(long)]
        input: PathBuf,

        /// Target column holding the metered total
        #[arg(long)]
        target: String,

        /// Predictor session document (locked categories, calculated columns)
        #[arg(long)]
        session: Option<PathBuf>,

        /// Calendar features to append, e.g. --calendar year,month,day,hour
        #[arg(long, value_delimiter = ',', value_parser = parse_calendar_feature)]
        calendar: Vec<CalendarFeature>,

        /// Write the fitted model as a delimited file
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Loss/attribution report over a system document
    Attribution {
        /// System document (JSON)
        #[arg(long)]
        system: PathBuf,

        /// Range start, inclusive (DD.MM.YYYY or YYYY-MM-DD)
        #[arg(long)]
        from: String,

        /// Range end, inclusive
        #[arg(long)]
        to: String,

        /// Write the report as a delimited file
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Running balances for a budget plan
    Balance {
        /// Budget plan document (JSON)
        #[arg(long)]
        plan: PathBuf,
    },
}

fn main() -> Result<()> {
    init_tracing();

    let cfg = Config::load()?;
    let cli = Cli::parse();

    match cli.command {
        Command::Estimate {
            input,
            target,
            session,
            calendar,
            out,
        } => run_estimate(&cfg, &input, &target, session.as_deref(), &calendar, out.as_deref()),
        Command::Attribution {
            system,
            from,
            to,
            out,
        } => run_attribution(&cfg, &system, &from, &to, out.as_deref()),
        Command::Balance { plan } => run_balance(&plan),
    }
}

fn parse_calendar_feature(raw: &str) -> Result<CalendarFeature, String> {
    raw.parse()
        .map_err(|_| format!("unknown calendar feature '{raw}'"))
}

fn run_estimate(
    cfg: &Config,
    input: &Path,
    target: &str,
    session_path: Option<&Path>,
    calendar: &[CalendarFeature],
    out: Option<&Path>,
) -> Result<()> {
    let text = fs::read_to_string(input)
        .with_context(|| format!("reading {}", input.display()))?;
    let mut table = ingest::parse_table(&text, cfg.ingest.delimiter_byte())?;
    info!(rows = table.len(), columns = table.columns.len(), "parsed meter export");

    let session = load_session(session_path)?;

    // Calculated columns become regular table columns before the fit. A
    // formula referencing a missing column nulls every row; that column is
    // dropped with a warning.
    for (name, formula) in session.compile_columns()? {
        let values = calculated_column(&table, &formula);
        if values.iter().any(|v| v.is_none()) {
            warn!(column = %name, formula = %formula, "calculated column failed, skipping");
            continue;
        }
        table.columns.push(Column {
            name,
            values: values.into_iter().flatten().collect(),
        });
    }

    let (mut features, y) = FeatureMatrix::from_table(&table, target)?;
    if !calendar.is_empty() {
        features = features.with_calendar(calendar)?;
    }

    let locked = session.locked_feature_names();
    let model = fit_locked(&features.matrix, &y, &features.set, &locked)?;

    let predicted = model.predict(&features.matrix);
    let metrics = FitMetrics::calculate(&y.to_vec(), &predicted.to_vec())?;

    println!("Estimated rates ({} samples):", model.sample_count);
    for (name, rate) in model.feature_order.iter().zip(model.rates.iter()) {
        let marker = if model.is_locked(name) { " [locked]" } else { "" };
        println!("  {name}: {rate:.4}{marker}");
    }
    println!("Intercept (unlocked baselines): {:.4}", model.intercept);

    let split = session.distribute_intercept(model.intercept);
    if !split.is_empty() {
        println!("Intercept allocation:");
        for (category, amount) in split {
            println!("  {category}: {amount:.4}");
        }
    }
    println!("Fit quality: {metrics}");

    if let Some(path) = out {
        let csv = export::write_rate_model(&model, &cfg.export.options())?;
        fs::write(path, csv).with_context(|| format!("writing {}", path.display()))?;
        info!(path = %path.display(), "wrote rate model");
    }

    Ok(())
}

fn run_attribution(
    cfg: &Config,
    system: &Path,
    from: &str,
    to: &str,
    out: Option<&Path>,
) -> Result<()> {
    let text = fs::read_to_string(system)
        .with_context(|| format!("reading {}", system.display()))?;
    let doc: SystemDocument = serde_json::from_str(&text)
        .with_context(|| format!("parsing system document {}", system.display()))?;

    let start = ingest::parse_date(from)
        .with_context(|| format!("'{from}' is not a recognized date"))?;
    let end = ingest::parse_date(to)
        .with_context(|| format!("'{to}' is not a recognized date"))?;
    anyhow::ensure!(start <= end, "range start {start} is after end {end}");
    let range = DateRange::new(start, end);

    let rows = document_report(&doc, range);
    info!(systems = doc.systems.len(), rows = rows.len(), %range, "attribution report");

    println!(
        "{:<30} {:>12} {:>12} {:>10} {:>10} {:>12} {:>10}",
        "node", "input", "children", "loss", "unmeas.", "unexplained", "eff. %"
    );
    for row in &rows {
        let name = format!("{}{}", "  ".repeat(row.depth), row.name);
        println!(
            "{:<30} {:>12.2} {:>12.2} {:>10.2} {:>10.2} {:>12.2} {:>10.2}",
            name,
            row.recorded_input,
            row.children_total,
            row.technical_loss,
            row.unmeasured,
            row.unexplained,
            row.efficiency_percent
        );
    }

    if let Some(path) = out {
        let csv = export::write_attribution_report(&rows, &cfg.export.options())?;
        fs::write(path, csv).with_context(|| format!("writing {}", path.display()))?;
        info!(path = %path.display(), "wrote attribution report");
    }

    Ok(())
}

fn run_balance(plan_path: &Path) -> Result<()> {
    let text = fs::read_to_string(plan_path)
        .with_context(|| format!("reading {}", plan_path.display()))?;
    let plan: BudgetPlan = serde_json::from_str(&text)
        .with_context(|| format!("parsing budget plan {}", plan_path.display()))?;

    println!("Start balance: {:.2}", plan.start_balance);
    for row in plan.ledger() {
        println!(
            "{}  {:<24} {:>10.2}  -> {:>10.2}",
            row.date, row.label, row.amount, row.balance
        );
    }
    println!("Final balance: {:.2}", plan.final_balance());

    Ok(())
}

fn load_session(path: Option<&Path>) -> Result<PredictorSession> {
    match path {
        Some(p) => {
            let text = fs::read_to_string(p)
                .with_context(|| format!("reading {}", p.display()))?;
            let session = serde_json::from_str(&text)
                .with_context(|| format!("parsing session document {}", p.display()))?;
            Ok(session)
        }
        None => Ok(PredictorSession::default()),
    }
}

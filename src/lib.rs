//! # energy-workbench
//!
//! Consumption estimation, loss attribution and planning toolkit for
//! metered energy data.
//!
//! The crate covers the computational side of a small tool suite:
//!
//! * **Ingestion**: locale-formatted delimited meter exports (semicolon/tab,
//!   `DD.MM.YYYY` timestamps, comma decimals)
//! * **Estimation**: per-consumer rates via a two-stage least-squares fit
//!   with locked baselines, plus fit-quality metrics
//! * **Attribution**: reconciling metered input against children, technical
//!   loss and unmeasured consumption over a node tree
//! * **Planning**: calculated columns from user formulas, budget ledgers,
//!   per-tool JSON documents and locale-aware export
//!
//! ## Example
//!
//! ```
//! use energy_workbench::features::FeatureMatrix;
//! use energy_workbench::ingest::parse_table;
//! use energy_workbench::regression::fit_locked;
//!
//! // total = 2 * press + 3
//! let text = "Zeit;press;total\n\
//!             01.02.2024 00:00;1;5\n\
//!             01.02.2024 01:00;2;7\n\
//!             01.02.2024 02:00;3;9\n\
//!             01.02.2024 03:00;4;11\n\
//!             01.02.2024 04:00;5;13\n";
//!
//! let table = parse_table(text, None).unwrap();
//! let (features, target) = FeatureMatrix::from_table(&table, "total").unwrap();
//! let model = fit_locked(&features.matrix, &target, &features.set, &[]).unwrap();
//!
//! assert!((model.rates[0] - 2.0).abs() < 1e-6);
//! assert!((model.intercept - 3.0).abs() < 1e-6);
//! ```

pub mod attribution;
pub mod budget;
pub mod config;
pub mod domain;
pub mod export;
pub mod features;
pub mod formula;
pub mod ingest;
pub mod regression;
pub mod session;
pub mod telemetry;

pub use attribution::{document_report, system_report, EnergyNode, NodeReport, SystemDocument};
pub use budget::BudgetPlan;
pub use domain::{DailyPoint, DateRange, Observation};
pub use features::{CalendarFeature, FeatureMatrix, FeatureSet};
pub use formula::Formula;
pub use regression::{fit_locked, FitMetrics, RateModel};
pub use session::PredictorSession;

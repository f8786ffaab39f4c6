//! SentiLab Runner: batch orchestration, metrics, research and artifacts.
//!
//! This crate builds on `sentilab-core` to provide:
//! - Input loading (prices, signal records, news events, universe)
//! - Per-ticker processing into owned signal series
//! - Performance metrics and benchmark comparison
//! - Research regressions (HAC time series, clustered panel, quantile)
//! - Index summary, portfolio and research reports
//! - Atomic JSON/CSV artifact export with schema versioning

pub mod config;
pub mod data_loader;
pub mod export;
pub mod index;
pub mod metrics;
pub mod portfolio_report;
pub mod research;
pub mod runner;
pub mod series;
pub mod stats;

pub use config::{ConfigError, PipelineConfig, PortfolioConfig};
pub use data_loader::{load_inputs, LoadError, LoadReport, LoadedInputs};
pub use export::{read_artifact, write_artifacts, Artifact};
pub use index::IndexSummary;
pub use metrics::PerformanceMetrics;
pub use portfolio_report::{BenchmarkComparison, PortfolioReport};
pub use research::ResearchReport;
pub use runner::{compute, run_and_export, run_pipeline, PipelineReport, RunError, SCHEMA_VERSION};
pub use series::TickerSeries;
pub use stats::{QuantileFit, RegressionTable};

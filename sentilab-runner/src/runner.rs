//! Pipeline runner: wires loading, per-ticker processing, simulation and
//! research together.
//!
//! Entry points:
//! - `run_pipeline()`: loads inputs from the configured paths, then computes.
//! - `compute()`: takes pre-loaded inputs. Pure, deterministic for identical inputs.
//! - `run_and_export()`: `run_pipeline()` followed by an atomic artifact write.

use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::Context;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use sentilab_core::aggregate::{aggregate_daily, AggregationDiagnostics};
use sentilab_core::domain::PriceBar;
use sentilab_core::portfolio::simulate;
use sentilab_core::returns::{ReturnConvention, ReturnPanel};
use sentilab_core::signal::AlignedSignals;

use crate::config::{ConfigError, PipelineConfig};
use crate::data_loader::{load_inputs, LoadReport, LoadedInputs};
use crate::export::write_artifacts;
use crate::index::IndexSummary;
use crate::portfolio_report::{Benchmark, PortfolioReport};
use crate::research::ResearchReport;
use crate::series::{group_records, TickerSeries};

#[derive(Debug, Error)]
pub enum RunError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
}

/// Current schema version for persisted artifacts.
pub const SCHEMA_VERSION: u32 = 1;

/// Everything one run produces.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineReport {
    pub config_hash: String,
    pub dataset_hash: String,
    /// Last trading date in the price data.
    pub as_of: Option<NaiveDate>,
    pub load: LoadReport,
    pub aggregation: AggregationDiagnostics,
    pub index: IndexSummary,
    pub portfolios: Vec<PortfolioReport>,
    pub research: ResearchReport,
}

/// Load inputs from `config.paths` and compute every output.
pub fn run_pipeline(config: &PipelineConfig) -> Result<PipelineReport, RunError> {
    config.validate()?;
    let inputs = load_inputs(&config.paths, config.benchmark.ticker.as_deref());
    compute(config, &inputs)
}

/// Run the pipeline and write artifacts under `config.paths.output_dir`.
pub fn run_and_export(config: &PipelineConfig) -> anyhow::Result<Vec<PathBuf>> {
    let report = run_pipeline(config).context("pipeline run failed")?;
    write_artifacts(&report, &config.paths.output_dir)
}

/// Compute every output from pre-loaded inputs.
pub fn compute(config: &PipelineConfig, inputs: &LoadedInputs) -> Result<PipelineReport, RunError> {
    let config_hash = config.config_hash()?;

    let aggregation = aggregate_daily(&inputs.events, &config.calendar, config.signal.ema_span);
    info!(
        events = aggregation.diagnostics.events_seen,
        used = aggregation.diagnostics.events_used,
        missing_timestamp = aggregation.diagnostics.missing_timestamp,
        invalid = aggregation.diagnostics.invalid_scores,
        "events aggregated"
    );

    let series = build_all_series(config, inputs, &aggregation);
    let as_of = series
        .iter()
        .filter_map(|s| s.prices.iter().map(|b| b.date).max())
        .max();

    let prices: BTreeMap<String, Vec<PriceBar>> = series
        .iter()
        .filter(|s| !s.prices.is_empty())
        .map(|s| (s.ticker.clone(), s.prices.clone()))
        .collect();
    let raw: BTreeMap<String, Vec<(NaiveDate, f64)>> = series
        .iter()
        .filter(|s| s.has_signal())
        .map(|s| (s.ticker.clone(), s.raw_points()))
        .collect();

    let forward = ReturnPanel::build(&prices, ReturnConvention::Forward);
    let trailing = ReturnPanel::build(&prices, ReturnConvention::Trailing);
    let aligned_forward = AlignedSignals::build(&raw, &forward.dates);
    let aligned_trailing = AlignedSignals::build(&raw, &trailing.dates);

    let benchmark_panels = config.benchmark.ticker.as_deref().map(|ticker| {
        let bars: BTreeMap<String, Vec<PriceBar>> = inputs
            .prices
            .get(ticker)
            .map(|b| (ticker.to_string(), b.clone()))
            .into_iter()
            .collect();
        if bars.is_empty() {
            warn!(%ticker, "benchmark ticker has no prices");
        }
        (
            ticker,
            ReturnPanel::build(&bars, ReturnConvention::Forward),
            ReturnPanel::build(&bars, ReturnConvention::Trailing),
        )
    });

    let portfolios: Vec<PortfolioReport> = config
        .portfolios
        .iter()
        .map(|p| {
            let convention = p.strategy.return_convention();
            let (signals, universe_panel) = match convention {
                ReturnConvention::Forward => (&aligned_forward, &forward),
                ReturnConvention::Trailing => (&aligned_trailing, &trailing),
            };
            let benchmark = match &benchmark_panels {
                Some((ticker, fwd, trl)) => Benchmark::Ticker {
                    ticker,
                    panel: match convention {
                        ReturnConvention::Forward => fwd,
                        ReturnConvention::Trailing => trl,
                    },
                },
                None => Benchmark::EqualWeight(universe_panel),
            };
            let run = simulate(&p.strategy, signals, universe_panel);
            info!(
                portfolio = %p.name,
                days = run.diagnostics.days_traded,
                skipped_breadth = run.diagnostics.days_skipped_breadth,
                without_holdings = run.diagnostics.days_without_holdings,
                final_equity = run.final_equity(),
                "portfolio simulated"
            );
            PortfolioReport::build(
                &p.name,
                run,
                benchmark,
                config.metrics.risk_free_annual,
                p.record_holdings,
            )
        })
        .collect();

    let index = IndexSummary::build(&series, inputs.universe.ticker_count(), as_of);
    let research = ResearchReport::build(&series, &forward, &aligned_forward, &config.research);
    info!(
        tickers_with_signal = index.tickers_with_signal,
        study_days = research.series.len(),
        "pipeline complete"
    );

    Ok(PipelineReport {
        config_hash,
        dataset_hash: inputs.dataset_hash.clone(),
        as_of,
        load: inputs.report.clone(),
        aggregation: aggregation.diagnostics.clone(),
        index,
        portfolios,
        research,
    })
}

/// One owned [`TickerSeries`] per ticker, built independently and concatenated.
///
/// Tickers are the universe's; when the universe was derived from price files,
/// tickers that only have signal records are added too.
fn build_all_series(
    config: &PipelineConfig,
    inputs: &LoadedInputs,
    aggregation: &sentilab_core::aggregate::DailyAggregation,
) -> Vec<TickerSeries> {
    let mut grouped = group_records(&inputs.records, aggregation);

    let mut tickers: Vec<String> = inputs
        .universe
        .all_tickers()
        .into_iter()
        .map(str::to_string)
        .collect();
    let benchmark = config.benchmark.ticker.as_deref();
    if inputs.report.universe_derived {
        tickers.extend(
            grouped
                .keys()
                .filter(|t| !inputs.universe.contains(t) && Some(t.as_str()) != benchmark)
                .cloned(),
        );
        tickers.sort();
    } else {
        let outside = grouped
            .keys()
            .filter(|t| !inputs.universe.contains(t))
            .count();
        if outside > 0 {
            debug!(tickers = outside, "signal records outside the universe ignored");
        }
    }

    tickers
        .into_iter()
        .map(|ticker| {
            let records = grouped.remove(&ticker).unwrap_or_default();
            let prices = inputs.prices.get(&ticker).cloned().unwrap_or_default();
            let series = TickerSeries::build(
                &ticker,
                &records,
                prices,
                &inputs.universe,
                &config.signal,
            );
            debug!(
                %ticker,
                points = series.points.len(),
                skipped = series.records_skipped,
                field = ?series.field,
                "ticker processed"
            );
            series
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use sentilab_core::data::Universe;
    use sentilab_core::portfolio::StrategySpec;
    use sentilab_core::signal::SignalRecord;

    use crate::config::PortfolioConfig;

    fn date(offset: i64) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap() + chrono::Duration::days(offset)
    }

    fn bars(closes: &[f64]) -> Vec<PriceBar> {
        closes
            .iter()
            .enumerate()
            .map(|(i, &close)| PriceBar {
                date: date(i as i64 + 1),
                open: None,
                close,
            })
            .collect()
    }

    fn record(ticker: &str, offset: i64, score: f64) -> SignalRecord {
        SignalRecord {
            ticker: ticker.into(),
            date: date(offset),
            predicted_return: None,
            score: Some(score),
            news_count: Some(1),
        }
    }

    fn inputs() -> LoadedInputs {
        let mut prices = BTreeMap::new();
        prices.insert("AAA".to_string(), bars(&[10.0, 11.0, 12.1, 12.1]));
        prices.insert("BBB".to_string(), bars(&[20.0, 19.0, 19.0, 20.9]));
        LoadedInputs {
            universe: Universe::from_tickers(["AAA", "BBB"]),
            prices,
            records: vec![
                record("AAA", 1, 0.9),
                record("BBB", 1, 0.1),
                record("ZZZ", 1, 0.5),
            ],
            events: Vec::new(),
            report: LoadReport::default(),
            dataset_hash: "test".into(),
        }
    }

    fn config() -> PipelineConfig {
        PipelineConfig {
            portfolios: vec![PortfolioConfig {
                name: "top1".into(),
                strategy: StrategySpec::TopN {
                    top_n: 1,
                    min_names: 1,
                },
                record_holdings: true,
            }],
            ..PipelineConfig::default()
        }
    }

    #[test]
    fn top1_follows_highest_signal() {
        let report = compute(&config(), &inputs()).unwrap();
        let top1 = &report.portfolios[0];
        // AAA's signal is carried forward; its forward returns are +10%, +10%, 0%.
        let rets: Vec<f64> = top1.daily_returns.iter().map(|r| r.ret).collect();
        assert_eq!(rets.len(), 3);
        assert!((rets[0] - 0.1).abs() < 1e-12);
        assert!((rets[1] - 0.1).abs() < 1e-12);
        assert!(rets[2].abs() < 1e-12);
        assert!((top1.equity_curve[2].equity - 1.21).abs() < 1e-12);
        assert_eq!(top1.holdings.as_ref().map(Vec::len), Some(3));
    }

    #[test]
    fn records_outside_configured_universe_are_ignored() {
        let report = compute(&config(), &inputs()).unwrap();
        assert_eq!(report.index.universe_size, 2);
        assert_eq!(report.index.tickers_with_signal, 2);
        assert!(report.index.tickers.iter().all(|t| t.ticker != "ZZZ"));
        assert_eq!(report.as_of, Some(date(4)));
    }

    #[test]
    fn derived_universe_keeps_signal_only_tickers() {
        let mut inputs = inputs();
        inputs.report.universe_derived = true;
        let report = compute(&config(), &inputs).unwrap();
        assert_eq!(report.index.tickers_with_signal, 3);
    }

    #[test]
    fn weekly_never_ranks_signal_only_names() {
        let mut inputs = inputs();
        inputs.report.universe_derived = true;
        let closes: Vec<f64> = (0..10).map(|i| 10.0 * 1.01f64.powi(i)).collect();
        inputs.prices.insert("AAA".to_string(), bars(&closes));
        inputs.prices.insert("BBB".to_string(), bars(&[20.0; 10]));
        inputs.records = vec![
            record("AAA", 3, 0.2),
            record("BBB", 3, 0.1),
            record("ZZZ", 3, 0.9),
        ];
        let config = PipelineConfig {
            portfolios: vec![PortfolioConfig {
                name: "weekly".into(),
                strategy: StrategySpec::WeeklyLongShort {
                    k: 1,
                    gross: 1.0,
                    long_short: false,
                },
                record_holdings: true,
            }],
            ..PipelineConfig::default()
        };

        let report = compute(&config, &inputs).unwrap();
        let weekly = &report.portfolios[0];
        let rebalances = weekly.holdings.as_ref().unwrap();
        assert_eq!(rebalances.len(), 1);
        assert_eq!(rebalances[0].holdings[0].ticker, "AAA");
        assert_eq!(weekly.daily_returns.len(), 4);
        for r in &weekly.daily_returns {
            assert!((r.ret - 0.01).abs() < 1e-12);
        }
    }

    #[test]
    fn compute_is_deterministic() {
        let a = compute(&config(), &inputs()).unwrap();
        let b = compute(&config(), &inputs()).unwrap();
        assert_eq!(a, b);
    }
}

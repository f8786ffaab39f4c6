//! Portfolio report: one simulated strategy with metrics and a benchmark.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sentilab_core::portfolio::{PortfolioRun, Rebalance, SimulationDiagnostics, StrategySpec};
use sentilab_core::returns::ReturnPanel;
use sentilab_core::Outcome;

use crate::metrics::{correlation, PerformanceMetrics};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EquityPoint {
    pub date: NaiveDate,
    pub equity: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyReturn {
    pub date: NaiveDate,
    pub ret: f64,
    pub names: usize,
}

/// What the portfolio was compared against.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BenchmarkSource {
    Ticker { ticker: String },
    EqualWeightUniverse,
}

/// Return source for the benchmark, on the strategy's own return convention.
#[derive(Debug, Clone, Copy)]
pub enum Benchmark<'a> {
    /// A single ticker's returns, from a panel that holds it.
    Ticker {
        ticker: &'a str,
        panel: &'a ReturnPanel,
    },
    /// Cross-sectional mean of the universe panel.
    EqualWeight(&'a ReturnPanel),
}

impl Benchmark<'_> {
    fn source(&self) -> BenchmarkSource {
        match self {
            Self::Ticker { ticker, .. } => BenchmarkSource::Ticker {
                ticker: ticker.to_string(),
            },
            Self::EqualWeight(_) => BenchmarkSource::EqualWeightUniverse,
        }
    }

    fn return_on(&self, date: NaiveDate) -> Option<f64> {
        match self {
            Self::Ticker { ticker, panel } => panel.get(ticker, date),
            Self::EqualWeight(panel) => panel.cross_section_mean(date),
        }
    }
}

/// Benchmark measured over the portfolio's own dates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkComparison {
    pub source: BenchmarkSource,
    /// Portfolio dates on which the benchmark had a return.
    pub observations: usize,
    pub metrics: Outcome<PerformanceMetrics>,
    /// Portfolio minus benchmark annualized return, both over their own dates.
    pub excess_annualized_return: Option<f64>,
    /// Daily-return correlation over the paired dates.
    pub correlation: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioReport {
    pub name: String,
    pub label: String,
    pub strategy: StrategySpec,
    pub equity_curve: Vec<EquityPoint>,
    pub daily_returns: Vec<DailyReturn>,
    pub metrics: Outcome<PerformanceMetrics>,
    pub benchmark: BenchmarkComparison,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub holdings: Option<Vec<Rebalance>>,
    pub diagnostics: SimulationDiagnostics,
}

impl PortfolioReport {
    pub fn build(
        name: &str,
        run: PortfolioRun,
        benchmark: Benchmark<'_>,
        risk_free_annual: f64,
        record_holdings: bool,
    ) -> Self {
        let returns = run.returns();
        let metrics = PerformanceMetrics::compute(&returns, risk_free_annual);
        let comparison = compare(&run, &metrics, benchmark, risk_free_annual);

        Self {
            name: name.to_string(),
            label: run.strategy.label(),
            equity_curve: run
                .points
                .iter()
                .map(|p| EquityPoint {
                    date: p.date,
                    equity: p.equity,
                })
                .collect(),
            daily_returns: run
                .points
                .iter()
                .map(|p| DailyReturn {
                    date: p.date,
                    ret: p.ret,
                    names: p.names,
                })
                .collect(),
            metrics,
            benchmark: comparison,
            holdings: record_holdings.then_some(run.rebalances),
            diagnostics: run.diagnostics,
            strategy: run.strategy,
        }
    }
}

fn compare(
    run: &PortfolioRun,
    metrics: &Outcome<PerformanceMetrics>,
    benchmark: Benchmark<'_>,
    risk_free_annual: f64,
) -> BenchmarkComparison {
    let (portfolio, bench): (Vec<f64>, Vec<f64>) = run
        .points
        .iter()
        .filter_map(|p| Some((p.ret, benchmark.return_on(p.date)?)))
        .unzip();
    let bench_metrics = PerformanceMetrics::compute(&bench, risk_free_annual);
    let excess_annualized_return = match (metrics.computed(), bench_metrics.computed()) {
        (Some(p), Some(b)) => Some(p.annualized_return - b.annualized_return),
        _ => None,
    };

    BenchmarkComparison {
        source: benchmark.source(),
        observations: bench.len(),
        correlation: correlation(&portfolio, &bench),
        metrics: bench_metrics,
        excess_annualized_return,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sentilab_core::portfolio::DailyPoint;
    use std::collections::BTreeMap;

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, day).unwrap()
    }

    fn run(rets: &[(u32, f64)]) -> PortfolioRun {
        let mut equity = 1.0;
        let points = rets
            .iter()
            .map(|&(d, ret)| {
                equity *= 1.0 + ret;
                DailyPoint {
                    date: date(d),
                    ret,
                    equity,
                    names: 1,
                }
            })
            .collect();
        PortfolioRun {
            strategy: StrategySpec::TopN {
                top_n: 1,
                min_names: 1,
            },
            points,
            rebalances: Vec::new(),
            diagnostics: SimulationDiagnostics::default(),
        }
    }

    fn panel(ticker: &str, rets: &[(u32, f64)]) -> ReturnPanel {
        let mut series = BTreeMap::new();
        series.insert(
            ticker.to_string(),
            rets.iter().map(|&(d, r)| (date(d), r)).collect::<Vec<_>>(),
        );
        ReturnPanel::from_series(series)
    }

    #[test]
    fn benchmark_paired_on_portfolio_dates() {
        let spy = panel("SPY", &[(2, 0.01), (3, -0.01), (5, 0.02)]);
        let report = PortfolioReport::build(
            "p",
            run(&[(2, 0.02), (3, -0.02), (4, 0.01)]),
            Benchmark::Ticker {
                ticker: "SPY",
                panel: &spy,
            },
            0.0,
            false,
        );
        assert_eq!(report.benchmark.observations, 2);
        assert_eq!(
            report.benchmark.source,
            BenchmarkSource::Ticker {
                ticker: "SPY".into()
            }
        );
        assert!((report.benchmark.correlation.unwrap() - 1.0).abs() < 1e-12);
        assert!(report.benchmark.excess_annualized_return.is_some());
        assert!(report.holdings.is_none());
        assert_eq!(report.equity_curve.len(), 3);
        assert_eq!(report.label, "top1_min1");
    }

    #[test]
    fn empty_run_reports_insufficient_data() {
        let universe = panel("AAPL", &[(2, 0.01)]);
        let report = PortfolioReport::build("p", run(&[]), Benchmark::EqualWeight(&universe), 0.0, true);
        assert!(matches!(report.metrics, Outcome::InsufficientData { .. }));
        assert!(matches!(report.benchmark.metrics, Outcome::InsufficientData { .. }));
        assert_eq!(report.benchmark.excess_annualized_return, None);
        assert_eq!(report.holdings, Some(Vec::new()));
    }
}

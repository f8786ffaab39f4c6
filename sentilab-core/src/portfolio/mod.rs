//! Portfolio simulator: turns aligned signals and realized returns into a
//! daily return / equity series.
//!
//! Two strategies:
//! - `TopN`: daily long-only, equal-weight top-N names by same-day signal,
//!   earning the forward return.
//! - `WeeklyLongShort`: rebalance on the first trading day of each ISO week
//!   using the prior trading day's signal, hold fixed weights through the week,
//!   earning trailing (close-to-close) returns.
//!
//! Everything is recomputed from the inputs on every run; nothing persists.

pub mod top_n;
pub mod weekly;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::returns::{ReturnConvention, ReturnPanel};
use crate::signal::AlignedSignals;

/// Strategy selection and parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StrategySpec {
    TopN {
        top_n: usize,
        min_names: usize,
    },
    WeeklyLongShort {
        k: usize,
        gross: f64,
        long_short: bool,
    },
}

impl StrategySpec {
    /// Return convention the strategy trades on.
    pub fn return_convention(&self) -> ReturnConvention {
        match self {
            Self::TopN { .. } => ReturnConvention::Forward,
            Self::WeeklyLongShort { .. } => ReturnConvention::Trailing,
        }
    }

    pub fn label(&self) -> String {
        match self {
            Self::TopN { top_n, min_names } => format!("top{top_n}_min{min_names}"),
            Self::WeeklyLongShort {
                k, long_short, ..
            } => {
                if *long_short {
                    format!("weekly_ls_k{k}")
                } else {
                    format!("weekly_long_k{k}")
                }
            }
        }
    }
}

/// A single position in a rebalance snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Holding {
    pub ticker: String,
    pub weight: f64,
    /// Signal the name was ranked on.
    pub signal: f64,
}

/// Holdings fixed on a rebalance date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rebalance {
    pub date: NaiveDate,
    pub holdings: Vec<Holding>,
}

impl Rebalance {
    pub fn gross_exposure(&self) -> f64 {
        self.holdings.iter().map(|h| h.weight.abs()).sum()
    }

    pub fn net_exposure(&self) -> f64 {
        self.holdings.iter().map(|h| h.weight).sum()
    }
}

/// One simulated day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyPoint {
    pub date: NaiveDate,
    pub ret: f64,
    pub equity: f64,
    /// Names held that day.
    pub names: usize,
}

/// Why days did or did not make it into the equity curve.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimulationDiagnostics {
    pub trading_days: usize,
    pub days_traded: usize,
    /// Top-N: cross-section smaller than `min_names`.
    pub days_skipped_breadth: usize,
    /// Weekly: no holdings yet, or the last rebalance found no ranked names.
    pub days_without_holdings: usize,
    pub rebalances: usize,
}

/// Full simulation output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioRun {
    pub strategy: StrategySpec,
    pub points: Vec<DailyPoint>,
    pub rebalances: Vec<Rebalance>,
    pub diagnostics: SimulationDiagnostics,
}

impl PortfolioRun {
    pub fn returns(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.ret).collect()
    }

    pub fn equity(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.equity).collect()
    }

    pub fn dates(&self) -> Vec<NaiveDate> {
        self.points.iter().map(|p| p.date).collect()
    }

    pub fn final_equity(&self) -> f64 {
        self.points.last().map_or(1.0, |p| p.equity)
    }
}

/// Compounds daily returns into equity. Equity starts at 1.0 before the first return.
#[derive(Debug)]
pub(crate) struct EquityAccumulator {
    equity: f64,
    points: Vec<DailyPoint>,
}

impl EquityAccumulator {
    pub(crate) fn new() -> Self {
        Self {
            equity: 1.0,
            points: Vec::new(),
        }
    }

    pub(crate) fn push(&mut self, date: NaiveDate, ret: f64, names: usize) {
        self.equity *= 1.0 + ret;
        self.points.push(DailyPoint {
            date,
            ret,
            equity: self.equity,
            names,
        });
    }

    pub(crate) fn into_points(self) -> Vec<DailyPoint> {
        self.points
    }
}

/// Rank candidates by signal, descending. Stable: ties keep input order.
/// Callers only pass finite signals.
pub(crate) fn rank_descending<T>(candidates: &mut [T], signal: impl Fn(&T) -> f64) {
    candidates.sort_by(|a, b| signal(b).total_cmp(&signal(a)));
}

/// Run a strategy over aligned signals and the matching return panel.
///
/// `returns` must be built with `spec.return_convention()`; its dates are the
/// trading-day universe the simulation walks.
pub fn simulate(spec: &StrategySpec, signals: &AlignedSignals, returns: &ReturnPanel) -> PortfolioRun {
    match *spec {
        StrategySpec::TopN { top_n, min_names } => {
            top_n::run(spec.clone(), top_n, min_names, signals, returns)
        }
        StrategySpec::WeeklyLongShort {
            k,
            gross,
            long_short,
        } => weekly::run(spec.clone(), k, gross, long_short, signals, returns),
    }
}

//! Performance metrics: pure functions from a daily return series to scalars.
//!
//! Every metric takes simple daily returns (not an equity curve) and assumes
//! 252 trading days per year. No dependencies on the loader or the simulator.

use serde::{Deserialize, Serialize};
use sentilab_core::Outcome;

pub const TRADING_DAYS_PER_YEAR: f64 = 252.0;

/// Summary statistics for one return series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    pub observations: usize,
    pub cumulative_return: f64,
    pub annualized_return: f64,
    pub annualized_volatility: f64,
    pub sharpe: f64,
    /// Non-positive fraction; the starting equity of 1.0 counts as a peak.
    pub max_drawdown: f64,
    pub hit_ratio: f64,
}

impl PerformanceMetrics {
    /// Compute every metric. An empty series is reported as insufficient data.
    pub fn compute(returns: &[f64], risk_free_annual: f64) -> Outcome<Self> {
        if let Err(short) = Outcome::require(1, returns.len()) {
            return short;
        }
        Outcome::Computed(Self {
            observations: returns.len(),
            cumulative_return: cumulative_return(returns),
            annualized_return: annualized_return(returns),
            annualized_volatility: annualized_volatility(returns),
            sharpe: sharpe_ratio(returns, risk_free_annual),
            max_drawdown: max_drawdown(returns),
            hit_ratio: hit_ratio(returns),
        })
    }
}

// ─── Individual metric functions ────────────────────────────────────

/// Product of (1 + r) minus one.
pub fn cumulative_return(returns: &[f64]) -> f64 {
    returns.iter().fold(1.0, |acc, r| acc * (1.0 + r)) - 1.0
}

/// Geometric annualized return: (1 + cumulative)^(252 / T) - 1.
///
/// A series that wipes out the equity (growth <= 0) reports -1.0.
pub fn annualized_return(returns: &[f64]) -> f64 {
    if returns.is_empty() {
        return 0.0;
    }
    let growth = 1.0 + cumulative_return(returns);
    if growth <= 0.0 {
        return -1.0;
    }
    growth.powf(TRADING_DAYS_PER_YEAR / returns.len() as f64) - 1.0
}

/// Sample standard deviation scaled by sqrt(252).
pub fn annualized_volatility(returns: &[f64]) -> f64 {
    std_dev(returns) * TRADING_DAYS_PER_YEAR.sqrt()
}

/// Daily equivalent of an annual risk-free rate, compounded.
pub fn daily_risk_free(risk_free_annual: f64) -> f64 {
    (1.0 + risk_free_annual).powf(1.0 / TRADING_DAYS_PER_YEAR) - 1.0
}

/// Annualized Sharpe ratio.
///
/// (mean(r) - daily_rf) / stdev(r) * sqrt(252). Zero when T <= 1 or the
/// standard deviation is zero.
pub fn sharpe_ratio(returns: &[f64], risk_free_annual: f64) -> f64 {
    if returns.len() < 2 {
        return 0.0;
    }
    let std = std_dev(returns);
    if std < 1e-15 {
        return 0.0;
    }
    (mean_f64(returns) - daily_risk_free(risk_free_annual)) / std * TRADING_DAYS_PER_YEAR.sqrt()
}

/// Maximum drawdown of the compounded equity path, as a negative fraction.
pub fn max_drawdown(returns: &[f64]) -> f64 {
    let mut equity = 1.0_f64;
    let mut peak = 1.0_f64;
    let mut max_dd = 0.0_f64;
    for r in returns {
        equity *= 1.0 + r;
        if equity > peak {
            peak = equity;
        }
        if peak > 0.0 {
            max_dd = max_dd.min(equity / peak - 1.0);
        }
    }
    max_dd
}

/// Fraction of days with a strictly positive return.
pub fn hit_ratio(returns: &[f64]) -> f64 {
    if returns.is_empty() {
        return 0.0;
    }
    returns.iter().filter(|&&r| r > 0.0).count() as f64 / returns.len() as f64
}

/// Equity after each day, starting from 1.0.
pub fn equity_curve(returns: &[f64]) -> Vec<f64> {
    returns
        .iter()
        .scan(1.0_f64, |equity, r| {
            *equity *= 1.0 + r;
            Some(*equity)
        })
        .collect()
}

/// Pearson correlation of two paired series. `None` when fewer than two pairs
/// or either side has no variance.
pub fn correlation(a: &[f64], b: &[f64]) -> Option<f64> {
    let n = a.len().min(b.len());
    if n < 2 {
        return None;
    }
    let (a, b) = (&a[..n], &b[..n]);
    let (ma, mb) = (mean_f64(a), mean_f64(b));
    let mut cov = 0.0;
    let mut va = 0.0;
    let mut vb = 0.0;
    for (x, y) in a.iter().zip(b) {
        cov += (x - ma) * (y - mb);
        va += (x - ma).powi(2);
        vb += (y - mb).powi(2);
    }
    if va < 1e-300 || vb < 1e-300 {
        return None;
    }
    Some(cov / (va.sqrt() * vb.sqrt()))
}

// ─── Helpers ────────────────────────────────────────────────────────

pub(crate) fn mean_f64(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

pub(crate) fn std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let mean = mean_f64(values);
    let variance =
        values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    variance.sqrt()
}

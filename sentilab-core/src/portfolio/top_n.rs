//! Top-N cross-sectional strategy (long-only, daily).
//!
//! Each trading day: candidates are tickers with both a forward return and an
//! aligned signal. Fewer than `min_names` candidates → the day is skipped.
//! Otherwise the top `top_n` by signal are equal-weighted and the day's return
//! is the mean of their returns.

use crate::returns::ReturnPanel;
use crate::signal::AlignedSignals;

use super::{
    rank_descending, EquityAccumulator, Holding, PortfolioRun, Rebalance,
    SimulationDiagnostics, StrategySpec,
};

pub(crate) fn run(
    spec: StrategySpec,
    top_n: usize,
    min_names: usize,
    signals: &AlignedSignals,
    returns: &ReturnPanel,
) -> PortfolioRun {
    let mut diagnostics = SimulationDiagnostics {
        trading_days: returns.dates.len(),
        ..Default::default()
    };
    let mut acc = EquityAccumulator::new();
    let mut rebalances = Vec::new();
    let min_names = min_names.max(1);

    for &date in &returns.dates {
        // (ticker, signal, return) in panel order
        let mut candidates: Vec<(&str, f64, f64)> = returns
            .tickers()
            .filter_map(|ticker| {
                let ret = returns.get(ticker, date)?;
                let signal = signals.value(ticker, date).filter(|s| s.is_finite())?;
                Some((ticker, signal, ret))
            })
            .collect();

        if candidates.len() < min_names {
            diagnostics.days_skipped_breadth += 1;
            continue;
        }

        rank_descending(&mut candidates, |c| c.1);
        let selected = &candidates[..top_n.min(candidates.len())];
        if selected.is_empty() {
            diagnostics.days_without_holdings += 1;
            continue;
        }

        let weight = 1.0 / selected.len() as f64;
        let ret = selected.iter().map(|c| c.2).sum::<f64>() * weight;
        acc.push(date, ret, selected.len());
        diagnostics.days_traded += 1;

        rebalances.push(Rebalance {
            date,
            holdings: selected
                .iter()
                .map(|&(ticker, signal, _)| Holding {
                    ticker: ticker.to_string(),
                    weight,
                    signal,
                })
                .collect(),
        });
    }

    diagnostics.rebalances = rebalances.len();
    PortfolioRun {
        strategy: spec,
        points: acc.into_points(),
        rebalances,
        diagnostics,
    }
}

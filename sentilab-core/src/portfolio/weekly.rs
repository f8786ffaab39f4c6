//! Weekly-rebalanced long/short strategy.
//!
//! Rebalance on the first trading day of each ISO week (Mon–Sun). Names with
//! prices are ranked on the previous trading day's aligned signal, so a signal observed on
//! day t only trades from t+1. Weights stay fixed until the next rebalance; each
//! day's return is the weighted sum of that day's realized returns, with a
//! missing return contributing zero.
//!
//! A calendar week without trading days produces no rebalance: the previous
//! holdings simply run until the next week that has one.

use chrono::Datelike;

use crate::returns::ReturnPanel;
use crate::signal::AlignedSignals;

use super::{
    rank_descending, EquityAccumulator, Holding, PortfolioRun, Rebalance,
    SimulationDiagnostics, StrategySpec,
};

/// Target weights for a ranked cross-section.
///
/// Long-only: top `min(k, n)` names at `gross / k_eff` each.
/// Long/short: top and bottom `min(k, n / 2)` names at `±gross / (2 * k_eff)`,
/// so the two baskets never overlap.
pub fn target_weights(
    mut candidates: Vec<(String, f64)>,
    k: usize,
    gross: f64,
    long_short: bool,
) -> Vec<Holding> {
    rank_descending(&mut candidates, |c| c.1);
    let n = candidates.len();

    if !long_short {
        let k_eff = k.min(n);
        if k_eff == 0 {
            return Vec::new();
        }
        let w = gross / k_eff as f64;
        return candidates
            .into_iter()
            .take(k_eff)
            .map(|(ticker, signal)| Holding {
                ticker,
                weight: w,
                signal,
            })
            .collect();
    }

    let k_eff = k.min(n / 2);
    if k_eff == 0 {
        return Vec::new();
    }
    let w = gross / (2.0 * k_eff as f64);
    let mut holdings = Vec::with_capacity(2 * k_eff);
    for (i, (ticker, signal)) in candidates.into_iter().enumerate() {
        if i < k_eff {
            holdings.push(Holding {
                ticker,
                weight: w,
                signal,
            });
        } else if i >= n - k_eff {
            holdings.push(Holding {
                ticker,
                weight: -w,
                signal,
            });
        }
    }
    holdings
}

pub(crate) fn run(
    spec: StrategySpec,
    k: usize,
    gross: f64,
    long_short: bool,
    signals: &AlignedSignals,
    returns: &ReturnPanel,
) -> PortfolioRun {
    let dates = &returns.dates;
    let mut diagnostics = SimulationDiagnostics {
        trading_days: dates.len(),
        ..Default::default()
    };
    let mut acc = EquityAccumulator::new();
    let mut rebalances: Vec<Rebalance> = Vec::new();
    let mut holdings: Vec<Holding> = Vec::new();
    let mut current_week: Option<(i32, u32)> = None;

    for (i, &date) in dates.iter().enumerate() {
        let iso = date.iso_week();
        let week = (iso.year(), iso.week());

        if current_week != Some(week) {
            current_week = Some(week);
            // Lag-1: rank on the previous trading day's signal.
            holdings = match i.checked_sub(1).map(|p| dates[p]) {
                Some(signal_date) => {
                    let candidates: Vec<(String, f64)> = signals
                        .tickers()
                        .filter(|ticker| returns.contains(ticker))
                        .filter_map(|ticker| {
                            signals
                                .value(ticker, signal_date)
                                .filter(|s| s.is_finite())
                                .map(|s| (ticker.to_string(), s))
                        })
                        .collect();
                    target_weights(candidates, k, gross, long_short)
                }
                None => Vec::new(),
            };
            if !holdings.is_empty() {
                rebalances.push(Rebalance {
                    date,
                    holdings: holdings.clone(),
                });
            }
        }

        if holdings.is_empty() {
            diagnostics.days_without_holdings += 1;
            continue;
        }

        let ret: f64 = holdings
            .iter()
            .map(|h| h.weight * returns.get(&h.ticker, date).unwrap_or(0.0))
            .sum();
        acc.push(date, ret, holdings.len());
        diagnostics.days_traded += 1;
    }

    diagnostics.rebalances = rebalances.len();
    PortfolioRun {
        strategy: spec,
        points: acc.into_points(),
        rebalances,
        diagnostics,
    }
}

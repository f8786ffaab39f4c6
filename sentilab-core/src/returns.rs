//! Realized returns and the trading-day universe.
//!
//! Given price bars for many tickers, compute per-ticker daily returns and put
//! them on a common date axis. The axis is the union of dates on which at least
//! one ticker has a realized return. Missing returns stay missing: there is no
//! forward-fill of tradable data.

use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::domain::PriceBar;

/// Which price pair a date's return is attributed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReturnConvention {
    /// Return at D = close(D+1) / close(D) - 1. The last bar has none.
    Forward,
    /// Return at D = close(D) / close(D-1) - 1. The first bar has none.
    Trailing,
}

/// Sort by date and drop bars without a usable close.
fn usable_bars(bars: &[PriceBar]) -> Vec<&PriceBar> {
    let mut valid: Vec<&PriceBar> = bars.iter().filter(|b| b.is_valid()).collect();
    valid.sort_by_key(|b| b.date);
    valid.dedup_by_key(|b| b.date);
    valid
}

/// Forward returns keyed by the earlier date of each consecutive pair.
pub fn forward_returns(bars: &[PriceBar]) -> Vec<(NaiveDate, f64)> {
    usable_bars(bars)
        .windows(2)
        .map(|w| (w[0].date, w[1].close / w[0].close - 1.0))
        .collect()
}

/// Trailing returns keyed by the later date of each consecutive pair.
pub fn trailing_returns(bars: &[PriceBar]) -> Vec<(NaiveDate, f64)> {
    usable_bars(bars)
        .windows(2)
        .map(|w| (w[1].date, w[1].close / w[0].close - 1.0))
        .collect()
}

/// Per-ticker returns on the trading-day universe.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReturnPanel {
    /// Trading-day universe: sorted union of dates with any realized return.
    pub dates: Vec<NaiveDate>,
    /// Returns per ticker, keyed by date.
    pub returns: BTreeMap<String, BTreeMap<NaiveDate, f64>>,
}

impl ReturnPanel {
    /// Compute returns for every ticker with the given convention.
    pub fn build(prices: &BTreeMap<String, Vec<PriceBar>>, convention: ReturnConvention) -> Self {
        let series = prices
            .iter()
            .map(|(ticker, bars)| {
                let returns = match convention {
                    ReturnConvention::Forward => forward_returns(bars),
                    ReturnConvention::Trailing => trailing_returns(bars),
                };
                (ticker.clone(), returns)
            })
            .collect();
        Self::from_series(series)
    }

    /// Build from precomputed return series. Non-finite returns are dropped.
    pub fn from_series(series: BTreeMap<String, Vec<(NaiveDate, f64)>>) -> Self {
        let mut all_dates = BTreeSet::new();
        let mut returns = BTreeMap::new();

        for (ticker, points) in series {
            let by_date: BTreeMap<NaiveDate, f64> =
                points.into_iter().filter(|(_, r)| r.is_finite()).collect();
            if by_date.is_empty() {
                continue;
            }
            all_dates.extend(by_date.keys().copied());
            returns.insert(ticker, by_date);
        }

        Self {
            dates: all_dates.into_iter().collect(),
            returns,
        }
    }

    pub fn get(&self, ticker: &str, date: NaiveDate) -> Option<f64> {
        self.returns.get(ticker).and_then(|r| r.get(&date)).copied()
    }

    /// Whether `ticker` has any realized return in the panel.
    pub fn contains(&self, ticker: &str) -> bool {
        self.returns.contains_key(ticker)
    }

    pub fn tickers(&self) -> impl Iterator<Item = &str> {
        self.returns.keys().map(|t| t.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    /// Equal-weight mean of all available returns on `date`.
    pub fn cross_section_mean(&self, date: NaiveDate) -> Option<f64> {
        let (sum, n) = self
            .returns
            .values()
            .filter_map(|r| r.get(&date))
            .fold((0.0, 0usize), |(s, n), r| (s + r, n + 1));
        (n > 0).then(|| sum / n as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bar(date: &str, close: f64) -> PriceBar {
        PriceBar {
            date: NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap(),
            open: None,
            close,
        }
    }

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn forward_return_uses_next_bar() {
        let bars = vec![
            bar("2024-01-02", 100.0),
            bar("2024-01-03", 110.0),
            bar("2024-01-04", 99.0),
        ];
        let r = forward_returns(&bars);
        assert_eq!(r.len(), 2);
        assert_eq!(r[0].0, date("2024-01-02"));
        assert!((r[0].1 - 0.1).abs() < 1e-12);
        assert!((r[1].1 - (-0.1)).abs() < 1e-12);
    }

    #[test]
    fn trailing_return_uses_previous_bar() {
        let bars = vec![bar("2024-01-03", 110.0), bar("2024-01-02", 100.0)];
        let r = trailing_returns(&bars);
        assert_eq!(r, vec![(date("2024-01-03"), 110.0 / 100.0 - 1.0)]);
    }

    #[test]
    fn void_bars_are_skipped() {
        let bars = vec![
            bar("2024-01-02", 100.0),
            bar("2024-01-03", f64::NAN),
            bar("2024-01-04", 105.0),
        ];
        let r = forward_returns(&bars);
        assert_eq!(r.len(), 1);
        assert!((r[0].1 - 0.05).abs() < 1e-12);
    }

    #[test]
    fn single_bar_has_no_return() {
        assert!(forward_returns(&[bar("2024-01-02", 100.0)]).is_empty());
    }

    #[test]
    fn panel_dates_are_union_of_realized_returns() {
        let mut prices = BTreeMap::new();
        prices.insert(
            "SPY".to_string(),
            vec![
                bar("2024-01-02", 100.0),
                bar("2024-01-03", 101.0),
                bar("2024-01-04", 102.0),
            ],
        );
        prices.insert(
            "QQQ".to_string(),
            vec![bar("2024-01-02", 200.0), bar("2024-01-04", 202.0)],
        );

        let panel = ReturnPanel::build(&prices, ReturnConvention::Forward);
        assert_eq!(panel.dates, vec![date("2024-01-02"), date("2024-01-03")]);
        // QQQ has no bar on the 3rd: no return there, not a NaN placeholder.
        assert_eq!(panel.get("QQQ", date("2024-01-03")), None);
        assert!((panel.get("QQQ", date("2024-01-02")).unwrap() - 0.01).abs() < 1e-12);
        let mean = panel.cross_section_mean(date("2024-01-02")).unwrap();
        assert!((mean - 0.01).abs() < 1e-12);
    }

    #[test]
    fn tickers_without_returns_are_dropped() {
        let mut prices = BTreeMap::new();
        prices.insert("ONE".to_string(), vec![bar("2024-01-02", 10.0)]);
        let panel = ReturnPanel::build(&prices, ReturnConvention::Trailing);
        assert!(panel.is_empty());
        assert_eq!(panel.tickers().count(), 0);
    }
}

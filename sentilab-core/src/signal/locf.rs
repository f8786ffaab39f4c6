//! Last-observation-carried-forward alignment onto the trading-day universe.
//!
//! Trading days before a ticker's first signal get no value (the ticker sits
//! out of that day's cross-section); they are never zero-filled.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Carry a sparse signal series onto `trading_days` (ascending).
///
/// Single merge-pointer pass, O(points + days). Signal dates that fall on
/// non-trading days (weekend rollovers) are consumed by the next trading day.
pub fn locf_align(points: &[(NaiveDate, f64)], trading_days: &[NaiveDate]) -> Vec<Option<f64>> {
    let mut sorted = points.to_vec();
    sorted.sort_by_key(|p| p.0);

    let mut result = Vec::with_capacity(trading_days.len());
    let mut cursor = 0;
    let mut last_value: Option<f64> = None;

    for &day in trading_days {
        while cursor < sorted.len() && sorted[cursor].0 <= day {
            last_value = Some(sorted[cursor].1);
            cursor += 1;
        }
        result.push(last_value);
    }
    result
}

/// Dense signal grid: one `Option<f64>` per ticker per trading day.
///
/// Derived and read-only; rebuilt from raw series every run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AlignedSignals {
    /// Trading-day universe (sorted ascending).
    pub dates: Vec<NaiveDate>,
    /// Values per ticker; each inner Vec has the same length as `dates`.
    pub values: BTreeMap<String, Vec<Option<f64>>>,
}

impl AlignedSignals {
    /// Align every ticker's raw series onto the trading days.
    pub fn build(series: &BTreeMap<String, Vec<(NaiveDate, f64)>>, trading_days: &[NaiveDate]) -> Self {
        let values = series
            .iter()
            .map(|(ticker, points)| (ticker.clone(), locf_align(points, trading_days)))
            .collect();
        Self {
            dates: trading_days.to_vec(),
            values,
        }
    }

    /// Index of `date` in the trading-day axis.
    pub fn position(&self, date: NaiveDate) -> Option<usize> {
        self.dates.binary_search(&date).ok()
    }

    /// Aligned value for a ticker on a trading day.
    pub fn value(&self, ticker: &str, date: NaiveDate) -> Option<f64> {
        let idx = self.position(date)?;
        self.values.get(ticker).and_then(|v| v[idx])
    }

    pub fn tickers(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(|t| t.as_str())
    }

    /// Most recent aligned value per ticker.
    pub fn last_values(&self) -> BTreeMap<&str, f64> {
        self.values
            .iter()
            .filter_map(|(ticker, v)| v.iter().rev().find_map(|x| *x).map(|x| (ticker.as_str(), x)))
            .collect()
    }
}

//! Per-ticker processing.
//!
//! Each ticker is turned into an owned [`TickerSeries`] from its own records
//! and prices only. The pipeline concatenates the results; no state is shared
//! between tickers.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sentilab_core::aggregate::DailyAggregation;
use sentilab_core::data::Universe;
use sentilab_core::domain::{DailySignalPoint, PriceBar};
use sentilab_core::signal::{resolve_series, SignalField, SignalRecord};
use sentilab_core::smoothing::{deltas, ema_recursive};

use crate::config::SignalConfig;

/// One ticker's signal history and prices.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickerSeries {
    pub ticker: String,
    pub sector: Option<String>,
    pub market_cap: Option<f64>,
    /// Field the signal was built from.
    pub field: Option<SignalField>,
    /// Date-sorted daily signal with smoothing and deltas.
    pub points: Vec<DailySignalPoint>,
    /// Records dropped for lacking the chosen field.
    pub records_skipped: usize,
    pub prices: Vec<PriceBar>,
}

impl TickerSeries {
    /// Build one ticker's series from its records and bars.
    pub fn build(
        ticker: &str,
        records: &[SignalRecord],
        prices: Vec<PriceBar>,
        universe: &Universe,
        config: &SignalConfig,
    ) -> Self {
        let resolved = resolve_series(records, &config.field_preference);

        // Later records win on a repeated date, matching the resolved series.
        let mut news: BTreeMap<NaiveDate, usize> = BTreeMap::new();
        for r in records {
            if let Some(field) = resolved.field {
                if r.field(field).is_some() {
                    news.insert(r.date, r.news_count.unwrap_or(0) as usize);
                }
            }
        }

        let values: Vec<f64> = resolved.points.iter().map(|p| p.1).collect();
        let smoothed = ema_recursive(&values, config.ema_span);
        let changes = deltas(&values);
        let points = resolved
            .points
            .iter()
            .zip(smoothed)
            .zip(changes)
            .map(|((&(date, score), smoothed), delta)| DailySignalPoint {
                ticker: ticker.to_string(),
                date,
                score,
                news_count: news.get(&date).copied().unwrap_or(0),
                smoothed,
                delta,
            })
            .collect();

        Self {
            ticker: ticker.to_string(),
            sector: universe.sector(ticker).map(str::to_string),
            market_cap: universe.market_cap(ticker),
            field: resolved.field,
            points,
            records_skipped: resolved.skipped,
            prices,
        }
    }

    /// Raw `(date, value)` pairs for alignment.
    pub fn raw_points(&self) -> Vec<(NaiveDate, f64)> {
        self.points.iter().map(|p| (p.date, p.score)).collect()
    }

    pub fn last_point(&self) -> Option<&DailySignalPoint> {
        self.points.last()
    }

    pub fn has_signal(&self) -> bool {
        !self.points.is_empty()
    }

    pub fn total_news(&self) -> usize {
        self.points.iter().map(|p| p.news_count).sum()
    }
}

/// Group signal records by ticker.
///
/// Event-derived daily points come first and file records after, so a file
/// record replaces the event aggregate for the same (ticker, date).
pub fn group_records(
    file_records: &[SignalRecord],
    aggregation: &DailyAggregation,
) -> BTreeMap<String, Vec<SignalRecord>> {
    let mut grouped: BTreeMap<String, Vec<SignalRecord>> = BTreeMap::new();
    for point in &aggregation.points {
        grouped
            .entry(point.ticker.clone())
            .or_default()
            .push(SignalRecord::from(point));
    }
    for record in file_records {
        grouped
            .entry(record.ticker.clone())
            .or_default()
            .push(record.clone());
    }
    grouped
}

//! Daily aggregation: collapse same-day events into one signal point per ticker.
//!
//! S(ticker, date) = sum of clip(confidence) * (positive - negative) over the
//! events whose effective date is `date`. Grouping is keyed strictly by
//! (ticker, effective date).

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::calendar::TradingCalendar;
use crate::domain::{DailySignalPoint, SentimentEvent};
use crate::smoothing::{deltas, ema_recursive};

pub const DEFAULT_EMA_SPAN: usize = 3;

/// Counters explaining which events did not contribute.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregationDiagnostics {
    pub events_seen: usize,
    pub events_used: usize,
    pub missing_timestamp: usize,
    pub invalid_scores: usize,
}

/// Output of [`aggregate_daily`]: points sorted by ticker, then date.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DailyAggregation {
    pub points: Vec<DailySignalPoint>,
    pub diagnostics: AggregationDiagnostics,
}

impl DailyAggregation {
    /// Points for one ticker, in date order.
    pub fn for_ticker<'a>(&'a self, ticker: &'a str) -> impl Iterator<Item = &'a DailySignalPoint> {
        self.points.iter().filter(move |p| p.ticker == ticker)
    }
}

#[derive(Default)]
struct Bucket {
    score: f64,
    count: usize,
}

/// Aggregate events into daily signal points, then smooth each ticker's series.
pub fn aggregate_daily(
    events: &[SentimentEvent],
    calendar: &TradingCalendar,
    ema_span: usize,
) -> DailyAggregation {
    let mut diagnostics = AggregationDiagnostics {
        events_seen: events.len(),
        ..Default::default()
    };
    let mut buckets: BTreeMap<(&str, NaiveDate), Bucket> = BTreeMap::new();

    for event in events {
        let Some(ts) = event.published_at else {
            diagnostics.missing_timestamp += 1;
            continue;
        };
        if !event.scores.is_finite() || !event.confidence.is_finite() {
            diagnostics.invalid_scores += 1;
            continue;
        }
        let date = calendar.effective_date(&ts);
        let bucket = buckets.entry((event.ticker.as_str(), date)).or_default();
        bucket.score += event.weighted_signal();
        bucket.count += 1;
        diagnostics.events_used += 1;
    }

    // BTreeMap order is (ticker, date): each ticker's rows are contiguous and sorted.
    let mut points = Vec::with_capacity(buckets.len());
    let mut rows: Vec<(NaiveDate, f64, usize)> = Vec::new();
    let mut current: Option<&str> = None;
    for ((ticker, date), bucket) in buckets {
        if current != Some(ticker) {
            if let Some(prev) = current {
                points.extend(finish_ticker(prev, &rows, ema_span));
            }
            rows.clear();
            current = Some(ticker);
        }
        rows.push((date, bucket.score, bucket.count));
    }
    if let Some(prev) = current {
        points.extend(finish_ticker(prev, &rows, ema_span));
    }

    DailyAggregation {
        points,
        diagnostics,
    }
}

/// Attach smoothing and deltas to one ticker's date-ordered rows.
fn finish_ticker(
    ticker: &str,
    rows: &[(NaiveDate, f64, usize)],
    ema_span: usize,
) -> Vec<DailySignalPoint> {
    let scores: Vec<f64> = rows.iter().map(|r| r.1).collect();
    let smoothed = ema_recursive(&scores, ema_span);
    let delta = deltas(&scores);

    rows.iter()
        .zip(smoothed)
        .zip(delta)
        .map(|((&(date, score, news_count), smoothed), delta)| DailySignalPoint {
            ticker: ticker.to_string(),
            date,
            score,
            news_count,
            smoothed,
            delta,
        })
        .collect()
}

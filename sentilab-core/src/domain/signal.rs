//! DailySignalPoint: one aggregated sentiment observation per (ticker, date).

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Aggregated sentiment for a ticker on one effective date.
///
/// Points only exist for dates with at least one event; a missing point means
/// "no information", never zero sentiment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailySignalPoint {
    pub ticker: String,
    pub date: NaiveDate,
    /// Sum of confidence-weighted signed sentiment over the day's events.
    pub score: f64,
    pub news_count: usize,
    /// Recursive EMA of `score` over this ticker's points.
    pub smoothed: f64,
    /// `score` minus the previous point's score; `None` for the first point.
    pub delta: Option<f64>,
}

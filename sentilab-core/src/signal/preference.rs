//! Canonical signal records and field preference.
//!
//! Upstream files name the signal differently (`pred_ret`, `score_mean`,
//! `sentiment`, ...). Ingestion maps them onto [`SignalRecord`] once; from then on
//! a ticker's series is built from exactly one field, chosen by an ordered
//! preference list. Fields are never blended.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::domain::DailySignalPoint;

/// Signal fields a record may carry, in the vocabulary of the canonical record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalField {
    PredictedReturn,
    Score,
}

/// Predicted-return-like fields first, raw sentiment score as fallback.
pub const DEFAULT_FIELD_PREFERENCE: [SignalField; 2] =
    [SignalField::PredictedReturn, SignalField::Score];

/// Canonical per-(ticker, date) signal record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalRecord {
    pub ticker: String,
    pub date: NaiveDate,
    #[serde(default)]
    pub predicted_return: Option<f64>,
    #[serde(default)]
    pub score: Option<f64>,
    #[serde(default)]
    pub news_count: Option<u32>,
}

impl SignalRecord {
    /// Finite value of `field`, if present.
    pub fn field(&self, field: SignalField) -> Option<f64> {
        let value = match field {
            SignalField::PredictedReturn => self.predicted_return,
            SignalField::Score => self.score,
        };
        value.filter(|v| v.is_finite())
    }
}

impl From<&DailySignalPoint> for SignalRecord {
    fn from(point: &DailySignalPoint) -> Self {
        Self {
            ticker: point.ticker.clone(),
            date: point.date,
            predicted_return: None,
            score: Some(point.score),
            news_count: u32::try_from(point.news_count).ok(),
        }
    }
}

/// One ticker's raw signal series after field resolution.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResolvedSeries {
    /// Field the series was built from; `None` if no record carried any preferred field.
    pub field: Option<SignalField>,
    /// Date-sorted, one value per date (a later duplicate replaces an earlier one).
    pub points: Vec<(NaiveDate, f64)>,
    /// Records dropped because they lacked the chosen field.
    pub skipped: usize,
}

/// First field in `preference` that any record provides.
pub fn resolve_field(records: &[SignalRecord], preference: &[SignalField]) -> Option<SignalField> {
    preference
        .iter()
        .copied()
        .find(|&field| records.iter().any(|r| r.field(field).is_some()))
}

/// Build one ticker's raw signal series from its records.
pub fn resolve_series(records: &[SignalRecord], preference: &[SignalField]) -> ResolvedSeries {
    let Some(field) = resolve_field(records, preference) else {
        return ResolvedSeries {
            field: None,
            points: Vec::new(),
            skipped: records.len(),
        };
    };

    let mut points: Vec<(NaiveDate, f64)> = Vec::with_capacity(records.len());
    let mut skipped = 0;
    for record in records {
        match record.field(field) {
            Some(value) => points.push((record.date, value)),
            None => skipped += 1,
        }
    }

    // Stable sort keeps input order among equal dates; keep the last of each run.
    points.sort_by_key(|p| p.0);
    let mut deduped: Vec<(NaiveDate, f64)> = Vec::with_capacity(points.len());
    for point in points {
        match deduped.last_mut() {
            Some(last) if last.0 == point.0 => *last = point,
            _ => deduped.push(point),
        }
    }

    ResolvedSeries {
        field: Some(field),
        points: deduped,
        skipped,
    }
}

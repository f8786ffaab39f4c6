//! SentimentEvent: one scored news item for one ticker.

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

/// Classifier output for a single news item.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SentimentScores {
    pub positive: f64,
    pub negative: f64,
    pub neutral: f64,
}

impl SentimentScores {
    /// Signed sentiment: positive minus negative. Neutral mass does not move the score.
    pub fn signed(&self) -> f64 {
        self.positive - self.negative
    }

    pub fn is_finite(&self) -> bool {
        self.positive.is_finite() && self.negative.is_finite() && self.neutral.is_finite()
    }
}

/// A discrete news/sentiment observation.
///
/// `published_at` is `None` when the upstream timestamp could not be parsed.
/// Such events are kept so they can be counted, but never aggregated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SentimentEvent {
    pub ticker: String,
    pub published_at: Option<DateTime<FixedOffset>>,
    pub scores: SentimentScores,
    pub confidence: f64,
}

impl SentimentEvent {
    /// Aggregation weight: confidence clipped to [0, 1].
    pub fn weight(&self) -> f64 {
        self.confidence.clamp(0.0, 1.0)
    }

    /// Confidence-weighted signed sentiment contributed by this event.
    pub fn weighted_signal(&self) -> f64 {
        self.scores.signed() * self.weight()
    }
}

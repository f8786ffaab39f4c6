//! PriceBar: daily closing price for one ticker.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Daily price record as delivered by the price collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceBar {
    pub date: NaiveDate,
    #[serde(default)]
    pub open: Option<f64>,
    pub close: f64,
}

impl PriceBar {
    /// A bar is usable only with a finite, strictly positive close.
    pub fn is_valid(&self) -> bool {
        self.close.is_finite() && self.close > 0.0
    }
}

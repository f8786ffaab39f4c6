//! Universe configuration: tickers with optional sector and market cap.
//!
//! Stored as TOML, one table per ticker:
//!
//! ```toml
//! [tickers.AAPL]
//! sector = "Technology"
//! market_cap = 3.4e12
//! ```

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum UniverseError {
    #[error("read universe file {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("parse universe TOML: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("serialize universe: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// Metadata for one ticker.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Member {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sector: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub market_cap: Option<f64>,
}

/// The ticker universe.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Universe {
    #[serde(default)]
    pub tickers: BTreeMap<String, Member>,
}

impl Universe {
    /// Load a universe from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, UniverseError> {
        let content = std::fs::read_to_string(path).map_err(|source| UniverseError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml(&content)
    }

    /// Parse a universe from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self, UniverseError> {
        Ok(toml::from_str(content)?)
    }

    /// Universe of bare symbols without metadata.
    pub fn from_tickers<I, S>(tickers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            tickers: tickers
                .into_iter()
                .map(|t| (t.into(), Member::default()))
                .collect(),
        }
    }

    /// All tickers, sorted.
    pub fn all_tickers(&self) -> Vec<&str> {
        self.tickers.keys().map(|t| t.as_str()).collect()
    }

    pub fn contains(&self, ticker: &str) -> bool {
        self.tickers.contains_key(ticker)
    }

    /// Tickers in a sector.
    pub fn sector_tickers(&self, sector: &str) -> Vec<&str> {
        self.tickers
            .iter()
            .filter(|(_, m)| m.sector.as_deref() == Some(sector))
            .map(|(t, _)| t.as_str())
            .collect()
    }

    /// Distinct sector names, sorted.
    pub fn sector_names(&self) -> Vec<&str> {
        self.tickers
            .values()
            .filter_map(|m| m.sector.as_deref())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    pub fn sector(&self, ticker: &str) -> Option<&str> {
        self.tickers.get(ticker).and_then(|m| m.sector.as_deref())
    }

    /// Market cap, if known and strictly positive.
    pub fn market_cap(&self, ticker: &str) -> Option<f64> {
        self.tickers
            .get(ticker)
            .and_then(|m| m.market_cap)
            .filter(|c| c.is_finite() && *c > 0.0)
    }

    /// Total number of tickers.
    pub fn ticker_count(&self) -> usize {
        self.tickers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tickers.is_empty()
    }

    /// Serialize the universe to TOML.
    pub fn to_toml(&self) -> Result<String, UniverseError> {
        Ok(toml::to_string_pretty(self)?)
    }
}

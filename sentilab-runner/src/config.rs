//! Serializable pipeline configuration.
//!
//! A single TOML file drives a run. Every section has defaults, so an empty
//! file is a valid configuration. The blake3 hash of the canonical JSON form
//! identifies the configuration in exported artifacts.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sentilab_core::aggregate::DEFAULT_EMA_SPAN;
use sentilab_core::calendar::TradingCalendar;
use sentilab_core::portfolio::StrategySpec;
use sentilab_core::signal::{SignalField, DEFAULT_FIELD_PREFERENCE};
use thiserror::Error;

use crate::stats::DEFAULT_QUANTILES;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Full configuration for one pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub calendar: TradingCalendar,
    pub signal: SignalConfig,
    pub portfolios: Vec<PortfolioConfig>,
    pub metrics: MetricsConfig,
    pub research: ResearchConfig,
    pub benchmark: BenchmarkConfig,
    pub paths: PathsConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            calendar: TradingCalendar::default(),
            signal: SignalConfig::default(),
            portfolios: vec![
                PortfolioConfig {
                    name: "top5".into(),
                    strategy: StrategySpec::TopN {
                        top_n: 5,
                        min_names: 3,
                    },
                    record_holdings: false,
                },
                PortfolioConfig {
                    name: "weekly_ls".into(),
                    strategy: StrategySpec::WeeklyLongShort {
                        k: 5,
                        gross: 1.0,
                        long_short: true,
                    },
                    record_holdings: true,
                },
            ],
            metrics: MetricsConfig::default(),
            research: ResearchConfig::default(),
            benchmark: BenchmarkConfig::default(),
            paths: PathsConfig::default(),
        }
    }
}

/// Daily signal construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SignalConfig {
    /// EMA span applied to each ticker's daily score.
    pub ema_span: usize,
    /// Ordered field preference; the first field present for a ticker wins.
    pub field_preference: Vec<SignalField>,
}

impl Default for SignalConfig {
    fn default() -> Self {
        Self {
            ema_span: DEFAULT_EMA_SPAN,
            field_preference: DEFAULT_FIELD_PREFERENCE.to_vec(),
        }
    }
}

/// One named portfolio to simulate.
///
/// In TOML the strategy fields sit beside the name:
///
/// ```toml
/// [[portfolios]]
/// name = "top5"
/// type = "top_n"
/// top_n = 5
/// min_names = 3
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioConfig {
    pub name: String,
    #[serde(flatten)]
    pub strategy: StrategySpec,
    /// Include rebalance snapshots in the portfolio artifact.
    #[serde(default)]
    pub record_holdings: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Annual risk-free rate subtracted in the Sharpe ratio.
    pub risk_free_annual: f64,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            risk_free_annual: 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResearchConfig {
    /// Bartlett lags for the time-series HAC errors.
    pub hac_lags: usize,
    pub quantiles: Vec<f64>,
    /// Add the daily news count as a control regressor.
    pub news_control: bool,
}

impl Default for ResearchConfig {
    fn default() -> Self {
        Self {
            hac_lags: 5,
            quantiles: DEFAULT_QUANTILES.to_vec(),
            news_control: true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BenchmarkConfig {
    /// Benchmark ticker; `None` uses the equal-weight universe mean.
    pub ticker: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Directory of `{TICKER}.csv` / `{TICKER}.json` price files.
    pub prices_dir: PathBuf,
    /// Directory of per-(ticker, date) signal record JSON files.
    pub records_dir: Option<PathBuf>,
    /// JSON-lines file of scored news events.
    pub events_path: Option<PathBuf>,
    /// Universe TOML (tickers with sector and market cap).
    pub universe_path: Option<PathBuf>,
    pub output_dir: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            prices_dir: PathBuf::from("data/prices"),
            records_dir: None,
            events_path: None,
            universe_path: None,
            output_dir: PathBuf::from("artifacts"),
        }
    }
}

impl PipelineConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            source: e,
        })?;
        Self::from_toml(&content)
    }

    /// Parse and validate.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: String| Err(ConfigError::Invalid(msg));

        if self.calendar.close_hour > 23 {
            return invalid(format!("close_hour {} is not an hour", self.calendar.close_hour));
        }
        let close_minutes = i64::from(self.calendar.close_hour) * 60;
        if !(0..=close_minutes).contains(&self.calendar.cutoff_minutes) {
            return invalid(format!(
                "cutoff_minutes {} must be between 0 and {close_minutes}",
                self.calendar.cutoff_minutes
            ));
        }
        if self.signal.ema_span == 0 {
            return invalid("ema_span must be at least 1".into());
        }
        if self.signal.field_preference.is_empty() {
            return invalid("field_preference is empty".into());
        }
        if !(self.metrics.risk_free_annual.is_finite() && self.metrics.risk_free_annual > -1.0) {
            return invalid(format!(
                "risk_free_annual {} must be finite and above -1",
                self.metrics.risk_free_annual
            ));
        }
        if let Some(q) = self
            .research
            .quantiles
            .iter()
            .find(|q| !(**q > 0.0 && **q < 1.0))
        {
            return invalid(format!("quantile {q} is outside (0, 1)"));
        }

        let mut names = BTreeSet::new();
        for p in &self.portfolios {
            if p.name.is_empty()
                || !p
                    .name
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
            {
                return invalid(format!(
                    "portfolio name '{}' must be non-empty [A-Za-z0-9_-]",
                    p.name
                ));
            }
            if !names.insert(p.name.as_str()) {
                return invalid(format!("duplicate portfolio name '{}'", p.name));
            }
            match p.strategy {
                StrategySpec::TopN { top_n, .. } if top_n == 0 => {
                    return invalid(format!("portfolio '{}': top_n must be at least 1", p.name));
                }
                StrategySpec::WeeklyLongShort { k, gross, .. } => {
                    if k == 0 {
                        return invalid(format!("portfolio '{}': k must be at least 1", p.name));
                    }
                    if !(gross.is_finite() && gross > 0.0) {
                        return invalid(format!(
                            "portfolio '{}': gross {gross} must be positive",
                            p.name
                        ));
                    }
                }
                StrategySpec::TopN { .. } => {}
            }
        }
        Ok(())
    }

    /// Deterministic content hash. Identical configurations share a hash.
    pub fn config_hash(&self) -> Result<String, ConfigError> {
        let json = serde_json::to_string(self)?;
        Ok(blake3::hash(json.as_bytes()).to_hex().to_string())
    }

    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}

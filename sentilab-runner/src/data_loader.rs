//! Input loading for the pipeline.
//!
//! Reads prices, per-day signal records, scored news events and the universe
//! from the local filesystem. Upstream field names vary between producers, so
//! every record is mapped onto the canonical types here, once:
//!
//! | canonical          | accepted source fields (first present wins)         |
//! |--------------------|-----------------------------------------------------|
//! | `score`            | `score_mean`, `sentiment`, `score`                  |
//! | `predicted_return` | `pred_ret`, `predicted_return`, `expected_return`   |
//! | `news_count`       | `n_total`, `news_count`, `count`                    |
//!
//! A missing or malformed input is logged, counted in [`LoadReport`] and
//! skipped. Loading never aborts the run.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info, warn};

use sentilab_core::calendar::parse_timestamp;
use sentilab_core::data::Universe;
use sentilab_core::domain::{PriceBar, SentimentEvent, SentimentScores};
use sentilab_core::signal::SignalRecord;

use crate::config::PathsConfig;

const SCORE_FIELDS: [&str; 3] = ["score_mean", "sentiment", "score"];
const PREDICTED_FIELDS: [&str; 3] = ["pred_ret", "predicted_return", "expected_return"];
const COUNT_FIELDS: [&str; 3] = ["n_total", "news_count", "count"];
const TICKER_FIELDS: [&str; 2] = ["ticker", "symbol"];
const DATE_FIELDS: [&str; 2] = ["date", "day"];
const TIMESTAMP_FIELDS: [&str; 4] = ["published_at", "timestamp", "datetime", "time"];

/// Errors reading a single input file.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {reason}")]
    Parse { path: String, reason: String },
}

impl LoadError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.display().to_string(),
            source,
        }
    }

    fn parse(path: &Path, reason: impl ToString) -> Self {
        Self::Parse {
            path: path.display().to_string(),
            reason: reason.to_string(),
        }
    }
}

/// What was read and what was dropped.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadReport {
    pub price_files: usize,
    pub price_files_skipped: usize,
    pub price_rows_skipped: usize,
    pub record_files: usize,
    pub record_files_skipped: usize,
    pub records_loaded: usize,
    pub records_skipped: usize,
    pub events_loaded: usize,
    pub events_skipped: usize,
    /// Events kept with an unparseable timestamp.
    pub events_without_time: usize,
    /// The universe was derived from the price files.
    pub universe_derived: bool,
}

/// Everything a pipeline run consumes.
#[derive(Debug, Clone, Default)]
pub struct LoadedInputs {
    pub universe: Universe,
    pub prices: BTreeMap<String, Vec<PriceBar>>,
    pub records: Vec<SignalRecord>,
    pub events: Vec<SentimentEvent>,
    pub report: LoadReport,
    /// BLAKE3 over all loaded inputs.
    pub dataset_hash: String,
}

/// Load every configured input.
///
/// `benchmark` prices are loaded even when the ticker sits outside the
/// universe; a derived universe never includes it.
pub fn load_inputs(paths: &PathsConfig, benchmark: Option<&str>) -> LoadedInputs {
    let mut report = LoadReport::default();

    let configured = paths
        .universe_path
        .as_deref()
        .and_then(|path| match Universe::from_file(path) {
            Ok(u) => Some(Universe {
                tickers: u
                    .tickers
                    .into_iter()
                    .map(|(t, member)| (normalize_ticker(&t), member))
                    .collect(),
            }),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "universe unreadable, deriving from prices");
                None
            }
        })
        .filter(|u| !u.is_empty());

    let benchmark = benchmark.map(normalize_ticker);
    let is_benchmark = |t: &str| benchmark.as_deref() == Some(t);
    let prices = load_prices(
        &paths.prices_dir,
        |t| configured.as_ref().map_or(true, |u| u.contains(t)) || is_benchmark(t),
        &mut report,
    );
    let universe = match configured {
        Some(u) => u,
        None => {
            report.universe_derived = true;
            Universe::from_tickers(prices.keys().filter(|t| !is_benchmark(t)).cloned())
        }
    };

    let records = match &paths.records_dir {
        Some(dir) => load_records(dir, &mut report),
        None => Vec::new(),
    };
    let events = match &paths.events_path {
        Some(path) => load_events(path, &mut report),
        None => Vec::new(),
    };

    let dataset_hash = compute_dataset_hash(&prices, &records, &events);
    info!(
        tickers = universe.ticker_count(),
        price_series = prices.len(),
        records = records.len(),
        events = events.len(),
        "inputs loaded"
    );

    LoadedInputs {
        universe,
        prices,
        records,
        events,
        report,
        dataset_hash,
    }
}

// ─── Prices ──────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct PriceRow {
    #[serde(alias = "Date")]
    date: String,
    #[serde(default, alias = "Close")]
    close: Option<f64>,
    #[serde(default, alias = "Open")]
    open: Option<f64>,
}

/// Load `{TICKER}.csv` / `{TICKER}.json` files for tickers accepted by `keep`.
pub fn load_prices(
    dir: &Path,
    keep: impl Fn(&str) -> bool,
    report: &mut LoadReport,
) -> BTreeMap<String, Vec<PriceBar>> {
    let mut prices = BTreeMap::new();
    let files = match sorted_entries(dir) {
        Ok(files) => files,
        Err(e) => {
            warn!(error = %e, "price directory unreadable");
            return prices;
        }
    };

    for path in files {
        let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
            continue;
        };
        let Some(ticker) = path.file_stem().and_then(|s| s.to_str()).map(normalize_ticker) else {
            continue;
        };
        if !keep(&ticker) {
            debug!(%ticker, "price file outside universe");
            continue;
        }
        let parsed = match ext.to_ascii_lowercase().as_str() {
            "csv" => read_price_csv(&path),
            "json" => read_price_json(&path),
            _ => continue,
        };
        report.price_files += 1;
        match parsed {
            Ok((bars, skipped)) => {
                report.price_rows_skipped += skipped;
                if bars.is_empty() {
                    warn!(%ticker, "price file has no usable rows");
                    report.price_files_skipped += 1;
                    continue;
                }
                prices.insert(ticker, bars);
            }
            Err(e) => {
                warn!(error = %e, "skipping price file");
                report.price_files_skipped += 1;
            }
        }
    }
    prices
}

fn read_price_csv(path: &Path) -> Result<(Vec<PriceBar>, usize), LoadError> {
    let mut reader = csv::Reader::from_path(path).map_err(|e| LoadError::parse(path, e))?;
    let mut bars = Vec::new();
    let mut skipped = 0;
    for row in reader.deserialize::<PriceRow>() {
        match row.ok().and_then(|r| price_bar(&r.date, r.close, r.open)) {
            Some(bar) => bars.push(bar),
            None => skipped += 1,
        }
    }
    Ok((bars, skipped))
}

fn read_price_json(path: &Path) -> Result<(Vec<PriceBar>, usize), LoadError> {
    let value = read_json(path)?;
    let rows = match &value {
        Value::Array(rows) => rows.as_slice(),
        Value::Object(map) => match map.get("bars").or_else(|| map.get("prices")) {
            Some(Value::Array(rows)) => rows.as_slice(),
            _ => return Err(LoadError::parse(path, "expected an array of bars")),
        },
        _ => return Err(LoadError::parse(path, "expected an array of bars")),
    };
    let mut bars = Vec::with_capacity(rows.len());
    let mut skipped = 0;
    for row in rows {
        let bar = string_field(row, &["date", "Date"]).and_then(|date| {
            price_bar(
                &date,
                number_field(row, &["close", "Close"]),
                number_field(row, &["open", "Open"]),
            )
        });
        match bar {
            Some(bar) => bars.push(bar),
            None => skipped += 1,
        }
    }
    Ok((bars, skipped))
}

fn price_bar(date: &str, close: Option<f64>, open: Option<f64>) -> Option<PriceBar> {
    let bar = PriceBar {
        date: parse_date(date)?,
        open: open.filter(|v| v.is_finite()),
        close: close?,
    };
    bar.is_valid().then_some(bar)
}

// ─── Signal records ──────────────────────────────────────────────────

/// Where a record file sits, for records that omit ticker or date.
#[derive(Debug, Default)]
struct FileContext {
    ticker: Option<String>,
    date: Option<NaiveDate>,
}

impl FileContext {
    /// `AAPL.json` names a ticker; `AAPL/2024-01-02.json` names both.
    fn from_path(path: &Path) -> Self {
        let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or_default();
        match parse_date(stem) {
            Some(date) => Self {
                ticker: path
                    .parent()
                    .and_then(|p| p.file_name())
                    .and_then(|s| s.to_str())
                    .map(normalize_ticker),
                date: Some(date),
            },
            None if !stem.is_empty() => Self {
                ticker: Some(normalize_ticker(stem)),
                date: None,
            },
            None => Self::default(),
        }
    }
}

/// Load every `*.json` under `dir`, recursively, in path order.
pub fn load_records(dir: &Path, report: &mut LoadReport) -> Vec<SignalRecord> {
    let mut records = Vec::new();
    let files = match json_files_recursive(dir) {
        Ok(files) => files,
        Err(e) => {
            warn!(error = %e, "record directory unreadable");
            return records;
        }
    };

    for path in files {
        report.record_files += 1;
        let value = match read_json(&path) {
            Ok(v) => v,
            Err(e) => {
                warn!(error = %e, "skipping record file");
                report.record_files_skipped += 1;
                continue;
            }
        };
        let ctx = FileContext::from_path(&path);
        let items: Vec<&Value> = match &value {
            Value::Array(items) => items.iter().collect(),
            Value::Object(map) => match map.get("records") {
                Some(Value::Array(items)) => items.iter().collect(),
                _ => vec![&value],
            },
            _ => Vec::new(),
        };
        for item in items {
            match canonical_record(item, &ctx) {
                Some(record) => {
                    records.push(record);
                    report.records_loaded += 1;
                }
                None => report.records_skipped += 1,
            }
        }
    }
    records
}

/// Map one upstream record onto [`SignalRecord`]. `None` without a ticker, a
/// date, or any signal field.
fn canonical_record(value: &Value, ctx: &FileContext) -> Option<SignalRecord> {
    if !value.is_object() {
        return None;
    }
    let ticker = string_field(value, &TICKER_FIELDS)
        .map(|t| normalize_ticker(&t))
        .or_else(|| ctx.ticker.clone())
        .filter(|t| !t.is_empty())?;
    let date = string_field(value, &DATE_FIELDS)
        .and_then(|d| parse_date(&d))
        .or(ctx.date)?;
    let score = number_field(value, &SCORE_FIELDS);
    let predicted_return = number_field(value, &PREDICTED_FIELDS);
    if score.is_none() && predicted_return.is_none() {
        return None;
    }
    let news_count = number_field(value, &COUNT_FIELDS)
        .filter(|n| *n >= 0.0)
        .map(|n| n.round() as u32);
    Some(SignalRecord {
        ticker,
        date,
        predicted_return,
        score,
        news_count,
    })
}

// ─── Events ──────────────────────────────────────────────────────────

/// Load scored news events from a JSON-lines file.
pub fn load_events(path: &Path, report: &mut LoadReport) -> Vec<SentimentEvent> {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) => {
            warn!(error = %LoadError::io(path, e), "events unreadable");
            return Vec::new();
        }
    };

    let mut events = Vec::new();
    for (lineno, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let event = serde_json::from_str::<Value>(line)
            .ok()
            .and_then(|v| canonical_event(&v));
        match event {
            Some(event) => {
                if event.published_at.is_none() {
                    report.events_without_time += 1;
                }
                events.push(event);
                report.events_loaded += 1;
            }
            None => {
                debug!(line = lineno + 1, "skipping malformed event");
                report.events_skipped += 1;
            }
        }
    }
    events
}

/// Scores may sit at the top level or under `scores`; `pos`/`neg`/`neu` are
/// accepted. Missing confidence falls back to the largest class probability.
fn canonical_event(value: &Value) -> Option<SentimentEvent> {
    let ticker = normalize_ticker(&string_field(value, &TICKER_FIELDS)?);
    if ticker.is_empty() {
        return None;
    }
    let scores_obj = value.get("scores").filter(|s| s.is_object()).unwrap_or(value);
    let scores = SentimentScores {
        positive: number_field(scores_obj, &["positive", "pos"])?,
        negative: number_field(scores_obj, &["negative", "neg"])?,
        neutral: number_field(scores_obj, &["neutral", "neu"]).unwrap_or(0.0),
    };
    let confidence = number_field(value, &["confidence"])
        .unwrap_or_else(|| scores.positive.max(scores.negative).max(scores.neutral));
    let published_at = string_field(value, &TIMESTAMP_FIELDS).and_then(|raw| parse_timestamp(&raw));
    Some(SentimentEvent {
        ticker,
        published_at,
        scores,
        confidence,
    })
}

// ─── Helpers ─────────────────────────────────────────────────────────

pub(crate) fn normalize_ticker(raw: &str) -> String {
    raw.trim().to_ascii_uppercase()
}

/// `YYYY-MM-DD`, optionally followed by a time part.
fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    NaiveDate::parse_from_str(raw.get(..10)?, "%Y-%m-%d").ok()
}

/// First of `names` that holds a non-empty string.
fn string_field(value: &Value, names: &[&str]) -> Option<String> {
    names.iter().find_map(|name| match value.get(*name)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        _ => None,
    })
}

/// First of `names` that holds a finite number (numeric strings accepted).
fn number_field(value: &Value, names: &[&str]) -> Option<f64> {
    names.iter().find_map(|name| {
        let v = match value.get(*name)? {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        }?;
        v.is_finite().then_some(v)
    })
}

fn read_json(path: &Path) -> Result<Value, LoadError> {
    let content = std::fs::read_to_string(path).map_err(|e| LoadError::io(path, e))?;
    serde_json::from_str(&content).map_err(|e| LoadError::parse(path, e))
}

fn sorted_entries(dir: &Path) -> Result<Vec<PathBuf>, LoadError> {
    let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)
        .map_err(|e| LoadError::io(dir, e))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.is_file())
        .collect();
    paths.sort();
    Ok(paths)
}

fn json_files_recursive(dir: &Path) -> Result<Vec<PathBuf>, LoadError> {
    let mut out = Vec::new();
    let mut stack = vec![dir.to_path_buf()];
    while let Some(current) = stack.pop() {
        for entry in std::fs::read_dir(&current).map_err(|e| LoadError::io(&current, e))? {
            let Ok(entry) = entry else { continue };
            let path = entry.path();
            if path.is_dir() {
                stack.push(path);
            } else if path
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| e.eq_ignore_ascii_case("json"))
            {
                out.push(path);
            }
        }
    }
    out.sort();
    Ok(out)
}

/// Deterministic BLAKE3 hash over prices, records and events.
///
/// Prices are hashed in ticker order; records and events in load order, which
/// is itself path-sorted.
fn compute_dataset_hash(
    prices: &BTreeMap<String, Vec<PriceBar>>,
    records: &[SignalRecord],
    events: &[SentimentEvent],
) -> String {
    let mut hasher = blake3::Hasher::new();
    for (ticker, bars) in prices {
        hasher.update(ticker.as_bytes());
        for bar in bars {
            hasher.update(bar.date.to_string().as_bytes());
            hasher.update(&bar.close.to_le_bytes());
            hasher.update(&bar.open.unwrap_or(f64::NAN).to_le_bytes());
        }
    }
    for record in records {
        if let Ok(bytes) = serde_json::to_vec(record) {
            hasher.update(&bytes);
        }
    }
    for event in events {
        if let Ok(bytes) = serde_json::to_vec(event) {
            hasher.update(&bytes);
        }
    }
    hasher.finalize().to_hex().to_string()
}

//! Research study: does the sentiment signal explain next-day returns?
//!
//! Three views of the same question:
//! - time series: equal-weight market forward return on the mean signal level,
//!   HAC errors;
//! - panel: ticker forward return on the ticker's own signal, entity fixed
//!   effects, errors clustered by ticker;
//! - quantiles: pooled panel at each configured quantile.
//!
//! Each model is independent. A model that cannot be estimated is reported as
//! such and the others still run.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sentilab_core::returns::ReturnPanel;
use sentilab_core::signal::AlignedSignals;
use sentilab_core::Outcome;
use tracing::debug;

use crate::config::ResearchConfig;
use crate::metrics::mean_f64;
use crate::series::TickerSeries;
use crate::stats::{
    panel_within_cluster, quantile_regression, time_series_hac, PanelRow, QuantileFit,
    RegressionTable, Regressor,
};

const SIGNAL: &str = "signal";
const NEWS: &str = "news_count";
const SIGNIFICANCE: f64 = 0.05;

/// One day of the market-level study series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudyPoint {
    pub date: NaiveDate,
    /// Mean carried-forward signal over tickers with a return that day.
    pub signal: f64,
    /// Equal-weight forward return of the same tickers.
    #[serde(rename = "return")]
    pub ret: f64,
    /// News items with this effective date, all tickers.
    pub news_count: usize,
    pub names: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResearchReport {
    pub time_series: Outcome<RegressionTable>,
    pub panel: Outcome<RegressionTable>,
    pub quantiles: Vec<QuantileFit>,
    pub series: Vec<StudyPoint>,
    pub conclusions: Vec<String>,
}

impl ResearchReport {
    /// `returns` must be the forward panel and `signals` aligned to its dates.
    pub fn build(
        series: &[TickerSeries],
        returns: &ReturnPanel,
        signals: &AlignedSignals,
        config: &ResearchConfig,
    ) -> Self {
        let study = market_series(series, returns, signals);
        let time_series = fit_time_series(&study, config);

        let rows = panel_rows(series, returns);
        let news_control = config.news_control && has_within_variation(&rows);
        let names: &[&str] = if news_control { &[SIGNAL, NEWS] } else { &[SIGNAL] };
        let used: Vec<PanelRow> = rows
            .iter()
            .map(|r| PanelRow {
                entity: r.entity.clone(),
                y: r.y,
                x: r.x[..names.len()].to_vec(),
            })
            .collect();
        let panel = panel_within_cluster(&used, names);

        let quantiles = if config.quantiles.is_empty() {
            Vec::new()
        } else {
            let y: Vec<f64> = used.iter().map(|r| r.y).collect();
            let columns: Vec<Vec<f64>> = (0..names.len())
                .map(|j| used.iter().map(|r| r.x[j]).collect())
                .collect();
            let regressors: Vec<Regressor<'_>> = names
                .iter()
                .zip(&columns)
                .map(|(name, values)| Regressor::new(name, values))
                .collect();
            quantile_regression(&y, &regressors, &config.quantiles)
        };

        debug!(
            days = study.len(),
            panel_rows = used.len(),
            "research study fitted"
        );

        let mut conclusions = vec![
            describe("Time-series (market, HAC)", &time_series),
            describe("Panel (ticker fixed effects, clustered)", &panel),
        ];
        if !quantiles.is_empty() {
            conclusions.push(describe_quantiles(&quantiles));
        }

        Self {
            time_series,
            panel,
            quantiles,
            series: study,
            conclusions,
        }
    }
}

/// Daily cross-section of carried-forward signal and forward return.
fn market_series(
    series: &[TickerSeries],
    returns: &ReturnPanel,
    signals: &AlignedSignals,
) -> Vec<StudyPoint> {
    let mut news_by_date: BTreeMap<NaiveDate, usize> = BTreeMap::new();
    for s in series {
        for p in &s.points {
            *news_by_date.entry(p.date).or_default() += p.news_count;
        }
    }

    returns
        .dates
        .iter()
        .filter_map(|&date| {
            let (sigs, rets): (Vec<f64>, Vec<f64>) = signals
                .tickers()
                .filter_map(|t| Some((signals.value(t, date)?, returns.get(t, date)?)))
                .unzip();
            if sigs.is_empty() {
                return None;
            }
            Some(StudyPoint {
                date,
                signal: mean_f64(&sigs),
                ret: mean_f64(&rets),
                news_count: news_by_date.get(&date).copied().unwrap_or(0),
                names: sigs.len(),
            })
        })
        .collect()
}

fn fit_time_series(study: &[StudyPoint], config: &ResearchConfig) -> Outcome<RegressionTable> {
    let y: Vec<f64> = study.iter().map(|p| p.ret).collect();
    let signal: Vec<f64> = study.iter().map(|p| p.signal).collect();
    let news: Vec<f64> = study.iter().map(|p| p.news_count as f64).collect();
    let mut regressors = vec![Regressor::new(SIGNAL, &signal)];
    if config.news_control && has_variation(&news) {
        regressors.push(Regressor::new(NEWS, &news));
    }
    time_series_hac(&y, &regressors, config.hac_lags)
}

/// Observed signal days joined to the same day's forward return, with both
/// regressors; callers slice off the controls they use.
fn panel_rows(series: &[TickerSeries], returns: &ReturnPanel) -> Vec<PanelRow> {
    series
        .iter()
        .flat_map(|s| {
            s.points.iter().filter_map(|p| {
                Some(PanelRow {
                    entity: s.ticker.clone(),
                    y: returns.get(&s.ticker, p.date)?,
                    x: vec![p.score, p.news_count as f64],
                })
            })
        })
        .collect()
}

fn has_variation(values: &[f64]) -> bool {
    values
        .first()
        .is_some_and(|first| values.iter().any(|v| (v - first).abs() > 1e-12))
}

/// The news control varies inside at least one ticker.
fn has_within_variation(rows: &[PanelRow]) -> bool {
    let mut first: BTreeMap<&str, f64> = BTreeMap::new();
    rows.iter().any(|r| {
        let seen = *first.entry(r.entity.as_str()).or_insert(r.x[1]);
        (r.x[1] - seen).abs() > 1e-12
    })
}

// ─── Narrative ───────────────────────────────────────────────────────

fn describe(label: &str, outcome: &Outcome<RegressionTable>) -> String {
    match outcome {
        Outcome::Computed(table) => match table.coefficient(SIGNAL) {
            Some(c) => {
                let (Some(t), Some(p)) = (c.t_stat, c.p_value) else {
                    return format!(
                        "{label}: signal coefficient {:+.4} with zero standard error (n = {}), no test possible.",
                        c.coef, table.nobs
                    );
                };
                let verdict = if p < SIGNIFICANCE {
                    "significant at the 5% level"
                } else {
                    "not significant at the 5% level"
                };
                format!(
                    "{label}: signal coefficient {:+.4} (t = {t:.2}, p = {p:.3}, n = {}), {verdict}.",
                    c.coef, table.nobs
                )
            }
            None => format!("{label}: no signal coefficient in the fit."),
        },
        Outcome::InsufficientData {
            required,
            available,
        } => format!("{label}: not estimated, {available} observations available, {required} required."),
        Outcome::Failed { error } => format!("{label}: fit failed ({error})."),
    }
}

fn describe_quantiles(fits: &[QuantileFit]) -> String {
    let parts: Vec<String> = fits
        .iter()
        .map(|f| {
            let q = f.quantile;
            match &f.fit {
                Outcome::Computed(table) => match table.coefficient(SIGNAL) {
                    Some(c) => match c.p_value {
                        Some(p) => format!("q{q:.2} slope {:+.4} (p = {p:.3})", c.coef),
                        None => format!("q{q:.2} slope {:+.4} (no test)", c.coef),
                    },
                    None => format!("q{q:.2} no signal coefficient"),
                },
                Outcome::InsufficientData {
                    required,
                    available,
                } => format!("q{q:.2} not estimated ({available}/{required} observations)"),
                Outcome::Failed { error } => format!("q{q:.2} failed ({error})"),
            }
        })
        .collect();
    format!("Quantile regressions: {}.", parts.join("; "))
}

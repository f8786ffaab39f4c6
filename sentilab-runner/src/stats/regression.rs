//! Linear regressions for the research study.
//!
//! - Time series: OLS with a constant, Newey-West (Bartlett) HAC errors.
//! - Panel: entity fixed effects via within-demeaning, errors clustered by entity.
//!
//! Both return [`Outcome`]: too few observations is `InsufficientData`, a
//! numerical failure (singular design, one cluster) is `Failed`. Neither aborts
//! the study.

use std::collections::BTreeMap;

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};
use sentilab_core::Outcome;
use thiserror::Error;

use super::distributions::t_two_sided_p;

pub const MIN_TIME_SERIES_OBS: usize = 30;
pub const MIN_PANEL_OBS: usize = 200;

#[derive(Debug, Error, PartialEq)]
pub enum FitError {
    #[error("regressor '{name}' has {found} values, response has {expected}")]
    LengthMismatch {
        name: String,
        expected: usize,
        found: usize,
    },
    #[error("design matrix is singular")]
    Singular,
    #[error("need at least two clusters, found {0}")]
    TooFewClusters(usize),
    #[error("no residual degrees of freedom ({nobs} observations, {params} parameters)")]
    NoDegreesOfFreedom { nobs: usize, params: usize },
    #[error("quantile {0} is outside (0, 1)")]
    BadQuantile(f64),
    #[error("kernel bandwidth is degenerate: {0}")]
    Bandwidth(String),
}

/// How the standard errors were computed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Covariance {
    Hac { lags: usize },
    Cluster { clusters: usize },
    QuantileSandwich { quantile: f64, bandwidth: f64 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Coefficient {
    pub name: String,
    pub coef: f64,
    pub std_err: f64,
    /// `None` when the standard error is zero (an exact fit).
    pub t_stat: Option<f64>,
    pub p_value: Option<f64>,
}

/// One fitted model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionTable {
    pub nobs: usize,
    /// Centered R² (time series), within R² (panel), pseudo R² (quantile).
    pub r_squared: f64,
    pub covariance: Covariance,
    pub coefficients: Vec<Coefficient>,
}

impl RegressionTable {
    pub fn coefficient(&self, name: &str) -> Option<&Coefficient> {
        self.coefficients.iter().find(|c| c.name == name)
    }
}

/// A named regressor column.
#[derive(Debug, Clone, Copy)]
pub struct Regressor<'a> {
    pub name: &'a str,
    pub values: &'a [f64],
}

impl<'a> Regressor<'a> {
    pub fn new(name: &'a str, values: &'a [f64]) -> Self {
        Self { name, values }
    }
}

/// Build `[1, x1, x2, ...]` rows, dropping any observation with a non-finite value.
pub(crate) fn design_with_constant(
    y: &[f64],
    regressors: &[Regressor<'_>],
) -> Result<(Vec<Vec<f64>>, Vec<f64>), FitError> {
    check_lengths(y.len(), regressors)?;
    let mut rows = Vec::with_capacity(y.len());
    let mut response = Vec::with_capacity(y.len());
    for (i, &yi) in y.iter().enumerate() {
        let mut row = Vec::with_capacity(regressors.len() + 1);
        row.push(1.0);
        row.extend(regressors.iter().map(|r| r.values[i]));
        if yi.is_finite() && row.iter().all(|v| v.is_finite()) {
            rows.push(row);
            response.push(yi);
        }
    }
    Ok((rows, response))
}

pub(crate) fn names_with_constant(regressors: &[Regressor<'_>]) -> Vec<String> {
    std::iter::once("const".to_string())
        .chain(regressors.iter().map(|r| r.name.to_string()))
        .collect()
}

fn check_lengths(expected: usize, regressors: &[Regressor<'_>]) -> Result<(), FitError> {
    match regressors.iter().find(|r| r.values.len() != expected) {
        Some(r) => Err(FitError::LengthMismatch {
            name: r.name.to_string(),
            expected,
            found: r.values.len(),
        }),
        None => Ok(()),
    }
}

// ─── OLS core ────────────────────────────────────────────────────────

/// Stack observation rows into an `n x k` design matrix.
pub(crate) fn design_matrix(rows: &[Vec<f64>]) -> DMatrix<f64> {
    let k = rows.first().map_or(0, Vec::len);
    DMatrix::from_fn(rows.len(), k, |i, j| rows[i][j])
}

/// `X' W X` and `X' W y` for diagonal weights `w`.
pub(crate) fn weighted_normal_equations(
    x: &DMatrix<f64>,
    y: &DVector<f64>,
    w: &[f64],
) -> (DMatrix<f64>, DVector<f64>) {
    let xw = DMatrix::from_fn(x.nrows(), x.ncols(), |i, j| x[(i, j)] * w[i]);
    let xt_w = xw.transpose();
    (&xt_w * x, xt_w * y)
}

/// Inverse of a Gram matrix; `Singular` when it has none or it blows up.
pub(crate) fn invert(gram: DMatrix<f64>) -> Result<DMatrix<f64>, FitError> {
    gram.try_inverse()
        .filter(|inv| inv.iter().all(|v| v.is_finite()))
        .ok_or(FitError::Singular)
}

/// `bread * meat * bread` for symmetric `bread`.
pub(crate) fn sandwich(bread: &DMatrix<f64>, meat: &DMatrix<f64>) -> DMatrix<f64> {
    bread * meat * bread
}

pub(crate) struct OlsFit {
    pub beta: DVector<f64>,
    pub resid: DVector<f64>,
    pub xtx_inv: DMatrix<f64>,
}

pub(crate) fn ols(x: &DMatrix<f64>, y: &DVector<f64>) -> Result<OlsFit, FitError> {
    let xt = x.transpose();
    let xtx_inv = invert(&xt * x)?;
    let beta = &xtx_inv * (xt * y);
    let resid = y - x * &beta;
    Ok(OlsFit {
        beta,
        resid,
        xtx_inv,
    })
}

fn r_squared(y: &DVector<f64>, resid: &DVector<f64>, centered: bool) -> f64 {
    let mean = if centered { y.mean() } else { 0.0 };
    let sst: f64 = y.iter().map(|v| (v - mean).powi(2)).sum();
    let ssr = resid.norm_squared();
    if sst <= 0.0 {
        0.0
    } else {
        1.0 - ssr / sst
    }
}

/// Coefficient rows from the diagonal of `cov`. A zero standard error leaves
/// the t statistic and p-value unset.
pub(crate) fn coefficient_table(
    names: &[String],
    beta: &DVector<f64>,
    cov: &DMatrix<f64>,
    p_value: impl Fn(f64) -> f64,
) -> Vec<Coefficient> {
    names
        .iter()
        .zip(beta.iter())
        .zip(cov.diagonal().iter())
        .map(|((name, &coef), &var)| {
            let std_err = var.max(0.0).sqrt();
            let t_stat = (std_err > 0.0).then(|| coef / std_err).filter(|t| t.is_finite());
            Coefficient {
                name: name.clone(),
                coef,
                std_err,
                t_stat,
                p_value: t_stat.map(&p_value),
            }
        })
        .collect()
}

// ─── Time series: Newey-West HAC ─────────────────────────────────────

/// Newey-West long-run covariance of the scores `x_t e_t` with Bartlett weights.
fn newey_west_meat(x: &DMatrix<f64>, resid: &DVector<f64>, lags: usize) -> DMatrix<f64> {
    let n = x.nrows();
    let scores = DMatrix::from_fn(n, x.ncols(), |i, j| x[(i, j)] * resid[i]);
    let mut meat = scores.transpose() * &scores;
    for lag in 1..=lags.min(n.saturating_sub(1)) {
        let w = 1.0 - lag as f64 / (lags as f64 + 1.0);
        let gamma = scores.rows(lag, n - lag).transpose() * scores.rows(0, n - lag);
        meat += (&gamma + gamma.transpose()) * w;
    }
    meat
}

/// OLS of `y` on a constant and `regressors`, HAC standard errors with `lags`
/// Bartlett lags. P-values use Student t with n - k degrees of freedom.
pub fn time_series_hac(
    y: &[f64],
    regressors: &[Regressor<'_>],
    lags: usize,
) -> Outcome<RegressionTable> {
    let (rows, response) = match design_with_constant(y, regressors) {
        Ok(design) => design,
        Err(e) => return Outcome::Failed { error: e.to_string() },
    };
    if let Err(short) = Outcome::require(MIN_TIME_SERIES_OBS, rows.len()) {
        return short;
    }
    fit_hac(&rows, &response, &names_with_constant(regressors), lags).into()
}

fn fit_hac(
    rows: &[Vec<f64>],
    y: &[f64],
    names: &[String],
    lags: usize,
) -> Result<RegressionTable, FitError> {
    let n = rows.len();
    let k = names.len();
    if n <= k {
        return Err(FitError::NoDegreesOfFreedom { nobs: n, params: k });
    }
    let lags = lags.min(n - 1);
    let x = design_matrix(rows);
    let y = DVector::from_column_slice(y);
    let fit = ols(&x, &y)?;
    let cov = sandwich(&fit.xtx_inv, &newey_west_meat(&x, &fit.resid, lags));
    let df = (n - k) as f64;
    Ok(RegressionTable {
        nobs: n,
        r_squared: r_squared(&y, &fit.resid, true),
        covariance: Covariance::Hac { lags },
        coefficients: coefficient_table(names, &fit.beta, &cov, |t| t_two_sided_p(t, df)),
    })
}

// ─── Panel: within estimator, clustered errors ───────────────────────

/// One (entity, period) observation.
#[derive(Debug, Clone, PartialEq)]
pub struct PanelRow {
    pub entity: String,
    pub y: f64,
    pub x: Vec<f64>,
}

/// Entity fixed-effects regression of `y` on `x` (no constant; absorbed by the
/// demeaning) with entity-clustered errors.
///
/// Small-sample factor G/(G-1) * (N-1)/(N-K); p-values use Student t with G-1
/// degrees of freedom.
pub fn panel_within_cluster(rows: &[PanelRow], names: &[&str]) -> Outcome<RegressionTable> {
    if let Some(bad) = rows.iter().find(|r| r.x.len() != names.len()) {
        return Outcome::Failed {
            error: FitError::LengthMismatch {
                name: bad.entity.clone(),
                expected: names.len(),
                found: bad.x.len(),
            }
            .to_string(),
        };
    }
    let clean: Vec<&PanelRow> = rows
        .iter()
        .filter(|r| r.y.is_finite() && r.x.iter().all(|v| v.is_finite()))
        .collect();
    if let Err(short) = Outcome::require(MIN_PANEL_OBS, clean.len()) {
        return short;
    }
    let names: Vec<String> = names.iter().map(|s| s.to_string()).collect();
    fit_within(&clean, &names).into()
}

fn fit_within(rows: &[&PanelRow], names: &[String]) -> Result<RegressionTable, FitError> {
    let k = names.len();

    // Entity means.
    let mut sums: BTreeMap<&str, (usize, f64, Vec<f64>)> = BTreeMap::new();
    for r in rows {
        let entry = sums
            .entry(r.entity.as_str())
            .or_insert_with(|| (0, 0.0, vec![0.0; k]));
        entry.0 += 1;
        entry.1 += r.y;
        for (acc, v) in entry.2.iter_mut().zip(&r.x) {
            *acc += v;
        }
    }
    let clusters = sums.len();
    if clusters < 2 {
        return Err(FitError::TooFewClusters(clusters));
    }

    let mut design = Vec::with_capacity(rows.len());
    let mut y = Vec::with_capacity(rows.len());
    for r in rows {
        let (count, y_sum, x_sum) = &sums[r.entity.as_str()];
        let count = *count as f64;
        y.push(r.y - y_sum / count);
        design.push(
            r.x.iter()
                .zip(x_sum)
                .map(|(v, s)| v - s / count)
                .collect::<Vec<f64>>(),
        );
    }

    let n = rows.len();
    if n <= k {
        return Err(FitError::NoDegreesOfFreedom { nobs: n, params: k });
    }
    let x = design_matrix(&design);
    let y = DVector::from_vec(y);
    let fit = ols(&x, &y)?;

    // Sum of per-cluster score outer products.
    let mut cluster_scores: BTreeMap<&str, DVector<f64>> = BTreeMap::new();
    for (i, r) in rows.iter().enumerate() {
        let score = cluster_scores
            .entry(r.entity.as_str())
            .or_insert_with(|| DVector::zeros(k));
        *score += x.row(i).transpose() * fit.resid[i];
    }
    let mut meat = DMatrix::zeros(k, k);
    for score in cluster_scores.values() {
        meat += score * score.transpose();
    }

    let g = clusters as f64;
    let cov = sandwich(&fit.xtx_inv, &meat)
        * (g / (g - 1.0) * (n as f64 - 1.0) / (n as f64 - k as f64));

    let df = g - 1.0;
    Ok(RegressionTable {
        nobs: n,
        r_squared: r_squared(&y, &fit.resid, false),
        covariance: Covariance::Cluster { clusters },
        coefficients: coefficient_table(names, &fit.beta, &cov, |t| t_two_sided_p(t, df)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Deterministic pseudo-noise in [-0.5, 0.5).
    fn noise(i: usize) -> f64 {
        ((i as f64 * 12.9898).sin() * 43_758.545_3).fract().abs() - 0.5
    }

    #[test]
    fn exact_line_recovers_coefficients() {
        let x: Vec<f64> = (0..40).map(|i| i as f64).collect();
        let y: Vec<f64> = x.iter().map(|v| 2.0 + 0.5 * v).collect();
        let out = time_series_hac(&y, &[Regressor::new("signal", &x)], 5);
        let table = out.computed().unwrap();
        assert_eq!(table.nobs, 40);
        assert!((table.coefficient("const").unwrap().coef - 2.0).abs() < 1e-9);
        assert!((table.coefficient("signal").unwrap().coef - 0.5).abs() < 1e-9);
        assert!((table.r_squared - 1.0).abs() < 1e-9);
    }

    #[test]
    fn hac_below_minimum_is_insufficient() {
        let x: Vec<f64> = (0..29).map(|i| i as f64).collect();
        let out = time_series_hac(&x, &[Regressor::new("signal", &x)], 5);
        assert_eq!(
            out,
            Outcome::InsufficientData {
                required: 30,
                available: 29
            }
        );
    }

    #[test]
    fn non_finite_rows_are_dropped_before_counting() {
        let mut x: Vec<f64> = (0..31).map(|i| i as f64).collect();
        x[3] = f64::NAN;
        x[7] = f64::INFINITY;
        let y: Vec<f64> = (0..31).map(|i| i as f64 + noise(i)).collect();
        let out = time_series_hac(&y, &[Regressor::new("signal", &x)], 5);
        assert!(matches!(out, Outcome::InsufficientData { available: 29, .. }));
    }

    #[test]
    fn length_mismatch_fails() {
        let out = time_series_hac(&[1.0, 2.0], &[Regressor::new("signal", &[1.0])], 1);
        assert!(matches!(out, Outcome::Failed { .. }));
    }

    #[test]
    fn constant_regressor_is_singular() {
        let y: Vec<f64> = (0..40).map(noise).collect();
        let x = vec![1.0; 40];
        let out = time_series_hac(&y, &[Regressor::new("signal", &x)], 3);
        assert_eq!(
            out,
            Outcome::Failed {
                error: "design matrix is singular".into()
            }
        );
    }

    #[test]
    fn zero_lags_is_white_covariance() {
        let x: Vec<f64> = (0..60).map(|i| noise(i + 100)).collect();
        let y: Vec<f64> = x.iter().enumerate().map(|(i, v)| 0.3 * v + noise(i)).collect();
        let out = time_series_hac(&y, &[Regressor::new("signal", &x)], 0);
        let table = out.computed().unwrap();
        assert_eq!(table.covariance, Covariance::Hac { lags: 0 });
        let slope = table.coefficient("signal").unwrap();
        assert!(slope.std_err > 0.0);
        assert!(slope.p_value.is_some_and(|p| (0.0..=1.0).contains(&p)));
    }

    fn panel(entities: usize, periods: usize, slope: f64) -> Vec<PanelRow> {
        let mut rows = Vec::new();
        for e in 0..entities {
            let effect = e as f64 * 0.1;
            for t in 0..periods {
                let i = e * periods + t;
                let x = noise(i + 7);
                rows.push(PanelRow {
                    entity: format!("T{e}"),
                    y: effect + slope * x + 0.01 * noise(i + 5000),
                    x: vec![x],
                });
            }
        }
        rows
    }

    #[test]
    fn within_estimator_removes_entity_effects() {
        let rows = panel(10, 30, 0.8);
        let out = panel_within_cluster(&rows, &["signal"]);
        let table = out.computed().unwrap();
        assert_eq!(table.nobs, 300);
        assert_eq!(table.covariance, Covariance::Cluster { clusters: 10 });
        let slope = table.coefficient("signal").unwrap();
        assert!((slope.coef - 0.8).abs() < 0.01, "slope {}", slope.coef);
        assert!(slope.p_value.is_some_and(|p| p < 0.001));
    }

    #[test]
    fn panel_below_minimum_is_insufficient() {
        let rows = panel(5, 39, 0.5);
        assert_eq!(
            panel_within_cluster(&rows, &["signal"]),
            Outcome::InsufficientData {
                required: 200,
                available: 195
            }
        );
    }

    #[test]
    fn single_cluster_fails() {
        let rows = panel(1, 250, 0.5);
        let out = panel_within_cluster(&rows, &["signal"]);
        assert!(matches!(out, Outcome::Failed { .. }));
    }
}

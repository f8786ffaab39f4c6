//! Linear quantile regression.
//!
//! Coefficients come from iteratively reweighted least squares on the check
//! loss. Standard errors use the kernel sandwich: Epanechnikov density at zero
//! with a Hall-Sheather bandwidth. Each quantile is fit independently, so one
//! quantile failing does not take the others down.

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};
use sentilab_core::Outcome;

use super::distributions::{normal_pdf, normal_ppf, normal_two_sided_p};
use super::regression::{
    coefficient_table, design_matrix, design_with_constant, invert, names_with_constant,
    sandwich, weighted_normal_equations, Covariance, FitError, RegressionTable, Regressor,
};

pub const MIN_QUANTILE_OBS: usize = 100;
pub const DEFAULT_QUANTILES: [f64; 3] = [0.1, 0.5, 0.9];

const MAX_ITER: usize = 1000;
const P_TOL: f64 = 1e-6;
const RESID_FLOOR: f64 = 1e-6;
/// Hall-Sheather confidence level.
const HS_ALPHA: f64 = 0.05;

/// Result for one quantile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuantileFit {
    pub quantile: f64,
    pub fit: Outcome<RegressionTable>,
}

/// Fit `y` on a constant and `regressors` at every quantile in `quantiles`.
pub fn quantile_regression(
    y: &[f64],
    regressors: &[Regressor<'_>],
    quantiles: &[f64],
) -> Vec<QuantileFit> {
    let design = design_with_constant(y, regressors);
    let names = names_with_constant(regressors);
    quantiles
        .iter()
        .map(|&q| {
            let fit = match &design {
                Err(e) => Outcome::Failed {
                    error: e.to_string(),
                },
                Ok((rows, response)) => match Outcome::require(MIN_QUANTILE_OBS, rows.len()) {
                    Err(short) => short,
                    Ok(()) => fit_quantile(rows, response, &names, q).into(),
                },
            };
            QuantileFit { quantile: q, fit }
        })
        .collect()
}

fn fit_quantile(
    rows: &[Vec<f64>],
    y: &[f64],
    names: &[String],
    q: f64,
) -> Result<RegressionTable, FitError> {
    if !(q > 0.0 && q < 1.0) {
        return Err(FitError::BadQuantile(q));
    }
    let n = rows.len();
    let x = design_matrix(rows);
    let yv = DVector::from_column_slice(y);
    let beta = irls(&x, &yv, q)?;
    let resid: Vec<f64> = (&yv - &x * &beta).iter().copied().collect();

    // Hall-Sheather bandwidth, rescaled to residual units.
    let hs = hall_sheather(n, q, HS_ALPHA);
    if q - hs <= 0.0 || q + hs >= 1.0 {
        return Err(FitError::Bandwidth(format!(
            "quantile {q} too close to the tails for {n} observations"
        )));
    }
    let iqr = percentile(&resid, 75.0) - percentile(&resid, 25.0);
    let spread = population_std(y).min(iqr / 1.34);
    let h = spread * (normal_ppf(q + hs) - normal_ppf(q - hs));
    if !(h > 0.0 && h.is_finite()) {
        return Err(FitError::Bandwidth(format!("bandwidth {h}")));
    }

    let fhat0 = resid.iter().map(|e| epanechnikov(e / h)).sum::<f64>() / (n as f64 * h);
    if !(fhat0 > 0.0 && fhat0.is_finite()) {
        return Err(FitError::Bandwidth(format!("density at zero {fhat0}")));
    }

    let d: Vec<f64> = resid
        .iter()
        .map(|&e| {
            if e > 0.0 {
                (q / fhat0).powi(2)
            } else {
                ((1.0 - q) / fhat0).powi(2)
            }
        })
        .collect();
    let bread = invert(x.transpose() * &x)?;
    let (meat, _) = weighted_normal_equations(&x, &yv, &d);
    let cov = sandwich(&bread, &meat);
    let coefficients = coefficient_table(names, &beta, &cov, normal_two_sided_p);

    Ok(RegressionTable {
        nobs: n,
        r_squared: pseudo_r_squared(y, &resid, q),
        covariance: Covariance::QuantileSandwich {
            quantile: q,
            bandwidth: h,
        },
        coefficients,
    })
}

/// IRLS on the check loss. The first pass is plain OLS.
fn irls(x: &DMatrix<f64>, y: &DVector<f64>, q: f64) -> Result<DVector<f64>, FitError> {
    let mut weights = vec![1.0; x.nrows()];
    let mut beta = DVector::from_element(x.ncols(), 1.0);
    for _ in 0..MAX_ITER {
        let (gram, xty) = weighted_normal_equations(x, y, &weights);
        let next = invert(gram)? * xty;

        let resid = y - x * &next;
        for (w, &r) in weights.iter_mut().zip(resid.iter()) {
            let r = if r.abs() < RESID_FLOOR {
                RESID_FLOOR.copysign(r)
            } else {
                r
            };
            let scaled = if r < 0.0 { q * r } else { (1.0 - q) * r };
            *w = 1.0 / scaled.abs();
        }

        let change = (&next - &beta).amax();
        beta = next;
        if change <= P_TOL {
            break;
        }
    }
    Ok(beta)
}

/// Hall-Sheather (1988) bandwidth in probability units.
fn hall_sheather(n: usize, q: f64, alpha: f64) -> f64 {
    let z = normal_ppf(q);
    let num = 1.5 * normal_pdf(z).powi(2);
    let den = 2.0 * z * z + 1.0;
    (n as f64).powf(-1.0 / 3.0)
        * normal_ppf(1.0 - alpha / 2.0).powf(2.0 / 3.0)
        * (num / den).powf(1.0 / 3.0)
}

fn epanechnikov(u: f64) -> f64 {
    if u.abs() <= 1.0 {
        0.75 * (1.0 - u * u)
    } else {
        0.0
    }
}

fn check_loss(u: f64, q: f64) -> f64 {
    if u < 0.0 {
        (q - 1.0) * u
    } else {
        q * u
    }
}

/// Koenker-Machado pseudo R²: one minus fitted over intercept-only check loss.
fn pseudo_r_squared(y: &[f64], resid: &[f64], q: f64) -> f64 {
    let fitted: f64 = resid.iter().map(|&e| check_loss(e, q)).sum();
    let center = percentile(y, q * 100.0);
    let restricted: f64 = y.iter().map(|&v| check_loss(v - center, q)).sum();
    if restricted <= 0.0 {
        0.0
    } else {
        1.0 - fitted / restricted
    }
}

/// Linear-interpolated percentile, `pct` in [0, 100].
fn percentile(values: &[f64], pct: f64) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let pos = (pct / 100.0).clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64)
}

fn population_std(values: &[f64]) -> f64 {
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    (values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n).sqrt()
}

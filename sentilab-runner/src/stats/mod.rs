//! Statistics for the research study: distributions, OLS/HAC and panel
//! regressions, quantile regression. Matrix work goes through `nalgebra`.

pub mod distributions;
pub mod quantile;
pub mod regression;

pub use quantile::{quantile_regression, QuantileFit, DEFAULT_QUANTILES, MIN_QUANTILE_OBS};
pub use regression::{
    panel_within_cluster, time_series_hac, Coefficient, Covariance, FitError, PanelRow,
    RegressionTable, Regressor, MIN_PANEL_OBS, MIN_TIME_SERIES_OBS,
};

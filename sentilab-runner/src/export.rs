//! Artifact export: JSON envelopes and equity-curve CSV.
//!
//! Artifacts written per run:
//! - `index.json`: the index summary
//! - `portfolio_{name}.json`: one per configured portfolio
//! - `portfolio_{name}_equity.csv`: date, return, equity, names
//! - `research.json`: regressions, quantile fits and the study series
//!
//! Every JSON artifact is wrapped in an [`Artifact`] envelope carrying
//! `schema_version`, the config and dataset hashes, and `as_of`. Newer schema
//! versions are rejected on load.
//!
//! All bytes are rendered before the first write, and each file goes to
//! `{file}.tmp` and is renamed into place, so a failed run never leaves a
//! half-written artifact behind.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::portfolio_report::PortfolioReport;
use crate::runner::{PipelineReport, SCHEMA_VERSION};

/// Envelope around every JSON artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Artifact<T> {
    pub schema_version: u32,
    pub config_hash: String,
    pub dataset_hash: String,
    pub as_of: Option<NaiveDate>,
    pub payload: T,
}

impl<T> Artifact<T> {
    pub fn wrap(report: &PipelineReport, payload: T) -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            config_hash: report.config_hash.clone(),
            dataset_hash: report.dataset_hash.clone(),
            as_of: report.as_of,
            payload,
        }
    }
}

// ─── JSON ───────────────────────────────────────────────────────────

pub fn export_json<T: Serialize>(artifact: &Artifact<T>) -> Result<String> {
    serde_json::to_string_pretty(artifact).context("failed to serialize artifact to JSON")
}

/// Parse an artifact, rejecting schema versions newer than this build writes.
pub fn import_json<T: DeserializeOwned>(json: &str) -> Result<Artifact<T>> {
    let artifact: Artifact<T> =
        serde_json::from_str(json).context("failed to deserialize artifact from JSON")?;
    if artifact.schema_version > SCHEMA_VERSION {
        bail!(
            "unsupported schema version {} (max supported: {})",
            artifact.schema_version,
            SCHEMA_VERSION
        );
    }
    Ok(artifact)
}

pub fn read_artifact<T: DeserializeOwned>(path: &Path) -> Result<Artifact<T>> {
    let json = fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    import_json(&json).with_context(|| format!("invalid artifact {}", path.display()))
}

// ─── CSV ────────────────────────────────────────────────────────────

/// Equity curve as CSV: `date,return,equity,names`.
pub fn export_equity_csv(report: &PortfolioReport) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(["date", "return", "equity", "names"])?;
    for (point, daily) in report.equity_curve.iter().zip(&report.daily_returns) {
        wtr.write_record([
            &point.date.to_string(),
            &format!("{:.10}", daily.ret),
            &format!("{:.10}", point.equity),
            &daily.names.to_string(),
        ])?;
    }
    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

// ─── Files ──────────────────────────────────────────────────────────

/// Write `bytes` to `path` through a `.tmp` sibling and a rename.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp_path = PathBuf::from(tmp);

    fs::write(&tmp_path, bytes)
        .with_context(|| format!("failed to write {}", tmp_path.display()))?;
    if let Err(e) = fs::rename(&tmp_path, path) {
        let _ = fs::remove_file(&tmp_path);
        return Err(e).with_context(|| format!("atomic rename to {} failed", path.display()));
    }
    Ok(())
}

/// File name stem for a portfolio: anything outside `[A-Za-z0-9_-]` becomes `_`.
fn file_stem(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Render every artifact of a run as `(file name, contents)`.
pub fn render_artifacts(report: &PipelineReport) -> Result<Vec<(String, String)>> {
    let mut files = Vec::with_capacity(2 + 2 * report.portfolios.len());
    files.push((
        "index.json".to_string(),
        export_json(&Artifact::wrap(report, &report.index))?,
    ));
    for portfolio in &report.portfolios {
        let stem = format!("portfolio_{}", file_stem(&portfolio.name));
        files.push((
            format!("{stem}.json"),
            export_json(&Artifact::wrap(report, portfolio))?,
        ));
        files.push((format!("{stem}_equity.csv"), export_equity_csv(portfolio)?));
    }
    files.push((
        "research.json".to_string(),
        export_json(&Artifact::wrap(report, &report.research))?,
    ));
    Ok(files)
}

/// Write every artifact of a run into `output_dir`, returning the paths written.
pub fn write_artifacts(report: &PipelineReport, output_dir: &Path) -> Result<Vec<PathBuf>> {
    let files = render_artifacts(report)?;
    fs::create_dir_all(output_dir)
        .with_context(|| format!("failed to create artifact dir: {}", output_dir.display()))?;

    let mut written = Vec::with_capacity(files.len());
    for (name, contents) in files {
        let path = output_dir.join(name);
        write_atomic(&path, contents.as_bytes())?;
        written.push(path);
    }
    info!(
        dir = %output_dir.display(),
        files = written.len(),
        "artifacts written"
    );
    Ok(written)
}

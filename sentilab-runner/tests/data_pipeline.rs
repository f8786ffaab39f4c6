//! End-to-end pipeline tests over a fixture directory.
//!
//! The fixture mixes every supported input shape: CSV and JSON prices, an
//! aggregate record file, per-day record files, a JSON-lines event file, a
//! universe TOML and a benchmark outside the universe. Broken inputs sit
//! beside the good ones and must be skipped and counted.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{Datelike, Duration, NaiveDate, Weekday};
use sentilab_core::portfolio::StrategySpec;
use sentilab_core::Outcome;
use sentilab_runner::config::{BenchmarkConfig, PathsConfig};
use sentilab_runner::portfolio_report::BenchmarkSource;
use sentilab_runner::{
    read_artifact, run_and_export, run_pipeline, IndexSummary, PipelineConfig, PortfolioConfig,
    PortfolioReport, ResearchReport, SCHEMA_VERSION,
};

const DAYS: usize = 60;

fn trading_days() -> Vec<NaiveDate> {
    let mut day = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
    let mut out = Vec::with_capacity(DAYS);
    while out.len() < DAYS {
        if !matches!(day.weekday(), Weekday::Sat | Weekday::Sun) {
            out.push(day);
        }
        day += Duration::days(1);
    }
    out
}

fn closes(seed: f64, drift: f64) -> Vec<f64> {
    let mut close = 100.0;
    (0..DAYS)
        .map(|i| {
            close *= 1.0 + drift + 0.01 * ((i as f64 + seed) * 1.7).sin();
            close
        })
        .collect()
}

fn write_csv(path: &Path, days: &[NaiveDate], closes: &[f64]) {
    let mut body = String::from("date,close\n");
    for (d, c) in days.iter().zip(closes) {
        body.push_str(&format!("{d},{c:.4}\n"));
    }
    fs::write(path, body).unwrap();
}

struct Fixture {
    _dir: tempfile::TempDir,
    root: PathBuf,
}

fn fixture() -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().to_path_buf();
    let days = trading_days();

    let prices = root.join("prices");
    fs::create_dir_all(&prices).unwrap();
    write_csv(&prices.join("AAA.csv"), &days, &closes(0.0, 0.001));
    write_csv(&prices.join("BBB.csv"), &days, &closes(1.3, -0.0005));
    write_csv(&prices.join("SPY.csv"), &days, &closes(2.1, 0.0003));
    write_csv(&prices.join("DDD.csv"), &days, &closes(3.0, 0.0));
    fs::write(prices.join("EEE.csv"), "date,close\nnot-a-date,abc\n").unwrap();
    let ccc: Vec<serde_json::Value> = days
        .iter()
        .zip(closes(4.2, 0.0002))
        .map(|(d, c)| serde_json::json!({ "date": d.to_string(), "close": c }))
        .collect();
    fs::write(
        prices.join("ccc.json"),
        serde_json::to_string(&serde_json::json!({ "bars": ccc })).unwrap(),
    )
    .unwrap();

    let records = root.join("records");
    fs::create_dir_all(records.join("BBB")).unwrap();
    let aaa: Vec<serde_json::Value> = days
        .iter()
        .enumerate()
        .map(|(i, d)| {
            serde_json::json!({
                "date": d.to_string(),
                "score_mean": (i as f64 * 0.9).sin(),
                "n_total": 1 + i % 4,
            })
        })
        .collect();
    fs::write(records.join("AAA.json"), serde_json::to_string(&aaa).unwrap()).unwrap();
    for (i, d) in days.iter().enumerate().step_by(2) {
        let record = serde_json::json!({ "sentiment": (i as f64 * 0.4).cos(), "count": 2 });
        fs::write(
            records.join("BBB").join(format!("{d}.json")),
            record.to_string(),
        )
        .unwrap();
    }
    fs::write(records.join("broken.json"), "{ not json").unwrap();

    let events = [
        r#"{"ticker":"ccc","published_at":"2024-01-02T10:00:00-05:00","scores":{"positive":0.8,"negative":0.1,"neutral":0.1},"confidence":0.9}"#,
        r#"{"symbol":"CCC","timestamp":"2024-01-03 17:30:00","pos":0.2,"neg":0.7,"neu":0.1}"#,
        r#"{"ticker":"CCC","published_at":"yesterday","positive":0.5,"negative":0.5}"#,
        r#"{"ticker":"CCC","published_at":"2024-01-04T09:00:00Z""#,
    ];
    fs::write(root.join("events.jsonl"), events.join("\n")).unwrap();

    fs::write(
        root.join("universe.toml"),
        r#"
[tickers.AAA]
sector = "Technology"
market_cap = 2.0e12

[tickers.bbb]
sector = "Technology"
market_cap = 1.0e12

[tickers.CCC]
sector = "Energy"

[tickers.EEE]
"#,
    )
    .unwrap();

    Fixture { _dir: dir, root }
}

fn config(root: &Path) -> PipelineConfig {
    PipelineConfig {
        portfolios: vec![
            PortfolioConfig {
                name: "top1".into(),
                strategy: StrategySpec::TopN {
                    top_n: 1,
                    min_names: 2,
                },
                record_holdings: false,
            },
            PortfolioConfig {
                name: "weekly_ls".into(),
                strategy: StrategySpec::WeeklyLongShort {
                    k: 1,
                    gross: 1.0,
                    long_short: true,
                },
                record_holdings: true,
            },
        ],
        benchmark: BenchmarkConfig {
            ticker: Some("spy".into()),
        },
        paths: PathsConfig {
            prices_dir: root.join("prices"),
            records_dir: Some(root.join("records")),
            events_path: Some(root.join("events.jsonl")),
            universe_path: Some(root.join("universe.toml")),
            output_dir: root.join("out"),
        },
        ..PipelineConfig::default()
    }
}

#[test]
fn pipeline_loads_mixed_inputs_and_counts_skips() {
    let fx = fixture();
    let report = run_pipeline(&config(&fx.root)).unwrap();

    // AAA, BBB, CCC, EEE in the universe plus the SPY benchmark; DDD is ignored.
    assert_eq!(report.load.price_files, 5);
    assert_eq!(report.load.price_files_skipped, 1);
    assert!(!report.load.universe_derived);

    assert_eq!(report.load.record_files_skipped, 1);
    assert_eq!(report.load.records_loaded, DAYS + DAYS / 2);

    assert_eq!(report.load.events_loaded, 3);
    assert_eq!(report.load.events_skipped, 1);
    assert_eq!(report.load.events_without_time, 1);
    assert_eq!(report.aggregation.events_used, 2);
    assert_eq!(report.aggregation.missing_timestamp, 1);

    assert_eq!(report.index.universe_size, 4);
    assert_eq!(report.index.tickers_with_signal, 3);
    assert_eq!(report.as_of, trading_days().last().copied());
    assert!(report.index.tickers.iter().all(|t| t.ticker != "SPY"));
}

#[test]
fn events_roll_over_the_close() {
    let fx = fixture();
    let report = run_pipeline(&config(&fx.root)).unwrap();
    let ccc = report
        .index
        .tickers
        .iter()
        .find(|t| t.ticker == "CCC")
        .unwrap();
    // 17:30 UTC on Jan 3 is 12:30 in New York, before the 16:00 close.
    assert_eq!(ccc.date, NaiveDate::from_ymd_opt(2024, 1, 3).unwrap());
    assert!((ccc.score - (0.2 - 0.7) * 0.7).abs() < 1e-12);
    assert_eq!(report.index.sectors.len(), 2);
}

#[test]
fn portfolios_compare_against_benchmark_ticker() {
    let fx = fixture();
    let report = run_pipeline(&config(&fx.root)).unwrap();
    assert_eq!(report.portfolios.len(), 2);

    for p in &report.portfolios {
        assert_eq!(
            p.benchmark.source,
            BenchmarkSource::Ticker {
                ticker: "SPY".into()
            }
        );
        assert!(p.benchmark.observations > 0);
        assert!(p.metrics.is_computed());
        let m = p.metrics.computed().unwrap();
        assert!(m.max_drawdown <= 0.0);
        assert!((0.0..=1.0).contains(&m.hit_ratio));
    }

    let top1 = &report.portfolios[0];
    assert!(top1.holdings.is_none());
    assert!(top1.daily_returns.iter().all(|r| r.names == 1));

    let weekly = &report.portfolios[1];
    let holdings = weekly.holdings.as_ref().unwrap();
    assert!(!holdings.is_empty());
    for rebalance in holdings {
        let gross: f64 = rebalance.holdings.iter().map(|h| h.weight.abs()).sum();
        assert!((gross - 1.0).abs() < 1e-12);
    }
}

#[test]
fn research_reports_each_model_independently() {
    let fx = fixture();
    let report = run_pipeline(&config(&fx.root)).unwrap();
    let research = &report.research;

    assert!(research.series.len() >= 30);
    assert!(research.time_series.is_computed());
    // Three tickers over sixty days stays under the panel minimum.
    assert!(matches!(
        research.panel,
        Outcome::InsufficientData { required: 200, .. }
    ));
    assert_eq!(research.quantiles.len(), 3);
    assert!(research
        .conclusions
        .iter()
        .any(|c| c.contains("required")));
}

#[test]
fn export_writes_versioned_artifacts_atomically() {
    let fx = fixture();
    let config = config(&fx.root);
    let written = run_and_export(&config).unwrap();

    let names: Vec<String> = written
        .iter()
        .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
        .collect();
    assert_eq!(
        names,
        [
            "index.json",
            "portfolio_top1.json",
            "portfolio_top1_equity.csv",
            "portfolio_weekly_ls.json",
            "portfolio_weekly_ls_equity.csv",
            "research.json",
        ]
    );
    let out = &config.paths.output_dir;
    assert!(fs::read_dir(out)
        .unwrap()
        .all(|e| !e.unwrap().path().to_string_lossy().ends_with(".tmp")));

    let index = read_artifact::<IndexSummary>(&out.join("index.json")).unwrap();
    assert_eq!(index.schema_version, SCHEMA_VERSION);
    assert_eq!(index.config_hash, config.config_hash().unwrap());
    assert_eq!(index.payload.universe_size, 4);

    let top1 = read_artifact::<PortfolioReport>(&out.join("portfolio_top1.json")).unwrap();
    assert_eq!(top1.payload.name, "top1");
    let research = read_artifact::<ResearchReport>(&out.join("research.json")).unwrap();
    assert!(!research.payload.series.is_empty());

    let csv = fs::read_to_string(out.join("portfolio_top1_equity.csv")).unwrap();
    assert!(csv.starts_with("date,return,equity,names\n"));
    assert_eq!(csv.lines().count(), top1.payload.equity_curve.len() + 1);
}

#[test]
fn rerun_is_byte_identical() {
    let fx = fixture();
    let config = config(&fx.root);
    let first: Vec<Vec<u8>> = run_and_export(&config)
        .unwrap()
        .iter()
        .map(|p| fs::read(p).unwrap())
        .collect();
    let second: Vec<Vec<u8>> = run_and_export(&config)
        .unwrap()
        .iter()
        .map(|p| fs::read(p).unwrap())
        .collect();
    assert_eq!(first, second);
}

#[test]
fn missing_universe_is_derived_from_prices() {
    let fx = fixture();
    let mut config = config(&fx.root);
    config.paths.universe_path = None;
    let report = run_pipeline(&config).unwrap();

    assert!(report.load.universe_derived);
    // AAA, BBB, CCC, DDD; SPY is the benchmark and EEE had no usable rows.
    assert_eq!(report.index.universe_size, 4);
    assert!(report.index.sectors.is_empty());
}

#[test]
fn invalid_config_is_rejected_before_loading() {
    let fx = fixture();
    let mut config = config(&fx.root);
    config.signal.ema_span = 0;
    assert!(run_pipeline(&config).is_err());
}

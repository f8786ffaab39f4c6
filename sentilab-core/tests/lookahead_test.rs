//! Look-ahead contamination tests.
//!
//! Invariant: nothing the simulator reports for trading day t may change when
//! data after t is appended.
//!
//! Method: build prices and signals for 120 days, run the pipeline on the
//! first 60 days and on all 120, and compare the overlapping output. Forward
//! returns need close(t+1), so the truncated run gets one extra bar of prices
//! and nothing else.

use std::collections::BTreeMap;

use chrono::{Duration, NaiveDate};
use sentilab_core::aggregate::aggregate_daily;
use sentilab_core::calendar::TradingCalendar;
use sentilab_core::domain::{PriceBar, SentimentEvent, SentimentScores};
use sentilab_core::portfolio::{simulate, PortfolioRun, StrategySpec};
use sentilab_core::returns::ReturnPanel;
use sentilab_core::signal::AlignedSignals;

const TICKERS: [&str; 5] = ["AAA", "BBB", "CCC", "DDD", "EEE"];

fn day(i: usize) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 1).unwrap() + Duration::days(i as i64)
}

/// Deterministic pseudo-random value in [-1, 1) from a simple LCG.
fn lcg(i: usize, salt: u64) -> f64 {
    let seed = (i as u64 ^ salt)
        .wrapping_mul(6_364_136_223_846_793_005)
        .wrapping_add(1_442_695_040_888_963_407);
    ((seed >> 33) % 2000) as f64 / 1000.0 - 1.0
}

fn prices(days: usize) -> BTreeMap<String, Vec<PriceBar>> {
    TICKERS
        .iter()
        .enumerate()
        .map(|(t, ticker)| {
            let mut close = 100.0;
            let bars = (0..days)
                .map(|i| {
                    close *= 1.0 + 0.02 * lcg(i, t as u64 + 1);
                    PriceBar {
                        date: day(i),
                        open: None,
                        close,
                    }
                })
                .collect();
            (ticker.to_string(), bars)
        })
        .collect()
}

fn signals(days: usize) -> BTreeMap<String, Vec<(NaiveDate, f64)>> {
    TICKERS
        .iter()
        .enumerate()
        .map(|(t, ticker)| {
            // Sparse: roughly one signal every third day.
            let points = (0..days)
                .filter(|i| (i + t) % 3 == 0)
                .map(|i| (day(i), lcg(i, 100 + t as u64)))
                .collect();
            (ticker.to_string(), points)
        })
        .collect()
}

fn run(spec: &StrategySpec, price_days: usize, signal_days: usize) -> PortfolioRun {
    let panel = ReturnPanel::build(&prices(price_days), spec.return_convention());
    let aligned = AlignedSignals::build(&signals(signal_days), &panel.dates);
    simulate(spec, &aligned, &panel)
}

fn assert_prefix(spec: &StrategySpec, truncated: &PortfolioRun, full: &PortfolioRun) {
    assert!(!truncated.points.is_empty(), "{}: empty truncated run", spec.label());
    for (a, b) in truncated.points.iter().zip(&full.points) {
        assert_eq!(a, b, "{}: point on {} changed", spec.label(), a.date);
    }
    for (a, b) in truncated.rebalances.iter().zip(&full.rebalances) {
        assert_eq!(a, b, "{}: rebalance on {} changed", spec.label(), a.date);
    }
}

#[test]
fn top_n_has_no_lookahead() {
    let spec = StrategySpec::TopN {
        top_n: 2,
        min_names: 3,
    };
    let truncated = run(&spec, 61, 60);
    let full = run(&spec, 120, 120);
    assert_eq!(truncated.points.last().map(|p| p.date), Some(day(59)));
    assert_prefix(&spec, &truncated, &full);
}

#[test]
fn weekly_long_short_has_no_lookahead() {
    let spec = StrategySpec::WeeklyLongShort {
        k: 2,
        gross: 1.0,
        long_short: true,
    };
    let truncated = run(&spec, 60, 60);
    let full = run(&spec, 120, 120);
    assert_prefix(&spec, &truncated, &full);
}

#[test]
fn weekly_ignores_same_day_signal() {
    let spec = StrategySpec::WeeklyLongShort {
        k: 1,
        gross: 1.0,
        long_short: true,
    };
    let panel = ReturnPanel::build(&prices(30), spec.return_convention());
    let mut raw = signals(30);
    let baseline = simulate(&spec, &AlignedSignals::build(&raw, &panel.dates), &panel);

    // Overwrite every signal dated on a rebalance day itself.
    let rebalance_days: Vec<NaiveDate> = baseline.rebalances.iter().map(|r| r.date).collect();
    for (t, points) in raw.values_mut().enumerate() {
        for &date in &rebalance_days {
            points.retain(|p| p.0 != date);
            points.push((date, 10.0 * (t as f64 + 1.0)));
        }
        points.sort_by_key(|p| p.0);
    }
    let shocked = simulate(&spec, &AlignedSignals::build(&raw, &panel.dates), &panel);
    assert_eq!(baseline.rebalances, shocked.rebalances);
}

#[test]
fn event_rollover_is_prefix_stable() {
    let calendar = TradingCalendar::default();
    let events: Vec<SentimentEvent> = (0..200)
        .map(|i| SentimentEvent {
            ticker: TICKERS[i % TICKERS.len()].to_string(),
            published_at: Some(
                (day(i / 4).and_hms_opt(0, 0, 0).unwrap() + Duration::hours(((i * 7) % 24) as i64))
                    .and_utc()
                    .fixed_offset(),
            ),
            scores: SentimentScores {
                positive: 0.5 + 0.4 * lcg(i, 7),
                negative: 0.3,
                neutral: 0.2,
            },
            confidence: 0.8,
        })
        .collect();

    let full = aggregate_daily(&events, &calendar, 3);
    let partial = aggregate_daily(&events[..100], &calendar, 3);
    let cutoff = day(24);
    for p in partial.points.iter().filter(|p| p.date < cutoff) {
        let q = full
            .points
            .iter()
            .find(|q| q.ticker == p.ticker && q.date == p.date)
            .unwrap();
        assert_eq!(p, q);
    }
}

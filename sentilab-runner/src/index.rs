//! Index summary: the market-wide snapshot over every ticker's latest signal.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sentilab_core::signal::SignalField;

use crate::metrics::mean_f64;
use crate::series::TickerSeries;

/// Latest known signal for one ticker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickerLastSignal {
    pub ticker: String,
    pub sector: Option<String>,
    pub field: Option<SignalField>,
    pub date: NaiveDate,
    pub score: f64,
    pub smoothed: f64,
    pub delta: Option<f64>,
    pub news_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectorSentiment {
    pub sector: String,
    pub tickers: usize,
    pub mean_signal: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexSummary {
    /// Last trading date in the price data.
    pub as_of: Option<NaiveDate>,
    pub universe_size: usize,
    pub tickers_with_signal: usize,
    /// News items over every signal day of every ticker.
    pub total_news: usize,
    pub signal_days: usize,
    /// Mean of the last signals; `None` when no ticker has a signal.
    pub equal_weighted_sentiment: Option<f64>,
    /// Market-cap weighted mean over tickers with both a signal and a cap.
    pub cap_weighted_sentiment: Option<f64>,
    pub cap_weighted_tickers: usize,
    pub sectors: Vec<SectorSentiment>,
    pub tickers: Vec<TickerLastSignal>,
}

impl IndexSummary {
    pub fn build(series: &[TickerSeries], universe_size: usize, as_of: Option<NaiveDate>) -> Self {
        let tickers: Vec<TickerLastSignal> = series
            .iter()
            .filter_map(|s| {
                let last = s.last_point()?;
                Some(TickerLastSignal {
                    ticker: s.ticker.clone(),
                    sector: s.sector.clone(),
                    field: s.field,
                    date: last.date,
                    score: last.score,
                    smoothed: last.smoothed,
                    delta: last.delta,
                    news_count: last.news_count,
                })
            })
            .collect();

        let last_scores: Vec<f64> = tickers.iter().map(|t| t.score).collect();
        let equal_weighted_sentiment = (!last_scores.is_empty()).then(|| mean_f64(&last_scores));

        let capped: Vec<(f64, f64)> = series
            .iter()
            .filter_map(|s| {
                let cap = s.market_cap.filter(|c| c.is_finite() && *c > 0.0)?;
                Some((cap, s.last_point()?.score))
            })
            .collect();
        let cap_total: f64 = capped.iter().map(|(cap, _)| cap).sum();
        let cap_weighted_sentiment = (cap_total > 0.0)
            .then(|| capped.iter().map(|(cap, score)| cap * score).sum::<f64>() / cap_total);

        let mut by_sector: BTreeMap<&str, Vec<f64>> = BTreeMap::new();
        for t in &tickers {
            if let Some(sector) = t.sector.as_deref() {
                by_sector.entry(sector).or_default().push(t.score);
            }
        }
        let sectors = by_sector
            .into_iter()
            .map(|(sector, scores)| SectorSentiment {
                sector: sector.to_string(),
                tickers: scores.len(),
                mean_signal: mean_f64(&scores),
            })
            .collect();

        Self {
            as_of,
            universe_size,
            tickers_with_signal: tickers.len(),
            total_news: series.iter().map(TickerSeries::total_news).sum(),
            signal_days: series.iter().map(|s| s.points.len()).sum(),
            equal_weighted_sentiment,
            cap_weighted_sentiment,
            cap_weighted_tickers: capped.len(),
            sectors,
            tickers,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sentilab_core::domain::DailySignalPoint;

    fn series(ticker: &str, sector: Option<&str>, cap: Option<f64>, scores: &[f64]) -> TickerSeries {
        let points = scores
            .iter()
            .enumerate()
            .map(|(i, &score)| DailySignalPoint {
                ticker: ticker.into(),
                date: NaiveDate::from_ymd_opt(2024, 1, 2 + i as u32).unwrap(),
                score,
                news_count: 2,
                smoothed: score,
                delta: None,
            })
            .collect();
        TickerSeries {
            ticker: ticker.into(),
            sector: sector.map(String::from),
            market_cap: cap,
            field: Some(SignalField::Score),
            points,
            records_skipped: 0,
            prices: Vec::new(),
        }
    }

    #[test]
    fn summarizes_last_signals() {
        let all = vec![
            series("AAPL", Some("Tech"), Some(3.0), &[0.1, 0.4]),
            series("MSFT", Some("Tech"), Some(1.0), &[0.0]),
            series("XOM", Some("Energy"), None, &[-0.2]),
            series("NEW", None, None, &[]),
        ];
        let summary = IndexSummary::build(&all, 4, None);
        assert_eq!(summary.universe_size, 4);
        assert_eq!(summary.tickers_with_signal, 3);
        assert_eq!(summary.total_news, 8);
        assert_eq!(summary.signal_days, 4);
        assert!((summary.equal_weighted_sentiment.unwrap() - 0.2 / 3.0).abs() < 1e-12);
        // (3 * 0.4 + 1 * 0.0) / 4
        assert!((summary.cap_weighted_sentiment.unwrap() - 0.3).abs() < 1e-12);
        assert_eq!(summary.cap_weighted_tickers, 2);
        assert_eq!(summary.sectors.len(), 2);
        assert_eq!(summary.sectors[0].sector, "Energy");
        assert!((summary.sectors[1].mean_signal - 0.2).abs() < 1e-12);
        assert_eq!(summary.tickers[0].ticker, "AAPL");
        assert_eq!(summary.tickers[0].score, 0.4);
    }

    #[test]
    fn unusable_caps_are_left_out_of_cap_weighting() {
        let all = vec![
            series("AAA", None, Some(2.0), &[0.5]),
            series("BBB", None, Some(-5.0), &[-1.0]),
            series("CCC", None, Some(f64::NAN), &[-1.0]),
            series("DDD", None, Some(0.0), &[-1.0]),
        ];
        let summary = IndexSummary::build(&all, 4, None);
        assert_eq!(summary.cap_weighted_tickers, 1);
        assert_eq!(summary.cap_weighted_sentiment, Some(0.5));

        let negative_only = vec![series("BBB", None, Some(-5.0), &[-1.0])];
        let summary = IndexSummary::build(&negative_only, 1, None);
        assert_eq!(summary.cap_weighted_sentiment, None);
        assert_eq!(summary.cap_weighted_tickers, 0);
    }

    #[test]
    fn empty_universe_has_no_sentiment() {
        let summary = IndexSummary::build(&[], 0, None);
        assert_eq!(summary.equal_weighted_sentiment, None);
        assert_eq!(summary.cap_weighted_sentiment, None);
        assert!(summary.tickers.is_empty());
    }
}

//! Trading calendar: maps event timestamps to effective trading dates.
//!
//! An event published after `close - cutoff` on day D is actionable on D+1,
//! otherwise on D. The rollover is by calendar day: a Friday evening event lands
//! on Saturday, and downstream alignment carries it onto the next trading day.

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, NaiveDateTime, TimeZone};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

pub const DEFAULT_CLOSE_HOUR: u32 = 16;

/// Local trading-calendar settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TradingCalendar {
    /// IANA timezone of the exchange (e.g. `America/New_York`).
    pub timezone: Tz,
    /// Hour of the daily close in local time.
    pub close_hour: u32,
    /// Minutes before the close after which news rolls to the next day.
    pub cutoff_minutes: i64,
}

impl Default for TradingCalendar {
    fn default() -> Self {
        Self {
            timezone: chrono_tz::America::New_York,
            close_hour: DEFAULT_CLOSE_HOUR,
            cutoff_minutes: 0,
        }
    }
}

impl TradingCalendar {
    pub fn new(timezone: Tz, close_hour: u32, cutoff_minutes: i64) -> Self {
        Self {
            timezone,
            close_hour,
            cutoff_minutes,
        }
    }

    /// Local wall-clock instant after which events on `day` roll forward.
    ///
    /// The cutoff is clamped to `[0, close]`, so the threshold never leaves `day`.
    pub fn threshold(&self, day: NaiveDate) -> NaiveDateTime {
        let midnight = day.and_time(chrono::NaiveTime::MIN);
        let close = i64::from(self.close_hour.min(24)) * 60;
        let minutes = close - self.cutoff_minutes.clamp(0, close);
        midnight
            .checked_add_signed(Duration::minutes(minutes))
            .unwrap_or(midnight)
    }

    /// Effective trading date of an event timestamp.
    ///
    /// The threshold is exclusive: an event exactly at `close - cutoff`
    /// stays on its own date.
    pub fn effective_date<Z: TimeZone>(&self, ts: &DateTime<Z>) -> NaiveDate {
        let local = ts.with_timezone(&self.timezone).naive_local();
        let day = local.date();
        if local > self.threshold(day) {
            day.succ_opt().unwrap_or(day)
        } else {
            day
        }
    }

    /// Parse a raw timestamp and resolve its effective date.
    /// Malformed input yields `None`.
    pub fn effective_date_str(&self, raw: &str) -> Option<NaiveDate> {
        parse_timestamp(raw).map(|ts| self.effective_date(&ts))
    }
}

const OFFSET_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M:%S%:z",
    "%Y-%m-%d %H:%M:%S%z",
    "%Y-%m-%d %H:%M:%S%.f%:z",
    "%Y-%m-%dT%H:%M:%S%z",
];

const NAIVE_FORMATS: [&str; 5] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
];

/// Parse an upstream timestamp.
///
/// Accepts RFC 3339, space-separated timestamps with an offset, and naive
/// timestamps or bare dates, which are read as UTC. Returns `None` (the
/// null-time sentinel) for anything else.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<FixedOffset>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts);
    }
    for fmt in OFFSET_FORMATS {
        if let Ok(ts) = DateTime::parse_from_str(raw, fmt) {
            return Some(ts);
        }
    }
    for fmt in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(naive.and_utc().fixed_offset());
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .map(|d| d.and_time(chrono::NaiveTime::MIN).and_utc().fixed_offset())
}

//! SentiLab Core: turns irregular news sentiment into daily trading signals
//! and simulates portfolios on them.
//!
//! This crate contains the computational heart of the pipeline:
//! - Domain types (sentiment events, daily signal points, price bars)
//! - Trading calendar with pre-close cutoff rollover
//! - Daily aggregation with EMA smoothing and deltas
//! - Field-preference resolution and LOCF alignment onto trading days
//! - Return panels (trading-day universe)
//! - Portfolio simulator (Top-N and weekly long/short)
//!
//! Everything here is deterministic and free of I/O beyond parsing universe
//! TOML. Problems in the data never surface as errors: they are skipped and
//! counted in diagnostics.

pub mod aggregate;
pub mod calendar;
pub mod data;
pub mod domain;
pub mod outcome;
pub mod portfolio;
pub mod returns;
pub mod signal;
pub mod smoothing;

pub use outcome::Outcome;

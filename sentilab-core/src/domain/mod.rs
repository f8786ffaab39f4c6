//! Domain types shared by every stage of the pipeline.

pub mod bar;
pub mod event;
pub mod signal;

pub use bar::PriceBar;
pub use event::{SentimentEvent, SentimentScores};
pub use signal::DailySignalPoint;

/// Ticker symbol alias
pub type Ticker = String;

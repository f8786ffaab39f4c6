//! Reference data shared by the pipeline.

pub mod universe;

pub use universe::{Member, Universe, UniverseError};

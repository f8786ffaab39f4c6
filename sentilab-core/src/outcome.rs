//! Outcome: best-effort result marker for statistics that may not be computable.
//!
//! Statistics never abort the batch. A model that lacks observations reports
//! `InsufficientData`; a model whose fit breaks down reports `Failed` with the
//! reason inline. Both serialize next to successful results under a `status` tag.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome<T> {
    Computed(T),
    InsufficientData { required: usize, available: usize },
    Failed { error: String },
}

impl<T> Outcome<T> {
    /// Guard helper: `InsufficientData` unless `available >= required`.
    pub fn require(required: usize, available: usize) -> Result<(), Self> {
        if available < required {
            Err(Self::InsufficientData {
                required,
                available,
            })
        } else {
            Ok(())
        }
    }

    pub fn computed(&self) -> Option<&T> {
        match self {
            Self::Computed(value) => Some(value),
            _ => None,
        }
    }

    pub fn is_computed(&self) -> bool {
        matches!(self, Self::Computed(_))
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Outcome<U> {
        match self {
            Self::Computed(value) => Outcome::Computed(f(value)),
            Self::InsufficientData {
                required,
                available,
            } => Outcome::InsufficientData {
                required,
                available,
            },
            Self::Failed { error } => Outcome::Failed { error },
        }
    }
}

impl<T, E: std::fmt::Display> From<Result<T, E>> for Outcome<T> {
    fn from(result: Result<T, E>) -> Self {
        match result {
            Ok(value) => Self::Computed(value),
            Err(e) => Self::Failed {
                error: e.to_string(),
            },
        }
    }
}

//! Signal construction: canonical records, field preference, LOCF alignment.

pub mod locf;
pub mod preference;

pub use locf::{locf_align, AlignedSignals};
pub use preference::{
    resolve_field, resolve_series, ResolvedSeries, SignalField, SignalRecord,
    DEFAULT_FIELD_PREFERENCE,
};

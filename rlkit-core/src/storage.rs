//! Fixed-capacity ring storage of transitions.
//!
//! A [`DictStorage`] holds one column per field described by a
//! [`DataSpec`]. Dense columns are preallocated arrays of shape
//! `[capacity, ...]`. Object columns hold [`LazyFrames`], stacks of frames
//! shared between overlapping observations, and are materialized into
//! dense arrays only when sampled.
//!
//! After adding `b` items the write pointer becomes `(ptr + b) % capacity`
//! and the size becomes `min(size + b, capacity)`; the oldest items are
//! overwritten first.
mod batch;
mod column;
mod dict_storage;
mod spec;
pub use batch::{Batch, FieldBatch};
pub use column::{FieldData, LazyFrames};
pub use dict_storage::DictStorage;
pub use spec::{DataSpec, FieldSpec};

/// Observation field.
pub const OBS: &str = "obs";

/// Action field.
pub const ACT: &str = "act";

/// Next-observation field.
pub const NEXT_OBS: &str = "next_obs";

/// Reward field.
pub const REW: &str = "rew";

/// Terminal flag field, `1.0` for terminal transitions.
pub const DONE: &str = "done";

//! Records of training metrics.
//!
//! Samplers, agents and runners describe what happened as a [`Record`],
//! a set of named [`RecordValue`]s. Records are passed to a [`Recorder`],
//! which either writes them immediately or stores them and writes
//! aggregates on flush.
//!
//! ```rust
//! use rlkit_core::record::{BufferedRecorder, Record, Recorder};
//!
//! let mut recorder = BufferedRecorder::new();
//! recorder.store(Record::from_scalar("LossQ", 1.0));
//! recorder.store(Record::from_scalar("LossQ", 3.0));
//! recorder.flush(1);
//!
//! let (_, record) = &recorder.flushed()[0];
//! assert_eq!(record.get_scalar("LossQ_mean").unwrap(), 2.0);
//! ```
mod aggregate_recorder;
mod base;
mod buffered_recorder;
mod null_recorder;
mod recorder;
mod storage;

pub use aggregate_recorder::AggregateRecorder;
pub use base::{Record, RecordValue};
pub use buffered_recorder::BufferedRecorder;
pub use null_recorder::NullRecorder;
pub use recorder::Recorder;
pub use storage::RecordStorage;

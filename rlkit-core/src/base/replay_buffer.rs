//! Interfaces of replay buffers.
use crate::storage::{Batch, FieldBatch};
use anyhow::Result;

/// A buffer that receives transitions from a sampler.
pub trait ExperienceBufferBase {
    /// Adds a batch of transitions and returns the indices they were written to.
    fn add(&mut self, batch: FieldBatch) -> Result<Vec<usize>>;

    /// Number of valid transitions.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Forgets every transition. Capacity is kept.
    fn reset(&mut self);
}

/// A buffer from which an updater draws training batches.
pub trait ReplayBufferBase: ExperienceBufferBase {
    /// Samples a batch of the configured batch size.
    fn sample(&mut self) -> Result<Batch>;

    /// Returns every valid transition.
    fn get(&self) -> Result<Batch>;

    /// Whether samples carry importance weights and indices.
    fn is_prioritized(&self) -> bool {
        false
    }

    /// Updates the priorities of the transitions at `ixs`.
    ///
    /// Buffers without priorities ignore the call.
    fn update_priority(&mut self, ixs: &[usize], td_err: &[f32]) -> Result<()> {
        let _ = (ixs, td_err);
        Ok(())
    }
}

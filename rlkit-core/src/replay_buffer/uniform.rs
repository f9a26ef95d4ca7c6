use super::ReplayBufferConfig;
use crate::{
    storage::{Batch, DataSpec, DictStorage, FieldBatch},
    ExperienceBufferBase, ReplayBufferBase,
};
use anyhow::Result;
use rand::{rngs::StdRng, SeedableRng};

/// Replay buffer sampling uniformly with replacement.
pub struct UniformReplayBuffer {
    storage: DictStorage,
    batch_size: usize,
    rng: StdRng,
}

impl UniformReplayBuffer {
    pub fn build(config: &ReplayBufferConfig, spec: DataSpec) -> Result<Self> {
        Ok(Self {
            storage: DictStorage::new(spec, config.capacity)?,
            batch_size: config.batch_size,
            rng: StdRng::seed_from_u64(config.seed),
        })
    }

    pub fn storage(&self) -> &DictStorage {
        &self.storage
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }
}

impl ExperienceBufferBase for UniformReplayBuffer {
    fn add(&mut self, batch: FieldBatch) -> Result<Vec<usize>> {
        self.storage.add(batch)
    }

    fn len(&self) -> usize {
        self.storage.len()
    }

    fn reset(&mut self) {
        self.storage.reset();
    }
}

impl ReplayBufferBase for UniformReplayBuffer {
    fn sample(&mut self) -> Result<Batch> {
        let ixs = self.storage.sample_indices(self.batch_size, &mut self.rng)?;
        Ok(self.storage.gather(&ixs)?.with_indices(ixs))
    }

    fn get(&self) -> Result<Batch> {
        self.storage.get()
    }
}

use super::{IwScheduler, PerConfig, ReplayBufferConfig, SumTree};
use crate::{
    error::RlError,
    storage::{Batch, DataSpec, DictStorage, FieldBatch},
    ExperienceBufferBase, ReplayBufferBase,
};
use anyhow::{ensure, Result};

/// Prioritized experience replay.
///
/// New transitions receive the largest priority seen so far. Sampled
/// batches carry their storage indices and importance weights, and the
/// priorities are refreshed with [`ReplayBufferBase::update_priority`].
pub struct PrioritizedReplayBuffer {
    storage: DictStorage,
    batch_size: usize,
    per_config: PerConfig,
    seed: u64,
    sum_tree: SumTree,
    iw_scheduler: IwScheduler,
}

impl PrioritizedReplayBuffer {
    /// Builds the buffer. `config.per_config` falls back to its default when unset.
    pub fn build(config: &ReplayBufferConfig, spec: DataSpec) -> Result<Self> {
        let per_config = config.per_config.clone().unwrap_or_default();
        let storage = DictStorage::new(spec, config.capacity)?;
        Ok(Self {
            sum_tree: SumTree::new(config.capacity, per_config.alpha, config.seed),
            iw_scheduler: IwScheduler::new(
                per_config.beta_0,
                per_config.beta_final,
                per_config.n_opts_final,
            ),
            storage,
            batch_size: config.batch_size,
            per_config,
            seed: config.seed,
        })
    }

    pub fn storage(&self) -> &DictStorage {
        &self.storage
    }

    /// Current exponent of importance weights.
    pub fn beta(&self) -> f32 {
        self.iw_scheduler.beta()
    }
}

impl ExperienceBufferBase for PrioritizedReplayBuffer {
    fn add(&mut self, batch: FieldBatch) -> Result<Vec<usize>> {
        let ixs = self.storage.add(batch)?;
        for &ix in ixs.iter() {
            self.sum_tree.add(ix)?;
        }
        Ok(ixs)
    }

    fn len(&self) -> usize {
        self.storage.len()
    }

    fn reset(&mut self) {
        self.storage.reset();
        self.sum_tree = SumTree::new(self.storage.capacity(), self.per_config.alpha, self.seed);
    }
}

impl ReplayBufferBase for PrioritizedReplayBuffer {
    fn sample(&mut self) -> Result<Batch> {
        if self.storage.is_empty() {
            return Err(RlError::EmptyStorage.into());
        }
        if self.batch_size == 0 {
            return Err(RlError::ZeroBatchSize.into());
        }
        let (ixs, ws) = self.sum_tree.sample(self.batch_size, self.iw_scheduler.beta());
        Ok(self
            .storage
            .gather(&ixs)?
            .with_indices(ixs)
            .with_weights(ws))
    }

    fn get(&self) -> Result<Batch> {
        self.storage.get()
    }

    fn is_prioritized(&self) -> bool {
        true
    }

    fn update_priority(&mut self, ixs: &[usize], td_err: &[f32]) -> Result<()> {
        ensure!(
            ixs.len() == td_err.len(),
            "{} indices but {} TD errors",
            ixs.len(),
            td_err.len()
        );
        for (&ix, &td) in ixs.iter().zip(td_err.iter()) {
            self.sum_tree.update(ix, td.abs())?;
        }
        self.iw_scheduler.add_n_opts();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{FieldSpec, OBS, REW};
    use ndarray::{Array1, Array2};

    fn buffer(capacity: usize, batch_size: usize) -> Result<PrioritizedReplayBuffer> {
        let spec = DataSpec::new()
            .with(OBS, FieldSpec::dense(vec![1]))
            .with(REW, FieldSpec::dense(vec![]));
        let config = ReplayBufferConfig::default()
            .capacity(capacity)
            .batch_size(batch_size)
            .per_config(Some(PerConfig::default().alpha(1.0).n_opts_final(10)));
        PrioritizedReplayBuffer::build(&config, spec)
    }

    fn items(b: usize) -> FieldBatch {
        FieldBatch::new()
            .with(OBS, Array2::from_shape_fn((b, 1), |(i, _)| i as f32).into_dyn())
            .with(REW, Array1::from_shape_fn(b, |i| i as f32).into_dyn())
    }

    #[test]
    fn test_sample_carries_indices_and_weights() -> Result<()> {
        let mut buffer = buffer(8, 32)?;
        assert!(buffer.sample().is_err());
        buffer.add(items(4))?;

        let batch = buffer.sample()?;
        assert_eq!(batch.len(), 32);
        assert_eq!(batch.indices().map(|ixs| ixs.len()), Some(32));
        // Every transition starts with the same priority.
        let weights = batch.weights().unwrap();
        assert!(weights.iter().all(|w| (*w - 1.0).abs() < 1e-5));
        assert!(batch.indices().unwrap().iter().all(|&ix| ix < 4));
        Ok(())
    }

    #[test]
    fn test_update_priority_shifts_sampling() -> Result<()> {
        let mut buffer = buffer(4, 1000)?;
        buffer.add(items(4))?;
        buffer.update_priority(&[0, 1, 2, 3], &[9.0, -0.1, 0.1, 0.1])?;
        assert!(buffer.beta() > 0.4);

        let batch = buffer.sample()?;
        let ixs = batch.indices().unwrap();
        let n0 = ixs.iter().filter(|&&ix| ix == 0).count();
        assert!(n0 > 900);

        // Rows follow the sampled indices.
        let rew = batch.rew()?;
        for (i, &ix) in ixs.iter().enumerate() {
            assert_eq!(rew[[i]], ix as f32);
        }

        assert!(buffer.update_priority(&[0], &[1.0, 2.0]).is_err());
        Ok(())
    }
}

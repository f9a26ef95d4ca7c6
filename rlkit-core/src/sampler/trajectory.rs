use super::{ActionSelector, BatchSampler, Sampler};
use crate::{record::Record, ExperienceBufferBase, Space, VecEnv};
use anyhow::Result;

/// Sampler for on-policy learning.
///
/// Empties the buffer before collecting, so that the buffer only holds
/// transitions of the current policy. Episodes in progress continue
/// across calls.
pub struct TrajectorySampler<E: VecEnv> {
    inner: BatchSampler<E>,
}

impl<E: VecEnv> TrajectorySampler<E> {
    pub fn new(env: E) -> Self {
        Self {
            inner: BatchSampler::new(env),
        }
    }

    pub fn env(&self) -> &E {
        self.inner.env()
    }
}

impl<E: VecEnv> Sampler for TrajectorySampler<E> {
    fn sample(
        &mut self,
        num_steps: usize,
        action_selector: &mut ActionSelector<'_>,
        buffer: &mut dyn ExperienceBufferBase,
    ) -> Result<Record> {
        buffer.reset();
        self.inner.sample(num_steps, action_selector, buffer)
    }

    fn total_env_steps(&self) -> usize {
        self.inner.total_env_steps()
    }

    fn reset(&mut self) {
        self.inner.reset()
    }

    fn num_envs(&self) -> usize {
        self.inner.num_envs()
    }

    fn action_space(&self) -> &Space {
        self.inner.action_space()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        dummy::DummyVecEnv, replay_buffer::ReplayBufferConfig, storage::DataSpec,
        UniformReplayBuffer,
    };
    use ndarray::{Array2, ArrayD};

    #[test]
    fn test_buffer_holds_latest_rollout_only() -> Result<()> {
        let env = DummyVecEnv::new(2, 1, 2, 100);
        let spec = DataSpec::from_spaces(env.single_observation_space(), env.single_action_space());
        let config = ReplayBufferConfig::default().capacity(100).batch_size(4);
        let mut buffer = UniformReplayBuffer::build(&config, spec)?;
        let mut sampler = TrajectorySampler::new(env);
        let mut zeros = |obs: &ArrayD<f32>| -> Result<Array2<f32>> {
            Ok(Array2::zeros((obs.shape()[0], 1)))
        };

        sampler.sample(5, &mut zeros, &mut buffer)?;
        assert_eq!(buffer.len(), 10);
        sampler.sample(3, &mut zeros, &mut buffer)?;
        assert_eq!(buffer.len(), 6);
        assert_eq!(sampler.total_env_steps(), 16);
        Ok(())
    }
}

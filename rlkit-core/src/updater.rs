//! Gradient updates of an agent with batches drawn from a buffer.
use crate::{record::Recorder, Agent, ReplayBufferBase};
use anyhow::Result;
use log::trace;

/// Interface of updaters.
pub trait Updater {
    /// Runs the updates due at `global_step` and passes every agent record
    /// to `logger` with [`Recorder::store`].
    fn update(
        &mut self,
        global_step: usize,
        agent: &mut dyn Agent,
        buffer: &mut dyn ReplayBufferBase,
        logger: &mut dyn Recorder,
    ) -> Result<()>;

    /// Number of calls to [`Agent::train_on_batch`] made so far.
    fn num_updates(&self) -> usize;

    fn reset(&mut self);
}

/// Trains on the whole buffer once per call.
#[derive(Debug, Default, Clone)]
pub struct OnPolicyUpdater {
    num_updates: usize,
}

impl OnPolicyUpdater {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Updater for OnPolicyUpdater {
    fn update(
        &mut self,
        _global_step: usize,
        agent: &mut dyn Agent,
        buffer: &mut dyn ReplayBufferBase,
        logger: &mut dyn Recorder,
    ) -> Result<()> {
        let batch = buffer.get()?;
        let record = agent.train_on_batch(&batch, None)?;
        logger.store(record);
        self.num_updates += 1;
        Ok(())
    }

    fn num_updates(&self) -> usize {
        self.num_updates
    }

    fn reset(&mut self) {
        self.num_updates = 0;
    }
}

/// Trains on sampled batches every `update_every` steps.
///
/// When it fires, it performs `update_per_step * update_every` updates,
/// so that the ratio of gradient steps to sampling steps is
/// `update_per_step` on average. With a prioritized buffer the TD errors
/// of each batch are written back as priorities.
#[derive(Debug, Clone)]
pub struct OffPolicyUpdater {
    update_every: usize,
    update_per_step: f64,
    num_updates: usize,
}

impl OffPolicyUpdater {
    pub fn new(update_every: usize, update_per_step: f64) -> Result<Self> {
        anyhow::ensure!(update_every > 0, "update_every must be positive");
        anyhow::ensure!(
            update_per_step.is_finite() && update_per_step >= 0.0,
            "update_per_step must be non-negative, got {}",
            update_per_step
        );
        Ok(Self {
            update_every,
            update_per_step,
            num_updates: 0,
        })
    }

    /// Number of updates performed when the updater fires.
    pub fn updates_per_call(&self) -> usize {
        (self.update_per_step * self.update_every as f64) as usize
    }
}

impl Updater for OffPolicyUpdater {
    fn update(
        &mut self,
        global_step: usize,
        agent: &mut dyn Agent,
        buffer: &mut dyn ReplayBufferBase,
        logger: &mut dyn Recorder,
    ) -> Result<()> {
        if global_step % self.update_every != 0 {
            return Ok(());
        }

        for _ in 0..self.updates_per_call() {
            let batch = buffer.sample()?;
            let record = agent.train_on_batch(&batch, None)?;
            if buffer.is_prioritized() {
                if let Some(ixs) = batch.indices() {
                    let td_err = agent.compute_priority(&batch)?;
                    buffer.update_priority(ixs, &td_err)?;
                }
            }
            logger.store(record);
            self.num_updates += 1;
        }
        trace!(
            "Updated at step {}, {} updates in total",
            global_step,
            self.num_updates
        );
        Ok(())
    }

    fn num_updates(&self) -> usize {
        self.num_updates
    }

    fn reset(&mut self) {
        self.num_updates = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        dummy::{DummyAgent, DummyVecEnv},
        record::BufferedRecorder,
        replay_buffer::{PerConfig, ReplayBufferConfig},
        sampler::{BatchSampler, Sampler},
        storage::DataSpec,
        ExperienceBufferBase, PrioritizedReplayBuffer, UniformReplayBuffer, VecEnv,
    };
    use ndarray::{Array2, ArrayD};

    fn fill<B: ExperienceBufferBase>(buffer: &mut B) -> Result<()> {
        let mut sampler = BatchSampler::new(DummyVecEnv::new(2, 1, 2, 10));
        let mut zeros = |obs: &ArrayD<f32>| -> Result<Array2<f32>> {
            Ok(Array2::zeros((obs.shape()[0], 1)))
        };
        sampler.sample(10, &mut zeros, buffer)?;
        Ok(())
    }

    fn spec() -> DataSpec {
        let env = DummyVecEnv::new(2, 1, 2, 10);
        DataSpec::from_spaces(env.single_observation_space(), env.single_action_space())
    }

    #[test]
    fn test_off_policy_cadence() -> Result<()> {
        let config = ReplayBufferConfig::default().capacity(100).batch_size(8);
        let mut buffer = UniformReplayBuffer::build(&config, spec())?;
        fill(&mut buffer)?;
        let mut agent = DummyAgent::new(1);
        let mut logger = BufferedRecorder::new();
        let mut updater = OffPolicyUpdater::new(4, 0.5)?;

        for global_step in 1..=12 {
            updater.update(global_step, &mut agent, &mut buffer, &mut logger)?;
        }
        // Fires at steps 4, 8 and 12 with two updates each.
        assert_eq!(updater.num_updates(), 6);
        assert_eq!(agent.policy_updates(), 6);

        logger.flush(0);
        let record = &logger.flushed()[0].1;
        assert!(record.get_scalar("LossQ_mean").is_ok());
        Ok(())
    }

    #[test]
    fn test_fractional_updates_are_truncated() -> Result<()> {
        assert_eq!(OffPolicyUpdater::new(3, 0.5)?.updates_per_call(), 1);
        assert_eq!(OffPolicyUpdater::new(1, 2.0)?.updates_per_call(), 2);
        assert!(OffPolicyUpdater::new(0, 1.0).is_err());
        Ok(())
    }

    #[test]
    fn test_priorities_are_written_back() -> Result<()> {
        let config = ReplayBufferConfig::default()
            .capacity(100)
            .batch_size(8)
            .per_config(Some(PerConfig::default().n_opts_final(10)));
        let mut buffer = PrioritizedReplayBuffer::build(&config, spec())?;
        fill(&mut buffer)?;
        let beta_0 = buffer.beta();
        let mut agent = DummyAgent::new(1);
        let mut logger = BufferedRecorder::new();
        let mut updater = OffPolicyUpdater::new(1, 1.0)?;

        updater.update(1, &mut agent, &mut buffer, &mut logger)?;
        assert_eq!(agent.num_priority_calls(), 1);
        assert!(buffer.beta() > beta_0);
        Ok(())
    }

    #[test]
    fn test_on_policy_uses_whole_buffer() -> Result<()> {
        let config = ReplayBufferConfig::default().capacity(100).batch_size(8);
        let mut buffer = UniformReplayBuffer::build(&config, spec())?;
        fill(&mut buffer)?;
        let mut agent = DummyAgent::new(1);
        let mut logger = BufferedRecorder::new();
        let mut updater = OnPolicyUpdater::new();

        updater.update(0, &mut agent, &mut buffer, &mut logger)?;
        assert_eq!(updater.num_updates(), 1);
        assert_eq!(agent.last_batch_size(), 20);
        Ok(())
    }
}

use super::{epoch_record, is_save_epoch, save_checkpoint, RunnerConfig};
use crate::{
    record::Recorder,
    tester::Tester,
    updater::{OffPolicyUpdater, Updater},
    Agent, ReplayBufferBase, VecEnv,
};
use anyhow::Result;
use log::info;
use std::time::Instant;

/// Runs training on a fixed dataset.
///
/// The buffer is filled beforehand and never receives new transitions.
/// Each epoch performs `steps_per_epoch` runner steps of the updater,
/// then tests the agent on `test_env`.
pub struct OfflineRunner<E: VecEnv> {
    config: RunnerConfig,
    tester: Tester<E>,
    updater: OffPolicyUpdater,
    global_step: usize,
}

impl<E: VecEnv> OfflineRunner<E> {
    pub fn build(config: RunnerConfig, test_env: E) -> Result<Self> {
        let updater = OffPolicyUpdater::new(config.update_every, config.update_per_step)?;
        let tester = Tester::new(test_env, config.num_test_episodes);
        Ok(Self {
            config,
            tester,
            updater,
            global_step: 0,
        })
    }

    pub fn global_step(&self) -> usize {
        self.global_step
    }

    pub fn run<B: ReplayBufferBase>(
        &mut self,
        agent: &mut dyn Agent,
        buffer: &mut B,
        logger: &mut dyn Recorder,
    ) -> Result<()> {
        info!("Dataset size: {}", buffer.len());
        self.updater.reset();
        let start = Instant::now();

        for epoch in 1..=self.config.epochs {
            for _ in 0..self.config.steps_per_epoch {
                self.updater.update(self.global_step, agent, buffer, logger)?;
                self.global_step += 1;
            }

            self.tester.test_agent(agent, logger)?;
            let record = epoch_record(
                epoch,
                &[("GradientSteps", self.updater.num_updates() as f32)],
                &start,
                agent,
            );
            logger.store(record);
            logger.flush(epoch as i64);

            if is_save_epoch(epoch, self.config.save_freq) {
                save_checkpoint(agent, &self.config.model_dir, &format!("epoch_{}", epoch))?;
            }
        }

        save_checkpoint(agent, &self.config.model_dir, "final")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        dummy::{DummyAgent, DummyVecEnv},
        record::BufferedRecorder,
        replay_buffer::ReplayBufferConfig,
        sampler::{BatchSampler, Sampler},
        storage::DataSpec,
        ExperienceBufferBase, UniformReplayBuffer,
    };
    use ndarray::{Array2, ArrayD};

    #[test]
    fn test_offline_loop_does_not_add_data() -> Result<()> {
        let env = DummyVecEnv::new(2, 1, 2, 10);
        let spec = DataSpec::from_spaces(env.single_observation_space(), env.single_action_space());
        let mut buffer = UniformReplayBuffer::build(
            &ReplayBufferConfig::default().capacity(100).batch_size(4),
            spec,
        )?;
        let mut ones = |obs: &ArrayD<f32>| -> Result<Array2<f32>> {
            Ok(Array2::ones((obs.shape()[0], 1)))
        };
        BatchSampler::new(env).sample(10, &mut ones, &mut buffer)?;

        let config = RunnerConfig::default()
            .epochs(2)
            .steps_per_epoch(5)
            .update_every(1)
            .update_per_step(1.0)
            .num_test_episodes(1);
        let mut runner = OfflineRunner::build(config, DummyVecEnv::new(2, 1, 1, 10))?;
        let mut agent = DummyAgent::new(1);
        let mut logger = BufferedRecorder::new();

        runner.run(&mut agent, &mut buffer, &mut logger)?;
        assert_eq!(agent.policy_updates(), 10);
        assert_eq!(buffer.len(), 20);
        assert_eq!(logger.flushed()[1].1.get_scalar("GradientSteps")?, 10.0);
        Ok(())
    }
}

use super::{epoch_record, is_save_epoch, save_checkpoint, RunnerConfig};
use crate::{
    record::Recorder,
    sampler::{Sampler, TrajectorySampler},
    tester::Tester,
    updater::{OnPolicyUpdater, Updater},
    Agent, ReplayBufferBase, VecEnv,
};
use anyhow::Result;
use ndarray::{Array2, ArrayD};
use std::time::Instant;

/// Runs on-policy training.
///
/// Each epoch collects `steps_per_epoch` vectorized environment steps
/// with [`Agent::act_batch_explore`] into an emptied buffer, then trains
/// the agent once on the whole buffer.
pub struct OnPolicyRunner<E: VecEnv, T: VecEnv> {
    config: RunnerConfig,
    sampler: TrajectorySampler<E>,
    tester: Tester<T>,
    updater: OnPolicyUpdater,
    global_step: usize,
}

impl<E: VecEnv, T: VecEnv> OnPolicyRunner<E, T> {
    pub fn build(config: RunnerConfig, env: E, test_env: T) -> Self {
        let tester = Tester::new(test_env, config.num_test_episodes);
        Self {
            config,
            sampler: TrajectorySampler::new(env),
            tester,
            updater: OnPolicyUpdater::new(),
            global_step: 0,
        }
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
        self.sampler.reset();
        self.updater.reset();
        let start = Instant::now();

        for epoch in 1..=self.config.epochs {
            let global_step = self.global_step;
            let mut explore = |obs: &ArrayD<f32>| -> Result<Array2<f32>> {
                agent.act_batch_explore(obs, global_step)
            };
            let record = self
                .sampler
                .sample(self.config.steps_per_epoch, &mut explore, buffer)?;
            if !record.is_empty() {
                logger.store(record);
            }
            self.updater.update(self.global_step, agent, buffer, logger)?;
            self.global_step += 1;

            self.tester.test_agent(agent, logger)?;
            let record = epoch_record(
                epoch,
                &[
                    ("TotalEnvInteracts", self.sampler.total_env_steps() as f32),
                    ("PolicyUpdates", agent.policy_updates() as f32),
                ],
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
        storage::DataSpec,
        UniformReplayBuffer,
    };

    #[test]
    fn test_on_policy_loop() -> Result<()> {
        let env = DummyVecEnv::new(2, 1, 2, 10);
        let spec = DataSpec::from_spaces(env.single_observation_space(), env.single_action_space());
        let mut buffer = UniformReplayBuffer::build(
            &ReplayBufferConfig::default().capacity(100).batch_size(4),
            spec,
        )?;
        let config = RunnerConfig::default()
            .epochs(3)
            .steps_per_epoch(5)
            .num_test_episodes(1);
        let mut runner = OnPolicyRunner::build(config, env, DummyVecEnv::new(2, 1, 1, 10));
        let mut agent = DummyAgent::new(1);
        let mut logger = BufferedRecorder::new();

        runner.run(&mut agent, &mut buffer, &mut logger)?;
        assert_eq!(agent.policy_updates(), 3);
        assert_eq!(agent.last_batch_size(), 10);
        assert_eq!(logger.flushed().len(), 3);
        Ok(())
    }
}

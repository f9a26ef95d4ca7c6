use super::{epoch_record, is_save_epoch, save_checkpoint, RunnerConfig};
use crate::{
    record::Recorder,
    sampler::Sampler,
    tester::Tester,
    updater::{OffPolicyUpdater, Updater},
    util::Seeder,
    Agent, ReplayBufferBase, VecEnv,
};
use anyhow::Result;
use log::info;
use ndarray::{Array2, ArrayD};
use rand::{rngs::StdRng, SeedableRng};
use std::time::Instant;

#[cfg_attr(doc, aquamarine::aquamarine)]
/// Runs off-policy training.
///
/// Training runs `epochs` epochs of `steps_per_epoch` steps. In each step:
///
/// 1. The sampler takes one vectorized environment step. Actions are
///    uniformly random while fewer than `start_steps` environment steps
///    have been taken, and come from [`Agent::act_batch_explore`] after.
/// 2. Once `update_after` environment steps have been taken, the
///    [`OffPolicyUpdater`] is called with the global step.
/// 3. The global step is incremented.
///
/// At the end of an epoch the agent is tested, `Epoch`,
/// `TotalEnvInteracts`, `PolicyUpdates`, `GradientSteps`, `Time` and the
/// agent's summary are stored, and the logger is flushed. Parameters are
/// saved in `{model_dir}/epoch_{n}` every `save_freq` epochs and in
/// `{model_dir}/final` at the end.
///
/// ```mermaid
/// graph LR
///     A[Agent]-->|action|S[Sampler]
///     S -->|FieldBatch|B[ReplayBuffer]
///     B -->|Batch|U[OffPolicyUpdater]
///     U -->|train_on_batch|A
///     U -->|Record|L[Recorder]
/// ```
pub struct OffPolicyRunner<S: Sampler, E: VecEnv> {
    config: RunnerConfig,
    sampler: S,
    tester: Tester<E>,
    updater: OffPolicyUpdater,
    global_step: usize,
    rng: StdRng,
}

impl<S: Sampler, E: VecEnv> OffPolicyRunner<S, E> {
    /// `test_env` is used only for testing, with `num_test_episodes` episodes.
    pub fn build(config: RunnerConfig, sampler: S, test_env: E) -> Result<Self> {
        let updater = OffPolicyUpdater::new(config.update_every, config.update_per_step)?;
        let tester = Tester::new(test_env, config.num_test_episodes);
        let rng = StdRng::seed_from_u64(Seeder::new(config.seed).generate_seed());
        Ok(Self {
            config,
            sampler,
            tester,
            updater,
            global_step: 0,
            rng,
        })
    }

    pub fn global_step(&self) -> usize {
        self.global_step
    }

    pub fn sampler(&self) -> &S {
        &self.sampler
    }

    pub fn updater(&self) -> &OffPolicyUpdater {
        &self.updater
    }

    /// Runs the training loop.
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
            for _ in 0..self.config.steps_per_epoch {
                self.run_one_step(agent, buffer, logger)?;
            }
            self.end_epoch(epoch, &start, agent, logger)?;
        }

        save_checkpoint(agent, &self.config.model_dir, "final")?;
        info!("Finished training, {} global steps", self.global_step);
        Ok(())
    }

    fn run_one_step<B: ReplayBufferBase>(
        &mut self,
        agent: &mut dyn Agent,
        buffer: &mut B,
        logger: &mut dyn Recorder,
    ) -> Result<()> {
        let record = if self.sampler.total_env_steps() < self.config.start_steps {
            let space = self.sampler.action_space().clone();
            let rng = &mut self.rng;
            let mut random = |obs: &ArrayD<f32>| -> Result<Array2<f32>> {
                Ok(space.sample_batch(obs.shape()[0], rng))
            };
            self.sampler.sample(1, &mut random, buffer)?
        } else {
            let global_step = self.global_step;
            let mut explore = |obs: &ArrayD<f32>| -> Result<Array2<f32>> {
                agent.act_batch_explore(obs, global_step)
            };
            self.sampler.sample(1, &mut explore, buffer)?
        };
        if !record.is_empty() {
            logger.store(record);
        }

        if self.sampler.total_env_steps() >= self.config.update_after {
            self.updater.update(self.global_step, agent, buffer, logger)?;
        }
        self.global_step += 1;
        Ok(())
    }

    fn end_epoch(
        &mut self,
        epoch: usize,
        start: &Instant,
        agent: &mut dyn Agent,
        logger: &mut dyn Recorder,
    ) -> Result<()> {
        self.tester.test_agent(agent, logger)?;
        let record = epoch_record(
            epoch,
            &[
                ("TotalEnvInteracts", self.sampler.total_env_steps() as f32),
                ("PolicyUpdates", agent.policy_updates() as f32),
                ("GradientSteps", self.updater.num_updates() as f32),
            ],
            start,
            agent,
        );
        logger.store(record);
        logger.flush(epoch as i64);

        if is_save_epoch(epoch, self.config.save_freq) {
            save_checkpoint(agent, &self.config.model_dir, &format!("epoch_{}", epoch))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        dummy::{DummyAgent, DummyVecEnv},
        record::BufferedRecorder,
        replay_buffer::ReplayBufferConfig,
        sampler::BatchSampler,
        storage::DataSpec,
        ExperienceBufferBase, UniformReplayBuffer,
    };
    use tempdir::TempDir;

    #[test]
    fn test_off_policy_loop() -> Result<()> {
        let _ = env_logger::builder().is_test(true).try_init();
        let env = DummyVecEnv::new(2, 1, 2, 10);
        let spec = DataSpec::from_spaces(env.single_observation_space(), env.single_action_space());
        let mut buffer = UniformReplayBuffer::build(
            &ReplayBufferConfig::default().capacity(1000).batch_size(4),
            spec,
        )?;
        let dir = TempDir::new("off_policy_runner")?;
        let config = RunnerConfig::default()
            .epochs(2)
            .steps_per_epoch(10)
            .start_steps(6)
            .update_after(8)
            .update_every(2)
            .update_per_step(1.0)
            .num_test_episodes(2)
            .save_freq(1)
            .model_dir(dir.path().to_string_lossy());
        let mut runner =
            OffPolicyRunner::build(config, BatchSampler::new(env), DummyVecEnv::new(2, 1, 2, 10))?;
        let mut agent = DummyAgent::new(1);
        let mut logger = BufferedRecorder::new();

        runner.run(&mut agent, &mut buffer, &mut logger)?;

        assert_eq!(runner.global_step(), 20);
        assert_eq!(buffer.len(), 40);
        // Updates start at global step 3 (8 environment steps) and fire on even steps.
        assert_eq!(runner.updater().num_updates(), 16);
        assert_eq!(agent.policy_updates(), 16);

        let flushed = logger.flushed();
        assert_eq!(flushed.len(), 2);
        assert_eq!(flushed[1].0, 2);
        assert_eq!(flushed[1].1.get_scalar("Epoch")?, 2.0);
        assert_eq!(flushed[1].1.get_scalar("TotalEnvInteracts")?, 40.0);
        assert!(flushed[1].1.get_scalar("TestEpRet_mean").is_ok());

        assert!(dir.path().join("epoch_1").join("dummy.yaml").exists());
        assert!(dir.path().join("final").join("dummy.yaml").exists());
        Ok(())
    }
}

use super::{
    check_action_shape, episode_record, terminal_flags, ActionSelector, EpisodeStats, Sampler,
};
use crate::{
    record::Record,
    storage::{FieldBatch, ACT, DONE, NEXT_OBS, OBS, REW},
    ExperienceBufferBase, Space, VecEnv,
};
use anyhow::Result;
use ndarray::{Array1, ArrayD};

/// Samples one transition per instance and step.
///
/// Instances whose episode ended are reset lazily, right before the
/// next action is chosen, so that the last observation of the episode is
/// stored as `next_obs`.
pub struct BatchSampler<E: VecEnv> {
    env: E,
    act_dim: usize,
    obs: Option<ArrayD<f32>>,
    is_done: Option<Vec<bool>>,
    stats: EpisodeStats,
    total_env_steps: usize,
}

impl<E: VecEnv> BatchSampler<E> {
    pub fn new(env: E) -> Self {
        let num_envs = env.num_envs();
        let act_dim = env.single_action_space().flat_dim();
        Self {
            env,
            act_dim,
            obs: None,
            is_done: None,
            stats: EpisodeStats::new(num_envs),
            total_env_steps: 0,
        }
    }

    pub fn env(&self) -> &E {
        &self.env
    }

    pub fn env_mut(&mut self) -> &mut E {
        &mut self.env
    }

    /// Observation the next action is chosen for.
    fn current_obs(&mut self) -> Result<ArrayD<f32>> {
        match (self.obs.take(), self.is_done.take()) {
            (None, _) => {
                self.stats.reset_all();
                self.env.reset(None)
            }
            (Some(_), Some(is_done)) => self.env.reset(Some(&is_done)),
            (Some(obs), None) => Ok(obs),
        }
    }
}

impl<E: VecEnv> Sampler for BatchSampler<E> {
    fn sample(
        &mut self,
        num_steps: usize,
        action_selector: &mut ActionSelector<'_>,
        buffer: &mut dyn ExperienceBufferBase,
    ) -> Result<Record> {
        let num_envs = self.env.num_envs();
        let mut finished = vec![];

        for _ in 0..num_steps {
            let obs = self.current_obs()?;
            let act = action_selector(&obs)?;
            check_action_shape(&act, num_envs, self.act_dim)?;
            let step = self.env.step(&act)?;
            let is_done = step.is_done();

            buffer.add(
                FieldBatch::new()
                    .with(OBS, obs)
                    .with(ACT, act.into_dyn())
                    .with(NEXT_OBS, step.obs.clone())
                    .with(REW, Array1::from(step.reward.clone()).into_dyn())
                    .with(DONE, terminal_flags(&step.terminated)),
            )?;

            finished.extend(self.stats.update(&step.reward, &is_done));
            self.total_env_steps += num_envs;
            self.obs = Some(step.obs);
            if is_done.iter().any(|d| *d) {
                self.is_done = Some(is_done);
            }
        }

        Ok(episode_record(&finished))
    }

    fn total_env_steps(&self) -> usize {
        self.total_env_steps
    }

    fn reset(&mut self) {
        self.obs = None;
        self.is_done = None;
        self.stats.reset_all();
        self.total_env_steps = 0;
    }

    fn num_envs(&self) -> usize {
        self.env.num_envs()
    }

    fn action_space(&self) -> &Space {
        self.env.single_action_space()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        dummy::DummyVecEnv, replay_buffer::ReplayBufferConfig, storage::DataSpec,
        ReplayBufferBase, UniformReplayBuffer,
    };
    use ndarray::Array2;

    fn buffer(env: &DummyVecEnv, capacity: usize) -> UniformReplayBuffer {
        let spec = DataSpec::from_spaces(env.single_observation_space(), env.single_action_space());
        let config = ReplayBufferConfig::default()
            .capacity(capacity)
            .batch_size(4);
        UniformReplayBuffer::build(&config, spec).unwrap()
    }

    #[test]
    fn test_sample_counts_steps_and_transitions() -> Result<()> {
        let env = DummyVecEnv::new(3, 1, 2, 100);
        let mut buffer = buffer(&env, 1000);
        let mut sampler = BatchSampler::new(env);
        let mut zeros = |obs: &ArrayD<f32>| -> Result<Array2<f32>> {
            Ok(Array2::zeros((obs.shape()[0], 1)))
        };

        sampler.sample(5, &mut zeros, &mut buffer)?;
        assert_eq!(sampler.total_env_steps(), 10);
        assert_eq!(buffer.len(), 10);

        let batch = buffer.get()?;
        assert_eq!(batch.obs()?.shape(), &[10, 3]);
        assert_eq!(batch.act()?.shape(), &[10, 1]);
        assert_eq!(batch.rew()?.shape(), &[10]);
        Ok(())
    }

    #[test]
    fn test_next_obs_follows_obs() -> Result<()> {
        let env = DummyVecEnv::new(2, 1, 1, 100);
        let mut buffer = buffer(&env, 1000);
        let mut sampler = BatchSampler::new(env);
        let mut ones = |obs: &ArrayD<f32>| -> Result<Array2<f32>> {
            Ok(Array2::ones((obs.shape()[0], 1)))
        };

        sampler.sample(3, &mut ones, &mut buffer)?;
        let batch = buffer.get()?;
        let obs = batch.obs()?;
        let next_obs = batch.next_obs()?;
        for i in 0..2 {
            assert_eq!(
                next_obs.index_axis(ndarray::Axis(0), i),
                obs.index_axis(ndarray::Axis(0), i + 1)
            );
        }
        Ok(())
    }

    #[test]
    fn test_truncated_episode_is_not_terminal() -> Result<()> {
        // Zero actions never reach the terminal state; episodes end by the time limit.
        let env = DummyVecEnv::new(2, 1, 2, 4);
        let mut buffer = buffer(&env, 1000);
        let mut sampler = BatchSampler::new(env);
        let mut zeros = |obs: &ArrayD<f32>| -> Result<Array2<f32>> {
            Ok(Array2::zeros((obs.shape()[0], 1)))
        };

        let record = sampler.sample(10, &mut zeros, &mut buffer)?;
        assert_eq!(record.get_scalar("EpLen")?, 4.0);
        assert!(buffer.get()?.done()?.iter().all(|d| *d == 0.0));
        Ok(())
    }

    #[test]
    fn test_wrong_action_shape_is_rejected() {
        let env = DummyVecEnv::new(2, 2, 3, 10);
        let mut buffer = buffer(&env, 100);
        let mut sampler = BatchSampler::new(env);
        let mut wrong = |_: &ArrayD<f32>| -> Result<Array2<f32>> { Ok(Array2::zeros((3, 1))) };

        assert!(sampler.sample(1, &mut wrong, &mut buffer).is_err());
        assert!(buffer.is_empty());
    }
}

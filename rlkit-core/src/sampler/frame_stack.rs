use super::{
    check_action_shape, episode_record, terminal_flags, ActionSelector, EpisodeStats, Sampler,
};
use crate::{
    record::Record,
    storage::{FieldBatch, LazyFrames, ACT, DONE, NEXT_OBS, OBS, REW},
    ExperienceBufferBase, Space, VecEnv,
};
use anyhow::{ensure, Result};
use ndarray::{Array1, ArrayD, Axis};
use std::{collections::VecDeque, sync::Arc};

/// Samples transitions whose observations are the last `k` frames.
///
/// The environment returns single frames. The sampler keeps the last `k`
/// frames of every instance and writes `obs` and `next_obs` as
/// [`LazyFrames`], so consecutive transitions share `k - 1` frames in the
/// buffer. After a reset the history holds `k` copies of the first frame.
///
/// The action selector receives the materialized stacks, `[n, k, ...frame]`.
pub struct FrameStackSampler<E: VecEnv> {
    env: E,
    k: usize,
    act_dim: usize,
    history: Vec<VecDeque<Arc<ArrayD<f32>>>>,
    is_done: Option<Vec<bool>>,
    stats: EpisodeStats,
    total_env_steps: usize,
}

impl<E: VecEnv> FrameStackSampler<E> {
    pub fn new(env: E, k: usize) -> Result<Self> {
        ensure!(k > 0, "The number of stacked frames must be positive");
        let num_envs = env.num_envs();
        let act_dim = env.single_action_space().flat_dim();
        Ok(Self {
            env,
            k,
            act_dim,
            history: vec![],
            is_done: None,
            stats: EpisodeStats::new(num_envs),
            total_env_steps: 0,
        })
    }

    pub fn env(&self) -> &E {
        &self.env
    }

    /// Number of stacked frames.
    pub fn k(&self) -> usize {
        self.k
    }

    fn fill(&mut self, i: usize, frame: ArrayD<f32>) {
        let frame = Arc::new(frame);
        self.history[i] = std::iter::repeat(frame).take(self.k).collect();
    }

    fn prepare_history(&mut self) -> Result<()> {
        if self.history.is_empty() {
            let frames = self.env.reset(None)?;
            self.stats.reset_all();
            self.history = vec![VecDeque::new(); self.env.num_envs()];
            for (i, frame) in frames.outer_iter().enumerate() {
                self.fill(i, frame.to_owned());
            }
        } else if let Some(is_done) = self.is_done.take() {
            let frames = self.env.reset(Some(&is_done))?;
            for (i, frame) in frames.outer_iter().enumerate() {
                if is_done[i] {
                    self.fill(i, frame.to_owned());
                }
            }
        }
        Ok(())
    }

    fn lazy_obs(&self) -> Vec<LazyFrames> {
        self.history
            .iter()
            .map(|h| LazyFrames::new(h.iter().cloned().collect()))
            .collect()
    }
}

/// Stacks the materialized frame stacks into `[n, k, ...frame]`.
fn materialize(obs: &[LazyFrames]) -> Result<ArrayD<f32>> {
    let stacks = obs
        .iter()
        .map(|o| o.materialize())
        .collect::<Result<Vec<_>>>()?;
    let views = stacks.iter().map(|s| s.view()).collect::<Vec<_>>();
    Ok(ndarray::stack(Axis(0), &views)?)
}

impl<E: VecEnv> Sampler for FrameStackSampler<E> {
    fn sample(
        &mut self,
        num_steps: usize,
        action_selector: &mut ActionSelector<'_>,
        buffer: &mut dyn ExperienceBufferBase,
    ) -> Result<Record> {
        let num_envs = self.env.num_envs();
        let mut finished = vec![];

        for _ in 0..num_steps {
            self.prepare_history()?;
            let obs = self.lazy_obs();
            let act = action_selector(&materialize(&obs)?)?;
            check_action_shape(&act, num_envs, self.act_dim)?;
            let step = self.env.step(&act)?;
            let is_done = step.is_done();

            for (i, frame) in step.obs.outer_iter().enumerate() {
                self.history[i].pop_front();
                self.history[i].push_back(Arc::new(frame.to_owned()));
            }

            buffer.add(
                FieldBatch::new()
                    .with(OBS, obs)
                    .with(ACT, act.into_dyn())
                    .with(NEXT_OBS, self.lazy_obs())
                    .with(REW, Array1::from(step.reward.clone()).into_dyn())
                    .with(DONE, terminal_flags(&step.terminated)),
            )?;

            finished.extend(self.stats.update(&step.reward, &is_done));
            self.total_env_steps += num_envs;
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
        self.history.clear();
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
    use ndarray::{s, Array2};

    #[test]
    fn test_frame_stack_shapes_and_history() -> Result<()> {
        let env = DummyVecEnv::new(2, 1, 2, 100);
        let spec = DataSpec::frame_stack(
            env.single_observation_space(),
            env.single_action_space(),
            3,
        );
        let config = ReplayBufferConfig::default().capacity(100).batch_size(4);
        let mut buffer = UniformReplayBuffer::build(&config, spec)?;
        let mut sampler = FrameStackSampler::new(env, 3)?;

        let mut seen = vec![];
        let mut ones = |obs: &ArrayD<f32>| -> Result<Array2<f32>> {
            seen.push(obs.shape().to_vec());
            Ok(Array2::ones((obs.shape()[0], 1)))
        };
        sampler.sample(4, &mut ones, &mut buffer)?;
        assert!(seen.iter().all(|s| s == &[2, 3, 2]));

        let batch = buffer.get()?;
        assert_eq!(batch.obs()?.shape(), &[8, 3, 2]);
        assert_eq!(batch.next_obs()?.shape(), &[8, 3, 2]);

        // First stack is three copies of the initial frame.
        let first = batch.obs()?.slice(s![0, .., 0]).to_vec();
        assert_eq!(first, vec![0.0, 0.0, 0.0]);

        // Last frame of next_obs is the newest position.
        let last = batch.next_obs()?.slice(s![6, .., 0]).to_vec();
        let expected = [0.2f32, 0.3, 0.4];
        for (a, b) in last.iter().zip(expected.iter()) {
            assert!((a - b).abs() < 1e-5);
        }
        Ok(())
    }

    #[test]
    fn test_zero_frames_is_rejected() {
        assert!(FrameStackSampler::new(DummyVecEnv::new(2, 1, 1, 10), 0).is_err());
    }
}

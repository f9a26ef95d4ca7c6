//! Collection of transitions from a vectorized environment.
//!
//! A [`Sampler`] steps a [`VecEnv`](crate::VecEnv) with actions chosen by
//! a caller-supplied action selector and writes every step into a buffer
//! in a single [`add`](crate::ExperienceBufferBase::add) call.
//!
//! The `done` field holds the terminal flag only. A truncated episode
//! ends and is reset like a terminated one, but its last transition is
//! still bootstrapped.
mod batch_sampler;
mod frame_stack;
mod trajectory;
use crate::{error::RlError, record::Record, record::RecordValue, ExperienceBufferBase, Space};
use anyhow::Result;
pub use batch_sampler::BatchSampler;
pub use frame_stack::FrameStackSampler;
use log::debug;
use ndarray::{Array2, ArrayD};
pub use trajectory::TrajectorySampler;

/// Maps a batch of observations `[n, ...]` to a batch of actions `[n, act_dim]`.
pub type ActionSelector<'a> = dyn FnMut(&ArrayD<f32>) -> Result<Array2<f32>> + 'a;

/// Interface of samplers.
pub trait Sampler {
    /// Steps the environment `num_steps` times and writes the transitions to `buffer`.
    ///
    /// Returns `EpRet` and `EpLen`, averaged over the episodes that ended
    /// during the call, or an empty record if none ended.
    fn sample(
        &mut self,
        num_steps: usize,
        action_selector: &mut ActionSelector<'_>,
        buffer: &mut dyn ExperienceBufferBase,
    ) -> Result<Record>;

    /// Number of single-instance environment steps taken so far.
    fn total_env_steps(&self) -> usize;

    /// Forgets the ongoing episodes and the step counter.
    ///
    /// Every instance is reset at the next call to [`Sampler::sample`].
    fn reset(&mut self);

    fn num_envs(&self) -> usize;

    /// Space of the action of a single instance.
    fn action_space(&self) -> &Space;
}

/// Checks that `act` has shape `[num_envs, act_dim]`.
pub(crate) fn check_action_shape(
    act: &Array2<f32>,
    num_envs: usize,
    act_dim: usize,
) -> Result<()> {
    if act.shape() != [num_envs, act_dim] {
        return Err(RlError::ActionShape {
            expected: vec![num_envs, act_dim],
            found: act.shape().to_vec(),
        }
        .into());
    }
    Ok(())
}

/// Return and length of the ongoing episode of every instance.
#[derive(Debug, Clone)]
pub(crate) struct EpisodeStats {
    ret: Vec<f32>,
    len: Vec<usize>,
}

impl EpisodeStats {
    pub fn new(num_envs: usize) -> Self {
        Self {
            ret: vec![0.0; num_envs],
            len: vec![0; num_envs],
        }
    }

    pub fn reset_all(&mut self) {
        self.ret.iter_mut().for_each(|r| *r = 0.0);
        self.len.iter_mut().for_each(|l| *l = 0);
    }

    /// Accumulates one step and returns `(return, length)` of the episodes that ended.
    pub fn update(&mut self, reward: &[f32], is_done: &[bool]) -> Vec<(f32, usize)> {
        let mut finished = vec![];
        for i in 0..self.ret.len() {
            self.ret[i] += reward[i];
            self.len[i] += 1;
            if is_done[i] {
                debug!(
                    "Episode ended in instance {}: return {}, length {}",
                    i, self.ret[i], self.len[i]
                );
                finished.push((self.ret[i], self.len[i]));
                self.ret[i] = 0.0;
                self.len[i] = 0;
            }
        }
        finished
    }
}

pub(crate) fn episode_record(finished: &[(f32, usize)]) -> Record {
    if finished.is_empty() {
        return Record::empty();
    }
    let n = finished.len() as f32;
    let ret = finished.iter().map(|(r, _)| r).sum::<f32>() / n;
    let len = finished.iter().map(|(_, l)| *l as f32).sum::<f32>() / n;
    Record::from_slice(&[
        ("EpRet", RecordValue::Scalar(ret)),
        ("EpLen", RecordValue::Scalar(len)),
    ])
}

/// Terminal flags as `1.0`/`0.0`.
pub(crate) fn terminal_flags(terminated: &[bool]) -> ArrayD<f32> {
    ndarray::Array1::from_iter(terminated.iter().map(|&t| if t { 1f32 } else { 0f32 }))
        .into_dyn()
}

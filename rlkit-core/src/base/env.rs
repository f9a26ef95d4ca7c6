//! Vectorized environment.
use super::Space;
use crate::record::Record;
use anyhow::Result;
use ndarray::{Array2, ArrayD};

/// Result of stepping every instance of a [`VecEnv`] once.
#[derive(Debug, Clone)]
pub struct VecStep {
    /// Observations after the step, `[num_envs, ...]`.
    ///
    /// For instances whose episode ended, this is the last observation of
    /// the episode, not the first observation of the next one.
    pub obs: ArrayD<f32>,

    /// Rewards, one per instance.
    pub reward: Vec<f32>,

    /// `true` where the episode reached a terminal state.
    pub terminated: Vec<bool>,

    /// `true` where the episode was cut short, e.g. by a time limit.
    pub truncated: Vec<bool>,

    /// Additional information from the environment.
    pub info: Record,
}

impl VecStep {
    /// `true` where the episode ended for any reason.
    pub fn is_done(&self) -> Vec<bool> {
        self.terminated
            .iter()
            .zip(self.truncated.iter())
            .map(|(t1, t2)| *t1 || *t2)
            .collect()
    }
}

/// A batch of `num_envs` independent environment instances stepped in lockstep.
///
/// Instances are never reset automatically: the caller resets the
/// instances whose episode ended with [`VecEnv::reset`].
pub trait VecEnv {
    fn num_envs(&self) -> usize;

    /// Space of the observation of a single instance.
    fn single_observation_space(&self) -> &Space;

    /// Space of the action of a single instance.
    fn single_action_space(&self) -> &Space;

    /// Resets instances and returns the observations of all of them.
    ///
    /// `None` resets every instance. With `Some(is_done)`, only the
    /// instances where `is_done[i]` holds are reset; the others keep their
    /// current observation in the returned batch.
    fn reset(&mut self, is_done: Option<&[bool]>) -> Result<ArrayD<f32>>;

    /// Applies a batch of actions of shape `[num_envs, act_dim]`.
    fn step(&mut self, act: &Array2<f32>) -> Result<VecStep>;
}

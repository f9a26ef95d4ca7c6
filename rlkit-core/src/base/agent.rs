//! Agent interface consumed by samplers, updaters and runners.
use crate::{record::Record, storage::Batch};
use anyhow::Result;
use ndarray::{Array2, ArrayD};
use std::path::Path;

/// A learning agent acting on batches of observations.
///
/// The algorithm (TD3, SAC, ...) is chosen when the agent is constructed.
/// Every method takes or returns batches: observations are `[n, ...]`
/// and actions are `[n, act_dim]`.
pub trait Agent {
    /// Deterministic actions for evaluation.
    fn act_batch_test(&mut self, obs: &ArrayD<f32>) -> Result<Array2<f32>>;

    /// Actions with exploration noise for data collection.
    fn act_batch_explore(&mut self, obs: &ArrayD<f32>, global_step: usize) -> Result<Array2<f32>>;

    /// Performs one gradient update on a sampled batch.
    ///
    /// `update_target` overrides the target synchronization cadence:
    /// `Some(true)` forces a sync, `Some(false)` suppresses it and `None`
    /// lets the agent decide from its number of policy updates.
    fn train_on_batch(&mut self, batch: &Batch, update_target: Option<bool>) -> Result<Record>;

    /// Synchronizes the target networks with the online networks.
    fn update_target(&mut self) -> Result<()>;

    /// Absolute TD error per sample, used as replay priority.
    ///
    /// Does not mutate any parameter.
    fn compute_priority(&mut self, batch: &Batch) -> Result<Vec<f32>>;

    /// Summary of the agent written at the end of an epoch.
    fn log_tabular(&mut self) -> Record;

    /// Number of calls to [`Agent::train_on_batch`] so far.
    fn policy_updates(&self) -> usize;

    /// Saves the parameters into the directory `path`.
    fn save_params(&self, path: &Path) -> Result<()>;

    /// Loads the parameters from the directory `path`.
    fn load_params(&mut self, path: &Path) -> Result<()>;
}

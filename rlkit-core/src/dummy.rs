//! Deterministic vectorized environment used in tests.
use crate::{
    record::{Record, RecordValue},
    storage::Batch,
    Agent, Space, VecEnv, VecStep,
};
use anyhow::{ensure, Result};
use ndarray::{Array2, ArrayD, IxDyn};
use std::{
    fs::File,
    io::{BufReader, Write},
    path::Path,
};

/// A point on a line moved by the mean of the action.
///
/// Each instance starts at position `0`. An action moves it by
/// `0.1 * clip(mean(act), -1, 1)` and the reward is the new position.
/// An episode terminates when the position reaches `1` and is truncated
/// after `max_steps` steps. The observation holds the position followed by
/// the elapsed fraction of the time limit in the remaining components.
#[derive(Debug, Clone)]
pub struct DummyVecEnv {
    obs_space: Space,
    act_space: Space,
    max_steps: usize,
    pos: Vec<f32>,
    t: Vec<usize>,
}

impl DummyVecEnv {
    pub fn new(obs_dim: usize, act_dim: usize, num_envs: usize, max_steps: usize) -> Self {
        Self {
            obs_space: Space::symmetric_box(vec![obs_dim], 10.0),
            act_space: Space::symmetric_box(vec![act_dim], 1.0),
            max_steps,
            pos: vec![0.0; num_envs],
            t: vec![0; num_envs],
        }
    }

    /// Current position of every instance.
    pub fn positions(&self) -> &[f32] {
        &self.pos
    }

    fn observe(&self) -> ArrayD<f32> {
        let obs_dim = self.obs_space.flat_dim();
        let mut obs = ArrayD::zeros(IxDyn(&[self.pos.len(), obs_dim]));
        for i in 0..self.pos.len() {
            obs[[i, 0]] = self.pos[i];
            for j in 1..obs_dim {
                obs[[i, j]] = self.t[i] as f32 / self.max_steps as f32;
            }
        }
        obs
    }
}

impl VecEnv for DummyVecEnv {
    fn num_envs(&self) -> usize {
        self.pos.len()
    }

    fn single_observation_space(&self) -> &Space {
        &self.obs_space
    }

    fn single_action_space(&self) -> &Space {
        &self.act_space
    }

    fn reset(&mut self, is_done: Option<&[bool]>) -> Result<ArrayD<f32>> {
        for i in 0..self.pos.len() {
            if is_done.map_or(true, |d| d[i]) {
                self.pos[i] = 0.0;
                self.t[i] = 0;
            }
        }
        Ok(self.observe())
    }

    fn step(&mut self, act: &Array2<f32>) -> Result<VecStep> {
        ensure!(
            act.nrows() == self.pos.len(),
            "Expected {} actions, found {}",
            self.pos.len(),
            act.nrows()
        );
        let mut reward = vec![];
        let mut terminated = vec![];
        let mut truncated = vec![];
        for (i, row) in act.outer_iter().enumerate() {
            let a = row.mean().unwrap_or(0.0).clamp(-1.0, 1.0);
            self.pos[i] += 0.1 * a;
            self.t[i] += 1;
            let term = self.pos[i] >= 1.0;
            reward.push(self.pos[i]);
            terminated.push(term);
            truncated.push(!term && self.t[i] >= self.max_steps);
        }
        Ok(VecStep {
            obs: self.observe(),
            reward,
            terminated,
            truncated,
            info: Record::empty(),
        })
    }
}

/// Agent without parameters that counts the calls it receives.
///
/// Test actions are zeros and exploration actions are `0.5`.
#[derive(Debug, Clone, Default)]
pub struct DummyAgent {
    act_dim: usize,
    policy_updates: usize,
    target_updates: usize,
    priority_calls: usize,
    last_batch_size: usize,
}

impl DummyAgent {
    pub fn new(act_dim: usize) -> Self {
        Self {
            act_dim,
            ..Default::default()
        }
    }

    pub fn num_target_updates(&self) -> usize {
        self.target_updates
    }

    pub fn num_priority_calls(&self) -> usize {
        self.priority_calls
    }

    /// Size of the batch given to the last call of [`Agent::train_on_batch`].
    pub fn last_batch_size(&self) -> usize {
        self.last_batch_size
    }
}

impl Agent for DummyAgent {
    fn act_batch_test(&mut self, obs: &ArrayD<f32>) -> Result<Array2<f32>> {
        Ok(Array2::zeros((obs.shape()[0], self.act_dim)))
    }

    fn act_batch_explore(&mut self, obs: &ArrayD<f32>, _global_step: usize) -> Result<Array2<f32>> {
        Ok(Array2::from_elem((obs.shape()[0], self.act_dim), 0.5))
    }

    fn train_on_batch(&mut self, batch: &Batch, update_target: Option<bool>) -> Result<Record> {
        self.policy_updates += 1;
        self.last_batch_size = batch.len();
        if update_target.unwrap_or(true) {
            self.update_target()?;
        }
        let rew = batch.rew()?;
        Ok(Record::from_scalar("LossQ", rew.mean().unwrap_or(0.0)))
    }

    fn update_target(&mut self) -> Result<()> {
        self.target_updates += 1;
        Ok(())
    }

    fn compute_priority(&mut self, batch: &Batch) -> Result<Vec<f32>> {
        self.priority_calls += 1;
        Ok(vec![1.0; batch.len()])
    }

    fn log_tabular(&mut self) -> Record {
        Record::from_slice(&[(
            "TargetUpdates",
            RecordValue::Scalar(self.target_updates as f32),
        )])
    }

    fn policy_updates(&self) -> usize {
        self.policy_updates
    }

    fn save_params(&self, path: &Path) -> Result<()> {
        std::fs::create_dir_all(path)?;
        let mut file = File::create(path.join("dummy.yaml"))?;
        file.write_all(serde_yaml::to_string(&self.policy_updates)?.as_bytes())?;
        Ok(())
    }

    fn load_params(&mut self, path: &Path) -> Result<()> {
        let file = File::open(path.join("dummy.yaml"))?;
        let rdr = BufReader::new(file);
        self.policy_updates = serde_yaml::from_reader(rdr)?;
        Ok(())
    }
}

//! Configuration of runners.
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, Write},
    path::Path,
};

/// Configuration shared by [`OffPolicyRunner`](super::OffPolicyRunner),
/// [`OnPolicyRunner`](super::OnPolicyRunner) and
/// [`OfflineRunner`](super::OfflineRunner).
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct RunnerConfig {
    /// Number of epochs.
    pub epochs: usize,

    /// Number of runner steps in an epoch.
    ///
    /// A step of the off-policy runner is one vectorized environment step.
    /// A step of the on-policy runner is one environment step collected
    /// before the update. A step of the offline runner is one gradient step.
    pub steps_per_epoch: usize,

    /// Uniform random actions are taken until this many environment steps.
    pub start_steps: usize,

    /// No update happens before this many environment steps.
    pub update_after: usize,

    /// Interval of updates in runner steps.
    pub update_every: usize,

    /// Ratio of gradient steps to runner steps.
    pub update_per_step: f64,

    /// Number of test episodes at the end of every epoch.
    pub num_test_episodes: usize,

    /// Interval of checkpoints in epochs.
    pub save_freq: usize,

    /// Directory of checkpoints. Nothing is saved if `None`.
    pub model_dir: Option<String>,

    /// Seed of the random actions.
    pub seed: u64,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            epochs: 100,
            steps_per_epoch: 4000,
            start_steps: 10000,
            update_after: 1000,
            update_every: 50,
            update_per_step: 1.0,
            num_test_episodes: 10,
            save_freq: 1,
            model_dir: None,
            seed: 42,
        }
    }
}

impl RunnerConfig {
    pub fn epochs(mut self, v: usize) -> Self {
        self.epochs = v;
        self
    }

    pub fn steps_per_epoch(mut self, v: usize) -> Self {
        self.steps_per_epoch = v;
        self
    }

    pub fn start_steps(mut self, v: usize) -> Self {
        self.start_steps = v;
        self
    }

    pub fn update_after(mut self, v: usize) -> Self {
        self.update_after = v;
        self
    }

    pub fn update_every(mut self, v: usize) -> Self {
        self.update_every = v;
        self
    }

    pub fn update_per_step(mut self, v: f64) -> Self {
        self.update_per_step = v;
        self
    }

    pub fn num_test_episodes(mut self, v: usize) -> Self {
        self.num_test_episodes = v;
        self
    }

    /// Sets the interval of checkpoints in epochs.
    pub fn save_freq(mut self, v: usize) -> Self {
        self.save_freq = v;
        self
    }

    pub fn model_dir(mut self, v: impl Into<String>) -> Self {
        self.model_dir = Some(v.into());
        self
    }

    pub fn seed(mut self, v: u64) -> Self {
        self.seed = v;
        self
    }

    /// Constructs [`RunnerConfig`] from YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        let rdr = BufReader::new(file);
        let b = serde_yaml::from_reader(rdr)?;
        Ok(b)
    }

    /// Saves [`RunnerConfig`].
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut file = File::create(path)?;
        file.write_all(serde_yaml::to_string(&self)?.as_bytes())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempdir::TempDir;

    #[test]
    fn test_serde_runner_config() -> Result<()> {
        let config = RunnerConfig::default()
            .epochs(3)
            .update_per_step(0.5)
            .model_dir("model/td3");

        let dir = TempDir::new("runner_config")?;
        let path = dir.path().join("runner_config.yaml");
        config.save(&path)?;
        let config_ = RunnerConfig::load(&path)?;
        assert_eq!(config, config_);
        Ok(())
    }
}

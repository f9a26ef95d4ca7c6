//! Configuration of TD3 agent.
use crate::{
    actor::DeterministicActorConfig, critic::EnsembleCriticConfig, util::TargetUpdate, Device,
};
use anyhow::Result;
use log::info;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, Write},
    path::Path,
};

/// Configuration of [`Td3`](super::Td3).
///
/// Input and output dimensions of the networks are set from the spaces
/// when the agent is built.
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct Td3Config<Q, P> {
    /// Configuration of the actor model.
    pub actor_config: DeterministicActorConfig<P>,

    /// Configuration of the critic model.
    pub critic_config: EnsembleCriticConfig<Q>,

    /// Discount factor.
    pub gamma: f64,

    /// Length of the returns stored in the buffer. The bootstrapped value
    /// is discounted by `gamma^n_steps`.
    pub n_steps: usize,

    /// Synchronization of the target networks.
    pub target_update: TargetUpdate,

    /// The actor is updated once every this many critic updates.
    pub policy_update_freq: usize,

    /// Standard deviation of the exploration noise, relative to the action bound.
    pub actor_noise: f64,

    /// Standard deviation of the target policy smoothing noise.
    pub target_noise: f64,

    /// Bound of the target policy smoothing noise.
    pub noise_clip: f64,

    /// Rewards are divided by this value.
    pub reward_scale: f64,

    /// Device for actor/critic models.
    pub device: Device,
}

impl<Q, P> Default for Td3Config<Q, P> {
    fn default() -> Self {
        Self {
            actor_config: Default::default(),
            critic_config: Default::default(),
            gamma: 0.99,
            n_steps: 1,
            target_update: TargetUpdate::Soft {
                tau: 5e-3,
                interval: 2,
            },
            policy_update_freq: 2,
            actor_noise: 0.1,
            target_noise: 0.2,
            noise_clip: 0.5,
            reward_scale: 1.0,
            device: Device::Cpu,
        }
    }
}

impl<Q, P> Td3Config<Q, P>
where
    Q: DeserializeOwned + Serialize,
    P: DeserializeOwned + Serialize,
{
    /// Configuration of actor.
    pub fn actor_config(mut self, v: DeterministicActorConfig<P>) -> Self {
        self.actor_config = v;
        self
    }

    /// Configuration of critic.
    pub fn critic_config(mut self, v: EnsembleCriticConfig<Q>) -> Self {
        self.critic_config = v;
        self
    }

    /// Discount factor.
    pub fn discount_factor(mut self, v: f64) -> Self {
        self.gamma = v;
        self
    }

    pub fn n_steps(mut self, v: usize) -> Self {
        self.n_steps = v;
        self
    }

    pub fn target_update(mut self, v: TargetUpdate) -> Self {
        self.target_update = v;
        self
    }

    pub fn policy_update_freq(mut self, v: usize) -> Self {
        self.policy_update_freq = v;
        self
    }

    pub fn actor_noise(mut self, v: f64) -> Self {
        self.actor_noise = v;
        self
    }

    /// Target policy smoothing noise and its bound.
    pub fn target_noise(mut self, noise: f64, clip: f64) -> Self {
        self.target_noise = noise;
        self.noise_clip = clip;
        self
    }

    pub fn reward_scale(mut self, v: f64) -> Self {
        self.reward_scale = v;
        self
    }

    /// Device.
    pub fn device(mut self, v: Device) -> Self {
        self.device = v;
        self
    }

    /// Constructs [`Td3Config`] from YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(&path)?;
        let rdr = BufReader::new(file);
        let b = serde_yaml::from_reader(rdr)?;
        info!("Load config of TD3 agent from {:?}", path.as_ref());
        Ok(b)
    }

    /// Saves [`Td3Config`].
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut file = File::create(&path)?;
        file.write_all(serde_yaml::to_string(&self)?.as_bytes())?;
        info!("Save config of TD3 agent into {:?}", path.as_ref());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{mlp::MlpConfig, Activation};
    use tempdir::TempDir;

    #[test]
    fn test_serde_td3_config() -> Result<()> {
        let config = Td3Config::default()
            .actor_config(
                DeterministicActorConfig::default()
                    .policy_config(MlpConfig::new(0, vec![64, 64], 0, Activation::None)),
            )
            .critic_config(
                EnsembleCriticConfig::default()
                    .n_nets(3)
                    .q_config(MlpConfig::new(0, vec![64, 64], 1, Activation::None)),
            )
            .n_steps(3)
            .target_update(TargetUpdate::Hard { period: 100 });

        let dir = TempDir::new("td3_config")?;
        let path = dir.path().join("td3_config.yaml");
        config.save(&path)?;
        let config_ = Td3Config::load(&path)?;
        assert_eq!(config, config_);
        Ok(())
    }
}

//! Configuration of BRAC+ agent.
use crate::{
    actor::GaussianActorConfig, critic::EnsembleCriticConfig, opt::OptimizerConfig,
    util::TargetUpdate, Device,
};
use anyhow::Result;
use log::info;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, Write},
    path::Path,
};

/// Configuration of [`BracPlus`](super::BracPlus).
///
/// The policy, its target and the behavior policy share one network
/// configuration.
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct BracConfig<Q, P> {
    /// Configuration of the policy.
    pub actor_config: GaussianActorConfig<P>,

    /// Optimizer of the behavior policy.
    pub behavior_opt_config: OptimizerConfig,

    /// Configuration of the critic model.
    pub critic_config: EnsembleCriticConfig<Q>,

    /// Discount factor.
    pub gamma: f64,

    /// Length of the returns stored in the buffer.
    pub n_steps: usize,

    /// Synchronization of the target critics and the target policy.
    pub target_update: TargetUpdate,

    /// Number of actions sampled per observation.
    pub n_samples: usize,

    /// Initial value of the KL multiplier.
    pub alpha_init: f64,

    /// Learning rate of both multipliers.
    pub alpha_lr: f64,

    /// Initial value of the entropy multiplier.
    pub beta_init: f64,

    /// Whether the entropy of the policy is regularized.
    pub entropy_reg: bool,

    /// Entropy target, `-act_dim` if not given.
    pub target_entropy: Option<f64>,

    /// Budget of the KL divergence from the behavior policy.
    pub delta_behavior: f64,

    /// Rewards are divided by this value.
    pub reward_scale: f64,

    /// Device for the models.
    pub device: Device,
}

impl<Q, P> Default for BracConfig<Q, P> {
    fn default() -> Self {
        Self {
            actor_config: Default::default(),
            behavior_opt_config: OptimizerConfig::Adam { lr: 1e-4 },
            critic_config: Default::default(),
            gamma: 0.99,
            n_steps: 1,
            target_update: TargetUpdate::Soft {
                tau: 5e-3,
                interval: 1,
            },
            n_samples: 5,
            alpha_init: 1.0,
            alpha_lr: 1e-3,
            beta_init: 1.0,
            entropy_reg: true,
            target_entropy: None,
            delta_behavior: 0.0,
            reward_scale: 1.0,
            device: Device::Cpu,
        }
    }
}

impl<Q, P> BracConfig<Q, P>
where
    Q: DeserializeOwned + Serialize,
    P: DeserializeOwned + Serialize,
{
    /// Configuration of the policy.
    pub fn actor_config(mut self, v: GaussianActorConfig<P>) -> Self {
        self.actor_config = v;
        self
    }

    pub fn behavior_opt_config(mut self, v: OptimizerConfig) -> Self {
        self.behavior_opt_config = v;
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

    pub fn n_samples(mut self, v: usize) -> Self {
        self.n_samples = v;
        self
    }

    /// Initial value and learning rate of the KL multiplier.
    pub fn alpha(mut self, init: f64, lr: f64) -> Self {
        self.alpha_init = init;
        self.alpha_lr = lr;
        self
    }

    /// Entropy regularization with initial multiplier `beta_init`.
    pub fn entropy_reg(mut self, enabled: bool, beta_init: f64) -> Self {
        self.entropy_reg = enabled;
        self.beta_init = beta_init;
        self
    }

    pub fn target_entropy(mut self, v: f64) -> Self {
        self.target_entropy = Some(v);
        self
    }

    pub fn delta_behavior(mut self, v: f64) -> Self {
        self.delta_behavior = v;
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

    /// Constructs [`BracConfig`] from YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(&path)?;
        let rdr = BufReader::new(file);
        let b = serde_yaml::from_reader(rdr)?;
        info!("Load config of BRAC+ agent from {:?}", path.as_ref());
        Ok(b)
    }

    /// Saves [`BracConfig`].
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut file = File::create(&path)?;
        file.write_all(serde_yaml::to_string(&self)?.as_bytes())?;
        info!("Save config of BRAC+ agent into {:?}", path.as_ref());
        Ok(())
    }
}

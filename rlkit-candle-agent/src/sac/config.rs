//! Configuration of SAC agent.
use crate::{
    actor::GaussianActorConfig, critic::EnsembleCriticConfig, util::TargetUpdate, Device,
};
use anyhow::Result;
use log::info;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, Write},
    path::Path,
};

/// Mode of the entropy coefficient of SAC.
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub enum EntCoefMode {
    /// Use a constant as alpha.
    Fix(f64),

    /// Tunes alpha towards `target_entropy`, `-act_dim` if not given.
    Auto {
        init: f64,
        lr: f64,
        target_entropy: Option<f64>,
    },
}

/// Configuration of [`Sac`](super::Sac).
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct SacConfig<Q, P> {
    /// Configuration of the actor model.
    pub actor_config: GaussianActorConfig<P>,

    /// Configuration of the critic model.
    pub critic_config: EnsembleCriticConfig<Q>,

    /// Discount factor.
    pub gamma: f64,

    /// Length of the returns stored in the buffer.
    pub n_steps: usize,

    /// Synchronization of the target critics.
    pub target_update: TargetUpdate,

    /// How to update entropy coefficient.
    pub ent_coef_mode: EntCoefMode,

    /// Rewards are divided by this value.
    pub reward_scale: f64,

    /// Device for actor/critic models.
    pub device: Device,
}

impl<Q, P> Default for SacConfig<Q, P> {
    fn default() -> Self {
        Self {
            actor_config: Default::default(),
            critic_config: Default::default(),
            gamma: 0.99,
            n_steps: 1,
            target_update: TargetUpdate::Soft {
                tau: 5e-3,
                interval: 1,
            },
            ent_coef_mode: EntCoefMode::Auto {
                init: 1.0,
                lr: 3e-4,
                target_entropy: None,
            },
            reward_scale: 1.0,
            device: Device::Cpu,
        }
    }
}

impl<Q, P> SacConfig<Q, P>
where
    Q: DeserializeOwned + Serialize,
    P: DeserializeOwned + Serialize,
{
    /// Configuration of actor.
    pub fn actor_config(mut self, v: GaussianActorConfig<P>) -> Self {
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

    /// SAC-alpha.
    pub fn ent_coef_mode(mut self, v: EntCoefMode) -> Self {
        self.ent_coef_mode = v;
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

    /// Constructs [`SacConfig`] from YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(&path)?;
        let rdr = BufReader::new(file);
        let b = serde_yaml::from_reader(rdr)?;
        info!("Load config of SAC agent from {:?}", path.as_ref());
        Ok(b)
    }

    /// Saves [`SacConfig`].
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut file = File::create(&path)?;
        file.write_all(serde_yaml::to_string(&self)?.as_bytes())?;
        info!("Save config of SAC agent into {:?}", path.as_ref());
        Ok(())
    }
}

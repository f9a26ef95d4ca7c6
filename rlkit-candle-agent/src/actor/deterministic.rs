use crate::{
    model::SubModel1,
    opt::{Optimizer, OptimizerConfig},
    util::track_with_replace_substring,
};
use anyhow::{Context, Result};
use candle_core::{DType, Device, Tensor};
use candle_nn::{VarBuilder, VarMap};
use log::info;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, Write},
    path::Path,
};

#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
/// Configuration of [`DeterministicActor`].
pub struct DeterministicActorConfig<P> {
    pub policy_config: Option<P>,
    pub opt_config: OptimizerConfig,
}

impl<P> Default for DeterministicActorConfig<P> {
    fn default() -> Self {
        Self {
            policy_config: None,
            opt_config: OptimizerConfig::Adam { lr: 0.0003 },
        }
    }
}

impl<P> DeterministicActorConfig<P>
where
    P: DeserializeOwned + Serialize,
{
    /// Sets configurations for policy function.
    pub fn policy_config(mut self, v: P) -> Self {
        self.policy_config = Some(v);
        self
    }

    /// Sets optimizer configuration.
    pub fn opt_config(mut self, v: OptimizerConfig) -> Self {
        self.opt_config = v;
        self
    }

    /// Loads [`DeterministicActorConfig`] from YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        let rdr = BufReader::new(file);
        let b = serde_yaml::from_reader(rdr)?;
        Ok(b)
    }

    /// Saves [`DeterministicActorConfig`] as YAML file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut file = File::create(path)?;
        file.write_all(serde_yaml::to_string(&self)?.as_bytes())?;
        Ok(())
    }
}

/// Deterministic policy `pi(obs) = act_lim * tanh(f(obs))` with a target copy.
pub struct DeterministicActor<P>
where
    P: SubModel1<Input = Tensor, Output = Tensor>,
{
    act_lim: f64,
    varmap: VarMap,
    varmap_tgt: VarMap,
    policy: P,
    policy_tgt: P,
    opt: Optimizer,
}

impl<P> DeterministicActor<P>
where
    P: SubModel1<Input = Tensor, Output = Tensor>,
    P::Config: DeserializeOwned + Serialize + Clone,
{
    /// Constructs [`DeterministicActor`]. The target starts as a copy.
    pub fn build(
        config: DeterministicActorConfig<P::Config>,
        act_lim: f64,
        device: &Device,
    ) -> Result<Self> {
        let policy_config = config.policy_config.context("policy_config is not set.")?;
        let varmap = VarMap::new();
        let policy = P::build(
            VarBuilder::from_varmap(&varmap, DType::F32, device).set_prefix("actor"),
            policy_config.clone(),
        )?;
        let varmap_tgt = VarMap::new();
        let policy_tgt = P::build(
            VarBuilder::from_varmap(&varmap_tgt, DType::F32, device).set_prefix("actor_tgt"),
            policy_config,
        )?;
        let opt = config.opt_config.build(varmap.all_vars())?;
        track_with_replace_substring(&varmap_tgt, &varmap, 1.0, ("actor", "actor_tgt"))?;

        Ok(Self {
            act_lim,
            varmap,
            varmap_tgt,
            policy,
            policy_tgt,
            opt,
        })
    }

    /// Actions of the online policy, shape `[n, act_dim]`.
    pub fn forward(&self, obs: &Tensor) -> Result<Tensor> {
        Ok((self.policy.forward(obs)?.tanh()? * self.act_lim)?)
    }

    /// Actions of the target policy, detached from the graph.
    pub fn forward_tgt(&self, obs: &Tensor) -> Result<Tensor> {
        Ok((self.policy_tgt.forward(obs)?.tanh()? * self.act_lim)?.detach())
    }

    pub fn backward_step(&mut self, loss: &Tensor) -> Result<()> {
        self.opt.backward_step(loss)
    }

    pub fn soft_update(&mut self, tau: f64) -> Result<()> {
        track_with_replace_substring(&self.varmap_tgt, &self.varmap, tau, ("actor", "actor_tgt"))
    }

    /// Saves the online and target policies in directory `path`.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        self.varmap.save(path.join("actor.pt"))?;
        self.varmap_tgt.save(path.join("actor_tgt.pt"))?;
        info!("Save actor to {:?}", path);
        Ok(())
    }

    /// Loads the online and target policies from directory `path`.
    pub fn load(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        self.varmap.load(path.join("actor.pt"))?;
        self.varmap_tgt.load(path.join("actor_tgt.pt"))?;
        info!("Load actor from {:?}", path);
        Ok(())
    }
}

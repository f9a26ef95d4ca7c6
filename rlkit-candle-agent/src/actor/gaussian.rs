use crate::{
    model::SubModel1,
    opt::{Optimizer, OptimizerConfig},
    util::{gaussian_logp, squash_correction, squashed_gaussian_logp, track_with_replace_substring},
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
/// Configuration of [`GaussianActor`].
pub struct GaussianActorConfig<P> {
    pub policy_config: Option<P>,
    pub opt_config: OptimizerConfig,
    pub min_log_std: f64,
    pub max_log_std: f64,
}

impl<P> Default for GaussianActorConfig<P> {
    fn default() -> Self {
        Self {
            policy_config: None,
            opt_config: OptimizerConfig::Adam { lr: 0.0003 },
            min_log_std: -20.0,
            max_log_std: 2.0,
        }
    }
}

impl<P> GaussianActorConfig<P>
where
    P: DeserializeOwned + Serialize,
{
    /// Sets the minimum value of log std.
    pub fn min_log_std(mut self, v: f64) -> Self {
        self.min_log_std = v;
        self
    }

    /// Sets the maximum value of log std.
    pub fn max_log_std(mut self, v: f64) -> Self {
        self.max_log_std = v;
        self
    }

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

    /// Loads [`GaussianActorConfig`] from YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        let rdr = BufReader::new(file);
        let b = serde_yaml::from_reader(rdr)?;
        Ok(b)
    }

    /// Saves [`GaussianActorConfig`] as YAML file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut file = File::create(path)?;
        file.write_all(serde_yaml::to_string(&self)?.as_bytes())?;
        Ok(())
    }
}

/// Squashed Gaussian policy.
///
/// With `(mean, log_std) = f(obs)` and `u ~ N(mean, exp(log_std)^2)`, the
/// action is `act_lim * tanh(u)`. Log densities are those of `tanh(u)`,
/// i.e. the action before scaling.
pub struct GaussianActor<P>
where
    P: SubModel1<Input = Tensor, Output = (Tensor, Tensor)>,
{
    prefix: String,
    act_lim: f64,
    varmap: VarMap,
    policy: P,
    opt: Optimizer,
    min_log_std: f64,
    max_log_std: f64,
}

impl<P> GaussianActor<P>
where
    P: SubModel1<Input = Tensor, Output = (Tensor, Tensor)>,
    P::Config: DeserializeOwned + Serialize + Clone,
{
    /// Constructs [`GaussianActor`] whose variables are named under `prefix`.
    pub fn build(
        config: GaussianActorConfig<P::Config>,
        act_lim: f64,
        device: &Device,
        prefix: &str,
    ) -> Result<Self> {
        let policy_config = config.policy_config.context("policy_config is not set.")?;
        let varmap = VarMap::new();
        let policy = P::build(
            VarBuilder::from_varmap(&varmap, DType::F32, device).set_prefix(prefix),
            policy_config,
        )?;
        let opt = config.opt_config.build(varmap.all_vars())?;

        Ok(Self {
            prefix: prefix.to_string(),
            act_lim,
            varmap,
            policy,
            opt,
            min_log_std: config.min_log_std,
            max_log_std: config.max_log_std,
        })
    }

    /// Mean and clamped log std, each of shape `[n, act_dim]`.
    pub fn forward(&self, obs: &Tensor) -> Result<(Tensor, Tensor)> {
        let (mean, log_std) = self.policy.forward(obs)?;
        let log_std = log_std.clamp(self.min_log_std, self.max_log_std)?;
        Ok((mean, log_std))
    }

    /// Samples actions with the reparameterization trick.
    ///
    /// Returns scaled actions `[n, act_dim]` and their log densities `[n]`.
    pub fn sample(&self, obs: &Tensor) -> Result<(Tensor, Tensor)> {
        let (mean, log_std) = self.forward(obs)?;
        let eps = mean.randn_like(0.0, 1.0)?;
        let u = (&mean + (eps * log_std.exp()?)?)?;
        let a = u.tanh()?;
        let logp = (gaussian_logp(&u, &mean, &log_std)? - squash_correction(&a)?)?;
        Ok(((a * self.act_lim)?, logp))
    }

    /// Actions at the mode, `act_lim * tanh(mean)`.
    pub fn deterministic(&self, obs: &Tensor) -> Result<Tensor> {
        let (mean, _) = self.forward(obs)?;
        Ok((mean.tanh()? * self.act_lim)?)
    }

    /// Log densities `[n]` of scaled actions `act`.
    pub fn logp(&self, obs: &Tensor, act: &Tensor) -> Result<Tensor> {
        let (mean, log_std) = self.forward(obs)?;
        let a = (act / self.act_lim)?;
        squashed_gaussian_logp(&a, &mean, &log_std)
    }

    pub fn backward_step(&mut self, loss: &Tensor) -> Result<()> {
        self.opt.backward_step(loss)
    }

    /// Replaces the optimizer, e.g. to change the learning rate between
    /// training phases.
    pub fn reset_optimizer(&mut self, opt_config: &OptimizerConfig) -> Result<()> {
        self.opt = opt_config.build(self.varmap.all_vars())?;
        Ok(())
    }

    /// `self = tau * src + (1 - tau) * self`, matching variables by prefix.
    pub fn track(&mut self, src: &Self, tau: f64) -> Result<()> {
        track_with_replace_substring(
            &self.varmap,
            &src.varmap,
            tau,
            (src.prefix.as_str(), self.prefix.as_str()),
        )
    }

    /// Saves the parameters to `{path}/{prefix}.pt`.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref().join(format!("{}.pt", self.prefix));
        self.varmap.save(&path)?;
        info!("Save {} to {:?}", self.prefix, path);
        Ok(())
    }

    /// Loads the parameters from `{path}/{prefix}.pt`.
    pub fn load(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref().join(format!("{}.pt", self.prefix));
        self.varmap.load(&path)?;
        info!("Load {} from {:?}", self.prefix, path);
        Ok(())
    }
}

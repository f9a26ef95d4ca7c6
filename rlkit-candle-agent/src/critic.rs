//! Ensemble of action-value functions with target networks.
use crate::{
    model::SubModel2,
    opt::{Optimizer, OptimizerConfig},
    util::track_with_replace_substring,
};
use anyhow::{Context, Result};
use candle_core::{DType::F32, Device, Tensor, D};
use candle_nn::{VarBuilder, VarMap};
use log::info;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, Write},
    path::Path,
};

#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
/// Configuration of [`EnsembleCritic`].
pub struct EnsembleCriticConfig<Q> {
    /// The number of critic networks.
    pub n_nets: usize,

    /// Configuration of critic networks.
    pub q_config: Option<Q>,

    /// Configuration of the optimizer.
    pub opt_config: OptimizerConfig,
}

impl<Q> Default for EnsembleCriticConfig<Q> {
    fn default() -> Self {
        Self {
            n_nets: 2,
            q_config: None,
            opt_config: OptimizerConfig::Adam { lr: 0.0003 },
        }
    }
}

impl<Q> EnsembleCriticConfig<Q>
where
    Q: DeserializeOwned + Serialize,
{
    /// Sets the number of critic networks.
    pub fn n_nets(mut self, v: usize) -> Self {
        self.n_nets = v;
        self
    }

    /// Sets configurations for action-value function.
    pub fn q_config(mut self, v: Q) -> Self {
        self.q_config = Some(v);
        self
    }

    /// Sets optimizer configuration.
    pub fn opt_config(mut self, v: OptimizerConfig) -> Self {
        self.opt_config = v;
        self
    }

    /// Constructs [`EnsembleCriticConfig`] from YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        let rdr = BufReader::new(file);
        let b = serde_yaml::from_reader(rdr)?;
        Ok(b)
    }

    /// Saves [`EnsembleCriticConfig`] as YAML file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut file = File::create(path)?;
        file.write_all(serde_yaml::to_string(&self)?.as_bytes())?;
        Ok(())
    }
}

/// Ensemble of critics `Q_i(obs, act)` and their target networks.
///
/// All members share one optimizer. Target networks are never stepped,
/// they only follow the online networks through [`EnsembleCritic::soft_update`].
pub struct EnsembleCritic<Q>
where
    Q: SubModel2<Input1 = Tensor, Input2 = Tensor, Output = Tensor>,
{
    varmap: VarMap,
    varmap_tgt: VarMap,
    qs: Vec<Q>,
    qs_tgt: Vec<Q>,
    opt: Optimizer,
}

impl<Q> EnsembleCritic<Q>
where
    Q: SubModel2<Input1 = Tensor, Input2 = Tensor, Output = Tensor>,
    Q::Config: DeserializeOwned + Serialize + Clone,
{
    /// Constructs [`EnsembleCritic`]. Target networks start as copies.
    pub fn build(config: EnsembleCriticConfig<Q::Config>, device: &Device) -> Result<Self> {
        anyhow::ensure!(config.n_nets > 0, "n_nets must be positive");
        let q_config = config.q_config.context("q_config is not set.")?;

        let (varmap, qs) = Self::build_networks(&q_config, device, config.n_nets, "critic")?;
        let (varmap_tgt, qs_tgt) =
            Self::build_networks(&q_config, device, config.n_nets, "critic_tgt")?;
        let opt = config.opt_config.build(varmap.all_vars())?;
        track_with_replace_substring(&varmap_tgt, &varmap, 1.0, ("critic", "critic_tgt"))?;

        Ok(Self {
            varmap,
            varmap_tgt,
            qs,
            qs_tgt,
            opt,
        })
    }

    fn build_networks(
        q_config: &Q::Config,
        device: &Device,
        n_nets: usize,
        prefix: &str,
    ) -> Result<(VarMap, Vec<Q>)> {
        let varmap = VarMap::new();
        let qs = (0..n_nets)
            .map(|ix| {
                let vb = VarBuilder::from_varmap(&varmap, F32, device)
                    .set_prefix(format!("{}{}", prefix, ix));
                Q::build(vb, q_config.clone())
            })
            .collect::<Result<Vec<_>>>()?;
        Ok((varmap, qs))
    }

    fn forward_all(qs: &[Q], obs: &Tensor, act: &Tensor) -> Result<Vec<Tensor>> {
        qs.iter()
            .map(|q| -> Result<Tensor> { Ok(q.forward(obs, act)?.squeeze(D::Minus1)?) })
            .collect()
    }

    fn min(qvals: &[Tensor]) -> Result<Tensor> {
        Ok(Tensor::stack(qvals, 0)?.min(0)?)
    }

    /// Number of members.
    pub fn n_nets(&self) -> usize {
        self.qs.len()
    }

    /// Action values of all members, each of shape `[n]`.
    pub fn qvals(&self, obs: &Tensor, act: &Tensor) -> Result<Vec<Tensor>> {
        Self::forward_all(&self.qs, obs, act)
    }

    /// Minimum over the members, shape `[n]`.
    pub fn qvals_min(&self, obs: &Tensor, act: &Tensor) -> Result<Tensor> {
        Self::min(&self.qvals(obs, act)?)
    }

    /// Minimum over the target members, detached from the graph.
    pub fn qvals_min_tgt(&self, obs: &Tensor, act: &Tensor) -> Result<Tensor> {
        let qvals = Self::forward_all(&self.qs_tgt, obs, act)?;
        Ok(Self::min(&qvals)?.detach())
    }

    /// Weighted TD loss `mean(w * sum_i 0.5 * (q_i - q_target)^2)`.
    ///
    /// Returns the loss and the action values of the members.
    pub fn td_loss(
        &self,
        obs: &Tensor,
        act: &Tensor,
        q_target: &Tensor,
        weights: &Tensor,
    ) -> Result<(Tensor, Vec<Tensor>)> {
        let q_target = q_target.detach();
        let qvals = self.qvals(obs, act)?;
        let mut sq = (qvals[0].sub(&q_target)?.sqr()? * 0.5)?;
        for q in qvals.iter().skip(1) {
            sq = (sq + (q.sub(&q_target)?.sqr()? * 0.5)?)?;
        }
        let loss = (sq * weights)?.mean_all()?;
        Ok((loss, qvals))
    }

    /// Steps the optimizer of the online networks.
    pub fn backward_step(&mut self, loss: &Tensor) -> Result<()> {
        self.opt.backward_step(loss)
    }

    /// `target = tau * online + (1 - tau) * target`.
    pub fn soft_update(&mut self, tau: f64) -> Result<()> {
        track_with_replace_substring(&self.varmap_tgt, &self.varmap, tau, ("critic", "critic_tgt"))
    }

    pub fn hard_update(&mut self) -> Result<()> {
        self.soft_update(1.0)
    }

    /// Saves the online and target networks in directory `path`.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        self.varmap.save(path.join("critic.pt"))?;
        self.varmap_tgt.save(path.join("critic_tgt.pt"))?;
        info!("Save critics to {:?}", path);
        Ok(())
    }

    /// Loads the online and target networks from directory `path`.
    pub fn load(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        self.varmap.load(path.join("critic.pt"))?;
        self.varmap_tgt.load(path.join("critic_tgt.pt"))?;
        info!("Load critics from {:?}", path);
        Ok(())
    }
}

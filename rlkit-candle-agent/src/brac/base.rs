use super::BracConfig;
use crate::{
    actor::GaussianActor,
    critic::EnsembleCritic,
    lagrange::Lagrange,
    model::{SubModel1, SubModel2},
    util::{gamma_n, tensor_to_array2, BatchTensors, InDim, OutDim, TargetUpdate},
};
use anyhow::Result;
use candle_core::{DType, Device, Tensor};
use log::{info, trace};
use ndarray::{Array2, ArrayD};
use rlkit_core::{
    record::{Record, RecordValue},
    storage::Batch,
    verify_continuous_action_space, verify_vector_observation_space, Agent, ReplayBufferBase,
    Space,
};
use serde::{de::DeserializeOwned, Serialize};
use std::{fs, path::Path};

/// Averages a tensor of shape `[n * b]` over the `n` samples of each item.
fn sample_mean(t: &Tensor, n: usize) -> Result<Tensor> {
    let b = t.dims1()? / n;
    Ok(t.reshape((n, b))?.mean(0)?)
}

/// BRAC+ agent with a KL divergence regularizer.
pub struct BracPlus<Q, P>
where
    Q: SubModel2<Input1 = Tensor, Input2 = Tensor, Output = Tensor>,
    P: SubModel1<Input = Tensor, Output = (Tensor, Tensor)>,
{
    critic: EnsembleCritic<Q>,
    actor: GaussianActor<P>,
    actor_tgt: GaussianActor<P>,
    behavior: GaussianActor<P>,
    alpha: Lagrange,
    beta: Option<Lagrange>,
    target_entropy: f64,
    delta_behavior: f64,
    n_samples: usize,
    gamma_n: f64,
    target_update: TargetUpdate,
    reward_scale: f64,
    policy_updates: usize,
    device: Device,
}

impl<Q, P> BracPlus<Q, P>
where
    Q: SubModel2<Input1 = Tensor, Input2 = Tensor, Output = Tensor>,
    P: SubModel1<Input = Tensor, Output = (Tensor, Tensor)>,
    Q::Config: DeserializeOwned + Serialize + InDim + OutDim + Clone,
    P::Config: DeserializeOwned + Serialize + InDim + OutDim + Clone,
{
    /// Constructs [`BracPlus`] for the given spaces.
    pub fn build(
        config: BracConfig<Q::Config, P::Config>,
        obs_space: &Space,
        act_space: &Space,
    ) -> Result<Self> {
        let (act_dim, act_lim) = verify_continuous_action_space(act_space)?;
        let obs_dim = verify_vector_observation_space(obs_space)?;
        anyhow::ensure!(config.n_samples > 0, "n_samples must be positive");
        config.target_update.validate()?;
        let device: Device = config.device.try_into()?;
        let act_lim = act_lim as f64;

        let mut critic_config = config.critic_config;
        if let Some(q_config) = critic_config.q_config.as_mut() {
            q_config.set_in_dim(obs_dim + act_dim);
            q_config.set_out_dim(1);
        }
        let mut actor_config = config.actor_config;
        if let Some(p_config) = actor_config.policy_config.as_mut() {
            p_config.set_in_dim(obs_dim);
            p_config.set_out_dim(act_dim);
        }
        let behavior_config = actor_config.clone().opt_config(config.behavior_opt_config);

        let actor = GaussianActor::build(actor_config.clone(), act_lim, &device, "actor")?;
        let mut actor_tgt = GaussianActor::build(actor_config, act_lim, &device, "actor_tgt")?;
        actor_tgt.track(&actor, 1.0)?;
        let behavior = GaussianActor::build(behavior_config, act_lim, &device, "behavior")?;

        let alpha = Lagrange::new("alpha", config.alpha_init, Some(config.alpha_lr), &device)?;
        let beta = match config.entropy_reg {
            true => Some(Lagrange::new(
                "beta",
                config.beta_init,
                Some(config.alpha_lr),
                &device,
            )?),
            false => None,
        };

        Ok(Self {
            critic: EnsembleCritic::build(critic_config, &device)?,
            actor,
            actor_tgt,
            behavior,
            alpha,
            beta,
            target_entropy: config.target_entropy.unwrap_or(-(act_dim as f64)),
            delta_behavior: config.delta_behavior,
            n_samples: config.n_samples,
            gamma_n: gamma_n(config.gamma, config.n_steps),
            target_update: config.target_update,
            reward_scale: config.reward_scale,
            policy_updates: 0,
            device,
        })
    }

    /// Sets the budget of the KL divergence from the behavior policy.
    pub fn set_delta_behavior(&mut self, v: f64) {
        info!("Set the KL budget to {:.4}", v);
        self.delta_behavior = v;
    }

    pub fn delta_behavior(&self) -> f64 {
        self.delta_behavior
    }

    pub fn set_target_entropy(&mut self, v: f64) {
        info!("Set the target entropy to {:.4}", v);
        self.target_entropy = v;
    }

    pub fn target_entropy(&self) -> f64 {
        self.target_entropy
    }

    /// One maximum likelihood step of the behavior policy on dataset actions.
    fn update_behavior(&mut self, t: &BatchTensors) -> Result<f32> {
        let loss = (self.behavior.logp(&t.obs, &t.act)?.mean_all()? * -1.0)?;
        self.behavior.backward_step(&loss)?;
        Ok(loss.to_scalar::<f32>()?)
    }

    /// Fits the behavior policy on `n_steps` sampled batches and returns
    /// the final negative log likelihood.
    pub fn pretrain_behavior(
        &mut self,
        buffer: &mut dyn ReplayBufferBase,
        n_steps: usize,
    ) -> Result<f32> {
        let mut loss = 0f32;
        for i in 0..n_steps {
            let batch = buffer.sample()?;
            let t = BatchTensors::from_batch(&batch, &self.device)?;
            loss = self.update_behavior(&t)?;
            trace!("Behavior step {}: loss={}", i, loss);
        }
        info!("Pretrained behavior policy, NLL={:.4}", loss);
        Ok(loss)
    }

    /// Mean negative log likelihood of the batch under the behavior policy.
    pub fn behavior_nll(&self, batch: &Batch) -> Result<f32> {
        let t = BatchTensors::from_batch(batch, &self.device)?;
        let nll = (self.behavior.logp(&t.obs, &t.act)?.mean_all()? * -1.0)?;
        Ok(nll.to_scalar::<f32>()?)
    }

    /// `KL(pi || pi_b)` estimated from `n_samples` actions per observation.
    ///
    /// Returns the estimate `[b]` and the log densities under the policy,
    /// both averaged over the samples.
    fn kl_behavior(&self, obs: &Tensor) -> Result<(Tensor, Tensor, Tensor)> {
        let obs_tile = obs.repeat((self.n_samples, 1))?;
        let (act, logp) = self.actor.sample(&obs_tile)?;
        let logp_b = self.behavior.logp(&obs_tile, &act)?;
        let kl = sample_mean(&(&logp - logp_b)?, self.n_samples)?;
        let logp = sample_mean(&logp, self.n_samples)?;
        Ok((kl, logp, act))
    }

    /// Clones the behavior policy into the policy by minimizing the KL
    /// divergence, then copies the policy into its target.
    pub fn pretrain_cloning(
        &mut self,
        buffer: &mut dyn ReplayBufferBase,
        n_steps: usize,
    ) -> Result<f32> {
        let mut kl = 0f32;
        for _ in 0..n_steps {
            let batch = buffer.sample()?;
            let t = BatchTensors::from_batch(&batch, &self.device)?;
            let (kl_t, _, _) = self.kl_behavior(&t.obs)?;
            let loss = kl_t.mean_all()?;
            self.actor.backward_step(&loss)?;
            kl = loss.to_scalar::<f32>()?;
        }
        self.actor_tgt.track(&self.actor, 1.0)?;
        info!("Cloned behavior policy, KL={:.4}", kl);
        Ok(kl)
    }

    /// Mean over sampled target-policy actions of the ensemble-min target Q.
    fn q_target(&self, t: &BatchTensors) -> Result<Tensor> {
        let next_obs = t.next_obs.repeat((self.n_samples, 1))?;
        let (next_act, _) = self.actor_tgt.sample(&next_obs)?;
        let next_q = self.critic.qvals_min_tgt(&next_obs, &next_act.detach())?;
        let next_q = sample_mean(&next_q, self.n_samples)?;
        let not_done = (1.0 - &t.done)?;
        let q_target = ((&t.rew / self.reward_scale)? + ((not_done * next_q)? * self.gamma_n)?)?;
        Ok(q_target.detach())
    }

    fn update_critic(&mut self, t: &BatchTensors) -> Result<Record> {
        let q_target = self.q_target(t)?;
        let (loss, qvals) = self.critic.td_loss(&t.obs, &t.act, &q_target, &t.weights)?;
        let td_error = Tensor::stack(&qvals, 0)?
            .min(0)?
            .sub(&q_target)?
            .abs()?
            .mean_all()?;
        self.critic.backward_step(&loss)?;

        let mut record = Record::from_slice(&[
            ("LossQ", RecordValue::Scalar(loss.to_scalar::<f32>()?)),
            ("TDError", RecordValue::Scalar(td_error.to_scalar::<f32>()?)),
        ]);
        for (i, q) in qvals.iter().enumerate() {
            let q = q.mean_all()?.to_scalar::<f32>()?;
            record.insert(format!("Q{}Vals", i + 1), RecordValue::Scalar(q));
        }
        Ok(record)
    }

    fn update_actor(&mut self, obs: &Tensor) -> Result<Record> {
        let (kl, logp, act) = self.kl_behavior(obs)?;
        let obs_tile = obs.repeat((self.n_samples, 1))?;
        let q = sample_mean(&self.critic.qvals_min(&obs_tile, &act)?, self.n_samples)?;
        let delta = (&kl - self.delta_behavior)?;

        let alpha = self.alpha.value()?;
        let mut loss = (alpha.broadcast_mul(&delta)? - q)?;
        if let Some(beta) = &self.beta {
            loss = (loss + beta.value()?.broadcast_mul(&logp)?)?;
        }
        let loss = loss.mean_all()?;
        self.actor.backward_step(&loss)?;

        let violation_ratio = delta
            .detach()
            .gt(0.0)?
            .to_dtype(DType::F32)?
            .mean_all()?
            .to_scalar::<f32>()?;
        let mut record = Record::from_slice(&[
            ("LossPi", RecordValue::Scalar(loss.to_scalar::<f32>()?)),
            (
                "LogPi",
                RecordValue::Scalar(logp.mean_all()?.to_scalar::<f32>()?),
            ),
            ("KL", RecordValue::Scalar(kl.mean_all()?.to_scalar::<f32>()?)),
            ("ViolationRatio", RecordValue::Scalar(violation_ratio)),
        ]);

        let loss_alpha = self.alpha.update(&delta)?;
        record.insert("LossAlpha", RecordValue::Scalar(loss_alpha));
        record.insert("Alpha", RecordValue::Scalar(self.alpha.scalar()?));

        if let Some(beta) = &mut self.beta {
            let violation = (logp.detach() + self.target_entropy)?;
            let loss_beta = beta.update(&violation)?;
            record.insert("BetaLoss", RecordValue::Scalar(loss_beta));
            record.insert("Beta", RecordValue::Scalar(beta.scalar()?));
        }
        Ok(record)
    }
}

impl<Q, P> Agent for BracPlus<Q, P>
where
    Q: SubModel2<Input1 = Tensor, Input2 = Tensor, Output = Tensor>,
    P: SubModel1<Input = Tensor, Output = (Tensor, Tensor)>,
    Q::Config: DeserializeOwned + Serialize + InDim + OutDim + Clone,
    P::Config: DeserializeOwned + Serialize + InDim + OutDim + Clone,
{
    fn act_batch_test(&mut self, obs: &ArrayD<f32>) -> Result<Array2<f32>> {
        let obs = BatchTensors::obs_only(obs, &self.device)?;
        tensor_to_array2(&self.actor.deterministic(&obs)?.detach())
    }

    fn act_batch_explore(&mut self, obs: &ArrayD<f32>, _global_step: usize) -> Result<Array2<f32>> {
        let obs = BatchTensors::obs_only(obs, &self.device)?;
        let (act, _) = self.actor.sample(&obs)?;
        tensor_to_array2(&act.detach())
    }

    fn train_on_batch(&mut self, batch: &Batch, update_target: Option<bool>) -> Result<Record> {
        if batch.is_empty() {
            return Ok(Record::empty());
        }
        let t = BatchTensors::from_batch(batch, &self.device)?;

        trace!("update_behavior()");
        let loss_behavior = self.update_behavior(&t)?;

        trace!("update_critic()");
        let record = self.update_critic(&t)?;
        self.policy_updates += 1;

        trace!("update_actor()");
        let mut record = record.merge(self.update_actor(&t.obs)?);
        record.insert("BehaviorLoss", RecordValue::Scalar(loss_behavior));

        if self
            .target_update
            .should_update(self.policy_updates, update_target)
        {
            trace!("soft_update()");
            self.update_target()?;
        }

        Ok(record)
    }

    fn update_target(&mut self) -> Result<()> {
        let tau = self.target_update.tau();
        self.critic.soft_update(tau)?;
        self.actor_tgt.track(&self.actor, tau)
    }

    fn compute_priority(&mut self, batch: &Batch) -> Result<Vec<f32>> {
        if batch.is_empty() {
            return Ok(vec![]);
        }
        let t = BatchTensors::from_batch(batch, &self.device)?;
        let q_target = self.q_target(&t)?;
        let q = self.critic.qvals_min(&t.obs, &t.act)?.detach();
        Ok(q.sub(&q_target)?.abs()?.to_vec1::<f32>()?)
    }

    fn log_tabular(&mut self) -> Record {
        let mut record = Record::from_scalar("DeltaBehavior", self.delta_behavior as f32);
        if let Ok(alpha) = self.alpha.scalar() {
            record.insert("Alpha", RecordValue::Scalar(alpha));
        }
        if let Some(Ok(beta)) = self.beta.as_ref().map(|b| b.scalar()) {
            record.insert("Beta", RecordValue::Scalar(beta));
        }
        record
    }

    fn policy_updates(&self) -> usize {
        self.policy_updates
    }

    fn save_params(&self, path: &Path) -> Result<()> {
        fs::create_dir_all(path)?;
        self.critic.save(path)?;
        self.actor.save(path)?;
        self.actor_tgt.save(path)?;
        self.behavior.save(path)?;
        self.alpha.save(path)?;
        if let Some(beta) = &self.beta {
            beta.save(path)?;
        }
        Ok(())
    }

    fn load_params(&mut self, path: &Path) -> Result<()> {
        self.critic.load(path)?;
        self.actor.load(path)?;
        self.actor_tgt.load(path)?;
        self.behavior.load(path)?;
        self.alpha.load(path)?;
        if let Some(beta) = &mut self.beta {
            beta.load(path)?;
        }
        Ok(())
    }
}

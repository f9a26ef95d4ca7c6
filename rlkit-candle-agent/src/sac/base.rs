use super::{EntCoefMode, SacConfig};
use crate::{
    actor::GaussianActor,
    critic::EnsembleCritic,
    lagrange::Lagrange,
    model::{SubModel1, SubModel2},
    util::{gamma_n, tensor_to_array2, BatchTensors, InDim, OutDim, TargetUpdate},
};
use anyhow::Result;
use candle_core::{Device, Tensor};
use log::trace;
use ndarray::{Array2, ArrayD};
use rlkit_core::{
    record::{Record, RecordValue},
    storage::Batch,
    verify_continuous_action_space, verify_vector_observation_space, Agent, Space,
};
use serde::{de::DeserializeOwned, Serialize};
use std::{fs, path::Path};

/// Soft actor critic (SAC) agent.
pub struct Sac<Q, P>
where
    Q: SubModel2<Input1 = Tensor, Input2 = Tensor, Output = Tensor>,
    P: SubModel1<Input = Tensor, Output = (Tensor, Tensor)>,
{
    critic: EnsembleCritic<Q>,
    actor: GaussianActor<P>,
    ent_coef: Lagrange,
    target_entropy: Option<f64>,
    gamma_n: f64,
    target_update: TargetUpdate,
    reward_scale: f64,
    policy_updates: usize,
    device: Device,
}

impl<Q, P> Sac<Q, P>
where
    Q: SubModel2<Input1 = Tensor, Input2 = Tensor, Output = Tensor>,
    P: SubModel1<Input = Tensor, Output = (Tensor, Tensor)>,
    Q::Config: DeserializeOwned + Serialize + InDim + OutDim + Clone,
    P::Config: DeserializeOwned + Serialize + InDim + OutDim + Clone,
{
    /// Constructs [`Sac`] for the given spaces.
    pub fn build(
        config: SacConfig<Q::Config, P::Config>,
        obs_space: &Space,
        act_space: &Space,
    ) -> Result<Self> {
        let (act_dim, act_lim) = verify_continuous_action_space(act_space)?;
        let obs_dim = verify_vector_observation_space(obs_space)?;
        config.target_update.validate()?;
        let device: Device = config.device.try_into()?;

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

        let (ent_coef, target_entropy) = match config.ent_coef_mode {
            EntCoefMode::Fix(alpha) => (Lagrange::new("alpha", alpha, None, &device)?, None),
            EntCoefMode::Auto {
                init,
                lr,
                target_entropy,
            } => (
                Lagrange::new("alpha", init, Some(lr), &device)?,
                Some(target_entropy.unwrap_or(-(act_dim as f64))),
            ),
        };

        Ok(Self {
            critic: EnsembleCritic::build(critic_config, &device)?,
            actor: GaussianActor::build(actor_config, act_lim as f64, &device, "actor")?,
            ent_coef,
            target_entropy,
            gamma_n: gamma_n(config.gamma, config.n_steps),
            target_update: config.target_update,
            reward_scale: config.reward_scale,
            policy_updates: 0,
            device,
        })
    }

    /// Current entropy coefficient.
    pub fn alpha(&self) -> Result<f32> {
        self.ent_coef.scalar()
    }

    /// `rew / reward_scale + gamma^n * (1 - done) * (min_i Q_tgt_i(s', a') - alpha * log pi(a'|s'))`.
    fn q_target(&self, t: &BatchTensors) -> Result<Tensor> {
        let (next_act, next_logp) = self.actor.sample(&t.next_obs)?;
        let next_q = self.critic.qvals_min_tgt(&t.next_obs, &next_act)?;
        let alpha = self.ent_coef.value()?;
        let next_v = (next_q - alpha.broadcast_mul(&next_logp)?)?;
        let not_done = (1.0 - &t.done)?;
        let q_target = ((&t.rew / self.reward_scale)? + ((not_done * next_v)? * self.gamma_n)?)?;
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
        let (act, logp) = self.actor.sample(obs)?;
        let q = self.critic.qvals_min(obs, &act)?;
        let alpha = self.ent_coef.value()?;
        let loss = (alpha.broadcast_mul(&logp)? - q)?.mean_all()?;
        self.actor.backward_step(&loss)?;

        let mut record = Record::from_slice(&[
            ("LossPi", RecordValue::Scalar(loss.to_scalar::<f32>()?)),
            (
                "LogPi",
                RecordValue::Scalar(logp.mean_all()?.to_scalar::<f32>()?),
            ),
        ]);

        if let Some(target_entropy) = self.target_entropy {
            let violation = (logp.detach() + target_entropy)?;
            let loss_alpha = self.ent_coef.update(&violation)?;
            record.insert("LossAlpha", RecordValue::Scalar(loss_alpha));
        }
        record.insert("Alpha", RecordValue::Scalar(self.ent_coef.scalar()?));
        Ok(record)
    }
}

impl<Q, P> Agent for Sac<Q, P>
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

        trace!("update_critic()");
        let record = self.update_critic(&t)?;
        self.policy_updates += 1;

        trace!("update_actor()");
        let record = record.merge(self.update_actor(&t.obs)?);

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
        self.critic.soft_update(self.target_update.tau())
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
        match self.ent_coef.scalar() {
            Ok(alpha) => Record::from_scalar("Alpha", alpha),
            Err(_) => Record::empty(),
        }
    }

    fn policy_updates(&self) -> usize {
        self.policy_updates
    }

    fn save_params(&self, path: &Path) -> Result<()> {
        fs::create_dir_all(path)?;
        self.critic.save(path)?;
        self.actor.save(path)?;
        self.ent_coef.save(path)?;
        Ok(())
    }

    fn load_params(&mut self, path: &Path) -> Result<()> {
        self.critic.load(path)?;
        self.actor.load(path)?;
        self.ent_coef.load(path)?;
        Ok(())
    }
}

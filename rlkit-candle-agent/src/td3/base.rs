use super::Td3Config;
use crate::{
    actor::DeterministicActor,
    critic::EnsembleCritic,
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

#[cfg_attr(doc, aquamarine::aquamarine)]
/// Twin delayed deep deterministic policy gradient (TD3) agent.
///
/// Each call of [`Agent::train_on_batch`] steps the critics. The actor is
/// stepped once every `policy_update_freq` calls, and the target networks
/// follow the online networks on the [`TargetUpdate`] schedule.
///
/// ```mermaid
/// graph LR
///     B[Batch]-->C[Critic step]
///     C-->|policy_updates % freq == 0|A[Actor step]
///     C-->T{Target due?}
///     A-->T
///     T-->|yes|S[Sync targets]
/// ```
pub struct Td3<Q, P>
where
    Q: SubModel2<Input1 = Tensor, Input2 = Tensor, Output = Tensor>,
    P: SubModel1<Input = Tensor, Output = Tensor>,
{
    critic: EnsembleCritic<Q>,
    actor: DeterministicActor<P>,
    gamma_n: f64,
    target_update: TargetUpdate,
    policy_update_freq: usize,
    actor_noise: f64,
    target_noise: f64,
    noise_clip: f64,
    reward_scale: f64,
    act_lim: f64,
    policy_updates: usize,
    actor_updates: usize,
    target_updates: usize,
    device: Device,
}

impl<Q, P> Td3<Q, P>
where
    Q: SubModel2<Input1 = Tensor, Input2 = Tensor, Output = Tensor>,
    P: SubModel1<Input = Tensor, Output = Tensor>,
    Q::Config: DeserializeOwned + Serialize + InDim + OutDim + Clone,
    P::Config: DeserializeOwned + Serialize + InDim + OutDim + Clone,
{
    /// Constructs [`Td3`] for the given spaces.
    ///
    /// Fails if the action space is not a symmetric 1-dimensional box or
    /// the observation space is not 1-dimensional.
    pub fn build(
        config: Td3Config<Q::Config, P::Config>,
        obs_space: &Space,
        act_space: &Space,
    ) -> Result<Self> {
        let (act_dim, act_lim) = verify_continuous_action_space(act_space)?;
        let obs_dim = verify_vector_observation_space(obs_space)?;
        anyhow::ensure!(
            config.policy_update_freq > 0,
            "policy_update_freq must be positive"
        );
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

        Ok(Self {
            critic: EnsembleCritic::build(critic_config, &device)?,
            actor: DeterministicActor::build(actor_config, act_lim as f64, &device)?,
            gamma_n: gamma_n(config.gamma, config.n_steps),
            target_update: config.target_update,
            policy_update_freq: config.policy_update_freq,
            actor_noise: config.actor_noise,
            target_noise: config.target_noise,
            noise_clip: config.noise_clip,
            reward_scale: config.reward_scale,
            act_lim: act_lim as f64,
            policy_updates: 0,
            actor_updates: 0,
            target_updates: 0,
            device,
        })
    }

    /// Number of actor updates so far.
    pub fn actor_updates(&self) -> usize {
        self.actor_updates
    }

    /// Number of target synchronizations so far.
    pub fn target_updates(&self) -> usize {
        self.target_updates
    }

    /// Target policy action with clipped Gaussian smoothing noise.
    fn smoothed_target_action(&self, next_obs: &Tensor) -> Result<Tensor> {
        let act = self.actor.forward_tgt(next_obs)?;
        if self.target_noise <= 0.0 {
            return Ok(act);
        }
        let noise = (act.randn_like(0.0, 1.0)? * self.target_noise)?
            .clamp(-self.noise_clip, self.noise_clip)?;
        Ok((act + noise)?.clamp(-self.act_lim, self.act_lim)?)
    }

    /// `rew / reward_scale + gamma^n * (1 - done) * min_i Q_tgt_i(next_obs, a')`.
    fn q_target(&self, t: &BatchTensors) -> Result<Tensor> {
        let next_act = self.smoothed_target_action(&t.next_obs)?;
        let next_q = self.critic.qvals_min_tgt(&t.next_obs, &next_act)?;
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

    fn update_actor(&mut self, obs: &Tensor) -> Result<f32> {
        let act = self.actor.forward(obs)?;
        let loss = (self.critic.qvals_min(obs, &act)?.mean_all()? * -1.0)?;
        self.actor.backward_step(&loss)?;
        self.actor_updates += 1;
        Ok(loss.to_scalar::<f32>()?)
    }

    fn sync_target(&mut self) -> Result<()> {
        let tau = self.target_update.tau();
        self.critic.soft_update(tau)?;
        self.actor.soft_update(tau)?;
        self.target_updates += 1;
        Ok(())
    }
}

impl<Q, P> Agent for Td3<Q, P>
where
    Q: SubModel2<Input1 = Tensor, Input2 = Tensor, Output = Tensor>,
    P: SubModel1<Input = Tensor, Output = Tensor>,
    Q::Config: DeserializeOwned + Serialize + InDim + OutDim + Clone,
    P::Config: DeserializeOwned + Serialize + InDim + OutDim + Clone,
{
    fn act_batch_test(&mut self, obs: &ArrayD<f32>) -> Result<Array2<f32>> {
        let obs = BatchTensors::obs_only(obs, &self.device)?;
        tensor_to_array2(&self.actor.forward(&obs)?.detach())
    }

    fn act_batch_explore(&mut self, obs: &ArrayD<f32>, _global_step: usize) -> Result<Array2<f32>> {
        let obs = BatchTensors::obs_only(obs, &self.device)?;
        let act = self.actor.forward(&obs)?.detach();
        let noise = (act.randn_like(0.0, 1.0)? * (self.actor_noise * self.act_lim))?;
        let act = (act + noise)?.clamp(-self.act_lim, self.act_lim)?;
        tensor_to_array2(&act)
    }

    fn train_on_batch(&mut self, batch: &Batch, update_target: Option<bool>) -> Result<Record> {
        if batch.is_empty() {
            return Ok(Record::empty());
        }
        let t = BatchTensors::from_batch(batch, &self.device)?;

        trace!("update_critic()");
        let mut record = self.update_critic(&t)?;
        self.policy_updates += 1;

        if self.policy_updates % self.policy_update_freq == 0 {
            trace!("update_actor()");
            let loss_pi = self.update_actor(&t.obs)?;
            record.insert("LossPi", RecordValue::Scalar(loss_pi));
        }

        if self
            .target_update
            .should_update(self.policy_updates, update_target)
        {
            trace!("sync_target()");
            self.sync_target()?;
        }

        Ok(record)
    }

    fn update_target(&mut self) -> Result<()> {
        self.sync_target()
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
        Record::from_slice(&[
            ("ActorUpdates", RecordValue::Scalar(self.actor_updates as f32)),
            ("TargetUpdates", RecordValue::Scalar(self.target_updates as f32)),
        ])
    }

    fn policy_updates(&self) -> usize {
        self.policy_updates
    }

    fn save_params(&self, path: &Path) -> Result<()> {
        fs::create_dir_all(path)?;
        self.critic.save(path)?;
        self.actor.save(path)?;
        Ok(())
    }

    fn load_params(&mut self, path: &Path) -> Result<()> {
        self.critic.load(path)?;
        self.actor.load(path)?;
        Ok(())
    }
}

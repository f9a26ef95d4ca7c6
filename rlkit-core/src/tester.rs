//! Evaluation of an agent with deterministic actions.
use crate::{
    error::RlError,
    record::{Record, RecordValue, Recorder},
    Agent, VecEnv,
};
use anyhow::Result;
use log::info;

/// Runs test episodes on its own environment.
///
/// All instances are reset at the start of [`Tester::test_agent`].
/// Instances keep running, and are reset when their episode ends, until
/// `num_test_episodes` episodes have ended.
pub struct Tester<E: VecEnv> {
    env: E,
    num_test_episodes: usize,
}

impl<E: VecEnv> Tester<E> {
    pub fn new(env: E, num_test_episodes: usize) -> Self {
        Self {
            env,
            num_test_episodes,
        }
    }

    pub fn num_test_episodes(&self) -> usize {
        self.num_test_episodes
    }

    /// Returns the returns of the test episodes.
    ///
    /// Every episode is stored in `logger` as `TestEpRet` and `TestEpLen`.
    /// A NaN in an action is an error.
    pub fn test_agent(
        &mut self,
        agent: &mut dyn Agent,
        logger: &mut dyn Recorder,
    ) -> Result<Vec<f32>> {
        let num_envs = self.env.num_envs();
        let mut obs = self.env.reset(None)?;
        let mut ep_ret = vec![0f32; num_envs];
        let mut ep_len = vec![0usize; num_envs];
        let mut returns = vec![];

        while returns.len() < self.num_test_episodes {
            let act = agent.act_batch_test(&obs)?;
            if let Some(row) = act.outer_iter().find(|row| row.iter().any(|a| a.is_nan())) {
                return Err(RlError::NanAction(row.to_vec()).into());
            }
            let step = self.env.step(&act)?;
            let is_done = step.is_done();

            for i in 0..num_envs {
                ep_ret[i] += step.reward[i];
                ep_len[i] += 1;
                if is_done[i] && returns.len() < self.num_test_episodes {
                    logger.store(Record::from_slice(&[
                        ("TestEpRet", RecordValue::Scalar(ep_ret[i])),
                        ("TestEpLen", RecordValue::Scalar(ep_len[i] as f32)),
                    ]));
                    returns.push(ep_ret[i]);
                }
                if is_done[i] {
                    ep_ret[i] = 0.0;
                    ep_len[i] = 0;
                }
            }

            obs = match is_done.iter().any(|d| *d) {
                true => self.env.reset(Some(&is_done))?,
                false => step.obs,
            };
        }

        if !returns.is_empty() {
            let mean = returns.iter().sum::<f32>() / returns.len() as f32;
            info!("Tested {} episodes, mean return {}", returns.len(), mean);
        }
        Ok(returns)
    }
}

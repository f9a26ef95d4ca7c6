//! Training loops.
mod config;
mod off_policy;
mod offline;
mod on_policy;
use crate::{
    record::{Record, RecordValue},
    Agent,
};
use anyhow::Result;
pub use config::RunnerConfig;
use log::info;
pub use off_policy::OffPolicyRunner;
pub use offline::OfflineRunner;
pub use on_policy::OnPolicyRunner;
use std::{path::Path, time::Instant};

/// Saves the parameters of `agent` into `{model_dir}/{name}` if `model_dir` is given.
fn save_checkpoint(agent: &dyn Agent, model_dir: &Option<String>, name: &str) -> Result<()> {
    if let Some(model_dir) = model_dir {
        let path = Path::new(model_dir).join(name);
        agent.save_params(&path)?;
        info!("Saved the model in {:?}", &path);
    }
    Ok(())
}

/// Whether a checkpoint is due at the end of `epoch`.
fn is_save_epoch(epoch: usize, save_freq: usize) -> bool {
    save_freq > 0 && epoch % save_freq == 0
}

/// Values recorded at the end of every epoch, followed by the agent's summary.
fn epoch_record(
    epoch: usize,
    values: &[(&str, f32)],
    start: &Instant,
    agent: &mut dyn Agent,
) -> Record {
    let mut record = Record::from_scalar("Epoch", epoch as f32);
    for (k, v) in values {
        record.insert(*k, RecordValue::Scalar(*v));
    }
    record.insert("Time", RecordValue::Scalar(start.elapsed().as_secs_f32()));
    record.merge(agent.log_tabular())
}

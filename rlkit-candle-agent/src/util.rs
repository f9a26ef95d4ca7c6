//! Utilities.
mod distribution;
mod target_update;
mod tensor;
use anyhow::{anyhow, Context, Result};
use candle_nn::VarMap;
pub use distribution::{
    atanh, gaussian_logp, normal_logp, squash_correction, squashed_gaussian_logp,
};
use log::trace;
pub use target_update::TargetUpdate;
pub use tensor::{arrayd_to_tensor, tensor_to_array2, BatchTensors};

/// Applies soft update on variables.
///
/// Variables are identified by their names.
///
/// dest = tau * src + (1.0 - tau) * dest
pub fn track(dest: &VarMap, src: &VarMap, tau: f64) -> Result<()> {
    track_with_replace_substring(dest, src, tau, ("", ""))
}

/// Soft update where the name of a source variable is obtained by replacing
/// `ss_dest` with `ss_src` in the name of the destination variable.
pub fn track_with_replace_substring(
    dest: &VarMap,
    src: &VarMap,
    tau: f64,
    (ss_src, ss_dest): (&str, &str),
) -> Result<()> {
    trace!("Track variables with tau={}", tau);
    let dest = dest.data().lock().map_err(|e| anyhow!("{}", e))?;
    let src = src.data().lock().map_err(|e| anyhow!("{}", e))?;

    for (k_dest, v_dest) in dest.iter() {
        let k_src = match ss_dest.is_empty() {
            true => k_dest.clone(),
            false => k_dest.replace(ss_dest, ss_src),
        };
        let v_src = src
            .get(&k_src)
            .with_context(|| format!("Variable {} not found in the source", k_src))?;
        let t_src = v_src.as_tensor();
        let t_dest = v_dest.as_tensor();
        let t_dest = ((tau * t_src)? + ((1.0 - tau) * t_dest)?)?;
        v_dest.set(&t_dest)?;
    }

    Ok(())
}

/// Discount applied to the bootstrapped value of an `n_steps` return.
pub fn gamma_n(gamma: f64, n_steps: usize) -> f64 {
    gamma.powi(n_steps as i32)
}

/// Interface for handling input dimensions.
pub trait InDim {
    /// Returns the input dimension.
    fn get_in_dim(&self) -> usize;

    /// Sets the input dimension.
    fn set_in_dim(&mut self, v: usize);
}

/// Interface for handling output dimensions.
pub trait OutDim {
    /// Returns the output dimension.
    fn get_out_dim(&self) -> usize;

    /// Sets the output dimension.
    fn set_out_dim(&mut self, v: usize);
}

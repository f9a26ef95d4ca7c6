//! Conversion between ndarray arrays and tensors.
use anyhow::Result;
use candle_core::{Device, Tensor};
use ndarray::{Array2, ArrayD};
use rlkit_core::storage::Batch;

/// Converts an array to a tensor of the same shape.
pub fn arrayd_to_tensor(a: &ArrayD<f32>, device: &Device) -> Result<Tensor> {
    let v = a.iter().copied().collect::<Vec<_>>();
    Ok(Tensor::from_vec(v, a.shape(), device)?)
}

/// Converts an array to a tensor of shape `[n, rest]`.
fn to_2d_tensor(a: &ArrayD<f32>, device: &Device) -> Result<Tensor> {
    let n = a.shape().first().copied().unwrap_or(0);
    let rest = a.shape().iter().skip(1).product::<usize>();
    Ok(arrayd_to_tensor(a, device)?.reshape((n, rest))?)
}

/// Converts a tensor of rank 2 to an array.
pub fn tensor_to_array2(t: &Tensor) -> Result<Array2<f32>> {
    let (n, d) = t.dims2()?;
    let v = t.to_device(&Device::Cpu)?.flatten_all()?.to_vec1::<f32>()?;
    Ok(Array2::from_shape_vec((n, d), v)?)
}

/// Tensors of a training batch.
///
/// Observations are flattened to `[n, obs_dim]`, so stacked frames feed
/// a network as a single vector.
pub struct BatchTensors {
    pub obs: Tensor,
    pub act: Tensor,
    pub next_obs: Tensor,

    /// Shape `[n]`.
    pub rew: Tensor,

    /// Shape `[n]`, `1.0` for terminal transitions.
    pub done: Tensor,

    /// Importance weights of shape `[n]`, ones for uniform batches.
    pub weights: Tensor,
}

impl BatchTensors {
    pub fn from_batch(batch: &Batch, device: &Device) -> Result<Self> {
        let n = batch.len();
        let weights = match batch.weights() {
            Some(w) => Tensor::from_slice(w, (n,), device)?,
            None => Tensor::ones((n,), candle_core::DType::F32, device)?,
        };

        Ok(Self {
            obs: to_2d_tensor(batch.obs()?, device)?,
            act: to_2d_tensor(batch.act()?, device)?,
            next_obs: to_2d_tensor(batch.next_obs()?, device)?,
            rew: arrayd_to_tensor(batch.rew()?, device)?.reshape((n,))?,
            done: arrayd_to_tensor(batch.done()?, device)?.reshape((n,))?,
            weights,
        })
    }

    /// Observations only, for acting.
    pub fn obs_only(obs: &ArrayD<f32>, device: &Device) -> Result<Tensor> {
        to_2d_tensor(obs, device)
    }
}

//! Multilayer perceptron.
mod base;
mod config;
mod gaussian;
use crate::Activation;
use anyhow::Result;
pub use base::Mlp;
use candle_core::Tensor;
use candle_nn::{linear, Linear, Module, VarBuilder};
pub use config::MlpConfig;
pub use gaussian::GaussianMlp;

/// Returns linear layers `in_dim -> units[0] -> ... -> units[n-1]`.
fn hidden_layers(vs: &VarBuilder, in_dim: usize, units: &[usize]) -> Result<Vec<Linear>> {
    let mut dims = vec![in_dim];
    dims.extend_from_slice(units);
    let layers = dims
        .windows(2)
        .enumerate()
        .map(|(i, d)| linear(d[0], d[1], vs.pp(format!("ln{}", i))))
        .collect::<candle_core::Result<Vec<_>>>()?;
    Ok(layers)
}

/// Applies the layers with ReLU in between and `final_act` after the last one.
fn mlp_forward(xs: &Tensor, layers: &[Linear], final_act: &Activation) -> Result<Tensor> {
    let mut xs = xs.clone();
    let n_layers = layers.len();
    for (i, layer) in layers.iter().enumerate() {
        xs = layer.forward(&xs)?;
        if i + 1 < n_layers {
            xs = xs.relu()?;
        }
    }
    final_act.forward(&xs)
}

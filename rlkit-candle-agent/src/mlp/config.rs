use crate::{
    util::{InDim, OutDim},
    Activation,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
/// Configuration of [`Mlp`](super::Mlp) and [`GaussianMlp`](super::GaussianMlp).
pub struct MlpConfig {
    pub(super) in_dim: usize,
    pub(super) units: Vec<usize>,
    pub(super) out_dim: usize,
    pub(super) activation_out: Activation,
}

impl MlpConfig {
    /// Creates configuration of MLP.
    ///
    /// * `units` - Sizes of the hidden layers.
    /// * `activation_out` - Activation of the final layer.
    pub fn new(
        in_dim: usize,
        units: Vec<usize>,
        out_dim: usize,
        activation_out: Activation,
    ) -> Self {
        Self {
            in_dim,
            units,
            out_dim,
            activation_out,
        }
    }
}

impl InDim for MlpConfig {
    fn get_in_dim(&self) -> usize {
        self.in_dim
    }

    fn set_in_dim(&mut self, in_dim: usize) {
        self.in_dim = in_dim;
    }
}

impl OutDim for MlpConfig {
    fn get_out_dim(&self) -> usize {
        self.out_dim
    }

    fn set_out_dim(&mut self, out_dim: usize) {
        self.out_dim = out_dim;
    }
}

use super::{hidden_layers, mlp_forward, MlpConfig};
use crate::model::{SubModel1, SubModel2};
use anyhow::Result;
use candle_core::{Device, Tensor, D};
use candle_nn::{linear, Linear, VarBuilder};

/// Multilayer perceptron with ReLU activation function.
///
/// As a [`SubModel2`], the two inputs are concatenated along the last
/// dimension, as for an action-value function `Q(obs, act)`.
pub struct Mlp {
    config: MlpConfig,
    device: Device,
    layers: Vec<Linear>,
}

impl Mlp {
    fn _build(vs: VarBuilder, config: MlpConfig) -> Result<Self> {
        let device = vs.device().clone();
        let vs = vs.pp("mlp");
        let mut layers = hidden_layers(&vs, config.in_dim, &config.units)?;
        let last = config.units.last().copied().unwrap_or(config.in_dim);
        let ix = layers.len();
        layers.push(linear(last, config.out_dim, vs.pp(format!("ln{}", ix)))?);

        Ok(Self {
            config,
            device,
            layers,
        })
    }
}

impl SubModel1 for Mlp {
    type Config = MlpConfig;
    type Input = Tensor;
    type Output = Tensor;

    fn forward(&self, xs: &Self::Input) -> Result<Tensor> {
        let xs = xs.to_device(&self.device)?;
        mlp_forward(&xs, &self.layers, &self.config.activation_out)
    }

    fn build(vs: VarBuilder, config: Self::Config) -> Result<Self> {
        Self::_build(vs, config)
    }
}

impl SubModel2 for Mlp {
    type Config = MlpConfig;
    type Input1 = Tensor;
    type Input2 = Tensor;
    type Output = Tensor;

    fn forward(&self, input1: &Self::Input1, input2: &Self::Input2) -> Result<Tensor> {
        let input1 = input1.to_device(&self.device)?;
        let input2 = input2.to_device(&self.device)?;
        let input = Tensor::cat(&[input1, input2], D::Minus1)?;
        mlp_forward(&input, &self.layers, &self.config.activation_out)
    }

    fn build(vs: VarBuilder, config: Self::Config) -> Result<Self> {
        Self::_build(vs, config)
    }
}

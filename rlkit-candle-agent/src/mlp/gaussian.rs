use super::{hidden_layers, mlp_forward, MlpConfig};
use crate::{model::SubModel1, Activation};
use anyhow::Result;
use candle_core::{Device, Module, Tensor};
use candle_nn::{linear, Linear, VarBuilder};

/// Multilayer perceptron with two heads, the mean and the log standard
/// deviation of a diagonal Gaussian.
///
/// The final activation of the config is not used.
pub struct GaussianMlp {
    device: Device,
    layers: Vec<Linear>,
    mean: Linear,
    log_std: Linear,
}

impl SubModel1 for GaussianMlp {
    type Config = MlpConfig;
    type Input = Tensor;
    type Output = (Tensor, Tensor);

    fn forward(&self, xs: &Self::Input) -> Result<Self::Output> {
        let xs = xs.to_device(&self.device)?;
        let xs = mlp_forward(&xs, &self.layers, &Activation::ReLU)?;
        Ok((self.mean.forward(&xs)?, self.log_std.forward(&xs)?))
    }

    fn build(vs: VarBuilder, config: Self::Config) -> Result<Self> {
        let device = vs.device().clone();
        let layers = hidden_layers(&vs.pp("mlp"), config.in_dim, &config.units)?;
        let last = config.units.last().copied().unwrap_or(config.in_dim);
        let mean = linear(last, config.out_dim, vs.pp("mean"))?;
        let log_std = linear(last, config.out_dim, vs.pp("log_std"))?;

        Ok(Self {
            device,
            layers,
            mean,
            log_std,
        })
    }
}

//! Optimizers.
use anyhow::Result;
use candle_core::{Tensor, Var};
use candle_nn::Optimizer as _;
use candle_optimisers::adam::{Adam, ParamsAdam};
use serde::{Deserialize, Serialize};

/// Configuration of the optimizer of a network or a multiplier.
///
/// In YAML the variant is written as a map key, e.g. `Adam: { lr: 0.001 }`.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub enum OptimizerConfig {
    /// Adam with the default moment coefficients and no weight decay.
    Adam { lr: f64 },
}

impl OptimizerConfig {
    /// Constructs an optimizer over `vars`.
    pub fn build(&self, vars: Vec<Var>) -> Result<Optimizer> {
        let Self::Adam { lr } = self;
        let params = ParamsAdam {
            lr: *lr,
            ..ParamsAdam::default()
        };
        Ok(Optimizer {
            inner: Adam::new(vars, params)?,
        })
    }

    /// Overrides the learning rate.
    pub fn learning_rate(self, lr: f64) -> Self {
        match self {
            Self::Adam { .. } => Self::Adam { lr },
        }
    }

    pub fn lr(&self) -> f64 {
        let Self::Adam { lr } = self;
        *lr
    }
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self::Adam { lr: 3e-4 }
    }
}

/// Optimizer bound to the variables it was built with.
pub struct Optimizer {
    inner: Adam,
}

impl Optimizer {
    /// Computes the gradients of `loss` and applies one step.
    pub fn backward_step(&mut self, loss: &Tensor) -> Result<()> {
        Ok(self.inner.backward_step(loss)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::{DType, Device};

    #[test]
    fn test_learning_rate_override() {
        let config = OptimizerConfig::default().learning_rate(1e-3);
        assert_eq!(config, OptimizerConfig::Adam { lr: 1e-3 });
        assert_eq!(config.lr(), 1e-3);
    }

    #[test]
    fn test_yaml_config() -> Result<()> {
        let config: OptimizerConfig = serde_yaml::from_str("Adam:\n  lr: 0.001\n")?;
        assert_eq!(config.lr(), 0.001);
        Ok(())
    }

    #[test]
    fn test_step_reduces_loss() -> Result<()> {
        let x = Var::ones(3, DType::F32, &Device::Cpu)?;
        let mut opt = OptimizerConfig::Adam { lr: 0.1 }.build(vec![x.clone()])?;
        let loss = |x: &Var| -> Result<Tensor> { Ok(x.as_tensor().sqr()?.sum_all()?) };

        let before = loss(&x)?.to_scalar::<f32>()?;
        for _ in 0..5 {
            opt.backward_step(&loss(&x)?)?;
        }
        assert!(loss(&x)?.to_scalar::<f32>()? < before);
        Ok(())
    }
}

//! Lagrange multipliers, e.g. the entropy coefficient of SAC.
use crate::opt::{Optimizer, OptimizerConfig};
use anyhow::Result;
use candle_core::{DType, Device, Tensor};
use candle_nn::{init::Init, VarBuilder, VarMap};
use log::info;
use std::path::Path;

/// A positive multiplier `exp(log_value)`.
///
/// [`Lagrange::update`] raises the multiplier while the constraint is
/// violated (positive violation) and lowers it otherwise. Without a
/// learning rate the multiplier stays fixed.
pub struct Lagrange {
    name: String,
    varmap: VarMap,
    log_value: Tensor,
    opt: Option<Optimizer>,
}

impl Lagrange {
    /// Constructs a multiplier starting at `init`, which must be positive.
    pub fn new(name: &str, init: f64, lr: Option<f64>, device: &Device) -> Result<Self> {
        anyhow::ensure!(init > 0.0, "Initial value of {} must be positive: {}", name, init);
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, device);
        let log_value = vb.get_with_hints(1, &format!("log_{}", name), Init::Const(init.ln()))?;
        let opt = match lr {
            Some(lr) => Some(OptimizerConfig::Adam { lr }.build(varmap.all_vars())?),
            None => None,
        };

        Ok(Self {
            name: name.to_string(),
            varmap,
            log_value,
            opt,
        })
    }

    /// The multiplier as a detached tensor of shape `[1]`.
    pub fn value(&self) -> Result<Tensor> {
        Ok(self.log_value.detach().exp()?)
    }

    /// The multiplier as a float.
    pub fn scalar(&self) -> Result<f32> {
        Ok(self.value()?.to_vec1::<f32>()?[0])
    }

    /// Takes one step on `-mean(log_value * violation)` and returns the loss.
    pub fn update(&mut self, violation: &Tensor) -> Result<f32> {
        let loss = self.log_value.broadcast_mul(&violation.detach())?;
        let loss = (loss.mean_all()? * -1.0)?;
        if let Some(opt) = &mut self.opt {
            opt.backward_step(&loss)?;
        }
        Ok(loss.to_scalar::<f32>()?)
    }

    /// Saves the multiplier to `{path}/{name}.pt`.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref().join(format!("{}.pt", self.name));
        self.varmap.save(&path)?;
        info!("Save {} to {:?}", self.name, path);
        Ok(())
    }

    /// Loads the multiplier from `{path}/{name}.pt`.
    pub fn load(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref().join(format!("{}.pt", self.name));
        self.varmap.load(&path)?;
        info!("Load {} from {:?}", self.name, path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_follows_violation_sign() -> Result<()> {
        let mut alpha = Lagrange::new("alpha", 1.0, Some(0.01), &Device::Cpu)?;
        let positive = Tensor::from_slice(&[0.5f32, 1.0, 2.0], (3,), &Device::Cpu)?;
        for _ in 0..10 {
            alpha.update(&positive)?;
        }
        let raised = alpha.scalar()?;
        assert!(raised > 1.0);

        let negative = (positive * -1.0)?;
        for _ in 0..20 {
            alpha.update(&negative)?;
        }
        assert!(alpha.scalar()? < raised);
        Ok(())
    }

    #[test]
    fn test_fixed_multiplier() -> Result<()> {
        let mut beta = Lagrange::new("beta", 0.2, None, &Device::Cpu)?;
        let violation = Tensor::from_slice(&[3.0f32], (1,), &Device::Cpu)?;
        beta.update(&violation)?;
        assert!((beta.scalar()? - 0.2).abs() < 1e-6);
        assert!(Lagrange::new("beta", 0.0, None, &Device::Cpu).is_err());
        Ok(())
    }

    #[test]
    fn test_save_and_load() -> Result<()> {
        let dir = tempdir::TempDir::new("lagrange")?;
        let mut alpha = Lagrange::new("alpha", 2.0, Some(0.1), &Device::Cpu)?;
        alpha.save(dir.path())?;
        let violation = Tensor::from_slice(&[1.0f32], (1,), &Device::Cpu)?;
        alpha.update(&violation)?;
        assert!(alpha.scalar()? > 2.0);

        alpha.load(dir.path())?;
        assert!((alpha.scalar()? - 2.0).abs() < 1e-5);
        Ok(())
    }
}

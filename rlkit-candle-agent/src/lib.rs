//! RL agents implemented with [candle](https://crates.io/crates/candle-core).
//!
//! Agents implement [`rlkit_core::Agent`], so they plug into the samplers,
//! updaters and runners of `rlkit-core`.
pub mod actor;
pub mod brac;
pub mod critic;
pub mod lagrange;
pub mod mlp;
pub mod model;
pub mod opt;
pub mod sac;
pub mod td3;
pub mod util;
use anyhow::Result;
use candle_core::Tensor;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Copy, Deserialize, Serialize, PartialEq)]
/// Device for using candle.
///
/// This enum is added because [`candle_core::Device`] does not support serialization.
pub enum Device {
    /// The main CPU device.
    Cpu,

    /// The main GPU device.
    Cuda(usize),
}

impl TryFrom<Device> for candle_core::Device {
    type Error = candle_core::Error;

    fn try_from(device: Device) -> Result<Self, Self::Error> {
        match device {
            Device::Cpu => Ok(candle_core::Device::Cpu),
            Device::Cuda(n) => candle_core::Device::new_cuda(n),
        }
    }
}

/// Activation applied to the output of a network.
#[derive(Clone, Debug, Copy, Deserialize, Serialize, PartialEq)]
pub enum Activation {
    /// Identity.
    None,

    ReLU,

    Tanh,
}

impl Activation {
    pub fn forward(&self, xs: &Tensor) -> Result<Tensor> {
        Ok(match self {
            Self::None => xs.clone(),
            Self::ReLU => xs.relu()?,
            Self::Tanh => xs.tanh()?,
        })
    }
}

//! Log densities of diagonal Gaussians and their tanh-squashed versions.
use anyhow::Result;
use candle_core::{Tensor, D};

const SQUASH_EPS: f64 = 1e-6;

fn half_ln_2pi() -> f64 {
    0.5 * (2.0 * std::f64::consts::PI).ln()
}

/// Log density of the standard normal, summed over the last dimension.
pub fn normal_logp(z: &Tensor) -> Result<Tensor> {
    Ok(((z.sqr()? * -0.5)? - half_ln_2pi())?.sum(D::Minus1)?)
}

/// Log density of `x` under `N(mean, exp(log_std)^2)`, summed over the last dimension.
pub fn gaussian_logp(x: &Tensor, mean: &Tensor, log_std: &Tensor) -> Result<Tensor> {
    let z = ((x - mean)? / log_std.exp()?)?;
    Ok((normal_logp(&z)? - log_std.sum(D::Minus1)?)?)
}

/// Inverse of tanh. `a` is clamped into the open interval `(-1, 1)`.
pub fn atanh(a: &Tensor) -> Result<Tensor> {
    let a = a.clamp(-1.0 + SQUASH_EPS, 1.0 - SQUASH_EPS)?;
    let ratio = ((1.0 + &a)? / (1.0 - &a)?)?;
    Ok((ratio.log()? * 0.5)?)
}

/// `sum(log(1 - a^2 + eps))` over the last dimension, where `a = tanh(u)`.
pub fn squash_correction(a: &Tensor) -> Result<Tensor> {
    Ok(((1.0 - a.sqr()?)? + SQUASH_EPS)?.log()?.sum(D::Minus1)?)
}

/// Log density of the squashed action `a = tanh(u)` with `u ~ N(mean, std^2)`.
pub fn squashed_gaussian_logp(a: &Tensor, mean: &Tensor, log_std: &Tensor) -> Result<Tensor> {
    let u = atanh(a)?;
    Ok((gaussian_logp(&u, mean, log_std)? - squash_correction(a)?)?)
}

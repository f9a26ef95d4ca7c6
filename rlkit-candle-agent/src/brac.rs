//! Behavior regularized actor critic with adaptive multipliers (BRAC+).
//!
//! An offline agent. The policy maximizes the ensemble-min action value
//! while its KL divergence from a behavior policy, fitted on the dataset
//! by maximum likelihood, is kept under `delta_behavior` by the multiplier
//! `alpha`. With `entropy_reg`, the multiplier `beta` keeps the entropy
//! of the policy near `target_entropy`.
mod base;
mod config;
pub use base::BracPlus;
pub use config::BracConfig;

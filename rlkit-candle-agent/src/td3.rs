//! Twin delayed deep deterministic policy gradient (TD3) agent.
//!
//! DDPG is obtained with one critic, `target_noise = 0` and
//! `policy_update_freq = 1`.
mod base;
mod config;
pub use base::Td3;
pub use config::Td3Config;

//! Core of rlkit, a library for off-policy reinforcement learning.
//!
//! This crate does not depend on any deep learning backend. It provides
//! spaces and the vectorized environment interface, replay storage and
//! buffers, samplers, the [`Agent`] interface, updaters, a tester and
//! runners. Agents are implemented in backend crates.
pub mod dummy;
pub mod error;
pub mod record;
pub mod replay_buffer;
pub mod runner;
pub mod sampler;
pub mod storage;
pub mod tester;
pub mod updater;
pub mod util;

mod base;
pub use base::{
    verify_continuous_action_space, verify_vector_observation_space, Agent,
    ExperienceBufferBase, ReplayBufferBase, Space, VecEnv, VecStep,
};
pub use replay_buffer::{PrioritizedReplayBuffer, UniformReplayBuffer};
pub use runner::{OffPolicyRunner, OfflineRunner, OnPolicyRunner, RunnerConfig};

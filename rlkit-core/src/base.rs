//! Core interfaces.
mod agent;
mod env;
mod replay_buffer;
mod space;
pub use agent::Agent;
pub use env::{VecEnv, VecStep};
pub use replay_buffer::{ExperienceBufferBase, ReplayBufferBase};
pub use space::{verify_continuous_action_space, verify_vector_observation_space, Space};

//! Actors for continuous actions.
//!
//! Both actors squash their outputs with `tanh` and scale them by the
//! action bound, so actions lie in `[-act_lim, act_lim]`.
mod deterministic;
mod gaussian;
pub use deterministic::{DeterministicActor, DeterministicActorConfig};
pub use gaussian::{GaussianActor, GaussianActorConfig};

//! Replay buffers built on [`DictStorage`](crate::storage::DictStorage).
//!
//! [`UniformReplayBuffer`] samples uniformly with replacement.
//! [`PrioritizedReplayBuffer`] samples proportionally to the TD error
//! of the transitions and attaches importance weights to the batch.
mod config;
mod iw_scheduler;
mod prioritized;
mod sum_tree;
mod uniform;
pub use config::{PerConfig, ReplayBufferConfig};
pub use iw_scheduler::IwScheduler;
pub use prioritized::PrioritizedReplayBuffer;
pub use sum_tree::SumTree;
pub use uniform::UniformReplayBuffer;

#![warn(missing_docs)]
//! Core traits of policies for meta-reinforcement learning.
//!
//! The crate is independent of any tensor library. Implementations choose
//! the tensor type and the representation of named parameters through the
//! associated types of [`Policy`].
pub mod error;
pub mod record;

mod base;
pub use base::{
    Actions, AgentInfo, DistInfo, Distribution, MetaPolicy, Policy, PolicyState, Rollout,
    UpdateMode,
};

mod config;
pub use config::{Activation, Configurable, PolicyConfig};

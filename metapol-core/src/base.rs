//! Core functionalities.
mod distribution;
mod meta_policy;
mod policy;
pub use distribution::{DistInfo, Distribution};
pub use meta_policy::{MetaPolicy, UpdateMode};
pub use policy::{Policy, PolicyState};

use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Distribution information of a single action, keyed like
/// [`Distribution::dist_info_keys`].
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentInfo(BTreeMap<String, Vec<f32>>);

impl AgentInfo {
    /// Creates an empty object.
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Inserts a value.
    pub fn insert(&mut self, k: impl Into<String>, v: Vec<f32>) {
        self.0.insert(k.into(), v);
    }

    /// Returns the value of the given key.
    pub fn get(&self, k: &str) -> Option<&Vec<f32>> {
        self.0.get(k)
    }

    /// Returns an iterator over the keys in order.
    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.0.keys()
    }
}

/// Actions for a meta batch of tasks.
#[derive(Debug, Clone)]
pub struct Actions {
    /// Actions of each task, `batch_size x action_dim`.
    pub actions: Vec<Array2<f32>>,

    /// Distribution information of each action in each task.
    pub agent_infos: Vec<Vec<AgentInfo>>,
}

impl Actions {
    /// Returns the number of tasks.
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    /// Returns `true` if there is no task.
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}

/// A path collected by running a policy in an environment.
#[derive(Debug, Clone)]
pub struct Rollout {
    /// Observations, `path_length x obs_dim`.
    pub observations: Array2<f32>,

    /// Actions, `path_length x action_dim`.
    pub actions: Array2<f32>,

    /// Rewards.
    pub rewards: Array1<f32>,

    /// Distribution information of each action.
    pub agent_infos: Vec<AgentInfo>,
}

impl Rollout {
    /// Returns the length of the path.
    pub fn len(&self) -> usize {
        self.rewards.len()
    }

    /// Returns `true` if the path has no step.
    pub fn is_empty(&self) -> bool {
        self.rewards.is_empty()
    }
}

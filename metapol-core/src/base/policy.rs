//! Policy.
use super::{Actions, AgentInfo, DistInfo, Distribution, Rollout};
use crate::{record::Record, PolicyConfig};
use anyhow::Result;
use ndarray::{Array1, Array2};
use std::path::Path;

/// State of a policy: its constructor arguments and the values of its parameters.
///
/// A policy restored from a state is equivalent to the one the state was taken from.
#[derive(Debug, Clone)]
pub struct PolicyState<P> {
    /// Arguments with which the network is built.
    pub init_args: PolicyConfig,

    /// Values of the trainable parameters.
    pub network_params: P,
}

/// A parameterized stochastic policy.
///
/// The policy owns its trainable variables. In addition,
/// [`distribution_info_sym`](Policy::distribution_info_sym) can evaluate the
/// same network with externally supplied parameter values, leaving the owned
/// variables untouched.
pub trait Policy {
    /// Tensor type for symbolic inputs and outputs.
    type Tensor;

    /// Named parameters of the network.
    type Params: Clone;

    /// Action distribution.
    type Dist: Distribution<Tensor = Self::Tensor>;

    /// Returns the configuration the policy was built with.
    fn config(&self) -> &PolicyConfig;

    /// Builds the network of the policy.
    ///
    /// Existing variables are discarded and initialized again.
    fn build_graph(&mut self) -> Result<()>;

    /// Runs a single observation through the policy.
    fn get_action(&mut self, observation: &Array1<f32>) -> Result<(Array1<f32>, AgentInfo)>;

    /// Runs batches of observations through the policy.
    ///
    /// `observations[i]` is a `batch_size x obs_dim` array of task `i`.
    fn get_actions(&mut self, observations: &[Array2<f32>]) -> Result<Actions>;

    /// Resets internal states of the policy, if any.
    fn reset(&mut self, _dones: Option<&[bool]>) {}

    /// Returns extra information per iteration based on the collected paths.
    fn log_diagnostics(&self, _paths: &[Rollout]) -> Record {
        Record::empty()
    }

    /// Returns the action distribution of the policy.
    fn distribution(&self) -> &Self::Dist;

    /// Returns the parameters of the action distribution given observations.
    ///
    /// If `params` is `None`, the variables of the policy are used.
    /// Otherwise the network is evaluated with `params`.
    fn distribution_info_sym(
        &self,
        obs: &Self::Tensor,
        params: Option<&Self::Params>,
    ) -> Result<DistInfo<Self::Tensor>>;

    /// Returns the keys of [`DistInfo`] returned by the policy.
    fn distribution_info_keys(&self) -> &'static [&'static str] {
        self.distribution().dist_info_keys()
    }

    /// Returns handles of the trainable variables.
    fn get_params(&self) -> Self::Params;

    /// Returns a copy of the current values of the trainable variables.
    fn get_param_values(&self) -> Result<Self::Params>;

    /// Sets the values of the trainable variables.
    ///
    /// Keys and shapes of `params` must match those of the variables.
    fn set_params(&mut self, params: &Self::Params) -> Result<()>;

    /// Returns the state of the policy.
    fn get_state(&self) -> Result<PolicyState<Self::Params>> {
        Ok(PolicyState {
            init_args: self.config().clone(),
            network_params: self.get_param_values()?,
        })
    }

    /// Rebuilds the policy from a state.
    fn set_state(&mut self, state: PolicyState<Self::Params>) -> Result<()>;

    /// Saves the state of the policy in the given directory.
    fn save(&self, path: &Path) -> Result<()>;

    /// Loads the state of the policy from the given directory.
    fn load(&mut self, path: &Path) -> Result<()>;
}

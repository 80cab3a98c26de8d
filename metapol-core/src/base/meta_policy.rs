//! Meta-policy.
use super::{Actions, Policy};
use crate::error::PolicyError;
use anyhow::Result;
use log::info;
use ndarray::Array2;

/// Which parameters a [`MetaPolicy`] uses for sampling actions.
#[derive(Debug, Clone)]
pub enum UpdateMode<P> {
    /// The variables owned by the policy are used for all tasks.
    PreUpdate,

    /// Task `i` uses the `i`-th parameters.
    PostUpdate(Vec<P>),
}

impl<P> UpdateMode<P> {
    /// Returns `true` in pre-update mode.
    pub fn is_pre_update(&self) -> bool {
        matches!(self, Self::PreUpdate)
    }

    /// Returns the per-task parameters in post-update mode.
    pub fn task_params(&self) -> Option<&[P]> {
        match self {
            Self::PreUpdate => None,
            Self::PostUpdate(params) => Some(params),
        }
    }
}

impl<P> Default for UpdateMode<P> {
    fn default() -> Self {
        Self::PreUpdate
    }
}

#[cfg_attr(doc, aquamarine::aquamarine)]
/// A policy holding pre-update and per-task post-update parameters.
///
/// In a meta-learning inner loop, trajectories are first sampled with the
/// pre-update parameters, the caller adapts a copy of the parameters for each
/// task, and trajectories are sampled again with the adapted parameters:
///
/// ```mermaid
/// graph LR
///     Pre[PreUpdate] -->|update_task_parameters| Post[PostUpdate]
///     Post -->|switch_to_pre_update| Pre
///     Post -->|update_task_parameters| Post
/// ```
///
/// The adapted parameters are never written into the variables of the policy.
pub trait MetaPolicy: Policy {
    /// Number of tasks in a meta batch.
    fn meta_batch_size(&self) -> usize;

    /// Returns the current mode.
    fn update_mode(&self) -> &UpdateMode<Self::Params>;

    /// Returns the current mode as mutable reference.
    fn update_mode_mut(&mut self) -> &mut UpdateMode<Self::Params>;

    /// Checks that `params` can be used in place of the variables of the policy.
    fn check_task_params(&self, params: &Self::Params) -> Result<()>;

    /// Creates parameter slots for the trainable variables under each scope.
    ///
    /// The returned value is indexed by scope and then by task. Each slot has
    /// the same keys, with the scope removed, and shapes as the variables.
    fn create_placeholders_for_vars(
        &self,
        scopes: &[&str],
        meta_batch_size: usize,
    ) -> Result<Vec<Vec<Self::Params>>>;

    /// Samples actions of all tasks with the variables of the policy.
    fn get_pre_update_actions(&mut self, observations: &[Array2<f32>]) -> Result<Actions>;

    /// Samples actions of each task with the corresponding task parameters.
    ///
    /// Fails with [`PolicyError::NotPostUpdate`] in pre-update mode.
    fn get_post_update_actions(&mut self, observations: &[Array2<f32>]) -> Result<Actions>;

    /// Returns `true` in pre-update mode.
    fn is_pre_update(&self) -> bool {
        self.update_mode().is_pre_update()
    }

    /// Switches to the pre-update policy, dropping task parameters.
    fn switch_to_pre_update(&mut self) {
        if !self.is_pre_update() {
            info!("Switch to pre-update policy");
        }
        *self.update_mode_mut() = UpdateMode::PreUpdate;
    }

    /// Sets parameters of each task and switches to the post-update policy.
    ///
    /// The mode is unchanged if any of the parameters is invalid.
    fn update_task_parameters(&mut self, params: Vec<Self::Params>) -> Result<()> {
        let meta_batch_size = self.meta_batch_size();
        if params.len() != meta_batch_size {
            return Err(PolicyError::MetaBatchSizeMismatch {
                expected: meta_batch_size,
                got: params.len(),
            }
            .into());
        }
        for p in params.iter() {
            self.check_task_params(p)?;
        }
        info!("Update parameters of {} tasks", meta_batch_size);
        *self.update_mode_mut() = UpdateMode::PostUpdate(params);
        Ok(())
    }

    /// Samples actions with the parameters of the current mode.
    fn get_meta_actions(&mut self, observations: &[Array2<f32>]) -> Result<Actions> {
        let meta_batch_size = self.meta_batch_size();
        if observations.len() != meta_batch_size {
            return Err(PolicyError::MetaBatchSizeMismatch {
                expected: meta_batch_size,
                got: observations.len(),
            }
            .into());
        }
        if self.is_pre_update() {
            self.get_pre_update_actions(observations)
        } else {
            self.get_post_update_actions(observations)
        }
    }
}

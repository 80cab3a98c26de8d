//! Errors in the library.
use thiserror::Error;

/// Errors raised by policies.
#[derive(Error, Debug, PartialEq)]
pub enum PolicyError {
    /// The keys of a parameter dictionary differ from those of the policy.
    #[error("parameter keys must match with variables: expected {expected:?}, got {got:?}")]
    ParamKeyMismatch {
        /// Keys of the policy.
        expected: Vec<String>,
        /// Keys of the given dictionary.
        got: Vec<String>,
    },

    /// A parameter has a different shape from the corresponding variable.
    #[error("shape of parameter {name} must be {expected:?}, got {got:?}")]
    ParamShapeMismatch {
        /// Name of the parameter.
        name: String,
        /// Shape of the variable.
        expected: Vec<usize>,
        /// Shape of the given value.
        got: Vec<usize>,
    },

    /// The number of tasks differs from the meta batch size.
    #[error("meta batch size is {expected}, got {got} tasks")]
    MetaBatchSizeMismatch {
        /// Meta batch size of the policy.
        expected: usize,
        /// Number of given tasks.
        got: usize,
    },

    /// An observation has a wrong dimension.
    #[error("observation dimension is {expected}, got {got}")]
    ObsDimMismatch {
        /// Observation dimension of the policy.
        expected: usize,
        /// Given dimension.
        got: usize,
    },

    /// A key is missing in distribution information.
    #[error("distribution info has no key {0}")]
    DistInfoKey(String),

    /// Invalid configuration.
    #[error("invalid policy configuration: {0}")]
    InvalidConfig(String),

    /// Post-update actions were requested before task parameters were given.
    #[error("policy is in pre-update mode, call update_task_parameters first")]
    NotPostUpdate,
}

/// Errors in accessing [`Record`](crate::record::Record).
#[derive(Error, Debug, PartialEq)]
pub enum RecordError {
    /// Record key error.
    #[error("Record key error: {0}")]
    KeyError(String),

    /// Record value type error.
    #[error("Record value type error: {0}")]
    ValueTypeError(String),
}

//! Gaussian MLP policies.
mod gaussian_mlp;
mod meta_gaussian_mlp;
pub use gaussian_mlp::GaussianMlpPolicy;
pub use meta_gaussian_mlp::{MetaGaussianMlpPolicy, MetaGaussianMlpPolicyConfig};

/// File name of the configuration in a saved policy directory.
pub const CONFIG_FILE: &str = "policy.yaml";

/// File name of the parameters in a saved policy directory.
pub const PARAMS_FILE: &str = "params.safetensors";

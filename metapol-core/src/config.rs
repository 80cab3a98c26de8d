//! Configuration of policies.
use crate::error::PolicyError;
use anyhow::Result;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, Write},
    path::Path,
};

/// Activation functions of networks.
#[derive(Debug, Deserialize, Serialize, PartialEq, Eq, Clone, Copy)]
pub enum Activation {
    /// Hyperbolic tangent.
    Tanh,

    /// Rectified linear unit.
    Relu,

    /// Logistic sigmoid.
    Sigmoid,

    /// No activation.
    Identity,
}

/// Constructor arguments of a policy.
///
/// A policy keeps this configuration so that it can be rebuilt when its state
/// is restored, see [`PolicyState`](crate::PolicyState).
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct PolicyConfig {
    /// Dimension of the observation space, the input size of the policy.
    pub obs_dim: usize,

    /// Dimension of the action space, the output size of the policy.
    pub action_dim: usize,

    /// Name used for scoping variables of the policy.
    #[serde(default = "default_name")]
    pub name: String,

    /// Sizes of hidden layers.
    #[serde(default = "default_hidden_sizes")]
    pub hidden_sizes: Vec<usize>,

    /// If `true`, the log standard deviation is a trainable parameter.
    #[serde(default = "default_learn_std")]
    pub learn_std: bool,

    /// Initial standard deviation of actions.
    #[serde(default = "default_init_std")]
    pub init_std: f64,

    /// Lower bound of the standard deviation.
    #[serde(default = "default_min_std")]
    pub min_std: f64,

    /// Activation between hidden layers.
    #[serde(default = "default_hidden_nonlinearity")]
    pub hidden_nonlinearity: Activation,

    /// Activation after the final layer.
    #[serde(default)]
    pub output_nonlinearity: Option<Activation>,
}

fn default_name() -> String {
    "policy".to_string()
}

fn default_hidden_sizes() -> Vec<usize> {
    vec![32, 32]
}

fn default_learn_std() -> bool {
    true
}

fn default_init_std() -> f64 {
    1.0
}

fn default_min_std() -> f64 {
    1e-6
}

fn default_hidden_nonlinearity() -> Activation {
    Activation::Tanh
}

impl PolicyConfig {
    /// Creates a configuration with default values except for dimensions.
    pub fn new(obs_dim: usize, action_dim: usize) -> Self {
        Self {
            obs_dim,
            action_dim,
            name: default_name(),
            hidden_sizes: default_hidden_sizes(),
            learn_std: default_learn_std(),
            init_std: default_init_std(),
            min_std: default_min_std(),
            hidden_nonlinearity: default_hidden_nonlinearity(),
            output_nonlinearity: None,
        }
    }

    /// Sets the name of the policy.
    pub fn name(mut self, v: impl Into<String>) -> Self {
        self.name = v.into();
        self
    }

    /// Sets the sizes of hidden layers.
    pub fn hidden_sizes(mut self, v: Vec<usize>) -> Self {
        self.hidden_sizes = v;
        self
    }

    /// Sets if the standard deviation is learned.
    pub fn learn_std(mut self, v: bool) -> Self {
        self.learn_std = v;
        self
    }

    /// Sets the initial standard deviation.
    pub fn init_std(mut self, v: f64) -> Self {
        self.init_std = v;
        self
    }

    /// Sets the lower bound of the standard deviation.
    pub fn min_std(mut self, v: f64) -> Self {
        self.min_std = v;
        self
    }

    /// Sets the activation between hidden layers.
    pub fn hidden_nonlinearity(mut self, v: Activation) -> Self {
        self.hidden_nonlinearity = v;
        self
    }

    /// Sets the activation after the final layer.
    pub fn output_nonlinearity(mut self, v: Option<Activation>) -> Self {
        self.output_nonlinearity = v;
        self
    }

    /// Checks the values of the configuration.
    pub fn check(&self) -> Result<(), PolicyError> {
        if self.obs_dim == 0 || self.action_dim == 0 {
            return Err(PolicyError::InvalidConfig(format!(
                "obs_dim and action_dim must be positive, got {} and {}",
                self.obs_dim, self.action_dim
            )));
        }
        if self.hidden_sizes.iter().any(|&n| n == 0) {
            return Err(PolicyError::InvalidConfig(format!(
                "hidden sizes must be positive, got {:?}",
                self.hidden_sizes
            )));
        }
        if self.init_std.is_nan() || self.init_std <= 0.0 {
            return Err(PolicyError::InvalidConfig(format!(
                "init_std must be positive, got {}",
                self.init_std
            )));
        }
        if self.min_std < 0.0 {
            return Err(PolicyError::InvalidConfig(format!(
                "min_std must not be negative, got {}",
                self.min_std
            )));
        }
        Ok(())
    }

    /// Constructs [`PolicyConfig`] from YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        let rdr = BufReader::new(file);
        let b = serde_yaml::from_reader(rdr)?;
        Ok(b)
    }

    /// Saves [`PolicyConfig`] as YAML file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut file = File::create(path)?;
        file.write_all(serde_yaml::to_string(&self)?.as_bytes())?;
        Ok(())
    }
}

/// An object built from a configuration.
pub trait Configurable {
    /// Configuration.
    type Config: Clone + DeserializeOwned;

    /// Builds the object.
    fn build(config: Self::Config) -> Result<Self>
    where
        Self: Sized;

    /// Build the object with the configuration in the yaml file of the given path.
    fn build_from_path(path: impl AsRef<Path>) -> Result<Self>
    where
        Self: Sized,
    {
        let file = File::open(path)?;
        let rdr = BufReader::new(file);
        let config = serde_yaml::from_reader(rdr)?;
        Self::build(config)
    }
}

use metapol_core::{Activation, PolicyConfig};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
/// Configuration of [`Mlp`](super::Mlp).
pub struct MlpConfig {
    pub(super) in_dim: usize,
    pub(super) units: Vec<usize>,
    pub(super) out_dim: usize,
    pub(super) hidden_activation: Activation,
    pub(super) out_activation: Option<Activation>,
}

impl MlpConfig {
    /// Creates configuration of MLP.
    ///
    /// * `units` - Sizes of hidden layers. It can be empty.
    /// * `out_activation` - If `Some`, the activation is applied to the final layer.
    pub fn new(
        in_dim: usize,
        units: Vec<usize>,
        out_dim: usize,
        hidden_activation: Activation,
        out_activation: Option<Activation>,
    ) -> Self {
        Self {
            in_dim,
            units,
            out_dim,
            hidden_activation,
            out_activation,
        }
    }

    /// Returns the number of linear layers.
    pub fn n_layers(&self) -> usize {
        self.units.len() + 1
    }

    /// Returns input and output dimensions of each linear layer.
    pub fn in_out_pairs(&self) -> Vec<(usize, usize)> {
        let mut dims = vec![self.in_dim];
        dims.extend(self.units.iter().copied());
        dims.push(self.out_dim);
        dims.windows(2).map(|w| (w[0], w[1])).collect()
    }
}

impl From<&PolicyConfig> for MlpConfig {
    fn from(config: &PolicyConfig) -> Self {
        Self::new(
            config.obs_dim,
            config.hidden_sizes.clone(),
            config.action_dim,
            config.hidden_nonlinearity,
            config.output_nonlinearity,
        )
    }
}

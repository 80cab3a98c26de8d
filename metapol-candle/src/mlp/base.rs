use super::MlpConfig;
use crate::{util::activate, ParamDict};
use anyhow::Result;
use candle_core::Tensor;
use candle_nn::{init, Init, VarBuilder};

/// Multilayer perceptron.
///
/// The network does not hold its weights. They are created in a [`VarBuilder`]
/// on construction, and given to [`Mlp::forward_with`] on each evaluation,
/// so the same network can be evaluated with the variables of a policy or with
/// parameter values supplied from outside.
///
/// The weight and bias of the `i`-th layer are named `{prefix}.ln{i}.weight`
/// and `{prefix}.ln{i}.bias`.
pub struct Mlp {
    config: MlpConfig,
    prefix: String,
}

impl Mlp {
    /// Creates variables of the network under `prefix` of `vb`.
    pub fn build(vb: VarBuilder, prefix: &str, config: MlpConfig) -> Result<Self> {
        let vb = vb.pp(prefix);
        for (i, (in_dim, out_dim)) in config.in_out_pairs().into_iter().enumerate() {
            let vb = vb.pp(format!("ln{}", i));
            vb.get_with_hints((out_dim, in_dim), "weight", init::DEFAULT_KAIMING_NORMAL)?;
            vb.get_with_hints(out_dim, "bias", Init::Const(0.0))?;
        }

        Ok(Self {
            config,
            prefix: prefix.to_string(),
        })
    }

    /// Returns the configuration.
    pub fn config(&self) -> &MlpConfig {
        &self.config
    }

    /// Returns names of the parameters of the `i`-th layer.
    pub fn param_names(&self, i: usize) -> (String, String) {
        (
            format!("{}.ln{}.weight", self.prefix, i),
            format!("{}.ln{}.bias", self.prefix, i),
        )
    }

    /// Evaluates the network on `xs` of shape `batch_size x in_dim` with the given parameters.
    pub fn forward_with(&self, params: &ParamDict, xs: &Tensor) -> Result<Tensor> {
        let n_layers = self.config.n_layers();
        let mut xs = xs.clone();

        for i in 0..n_layers {
            let (w, b) = self.param_names(i);
            let w = params.get_or_err(&w)?;
            let b = params.get_or_err(&b)?;
            xs = xs.matmul(&w.t()?)?.broadcast_add(b)?;
            if i < n_layers - 1 {
                xs = activate(&xs, self.config.hidden_activation)?;
            }
        }

        match self.config.out_activation {
            None => Ok(xs),
            Some(act) => activate(&xs, act),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use candle_core::{DType, Device};
    use candle_nn::VarMap;
    use metapol_core::Activation;

    #[test]
    fn test_forward_with_given_params() -> Result<()> {
        let device = Device::Cpu;
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &device);
        let config = MlpConfig::new(2, vec![3], 1, Activation::Relu, None);
        let mlp = Mlp::build(vb, "net", config)?;

        let params = ParamDict::from_varmap(&varmap)?;
        assert_eq!(
            params.keys().cloned().collect::<Vec<_>>(),
            vec!["net.ln0.bias", "net.ln0.weight", "net.ln1.bias", "net.ln1.weight"]
        );
        assert_eq!(params.get_or_err("net.ln0.weight")?.dims(), &[3, 2]);

        // All weights one, biases zero: each hidden unit is x0 + x1.
        let ones = params.map(|name, t| {
            if name.ends_with("weight") {
                t.ones_like()
            } else {
                t.zeros_like()
            }
        })?;
        let xs = Tensor::new(&[[1.0f32, 2.0], [-1.0, -2.0]], &device)?;
        let ys: Vec<Vec<f32>> = mlp.forward_with(&ones, &xs)?.to_vec2()?;
        assert_eq!(ys, vec![vec![9.0], vec![0.0]]);
        Ok(())
    }

    #[test]
    fn test_missing_param() -> Result<()> {
        let device = Device::Cpu;
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &device);
        let mlp = Mlp::build(vb, "net", MlpConfig::new(2, vec![], 1, Activation::Tanh, None))?;

        let xs = Tensor::zeros((1, 2), DType::F32, &device)?;
        assert!(mlp.forward_with(&ParamDict::new(), &xs).is_err());
        assert_eq!(mlp.forward_with(&ParamDict::from_varmap(&varmap)?, &xs)?.dims(), &[1, 1]);
        Ok(())
    }
}

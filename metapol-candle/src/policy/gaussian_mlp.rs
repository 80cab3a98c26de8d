use super::{CONFIG_FILE, PARAMS_FILE};
use crate::{
    mlp::{Mlp, MlpConfig},
    param_dict::scoped_vars,
    util::{array2_to_tensor, tensor_to_array2},
    DiagonalGaussian, ParamDict,
};
use anyhow::Result;
use candle_core::{DType, Device, Tensor, Var};
use candle_nn::{Init, VarBuilder, VarMap};
use log::{info, trace, warn};
use metapol_core::{
    error::PolicyError,
    record::{Record, RecordValue},
    Actions, AgentInfo, Configurable, DistInfo, Distribution, Policy, PolicyConfig, PolicyState,
    Rollout,
};
use ndarray::{Array1, Array2, Axis};
use rand::{rngs::SmallRng, SeedableRng};
use std::{collections::BTreeMap, fs, path::Path};

/// Stochastic policy with a Gaussian distribution whose mean is given by an MLP.
///
/// Variables are named `{name}.mean_network.ln{i}.weight`,
/// `{name}.mean_network.ln{i}.bias` and `{name}.log_std`, where `name` is
/// [`PolicyConfig::name`]. Parameter dictionaries of the policy use the names
/// without the `{name}.` scope. If [`PolicyConfig::learn_std`] is `false`,
/// `log_std` is a constant and not included in the parameters.
pub struct GaussianMlpPolicy {
    config: PolicyConfig,
    device: Device,
    varmap: VarMap,
    vars: BTreeMap<String, Var>,
    mean_network: Mlp,
    log_std_const: Option<Tensor>,
    dist: DiagonalGaussian,
    rng: SmallRng,
}

struct Network {
    varmap: VarMap,
    vars: BTreeMap<String, Var>,
    mean_network: Mlp,
    log_std_const: Option<Tensor>,
}

fn build_network(config: &PolicyConfig, device: &Device) -> Result<Network> {
    config.check()?;
    let varmap = VarMap::new();
    let vb = VarBuilder::from_varmap(&varmap, DType::F32, device).pp(&config.name);
    let mean_network = Mlp::build(vb.clone(), "mean_network", MlpConfig::from(config))?;
    let init_log_std = config.init_std.ln();
    let log_std_const = match config.learn_std {
        true => {
            vb.get_with_hints(config.action_dim, "log_std", Init::Const(init_log_std))?;
            None
        }
        false => Some(Tensor::full(
            init_log_std as f32,
            config.action_dim,
            device,
        )?),
    };
    let vars = scoped_vars(&varmap, &config.name)?;

    Ok(Network {
        varmap,
        vars,
        mean_network,
        log_std_const,
    })
}

impl GaussianMlpPolicy {
    /// Constructs the policy on the given device.
    pub fn new(config: PolicyConfig, device: Device) -> Result<Self> {
        let network = build_network(&config, &device)?;
        let dist = DiagonalGaussian::new(config.action_dim);
        info!(
            "Build policy {} with obs_dim={}, action_dim={}, hidden_sizes={:?}",
            config.name, config.obs_dim, config.action_dim, config.hidden_sizes
        );

        Ok(Self {
            config,
            device,
            varmap: network.varmap,
            vars: network.vars,
            mean_network: network.mean_network,
            log_std_const: network.log_std_const,
            dist,
            rng: SmallRng::from_entropy(),
        })
    }

    /// Sets the random seed of action sampling.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = SmallRng::seed_from_u64(seed);
        self
    }

    /// Returns the device of the policy.
    pub fn device(&self) -> &Device {
        &self.device
    }

    /// Returns the variables of the policy, including ones outside its scope.
    pub fn varmap(&self) -> &VarMap {
        &self.varmap
    }

    /// Returns the mean network.
    pub fn mean_network(&self) -> &Mlp {
        &self.mean_network
    }

    /// Checks that `params` has the same names and shapes as the parameters of the policy.
    pub fn check_params(&self, params: &ParamDict) -> Result<(), PolicyError> {
        self.get_params().check_compatible(params)
    }

    /// Returns the distribution parameters of `obs` with the given parameters.
    pub(crate) fn dist_info_with(
        &self,
        obs: &Tensor,
        params: &ParamDict,
    ) -> Result<DistInfo<Tensor>> {
        let mean = self.mean_network.forward_with(params, obs)?;
        let log_std = match &self.log_std_const {
            Some(log_std) => log_std,
            None => params.get_or_err("log_std")?,
        };
        let log_std = log_std
            .maximum(self.config.min_std.ln())?
            .unsqueeze(0)?
            .broadcast_as(mean.dims())?
            .contiguous()?;

        let mut info = DistInfo::new();
        info.insert("mean", mean);
        info.insert("log_std", log_std);
        Ok(info)
    }

    /// Samples actions for a batch of observations with the given parameters.
    pub(crate) fn sample_with(
        &mut self,
        obs: &Array2<f32>,
        params: &ParamDict,
    ) -> Result<(Array2<f32>, Vec<AgentInfo>)> {
        if obs.ncols() != self.config.obs_dim {
            return Err(PolicyError::ObsDimMismatch {
                expected: self.config.obs_dim,
                got: obs.ncols(),
            }
            .into());
        }
        trace!("Sample actions for {} observations", obs.nrows());

        let obs = array2_to_tensor(obs, &self.device)?;
        let info = self.dist_info_with(&obs, params)?;
        let actions = self.dist.sample(&info, &mut self.rng)?;
        let means = tensor_to_array2(info.get("mean")?)?;
        let log_stds = tensor_to_array2(info.get("log_std")?)?;
        let agent_infos = means
            .axis_iter(Axis(0))
            .zip(log_stds.axis_iter(Axis(0)))
            .map(|(mean, log_std)| {
                let mut info = AgentInfo::new();
                info.insert("mean", mean.to_vec());
                info.insert("log_std", log_std.to_vec());
                info
            })
            .collect();

        Ok((tensor_to_array2(&actions)?, agent_infos))
    }

    /// Returns the current log standard deviation.
    fn log_std(&self) -> Result<Tensor> {
        match &self.log_std_const {
            Some(log_std) => Ok(log_std.clone()),
            None => Ok(self.get_params().get_or_err("log_std")?.clone()),
        }
    }
}

impl Policy for GaussianMlpPolicy {
    type Tensor = Tensor;
    type Params = ParamDict;
    type Dist = DiagonalGaussian;

    fn config(&self) -> &PolicyConfig {
        &self.config
    }

    fn build_graph(&mut self) -> Result<()> {
        let network = build_network(&self.config, &self.device)?;
        self.varmap = network.varmap;
        self.vars = network.vars;
        self.mean_network = network.mean_network;
        self.log_std_const = network.log_std_const;
        self.dist = DiagonalGaussian::new(self.config.action_dim);
        info!("Rebuild policy {}", self.config.name);
        Ok(())
    }

    fn get_action(&mut self, observation: &Array1<f32>) -> Result<(Array1<f32>, AgentInfo)> {
        let obs = observation.view().insert_axis(Axis(0)).to_owned();
        let params = self.get_params();
        let (actions, mut agent_infos) = self.sample_with(&obs, &params)?;
        let action = actions.row(0).to_owned();
        Ok((action, agent_infos.remove(0)))
    }

    fn get_actions(&mut self, observations: &[Array2<f32>]) -> Result<Actions> {
        let params = self.get_params();
        let (actions, agent_infos): (Vec<_>, Vec<_>) = observations
            .iter()
            .map(|obs| self.sample_with(obs, &params))
            .collect::<Result<Vec<_>>>()?
            .into_iter()
            .unzip();
        Ok(Actions {
            actions,
            agent_infos,
        })
    }

    fn log_diagnostics(&self, paths: &[Rollout]) -> Record {
        let mut record = Record::empty();
        record.insert("NumPaths", RecordValue::Scalar(paths.len() as f32));
        if !paths.is_empty() {
            let n_steps: usize = paths.iter().map(|p| p.len()).sum();
            record.insert(
                "AveragePathLength",
                RecordValue::Scalar(n_steps as f32 / paths.len() as f32),
            );
        }
        match self
            .log_std()
            .and_then(|t| Ok(t.exp()?.mean_all()?.to_scalar::<f32>()?))
        {
            Ok(std) => record.insert("AveragePolicyStd", RecordValue::Scalar(std)),
            Err(e) => warn!("Failed to compute the average policy std: {}", e),
        }
        record
    }

    fn distribution(&self) -> &DiagonalGaussian {
        &self.dist
    }

    fn distribution_info_sym(
        &self,
        obs: &Tensor,
        params: Option<&ParamDict>,
    ) -> Result<DistInfo<Tensor>> {
        match params {
            None => self.dist_info_with(obs, &self.get_params()),
            Some(params) => self.dist_info_with(obs, params),
        }
    }

    fn get_params(&self) -> ParamDict {
        ParamDict::from_vars(&self.vars)
    }

    fn get_param_values(&self) -> Result<ParamDict> {
        self.get_params().detach_copy()
    }

    fn set_params(&mut self, params: &ParamDict) -> Result<()> {
        params.copy_to(&self.vars)?;
        trace!("Set parameters of policy {}", self.config.name);
        Ok(())
    }

    fn set_state(&mut self, state: PolicyState<ParamDict>) -> Result<()> {
        // The policy is left untouched unless both the config and the parameters are accepted.
        let network = build_network(&state.init_args, &self.device)?;
        state.network_params.copy_to(&network.vars)?;

        self.config = state.init_args;
        self.varmap = network.varmap;
        self.vars = network.vars;
        self.mean_network = network.mean_network;
        self.log_std_const = network.log_std_const;
        self.dist = DiagonalGaussian::new(self.config.action_dim);
        info!("Restore policy {}", self.config.name);
        Ok(())
    }

    fn save(&self, path: &Path) -> Result<()> {
        fs::create_dir_all(path)?;
        let state = self.get_state()?;
        state.init_args.save(path.join(CONFIG_FILE))?;
        state.network_params.save(path.join(PARAMS_FILE))?;
        info!("Save policy to {:?}", path);
        Ok(())
    }

    fn load(&mut self, path: &Path) -> Result<()> {
        let init_args = PolicyConfig::load(path.join(CONFIG_FILE))?;
        let network_params = ParamDict::load(path.join(PARAMS_FILE), &self.device)?;
        self.set_state(PolicyState {
            init_args,
            network_params,
        })?;
        info!("Load policy from {:?}", path);
        Ok(())
    }
}

impl Configurable for GaussianMlpPolicy {
    type Config = PolicyConfig;

    /// Builds the policy on CPU.
    fn build(config: Self::Config) -> Result<Self> {
        Self::new(config, Device::Cpu)
    }
}

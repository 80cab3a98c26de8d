use super::GaussianMlpPolicy;
use crate::{DiagonalGaussian, ParamDict};
use anyhow::Result;
use candle_core::Tensor;
use log::{info, trace};
use metapol_core::{
    error::PolicyError, record::Record, Actions, AgentInfo, Configurable, DistInfo, MetaPolicy,
    Policy, PolicyConfig, PolicyState, Rollout, UpdateMode,
};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, Write},
    path::Path,
};

/// Configuration of [`MetaGaussianMlpPolicy`].
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct MetaGaussianMlpPolicyConfig {
    /// Configuration of the network.
    pub policy: PolicyConfig,

    /// Number of tasks in a meta batch.
    #[serde(default = "default_meta_batch_size")]
    pub meta_batch_size: usize,

    /// Random seed of action sampling.
    #[serde(default)]
    pub seed: Option<u64>,

    /// Device on which the network is evaluated.
    #[serde(default)]
    pub device: crate::Device,
}

fn default_meta_batch_size() -> usize {
    1
}

impl MetaGaussianMlpPolicyConfig {
    /// Creates a configuration for a single task on CPU.
    pub fn new(policy: PolicyConfig) -> Self {
        Self {
            policy,
            meta_batch_size: default_meta_batch_size(),
            seed: None,
            device: crate::Device::Cpu,
        }
    }

    /// Sets the meta batch size.
    pub fn meta_batch_size(mut self, v: usize) -> Self {
        self.meta_batch_size = v;
        self
    }

    /// Sets the random seed.
    pub fn seed(mut self, v: u64) -> Self {
        self.seed = Some(v);
        self
    }

    /// Sets the device.
    pub fn device(mut self, v: crate::Device) -> Self {
        self.device = v;
        self
    }

    /// Constructs [`MetaGaussianMlpPolicyConfig`] from YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        let rdr = BufReader::new(file);
        let b = serde_yaml::from_reader(rdr)?;
        Ok(b)
    }

    /// Saves [`MetaGaussianMlpPolicyConfig`] as YAML file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut file = File::create(path)?;
        file.write_all(serde_yaml::to_string(&self)?.as_bytes())?;
        Ok(())
    }
}

/// [`GaussianMlpPolicy`] with per-task post-update parameters.
///
/// In pre-update mode all tasks are run with the variables of the policy.
/// After [`MetaPolicy::update_task_parameters`], task `i` is run with the
/// `i`-th given [`ParamDict`], which must have the same names and shapes as
/// [`Policy::get_params`]. Setting the variables of the policy, by
/// [`Policy::set_params`], [`Policy::set_state`] or [`Policy::build_graph`],
/// switches back to pre-update mode.
pub struct MetaGaussianMlpPolicy {
    policy: GaussianMlpPolicy,
    meta_batch_size: usize,
    mode: UpdateMode<ParamDict>,
}

impl MetaGaussianMlpPolicy {
    /// Constructs the policy.
    pub fn new(
        config: PolicyConfig,
        meta_batch_size: usize,
        device: candle_core::Device,
    ) -> Result<Self> {
        if meta_batch_size == 0 {
            return Err(
                PolicyError::InvalidConfig("meta_batch_size must be positive".to_string()).into(),
            );
        }
        let policy = GaussianMlpPolicy::new(config, device)?;
        info!("Meta batch size: {}", meta_batch_size);

        Ok(Self {
            policy,
            meta_batch_size,
            mode: UpdateMode::PreUpdate,
        })
    }

    /// Sets the random seed of action sampling.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.policy = self.policy.with_seed(seed);
        self
    }

    /// Returns the underlying policy.
    pub fn policy(&self) -> &GaussianMlpPolicy {
        &self.policy
    }
}

impl Policy for MetaGaussianMlpPolicy {
    type Tensor = Tensor;
    type Params = ParamDict;
    type Dist = DiagonalGaussian;

    fn config(&self) -> &PolicyConfig {
        self.policy.config()
    }

    fn build_graph(&mut self) -> Result<()> {
        self.policy.build_graph()?;
        self.switch_to_pre_update();
        Ok(())
    }

    /// Samples an action with the variables of the policy, regardless of the mode.
    fn get_action(&mut self, observation: &Array1<f32>) -> Result<(Array1<f32>, AgentInfo)> {
        self.policy.get_action(observation)
    }

    fn get_actions(&mut self, observations: &[Array2<f32>]) -> Result<Actions> {
        self.get_meta_actions(observations)
    }

    fn reset(&mut self, dones: Option<&[bool]>) {
        self.policy.reset(dones)
    }

    fn log_diagnostics(&self, paths: &[Rollout]) -> Record {
        self.policy.log_diagnostics(paths)
    }

    fn distribution(&self) -> &DiagonalGaussian {
        self.policy.distribution()
    }

    fn distribution_info_sym(
        &self,
        obs: &Tensor,
        params: Option<&ParamDict>,
    ) -> Result<DistInfo<Tensor>> {
        self.policy.distribution_info_sym(obs, params)
    }

    fn get_params(&self) -> ParamDict {
        self.policy.get_params()
    }

    fn get_param_values(&self) -> Result<ParamDict> {
        self.policy.get_param_values()
    }

    fn set_params(&mut self, params: &ParamDict) -> Result<()> {
        self.policy.set_params(params)?;
        self.switch_to_pre_update();
        Ok(())
    }

    fn set_state(&mut self, state: PolicyState<ParamDict>) -> Result<()> {
        self.switch_to_pre_update();
        self.policy.set_state(state)
    }

    fn save(&self, path: &Path) -> Result<()> {
        self.policy.save(path)
    }

    fn load(&mut self, path: &Path) -> Result<()> {
        self.switch_to_pre_update();
        self.policy.load(path)
    }
}

impl MetaPolicy for MetaGaussianMlpPolicy {
    fn meta_batch_size(&self) -> usize {
        self.meta_batch_size
    }

    fn update_mode(&self) -> &UpdateMode<ParamDict> {
        &self.mode
    }

    fn update_mode_mut(&mut self) -> &mut UpdateMode<ParamDict> {
        &mut self.mode
    }

    fn check_task_params(&self, params: &ParamDict) -> Result<()> {
        Ok(self.policy.check_params(params)?)
    }

    fn create_placeholders_for_vars(
        &self,
        scopes: &[&str],
        meta_batch_size: usize,
    ) -> Result<Vec<Vec<ParamDict>>> {
        scopes
            .iter()
            .map(|scope| {
                let vars = ParamDict::from_varmap_scoped(self.policy.varmap(), scope)?;
                (0..meta_batch_size)
                    .map(|_| vars.zeros_like())
                    .collect::<Result<Vec<_>>>()
            })
            .collect()
    }

    fn get_pre_update_actions(&mut self, observations: &[Array2<f32>]) -> Result<Actions> {
        let params = self.policy.get_params();
        let mut actions = Vec::with_capacity(observations.len());
        let mut agent_infos = Vec::with_capacity(observations.len());
        for obs in observations.iter() {
            let (a, infos) = self.policy.sample_with(obs, &params)?;
            actions.push(a);
            agent_infos.push(infos);
        }
        Ok(Actions {
            actions,
            agent_infos,
        })
    }

    fn get_post_update_actions(&mut self, observations: &[Array2<f32>]) -> Result<Actions> {
        let task_params = match &self.mode {
            UpdateMode::PreUpdate => return Err(PolicyError::NotPostUpdate.into()),
            UpdateMode::PostUpdate(params) => params,
        };
        if task_params.len() != observations.len() {
            return Err(PolicyError::MetaBatchSizeMismatch {
                expected: task_params.len(),
                got: observations.len(),
            }
            .into());
        }
        trace!("Sample actions with post-update parameters");

        let mut actions = Vec::with_capacity(observations.len());
        let mut agent_infos = Vec::with_capacity(observations.len());
        for (obs, params) in observations.iter().zip(task_params.iter()) {
            let (a, infos) = self.policy.sample_with(obs, params)?;
            actions.push(a);
            agent_infos.push(infos);
        }
        Ok(Actions {
            actions,
            agent_infos,
        })
    }
}

impl Configurable for MetaGaussianMlpPolicy {
    type Config = MetaGaussianMlpPolicyConfig;

    fn build(config: Self::Config) -> Result<Self> {
        let device = config.device.to_candle()?;
        let policy = Self::new(config.policy, config.meta_batch_size, device)?;
        Ok(match config.seed {
            Some(seed) => policy.with_seed(seed),
            None => policy,
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use candle_core::{DType, Device};
    use tempdir::TempDir;
    use test_log::test;

    fn policy(meta_batch_size: usize) -> Result<MetaGaussianMlpPolicy> {
        let config = PolicyConfig::new(2, 1).hidden_sizes(vec![4]);
        Ok(MetaGaussianMlpPolicy::new(config, meta_batch_size, Device::Cpu)?.with_seed(0))
    }

    #[test]
    fn test_placeholders() -> Result<()> {
        let policy = policy(3)?;
        let placeholders =
            policy.create_placeholders_for_vars(&["policy", "policy.mean_network", "value"], 3)?;

        assert_eq!(placeholders.len(), 3);
        assert!(placeholders.iter().all(|p| p.len() == 3));

        let p = &placeholders[0][2];
        policy.get_params().check_compatible(p)?;
        let w: Vec<Vec<f32>> = p.get_or_err("mean_network.ln0.weight")?.to_vec2()?;
        assert!(w.iter().flatten().all(|&x| x == 0.0));

        assert_eq!(
            placeholders[1][0].keys().cloned().collect::<Vec<_>>(),
            vec!["ln0.bias", "ln0.weight", "ln1.bias", "ln1.weight"]
        );
        assert!(placeholders[2][0].is_empty());
        Ok(())
    }

    #[test]
    fn test_post_update_uses_task_params() -> Result<()> {
        let mut policy = policy(2)?;
        let obs = vec![Array2::from_elem((3, 2), 1.0f32); 2];

        // Task 0 gets a constant mean of 5 and task 1 a negligible std around mean 0.
        let task0 = policy.get_param_values()?.map(|name, t| match name {
            "mean_network.ln1.bias" => t.ones_like()? * 5.0,
            "log_std" => t.zeros_like()? - 20.0,
            _ => t.zeros_like(),
        })?;
        let task1 = policy.get_param_values()?.map(|name, t| match name {
            "log_std" => t.zeros_like()? - 20.0,
            _ => t.zeros_like(),
        })?;
        let before = policy.get_param_values()?;
        policy.update_task_parameters(vec![task0, task1])?;

        let actions = policy.get_actions(&obs)?;
        assert!(actions.actions[0].iter().all(|a| (a - 5.0).abs() < 1e-4));
        assert!(actions.actions[1].iter().all(|a| a.abs() < 1e-4));
        assert_eq!(
            actions.agent_infos[0][0].get("mean").unwrap(),
            &vec![5.0f32]
        );

        // Variables of the policy are untouched.
        let after = policy.get_param_values()?;
        for ((_, t1), (_, t2)) in before.iter().zip(after.iter()) {
            let d = (t1 - t2)?.abs()?.sum_all()?.to_scalar::<f32>()?;
            assert_eq!(d, 0.0);
        }

        policy.switch_to_pre_update();
        let actions = policy.get_actions(&obs)?;
        assert!(actions.actions[0].iter().any(|a| (a - 5.0).abs() > 1e-4));
        Ok(())
    }

    #[test]
    fn test_distribution_info_with_placeholders() -> Result<()> {
        let policy = policy(1)?;
        let obs = Tensor::ones((4, 2), DType::F32, &Device::Cpu)?;
        let zeros = policy.create_placeholders_for_vars(&["policy"], 1)?.remove(0).remove(0);

        let info = policy.distribution_info_sym(&obs, Some(&zeros))?;
        let mean: Vec<Vec<f32>> = info.get("mean")?.to_vec2()?;
        assert_eq!(mean, vec![vec![0.0]; 4]);
        let log_std: Vec<Vec<f32>> = info.get("log_std")?.to_vec2()?;
        assert_eq!(log_std, vec![vec![0.0]; 4]);
        assert_eq!(policy.distribution_info_keys(), &["mean", "log_std"]);
        Ok(())
    }

    #[test]
    fn test_invalid_task_params_keep_pre_update() -> Result<()> {
        let mut policy = policy(2)?;
        let other = MetaGaussianMlpPolicy::new(
            PolicyConfig::new(2, 1).hidden_sizes(vec![5]),
            1,
            Device::Cpu,
        )?;
        let good = policy.get_param_values()?;
        let bad = other.get_param_values()?;

        let err = policy
            .update_task_parameters(vec![good.clone(), bad])
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<PolicyError>(),
            Some(PolicyError::ParamShapeMismatch { .. })
        ));
        assert!(policy.is_pre_update());

        let err = policy.update_task_parameters(vec![good]).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<PolicyError>(),
            Some(PolicyError::MetaBatchSizeMismatch {
                expected: 2,
                got: 1
            })
        ));
        Ok(())
    }

    #[test]
    fn test_set_params_switches_to_pre_update() -> Result<()> {
        let mut policy = policy(1)?;
        let values = policy.get_param_values()?;
        policy.update_task_parameters(vec![values.clone()])?;
        assert!(!policy.is_pre_update());

        policy.set_params(&values)?;
        assert!(policy.is_pre_update());
        Ok(())
    }

    #[test]
    fn test_rejected_state_switches_to_pre_update() -> Result<()> {
        let mut policy = policy(1)?;
        let values = policy.get_param_values()?;
        policy.update_task_parameters(vec![values.clone()])?;

        let err = policy
            .set_state(PolicyState {
                init_args: PolicyConfig::new(2, 1).init_std(0.0),
                network_params: values,
            })
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<PolicyError>(),
            Some(PolicyError::InvalidConfig(_))
        ));
        assert!(policy.is_pre_update());
        assert_eq!(policy.config().hidden_sizes, vec![4]);

        let obs = vec![Array2::from_elem((2, 2), 1.0f32)];
        assert_eq!(policy.get_actions(&obs)?.len(), 1);
        Ok(())
    }

    #[test]
    fn test_build_from_config_file() -> Result<()> {
        let dir = TempDir::new("meta_gaussian_mlp_policy")?;
        let path = dir.path().join("config.yaml");
        let config = MetaGaussianMlpPolicyConfig::new(PolicyConfig::new(2, 1))
            .meta_batch_size(4)
            .seed(3);
        config.save(&path)?;
        assert_eq!(MetaGaussianMlpPolicyConfig::load(&path)?, config);

        let policy = MetaGaussianMlpPolicy::build_from_path(&path)?;
        assert_eq!(policy.meta_batch_size(), 4);
        assert_eq!(policy.config().hidden_sizes, vec![32, 32]);

        assert!(MetaGaussianMlpPolicy::new(PolicyConfig::new(2, 1), 0, Device::Cpu).is_err());
        Ok(())
    }
}

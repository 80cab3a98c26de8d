use crate::util::remove_scope_from_name;
use anyhow::{anyhow, Context, Result};
use candle_core::{DType, Device, Tensor, Var};
use candle_nn::VarMap;
use log::trace;
use metapol_core::error::PolicyError;
use std::{
    collections::{btree_map, BTreeMap, HashMap},
    path::Path,
};

/// Named tensors ordered by name.
///
/// A [`ParamDict`] is used for two purposes: as handles to the variables of a
/// policy, sharing their storage, and as parameter values supplied to a policy
/// from outside, e.g. parameters adapted to a task.
#[derive(Debug, Clone, Default)]
pub struct ParamDict(BTreeMap<String, Tensor>);

/// Returns the variables in `varmap` under `scope`, keyed by names without the scope.
pub(crate) fn scoped_vars(varmap: &VarMap, scope: &str) -> Result<BTreeMap<String, Var>> {
    let data = varmap
        .data()
        .lock()
        .map_err(|_| anyhow!("variables of the policy are poisoned"))?;
    Ok(data
        .iter()
        .filter(|(name, _)| in_scope(name, scope))
        .map(|(name, var)| (remove_scope_from_name(name, scope).to_string(), var.clone()))
        .collect())
}

fn in_scope(name: &str, scope: &str) -> bool {
    scope.is_empty() || name == scope || name.starts_with(&format!("{}.", scope))
}

impl ParamDict {
    /// Creates an empty dictionary.
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Handles to all variables in `varmap`.
    pub fn from_varmap(varmap: &VarMap) -> Result<Self> {
        Self::from_varmap_scoped(varmap, "")
    }

    /// Handles to the variables in `varmap` under `scope`.
    ///
    /// The scope is removed from the names.
    pub fn from_varmap_scoped(varmap: &VarMap, scope: &str) -> Result<Self> {
        Ok(Self::from_vars(&scoped_vars(varmap, scope)?))
    }

    /// Handles to the given variables.
    pub fn from_vars(vars: &BTreeMap<String, Var>) -> Self {
        Self(
            vars.iter()
                .map(|(name, var)| (name.clone(), var.as_tensor().clone()))
                .collect(),
        )
    }

    /// Copies the values, detached from the variables they came from.
    pub fn detach_copy(&self) -> Result<Self> {
        self.map(|_, t| t.copy())
    }

    /// Zero tensors with the same names and shapes.
    pub fn zeros_like(&self) -> Result<Self> {
        self.map(|_, t| t.zeros_like())
    }

    /// Applies `f` to each tensor.
    pub fn map<F>(&self, f: F) -> Result<Self>
    where
        F: Fn(&str, &Tensor) -> candle_core::Result<Tensor>,
    {
        let mut dict = BTreeMap::new();
        for (name, t) in self.0.iter() {
            let t = f(name, t).with_context(|| format!("failed to transform {}", name))?;
            dict.insert(name.clone(), t);
        }
        Ok(Self(dict))
    }

    /// Returns the tensor of the given name.
    pub fn get(&self, name: &str) -> Option<&Tensor> {
        self.0.get(name)
    }

    /// Returns the tensor of the given name, failing if it does not exist.
    pub fn get_or_err(&self, name: &str) -> Result<&Tensor> {
        self.0
            .get(name)
            .ok_or_else(|| anyhow!("parameter {} is not found in {:?}", name, self.names()))
    }

    /// Inserts a tensor, returning the old one of the same name.
    pub fn insert(&mut self, name: impl Into<String>, t: Tensor) -> Option<Tensor> {
        self.0.insert(name.into(), t)
    }

    /// Returns an iterator over the names in order.
    pub fn keys(&self) -> btree_map::Keys<'_, String, Tensor> {
        self.0.keys()
    }

    /// Returns an iterator over the name-tensor pairs in order.
    pub fn iter(&self) -> btree_map::Iter<'_, String, Tensor> {
        self.0.iter()
    }

    /// Returns the number of tensors.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if there is no tensor.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn names(&self) -> Vec<String> {
        self.0.keys().cloned().collect()
    }

    /// Checks that `other` has the same names and shapes.
    pub fn check_compatible(&self, other: &ParamDict) -> Result<(), PolicyError> {
        if !self.0.keys().eq(other.0.keys()) {
            return Err(PolicyError::ParamKeyMismatch {
                expected: self.names(),
                got: other.names(),
            });
        }
        for ((name, t1), t2) in self.0.iter().zip(other.0.values()) {
            if t1.dims() != t2.dims() {
                return Err(PolicyError::ParamShapeMismatch {
                    name: name.clone(),
                    expected: t1.dims().to_vec(),
                    got: t2.dims().to_vec(),
                });
            }
        }
        Ok(())
    }

    /// Writes the values into the variables of the same names.
    pub fn copy_to(&self, vars: &BTreeMap<String, Var>) -> Result<()> {
        ParamDict::from_vars(vars).check_compatible(self)?;
        for (name, var) in vars.iter() {
            let t = &self.0[name];
            let t = t.to_dtype(var.dtype())?.to_device(var.device())?;
            trace!("Set {}", name);
            var.set(&t)?;
        }
        Ok(())
    }

    /// Saves the tensors in safetensors format.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let tensors: HashMap<&str, Tensor> = self
            .0
            .iter()
            .map(|(name, t)| Ok((name.as_str(), t.to_device(&Device::Cpu)?)))
            .collect::<Result<_>>()?;
        candle_core::safetensors::save(&tensors, path)?;
        Ok(())
    }

    /// Loads tensors saved with [`ParamDict::save`] onto `device`.
    pub fn load(path: impl AsRef<Path>, device: &Device) -> Result<Self> {
        let tensors = candle_core::safetensors::load(path, device)?;
        let dict = tensors
            .into_iter()
            .map(|(name, t)| Ok((name, t.to_dtype(DType::F32)?)))
            .collect::<Result<_>>()?;
        Ok(Self(dict))
    }
}

impl FromIterator<(String, Tensor)> for ParamDict {
    fn from_iter<I: IntoIterator<Item = (String, Tensor)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

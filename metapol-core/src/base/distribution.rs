//! Action distributions.
use crate::error::PolicyError;
use anyhow::Result;
use rand::Rng;
use std::collections::BTreeMap;

/// Parameters of an action distribution, keyed by name.
#[derive(Debug, Clone)]
pub struct DistInfo<T>(BTreeMap<String, T>);

impl<T> DistInfo<T> {
    /// Creates an empty object.
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Inserts a value.
    pub fn insert(&mut self, k: impl Into<String>, v: T) {
        self.0.insert(k.into(), v);
    }

    /// Returns the value of the given key.
    pub fn get(&self, k: &str) -> Result<&T, PolicyError> {
        self.0
            .get(k)
            .ok_or_else(|| PolicyError::DistInfoKey(k.to_string()))
    }

    /// Returns an iterator over the keys in order.
    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.0.keys()
    }

    /// Returns an iterator over the key-value pairs in order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &T)> {
        self.0.iter()
    }
}

impl<T> Default for DistInfo<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Into<String>, T> FromIterator<(K, T)> for DistInfo<T> {
    fn from_iter<I: IntoIterator<Item = (K, T)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}

/// A parametric distribution over actions.
///
/// Methods suffixed with `_sym` operate on batches of tensors and reduce over
/// the last axis, so the output has one element per row of the input.
pub trait Distribution {
    /// Tensor type.
    type Tensor;

    /// Dimension of the action.
    fn dim(&self) -> usize;

    /// Keys of [`DistInfo`] of this distribution.
    fn dist_info_keys(&self) -> &'static [&'static str];

    /// KL divergence from `old` to `new`.
    fn kl_sym(
        &self,
        old: &DistInfo<Self::Tensor>,
        new: &DistInfo<Self::Tensor>,
    ) -> Result<Self::Tensor>;

    /// Ratio of the likelihoods of `x` under `new` and `old`.
    fn likelihood_ratio_sym(
        &self,
        x: &Self::Tensor,
        old: &DistInfo<Self::Tensor>,
        new: &DistInfo<Self::Tensor>,
    ) -> Result<Self::Tensor>;

    /// Log likelihood of `x`.
    fn log_likelihood_sym(&self, x: &Self::Tensor, info: &DistInfo<Self::Tensor>)
        -> Result<Self::Tensor>;

    /// Entropy of the distribution.
    fn entropy_sym(&self, info: &DistInfo<Self::Tensor>) -> Result<Self::Tensor>;

    /// Draws a sample for each row of `info`.
    fn sample<R: Rng + ?Sized>(
        &self,
        info: &DistInfo<Self::Tensor>,
        rng: &mut R,
    ) -> Result<Self::Tensor>;
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_dist_info_missing_key() {
        let info: DistInfo<f32> = [("mean", 0.0f32), ("log_std", 1.0)].into_iter().collect();

        assert_eq!(info.keys().collect::<Vec<_>>(), vec!["log_std", "mean"]);
        assert_eq!(*info.get("mean").unwrap(), 0.0);
        assert_eq!(
            info.get("std").unwrap_err(),
            PolicyError::DistInfoKey("std".into())
        );
    }
}

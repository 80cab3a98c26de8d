//! Action distributions.
use anyhow::Result;
use candle_core::{Tensor, D};
use metapol_core::{DistInfo, Distribution};
use rand::Rng;
use rand_distr::{Distribution as _, StandardNormal};
use std::f64::consts::{E, PI};

/// Gaussian distribution with diagonal covariance.
///
/// Its [`DistInfo`] has `mean` and `log_std`, both of shape `batch_size x dim`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DiagonalGaussian {
    dim: usize,
}

const KEYS: &[&str] = &["mean", "log_std"];

impl DiagonalGaussian {
    /// Creates a distribution over `dim`-dimensional actions.
    pub fn new(dim: usize) -> Self {
        Self { dim }
    }

    fn mean_log_std<'a>(&self, info: &'a DistInfo<Tensor>) -> Result<(&'a Tensor, &'a Tensor)> {
        Ok((info.get("mean")?, info.get("log_std")?))
    }
}

impl Distribution for DiagonalGaussian {
    type Tensor = Tensor;

    fn dim(&self) -> usize {
        self.dim
    }

    fn dist_info_keys(&self) -> &'static [&'static str] {
        KEYS
    }

    fn kl_sym(&self, old: &DistInfo<Tensor>, new: &DistInfo<Tensor>) -> Result<Tensor> {
        let (old_mean, old_log_std) = self.mean_log_std(old)?;
        let (new_mean, new_log_std) = self.mean_log_std(new)?;
        let old_var = (old_log_std * 2.0)?.exp()?;
        let new_var = (new_log_std * 2.0)?.exp()?;

        // (old_std^2 + (old_mean - new_mean)^2 - new_std^2) / (2 new_std^2 + eps)
        let numerator = ((old_var + (old_mean - new_mean)?.sqr()?)? - &new_var)?;
        let denominator = new_var.affine(2.0, 1e-8)?;
        let kl = ((numerator / denominator)? + (new_log_std - old_log_std)?)?;
        Ok(kl.sum(D::Minus1)?)
    }

    fn likelihood_ratio_sym(
        &self,
        x: &Tensor,
        old: &DistInfo<Tensor>,
        new: &DistInfo<Tensor>,
    ) -> Result<Tensor> {
        let logli_new = self.log_likelihood_sym(x, new)?;
        let logli_old = self.log_likelihood_sym(x, old)?;
        Ok((logli_new - logli_old)?.exp()?)
    }

    fn log_likelihood_sym(&self, x: &Tensor, info: &DistInfo<Tensor>) -> Result<Tensor> {
        let (mean, log_std) = self.mean_log_std(info)?;
        let zs = ((x - mean)? / log_std.exp()?)?;
        let logli = (log_std.sum(D::Minus1)?.neg()? - (zs.sqr()?.sum(D::Minus1)? * 0.5)?)?;
        Ok((logli - 0.5 * self.dim as f64 * (2.0 * PI).ln())?)
    }

    fn entropy_sym(&self, info: &DistInfo<Tensor>) -> Result<Tensor> {
        let log_std = info.get("log_std")?;
        Ok((log_std + (2.0 * PI * E).sqrt().ln())?.sum(D::Minus1)?)
    }

    fn sample<R: Rng + ?Sized>(&self, info: &DistInfo<Tensor>, rng: &mut R) -> Result<Tensor> {
        let (mean, log_std) = self.mean_log_std(info)?;
        let noise = (0..mean.elem_count())
            .map(|_| StandardNormal.sample(rng))
            .collect::<Vec<f32>>();
        let noise = Tensor::from_vec(noise, mean.dims(), mean.device())?;
        Ok((mean + (log_std.exp()? * noise)?)?)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use candle_core::Device;
    use rand::{rngs::SmallRng, SeedableRng};

    fn info(mean: &[[f32; 2]; 2], log_std: &[[f32; 2]; 2]) -> Result<DistInfo<Tensor>> {
        let mut info = DistInfo::new();
        info.insert("mean", Tensor::new(mean, &Device::Cpu)?);
        info.insert("log_std", Tensor::new(log_std, &Device::Cpu)?);
        Ok(info)
    }

    fn assert_close(t: &Tensor, expected: &[f32]) -> Result<()> {
        let v: Vec<f32> = t.to_vec1()?;
        assert_eq!(v.len(), expected.len());
        for (a, b) in v.iter().zip(expected.iter()) {
            assert!((a - b).abs() < 1e-4, "{:?} != {:?}", v, expected);
        }
        Ok(())
    }

    #[test]
    fn test_log_likelihood_of_standard_normal() -> Result<()> {
        let dist = DiagonalGaussian::new(2);
        let info = info(&[[0.0, 0.0], [1.0, -1.0]], &[[0.0, 0.0], [0.0, 0.0]])?;
        let x = Tensor::new(&[[0.0f32, 0.0], [1.0, 1.0]], &Device::Cpu)?;
        let c = -(2.0 * PI).ln() as f32;

        assert_close(&dist.log_likelihood_sym(&x, &info)?, &[c, c - 2.0])
    }

    #[test]
    fn test_kl_and_likelihood_ratio() -> Result<()> {
        let dist = DiagonalGaussian::new(2);
        let old = info(&[[0.0, 0.0], [0.0, 0.0]], &[[0.0, 0.0], [0.0, 0.0]])?;
        let new = info(&[[0.0, 0.0], [1.0, 0.0]], &[[0.0, 0.0], [0.0, 0.0]])?;

        // Same distributions in the first row, unit shift of the mean in the second.
        assert_close(&dist.kl_sym(&old, &new)?, &[0.0, 0.5])?;

        let x = Tensor::new(&[[0.5f32, 0.5], [1.0, 0.0]], &Device::Cpu)?;
        assert_close(
            &dist.likelihood_ratio_sym(&x, &old, &new)?,
            &[1.0, (0.5f32).exp()],
        )
    }

    #[test]
    fn test_kl_and_likelihood_ratio_with_different_stds() -> Result<()> {
        let dist = DiagonalGaussian::new(2);
        let old = info(&[[0.0, 0.0], [0.0, 0.0]], &[[0.0, 0.0], [0.0, 0.0]])?;
        let new = info(&[[0.0, 0.0], [1.0, 0.0]], &[[1.0, 1.0], [1.0, 0.0]])?;
        let e2 = E.powi(2);
        let std_term = ((1.0 - e2) / (2.0 * e2 + 1e-8) + 1.0) as f32;
        let shifted_term = ((2.0 - e2) / (2.0 * e2 + 1e-8) + 1.0) as f32;

        assert_close(
            &dist.kl_sym(&old, &new)?,
            &[2.0 * std_term, shifted_term],
        )?;

        let x = Tensor::new(&[[1.0f32, 0.0], [1.0, 1.0]], &Device::Cpu)?;
        assert_close(
            &dist.likelihood_ratio_sym(&x, &old, &new)?,
            &[(-1.5 - 0.5 / e2).exp() as f32, (-0.5f32).exp()],
        )
    }

    #[test]
    fn test_entropy() -> Result<()> {
        let dist = DiagonalGaussian::new(2);
        let info = info(&[[0.0, 0.0], [0.0, 0.0]], &[[0.0, 0.0], [1.0, 1.0]])?;
        let h = (2.0 * PI * E).sqrt().ln() as f32;

        assert_close(&dist.entropy_sym(&info)?, &[2.0 * h, 2.0 * h + 2.0])
    }

    #[test]
    fn test_sample_is_reproducible() -> Result<()> {
        let dist = DiagonalGaussian::new(2);
        let info = info(&[[0.0, 0.0], [10.0, 10.0]], &[[-20.0, -20.0], [0.0, 0.0]])?;

        let s1 = dist.sample(&info, &mut SmallRng::seed_from_u64(42))?;
        let s2 = dist.sample(&info, &mut SmallRng::seed_from_u64(42))?;
        let s1: Vec<Vec<f32>> = s1.to_vec2()?;
        let s2: Vec<Vec<f32>> = s2.to_vec2()?;
        assert_eq!(s1, s2);

        // Negligible standard deviation in the first row.
        assert!(s1[0].iter().all(|x| x.abs() < 1e-6));
        assert!(s1[1].iter().all(|x| (x - 10.0).abs() < 10.0));
        assert_eq!(dist.dist_info_keys(), &["mean", "log_std"]);
        Ok(())
    }
}

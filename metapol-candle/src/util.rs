//! Utilities.
use anyhow::Result;
use candle_core::{Device, Tensor};
use metapol_core::Activation;
use ndarray::Array2;
use num_traits::AsPrimitive;

/// Removes `scope` and the following separator from the head of `name`.
///
/// `name` is returned as is if it does not start with `scope`.
///
/// ```
/// use metapol_candle::util::remove_scope_from_name;
///
/// assert_eq!(remove_scope_from_name("policy.log_std", "policy"), "log_std");
/// assert_eq!(remove_scope_from_name("policy_2.log_std", "policy"), "policy_2.log_std");
/// ```
pub fn remove_scope_from_name<'a>(name: &'a str, scope: &str) -> &'a str {
    if scope.is_empty() {
        return name;
    }
    match name.strip_prefix(scope) {
        Some(rest) if rest.is_empty() => rest,
        Some(rest) => rest.strip_prefix('.').unwrap_or(name),
        None => name,
    }
}

/// Applies an activation function.
pub fn activate(xs: &Tensor, activation: Activation) -> Result<Tensor> {
    Ok(match activation {
        Activation::Tanh => xs.tanh()?,
        Activation::Relu => xs.relu()?,
        Activation::Sigmoid => candle_nn::ops::sigmoid(xs)?,
        Activation::Identity => xs.clone(),
    })
}

/// Converts a 2-dimensional array to an `f32` tensor.
pub fn array2_to_tensor<T>(a: &Array2<T>, device: &Device) -> Result<Tensor>
where
    T: AsPrimitive<f32>,
{
    let v = a.iter().map(|e| e.as_()).collect::<Vec<f32>>();
    Ok(Tensor::from_vec(v, a.dim(), device)?)
}

/// Converts a 2-dimensional tensor to an array.
pub fn tensor_to_array2(t: &Tensor) -> Result<Array2<f32>> {
    let shape = t.dims2()?;
    let v: Vec<f32> = t.flatten_all()?.to_vec1()?;
    Ok(Array2::from_shape_vec(shape, v)?)
}

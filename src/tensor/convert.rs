//! Conversions between batch arrays and backend tensors.
//!
//! Sample batches live CPU-side as [`BatchArray`] records; the model and the
//! losses run on backend tensors. These helpers cross that boundary with an
//! explicit rank check, since batch arrays are dynamic-rank and tensors are
//! not.

use burn::tensor::backend::Backend;
use burn::tensor::{Int, Tensor, TensorData};

use crate::core::array::BatchArray;
use crate::core::record::RecordError;

fn check_rank(array: &BatchArray, expected: usize) -> Result<(), RecordError> {
    if array.shape().len() != expected {
        return Err(RecordError::RankMismatch {
            expected,
            shape: array.shape().to_vec(),
        });
    }
    Ok(())
}

/// Build a rank-`D` float tensor from `array`, converting integer, byte,
/// and flag data numerically.
pub fn to_float_tensor<B: Backend, const D: usize>(
    array: &BatchArray,
    device: &B::Device,
) -> Result<Tensor<B, D>, RecordError> {
    check_rank(array, D)?;
    let data = TensorData::new(array.to_f32_vec(), array.shape().to_vec());
    Ok(Tensor::from_data(data, device))
}

/// Build a rank-`D` integer tensor from `array` (`i64` or `u8` data).
pub fn to_int_tensor<B: Backend, const D: usize>(
    array: &BatchArray,
    device: &B::Device,
) -> Result<Tensor<B, D, Int>, RecordError> {
    check_rank(array, D)?;
    let data = TensorData::new(array.to_i64_vec()?, array.shape().to_vec());
    Ok(Tensor::from_data(data, device))
}

/// One-hot encode integer indices, appending a trailing axis of length
/// `n_classes`. Fails on indices outside `0..n_classes`.
pub fn one_hot(indices: &BatchArray, n_classes: usize) -> Result<BatchArray, RecordError> {
    let idx = indices.to_i64_vec()?;
    let mut out = vec![0.0f32; idx.len() * n_classes];
    for (k, &i) in idx.iter().enumerate() {
        if i < 0 || i as usize >= n_classes {
            return Err(RecordError::OutOfBounds {
                index: i.max(0) as usize,
                len: n_classes,
            });
        }
        out[k * n_classes + i as usize] = 1.0;
    }
    let mut shape = indices.shape().to_vec();
    shape.push(n_classes);
    BatchArray::from_vec_f32(&shape, out)
}

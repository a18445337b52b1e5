//! Masked reductions over batch tensors.

use burn::tensor::backend::Backend;
use burn::tensor::Tensor;

/// Mean of `x` over entries where `valid` is 1, or the plain mean when no
/// mask is given.
///
/// The mask is a same-shaped 0/1 float tensor; entries past the end of an
/// episode carry 0 and drop out of both the numerator and the denominator.
pub fn valid_mean<B: Backend, const D: usize>(
    x: Tensor<B, D>,
    valid: Option<&Tensor<B, D>>,
) -> Tensor<B, 1> {
    match valid {
        Some(mask) => {
            let num = (x * mask.clone()).sum();
            let den = mask.clone().sum();
            num / den
        }
        None => x.mean(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::ndarray::NdArray;

    type B = NdArray<f32>;

    fn scalar(t: Tensor<B, 1>) -> f32 {
        t.into_data().as_slice::<f32>().unwrap()[0]
    }

    #[test]
    fn unmasked_is_plain_mean() {
        let device = Default::default();
        let x = Tensor::<B, 1>::from_floats([1.0, 2.0, 3.0, 6.0], &device);
        assert!((scalar(valid_mean(x, None)) - 3.0).abs() < 1e-6);
    }

    #[test]
    fn masked_entries_drop_out_of_both_sums() {
        let device = Default::default();
        let x = Tensor::<B, 1>::from_floats([1.0, 2.0, 100.0, 3.0], &device);
        let mask = Tensor::<B, 1>::from_floats([1.0, 1.0, 0.0, 1.0], &device);
        assert!((scalar(valid_mean(x, Some(&mask))) - 2.0).abs() < 1e-6);
    }

    #[test]
    fn all_valid_mask_matches_plain_mean() {
        let device = Default::default();
        let x = Tensor::<B, 2>::from_floats([[1.0, 2.0], [3.0, 4.0]], &device);
        let mask = Tensor::<B, 2>::from_floats([[1.0, 1.0], [1.0, 1.0]], &device);
        let a = scalar(valid_mean(x.clone(), Some(&mask)));
        let b = scalar(valid_mean(x, None));
        assert!((a - b).abs() < 1e-6);
    }
}

//! Record-field capability for backend tensors.
//!
//! Lets burn tensors live directly inside a [`Record`](crate::core::record::Record),
//! which is how recurrent state is carried: a two-field record of `[batch,
//! layers, hidden]` tensors that slices along the batch axis in lockstep.
//!
//! Tensors are rank-static, so a single-index selection keeps the leading
//! axis as length 1 instead of dropping it; spans behave as usual.
//! Assignment requires the source to match the selected region exactly
//! (backend tensors do not broadcast here).

use burn::tensor::backend::Backend;
use burn::tensor::Tensor;

use crate::core::record::{Loc, RecordError, Slicable};

impl<B: Backend, const D: usize> Slicable for Tensor<B, D> {
    fn lead_len(&self) -> usize {
        self.dims()[0]
    }

    fn slice(&self, loc: &Loc) -> Result<Self, RecordError> {
        let len = self.dims()[0];
        let (start, end) = match *loc {
            Loc::At(i) => {
                if i >= len {
                    return Err(RecordError::OutOfBounds { index: i, len });
                }
                (i, i + 1)
            }
            Loc::Span(a, b) => {
                if a > b || b > len {
                    return Err(RecordError::BadSpan { start: a, end: b, len });
                }
                (a, b)
            }
        };
        Ok(self.clone().slice([start..end]))
    }

    fn slice_assign(&mut self, loc: &Loc, value: &Self) -> Result<(), RecordError> {
        let len = self.dims()[0];
        let (start, end) = match *loc {
            Loc::At(i) => {
                if i >= len {
                    return Err(RecordError::OutOfBounds { index: i, len });
                }
                (i, i + 1)
            }
            Loc::Span(a, b) => {
                if a > b || b > len {
                    return Err(RecordError::BadSpan { start: a, end: b, len });
                }
                (a, b)
            }
        };
        let mut expected = self.dims();
        expected[0] = end - start;
        if value.dims() != expected {
            return Err(RecordError::ShapeMismatch {
                dst: expected.to_vec(),
                src: value.dims().to_vec(),
            });
        }
        *self = self.clone().slice_assign([start..end], value.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::ndarray::NdArray;

    type B = NdArray<f32>;

    // Fully qualified calls throughout: tensors have inherent `slice` and
    // `slice_assign` methods that take range arrays, not locations.

    #[test]
    fn span_selects_along_the_leading_axis() {
        let device = Default::default();
        let t = Tensor::<B, 2>::from_floats([[1.0, 2.0], [3.0, 4.0], [5.0, 6.0]], &device);
        let s = Slicable::slice(&t, &Loc::Span(1, 3)).unwrap();
        assert_eq!(s.dims(), [2, 2]);
        assert_eq!(s.into_data().as_slice::<f32>().unwrap(), &[3.0, 4.0, 5.0, 6.0]);
    }

    #[test]
    fn single_index_keeps_a_length_one_axis() {
        let device = Default::default();
        let t = Tensor::<B, 2>::from_floats([[1.0, 2.0], [3.0, 4.0]], &device);
        let s = Slicable::slice(&t, &Loc::At(1)).unwrap();
        assert_eq!(s.dims(), [1, 2]);
        assert!(Slicable::slice(&t, &Loc::At(2)).is_err());
    }

    #[test]
    fn assignment_replaces_the_region() {
        let device = Default::default();
        let mut t = Tensor::<B, 2>::zeros([3, 2], &device);
        let v = Tensor::<B, 2>::from_floats([[7.0, 8.0]], &device);
        Slicable::slice_assign(&mut t, &Loc::At(1), &v).unwrap();
        assert_eq!(
            t.into_data().as_slice::<f32>().unwrap(),
            &[0.0, 0.0, 7.0, 8.0, 0.0, 0.0]
        );
    }

    #[test]
    fn assignment_requires_an_exact_region_shape() {
        let device = Default::default();
        let mut t = Tensor::<B, 2>::zeros([3, 2], &device);
        let wrong = Tensor::<B, 2>::zeros([2, 2], &device);
        assert!(matches!(
            Slicable::slice_assign(&mut t, &Loc::At(0), &wrong).unwrap_err(),
            RecordError::ShapeMismatch { .. }
        ));
    }

    /// Recurrent state as a record of tensors: batch-axis slicing reaches
    /// both fields.
    #[test]
    fn tensor_record_slices_in_lockstep() {
        use crate::core::record::{Field, Record, RecordSchema};

        let device: <B as burn::tensor::backend::Backend>::Device = Default::default();
        let schema = RecordSchema::new("State", &["h", "c"]).unwrap();
        let rec = Record::new(
            &schema,
            vec![
                Field::Value(Tensor::<B, 3>::zeros([4, 1, 8], &device)),
                Field::Value(Tensor::<B, 3>::ones([4, 1, 8], &device)),
            ],
        )
        .unwrap();
        let half = rec.slice(0..2).unwrap();
        assert_eq!(half.get("h").unwrap().as_value().unwrap().dims(), [2, 1, 8]);
        assert_eq!(half.get("c").unwrap().as_value().unwrap().dims(), [2, 1, 8]);
    }
}

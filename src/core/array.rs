//! Batch array leaves: dynamic-rank arrays over shared storage.
//!
//! [`BatchArray`] is the value type sample batches are made of. Storage is
//! `ndarray::ArcArray`, so slicing a batch shares the underlying buffer
//! (zero copy, adjusted view) instead of duplicating it. Writes go through
//! copy-on-write: they are in place while a buffer handle is unique, and
//! detach a private copy first when the buffer is shared with other live
//! handles. Within a single training step each batch has one owner, so
//! assignments stay in place on the hot path.
//!
//! Dtype is erased behind an enum (`f32`, `i64`, `u8`, `bool`) so one record
//! can mix observation bytes, action indices, and float rewards. Assignment
//! broadcasts the source into the destination region under the usual
//! trailing-axis rules, checked up front so a mismatch is an error rather
//! than a panic.

use ndarray::{ArcArray, ArrayD, Axis, IxDyn, Slice};
use serde::{Deserialize, Serialize};

use crate::core::record::{Loc, RecordError, Slicable};

/// Dynamic-rank array with shared (reference-counted) storage.
pub type ArcArrayD<A> = ArcArray<A, IxDyn>;

/// Whether `src` can broadcast-assign into a region of shape `dst`:
/// trailing axes must match or be 1 on the source side.
fn broadcastable(src: &[usize], dst: &[usize]) -> bool {
    if src.len() > dst.len() {
        return false;
    }
    src.iter()
        .rev()
        .zip(dst.iter().rev())
        .all(|(s, d)| *s == *d || *s == 1)
}

fn check_at(index: usize, len: usize) -> Result<(), RecordError> {
    if index >= len {
        return Err(RecordError::OutOfBounds { index, len });
    }
    Ok(())
}

fn check_span(start: usize, end: usize, len: usize) -> Result<(), RecordError> {
    if start > end || end > len {
        return Err(RecordError::BadSpan { start, end, len });
    }
    Ok(())
}

impl<A: Clone> Slicable for ArcArrayD<A> {
    fn lead_len(&self) -> usize {
        self.shape().first().copied().unwrap_or(0)
    }

    fn slice(&self, loc: &Loc) -> Result<Self, RecordError> {
        if self.ndim() == 0 {
            return Err(RecordError::NoLeadingAxis);
        }
        let len = self.lead_len();
        match *loc {
            Loc::At(i) => {
                check_at(i, len)?;
                Ok(self.clone().index_axis_move(Axis(0), i))
            }
            Loc::Span(a, b) => {
                check_span(a, b, len)?;
                let mut view = self.clone();
                view.slice_axis_inplace(Axis(0), Slice::from(a..b));
                Ok(view)
            }
        }
    }

    fn slice_assign(&mut self, loc: &Loc, value: &Self) -> Result<(), RecordError> {
        if self.ndim() == 0 {
            return Err(RecordError::NoLeadingAxis);
        }
        let len = self.lead_len();
        match *loc {
            Loc::At(i) => {
                check_at(i, len)?;
                let dst_shape: Vec<usize> = self.shape()[1..].to_vec();
                if !broadcastable(value.shape(), &dst_shape) {
                    return Err(RecordError::ShapeMismatch {
                        dst: dst_shape,
                        src: value.shape().to_vec(),
                    });
                }
                self.index_axis_mut(Axis(0), i).assign(value);
                Ok(())
            }
            Loc::Span(a, b) => {
                check_span(a, b, len)?;
                let mut dst_shape: Vec<usize> = self.shape().to_vec();
                dst_shape[0] = b - a;
                if !broadcastable(value.shape(), &dst_shape) {
                    return Err(RecordError::ShapeMismatch {
                        dst: dst_shape,
                        src: value.shape().to_vec(),
                    });
                }
                self.slice_axis_mut(Axis(0), Slice::from(a..b)).assign(value);
                Ok(())
            }
        }
    }
}

fn reshape_arc<A: Clone>(a: &ArcArrayD<A>, shape: &[usize]) -> Result<ArcArrayD<A>, RecordError> {
    let count: usize = shape.iter().product();
    if a.len() != count {
        return Err(RecordError::ShapeMismatch {
            dst: shape.to_vec(),
            src: a.shape().to_vec(),
        });
    }
    match a.clone().into_shape_with_order(IxDyn(shape)) {
        Ok(reshaped) => Ok(reshaped),
        // Memory order does not admit a view; copy into standard order.
        Err(_) => {
            let values: Vec<A> = a.iter().cloned().collect();
            Ok(ArrayD::from_shape_vec(IxDyn(shape), values)
                .expect("element count checked above")
                .into_shared())
        }
    }
}

// ============================================================================
// BatchArray
// ============================================================================

/// Dtype-erased batch array: one of `f32`, `i64`, `u8`, or `bool` data over
/// shared dynamic-rank storage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum BatchArray {
    /// Float data (rewards, values, masks).
    F32(ArcArrayD<f32>),
    /// Integer data (action indices).
    I64(ArcArrayD<i64>),
    /// Byte data (pixel observations).
    U8(ArcArrayD<u8>),
    /// Flag data (episode resets).
    Bool(ArcArrayD<bool>),
}

impl BatchArray {
    /// Dtype name for diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            BatchArray::F32(_) => "f32",
            BatchArray::I64(_) => "i64",
            BatchArray::U8(_) => "u8",
            BatchArray::Bool(_) => "bool",
        }
    }

    /// Array shape.
    pub fn shape(&self) -> &[usize] {
        match self {
            BatchArray::F32(a) => a.shape(),
            BatchArray::I64(a) => a.shape(),
            BatchArray::U8(a) => a.shape(),
            BatchArray::Bool(a) => a.shape(),
        }
    }

    /// Total element count.
    pub fn count(&self) -> usize {
        self.shape().iter().product()
    }

    pub fn from_vec_f32(shape: &[usize], values: Vec<f32>) -> Result<Self, RecordError> {
        Self::from_vec(shape, values).map(BatchArray::F32)
    }

    pub fn from_vec_i64(shape: &[usize], values: Vec<i64>) -> Result<Self, RecordError> {
        Self::from_vec(shape, values).map(BatchArray::I64)
    }

    pub fn from_vec_u8(shape: &[usize], values: Vec<u8>) -> Result<Self, RecordError> {
        Self::from_vec(shape, values).map(BatchArray::U8)
    }

    pub fn from_vec_bool(shape: &[usize], values: Vec<bool>) -> Result<Self, RecordError> {
        Self::from_vec(shape, values).map(BatchArray::Bool)
    }

    fn from_vec<A: Clone>(shape: &[usize], values: Vec<A>) -> Result<ArcArrayD<A>, RecordError> {
        let src_len = values.len();
        ArrayD::from_shape_vec(IxDyn(shape), values)
            .map(ArrayD::into_shared)
            .map_err(|_| RecordError::ShapeMismatch {
                dst: shape.to_vec(),
                src: vec![src_len],
            })
    }

    /// All-zero float array.
    pub fn zeros_f32(shape: &[usize]) -> Self {
        BatchArray::F32(ArrayD::zeros(IxDyn(shape)).into_shared())
    }

    /// Constant float array.
    pub fn from_elem_f32(shape: &[usize], value: f32) -> Self {
        BatchArray::F32(ArrayD::from_elem(IxDyn(shape), value).into_shared())
    }

    /// Rank-0 float scalar; broadcasts into any region on assignment.
    pub fn scalar_f32(value: f32) -> Self {
        BatchArray::F32(ArrayD::from_elem(IxDyn(&[]), value).into_shared())
    }

    /// Rank-0 integer scalar.
    pub fn scalar_i64(value: i64) -> Self {
        BatchArray::I64(ArrayD::from_elem(IxDyn(&[]), value).into_shared())
    }

    pub fn as_f32(&self) -> Option<&ArcArrayD<f32>> {
        match self {
            BatchArray::F32(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<&ArcArrayD<i64>> {
        match self {
            BatchArray::I64(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_u8(&self) -> Option<&ArcArrayD<u8>> {
        match self {
            BatchArray::U8(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<&ArcArrayD<bool>> {
        match self {
            BatchArray::Bool(a) => Some(a),
            _ => None,
        }
    }

    /// Elements as `f32` in row-major order, converting integer, byte, and
    /// flag data numerically.
    pub fn to_f32_vec(&self) -> Vec<f32> {
        match self {
            BatchArray::F32(a) => a.iter().copied().collect(),
            BatchArray::I64(a) => a.iter().map(|v| *v as f32).collect(),
            BatchArray::U8(a) => a.iter().map(|v| *v as f32).collect(),
            BatchArray::Bool(a) => a.iter().map(|v| if *v { 1.0 } else { 0.0 }).collect(),
        }
    }

    /// Elements as `i64` in row-major order; float data is not converted.
    pub fn to_i64_vec(&self) -> Result<Vec<i64>, RecordError> {
        match self {
            BatchArray::I64(a) => Ok(a.iter().copied().collect()),
            BatchArray::U8(a) => Ok(a.iter().map(|v| *v as i64).collect()),
            other => Err(RecordError::KindMismatch {
                expected: "i64",
                got: other.kind(),
            }),
        }
    }

    /// Elements as `bool` in row-major order.
    pub fn to_bool_vec(&self) -> Result<Vec<bool>, RecordError> {
        match self {
            BatchArray::Bool(a) => Ok(a.iter().copied().collect()),
            other => Err(RecordError::KindMismatch {
                expected: "bool",
                got: other.kind(),
            }),
        }
    }

    /// Same data, new shape. Shares storage when the current memory order
    /// allows a view; copies otherwise.
    pub fn reshape(&self, shape: &[usize]) -> Result<Self, RecordError> {
        match self {
            BatchArray::F32(a) => reshape_arc(a, shape).map(BatchArray::F32),
            BatchArray::I64(a) => reshape_arc(a, shape).map(BatchArray::I64),
            BatchArray::U8(a) => reshape_arc(a, shape).map(BatchArray::U8),
            BatchArray::Bool(a) => reshape_arc(a, shape).map(BatchArray::Bool),
        }
    }
}

impl Slicable for BatchArray {
    fn lead_len(&self) -> usize {
        match self {
            BatchArray::F32(a) => a.lead_len(),
            BatchArray::I64(a) => a.lead_len(),
            BatchArray::U8(a) => a.lead_len(),
            BatchArray::Bool(a) => a.lead_len(),
        }
    }

    // Fully qualified calls: ndarray has inherent `slice` methods that would
    // otherwise shadow the trait.
    fn slice(&self, loc: &Loc) -> Result<Self, RecordError> {
        match self {
            BatchArray::F32(a) => Slicable::slice(a, loc).map(BatchArray::F32),
            BatchArray::I64(a) => Slicable::slice(a, loc).map(BatchArray::I64),
            BatchArray::U8(a) => Slicable::slice(a, loc).map(BatchArray::U8),
            BatchArray::Bool(a) => Slicable::slice(a, loc).map(BatchArray::Bool),
        }
    }

    fn slice_assign(&mut self, loc: &Loc, value: &Self) -> Result<(), RecordError> {
        match (self, value) {
            (BatchArray::F32(dst), BatchArray::F32(src)) => Slicable::slice_assign(dst, loc, src),
            (BatchArray::I64(dst), BatchArray::I64(src)) => Slicable::slice_assign(dst, loc, src),
            (BatchArray::U8(dst), BatchArray::U8(src)) => Slicable::slice_assign(dst, loc, src),
            (BatchArray::Bool(dst), BatchArray::Bool(src)) => {
                Slicable::slice_assign(dst, loc, src)
            }
            (dst, src) => Err(RecordError::KindMismatch {
                expected: dst.kind(),
                got: src.kind(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counting(shape: &[usize]) -> BatchArray {
        let n: usize = shape.iter().product();
        BatchArray::from_vec_f32(shape, (0..n).map(|v| v as f32).collect()).unwrap()
    }

    #[test]
    fn slice_span_shares_storage() {
        let a = counting(&[4, 2]);
        let s = a.slice(&Loc::Span(0, 2)).unwrap();
        assert_eq!(s.shape(), &[2, 2]);
        // Same base pointer: the span is a view, not a copy.
        assert_eq!(
            a.as_f32().unwrap().as_ptr(),
            s.as_f32().unwrap().as_ptr()
        );
    }

    #[test]
    fn slice_at_drops_the_leading_axis() {
        let a = counting(&[3, 2]);
        let row = a.slice(&Loc::At(1)).unwrap();
        assert_eq!(row.shape(), &[2]);
        assert_eq!(row.to_f32_vec(), vec![2.0, 3.0]);
    }

    #[test]
    fn slice_bounds_are_checked() {
        let a = counting(&[3]);
        assert!(matches!(
            a.slice(&Loc::At(3)).unwrap_err(),
            RecordError::OutOfBounds { index: 3, len: 3 }
        ));
        assert!(matches!(
            a.slice(&Loc::Span(2, 5)).unwrap_err(),
            RecordError::BadSpan { .. }
        ));
        let scalar = BatchArray::scalar_f32(1.0);
        assert!(matches!(
            scalar.slice(&Loc::At(0)).unwrap_err(),
            RecordError::NoLeadingAxis
        ));
    }

    #[test]
    fn assign_writes_in_place() {
        let mut a = counting(&[4]);
        let v = BatchArray::from_vec_f32(&[2], vec![8.0, 9.0]).unwrap();
        a.slice_assign(&Loc::Span(1, 3), &v).unwrap();
        assert_eq!(a.to_f32_vec(), vec![0.0, 8.0, 9.0, 3.0]);
    }

    #[test]
    fn scalar_broadcasts_across_the_region() {
        let mut a = counting(&[2, 3]);
        a.slice_assign(&Loc::At(0), &BatchArray::scalar_f32(7.0)).unwrap();
        assert_eq!(a.to_f32_vec(), vec![7.0, 7.0, 7.0, 3.0, 4.0, 5.0]);

        let mut b = counting(&[2, 2]);
        b.slice_assign(&Loc::Span(0, 2), &BatchArray::scalar_f32(0.0)).unwrap();
        assert_eq!(b.to_f32_vec(), vec![0.0; 4]);
    }

    #[test]
    fn assign_rejects_bad_shapes_without_panicking() {
        let mut a = counting(&[2, 3]);
        let bad = BatchArray::from_vec_f32(&[4], vec![0.0; 4]).unwrap();
        assert!(matches!(
            a.slice_assign(&Loc::At(0), &bad).unwrap_err(),
            RecordError::ShapeMismatch { .. }
        ));
    }

    #[test]
    fn assign_rejects_mixed_kinds() {
        let mut a = counting(&[2]);
        let ints = BatchArray::from_vec_i64(&[2], vec![1, 2]).unwrap();
        let err = a.slice_assign(&Loc::Span(0, 2), &ints).unwrap_err();
        assert!(matches!(
            err,
            RecordError::KindMismatch { expected: "f32", got: "i64" }
        ));
    }

    #[test]
    fn reshape_preserves_row_major_order() {
        let a = counting(&[2, 3]);
        let r = a.reshape(&[3, 2]).unwrap();
        assert_eq!(r.shape(), &[3, 2]);
        assert_eq!(r.to_f32_vec(), a.to_f32_vec());
        assert!(matches!(
            a.reshape(&[4]).unwrap_err(),
            RecordError::ShapeMismatch { .. }
        ));
    }

    /// Records over real array leaves: slicing selects every column, a
    /// matching record scatters per-field, and untouched locations stay put.
    #[test]
    fn pair_record_over_arrays() {
        use crate::core::record::{Field, Record, RecordSchema};

        let schema = RecordSchema::new("Pair", &["x", "y"]).unwrap();
        let mut pair = Record::new(
            &schema,
            vec![
                Field::Value(
                    BatchArray::from_vec_f32(&[4], vec![0.0, 1.0, 2.0, 3.0]).unwrap(),
                ),
                Field::Value(
                    BatchArray::from_vec_f32(&[4], vec![10.0, 11.0, 12.0, 13.0]).unwrap(),
                ),
            ],
        )
        .unwrap();

        let mid = pair.slice(1..3).unwrap();
        assert_eq!(
            mid.get("x").unwrap().as_value().unwrap().to_f32_vec(),
            vec![1.0, 2.0]
        );
        assert_eq!(
            mid.get("y").unwrap().as_value().unwrap().to_f32_vec(),
            vec![11.0, 12.0]
        );

        let value = Record::new(
            &schema,
            vec![
                Field::Value(BatchArray::scalar_f32(9.0)),
                Field::Value(BatchArray::scalar_f32(90.0)),
            ],
        )
        .unwrap();
        pair.slice_assign(&Loc::At(0), &value).unwrap();

        let head = pair.slice(0..1).unwrap();
        assert_eq!(head.get("x").unwrap().as_value().unwrap().to_f32_vec(), vec![9.0]);
        assert_eq!(head.get("y").unwrap().as_value().unwrap().to_f32_vec(), vec![90.0]);
        let tail = pair.slice(1..4).unwrap();
        assert_eq!(
            tail.get("x").unwrap().as_value().unwrap().to_f32_vec(),
            vec![1.0, 2.0, 3.0]
        );
        assert_eq!(
            tail.get("y").unwrap().as_value().unwrap().to_f32_vec(),
            vec![11.0, 12.0, 13.0]
        );
    }

    #[test]
    fn dtype_conversions() {
        let flags = BatchArray::from_vec_bool(&[3], vec![true, false, true]).unwrap();
        assert_eq!(flags.to_f32_vec(), vec![1.0, 0.0, 1.0]);
        assert_eq!(flags.to_bool_vec().unwrap(), vec![true, false, true]);

        let bytes = BatchArray::from_vec_u8(&[2], vec![255, 0]).unwrap();
        assert_eq!(bytes.to_i64_vec().unwrap(), vec![255, 0]);
        assert!(flags.to_i64_vec().is_err());
    }
}

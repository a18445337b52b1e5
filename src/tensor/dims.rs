//! Leading-dimension inference for batch tensors.
//!
//! Batches arrive in one of three leading-dimension conventions:
//!
//! - `[...]` a single unbatched sample (no leading axes),
//! - `[B, ...]` a batch,
//! - `[T, B, ...]` a time-major batch of trajectories.
//!
//! Feed-forward trunks want exactly one flattened leading axis. This module
//! classifies the leading axes of a shape given its number of trailing
//! feature axes, folds time and batch into one axis, and restores the
//! original convention on the way back out, so callers can supply and
//! receive any of the three forms transparently.

use crate::core::array::BatchArray;
use crate::core::record::RecordError;

/// Classification of a tensor's leading axes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LeadingDims {
    /// Time dimension (1 when absent).
    pub t: usize,
    /// Batch dimension (1 when absent).
    pub b: usize,
    /// Whether a time axis was present in the input.
    pub has_t: bool,
    /// Whether a batch axis was present in the input.
    pub has_b: bool,
}

impl LeadingDims {
    /// A single unbatched sample.
    pub fn single() -> Self {
        Self { t: 1, b: 1, has_t: false, has_b: false }
    }

    /// A batch of `b` samples.
    pub fn batch(b: usize) -> Self {
        Self { t: 1, b, has_t: false, has_b: true }
    }

    /// A time-major batch of `b` trajectories of length `t`.
    pub fn time_batch(t: usize, b: usize) -> Self {
        Self { t, b, has_t: true, has_b: true }
    }

    /// Length of the folded leading axis.
    pub fn fold_len(&self) -> usize {
        self.t * self.b
    }
}

/// Split `shape` into leading classification and trailing feature axes.
///
/// The last `n_trailing` axes are feature axes; zero, one, or two axes may
/// remain in front of them. More than two is an error.
pub fn infer_leading_dims(
    shape: &[usize],
    n_trailing: usize,
) -> Result<(LeadingDims, Vec<usize>), RecordError> {
    let n_lead = shape.len().checked_sub(n_trailing).ok_or(RecordError::LeadingDims {
        shape: shape.to_vec(),
        n_trailing,
    })?;
    let lead = match n_lead {
        0 => LeadingDims::single(),
        1 => LeadingDims::batch(shape[0]),
        2 => LeadingDims::time_batch(shape[0], shape[1]),
        _ => {
            return Err(RecordError::LeadingDims {
                shape: shape.to_vec(),
                n_trailing,
            })
        }
    };
    Ok((lead, shape[n_lead..].to_vec()))
}

/// The original full shape for `trailing` axes under the `lead` convention.
pub fn restore_shape(lead: &LeadingDims, trailing: &[usize]) -> Vec<usize> {
    let mut shape = Vec::with_capacity(2 + trailing.len());
    if lead.has_t {
        shape.push(lead.t);
    }
    if lead.has_b {
        shape.push(lead.b);
    }
    shape.extend_from_slice(trailing);
    shape
}

/// Fold any leading axes of `array` into a single `[T*B, trailing...]` axis.
///
/// Returns the folded array together with the classification needed to
/// restore the original convention.
pub fn fold_leading(
    array: &BatchArray,
    n_trailing: usize,
) -> Result<(BatchArray, LeadingDims), RecordError> {
    let (lead, trailing) = infer_leading_dims(array.shape(), n_trailing)?;
    let mut folded = Vec::with_capacity(1 + trailing.len());
    folded.push(lead.fold_len());
    folded.extend_from_slice(&trailing);
    Ok((array.reshape(&folded)?, lead))
}

/// Undo [`fold_leading`]: reshape `[T*B, trailing...]` back to the original
/// leading-dimension convention, collapsing axes that were never present.
pub fn restore_leading(
    array: &BatchArray,
    lead: &LeadingDims,
) -> Result<BatchArray, RecordError> {
    let shape = array.shape();
    if shape.first().copied().unwrap_or(0) != lead.fold_len() {
        return Err(RecordError::ShapeMismatch {
            dst: vec![lead.fold_len()],
            src: shape.to_vec(),
        });
    }
    array.reshape(&restore_shape(lead, &shape[1..]))
}

//! Tensor-boundary utilities.
//!
//! - `dims`: leading-dimension inference and the fold/restore pair
//! - `masked`: valid-masked reductions
//! - `convert`: batch-array to backend-tensor conversions, one-hot encoding
//! - `slice`: record-field capability for backend tensors

pub mod convert;
pub mod dims;
pub mod masked;
pub mod slice;

pub use convert::{one_hot, to_float_tensor, to_int_tensor};
pub use dims::{fold_leading, infer_leading_dims, restore_leading, restore_shape, LeadingDims};
pub use masked::valid_mean;

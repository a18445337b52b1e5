//! # structured_rl: structured array-record batches for policy-gradient training
//!
//! Components for a reinforcement-learning training loop built around one
//! idea: a trajectory batch is a *columnar record*, a named fixed-arity
//! tuple of parallel arrays (or nested records of them) sharing a common
//! leading shape. Indexing a record slices every column in lockstep, with
//! zero-copy views into the underlying buffers, so sampler, model, and
//! optimizer pass structured batches across their boundaries without
//! per-field bookkeeping.
//!
//! ## Components
//!
//! - [`core::record`]: the schema-driven record container, its [`Slicable`]
//!   capability trait, and the error taxonomy. The heart of the crate.
//! - [`core::array`]: dtype-erased dynamic-rank arrays over shared storage,
//!   the leaf values of sample batches.
//! - [`core::attr_map`]: attribute-style mapping for configuration and
//!   bookkeeping records.
//! - [`core::samples`]: the standard nested trajectory-batch schemas.
//! - [`tensor`]: leading-dimension inference (fold `[T,B,...]`, `[B,...]`,
//!   or unbatched inputs to one leading axis and back), masked means, and
//!   array-to-tensor conversions.
//! - [`nn`]: the convolutional-recurrent perception-policy model, with its
//!   recurrent state carried as a two-field record.
//! - [`algorithms`]: categorical distribution, agent seam, sample
//!   processing, and advantage actor-critic optimization.
//! - [`metrics`]: console/CSV diagnostics loggers.
//!
//! ## Example
//!
//! ```
//! use structured_rl::core::record::{Field, Record, RecordSchema, Loc};
//! use structured_rl::core::array::BatchArray;
//!
//! let pair = RecordSchema::new("Pair", &["x", "y"]).unwrap();
//! let p = Record::new(&pair, vec![
//!     Field::Value(BatchArray::from_vec_f32(&[4], vec![0., 1., 2., 3.]).unwrap()),
//!     Field::Value(BatchArray::from_vec_f32(&[4], vec![10., 11., 12., 13.]).unwrap()),
//! ]).unwrap();
//!
//! // One location, every field.
//! let mid = p.slice(1..3).unwrap();
//! assert_eq!(mid.get("x").unwrap().as_value().unwrap().shape(), &[2]);
//!
//! // Scatter a matching record into location 0.
//! let mut p = p;
//! let q = Record::new(&pair, vec![
//!     Field::Value(BatchArray::scalar_f32(9.)),
//!     Field::Value(BatchArray::scalar_f32(90.)),
//! ]).unwrap();
//! p.slice_assign(&Loc::At(0), &q).unwrap();
//! assert_eq!(p.get("x").unwrap().as_value().unwrap().to_f32_vec()[0], 9.0);
//! ```
//!
//! Everything here is single-threaded and synchronous; batches have one
//! owner per training step. Array buffers are reference-counted: slices
//! share storage with their source, and a write detaches a private copy
//! only when the buffer is still shared with other live handles.
//!
//! [`Slicable`]: core::record::Slicable

pub mod algorithms;
pub mod core;
pub mod metrics;
pub mod nn;
pub mod tensor;

// Re-export commonly used types.
pub use crate::core::array::{ArcArrayD, BatchArray};
pub use crate::core::attr_map::{AttrMap, AttrValue};
pub use crate::core::record::{
    schema_like, Field, Loc, NamedFields, Record, RecordBuilder, RecordError, RecordSchema,
    Slicable, RESERVED_NAMES,
};
pub use crate::core::samples::{Samples, SamplesBuilder};
pub use crate::tensor::dims::{
    fold_leading, infer_leading_dims, restore_leading, restore_shape, LeadingDims,
};
pub use crate::tensor::masked::valid_mean;
pub use crate::nn::atari_lstm::{
    AtariLstmModel, AtariLstmModelConfig, HeadWiring, ModelOutput, RnnState,
};
pub use crate::algorithms::a2c::{A2c, A2cConfig, A2cLoss, OptInfo};
pub use crate::algorithms::agent::{Agent, PolicyModel};
pub use crate::algorithms::distribution::Categorical;
pub use crate::algorithms::returns::{process_samples, OptData, ProcessedSamples};
pub use crate::metrics::logger::{ConsoleLogger, CsvLogger, MetricsLogger, OptSnapshot};

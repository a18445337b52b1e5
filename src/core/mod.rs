//! Core containers for structured, sliceable batches.

pub mod array;
pub mod attr_map;
pub mod record;
pub mod samples;

pub use array::{ArcArrayD, BatchArray};
pub use attr_map::{AttrMap, AttrValue};
pub use record::{
    schema_like, Field, Loc, NamedFields, Record, RecordBuilder, RecordError, RecordSchema,
    Slicable, RESERVED_NAMES,
};
pub use samples::{
    agent_samples_schema, env_samples_schema, leaf, leaf_at, nested, samples_schema, Samples,
    SamplesBuilder,
};

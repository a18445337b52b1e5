//! Standard trajectory-batch layout shared by sampler and algorithm.
//!
//! A sample batch is a nested record with `BatchArray` leaves in time-major
//! `[T, B, ...]` layout:
//!
//! ```text
//! Samples(
//!     agent = AgentSamples(action, prev_action, value, bootstrap_value),
//!     env   = EnvSamples(observation, reward, prev_reward, done),
//! )
//! ```
//!
//! `action`, `reward`, `prev_reward`, `done`, and `value` are `[T, B]`;
//! `observation` is `[T, B, ...]` with arbitrary feature axes; the bootstrap
//! value estimate for the step after the batch is `[B]`. Slicing the outer
//! record selects the same time span across every column of every nested
//! record at once.
//!
//! The exact field set is a contract between sampler and algorithm, not a
//! fixed part of the container; this module is the one this crate's A2C
//! speaks.

use std::sync::{Arc, OnceLock};

use crate::core::array::BatchArray;
use crate::core::record::{Record, RecordError, RecordSchema};

/// A trajectory batch: nested record of batch arrays.
pub type Samples = Record<BatchArray>;

/// Schema of the `agent` group.
pub fn agent_samples_schema() -> Arc<RecordSchema> {
    static SCHEMA: OnceLock<Arc<RecordSchema>> = OnceLock::new();
    SCHEMA
        .get_or_init(|| {
            RecordSchema::new(
                "AgentSamples",
                &["action", "prev_action", "value", "bootstrap_value"],
            )
            .expect("schema fields are valid identifiers")
        })
        .clone()
}

/// Schema of the `env` group.
pub fn env_samples_schema() -> Arc<RecordSchema> {
    static SCHEMA: OnceLock<Arc<RecordSchema>> = OnceLock::new();
    SCHEMA
        .get_or_init(|| {
            RecordSchema::new("EnvSamples", &["observation", "reward", "prev_reward", "done"])
                .expect("schema fields are valid identifiers")
        })
        .clone()
}

/// Top-level schema.
pub fn samples_schema() -> Arc<RecordSchema> {
    static SCHEMA: OnceLock<Arc<RecordSchema>> = OnceLock::new();
    SCHEMA
        .get_or_init(|| {
            RecordSchema::new("Samples", &["agent", "env"])
                .expect("schema fields are valid identifiers")
        })
        .clone()
}

/// The nested record stored under `name`.
pub fn nested<'a>(record: &'a Samples, name: &str) -> Result<&'a Samples, RecordError> {
    let field = record.get(name).ok_or_else(|| annotate(record, name, RecordError::Absent))?;
    field
        .as_record()
        .ok_or_else(|| annotate(record, name, RecordError::KindMismatch {
            expected: "record",
            got: if field.is_absent() { "absent" } else { "value" },
        }))
}

/// The leaf array stored under `name`.
pub fn leaf<'a>(record: &'a Samples, name: &str) -> Result<&'a BatchArray, RecordError> {
    let field = record.get(name).ok_or_else(|| annotate(record, name, RecordError::Absent))?;
    field
        .as_value()
        .ok_or_else(|| annotate(record, name, RecordError::KindMismatch {
            expected: "value",
            got: if field.is_absent() { "absent" } else { "record" },
        }))
}

/// The leaf array at `group.name`.
pub fn leaf_at<'a>(
    record: &'a Samples,
    group: &str,
    name: &str,
) -> Result<&'a BatchArray, RecordError> {
    leaf(nested(record, group)?, name)
}

fn annotate(record: &Samples, field: &str, source: RecordError) -> RecordError {
    RecordError::Field {
        type_name: record.schema().name().to_string(),
        field: field.to_string(),
        source: Box::new(source),
    }
}

/// Checked construction of a [`Samples`] batch with `[T, B]` leading shape
/// agreement across all columns.
pub struct SamplesBuilder {
    t: usize,
    b: usize,
    observation: Option<BatchArray>,
    action: Option<BatchArray>,
    prev_action: Option<BatchArray>,
    value: Option<BatchArray>,
    bootstrap_value: Option<BatchArray>,
    reward: Option<BatchArray>,
    prev_reward: Option<BatchArray>,
    done: Option<BatchArray>,
}

impl SamplesBuilder {
    pub fn new(t: usize, b: usize) -> Self {
        Self {
            t,
            b,
            observation: None,
            action: None,
            prev_action: None,
            value: None,
            bootstrap_value: None,
            reward: None,
            prev_reward: None,
            done: None,
        }
    }

    pub fn observation(mut self, a: BatchArray) -> Self {
        self.observation = Some(a);
        self
    }

    pub fn action(mut self, a: BatchArray) -> Self {
        self.action = Some(a);
        self
    }

    pub fn prev_action(mut self, a: BatchArray) -> Self {
        self.prev_action = Some(a);
        self
    }

    pub fn value(mut self, a: BatchArray) -> Self {
        self.value = Some(a);
        self
    }

    pub fn bootstrap_value(mut self, a: BatchArray) -> Self {
        self.bootstrap_value = Some(a);
        self
    }

    pub fn reward(mut self, a: BatchArray) -> Self {
        self.reward = Some(a);
        self
    }

    pub fn prev_reward(mut self, a: BatchArray) -> Self {
        self.prev_reward = Some(a);
        self
    }

    pub fn done(mut self, a: BatchArray) -> Self {
        self.done = Some(a);
        self
    }

    fn take(
        slot: Option<BatchArray>,
        name: &str,
        lead: &[usize],
        exact: bool,
    ) -> Result<BatchArray, RecordError> {
        let a = slot.ok_or_else(|| RecordError::Arity {
            type_name: "Samples".to_string(),
            detail: format!("missing column `{}`", name),
        })?;
        let shape = a.shape();
        let fits = if exact {
            shape == lead
        } else {
            shape.len() >= lead.len() && &shape[..lead.len()] == lead
        };
        if !fits {
            return Err(RecordError::Field {
                type_name: "Samples".to_string(),
                field: name.to_string(),
                source: Box::new(RecordError::ShapeMismatch {
                    dst: lead.to_vec(),
                    src: shape.to_vec(),
                }),
            });
        }
        Ok(a)
    }

    pub fn build(self) -> Result<Samples, RecordError> {
        let tb = [self.t, self.b];
        let observation = Self::take(self.observation, "observation", &tb, false)?;
        let action = Self::take(self.action, "action", &tb, true)?;
        let prev_action = Self::take(self.prev_action, "prev_action", &tb, true)?;
        let value = Self::take(self.value, "value", &tb, true)?;
        let bootstrap_value =
            Self::take(self.bootstrap_value, "bootstrap_value", &[self.b], true)?;
        let reward = Self::take(self.reward, "reward", &tb, true)?;
        let prev_reward = Self::take(self.prev_reward, "prev_reward", &tb, true)?;
        let done = Self::take(self.done, "done", &tb, true)?;

        let agent = Record::build(&agent_samples_schema())
            .field("action", action)
            .field("prev_action", prev_action)
            .field("value", value)
            .field("bootstrap_value", bootstrap_value)
            .finish()?;
        let env = Record::build(&env_samples_schema())
            .field("observation", observation)
            .field("reward", reward)
            .field("prev_reward", prev_reward)
            .field("done", done)
            .finish()?;
        Record::build(&samples_schema())
            .record("agent", agent)
            .record("env", env)
            .finish()
    }
}

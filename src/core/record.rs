//! Schema-driven array records: named fixed-arity tuples whose fields are
//! sliced and assigned in lockstep.
//!
//! A [`Record`] is a columnar batch: every field is an array-like value (or a
//! nested record of them) sharing a common leading axis. Indexing a record
//! selects the same location across all fields at once, returning a new
//! record of the same schema, so callers slice whole trajectory batches
//! without per-field bookkeeping and without copying buffer contents.
//!
//! # Design
//!
//! - [`RecordSchema`] is the immutable type descriptor (type name + ordered
//!   unique field names), created once and shared behind an `Arc` by every
//!   instance of that record type.
//! - [`Slicable`] is the capability every field value must provide: length of
//!   the leading axis, indexed read, indexed write. Leaf arrays implement it,
//!   and [`Record`] implements it too, which is what makes nested records
//!   compose without special cases.
//! - [`Field`] wraps one slot: a leaf value, a nested record, or [`Field::Absent`]
//!   (the slot exists structurally but carries no payload).
//!
//! Any failure inside a single field is wrapped in [`RecordError::Field`]
//! with the field's name and the original error chained as its source.
//!
//! ```ignore
//! let pair = RecordSchema::new("Pair", &["x", "y"])?;
//! let p = Record::new(&pair, vec![Field::Value(xs), Field::Value(ys)])?;
//! let mid = p.slice(1..3)?;      // Pair(x=xs[1..3], y=ys[1..3]), shared storage
//! p.slice_assign(&Loc::At(0), &q)?;   // q's fields written into location 0
//! ```

use std::error::Error;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::ops::Range;
use std::sync::Arc;

/// Field names a schema may not use: they would shadow record accessors.
pub const RESERVED_NAMES: &[&str] = &["get_index", "get", "item"];

// ============================================================================
// Loc
// ============================================================================

/// A location along the leading axis: one element or a half-open span.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Loc {
    /// A single index.
    At(usize),
    /// The half-open span `[start, end)`.
    Span(usize, usize),
}

impl From<usize> for Loc {
    fn from(i: usize) -> Self {
        Loc::At(i)
    }
}

impl From<Range<usize>> for Loc {
    fn from(r: Range<usize>) -> Self {
        Loc::Span(r.start, r.end)
    }
}

impl fmt::Display for Loc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Loc::At(i) => write!(f, "{}", i),
            Loc::Span(a, b) => write!(f, "{}..{}", a, b),
        }
    }
}

// ============================================================================
// Errors
// ============================================================================

/// Error type for schema definition and record operations.
#[derive(Debug)]
pub enum RecordError {
    /// A field name collides with a reserved accessor name.
    ReservedName { type_name: String, field: String },
    /// A field name appears more than once.
    DuplicateField { type_name: String, field: String },
    /// Wrong number of fields, an empty field list, or a non-identifier name.
    Arity { type_name: String, detail: String },
    /// Record-to-record assignment between different field-name tuples.
    SchemaMismatch { expected: Vec<String>, got: Vec<String> },
    /// An operation failed inside one field; the cause is chained.
    Field {
        type_name: String,
        field: String,
        source: Box<RecordError>,
    },
    /// Leading-axis index out of bounds.
    OutOfBounds { index: usize, len: usize },
    /// Invalid span along the leading axis.
    BadSpan { start: usize, end: usize, len: usize },
    /// The value has no leading axis to index (rank 0).
    NoLeadingAxis,
    /// Source shape cannot be assigned into the destination region.
    ShapeMismatch { dst: Vec<usize>, src: Vec<usize> },
    /// Mismatched value kinds (array dtype, or array vs nested record).
    KindMismatch {
        expected: &'static str,
        got: &'static str,
    },
    /// Array rank does not match the expected tensor rank.
    RankMismatch { expected: usize, shape: Vec<usize> },
    /// Shape cannot be split into at most two leading axes plus the
    /// requested trailing feature axes.
    LeadingDims { shape: Vec<usize>, n_trailing: usize },
    /// The operation requires a payload but the slot is absent.
    Absent,
}

impl fmt::Display for RecordError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordError::ReservedName { type_name, field } => {
                write!(f, "{}: disallowed field name `{}` (reserved)", type_name, field)
            }
            RecordError::DuplicateField { type_name, field } => {
                write!(f, "{}: duplicate field name `{}`", type_name, field)
            }
            RecordError::Arity { type_name, detail } => {
                write!(f, "{}: {}", type_name, detail)
            }
            RecordError::SchemaMismatch { expected, got } => {
                write!(f, "field-name tuple mismatch: expected {:?}, got {:?}", expected, got)
            }
            RecordError::Field { type_name, field, .. } => {
                write!(f, "occurred in {} at field `{}`", type_name, field)
            }
            RecordError::OutOfBounds { index, len } => {
                write!(f, "index {} out of bounds for leading axis of length {}", index, len)
            }
            RecordError::BadSpan { start, end, len } => {
                write!(f, "span {}..{} invalid for leading axis of length {}", start, end, len)
            }
            RecordError::NoLeadingAxis => write!(f, "value has no leading axis to index"),
            RecordError::ShapeMismatch { dst, src } => {
                write!(f, "cannot assign shape {:?} into region of shape {:?}", src, dst)
            }
            RecordError::KindMismatch { expected, got } => {
                write!(f, "kind mismatch: expected {}, got {}", expected, got)
            }
            RecordError::RankMismatch { expected, shape } => {
                write!(f, "expected a rank-{} array, got shape {:?}", expected, shape)
            }
            RecordError::LeadingDims { shape, n_trailing } => {
                write!(
                    f,
                    "shape {:?} does not fit {} trailing axes with at most 2 leading axes",
                    shape, n_trailing
                )
            }
            RecordError::Absent => write!(f, "field is absent"),
        }
    }
}

impl Error for RecordError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            RecordError::Field { source, .. } => Some(source.as_ref()),
            _ => None,
        }
    }
}

// ============================================================================
// Slicable
// ============================================================================

/// Capability interface for values that live inside a record: anything that
/// can report its leading-axis length, produce a same-typed selection, and
/// accept a same-typed assignment at a location.
///
/// Leaf arrays and tensors implement this, and so does [`Record`] itself;
/// nested records therefore broadcast through their own `slice` with no
/// special casing in the parent.
pub trait Slicable: Sized {
    /// Length of the leading axis.
    fn lead_len(&self) -> usize;

    /// Select `loc` along the leading axis, returning a value of the same type.
    fn slice(&self, loc: &Loc) -> Result<Self, RecordError>;

    /// Write `value` into `loc` along the leading axis, in place.
    fn slice_assign(&mut self, loc: &Loc, value: &Self) -> Result<(), RecordError>;
}

// ============================================================================
// RecordSchema
// ============================================================================

/// Immutable descriptor of a record type: a type name plus an ordered list of
/// unique field names. Built once, shared read-only by every instance.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RecordSchema {
    name: String,
    fields: Vec<String>,
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

impl RecordSchema {
    /// Define a new record type from a name and ordered field names.
    ///
    /// Rejects empty field lists, non-identifier names, duplicates, and the
    /// reserved accessor names in [`RESERVED_NAMES`].
    pub fn new<S: AsRef<str>>(name: &str, fields: &[S]) -> Result<Arc<Self>, RecordError> {
        if !is_identifier(name) {
            return Err(RecordError::Arity {
                type_name: name.to_string(),
                detail: format!("type name `{}` is not an identifier", name),
            });
        }
        if fields.is_empty() {
            return Err(RecordError::Arity {
                type_name: name.to_string(),
                detail: "field list is empty".to_string(),
            });
        }
        let mut seen: Vec<&str> = Vec::with_capacity(fields.len());
        for field in fields {
            let field = field.as_ref();
            if !is_identifier(field) {
                return Err(RecordError::Arity {
                    type_name: name.to_string(),
                    detail: format!("field name `{}` is not an identifier", field),
                });
            }
            if RESERVED_NAMES.contains(&field) {
                return Err(RecordError::ReservedName {
                    type_name: name.to_string(),
                    field: field.to_string(),
                });
            }
            if seen.contains(&field) {
                return Err(RecordError::DuplicateField {
                    type_name: name.to_string(),
                    field: field.to_string(),
                });
            }
            seen.push(field);
        }
        Ok(Arc::new(Self {
            name: name.to_string(),
            fields: fields.iter().map(|s| s.as_ref().to_string()).collect(),
        }))
    }

    /// Type name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Ordered field names.
    pub fn field_names(&self) -> &[String] {
        &self.fields
    }

    /// Number of fields.
    pub fn arity(&self) -> usize {
        self.fields.len()
    }

    /// Position of `field`, if declared.
    pub fn position(&self, field: &str) -> Option<usize> {
        self.fields.iter().position(|f| f == field)
    }

    /// Whether two schemas declare the same field-name tuple.
    ///
    /// Type names are ignored: records of distinct types with identical
    /// field-name tuples assign field-by-field.
    pub fn same_fields(&self, other: &Self) -> bool {
        self.fields == other.fields
    }
}

// ============================================================================
// Conversion from named-tuple-like sources
// ============================================================================

/// A source that describes a named fixed-arity tuple type.
///
/// Implemented by [`RecordSchema`] and [`Record`] themselves (where
/// conversion is the identity) and by any external descriptor of a plain
/// named tuple.
pub trait NamedFields {
    /// Type name of the described tuple type.
    fn type_name(&self) -> &str;

    /// Ordered field names of the described tuple type.
    fn field_names(&self) -> &[String];

    /// The already-built schema, if the source is itself a record type.
    fn record_schema(&self) -> Option<Arc<RecordSchema>> {
        None
    }
}

impl NamedFields for RecordSchema {
    fn type_name(&self) -> &str {
        self.name()
    }

    fn field_names(&self) -> &[String] {
        RecordSchema::field_names(self)
    }

    fn record_schema(&self) -> Option<Arc<RecordSchema>> {
        Some(Arc::new(self.clone()))
    }
}

impl<V> NamedFields for Record<V> {
    fn type_name(&self) -> &str {
        self.schema.name()
    }

    fn field_names(&self) -> &[String] {
        self.schema.field_names()
    }

    fn record_schema(&self) -> Option<Arc<RecordSchema>> {
        Some(self.schema.clone())
    }
}

/// Build a record schema with the same name and fields as `source`.
///
/// Idempotent on record types: a source that already is a record (or a
/// schema) yields its own schema unchanged, with no revalidation.
pub fn schema_like<T: NamedFields>(source: &T) -> Result<Arc<RecordSchema>, RecordError> {
    if let Some(schema) = source.record_schema() {
        return Ok(schema);
    }
    RecordSchema::new(source.type_name(), source.field_names())
}

// ============================================================================
// Field
// ============================================================================

/// One record slot: absent placeholder, leaf value, or nested record.
#[derive(Debug, Clone, PartialEq, Hash)]
pub enum Field<V> {
    /// The position exists structurally but carries no payload.
    Absent,
    /// A leaf array-like value.
    Value(V),
    /// A nested record, broadcast through recursively.
    Record(Record<V>),
}

impl<V> Field<V> {
    /// The leaf value, if this slot holds one.
    pub fn as_value(&self) -> Option<&V> {
        match self {
            Field::Value(v) => Some(v),
            _ => None,
        }
    }

    /// The nested record, if this slot holds one.
    pub fn as_record(&self) -> Option<&Record<V>> {
        match self {
            Field::Record(r) => Some(r),
            _ => None,
        }
    }

    /// Whether the slot is an absent placeholder.
    pub fn is_absent(&self) -> bool {
        matches!(self, Field::Absent)
    }

    fn kind_name(&self) -> &'static str {
        match self {
            Field::Absent => "absent",
            Field::Value(_) => "value",
            Field::Record(_) => "record",
        }
    }
}

impl<V: Slicable> Field<V> {
    /// Stamp one leaf value into `loc` of this slot, recursing into nested
    /// records. Absent slots are skipped: the position exists but there is
    /// no storage to write.
    pub fn broadcast_assign(&mut self, loc: &Loc, value: &V) -> Result<(), RecordError> {
        match self {
            Field::Absent => Ok(()),
            Field::Value(v) => v.slice_assign(loc, value),
            Field::Record(r) => r.broadcast_assign(loc, value),
        }
    }
}

impl<V: Slicable> Slicable for Field<V> {
    fn lead_len(&self) -> usize {
        match self {
            Field::Absent => 0,
            Field::Value(v) => v.lead_len(),
            Field::Record(r) => r.lead_len(),
        }
    }

    fn slice(&self, loc: &Loc) -> Result<Self, RecordError> {
        match self {
            Field::Absent => Ok(Field::Absent),
            Field::Value(v) => Ok(Field::Value(v.slice(loc)?)),
            Field::Record(r) => Ok(Field::Record(r.slice_loc(loc)?)),
        }
    }

    fn slice_assign(&mut self, loc: &Loc, value: &Self) -> Result<(), RecordError> {
        match (self, value) {
            (Field::Absent, Field::Absent) => Ok(()),
            (Field::Value(dst), Field::Value(src)) => dst.slice_assign(loc, src),
            (Field::Record(dst), Field::Record(src)) => dst.slice_assign(loc, src),
            (Field::Absent, _) | (_, Field::Absent) => Err(RecordError::Absent),
            (dst, src) => Err(RecordError::KindMismatch {
                expected: dst.kind_name(),
                got: src.kind_name(),
            }),
        }
    }
}

// ============================================================================
// Record
// ============================================================================

/// A fixed-arity ordered collection of fields sharing a [`RecordSchema`].
///
/// Behaves like a tuple (ordered iteration, positional equality and hashing,
/// unpacking via `IntoIterator`) with named field access, and like a struct
/// of arrays: [`Record::slice`] and [`Record::slice_assign`] apply one
/// location to every field in lockstep.
///
/// Field contents may alias external storage; slicing shares that storage
/// rather than copying it. The record's structure (schema and arity) never
/// changes after construction, while field contents can be mutated in place
/// through the assignment operations.
#[derive(Debug, Clone)]
pub struct Record<V> {
    schema: Arc<RecordSchema>,
    fields: Vec<Field<V>>,
}

impl<V> Record<V> {
    /// Construct from positional fields, one per schema field.
    pub fn new(schema: &Arc<RecordSchema>, fields: Vec<Field<V>>) -> Result<Self, RecordError> {
        if fields.len() != schema.arity() {
            return Err(RecordError::Arity {
                type_name: schema.name().to_string(),
                detail: format!(
                    "expected {} field values, got {}",
                    schema.arity(),
                    fields.len()
                ),
            });
        }
        Ok(Self {
            schema: schema.clone(),
            fields,
        })
    }

    /// Construct by field name. Every schema field must be set exactly once.
    pub fn build(schema: &Arc<RecordSchema>) -> RecordBuilder<V> {
        RecordBuilder::new(schema)
    }

    /// The shared type descriptor.
    pub fn schema(&self) -> &Arc<RecordSchema> {
        &self.schema
    }

    /// Number of fields (tuple arity, not leading-axis length).
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// True only for a record with no fields, which no schema permits.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Whether `name` is one of the declared field names.
    ///
    /// This is name membership, not value membership: the lookup callers
    /// actually need on a record.
    pub fn has_field(&self, name: &str) -> bool {
        self.schema.position(name).is_some()
    }

    /// Field by name, or `None` if not declared. Never fails.
    pub fn get(&self, name: &str) -> Option<&Field<V>> {
        self.schema.position(name).map(|i| &self.fields[i])
    }

    /// Field by position, plain tuple indexing.
    pub fn get_index(&self, index: usize) -> Option<&Field<V>> {
        self.fields.get(index)
    }

    /// Ordered `(field_name, field)` pairs in declaration order.
    pub fn items(&self) -> impl Iterator<Item = (&str, &Field<V>)> + '_ {
        self.schema
            .field_names()
            .iter()
            .map(|s| s.as_str())
            .zip(self.fields.iter())
    }

    /// Iterate fields in declaration order.
    pub fn iter(&self) -> std::slice::Iter<'_, Field<V>> {
        self.fields.iter()
    }

    /// Consume into the positional field vector.
    pub fn into_fields(self) -> Vec<Field<V>> {
        self.fields
    }

    fn annotate(&self, index: usize, source: RecordError) -> RecordError {
        RecordError::Field {
            type_name: self.schema.name().to_string(),
            field: self.schema.field_names()[index].clone(),
            source: Box::new(source),
        }
    }
}

impl<V: Slicable> Record<V> {
    /// Select `loc` across every field, returning a new record of the same
    /// schema. Nested records broadcast through their own `slice`.
    ///
    /// A failure in any field is annotated with that field's name and the
    /// original error chained as the cause.
    pub fn slice(&self, loc: impl Into<Loc>) -> Result<Self, RecordError> {
        self.slice_loc(&loc.into())
    }

    fn slice_loc(&self, loc: &Loc) -> Result<Self, RecordError> {
        let mut fields = Vec::with_capacity(self.fields.len());
        for (i, field) in self.fields.iter().enumerate() {
            fields.push(field.slice(loc).map_err(|e| self.annotate(i, e))?);
        }
        Ok(Self {
            schema: self.schema.clone(),
            fields,
        })
    }

    /// Assign a same-field-tuple record into `loc`, field by field.
    ///
    /// The source may be of a different record type as long as its
    /// field-name tuple matches; anything else is a structural mismatch.
    pub fn slice_assign(&mut self, loc: &Loc, value: &Record<V>) -> Result<(), RecordError> {
        if !self.schema.same_fields(&value.schema) {
            return Err(RecordError::SchemaMismatch {
                expected: self.schema.field_names().to_vec(),
                got: value.schema.field_names().to_vec(),
            });
        }
        let schema = self.schema.clone();
        for i in 0..self.fields.len() {
            self.fields[i]
                .slice_assign(loc, &value.fields[i])
                .map_err(|e| RecordError::Field {
                    type_name: schema.name().to_string(),
                    field: schema.field_names()[i].clone(),
                    source: Box::new(e),
                })?;
        }
        Ok(())
    }

    /// Stamp one leaf value into `loc` of every field, recursing into nested
    /// records. Absent slots are skipped.
    pub fn broadcast_assign(&mut self, loc: &Loc, value: &V) -> Result<(), RecordError> {
        let schema = self.schema.clone();
        for i in 0..self.fields.len() {
            self.fields[i]
                .broadcast_assign(loc, value)
                .map_err(|e| RecordError::Field {
                    type_name: schema.name().to_string(),
                    field: schema.field_names()[i].clone(),
                    source: Box::new(e),
                })?;
        }
        Ok(())
    }
}

impl<V: Slicable> Slicable for Record<V> {
    /// Leading-axis length of the first non-absent field.
    fn lead_len(&self) -> usize {
        self.fields
            .iter()
            .find(|f| !f.is_absent())
            .map(|f| f.lead_len())
            .unwrap_or(0)
    }

    fn slice(&self, loc: &Loc) -> Result<Self, RecordError> {
        self.slice_loc(loc)
    }

    fn slice_assign(&mut self, loc: &Loc, value: &Self) -> Result<(), RecordError> {
        Record::slice_assign(self, loc, value)
    }
}

/// Equality is positional over field values, like a plain tuple; schema
/// names take no part in it.
impl<V: PartialEq> PartialEq for Record<V> {
    fn eq(&self, other: &Self) -> bool {
        self.fields == other.fields
    }
}

impl<V: Eq> Eq for Record<V> {}

/// Hashing matches equality: field values only.
impl<V: Hash> Hash for Record<V> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.fields.hash(state);
    }
}

impl<V: fmt::Display> fmt::Display for Record<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.schema.name())?;
        for (i, (name, field)) in self.items().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            match field {
                Field::Absent => write!(f, "{}=None", name)?,
                Field::Value(v) => write!(f, "{}={}", name, v)?,
                Field::Record(r) => write!(f, "{}={}", name, r)?,
            }
        }
        write!(f, ")")
    }
}

impl<'a, V> IntoIterator for &'a Record<V> {
    type Item = &'a Field<V>;
    type IntoIter = std::slice::Iter<'a, Field<V>>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.iter()
    }
}

impl<V> IntoIterator for Record<V> {
    type Item = Field<V>;
    type IntoIter = std::vec::IntoIter<Field<V>>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.into_iter()
    }
}

// ============================================================================
// RecordBuilder
// ============================================================================

/// Named construction of a [`Record`]: every schema field set exactly once.
pub struct RecordBuilder<V> {
    schema: Arc<RecordSchema>,
    slots: Vec<Option<Field<V>>>,
    error: Option<RecordError>,
}

impl<V> RecordBuilder<V> {
    fn new(schema: &Arc<RecordSchema>) -> Self {
        let mut slots = Vec::with_capacity(schema.arity());
        slots.resize_with(schema.arity(), || None);
        Self {
            schema: schema.clone(),
            slots,
            error: None,
        }
    }

    fn set(mut self, name: &str, field: Field<V>) -> Self {
        if self.error.is_some() {
            return self;
        }
        match self.schema.position(name) {
            None => {
                self.error = Some(RecordError::Arity {
                    type_name: self.schema.name().to_string(),
                    detail: format!("unknown field `{}`", name),
                });
            }
            Some(i) if self.slots[i].is_some() => {
                self.error = Some(RecordError::DuplicateField {
                    type_name: self.schema.name().to_string(),
                    field: name.to_string(),
                });
            }
            Some(i) => self.slots[i] = Some(field),
        }
        self
    }

    /// Set a leaf field.
    pub fn field(self, name: &str, value: V) -> Self {
        self.set(name, Field::Value(value))
    }

    /// Set a nested record field.
    pub fn record(self, name: &str, value: Record<V>) -> Self {
        self.set(name, Field::Record(value))
    }

    /// Mark a field as structurally present but without payload.
    pub fn absent(self, name: &str) -> Self {
        self.set(name, Field::Absent)
    }

    /// Finish construction, failing if any field was missed or misnamed.
    pub fn finish(self) -> Result<Record<V>, RecordError> {
        if let Some(e) = self.error {
            return Err(e);
        }
        let mut fields = Vec::with_capacity(self.slots.len());
        for (i, slot) in self.slots.into_iter().enumerate() {
            match slot {
                Some(field) => fields.push(field),
                None => {
                    return Err(RecordError::Arity {
                        type_name: self.schema.name().to_string(),
                        detail: format!(
                            "missing field `{}`",
                            self.schema.field_names()[i]
                        ),
                    })
                }
            }
        }
        Ok(Record {
            schema: self.schema,
            fields,
        })
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    /// Minimal leaf for exercising the container: a Vec with leading-axis
    /// slicing and in-place assignment (single values broadcast to spans).
    #[derive(Debug, Clone, PartialEq, Eq, Hash)]
    struct Ints(Vec<i64>);

    impl Slicable for Ints {
        fn lead_len(&self) -> usize {
            self.0.len()
        }

        fn slice(&self, loc: &Loc) -> Result<Self, RecordError> {
            match *loc {
                Loc::At(i) => match self.0.get(i) {
                    Some(v) => Ok(Ints(vec![*v])),
                    None => Err(RecordError::OutOfBounds {
                        index: i,
                        len: self.0.len(),
                    }),
                },
                Loc::Span(a, b) => {
                    if a > b || b > self.0.len() {
                        return Err(RecordError::BadSpan {
                            start: a,
                            end: b,
                            len: self.0.len(),
                        });
                    }
                    Ok(Ints(self.0[a..b].to_vec()))
                }
            }
        }

        fn slice_assign(&mut self, loc: &Loc, value: &Self) -> Result<(), RecordError> {
            let (a, b) = match *loc {
                Loc::At(i) => {
                    if i >= self.0.len() {
                        return Err(RecordError::OutOfBounds {
                            index: i,
                            len: self.0.len(),
                        });
                    }
                    (i, i + 1)
                }
                Loc::Span(a, b) => {
                    if a > b || b > self.0.len() {
                        return Err(RecordError::BadSpan {
                            start: a,
                            end: b,
                            len: self.0.len(),
                        });
                    }
                    (a, b)
                }
            };
            if value.0.len() == 1 {
                for v in &mut self.0[a..b] {
                    *v = value.0[0];
                }
                return Ok(());
            }
            if value.0.len() != b - a {
                return Err(RecordError::ShapeMismatch {
                    dst: vec![b - a],
                    src: vec![value.0.len()],
                });
            }
            self.0[a..b].clone_from_slice(&value.0);
            Ok(())
        }
    }

    fn pair_schema() -> Arc<RecordSchema> {
        RecordSchema::new("Pair", &["x", "y"]).unwrap()
    }

    fn pair(x: Vec<i64>, y: Vec<i64>) -> Record<Ints> {
        Record::new(
            &pair_schema(),
            vec![Field::Value(Ints(x)), Field::Value(Ints(y))],
        )
        .unwrap()
    }

    #[test]
    fn schema_rejects_reserved_names() {
        for &reserved in RESERVED_NAMES {
            let err = RecordSchema::new("T", &["a", reserved]).unwrap_err();
            assert!(matches!(err, RecordError::ReservedName { .. }), "{}", reserved);
        }
    }

    #[test]
    fn schema_rejects_duplicates_and_non_identifiers() {
        assert!(matches!(
            RecordSchema::new("T", &["a", "a"]).unwrap_err(),
            RecordError::DuplicateField { .. }
        ));
        assert!(matches!(
            RecordSchema::new("T", &["a", "1bad"]).unwrap_err(),
            RecordError::Arity { .. }
        ));
        assert!(matches!(
            RecordSchema::new("T", &[] as &[&str]).unwrap_err(),
            RecordError::Arity { .. }
        ));
        assert!(matches!(
            RecordSchema::new("not a name", &["a"]).unwrap_err(),
            RecordError::Arity { .. }
        ));
    }

    #[test]
    fn construction_checks_arity() {
        let schema = pair_schema();
        let err = Record::new(&schema, vec![Field::Value(Ints(vec![1]))]).unwrap_err();
        assert!(matches!(err, RecordError::Arity { .. }));
    }

    #[test]
    fn builder_sets_every_field_once() {
        let schema = pair_schema();
        let rec = Record::build(&schema)
            .field("y", Ints(vec![3, 4]))
            .field("x", Ints(vec![1, 2]))
            .finish()
            .unwrap();
        assert_eq!(rec.get("x").unwrap().as_value().unwrap().0, vec![1, 2]);
        assert_eq!(rec.get("y").unwrap().as_value().unwrap().0, vec![3, 4]);

        let missing = Record::<Ints>::build(&schema).field("x", Ints(vec![1])).finish();
        assert!(matches!(missing.unwrap_err(), RecordError::Arity { .. }));

        let dup = Record::build(&schema)
            .field("x", Ints(vec![1]))
            .field("x", Ints(vec![2]))
            .field("y", Ints(vec![3]))
            .finish();
        assert!(matches!(dup.unwrap_err(), RecordError::DuplicateField { .. }));

        let unknown = Record::build(&schema)
            .field("z", Ints(vec![1]))
            .field("x", Ints(vec![1]))
            .field("y", Ints(vec![1]))
            .finish();
        assert!(matches!(unknown.unwrap_err(), RecordError::Arity { .. }));
    }

    #[test]
    fn iteration_reproduces_declaration_order() {
        let rec = pair(vec![1, 2], vec![10, 20]);
        let names: Vec<&str> = rec.items().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["x", "y"]);

        let fields: Vec<&Field<Ints>> = rec.iter().collect();
        assert_eq!(fields[0].as_value().unwrap().0, vec![1, 2]);
        assert_eq!(fields[1].as_value().unwrap().0, vec![10, 20]);

        // Unpack like a tuple.
        let mut it = (&rec).into_iter();
        let x = it.next().unwrap();
        let y = it.next().unwrap();
        assert!(it.next().is_none());
        assert_eq!(x.as_value().unwrap().0, vec![1, 2]);
        assert_eq!(y.as_value().unwrap().0, vec![10, 20]);
    }

    #[test]
    fn slice_applies_to_every_field() {
        let rec = pair(vec![0, 1, 2, 3], vec![10, 11, 12, 13]);
        let mid = rec.slice(1..3).unwrap();
        assert_eq!(mid.get("x").unwrap().as_value().unwrap().0, vec![1, 2]);
        assert_eq!(mid.get("y").unwrap().as_value().unwrap().0, vec![11, 12]);
        assert!(Arc::ptr_eq(mid.schema(), rec.schema()));

        let one = rec.slice(2usize).unwrap();
        assert_eq!(one.get("x").unwrap().as_value().unwrap().0, vec![2]);
        assert_eq!(one.get("y").unwrap().as_value().unwrap().0, vec![12]);
    }

    #[test]
    fn slice_recurses_into_nested_records() {
        let inner_schema = RecordSchema::new("Inner", &["a", "b"]).unwrap();
        let inner = Record::new(
            &inner_schema,
            vec![
                Field::Value(Ints(vec![1, 2, 3])),
                Field::Value(Ints(vec![4, 5, 6])),
            ],
        )
        .unwrap();
        let outer_schema = RecordSchema::new("Outer", &["flat", "nested"]).unwrap();
        let outer = Record::new(
            &outer_schema,
            vec![Field::Value(Ints(vec![7, 8, 9])), Field::Record(inner)],
        )
        .unwrap();

        let tail = outer.slice(1..3).unwrap();
        assert_eq!(tail.get("flat").unwrap().as_value().unwrap().0, vec![8, 9]);
        let nested = tail.get("nested").unwrap().as_record().unwrap();
        assert_eq!(nested.get("a").unwrap().as_value().unwrap().0, vec![2, 3]);
        assert_eq!(nested.get("b").unwrap().as_value().unwrap().0, vec![5, 6]);
    }

    #[test]
    fn slice_preserves_absent_fields() {
        let schema = RecordSchema::new("Sparse", &["x", "gap"]).unwrap();
        let rec = Record::new(
            &schema,
            vec![Field::Value(Ints(vec![1, 2, 3])), Field::Absent],
        )
        .unwrap();
        let sliced = rec.slice(0..2).unwrap();
        assert!(sliced.get("gap").unwrap().is_absent());
        assert_eq!(sliced.get("x").unwrap().as_value().unwrap().0, vec![1, 2]);
    }

    #[test]
    fn slice_failure_names_the_field() {
        let schema = RecordSchema::new("Ragged", &["long", "short"]).unwrap();
        let rec = Record::new(
            &schema,
            vec![
                Field::Value(Ints(vec![1, 2, 3, 4])),
                Field::Value(Ints(vec![1])),
            ],
        )
        .unwrap();
        let err = rec.slice(2usize).unwrap_err();
        match &err {
            RecordError::Field { type_name, field, source } => {
                assert_eq!(type_name, "Ragged");
                assert_eq!(field, "short");
                assert!(matches!(**source, RecordError::OutOfBounds { .. }));
            }
            other => panic!("expected Field error, got {:?}", other),
        }
        // Cause stays reachable through the standard error chain.
        assert!(err.source().is_some());
    }

    #[test]
    fn record_assignment_is_field_by_field() {
        let mut rec = pair(vec![0, 1, 2, 3], vec![10, 11, 12, 13]);
        let value = pair(vec![9], vec![90]);
        rec.slice_assign(&Loc::At(0), &value).unwrap();

        let head = rec.slice(0usize).unwrap();
        assert_eq!(head.get("x").unwrap().as_value().unwrap().0, vec![9]);
        assert_eq!(head.get("y").unwrap().as_value().unwrap().0, vec![90]);
        // The rest is untouched.
        let tail = rec.slice(1..4).unwrap();
        assert_eq!(tail.get("x").unwrap().as_value().unwrap().0, vec![1, 2, 3]);
        assert_eq!(tail.get("y").unwrap().as_value().unwrap().0, vec![11, 12, 13]);
    }

    #[test]
    fn assignment_round_trips() {
        let mut rec = pair(vec![0, 1, 2, 3], vec![10, 11, 12, 13]);
        let value = pair(vec![7, 8], vec![70, 80]);
        rec.slice_assign(&Loc::Span(1, 3), &value).unwrap();
        assert_eq!(rec.slice(1..3).unwrap(), value);
    }

    #[test]
    fn same_fields_different_type_name_assigns() {
        let other_schema = RecordSchema::new("Point", &["x", "y"]).unwrap();
        let value = Record::new(
            &other_schema,
            vec![Field::Value(Ints(vec![5])), Field::Value(Ints(vec![50]))],
        )
        .unwrap();
        let mut rec = pair(vec![0, 1], vec![10, 11]);
        rec.slice_assign(&Loc::At(1), &value).unwrap();
        assert_eq!(rec.get("x").unwrap().as_value().unwrap().0, vec![0, 5]);
        assert_eq!(rec.get("y").unwrap().as_value().unwrap().0, vec![10, 50]);
    }

    #[test]
    fn mismatched_field_tuple_is_structural_error() {
        let other_schema = RecordSchema::new("Point", &["x", "z"]).unwrap();
        let value = Record::new(
            &other_schema,
            vec![Field::Value(Ints(vec![5])), Field::Value(Ints(vec![50]))],
        )
        .unwrap();
        let mut rec = pair(vec![0, 1], vec![10, 11]);
        let err = rec.slice_assign(&Loc::At(1), &value).unwrap_err();
        assert!(matches!(err, RecordError::SchemaMismatch { .. }));
    }

    #[test]
    fn broadcast_assign_stamps_every_field() {
        let mut rec = pair(vec![0, 1, 2], vec![10, 11, 12]);
        rec.broadcast_assign(&Loc::At(1), &Ints(vec![2])).unwrap();
        assert_eq!(rec.get("x").unwrap().as_value().unwrap().0, vec![0, 2, 2]);
        assert_eq!(rec.get("y").unwrap().as_value().unwrap().0, vec![10, 2, 12]);
    }

    #[test]
    fn broadcast_assign_recurses_and_skips_absent() {
        let inner_schema = RecordSchema::new("Inner", &["a"]).unwrap();
        let inner =
            Record::new(&inner_schema, vec![Field::Value(Ints(vec![1, 2]))]).unwrap();
        let schema = RecordSchema::new("Outer", &["flat", "nested", "gap"]).unwrap();
        let mut rec = Record::new(
            &schema,
            vec![
                Field::Value(Ints(vec![5, 6])),
                Field::Record(inner),
                Field::Absent,
            ],
        )
        .unwrap();

        rec.broadcast_assign(&Loc::Span(0, 2), &Ints(vec![0])).unwrap();
        assert_eq!(rec.get("flat").unwrap().as_value().unwrap().0, vec![0, 0]);
        let nested = rec.get("nested").unwrap().as_record().unwrap();
        assert_eq!(nested.get("a").unwrap().as_value().unwrap().0, vec![0, 0]);
        assert!(rec.get("gap").unwrap().is_absent());
    }

    #[test]
    fn assignment_failure_names_the_field() {
        let mut rec = pair(vec![0, 1], vec![10, 11]);
        // y gets a source whose length matches neither 1 nor the span.
        let bad_schema = pair_schema();
        let bad = Record::new(
            &bad_schema,
            vec![
                Field::Value(Ints(vec![7, 8])),
                Field::Value(Ints(vec![1, 2, 3])),
            ],
        )
        .unwrap();
        let err = rec.slice_assign(&Loc::Span(0, 2), &bad).unwrap_err();
        match err {
            RecordError::Field { field, source, .. } => {
                assert_eq!(field, "y");
                assert!(matches!(*source, RecordError::ShapeMismatch { .. }));
            }
            other => panic!("expected Field error, got {:?}", other),
        }
    }

    #[test]
    fn membership_is_field_names_not_values() {
        let rec = pair(vec![1], vec![2]);
        assert!(rec.has_field("x"));
        assert!(rec.has_field("y"));
        assert!(!rec.has_field("z"));
        assert!(!rec.has_field("1"));
    }

    #[test]
    fn get_index_matches_iteration_order() {
        let rec = pair(vec![1, 2], vec![10, 20]);
        for (i, field) in rec.iter().enumerate() {
            assert_eq!(rec.get_index(i).unwrap(), field);
        }
        assert!(rec.get_index(2).is_none());
        assert!(rec.get("missing").is_none());
    }

    #[test]
    fn equality_and_hash_are_positional() {
        use std::collections::hash_map::DefaultHasher;

        let a = pair(vec![1, 2], vec![3, 4]);
        let renamed_schema = RecordSchema::new("Renamed", &["p", "q"]).unwrap();
        let b = Record::new(
            &renamed_schema,
            vec![Field::Value(Ints(vec![1, 2])), Field::Value(Ints(vec![3, 4]))],
        )
        .unwrap();
        assert_eq!(a, b);

        let hash = |r: &Record<Ints>| {
            let mut h = DefaultHasher::new();
            r.hash(&mut h);
            h.finish()
        };
        assert_eq!(hash(&a), hash(&b));
        assert_ne!(a, pair(vec![1, 2], vec![3, 5]));
    }

    #[test]
    fn display_shows_field_names() {
        let s_schema = RecordSchema::new("Tag", &["label", "gap"]).unwrap();
        #[derive(Debug, Clone, PartialEq)]
        struct Name(String);
        impl fmt::Display for Name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
        impl Slicable for Name {
            fn lead_len(&self) -> usize {
                1
            }
            fn slice(&self, _: &Loc) -> Result<Self, RecordError> {
                Ok(self.clone())
            }
            fn slice_assign(&mut self, _: &Loc, v: &Self) -> Result<(), RecordError> {
                self.0 = v.0.clone();
                Ok(())
            }
        }
        let tagged = Record::new(
            &s_schema,
            vec![Field::Value(Name("hi".into())), Field::Absent],
        )
        .unwrap();
        assert_eq!(format!("{}", tagged), "Tag(label=hi, gap=None)");
    }

    #[test]
    fn schema_like_is_idempotent_on_records() {
        let rec = pair(vec![1], vec![2]);
        let schema = schema_like(&rec).unwrap();
        assert!(Arc::ptr_eq(&schema, rec.schema()));

        let again = schema_like(schema.as_ref()).unwrap();
        assert_eq!(again.field_names(), schema.field_names());
    }

    /// A plain named-tuple descriptor converts to an equivalent schema.
    #[test]
    fn schema_like_builds_from_plain_descriptors() {
        struct PlainTuple;
        impl NamedFields for PlainTuple {
            fn type_name(&self) -> &str {
                "Plain"
            }
            fn field_names(&self) -> &[String] {
                static NAMES: std::sync::OnceLock<Vec<String>> = std::sync::OnceLock::new();
                NAMES.get_or_init(|| vec!["a".to_string(), "b".to_string()])
            }
        }
        let schema = schema_like(&PlainTuple).unwrap();
        assert_eq!(schema.name(), "Plain");
        assert_eq!(schema.field_names(), &["a".to_string(), "b".to_string()]);
    }

    /// Two definitions with the same name and fields are distinct but
    /// behaviorally identical types.
    #[test]
    fn repeated_definitions_are_equivalent() {
        let s1 = RecordSchema::new("Pair", &["x", "y"]).unwrap();
        let s2 = RecordSchema::new("Pair", &["x", "y"]).unwrap();
        assert!(!Arc::ptr_eq(&s1, &s2));
        assert_eq!(s1, s2);
        assert!(s1.same_fields(&s2));
    }
}

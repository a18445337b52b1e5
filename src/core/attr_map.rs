//! Attribute-style mapping for configuration and bookkeeping records.
//!
//! [`AttrMap`] is a string-keyed mapping with one backing store, so the
//! key-style view (`map.get("lr")`) and the attribute-style view (typed
//! getters, `map["lr"]` indexing) can never disagree: writing through either
//! is immediately visible through the other.
//!
//! [`AttrMap::copy`] deep-copies every value that is itself an `AttrMap`
//! (recursively, through unbroken chains of maps) and aliases everything
//! else by handle. In particular an [`AttrValue::Array`] value still shares
//! its buffer with the original after `copy()`. Not performance-critical;
//! freely mutable, created and discarded ad hoc.

use std::collections::HashMap;
use std::ops::Index;

use serde::{Deserialize, Serialize};

use crate::core::array::BatchArray;

/// A value stored in an [`AttrMap`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AttrValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<AttrValue>),
    Map(AttrMap),
    Array(BatchArray),
}

impl From<bool> for AttrValue {
    fn from(v: bool) -> Self {
        AttrValue::Bool(v)
    }
}

impl From<i64> for AttrValue {
    fn from(v: i64) -> Self {
        AttrValue::Int(v)
    }
}

impl From<f64> for AttrValue {
    fn from(v: f64) -> Self {
        AttrValue::Float(v)
    }
}

impl From<&str> for AttrValue {
    fn from(v: &str) -> Self {
        AttrValue::Str(v.to_string())
    }
}

impl From<String> for AttrValue {
    fn from(v: String) -> Self {
        AttrValue::Str(v)
    }
}

impl From<Vec<AttrValue>> for AttrValue {
    fn from(v: Vec<AttrValue>) -> Self {
        AttrValue::List(v)
    }
}

impl From<AttrMap> for AttrValue {
    fn from(v: AttrMap) -> Self {
        AttrValue::Map(v)
    }
}

impl From<BatchArray> for AttrValue {
    fn from(v: BatchArray) -> Self {
        AttrValue::Array(v)
    }
}

/// String-keyed mapping with attribute-style access over a single store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AttrMap {
    entries: HashMap<String, AttrValue>,
}

impl AttrMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `key`, replacing any previous value.
    pub fn set(&mut self, key: &str, value: impl Into<AttrValue>) -> &mut Self {
        self.entries.insert(key.to_string(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&AttrValue> {
        self.entries.get(key)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut AttrValue> {
        self.entries.get_mut(key)
    }

    pub fn remove(&mut self, key: &str) -> Option<AttrValue> {
        self.entries.remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(|k| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &AttrValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    // Typed attribute-style getters; `None` when missing or wrong-typed.

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        match self.get(key) {
            Some(AttrValue::Bool(v)) => Some(*v),
            _ => None,
        }
    }

    pub fn get_i64(&self, key: &str) -> Option<i64> {
        match self.get(key) {
            Some(AttrValue::Int(v)) => Some(*v),
            _ => None,
        }
    }

    /// Float attribute; integer values convert.
    pub fn get_f64(&self, key: &str) -> Option<f64> {
        match self.get(key) {
            Some(AttrValue::Float(v)) => Some(*v),
            Some(AttrValue::Int(v)) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        match self.get(key) {
            Some(AttrValue::Str(v)) => Some(v.as_str()),
            _ => None,
        }
    }

    pub fn get_map(&self, key: &str) -> Option<&AttrMap> {
        match self.get(key) {
            Some(AttrValue::Map(v)) => Some(v),
            _ => None,
        }
    }

    pub fn get_map_mut(&mut self, key: &str) -> Option<&mut AttrMap> {
        match self.get_mut(key) {
            Some(AttrValue::Map(v)) => Some(v),
            _ => None,
        }
    }

    pub fn get_array(&self, key: &str) -> Option<&BatchArray> {
        match self.get(key) {
            Some(AttrValue::Array(v)) => Some(v),
            _ => None,
        }
    }

    /// Copy the map: nested `AttrMap` values are copied recursively, every
    /// other value is aliased by handle (arrays keep sharing their buffers).
    pub fn copy(&self) -> Self {
        let entries = self
            .entries
            .iter()
            .map(|(k, v)| {
                let v = match v {
                    AttrValue::Map(m) => AttrValue::Map(m.copy()),
                    other => other.clone(),
                };
                (k.clone(), v)
            })
            .collect();
        Self { entries }
    }
}

/// Key access that panics on a missing key; use [`AttrMap::get`] for the
/// checked form.
impl Index<&str> for AttrMap {
    type Output = AttrValue;

    fn index(&self, key: &str) -> &AttrValue {
        self.entries
            .get(key)
            .unwrap_or_else(|| panic!("no such attribute: `{}`", key))
    }
}

impl FromIterator<(String, AttrValue)> for AttrMap {
    fn from_iter<I: IntoIterator<Item = (String, AttrValue)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_and_attribute_views_agree() {
        let mut m = AttrMap::new();
        m.set("lr", 1e-3).set("steps", 5i64).set("name", "a2c");

        assert_eq!(m.get_f64("lr"), Some(1e-3));
        assert_eq!(m["lr"], AttrValue::Float(1e-3));
        assert_eq!(m.get_i64("steps"), Some(5));
        assert_eq!(m.get_str("name"), Some("a2c"));

        // A write through the mapping view is visible to the typed view.
        m.set("lr", 5e-4);
        assert_eq!(m.get_f64("lr"), Some(5e-4));
        assert_eq!(m["lr"], AttrValue::Float(5e-4));

        assert!(m.get("missing").is_none());
        assert_eq!(m.get_f64("steps"), Some(5.0));
    }

    #[test]
    fn copy_deep_copies_nested_maps() {
        let mut inner = AttrMap::new();
        inner.set("count", 1i64);
        let mut outer = AttrMap::new();
        outer.set("inner", inner);

        let mut copied = outer.copy();
        assert!(matches!(copied.get("inner"), Some(AttrValue::Map(_))));

        // Mutating the copy's nested map leaves the original untouched.
        copied.get_map_mut("inner").unwrap().set("count", 2i64);
        assert_eq!(outer.get_map("inner").unwrap().get_i64("count"), Some(1));
        assert_eq!(copied.get_map("inner").unwrap().get_i64("count"), Some(2));
    }

    #[test]
    fn copy_aliases_array_buffers() {
        let mut m = AttrMap::new();
        m.set(
            "data",
            BatchArray::from_vec_f32(&[3], vec![1.0, 2.0, 3.0]).unwrap(),
        );
        let copied = m.copy();
        let a = m.get_array("data").unwrap().as_f32().unwrap().as_ptr();
        let b = copied.get_array("data").unwrap().as_f32().unwrap().as_ptr();
        assert_eq!(a, b);
    }

    #[test]
    fn iteration_and_removal() {
        let mut m = AttrMap::new();
        m.set("a", 1i64).set("b", 2i64);
        let mut keys: Vec<&str> = m.keys().collect();
        keys.sort_unstable();
        assert_eq!(keys, vec!["a", "b"]);
        assert_eq!(m.len(), 2);

        assert!(m.remove("a").is_some());
        assert!(!m.contains_key("a"));
        assert_eq!(m.len(), 1);
    }

    #[test]
    fn serializes_round_trip() {
        let mut m = AttrMap::new();
        m.set("lr", 1e-3).set("clip", true);
        let json = serde_json::to_string(&m).unwrap();
        let back: AttrMap = serde_json::from_str(&json).unwrap();
        assert_eq!(back, m);
    }
}

//! Typed input parameters declared on a node.
//!
//! A node either declares an object-shaped parameter map (named input slots,
//! used for dynamic `sourceN` bindings) or a single string-shaped parameter.
//! Parameter slots are structurally tied to connectors: allocating a slot and
//! wiring a connector into it must always happen together, and so must their
//! removal. That pairing is maintained by the workflows that dispatch the
//! paired actions, not by these types.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

/// Prefix of dynamically allocated source input slots (`source1`, `source2`, …).
pub const SOURCE_SLOT_PREFIX: &str = "source";

/// A declared input parameter on a node.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "object")]
pub enum Parameter {
    /// Named map of sub-parameters; the shape used for dynamic input slots.
    #[serde(rename = "objectParameter")]
    Object(ObjectParameter),
    /// A single string-valued input.
    #[serde(rename = "stringParameter")]
    String(StringParameter),
}

impl Parameter {
    /// Convenience constructor for an object parameter with the given slots.
    pub fn object(properties: FxHashMap<String, Parameter>) -> Self {
        Parameter::Object(ObjectParameter { properties })
    }

    /// Convenience constructor for a labelled string parameter.
    pub fn string(label: impl Into<String>) -> Self {
        Parameter::String(StringParameter {
            label: label.into(),
        })
    }

    /// Borrow the object form, if this is an object parameter.
    #[must_use]
    pub fn as_object(&self) -> Option<&ObjectParameter> {
        match self {
            Parameter::Object(object) => Some(object),
            Parameter::String(_) => None,
        }
    }

    /// Mutably borrow the object form, if this is an object parameter.
    pub fn as_object_mut(&mut self) -> Option<&mut ObjectParameter> {
        match self {
            Parameter::Object(object) => Some(object),
            Parameter::String(_) => None,
        }
    }
}

/// Object-shaped parameter: a map of named input slots.
#[derive(Clone, Debug, PartialEq, Default, Serialize, Deserialize)]
pub struct ObjectParameter {
    pub properties: FxHashMap<String, Parameter>,
}

impl ObjectParameter {
    /// Number of `source*`-prefixed slots currently declared.
    ///
    /// Used to compute the next free slot name when a source attachment
    /// allocates a new binding on a downstream node.
    #[must_use]
    pub fn source_slot_count(&self) -> usize {
        self.properties
            .keys()
            .filter(|key| key.starts_with(SOURCE_SLOT_PREFIX))
            .count()
    }

    /// Name of the next free source slot (`source{count + 1}`).
    #[must_use]
    pub fn next_source_slot(&self) -> String {
        format!("{}{}", SOURCE_SLOT_PREFIX, self.source_slot_count() + 1)
    }
}

/// String-shaped parameter with a display label.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StringParameter {
    pub label: String,
}

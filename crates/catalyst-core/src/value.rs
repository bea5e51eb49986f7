//! The closed set of scalar values that comparisons, config documents and events understand.
//!
//! The blackboard itself stores arbitrary types; these are the ones the tree can reason about
//! without knowing the host's types.

use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::Blackboard;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum ValueKind {
    Bool,
    Int,
    Float,
    Text,
}

/// A scalar blackboard value. Ints are stored as `i64`, floats as `f64`, text as `String`.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(untagged))]
pub enum BbValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl BbValue {
    pub fn kind(&self) -> ValueKind {
        match self {
            BbValue::Bool(_) => ValueKind::Bool,
            BbValue::Int(_) => ValueKind::Int,
            BbValue::Float(_) => ValueKind::Float,
            BbValue::Text(_) => ValueKind::Text,
        }
    }

    /// Read `key` as a value of `kind`; `None` when absent or stored under another type.
    pub fn read(blackboard: &Blackboard, key: &str, kind: ValueKind) -> Option<BbValue> {
        match kind {
            ValueKind::Bool => blackboard.try_get::<bool>(key).copied().map(BbValue::Bool),
            ValueKind::Int => blackboard.try_get::<i64>(key).copied().map(BbValue::Int),
            ValueKind::Float => blackboard.try_get::<f64>(key).copied().map(BbValue::Float),
            ValueKind::Text => blackboard
                .try_get::<String>(key)
                .cloned()
                .map(BbValue::Text),
        }
    }

    /// Same as [`BbValue::read`] but against a type-erased value, e.g. from a change listener.
    pub fn from_any(value: &dyn std::any::Any, kind: ValueKind) -> Option<BbValue> {
        match kind {
            ValueKind::Bool => value.downcast_ref::<bool>().copied().map(BbValue::Bool),
            ValueKind::Int => value.downcast_ref::<i64>().copied().map(BbValue::Int),
            ValueKind::Float => value.downcast_ref::<f64>().copied().map(BbValue::Float),
            ValueKind::Text => value.downcast_ref::<String>().cloned().map(BbValue::Text),
        }
    }

    pub fn write(&self, blackboard: &mut Blackboard, key: &str) {
        match self {
            BbValue::Bool(v) => blackboard.set(key, *v),
            BbValue::Int(v) => blackboard.set(key, *v),
            BbValue::Float(v) => blackboard.set(key, *v),
            BbValue::Text(v) => blackboard.set(key, v.clone()),
        }
    }

    /// Declare `key` with the Rust type backing `kind`.
    pub fn declare(blackboard: &mut Blackboard, key: &str, kind: ValueKind) {
        match kind {
            ValueKind::Bool => blackboard.declare::<bool>(key),
            ValueKind::Int => blackboard.declare::<i64>(key),
            ValueKind::Float => blackboard.declare::<f64>(key),
            ValueKind::Text => blackboard.declare::<String>(key),
        }
    }
}

impl fmt::Display for BbValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BbValue::Bool(v) => write!(f, "{v}"),
            BbValue::Int(v) => write!(f, "{v}"),
            BbValue::Float(v) => write!(f, "{v}"),
            BbValue::Text(v) => write!(f, "{v:?}"),
        }
    }
}

impl From<bool> for BbValue {
    fn from(value: bool) -> Self {
        BbValue::Bool(value)
    }
}

impl From<i64> for BbValue {
    fn from(value: i64) -> Self {
        BbValue::Int(value)
    }
}

impl From<f64> for BbValue {
    fn from(value: f64) -> Self {
        BbValue::Float(value)
    }
}

impl From<&str> for BbValue {
    fn from(value: &str) -> Self {
        BbValue::Text(value.to_owned())
    }
}

impl From<String> for BbValue {
    fn from(value: String) -> Self {
        BbValue::Text(value)
    }
}

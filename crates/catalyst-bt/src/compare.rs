//! Blackboard comparisons used by `BlackboardConditional` and `BlackboardCondition`.

use std::any::Any;
use std::cmp::Ordering;

use catalyst_core::{BbValue, Blackboard};
use serde::{Deserialize, Serialize};

/// Relative tolerance for float equality.
pub const FLOAT_TOLERANCE: f64 = 1e-6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompareOp {
    Equals,
    NotEquals,
    LessThan,
    GreaterThan,
    LessThanOrEqual,
    GreaterThanOrEqual,
}

/// `key <op> value`, or a presence check when `value` is `None`.
///
/// A missing key or a value stored under another type makes the comparison false; an `Int`
/// comparison never matches a stored `f64` and vice versa. For the
/// presence check, `Equals` asks "is it set" and `NotEquals` asks "is it unset"; ordering
/// operators are always false.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comparison {
    pub key: String,
    pub op: CompareOp,
    #[serde(default)]
    pub value: Option<BbValue>,
}

impl Comparison {
    pub fn new(key: impl Into<String>, op: CompareOp, value: impl Into<BbValue>) -> Self {
        Self {
            key: key.into(),
            op,
            value: Some(value.into()),
        }
    }

    pub fn equals(key: impl Into<String>, value: impl Into<BbValue>) -> Self {
        Self::new(key, CompareOp::Equals, value)
    }

    pub fn exists(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            op: CompareOp::Equals,
            value: None,
        }
    }

    pub fn missing(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            op: CompareOp::NotEquals,
            value: None,
        }
    }

    pub fn evaluate(&self, blackboard: &Blackboard) -> bool {
        self.matches(blackboard.erased(&self.key).map(|v| v.as_any()))
    }

    /// Evaluate against a type-erased value (`None` = key absent).
    pub fn matches(&self, stored: Option<&dyn Any>) -> bool {
        let Some(expected) = &self.value else {
            return match self.op {
                CompareOp::Equals => stored.is_some(),
                CompareOp::NotEquals => stored.is_none(),
                _ => false,
            };
        };

        let Some(stored) = stored else {
            return false;
        };

        match expected {
            BbValue::Bool(b) => stored
                .downcast_ref::<bool>()
                .is_some_and(|a| equality(a == b, self.op)),
            BbValue::Text(b) => stored
                .downcast_ref::<String>()
                .is_some_and(|a| equality(a == b, self.op)),
            BbValue::Int(b) => stored
                .downcast_ref::<i64>()
                .is_some_and(|a| ordered(Some(a.cmp(b)), self.op)),
            BbValue::Float(b) => stored
                .downcast_ref::<f64>()
                .is_some_and(|a| ordered(float_cmp(*a, *b), self.op)),
        }
    }
}

pub fn approx_eq(a: f64, b: f64) -> bool {
    (a - b).abs() <= FLOAT_TOLERANCE * 1f64.max(a.abs().max(b.abs()))
}

fn float_cmp(a: f64, b: f64) -> Option<Ordering> {
    if approx_eq(a, b) {
        Some(Ordering::Equal)
    } else {
        a.partial_cmp(&b)
    }
}

fn equality(equal: bool, op: CompareOp) -> bool {
    match op {
        CompareOp::Equals => equal,
        CompareOp::NotEquals => !equal,
        _ => false,
    }
}

fn ordered(ordering: Option<Ordering>, op: CompareOp) -> bool {
    let Some(ordering) = ordering else {
        return false;
    };
    match op {
        CompareOp::Equals => ordering == Ordering::Equal,
        CompareOp::NotEquals => ordering != Ordering::Equal,
        CompareOp::LessThan => ordering == Ordering::Less,
        CompareOp::GreaterThan => ordering == Ordering::Greater,
        CompareOp::LessThanOrEqual => ordering != Ordering::Greater,
        CompareOp::GreaterThanOrEqual => ordering != Ordering::Less,
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn float_equality_is_approximate() {
        let mut bb = Blackboard::new();
        bb.set("speed", 0.1f64 + 0.2f64);
        assert!(Comparison::equals("speed", 0.3f64).evaluate(&bb));
        assert!(!Comparison::new("speed", CompareOp::LessThan, 0.3f64).evaluate(&bb));
        assert!(Comparison::new("speed", CompareOp::LessThanOrEqual, 0.3f64).evaluate(&bb));
    }

    #[test]
    fn missing_or_mistyped_keys_are_false() {
        let mut bb = Blackboard::new();
        bb.set("hp", 10i32);
        assert!(!Comparison::equals("hp", 10i64).evaluate(&bb));
        assert!(!Comparison::new("hp", CompareOp::NotEquals, 3i64).evaluate(&bb));
        assert!(!Comparison::equals("mana", 10i64).evaluate(&bb));
    }

    #[test]
    fn presence_checks() {
        let mut bb = Blackboard::new();
        assert!(Comparison::missing("target").evaluate(&bb));
        assert!(!Comparison::exists("target").evaluate(&bb));
        bb.set("target", 7u64);
        assert!(Comparison::exists("target").evaluate(&bb));
        assert!(!Comparison::missing("target").evaluate(&bb));
        assert!(!Comparison {
            key: "target".into(),
            op: CompareOp::LessThan,
            value: None,
        }
        .evaluate(&bb));
    }

    #[test]
    fn numeric_kinds_must_match_the_stored_type() {
        let mut bb = Blackboard::new();
        bb.set("hp", 10i64);
        bb.set("range", 2.0f64);
        assert!(!Comparison::equals("hp", 10.0f64).evaluate(&bb));
        assert!(!Comparison::new("hp", CompareOp::LessThan, 11.5f64).evaluate(&bb));
        assert!(!Comparison::new("hp", CompareOp::NotEquals, 3.0f64).evaluate(&bb));
        assert!(!Comparison::equals("range", 2i64).evaluate(&bb));
        assert!(Comparison::equals("hp", 10i64).evaluate(&bb));
        assert!(Comparison::new("range", CompareOp::GreaterThan, 1.5f64).evaluate(&bb));
    }

    #[test]
    fn ordering_operators_do_not_apply_to_text_or_bool() {
        let mut bb = Blackboard::new();
        bb.set("mode", String::from("b"));
        bb.set("alert", true);
        assert!(!Comparison::new("mode", CompareOp::GreaterThan, "a").evaluate(&bb));
        assert!(Comparison::new("mode", CompareOp::NotEquals, "a").evaluate(&bb));
        assert!(!Comparison::new("alert", CompareOp::LessThanOrEqual, true).evaluate(&bb));
    }

    proptest! {
        #[test]
        fn int_comparisons_match_native_ordering(a in any::<i64>(), b in any::<i64>()) {
            let mut bb = Blackboard::new();
            bb.set("x", a);
            prop_assert_eq!(Comparison::new("x", CompareOp::LessThan, b).evaluate(&bb), a < b);
            prop_assert_eq!(Comparison::new("x", CompareOp::GreaterThanOrEqual, b).evaluate(&bb), a >= b);
            prop_assert_eq!(Comparison::new("x", CompareOp::NotEquals, b).evaluate(&bb), a != b);
        }
    }
}

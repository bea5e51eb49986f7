use thiserror::Error;

/// Lookup failures on a [`crate::Blackboard`].
///
/// A missing key and a key holding a different type are reported separately so callers can
/// tell "not written yet" apart from a schema bug.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BlackboardError {
    #[error("blackboard key `{key}` is not set")]
    KeyMissing { key: String },

    #[error("blackboard key `{key}` holds `{found}`, requested `{expected}`")]
    TypeMismatch {
        key: String,
        expected: &'static str,
        found: &'static str,
    },
}

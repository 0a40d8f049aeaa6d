//! Common errors across the satpair-rs crate

/// Errors raised when input arrays do not have the dimensions the
/// pairing code requires
#[derive(Debug, thiserror::Error)]
pub enum DimensionError {
    #[error("{name} must have shape {expected}, got {found}")]
    BadShape {
        name: &'static str,
        expected: String,
        found: String,
    },
    #[error("{name} must have the same length as {other} ({expected}), got {found}")]
    LengthMismatch {
        name: &'static str,
        other: &'static str,
        expected: usize,
        found: usize,
    },
}

impl DimensionError {
    pub(crate) fn bad_shape<E: ToString, F: ToString>(
        name: &'static str,
        expected: E,
        found: F,
    ) -> Self {
        Self::BadShape {
            name,
            expected: expected.to_string(),
            found: found.to_string(),
        }
    }
}

//! Vector validation, applied on both the write and the read path.

use crate::error::{RetrievalError, RetrievalResult};

/// Checks vectors against the store's fixed dimension.
///
/// Vectors are never padded or truncated: a wrong length is rejected before
/// any storage or comparison happens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VectorValidator {
    dimension: usize,
}

impl VectorValidator {
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }

    /// Accept `vector` only if it has exactly the configured length and every
    /// component is finite.
    pub fn validate(&self, vector: &[f32]) -> RetrievalResult<()> {
        if vector.len() != self.dimension {
            return Err(RetrievalError::Dimension {
                expected: self.dimension,
                actual: vector.len(),
            });
        }

        if let Some(position) = vector.iter().position(|v| !v.is_finite()) {
            return Err(RetrievalError::NonFinite { position });
        }

        Ok(())
    }
}

//! Error type shared by the statistics registry, the normalizers and the cells.

use thiserror::Error;

/// Errors surfaced by a cell step or a statistics update.
///
/// Every variant is fatal for the current training step; nothing inside the
/// crate retries.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CellError {
    #[error("shape mismatch in '{operation}': expected {expected:?}, got {got:?}")]
    ShapeMismatch {
        operation: &'static str,
        expected: Vec<usize>,
        got: Vec<usize>,
    },

    #[error("statistics '{what}' read before the first update")]
    UninitializedStatistics { what: &'static str },

    #[error("tensor data conversion failed: {0}")]
    TensorData(String),

    #[error("invalid cell configuration: {0}")]
    InvalidConfig(String),
}

impl CellError {
    pub(crate) fn shape_mismatch(operation: &'static str, expected: &[usize], got: &[usize]) -> Self {
        Self::ShapeMismatch {
            operation,
            expected: expected.to_vec(),
            got: got.to_vec(),
        }
    }
}

/// Checks that a `[batch, width]` tensor has the expected feature width.
pub(crate) fn check_width(
    operation: &'static str,
    dims: [usize; 2],
    expected: usize,
) -> Result<(), CellError> {
    if dims[1] == expected {
        Ok(())
    } else {
        Err(CellError::shape_mismatch(
            operation,
            &[dims[0], expected],
            &dims,
        ))
    }
}

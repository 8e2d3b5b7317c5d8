//! Error types for einconv.

use thiserror::Error;

use crate::conv::PaddingMode;

/// Errors that can occur in tensor and convolution operations.
#[derive(Debug, Error)]
pub enum TensorError {
    /// Shape mismatch between two sizes that must agree.
    #[error("shape mismatch: expected {expected}, got {actual}")]
    ShapeMismatch { expected: usize, actual: usize },

    /// Index out of bounds.
    #[error("index out of bounds: index {index} is out of range for dimension {dim_size}")]
    IndexOutOfBounds { index: usize, dim_size: usize },

    /// Wrong number of indices provided.
    #[error("wrong number of indices: expected {expected}, got {actual}")]
    WrongNumberOfIndices { expected: usize, actual: usize },

    /// Operation requires specific tensor rank.
    #[error("expected tensor of rank {expected}, got rank {actual}")]
    RankMismatch { expected: usize, actual: usize },

    /// Slice range out of bounds.
    #[error("slice range {start}..{end} out of bounds for dimension {dim} with size {size}")]
    SliceOutOfBounds {
        start: usize,
        end: usize,
        dim: usize,
        size: usize,
    },

    /// Convolution geometry that yields no output (zero stride, kernel
    /// larger than the padded input).
    #[error(
        "invalid geometry on {axis} axis: input {input}, padding {padding}, kernel {kernel}, stride {stride}"
    )]
    InvalidGeometry {
        axis: &'static str,
        input: usize,
        padding: usize,
        kernel: usize,
        stride: usize,
    },

    /// Configuration the einsum convolution does not implement.
    #[error("unsupported convolution configuration: {0}")]
    Unsupported(#[from] UnsupportedConfig),

    /// Generic invalid operation.
    #[error("invalid operation: {0}")]
    InvalidOperation(String),
}

/// Convolution configurations that are unimplemented rather than untested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum UnsupportedConfig {
    #[error("dilation must be (1, 1), got ({0}, {1})")]
    Dilation(usize, usize),

    #[error("groups must be 1, got {0}")]
    Groups(usize),

    #[error("bias is not supported")]
    Bias,

    #[error("padding mode {0:?} is not supported, only zero padding")]
    PaddingMode(PaddingMode),
}

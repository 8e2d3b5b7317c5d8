//! 2D convolution as structured contractions.
//!
//! ```text
//! conv2d            validate → pad → 1 contraction            → (y, Conv2dContext)
//! Conv2dContext     backward(dy) consumes the saved state
//!   input grad      pad dy by DY_MARGIN → stride_h·stride_w residue sub-contractions
//!   weight grad     1 contraction over the saved padded input and dy
//! direct            sliding-window reference (bias, dilation, groups)
//! ```
//!
//! Only zero padding, unit dilation, a single group and no bias are
//! supported by the contraction path; anything else is rejected with
//! [`TensorError::Unsupported`](crate::TensorError::Unsupported) before any
//! work is done.

mod backward;
mod context;
pub mod direct;
mod forward;
mod geometry;

pub use backward::{DY_MARGIN, conv2d_input_grad, conv2d_weight_grad, residue_class, residue_shift};
pub use context::{Conv2dContext, Conv2dGradients, GradRequest};
pub use forward::conv2d;
pub use geometry::{ConvGeometry, output_size};

use crate::contract::AccumulationMask;
use crate::error::UnsupportedConfig;

/// How the border of the input is extended before convolving.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum PaddingMode {
    #[default]
    Zeros,
    Reflect,
    Replicate,
    Circular,
}

/// Configuration of one convolution call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Conv2dParams {
    pub stride: (usize, usize),
    pub padding: (usize, usize),
    pub dilation: (usize, usize),
    pub groups: usize,
    /// Forwarded untouched to the contraction engine.
    pub accumulation_mask: Option<AccumulationMask>,
}

impl Default for Conv2dParams {
    fn default() -> Self {
        Self {
            stride: (1, 1),
            padding: (0, 0),
            dilation: (1, 1),
            groups: 1,
            accumulation_mask: None,
        }
    }
}

impl Conv2dParams {
    pub fn new(stride: (usize, usize), padding: (usize, usize)) -> Self {
        Self {
            stride,
            padding,
            ..Self::default()
        }
    }

    pub fn with_accumulation_mask(mut self, mask: Option<AccumulationMask>) -> Self {
        self.accumulation_mask = mask;
        self
    }

    /// Reject configurations the contraction path does not implement.
    ///
    /// Checked in the order dilation, groups, bias.
    pub fn validate(&self, has_bias: bool) -> Result<(), UnsupportedConfig> {
        if self.dilation != (1, 1) {
            return Err(UnsupportedConfig::Dilation(self.dilation.0, self.dilation.1));
        }
        if self.groups != 1 {
            return Err(UnsupportedConfig::Groups(self.groups));
        }
        if has_bias {
            return Err(UnsupportedConfig::Bias);
        }
        Ok(())
    }
}

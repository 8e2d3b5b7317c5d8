//! Tensor operations used by the convolution operator.
//!
//! ```text
//! pad_spatial          → zero halo around the two trailing axes
//! slice / assign_slice → strided sub-tensor copies (residue classes)
//! apply_binary         → element-wise combination (gradient accumulation)
//! ```

mod elementwise;
mod pad;
mod slice;

pub use elementwise::apply_binary;
pub use pad::pad_spatial;
pub use slice::{Slice, assign_slice, fill_slice, slice};

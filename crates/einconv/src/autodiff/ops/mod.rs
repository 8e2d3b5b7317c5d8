//! Tracked operations.

mod conv2d;
mod inner;

pub use conv2d::{tracked_conv2d, tracked_conv2d_with};
pub use inner::tracked_inner;

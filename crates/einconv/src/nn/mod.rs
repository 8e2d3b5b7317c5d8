//! Layer system: modules, the two convolution layers, and model rewriting.
//!
//! ```text
//! Module<T>          forward, parameters, children, downcasting
//! ├── Conv2d         standard layer, direct sliding-window convolution
//! ├── EinsumConv2d   same surface + accumulation mask, contraction path
//! ├── Sequential     named children, applied in order
//! └── Relu
//! replace_conv2d     Conv2d / EinsumConv2d children → EinsumConv2d
//! ```

mod activation;
mod conv2d;
mod einsum_conv2d;
mod module;
mod rewrite;
mod sequential;

pub use activation::Relu;
pub use conv2d::{Conv2d, Conv2dOptions};
pub use einsum_conv2d::EinsumConv2d;
pub use module::{Module, named_parameters};
pub use rewrite::replace_conv2d;
pub use sequential::Sequential;

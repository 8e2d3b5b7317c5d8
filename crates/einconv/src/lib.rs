//! einconv - 2D convolution as structured tensor contractions
//!
//! The convolution and both of its gradients are evaluated as generalized
//! tensor contractions over a column-major dense tensor, with an optional
//! accumulation mask forwarded to the contraction engine for reduced-precision
//! experiments.
//!
//! # Architecture
//!
//! ```text
//! Level 1: Layers (nn module)
//!     → Conv2d, EinsumConv2d, Sequential, replace_conv2d
//!
//! Level 2: Operator (conv module)
//!     → conv2d → Conv2dContext::backward
//!     → input gradient = stride_h × stride_w residue sub-contractions
//!
//! Level 3: Contraction (contract module)
//!     → ContractionPattern (index roles + affine spatial subscripts)
//!     → contract_into
//!
//! Level 4: Engines (backend module)
//!     → GenericBackend (naive loops, per-step masking)
//!     → GemmBackend (gather + faer matmul)
//! ```
//!
//! # Example
//!
//! ```
//! use einconv::{DenseTensor, Tensor};
//! use einconv::backend::Backend;
//! use einconv::conv::{Conv2dParams, GradRequest, conv2d};
//!
//! let x: DenseTensor<f64> = Tensor::ones(&[2, 3, 8, 8]);
//! let w: DenseTensor<f64> = Tensor::ones(&[4, 3, 3, 3]);
//! let params = Conv2dParams::new((2, 2), (1, 1));
//!
//! let (y, ctx) = conv2d(&Backend::Gemm, &x, &w, None, &params).unwrap();
//! assert_eq!(y.shape(), &[2, 4, 4, 4]);
//!
//! let dy = Tensor::ones(y.shape());
//! let grads = ctx.backward(&Backend::Gemm, &dy, GradRequest::ALL).unwrap();
//! assert_eq!(grads.input.unwrap().shape(), x.shape());
//! assert_eq!(grads.weight.unwrap().shape(), w.shape());
//! ```

#[cfg(feature = "autodiff")]
pub mod autodiff;
pub mod backend;
pub mod contract;
pub mod conv;
pub mod error;
pub mod nn;
pub mod operations;
mod random;
pub mod scalar;
pub mod storage;
pub mod strides;
pub mod tensor;

pub use contract::AccumulationMask;
pub use error::{TensorError, UnsupportedConfig};
pub use scalar::Scalar;
pub use storage::{Dense, TensorStorage};
pub use tensor::{DenseTensor, Tensor};

//! Tape-based reverse-mode differentiation through the convolution.
//!
//! ```text
//! TrackedTensor<f64>  ──registers in──►  ComputationGraph (thread_local)
//!        │                                      │
//!        ▼                                      ▼
//!   DenseTensor<f64>                    Vec<Node<f64>>
//!                                              │
//!                          Conv2dBackward / InnerBackward (GradFn)
//!                                              │
//!                                 Conv2dContext (owned, single use)
//! ```
//!
//! # Example
//!
//! ```
//! use einconv::Tensor;
//! use einconv::autodiff::{TrackedTensor, backward, clear_graph, tracked_conv2d, tracked_inner};
//! use einconv::conv::Conv2dParams;
//!
//! clear_graph();
//! let x = TrackedTensor::new(Tensor::ones(&[1, 1, 4, 4]));
//! let w = TrackedTensor::leaf(Tensor::ones(&[2, 1, 3, 3]));
//! let y = tracked_conv2d(&x, &w, &Conv2dParams::new((1, 1), (1, 1))).unwrap();
//!
//! let ones = TrackedTensor::new(Tensor::ones(y.shape()));
//! let loss = tracked_inner(&y, &ones).unwrap();
//! let grads = backward(&loss).unwrap();
//!
//! assert_eq!(grads.get(w.node_id().unwrap()).unwrap().shape(), &[2, 1, 3, 3]);
//! assert!(x.node_id().is_none());
//! ```
//!
//! Each recorded convolution owns its forward context; a second backward
//! through the same node fails with `InvalidOperation`.

mod backward;
mod gradients;
mod graph;
mod ops;
mod tensor;

pub use backward::backward;
pub use gradients::Gradients;
pub use graph::{ComputationGraph, GradFn, NodeId, NodeRef, clear_graph_f64, with_graph_f64};
pub use ops::{tracked_conv2d, tracked_conv2d_with, tracked_inner};
pub use tensor::{TrackedTensor, clear_graph};

//! Tensor with gradient tracking.

use super::graph::{NodeId, NodeRef, clear_graph_f64, with_graph_f64};
use crate::scalar::Scalar;
use crate::tensor::DenseTensor;

/// A tensor that may be recorded in the computation graph.
///
/// ```
/// use einconv::Tensor;
/// use einconv::autodiff::TrackedTensor;
///
/// let weight = TrackedTensor::leaf(Tensor::<f64>::ones(&[4, 3, 3, 3]));
/// assert!(weight.requires_grad());
///
/// let input = TrackedTensor::new(Tensor::<f64>::ones(&[1, 3, 8, 8]));
/// assert!(!input.requires_grad());
/// ```
#[derive(Debug, Clone)]
pub struct TrackedTensor<T: Scalar> {
    tensor: DenseTensor<T>,
    /// `None` when not tracked.
    node: Option<NodeRef<T>>,
    requires_grad: bool,
}

impl<T: Scalar> TrackedTensor<T> {
    /// Untracked tensor; no gradient will be computed for it.
    pub fn new(tensor: DenseTensor<T>) -> Self {
        Self {
            tensor,
            node: None,
            requires_grad: false,
        }
    }

    /// Wrap an operation result with the node that produced it.
    pub fn from_tensor_with_grad(tensor: DenseTensor<T>, node: NodeRef<T>) -> Self {
        Self {
            tensor,
            node: Some(node),
            requires_grad: true,
        }
    }

    pub fn tensor(&self) -> &DenseTensor<T> {
        &self.tensor
    }

    pub fn into_tensor(self) -> DenseTensor<T> {
        self.tensor
    }

    pub fn node_id(&self) -> Option<NodeId> {
        self.node.as_ref().map(|n| n.id())
    }

    pub fn requires_grad(&self) -> bool {
        self.requires_grad
    }

    pub fn shape(&self) -> &[usize] {
        self.tensor.shape()
    }

    pub fn data(&self) -> &[T] {
        self.tensor.data()
    }

    /// Same values, detached from the graph.
    pub fn detach(&self) -> Self {
        Self::new(self.tensor.clone())
    }
}

impl TrackedTensor<f64> {
    /// Leaf that requires a gradient, registered in the thread-local graph.
    pub fn leaf(tensor: DenseTensor<f64>) -> Self {
        let node = with_graph_f64(|g| g.create_leaf(true));
        Self::from_tensor_with_grad(tensor, node)
    }

    pub fn with_requires_grad(tensor: DenseTensor<f64>, requires_grad: bool) -> Self {
        if requires_grad {
            Self::leaf(tensor)
        } else {
            Self::new(tensor)
        }
    }
}

/// Clear the computation graph (between independent forward passes).
pub fn clear_graph() {
    clear_graph_f64();
}

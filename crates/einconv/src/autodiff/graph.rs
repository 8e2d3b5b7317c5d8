//! Computation graph for reverse-mode automatic differentiation.

use crate::error::TensorError;
use crate::scalar::Scalar;
use crate::tensor::DenseTensor;
use std::cell::RefCell;
use std::fmt::Debug;
use std::marker::PhantomData;

/// Unique identifier for a node in the computation graph.
///
/// Ids grow with creation order, so every node's inputs have smaller ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    /// Get the internal index.
    pub fn index(&self) -> usize {
        self.0
    }
}

/// User-facing handle to a node in the computation graph.
#[derive(Debug, Clone)]
pub struct NodeRef<T: Scalar> {
    id: NodeId,
    _phantom: PhantomData<T>,
}

impl<T: Scalar> NodeRef<T> {
    pub fn id(&self) -> NodeId {
        self.id
    }
}

/// Backward function of one recorded operation.
pub trait GradFn<T: Scalar>: Debug {
    /// Given the gradient of the output, return `(input, gradient)` pairs for
    /// the inputs that require a gradient.
    fn backward(
        &self,
        grad_output: &DenseTensor<T>,
    ) -> Result<Vec<(NodeId, DenseTensor<T>)>, TensorError>;

    /// Input node ids that gradients flow to.
    fn inputs(&self) -> Vec<NodeId>;
}

/// A node in the computation graph.
#[derive(Debug)]
pub struct Node<T: Scalar> {
    id: NodeId,
    /// `None` for leaves.
    grad_fn: Option<Box<dyn GradFn<T>>>,
    requires_grad: bool,
}

impl<T: Scalar> Node<T> {
    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn grad_fn(&self) -> Option<&dyn GradFn<T>> {
        self.grad_fn.as_deref()
    }

    pub fn requires_grad(&self) -> bool {
        self.requires_grad
    }
}

/// Thread-local DAG of recorded operations.
pub struct ComputationGraph<T: Scalar> {
    nodes: Vec<Node<T>>,
}

impl<T: Scalar> ComputationGraph<T> {
    pub fn new() -> Self {
        Self { nodes: Vec::new() }
    }

    fn push(&mut self, grad_fn: Option<Box<dyn GradFn<T>>>, requires_grad: bool) -> NodeRef<T> {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            id,
            grad_fn,
            requires_grad,
        });
        NodeRef {
            id,
            _phantom: PhantomData,
        }
    }

    /// Create a leaf node.
    pub fn create_leaf(&mut self, requires_grad: bool) -> NodeRef<T> {
        self.push(None, requires_grad)
    }

    /// Create a computed node with its backward function.
    pub fn create_node(&mut self, grad_fn: Box<dyn GradFn<T>>, requires_grad: bool) -> NodeRef<T> {
        self.push(Some(grad_fn), requires_grad)
    }

    pub fn get_node(&self, id: NodeId) -> Option<&Node<T>> {
        self.nodes.get(id.index())
    }

    /// Drop every node; previously issued ids become dangling.
    pub fn clear(&mut self) {
        self.nodes.clear();
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

impl<T: Scalar> Default for ComputationGraph<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Scalar> Debug for ComputationGraph<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComputationGraph")
            .field("num_nodes", &self.nodes.len())
            .finish()
    }
}

thread_local! {
    static GRAPH_F64: RefCell<ComputationGraph<f64>> = RefCell::new(ComputationGraph::new());
}

/// Run `f` with the thread-local f64 graph.
pub fn with_graph_f64<R>(f: impl FnOnce(&mut ComputationGraph<f64>) -> R) -> R {
    GRAPH_F64.with(|g| f(&mut g.borrow_mut()))
}

/// Clear the thread-local f64 graph.
pub fn clear_graph_f64() {
    with_graph_f64(|g| g.clear());
}

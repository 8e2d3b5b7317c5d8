//! Backward pass execution.

use super::gradients::Gradients;
use super::graph::{ComputationGraph, NodeId, with_graph_f64};
use super::tensor::TrackedTensor;
use crate::error::TensorError;
use crate::scalar::Scalar;
use crate::tensor::DenseTensor;
use std::collections::{HashSet, VecDeque};
use tracing::debug;

/// Run the backward pass from a scalar loss.
///
/// The returned container holds the gradient of every reachable leaf that
/// requires one.
///
/// # Errors
///
/// - `InvalidOperation` if the loss is not a single element, is not in the
///   graph, or a recorded operation cannot run its backward (e.g. a
///   convolution whose context was already consumed)
/// - whatever a backward function reports
pub fn backward(loss: &TrackedTensor<f64>) -> Result<Gradients<f64>, TensorError> {
    let loss_len = loss.tensor().len();
    if loss_len != 1 {
        return Err(TensorError::InvalidOperation(format!(
            "backward() requires scalar loss, got {loss_len} elements"
        )));
    }
    let loss_node_id = loss.node_id().ok_or_else(|| {
        TensorError::InvalidOperation(
            "backward() called on tensor not in computation graph".to_string(),
        )
    })?;

    let mut gradients = Gradients::new();
    gradients.accumulate(loss_node_id, DenseTensor::from_vec(vec![1.0], &[1])?)?;
    let mut leaves = Gradients::new();

    with_graph_f64(|graph| {
        let order = reverse_topological_order(graph, loss_node_id);
        debug!(nodes = order.len(), "backward");
        for node_id in order {
            let Some(grad_output) = gradients.remove(node_id) else {
                continue;
            };
            let Some(node) = graph.get_node(node_id) else {
                continue;
            };
            match node.grad_fn() {
                Some(grad_fn) => {
                    for (input_id, input_grad) in grad_fn.backward(&grad_output)? {
                        gradients.accumulate(input_id, input_grad)?;
                    }
                }
                None => leaves.accumulate(node_id, grad_output)?,
            }
        }
        Ok(leaves)
    })
}

/// Nodes reachable from `start`, each before all of its inputs.
///
/// Inputs are always created before the nodes that consume them, so sorting
/// by descending id is a valid order.
fn reverse_topological_order<T: Scalar>(graph: &ComputationGraph<T>, start: NodeId) -> Vec<NodeId> {
    let mut visited = HashSet::new();
    let mut queue = VecDeque::from([start]);
    while let Some(node_id) = queue.pop_front() {
        if !visited.insert(node_id) {
            continue;
        }
        if let Some(grad_fn) = graph.get_node(node_id).and_then(|n| n.grad_fn()) {
            queue.extend(grad_fn.inputs().into_iter().filter(|id| !visited.contains(id)));
        }
    }
    let mut order: Vec<NodeId> = visited.into_iter().collect();
    order.sort_unstable_by(|a, b| b.cmp(a));
    order
}

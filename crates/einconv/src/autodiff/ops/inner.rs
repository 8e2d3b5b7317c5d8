//! Tracked full contraction `Σ a·b`.

use crate::autodiff::graph::{GradFn, NodeId, with_graph_f64};
use crate::autodiff::tensor::TrackedTensor;
use crate::error::TensorError;
use crate::operations::apply_binary;
use crate::tensor::DenseTensor;

#[derive(Debug)]
pub struct InnerBackward {
    saved_a: DenseTensor<f64>,
    saved_b: DenseTensor<f64>,
    input_a_id: Option<NodeId>,
    input_b_id: Option<NodeId>,
}

fn scaled(tensor: &DenseTensor<f64>, factor: f64) -> Result<DenseTensor<f64>, TensorError> {
    DenseTensor::from_vec(
        tensor.data().iter().map(|&x| x * factor).collect(),
        tensor.shape(),
    )
}

impl GradFn<f64> for InnerBackward {
    fn backward(
        &self,
        grad_output: &DenseTensor<f64>,
    ) -> Result<Vec<(NodeId, DenseTensor<f64>)>, TensorError> {
        let g = grad_output.data().first().copied().ok_or_else(|| {
            TensorError::InvalidOperation("inner product gradient is empty".to_string())
        })?;
        let mut result = Vec::new();
        if let Some(id) = self.input_a_id {
            result.push((id, scaled(&self.saved_b, g)?));
        }
        if let Some(id) = self.input_b_id {
            result.push((id, scaled(&self.saved_a, g)?));
        }
        Ok(result)
    }

    fn inputs(&self) -> Vec<NodeId> {
        self.input_a_id.into_iter().chain(self.input_b_id).collect()
    }
}

/// `Σ a·b` over all elements as a one-element tensor; the usual way to turn a
/// tracked output into a scalar loss.
///
/// # Errors
///
/// `ShapeMismatch` if the shapes differ.
pub fn tracked_inner(
    a: &TrackedTensor<f64>,
    b: &TrackedTensor<f64>,
) -> Result<TrackedTensor<f64>, TensorError> {
    let products = apply_binary(a.tensor(), b.tensor(), |x, y| x * y)?;
    let result = DenseTensor::from_vec(vec![products.data().iter().sum()], &[1])?;
    if !a.requires_grad() && !b.requires_grad() {
        return Ok(TrackedTensor::new(result));
    }

    let grad_fn = InnerBackward {
        saved_a: a.tensor().clone(),
        saved_b: b.tensor().clone(),
        input_a_id: a.node_id().filter(|_| a.requires_grad()),
        input_b_id: b.node_id().filter(|_| b.requires_grad()),
    };
    let node = with_graph_f64(|g| g.create_node(Box::new(grad_fn), true));
    Ok(TrackedTensor::from_tensor_with_grad(result, node))
}

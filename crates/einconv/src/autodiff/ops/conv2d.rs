//! Tracked convolution.

use std::cell::RefCell;

use crate::autodiff::graph::{GradFn, NodeId, with_graph_f64};
use crate::autodiff::tensor::TrackedTensor;
use crate::backend::Backend;
use crate::conv::{Conv2dContext, Conv2dParams, GradRequest, conv2d};
use crate::error::TensorError;
use crate::tensor::DenseTensor;

/// Backward function of a recorded convolution. Owns the forward context and
/// gives it up on the first backward call.
#[derive(Debug)]
pub struct Conv2dBackward {
    context: RefCell<Option<Conv2dContext<f64>>>,
    backend: Backend,
    input_id: Option<NodeId>,
    weight_id: Option<NodeId>,
}

impl GradFn<f64> for Conv2dBackward {
    fn backward(
        &self,
        grad_output: &DenseTensor<f64>,
    ) -> Result<Vec<(NodeId, DenseTensor<f64>)>, TensorError> {
        let context = self.context.borrow_mut().take().ok_or_else(|| {
            TensorError::InvalidOperation(
                "conv2d backward already ran; its forward context is consumed".to_string(),
            )
        })?;
        let request = GradRequest {
            input: self.input_id.is_some(),
            weight: self.weight_id.is_some(),
        };
        let grads = context.backward(&self.backend, grad_output, request)?;

        let mut result = Vec::new();
        if let (Some(id), Some(grad)) = (self.input_id, grads.input) {
            result.push((id, grad));
        }
        if let (Some(id), Some(grad)) = (self.weight_id, grads.weight) {
            result.push((id, grad));
        }
        Ok(result)
    }

    fn inputs(&self) -> Vec<NodeId> {
        self.input_id.into_iter().chain(self.weight_id).collect()
    }
}

/// [`tracked_conv2d_with`] on the default backend.
pub fn tracked_conv2d(
    input: &TrackedTensor<f64>,
    weight: &TrackedTensor<f64>,
    params: &Conv2dParams,
) -> Result<TrackedTensor<f64>, TensorError> {
    tracked_conv2d_with(Backend::default(), input, weight, params)
}

/// Convolution recorded in the thread-local graph.
///
/// Which gradients the backward pass computes follows each operand's
/// `requires_grad`. If neither requires one, nothing is recorded.
pub fn tracked_conv2d_with(
    backend: Backend,
    input: &TrackedTensor<f64>,
    weight: &TrackedTensor<f64>,
    params: &Conv2dParams,
) -> Result<TrackedTensor<f64>, TensorError> {
    let (output, context) = conv2d(&backend, input.tensor(), weight.tensor(), None, params)?;
    if !input.requires_grad() && !weight.requires_grad() {
        return Ok(TrackedTensor::new(output));
    }

    let grad_fn = Conv2dBackward {
        context: RefCell::new(Some(context)),
        backend,
        input_id: input.node_id().filter(|_| input.requires_grad()),
        weight_id: weight.node_id().filter(|_| weight.requires_grad()),
    };
    let node = with_graph_f64(|g| g.create_node(Box::new(grad_fn), true));
    Ok(TrackedTensor::from_tensor_with_grad(output, node))
}

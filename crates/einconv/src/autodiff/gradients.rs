//! Gradient storage container.

use super::graph::NodeId;
use crate::error::TensorError;
use crate::operations::apply_binary;
use crate::scalar::Scalar;
use crate::tensor::DenseTensor;
use std::collections::HashMap;

/// Gradients keyed by node, summed over every path that reaches a node.
#[derive(Debug)]
pub struct Gradients<T: Scalar> {
    grads: HashMap<NodeId, DenseTensor<T>>,
}

impl<T: Scalar> Gradients<T> {
    pub fn new() -> Self {
        Self {
            grads: HashMap::new(),
        }
    }

    /// Add `grad` to the gradient stored for `id`.
    ///
    /// # Errors
    ///
    /// `ShapeMismatch` if a gradient of a different shape is already stored.
    pub fn accumulate(&mut self, id: NodeId, grad: DenseTensor<T>) -> Result<(), TensorError> {
        if let Some(existing) = self.grads.get_mut(&id) {
            *existing = apply_binary(existing, &grad, |a, b| a + b)?;
        } else {
            self.grads.insert(id, grad);
        }
        Ok(())
    }

    pub fn get(&self, id: NodeId) -> Option<&DenseTensor<T>> {
        self.grads.get(&id)
    }

    /// Remove and return a gradient (to hand it to a backward function).
    pub fn remove(&mut self, id: NodeId) -> Option<DenseTensor<T>> {
        self.grads.remove(&id)
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.grads.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.grads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.grads.is_empty()
    }
}

impl<T: Scalar> Default for Gradients<T> {
    fn default() -> Self {
        Self::new()
    }
}

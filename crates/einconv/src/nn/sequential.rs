use std::any::Any;

use crate::error::TensorError;
use crate::nn::Module;
use crate::scalar::Scalar;
use crate::tensor::DenseTensor;

/// Named modules applied in insertion order.
pub struct Sequential<T: Scalar> {
    layers: Vec<(String, Box<dyn Module<T>>)>,
}

impl<T: Scalar> Default for Sequential<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Scalar> Sequential<T> {
    /// Creates an empty container.
    pub fn new() -> Self {
        Self { layers: Vec::new() }
    }

    /// Appends a new layer to the sequence.
    pub fn push<M>(&mut self, name: impl Into<String>, layer: M)
    where
        M: Module<T> + 'static,
    {
        self.layers.push((name.into(), Box::new(layer)));
    }

    /// Builder form of [`push`](Self::push).
    pub fn with<M>(mut self, name: impl Into<String>, layer: M) -> Self
    where
        M: Module<T> + 'static,
    {
        self.push(name, layer);
        self
    }

    /// Appends a pre-boxed module to the sequence.
    pub fn push_boxed(&mut self, name: impl Into<String>, layer: Box<dyn Module<T>>) {
        self.layers.push((name.into(), layer));
    }

    /// Child registered under `name`.
    pub fn get(&self, name: &str) -> Option<&dyn Module<T>> {
        self.layers
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, layer)| layer.as_ref())
    }

    /// Returns the number of layers registered in the container.
    pub fn len(&self) -> usize {
        self.layers.len()
    }

    /// Returns `true` when the container does not hold any layers.
    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }
}

impl<T: Scalar> Module<T> for Sequential<T> {
    fn forward(&self, input: &DenseTensor<T>) -> Result<DenseTensor<T>, TensorError> {
        let mut activ = input.clone();
        for (_, layer) in &self.layers {
            activ = layer.forward(&activ)?;
        }
        Ok(activ)
    }

    fn visit_parameters(&self, visitor: &mut dyn FnMut(&str, &DenseTensor<T>)) {
        for (name, layer) in &self.layers {
            layer.visit_parameters(&mut |param: &str, tensor: &DenseTensor<T>| {
                visitor(&format!("{name}.{param}"), tensor)
            });
        }
    }

    fn named_children_mut(&mut self) -> Vec<(&str, &mut Box<dyn Module<T>>)> {
        self.layers
            .iter_mut()
            .map(|(name, layer)| (name.as_str(), layer))
            .collect()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

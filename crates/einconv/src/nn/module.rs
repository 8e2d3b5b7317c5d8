//! The `Module` trait.

use std::any::Any;

use crate::error::TensorError;
use crate::scalar::Scalar;
use crate::tensor::DenseTensor;

/// A layer or a container of layers.
pub trait Module<T: Scalar> {
    /// Runs a forward pass.
    fn forward(&self, input: &DenseTensor<T>) -> Result<DenseTensor<T>, TensorError>;

    /// Visits every parameter with its name relative to this module.
    fn visit_parameters(&self, visitor: &mut dyn FnMut(&str, &DenseTensor<T>));

    /// Direct children by name, as replaceable slots. Leaves have none.
    fn named_children_mut(&mut self) -> Vec<(&str, &mut Box<dyn Module<T>>)> {
        Vec::new()
    }

    /// Concrete type access for downcasting.
    fn as_any(&self) -> &dyn Any;
}

/// Every parameter of `module` with a dotted path, e.g. `"block.conv.weight"`.
pub fn named_parameters<T: Scalar>(module: &dyn Module<T>) -> Vec<(String, DenseTensor<T>)> {
    let mut params = Vec::new();
    module.visit_parameters(&mut |name: &str, tensor: &DenseTensor<T>| {
        params.push((name.to_string(), tensor.clone()));
    });
    params
}

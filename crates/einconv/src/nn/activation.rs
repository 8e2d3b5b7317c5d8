use std::any::Any;

use crate::error::TensorError;
use crate::nn::Module;
use crate::scalar::Scalar;
use crate::tensor::DenseTensor;

/// `max(x, 0)` element-wise.
#[derive(Debug, Clone, Copy, Default)]
pub struct Relu;

impl<T: Scalar> Module<T> for Relu {
    fn forward(&self, input: &DenseTensor<T>) -> Result<DenseTensor<T>, TensorError> {
        let data = input
            .data()
            .iter()
            .map(|&x| if x > T::zero() { x } else { T::zero() })
            .collect();
        DenseTensor::from_vec(data, input.shape())
    }

    fn visit_parameters(&self, _visitor: &mut dyn FnMut(&str, &DenseTensor<T>)) {}

    fn as_any(&self) -> &dyn Any {
        self
    }
}

//! Element-wise tensor operations.

use crate::error::TensorError;
use crate::scalar::Scalar;
use crate::tensor::DenseTensor;

/// Combine two tensors of identical shape element by element.
///
/// # Example
///
/// ```
/// use einconv::Tensor;
/// use einconv::operations::apply_binary;
///
/// let a = Tensor::from_vec(vec![1.0, 2.0], &[2]).unwrap();
/// let b = Tensor::from_vec(vec![10.0, 20.0], &[2]).unwrap();
/// let c = apply_binary(&a, &b, |x, y| x + y).unwrap();
/// assert_eq!(c.data(), &[11.0, 22.0]);
/// ```
pub fn apply_binary<ElT: Scalar>(
    a: &DenseTensor<ElT>,
    b: &DenseTensor<ElT>,
    op: impl Fn(ElT, ElT) -> ElT,
) -> Result<DenseTensor<ElT>, TensorError> {
    if a.shape() != b.shape() {
        return Err(TensorError::ShapeMismatch {
            expected: a.len(),
            actual: b.len(),
        });
    }
    let data: Vec<ElT> = a
        .data()
        .iter()
        .zip(b.data().iter())
        .map(|(&x, &y)| op(x, y))
        .collect();
    DenseTensor::from_vec(data, a.shape())
}

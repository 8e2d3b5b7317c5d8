//! Spatial zero padding.

use crate::error::TensorError;
use crate::operations::slice::{Slice, assign_slice};
use crate::scalar::Scalar;
use crate::tensor::DenseTensor;

/// Zero-pad the two trailing (spatial) axes of a rank-4 tensor.
///
/// `pad_h` rows are added on top and bottom, `pad_w` columns on left and
/// right. Always returns a new tensor; the source is untouched.
///
/// # Example
///
/// ```
/// use einconv::Tensor;
/// use einconv::operations::pad_spatial;
///
/// let x = Tensor::<f64>::ones(&[1, 2, 3, 3]);
/// let p = pad_spatial(&x, 1, 2).unwrap();
/// assert_eq!(p.shape(), &[1, 2, 5, 7]);
/// assert_eq!(p.get(&[0, 0, 0, 0]), Some(&0.0));
/// assert_eq!(p.get(&[0, 0, 1, 2]), Some(&1.0));
/// ```
pub fn pad_spatial<ElT: Scalar>(
    tensor: &DenseTensor<ElT>,
    pad_h: usize,
    pad_w: usize,
) -> Result<DenseTensor<ElT>, TensorError> {
    tensor.expect_rank(4)?;
    let shape = tensor.shape();
    let (n, c, h, w) = (shape[0], shape[1], shape[2], shape[3]);
    if pad_h == 0 && pad_w == 0 {
        return Ok(tensor.clone());
    }

    let mut padded = DenseTensor::zeros(&[n, c, h + 2 * pad_h, w + 2 * pad_w]);
    let interior = [
        Slice::full(n),
        Slice::full(c),
        Slice::range(pad_h, pad_h + h),
        Slice::range(pad_w, pad_w + w),
    ];
    assign_slice(&mut padded, &interior, tensor)?;
    Ok(padded)
}

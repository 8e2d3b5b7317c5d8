//! Forward convolution.

use tracing::debug;

use crate::backend::ContractionBackend;
use crate::contract::{ContractionPattern, Operand, contract_into};
use crate::conv::{Conv2dContext, Conv2dParams, ConvGeometry};
use crate::error::TensorError;
use crate::operations::pad_spatial;
use crate::scalar::Scalar;
use crate::tensor::DenseTensor;

/// Convolve `input (n,c,h,w)` with `weight (k,c,r,s)`.
///
/// Computes
///
/// ```text
/// y[n,k,p,q] = Σ_{c,r,s} x[n, c, p·sh + r − ph, q·sw + s − pw] · w[k,c,r,s]
/// ```
///
/// with one contraction over the zero-padded input, and returns the output
/// together with the context needed for [`Conv2dContext::backward`].
///
/// # Errors
///
/// - `Unsupported` for dilation ≠ (1,1), groups ≠ 1 or a bias, before any
///   allocation
/// - `RankMismatch`, `ShapeMismatch` or `InvalidGeometry` for inconsistent
///   shapes
///
/// # Example
///
/// ```
/// use einconv::Tensor;
/// use einconv::backend::Backend;
/// use einconv::conv::{Conv2dParams, conv2d};
///
/// let x = Tensor::<f64>::ones(&[1, 1, 4, 4]);
/// let w = Tensor::<f64>::ones(&[1, 1, 3, 3]);
/// let (y, _ctx) = conv2d(&Backend::Generic, &x, &w, None, &Conv2dParams::new((1, 1), (1, 1))).unwrap();
/// assert_eq!(y.shape(), &[1, 1, 4, 4]);
/// assert_eq!(y.get(&[0, 0, 0, 0]), Some(&4.0));
/// assert_eq!(y.get(&[0, 0, 1, 1]), Some(&9.0));
/// ```
pub fn conv2d<T: Scalar, B: ContractionBackend>(
    backend: &B,
    input: &DenseTensor<T>,
    weight: &DenseTensor<T>,
    bias: Option<&DenseTensor<T>>,
    params: &Conv2dParams,
) -> Result<(DenseTensor<T>, Conv2dContext<T>), TensorError> {
    params.validate(bias.is_some())?;
    let geometry = ConvGeometry::new(input.shape(), weight.shape(), params.stride, params.padding)?;
    let (pad_h, pad_w) = params.padding;

    let padded = pad_spatial(input, pad_h, pad_w)?;
    let pattern = ContractionPattern::conv_forward(params.stride, params.padding);
    debug!(
        %pattern,
        backend = backend.name(),
        input = ?geometry.input_shape(),
        weight = ?geometry.weight_shape(),
        output = ?geometry.output_shape(),
        "conv2d forward"
    );

    let mut output = DenseTensor::zeros(&geometry.output_shape());
    contract_into(
        backend,
        &pattern,
        &Operand::with_halo(&padded, pad_h, pad_w),
        weight,
        &mut output,
        params.accumulation_mask,
    )?;

    let context = Conv2dContext::new(padded, weight.clone(), geometry, params.accumulation_mask);
    Ok((output, context))
}

//! Gradients of the convolution.
//!
//! The weight gradient is the forward contraction with the roles of weight and
//! output swapped. The input gradient is harder: the forward pass reads the
//! input at stride `S`, so its adjoint scatters into every `S`-th input row.
//! Splitting the kernel by offset `off ∈ [0, S)` turns that scatter into `S`
//! dense stride-1 convolutions, one per residue class of input rows:
//!
//! ```text
//! residue  = (off − P) mod S
//! shift    = (residue + P − off) / S
//! dx[residue + S·i] = Σ_{k,r'} dy[i − r' + shift] · w[off + S·r']
//! ```
//!
//! The same split applies independently to columns, giving `S_h · S_w`
//! sub-contractions. The map `off → residue` is a bijection on `[0, S)`, so
//! the residue slices tile `dx` exactly once. Offsets the kernel does not
//! reach (`off ≥ kernel`) own a residue class that receives no contribution
//! and is zero-filled.

use tracing::{debug, trace, warn};

use crate::backend::ContractionBackend;
use crate::contract::{AccumulationMask, ContractionPattern, Operand, contract_into};
use crate::conv::{Conv2dParams, ConvGeometry};
use crate::error::TensorError;
use crate::operations::{Slice, assign_slice, fill_slice, pad_spatial, slice};
use crate::scalar::Scalar;
use crate::tensor::DenseTensor;

/// Zero margin added on each spatial side of `dy` before the input-gradient
/// sub-contractions.
///
/// Kernels wider than `2 * DY_MARGIN + 1` trigger a warning; the result stays
/// exact because reads past the margin are zero as well.
pub const DY_MARGIN: usize = 4;

/// Residue class of input rows written by kernel offset `offset`:
/// `(offset − padding) mod stride`.
///
/// ```
/// use einconv::conv::residue_class;
///
/// // stride 2, padding 1: even kernel rows feed odd input rows.
/// assert_eq!(residue_class(0, 2, 1), 1);
/// assert_eq!(residue_class(1, 2, 1), 0);
/// ```
pub fn residue_class(offset: usize, stride: usize, padding: usize) -> usize {
    (offset + stride - padding % stride) % stride
}

/// Offset into `dy` of the stride-1 sub-contraction for kernel offset
/// `offset`: `ceil((padding − offset) / stride)`, never negative.
///
/// ```
/// use einconv::conv::residue_shift;
///
/// assert_eq!(residue_shift(0, 2, 1), 1);
/// assert_eq!(residue_shift(1, 2, 1), 0);
/// assert_eq!(residue_shift(0, 1, 1), 1);
/// ```
pub fn residue_shift(offset: usize, stride: usize, padding: usize) -> usize {
    (residue_class(offset, stride, padding) + padding - offset) / stride
}

fn check_output_grad<T: Scalar>(
    dy: &DenseTensor<T>,
    geometry: &ConvGeometry,
) -> Result<(), TensorError> {
    dy.expect_rank(4)?;
    let expected = geometry.output_shape();
    for (&e, &a) in expected.iter().zip(dy.shape()) {
        if e != a {
            return Err(TensorError::ShapeMismatch {
                expected: e,
                actual: a,
            });
        }
    }
    Ok(())
}

/// Weight gradient from the saved, already padded input.
pub(crate) fn weight_grad_padded<T: Scalar, B: ContractionBackend>(
    backend: &B,
    padded_input: &DenseTensor<T>,
    geometry: &ConvGeometry,
    dy: &DenseTensor<T>,
    mask: Option<AccumulationMask>,
) -> Result<DenseTensor<T>, TensorError> {
    check_output_grad(dy, geometry)?;
    let pattern = ContractionPattern::conv_weight_grad(geometry.stride, geometry.padding);
    debug!(%pattern, backend = backend.name(), "conv2d weight gradient");

    let (pad_h, pad_w) = geometry.padding;
    let mut dw = DenseTensor::zeros(&geometry.weight_shape());
    contract_into(
        backend,
        &pattern,
        &Operand::with_halo(padded_input, pad_h, pad_w),
        dy,
        &mut dw,
        mask,
    )?;
    Ok(dw)
}

/// Input gradient by residue-class decomposition.
pub(crate) fn input_grad<T: Scalar, B: ContractionBackend>(
    backend: &B,
    weight: &DenseTensor<T>,
    geometry: &ConvGeometry,
    dy: &DenseTensor<T>,
    mask: Option<AccumulationMask>,
) -> Result<DenseTensor<T>, TensorError> {
    check_output_grad(dy, geometry)?;
    let (stride_h, stride_w) = geometry.stride;
    let (pad_h, pad_w) = geometry.padding;
    let [n, c, h, w] = geometry.input_shape();
    let [k, _, r, s] = geometry.weight_shape();

    debug!(
        backend = backend.name(),
        stride = ?geometry.stride,
        padding = ?geometry.padding,
        classes = stride_h * stride_w,
        "conv2d input gradient"
    );
    if r > 2 * DY_MARGIN + 1 || s > 2 * DY_MARGIN + 1 {
        warn!(
            kernel_h = r,
            kernel_w = s,
            margin = DY_MARGIN,
            "kernel exceeds the dy padding margin"
        );
    }

    let dy_padded = pad_spatial(dy, DY_MARGIN, DY_MARGIN)?;
    let dy_operand = Operand::with_halo(&dy_padded, DY_MARGIN, DY_MARGIN);
    let mut dx = DenseTensor::zeros(&geometry.input_shape());

    for off_h in 0..stride_h {
        for off_w in 0..stride_w {
            let residue_h = residue_class(off_h, stride_h, pad_h);
            let residue_w = residue_class(off_w, stride_w, pad_w);
            let rows = Slice::strided(residue_h, h, stride_h);
            let cols = Slice::strided(residue_w, w, stride_w);
            let target = [Slice::full(n), Slice::full(c), rows, cols];
            if rows.is_empty() || cols.is_empty() {
                continue;
            }

            if off_h >= r || off_w >= s {
                trace!(off_h, off_w, residue_h, residue_w, "residue class uncovered by kernel");
                fill_slice(&mut dx, &target, T::zero())?;
                continue;
            }

            let shift = (
                residue_shift(off_h, stride_h, pad_h),
                residue_shift(off_w, stride_w, pad_w),
            );
            let sub_weight = slice(
                weight,
                &[
                    Slice::full(k),
                    Slice::full(c),
                    Slice::strided(off_h, r, stride_h),
                    Slice::strided(off_w, s, stride_w),
                ],
            )?;
            let pattern = ContractionPattern::conv_input_grad(shift);
            trace!(off_h, off_w, residue_h, residue_w, %pattern, "residue class");

            let mut sub_dx = DenseTensor::zeros(&[n, c, rows.len(), cols.len()]);
            contract_into(backend, &pattern, &dy_operand, &sub_weight, &mut sub_dx, mask)?;
            assign_slice(&mut dx, &target, &sub_dx)?;
        }
    }
    Ok(dx)
}

/// Gradient of the convolution with respect to its weight.
///
/// `dw[k,c,r,s] = Σ_{n,p,q} x[n, c, p·sh + r − ph, q·sw + s − pw] · dy[n,k,p,q]`
///
/// # Errors
///
/// `Unsupported` for dilation or groups; shape errors if `dy` does not have
/// the forward output shape.
pub fn conv2d_weight_grad<T: Scalar, B: ContractionBackend>(
    backend: &B,
    input: &DenseTensor<T>,
    weight_shape: &[usize],
    dy: &DenseTensor<T>,
    params: &Conv2dParams,
) -> Result<DenseTensor<T>, TensorError> {
    params.validate(false)?;
    let geometry = ConvGeometry::new(input.shape(), weight_shape, params.stride, params.padding)?;
    let padded = pad_spatial(input, params.padding.0, params.padding.1)?;
    weight_grad_padded(backend, &padded, &geometry, dy, params.accumulation_mask)
}

/// Gradient of the convolution with respect to its input.
///
/// # Errors
///
/// `Unsupported` for dilation or groups; shape errors if `dy` does not have
/// the forward output shape.
pub fn conv2d_input_grad<T: Scalar, B: ContractionBackend>(
    backend: &B,
    input_shape: &[usize],
    weight: &DenseTensor<T>,
    dy: &DenseTensor<T>,
    params: &Conv2dParams,
) -> Result<DenseTensor<T>, TensorError> {
    params.validate(false)?;
    let geometry = ConvGeometry::new(input_shape, weight.shape(), params.stride, params.padding)?;
    input_grad(backend, weight, &geometry, dy, params.accumulation_mask)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::GenericBackend;

    #[test]
    fn test_residue_is_bijection() {
        for stride in 1..6 {
            for padding in 0..7 {
                let mut seen: Vec<usize> =
                    (0..stride).map(|off| residue_class(off, stride, padding)).collect();
                seen.sort_unstable();
                assert_eq!(seen, (0..stride).collect::<Vec<_>>());
            }
        }
    }

    #[test]
    fn test_shift_satisfies_residue_identity() {
        // residue + P − off is always a non-negative multiple of the stride.
        for stride in 1..5 {
            for padding in 0..5 {
                for off in 0..stride {
                    let residue = residue_class(off, stride, padding);
                    let shift = residue_shift(off, stride, padding);
                    assert_eq!(residue + padding, off + stride * shift);
                }
            }
        }
    }

    #[test]
    fn test_unit_stride_shift_is_padding() {
        assert_eq!(residue_shift(0, 1, 3), 3);
        assert_eq!(residue_class(0, 1, 3), 0);
    }

    #[test]
    fn test_input_grad_1d_stride_two() {
        // x has 5 columns, kernel [1, 2, 3], stride 2, padding 1 -> 3 outputs.
        // Forward reads columns (-1,0,1), (1,2,3), (3,4,5).
        let w = DenseTensor::from_vec(vec![1.0, 2.0, 3.0], &[1, 1, 1, 3]).unwrap();
        let dy = DenseTensor::from_vec(vec![1.0, 10.0, 100.0], &[1, 1, 1, 3]).unwrap();
        let params = Conv2dParams::new((1, 2), (0, 1));
        let dx = conv2d_input_grad(&GenericBackend, &[1, 1, 1, 5], &w, &dy, &params).unwrap();
        // col0: dy0·w1 = 2; col1: dy0·w2 + dy1·w0 = 13; col2: dy1·w1 = 20;
        // col3: dy1·w2 + dy2·w0 = 130; col4: dy2·w1 = 200.
        assert_eq!(dx.data(), &[2.0, 13.0, 20.0, 130.0, 200.0]);
    }

    #[test]
    fn test_uncovered_residue_is_zero() {
        // 1x1 kernel with stride 2: odd rows and columns get no gradient.
        let w = DenseTensor::<f64>::ones(&[1, 1, 1, 1]);
        let dy = DenseTensor::<f64>::ones(&[1, 1, 3, 3]);
        let params = Conv2dParams::new((2, 2), (0, 0));
        let dx = conv2d_input_grad(&GenericBackend, &[1, 1, 6, 6], &w, &dy, &params).unwrap();
        for i in 0..6 {
            for j in 0..6 {
                let expected = if i % 2 == 0 && j % 2 == 0 { 1.0 } else { 0.0 };
                assert_eq!(dx.get(&[0, 0, i, j]), Some(&expected));
            }
        }
    }

    #[test]
    fn test_dy_shape_checked() {
        let w = DenseTensor::<f64>::ones(&[2, 1, 3, 3]);
        let dy = DenseTensor::<f64>::ones(&[1, 2, 4, 5]);
        let params = Conv2dParams::new((1, 1), (1, 1));
        let err = conv2d_input_grad(&GenericBackend, &[1, 1, 4, 4], &w, &dy, &params).unwrap_err();
        assert!(matches!(err, TensorError::ShapeMismatch { expected: 4, actual: 5 }));
    }

    #[test]
    fn test_weight_grad_matches_hand_computation() {
        let x = DenseTensor::from_vec(vec![1.0, 2.0, 3.0, 4.0], &[1, 1, 1, 4]).unwrap();
        let dy = DenseTensor::from_vec(vec![1.0, -1.0], &[1, 1, 1, 2]).unwrap();
        let params = Conv2dParams::new((1, 2), (0, 0));
        let dw = conv2d_weight_grad(&GenericBackend, &x, &[1, 1, 1, 2], &dy, &params).unwrap();
        // dw[s] = x[s] - x[2 + s]
        assert_eq!(dw.data(), &[-2.0, -2.0]);
    }
}

//! Sliding-window reference convolution.
//!
//! Supports everything the standard layer does (bias, dilation, groups) and
//! ignores the accumulation mask. Used by [`Conv2d`](crate::nn::Conv2d) and
//! as the oracle the contraction path is tested against.

use crate::conv::Conv2dParams;
use crate::error::TensorError;
use crate::scalar::Scalar;
use crate::strides::cartesian_to_linear;
use crate::tensor::DenseTensor;

fn invalid_geometry(
    axis: &'static str,
    input: usize,
    padding: usize,
    kernel: usize,
    stride: usize,
) -> TensorError {
    TensorError::InvalidGeometry {
        axis,
        input,
        padding,
        kernel,
        stride,
    }
}

/// `(input + 2·padding − dilation·(kernel − 1) − 1) / stride + 1`.
fn dilated_output_size(
    axis: &'static str,
    input: usize,
    padding: usize,
    kernel: usize,
    dilation: usize,
    stride: usize,
) -> Result<usize, TensorError> {
    let err = || invalid_geometry(axis, input, padding, kernel, stride);
    if kernel == 0 || dilation == 0 || stride == 0 {
        return Err(err());
    }
    let span = dilation * (kernel - 1) + 1;
    let padded = input + 2 * padding;
    if span > padded {
        return Err(err());
    }
    Ok((padded - span) / stride + 1)
}

/// Direct convolution of `input (n, c, h, w)` with `weight (k, c/groups, r, s)`.
///
/// # Errors
///
/// - `RankMismatch` if input or weight is not rank 4
/// - `InvalidOperation` if `groups` is zero or does not divide both channel counts
/// - `ShapeMismatch` for inconsistent channels or bias length
/// - `InvalidGeometry` if an axis has no output position
pub fn conv2d_direct<T: Scalar>(
    input: &DenseTensor<T>,
    weight: &DenseTensor<T>,
    bias: Option<&DenseTensor<T>>,
    params: &Conv2dParams,
) -> Result<DenseTensor<T>, TensorError> {
    input.expect_rank(4)?;
    weight.expect_rank(4)?;
    let (n, c, h, w) = (input.shape()[0], input.shape()[1], input.shape()[2], input.shape()[3]);
    let (k, cg, r, s) = (weight.shape()[0], weight.shape()[1], weight.shape()[2], weight.shape()[3]);
    let groups = params.groups;
    if groups == 0 || c % groups != 0 || k % groups != 0 {
        return Err(TensorError::InvalidOperation(format!(
            "groups {groups} must divide in_channels {c} and out_channels {k}"
        )));
    }
    if cg != c / groups {
        return Err(TensorError::ShapeMismatch {
            expected: c / groups,
            actual: cg,
        });
    }
    if let Some(b) = bias
        && b.len() != k
    {
        return Err(TensorError::ShapeMismatch {
            expected: k,
            actual: b.len(),
        });
    }

    let (sh, sw) = params.stride;
    let (ph, pw) = params.padding;
    let (dh, dw) = params.dilation;
    let p = dilated_output_size("height", h, ph, r, dh, sh)?;
    let q = dilated_output_size("width", w, pw, s, dw, sw)?;

    let k_per_group = k / groups;
    let mut output = DenseTensor::zeros(&[n, k, p, q]);
    let x_strides = input.strides().to_vec();
    let w_strides = weight.strides().to_vec();
    let x = input.data();
    let wd = weight.data();

    for ni in 0..n {
        for ki in 0..k {
            let group = ki / k_per_group;
            let b = bias.map_or(T::zero(), |b| b.data()[ki]);
            for pi in 0..p {
                for qi in 0..q {
                    let mut acc = b;
                    for ci in 0..cg {
                        let channel = group * cg + ci;
                        for ri in 0..r {
                            let row = (pi * sh + ri * dh) as isize - ph as isize;
                            if row < 0 || row as usize >= h {
                                continue;
                            }
                            for si in 0..s {
                                let col = (qi * sw + si * dw) as isize - pw as isize;
                                if col < 0 || col as usize >= w {
                                    continue;
                                }
                                let xv = x[cartesian_to_linear(
                                    &[ni, channel, row as usize, col as usize],
                                    &x_strides,
                                )];
                                let wv = wd[cartesian_to_linear(&[ki, ci, ri, si], &w_strides)];
                                acc = acc + xv * wv;
                            }
                        }
                    }
                    output.set(&[ni, ki, pi, qi], acc)?;
                }
            }
        }
    }
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bias_is_added() {
        let x = DenseTensor::<f64>::ones(&[1, 1, 3, 3]);
        let w = DenseTensor::<f64>::ones(&[2, 1, 3, 3]);
        let b = DenseTensor::from_vec(vec![0.5, -1.0], &[2]).unwrap();
        let y = conv2d_direct(&x, &w, Some(&b), &Conv2dParams::default()).unwrap();
        assert_eq!(y.data(), &[9.5, 8.0]);
    }

    #[test]
    fn test_dilation() {
        // Kernel taps at columns 0 and 2 of a ramp.
        let x = DenseTensor::from_vec(vec![1.0, 2.0, 3.0, 4.0], &[1, 1, 1, 4]).unwrap();
        let w = DenseTensor::<f64>::ones(&[1, 1, 1, 2]);
        let params = Conv2dParams {
            dilation: (1, 2),
            ..Conv2dParams::default()
        };
        let y = conv2d_direct(&x, &w, None, &params).unwrap();
        assert_eq!(y.data(), &[4.0, 6.0]);
    }

    #[test]
    fn test_groups_keep_channels_apart() {
        // Two channels, two groups: each output sees only its own channel.
        let x = DenseTensor::from_fn(&[1, 2, 2, 2], |i| if i[1] == 0 { 1.0 } else { 10.0 });
        let w = DenseTensor::<f64>::ones(&[2, 1, 2, 2]);
        let params = Conv2dParams {
            groups: 2,
            ..Conv2dParams::default()
        };
        let y = conv2d_direct(&x, &w, None, &params).unwrap();
        assert_eq!(y.data(), &[4.0, 40.0]);
    }

    #[test]
    fn test_groups_must_divide() {
        let x = DenseTensor::<f64>::ones(&[1, 3, 2, 2]);
        let w = DenseTensor::<f64>::ones(&[2, 1, 1, 1]);
        let params = Conv2dParams {
            groups: 2,
            ..Conv2dParams::default()
        };
        assert!(matches!(
            conv2d_direct(&x, &w, None, &params),
            Err(TensorError::InvalidOperation(_))
        ));
    }

    #[test]
    fn test_padding_counts_zeros() {
        let x = DenseTensor::<f64>::ones(&[1, 1, 2, 2]);
        let w = DenseTensor::<f64>::ones(&[1, 1, 3, 3]);
        let y = conv2d_direct(&x, &w, None, &Conv2dParams::new((1, 1), (1, 1))).unwrap();
        assert_eq!(y.data(), &[4.0; 4]);
    }
}

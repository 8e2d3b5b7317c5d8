//! Integration tests for the einsum convolution and its manual gradients.
//!
//! Forward results are compared with the direct convolution, the weight
//! gradient with central differences, and the input gradient with a
//! brute-force scatter.

use approx::assert_relative_eq;
use einconv::backend::{Backend, GemmBackend, GenericBackend};
use einconv::conv::direct::conv2d_direct;
use einconv::conv::{
    Conv2dParams, GradRequest, conv2d, conv2d_input_grad, conv2d_weight_grad, output_size,
};
use einconv::{AccumulationMask, Tensor, TensorError, UnsupportedConfig};
use rand::SeedableRng;
use rand::rngs::StdRng;

/// Reference input gradient: scatter every `dy · w` product into the input
/// position the forward pass read it from.
fn scatter_input_grad(
    input_shape: [usize; 4],
    weight: &Tensor<f64>,
    dy: &Tensor<f64>,
    stride: (usize, usize),
    padding: (usize, usize),
) -> Tensor<f64> {
    let [n, c, h, w] = input_shape;
    let (k, r, s) = (weight.shape()[0], weight.shape()[2], weight.shape()[3]);
    let (p, q) = (dy.shape()[2], dy.shape()[3]);
    let mut dx = Tensor::<f64>::zeros(&input_shape);
    for b in 0..n {
        for o in 0..k {
            for i in 0..p {
                for j in 0..q {
                    let g = dy.get(&[b, o, i, j]).copied().unwrap();
                    for ch in 0..c {
                        for a in 0..r {
                            for e in 0..s {
                                let row = (i * stride.0 + a) as isize - padding.0 as isize;
                                let col = (j * stride.1 + e) as isize - padding.1 as isize;
                                if row < 0 || col < 0 || row as usize >= h || col as usize >= w {
                                    continue;
                                }
                                let idx = [b, ch, row as usize, col as usize];
                                let wv = weight.get(&[o, ch, a, e]).copied().unwrap();
                                let cur = dx.get(&idx).copied().unwrap();
                                dx.set(&idx, cur + g * wv).unwrap();
                            }
                        }
                    }
                }
            }
        }
    }
    dx
}

fn assert_tensors_close(actual: &Tensor<f64>, expected: &Tensor<f64>, epsilon: f64) {
    assert_eq!(actual.shape(), expected.shape());
    for (a, e) in actual.data().iter().zip(expected.data()) {
        assert_relative_eq!(a, e, epsilon = epsilon);
    }
}

#[test]
fn test_forward_matches_direct() {
    let mut rng = StdRng::seed_from_u64(42);
    let x = Tensor::<f64>::randn_with_rng(&[2, 3, 8, 8], &mut rng);
    let w = Tensor::<f64>::randn_with_rng(&[4, 3, 3, 3], &mut rng);
    let params = Conv2dParams::new((1, 1), (1, 1));

    let (y, _) = conv2d(&GenericBackend, &x, &w, None, &params).unwrap();
    let reference = conv2d_direct(&x, &w, None, &params).unwrap();
    assert_eq!(y.shape(), &[2, 4, 8, 8]);
    assert_tensors_close(&y, &reference, 1e-10);
}

#[test]
fn test_forward_strided_matches_direct() {
    let mut rng = StdRng::seed_from_u64(3);
    let x = Tensor::<f64>::randn_with_rng(&[1, 2, 9, 7], &mut rng);
    let w = Tensor::<f64>::randn_with_rng(&[3, 2, 3, 2], &mut rng);
    let params = Conv2dParams::new((2, 3), (1, 2));

    let (y, _) = conv2d(&GemmBackend, &x, &w, None, &params).unwrap();
    let reference = conv2d_direct(&x, &w, None, &params).unwrap();
    assert_eq!(y.shape(), &[1, 3, 5, 4]);
    assert_tensors_close(&y, &reference, 1e-10);
}

#[test]
fn test_weight_grad_matches_finite_differences() {
    let mut rng = StdRng::seed_from_u64(7);
    let x = Tensor::<f64>::randn_with_rng(&[2, 2, 5, 5], &mut rng);
    let w = Tensor::<f64>::randn_with_rng(&[3, 2, 3, 3], &mut rng);
    let params = Conv2dParams::new((2, 2), (1, 1));
    let (y, _) = conv2d(&GenericBackend, &x, &w, None, &params).unwrap();
    let dy = Tensor::<f64>::randn_with_rng(y.shape(), &mut rng);

    // L(w) = <conv(x, w), dy>, so dL/dw is the weight gradient for dy.
    let loss = |weight: &Tensor<f64>| -> f64 {
        let (out, _) = conv2d(&GenericBackend, &x, weight, None, &params).unwrap();
        out.data().iter().zip(dy.data()).map(|(a, b)| a * b).sum()
    };

    let dw = conv2d_weight_grad(&GenericBackend, &x, w.shape(), &dy, &params).unwrap();
    let eps = 1e-5;
    for i in 0..w.len() {
        let mut plus = w.clone();
        let mut minus = w.clone();
        plus.data_mut()[i] += eps;
        minus.data_mut()[i] -= eps;
        let numerical = (loss(&plus) - loss(&minus)) / (2.0 * eps);
        assert_relative_eq!(dw.data()[i], numerical, epsilon = 1e-6);
    }
}

#[test]
fn test_input_grad_stride_two_matches_scatter() {
    let mut rng = StdRng::seed_from_u64(11);
    let w = Tensor::<f64>::randn_with_rng(&[4, 3, 3, 3], &mut rng);
    let params = Conv2dParams::new((2, 2), (1, 1));
    let input_shape = [2, 3, 8, 8];
    let dy = Tensor::<f64>::randn_with_rng(&[2, 4, 4, 4], &mut rng);

    let dx = conv2d_input_grad(&GenericBackend, &input_shape, &w, &dy, &params).unwrap();
    let reference = scatter_input_grad(input_shape, &w, &dy, (2, 2), (1, 1));
    assert_tensors_close(&dx, &reference, 1e-10);
}

#[test]
fn test_input_grad_odd_sizes_match_scatter() {
    // Input sizes that are not multiples of the stride leave residue slices
    // of different lengths.
    let mut rng = StdRng::seed_from_u64(12);
    let w = Tensor::<f64>::randn_with_rng(&[2, 2, 4, 3], &mut rng);
    let params = Conv2dParams::new((3, 2), (2, 1));
    let input_shape = [1, 2, 11, 7];
    let p = output_size(11, 2, 4, 3).unwrap();
    let q = output_size(7, 1, 3, 2).unwrap();
    let dy = Tensor::<f64>::randn_with_rng(&[1, 2, p, q], &mut rng);

    let dx = conv2d_input_grad(&GemmBackend, &input_shape, &w, &dy, &params).unwrap();
    let reference = scatter_input_grad(input_shape, &w, &dy, (3, 2), (2, 1));
    assert_tensors_close(&dx, &reference, 1e-10);
}

#[test]
fn test_input_grad_uncovered_rows_are_zero() {
    // Stride 4 with a 3-wide kernel: offset 3 is never reached, so the rows
    // and columns of residue (3 - 1) mod 4 = 2 receive nothing.
    let mut rng = StdRng::seed_from_u64(5);
    let w = Tensor::<f64>::randn_with_rng(&[2, 1, 3, 3], &mut rng);
    let params = Conv2dParams::new((4, 4), (1, 1));
    let input_shape = [1, 1, 12, 12];
    let dy = Tensor::<f64>::randn_with_rng(&[1, 2, 3, 3], &mut rng);

    let dx = conv2d_input_grad(&GenericBackend, &input_shape, &w, &dy, &params).unwrap();
    for i in 0..12 {
        for j in 0..12 {
            if i % 4 == 2 || j % 4 == 2 {
                assert_eq!(dx.get(&[0, 0, i, j]), Some(&0.0), "({i}, {j})");
            }
        }
    }
    let reference = scatter_input_grad(input_shape, &w, &dy, (4, 4), (1, 1));
    assert_tensors_close(&dx, &reference, 1e-10);
}

#[test]
fn test_large_kernel_is_still_exact() {
    // An 11x11 kernel reaches past the dy margin; reads there are zero.
    let mut rng = StdRng::seed_from_u64(21);
    let w = Tensor::<f64>::randn_with_rng(&[1, 1, 11, 11], &mut rng);
    let params = Conv2dParams::new((1, 1), (5, 5));
    let input_shape = [1, 1, 12, 12];
    let dy = Tensor::<f64>::randn_with_rng(&[1, 1, 12, 12], &mut rng);

    let dx = conv2d_input_grad(&GenericBackend, &input_shape, &w, &dy, &params).unwrap();
    let reference = scatter_input_grad(input_shape, &w, &dy, (1, 1), (5, 5));
    assert_tensors_close(&dx, &reference, 1e-9);
}

#[test]
fn test_context_backward_matches_free_functions() {
    let mut rng = StdRng::seed_from_u64(8);
    let x = Tensor::<f64>::randn_with_rng(&[2, 3, 6, 6], &mut rng);
    let w = Tensor::<f64>::randn_with_rng(&[2, 3, 3, 3], &mut rng);
    let params = Conv2dParams::new((2, 2), (1, 1));

    let (y, ctx) = conv2d(&GenericBackend, &x, &w, None, &params).unwrap();
    let dy = Tensor::<f64>::randn_with_rng(y.shape(), &mut rng);
    let grads = ctx.backward(&GenericBackend, &dy, GradRequest::ALL).unwrap();

    let dx = conv2d_input_grad(&GenericBackend, x.shape(), &w, &dy, &params).unwrap();
    let dw = conv2d_weight_grad(&GenericBackend, &x, w.shape(), &dy, &params).unwrap();
    assert_tensors_close(grads.input.as_ref().unwrap(), &dx, 1e-12);
    assert_tensors_close(grads.weight.as_ref().unwrap(), &dw, 1e-12);
}

#[test]
fn test_backends_agree() {
    let mut rng = StdRng::seed_from_u64(99);
    let x = Tensor::<f64>::randn_with_rng(&[2, 3, 7, 6], &mut rng);
    let w = Tensor::<f64>::randn_with_rng(&[4, 3, 3, 2], &mut rng);
    let params = Conv2dParams::new((2, 1), (1, 0));

    let (y_generic, ctx_generic) = conv2d(&Backend::Generic, &x, &w, None, &params).unwrap();
    let (y_gemm, ctx_gemm) = conv2d(&Backend::Gemm, &x, &w, None, &params).unwrap();
    assert_tensors_close(&y_generic, &y_gemm, 1e-10);

    let dy = Tensor::<f64>::randn_with_rng(y_generic.shape(), &mut rng);
    let g = ctx_generic.backward(&Backend::Generic, &dy, GradRequest::ALL).unwrap();
    let m = ctx_gemm.backward(&Backend::Gemm, &dy, GradRequest::ALL).unwrap();
    assert_tensors_close(g.input.as_ref().unwrap(), m.input.as_ref().unwrap(), 1e-10);
    assert_tensors_close(g.weight.as_ref().unwrap(), m.weight.as_ref().unwrap(), 1e-10);
}

#[test]
fn test_full_mask_is_identity() {
    let mut rng = StdRng::seed_from_u64(1);
    let x = Tensor::<f64>::randn_with_rng(&[1, 2, 5, 5], &mut rng);
    let w = Tensor::<f64>::randn_with_rng(&[2, 2, 3, 3], &mut rng);
    let plain = Conv2dParams::new((1, 1), (1, 1));
    let masked = plain.with_accumulation_mask(Some(AccumulationMask::FULL));

    let (a, _) = conv2d(&GenericBackend, &x, &w, None, &plain).unwrap();
    let (b, _) = conv2d(&GenericBackend, &x, &w, None, &masked).unwrap();
    assert_eq!(a, b);
}

#[test]
fn test_mask_clears_low_bits() {
    let mut rng = StdRng::seed_from_u64(2);
    let x = Tensor::<f64>::randn_with_rng(&[1, 2, 5, 5], &mut rng);
    let w = Tensor::<f64>::randn_with_rng(&[2, 2, 3, 3], &mut rng);
    let mask = AccumulationMask::new(0xFFFF_FFFF_0000_0000);
    let params = Conv2dParams::new((1, 1), (1, 1)).with_accumulation_mask(Some(mask));

    for backend in [Backend::Generic, Backend::Gemm] {
        let (y, ctx) = conv2d(&backend, &x, &w, None, &params).unwrap();
        assert!(y.data().iter().all(|v| v.to_bits() & 0xFFFF_FFFF == 0));

        let dy = Tensor::<f64>::ones(y.shape());
        let grads = ctx.backward(&backend, &dy, GradRequest::ALL).unwrap();
        let dx = grads.input.unwrap();
        let dw = grads.weight.unwrap();
        assert!(dx.data().iter().all(|v| v.to_bits() & 0xFFFF_FFFF == 0));
        assert!(dw.data().iter().all(|v| v.to_bits() & 0xFFFF_FFFF == 0));
    }
}

#[test]
fn test_unsupported_configurations_fail_fast() {
    let x = Tensor::<f64>::ones(&[1, 2, 5, 5]);
    let w = Tensor::<f64>::ones(&[2, 2, 3, 3]);
    let bias = Tensor::<f64>::ones(&[2]);

    let dilated = Conv2dParams {
        dilation: (2, 1),
        ..Conv2dParams::default()
    };
    let grouped = Conv2dParams {
        groups: 2,
        ..Conv2dParams::default()
    };

    let err = conv2d(&GenericBackend, &x, &w, None, &dilated).unwrap_err();
    assert!(matches!(
        err,
        TensorError::Unsupported(UnsupportedConfig::Dilation(2, 1))
    ));
    let err = conv2d(&GenericBackend, &x, &w, None, &grouped).unwrap_err();
    assert!(matches!(
        err,
        TensorError::Unsupported(UnsupportedConfig::Groups(2))
    ));
    let err = conv2d(&GenericBackend, &x, &w, Some(&bias), &Conv2dParams::default()).unwrap_err();
    assert!(matches!(err, TensorError::Unsupported(UnsupportedConfig::Bias)));

    let dy = Tensor::<f64>::ones(&[1, 2, 3, 3]);
    assert!(matches!(
        conv2d_input_grad(&GenericBackend, x.shape(), &w, &dy, &grouped),
        Err(TensorError::Unsupported(_))
    ));
    assert!(matches!(
        conv2d_weight_grad(&GenericBackend, &x, w.shape(), &dy, &dilated),
        Err(TensorError::Unsupported(_))
    ));
}

#[test]
fn test_kernel_larger_than_padded_input() {
    let x = Tensor::<f64>::ones(&[1, 1, 2, 2]);
    let w = Tensor::<f64>::ones(&[1, 1, 5, 5]);
    let err = conv2d(&GenericBackend, &x, &w, None, &Conv2dParams::default()).unwrap_err();
    assert!(matches!(err, TensorError::InvalidGeometry { .. }));
}

#[test]
fn test_f32_forward_matches_direct() {
    let mut rng = StdRng::seed_from_u64(4);
    let x = Tensor::<f32>::randn_with_rng(&[1, 2, 6, 6], &mut rng);
    let w = Tensor::<f32>::randn_with_rng(&[3, 2, 3, 3], &mut rng);
    let params = Conv2dParams::new((2, 2), (1, 1));

    let (y, _) = conv2d(&GemmBackend, &x, &w, None, &params).unwrap();
    let reference = conv2d_direct(&x, &w, None, &params).unwrap();
    for (a, e) in y.data().iter().zip(reference.data()) {
        assert_relative_eq!(a, e, epsilon = 1e-4);
    }
}

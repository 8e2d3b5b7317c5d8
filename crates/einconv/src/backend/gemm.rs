//! GEMM-based contraction using faer.
//!
//! The left operand is gathered into an `(lhs_free x summed)` matrix, the
//! right operand into `(summed x rhs_free)`, and the product is scattered back
//! into the output:
//!
//! ```text
//! A[m, k] = lhs[lhs_free, summed]     (halo reads resolved during gather)
//! B[k, n] = rhs[summed, rhs_free]
//! C[m, n] = A · B                     (faer matmul)
//! out[...] = mask(C[m, n])
//! ```

use faer::linalg::matmul::matmul;
use faer::{Accum, Par};

use crate::backend::{AsFaerMat, ContractionBackend, RoleCursor};
use crate::contract::{
    AccumulationMask, ContractionPattern, ContractionProperties, IndexRole, Operand, RoleValues,
    plain_linear,
};
use crate::error::TensorError;
use crate::scalar::Scalar;
use crate::tensor::DenseTensor;

/// Backend that lowers a contraction to one matrix multiplication.
///
/// Patterns with roles shared by both operands and the output (batched
/// products) are rejected.
#[derive(Debug, Clone, Copy, Default)]
pub struct GemmBackend;

impl ContractionBackend for GemmBackend {
    fn name(&self) -> &'static str {
        "gemm"
    }

    fn execute<T: Scalar>(
        &self,
        pattern: &ContractionPattern,
        props: &ContractionProperties,
        lhs: &Operand<'_, T>,
        rhs: &DenseTensor<T>,
        out: &mut DenseTensor<T>,
        mask: Option<AccumulationMask>,
    ) -> Result<(), TensorError> {
        if !props.shared_free.is_empty() {
            let letters: String = props.shared_free.iter().map(|r| r.letter()).collect();
            return Err(TensorError::InvalidOperation(format!(
                "gemm backend cannot batch over shared indices '{letters}' in {pattern}"
            )));
        }

        let mut rows = RoleCursor::new(&props.lhs_free, props);
        let mut inner = RoleCursor::new(&props.summed, props);
        let mut cols = RoleCursor::new(&props.rhs_free, props);
        let (m, k, n) = (rows.count(), inner.count(), cols.count());
        if m == 0 || n == 0 {
            return Ok(());
        }

        let mut values: RoleValues = [0; IndexRole::COUNT];
        let mut c = DenseTensor::<T>::zeros(&[m, n]);

        if k > 0 {
            let mut a = DenseTensor::<T>::zeros(&[m, k]);
            let mut b = DenseTensor::<T>::zeros(&[k, n]);

            // Gather A: rows fastest, matching column-major storage.
            let a_data = a.data_mut();
            let mut linear = 0;
            loop {
                inner.write(&mut values);
                rows.reset();
                loop {
                    rows.write(&mut values);
                    a_data[linear] = lhs.value_at(&pattern.lhs, &values);
                    linear += 1;
                    if !rows.advance() {
                        break;
                    }
                }
                if !inner.advance() {
                    break;
                }
            }

            // Gather B.
            let rhs_strides = rhs.strides();
            let rhs_data = rhs.data();
            let b_data = b.data_mut();
            let mut linear = 0;
            loop {
                cols.write(&mut values);
                inner.reset();
                loop {
                    inner.write(&mut values);
                    b_data[linear] = rhs_data[plain_linear(&pattern.rhs, &values, rhs_strides)];
                    linear += 1;
                    if !inner.advance() {
                        break;
                    }
                }
                if !cols.advance() {
                    break;
                }
            }
            cols.reset();

            let a_mat = a.as_faer_mat(m, k);
            let b_mat = b.as_faer_mat(k, n);
            let mut c_mat = c.as_faer_mat_mut(m, n);
            matmul(
                c_mat.as_mut(),
                Accum::Replace,
                a_mat,
                b_mat,
                T::one(),
                Par::Seq,
            );
        }

        // Scatter C into the output layout.
        let out_strides = out.strides().to_vec();
        let c_data = c.data();
        let dst = out.data_mut();
        let mut linear = 0;
        loop {
            cols.write(&mut values);
            rows.reset();
            loop {
                rows.write(&mut values);
                let sum = c_data[linear];
                dst[plain_linear(&pattern.output, &values, &out_strides)] = match mask {
                    Some(mask) => mask.apply(sum),
                    None => sum,
                };
                linear += 1;
                if !rows.advance() {
                    break;
                }
            }
            if !cols.advance() {
                break;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::GenericBackend;
    use crate::contract::contract_into;
    use approx::assert_relative_eq;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn test_gemm_matches_generic_input_grad() {
        let mut rng = StdRng::seed_from_u64(7);
        let dy = DenseTensor::<f64>::randn_with_rng(&[2, 3, 5, 5], &mut rng);
        let w = DenseTensor::<f64>::randn_with_rng(&[3, 4, 2, 2], &mut rng);
        let pattern = ContractionPattern::conv_input_grad((1, 1));
        let lhs = Operand::with_halo(&dy, 1, 1);

        let mut expected = DenseTensor::zeros(&[2, 4, 5, 5]);
        let mut actual = DenseTensor::zeros(&[2, 4, 5, 5]);
        contract_into(&GenericBackend, &pattern, &lhs, &w, &mut expected, None).unwrap();
        contract_into(&GemmBackend, &pattern, &lhs, &w, &mut actual, None).unwrap();
        for (a, e) in actual.data().iter().zip(expected.data()) {
            assert_relative_eq!(a, e, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_gemm_rejects_shared_roles() {
        let mut pattern = ContractionPattern::conv_forward((1, 1), (0, 0));
        pattern.rhs = [
            IndexRole::Batch,
            IndexRole::InChannel,
            IndexRole::KernelRow,
            IndexRole::KernelCol,
        ];
        pattern.output = [
            IndexRole::Batch,
            IndexRole::InChannel,
            IndexRole::OutRow,
            IndexRole::OutCol,
        ];
        let x = DenseTensor::<f64>::ones(&[2, 1, 3, 3]);
        let w = DenseTensor::<f64>::ones(&[2, 1, 1, 1]);
        let mut y = DenseTensor::zeros(&[2, 1, 3, 3]);
        let err = contract_into(&GemmBackend, &pattern, &Operand::new(&x), &w, &mut y, None)
            .unwrap_err();
        assert!(matches!(err, TensorError::InvalidOperation(_)));
        // The loop engine handles batched patterns.
        contract_into(&GenericBackend, &pattern, &Operand::new(&x), &w, &mut y, None).unwrap();
        assert!(y.data().iter().all(|&v| v == 1.0));
    }

    #[test]
    fn test_gemm_masks_final_sum() {
        let x = DenseTensor::<f64>::ones(&[1, 1, 1, 3]);
        let w = DenseTensor::<f64>::ones(&[1, 1, 1, 3]);
        let mut y = DenseTensor::zeros(&[1, 1, 1, 1]);
        let pattern = ContractionPattern::conv_forward((1, 1), (0, 0));
        let exponent_only = AccumulationMask::new(0xFFF0_0000_0000_0000);
        contract_into(&GemmBackend, &pattern, &Operand::new(&x), &w, &mut y, Some(exponent_only))
            .unwrap();
        assert_eq!(y.data()[0], 2.0);
    }

    #[test]
    fn test_zero_inner_extent_gives_zeros() {
        let x = DenseTensor::<f64>::zeros(&[1, 0, 2, 2]);
        let w = DenseTensor::<f64>::zeros(&[2, 0, 1, 1]);
        let mut y = DenseTensor::<f64>::ones(&[1, 2, 2, 2]);
        let pattern = ContractionPattern::conv_forward((1, 1), (0, 0));
        contract_into(&GemmBackend, &pattern, &Operand::new(&x), &w, &mut y, None).unwrap();
        assert!(y.data().iter().all(|&v| v == 0.0));
    }
}

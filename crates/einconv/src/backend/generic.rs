//! Generic (naive loop-based) backend implementation.

use crate::backend::{ContractionBackend, RoleCursor};
use crate::contract::{
    AccumulationMask, ContractionPattern, ContractionProperties, IndexRole, Operand, RoleValues,
    plain_linear,
};
use crate::error::TensorError;
use crate::scalar::Scalar;
use crate::tensor::DenseTensor;

/// Generic backend using naive loop-based implementations.
///
/// This backend is always available and serves as the reference engine.
/// It's suitable for small tensors and debugging, and it is the only engine
/// that masks the accumulator after every addition.
#[derive(Debug, Clone, Copy, Default)]
pub struct GenericBackend;

impl ContractionBackend for GenericBackend {
    fn name(&self) -> &'static str {
        "generic"
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
        if out.is_empty() {
            return Ok(());
        }
        let mut outer = RoleCursor::new(&pattern.output, props);
        let mut inner = RoleCursor::new(&props.summed, props);
        let has_terms = inner.count() > 0;

        let rhs_strides = rhs.strides();
        let rhs_data = rhs.data();
        let dst = out.data_mut();
        let mut values: RoleValues = [0; IndexRole::COUNT];

        // Output roles advance in column-major order, matching storage order.
        let mut linear = 0;
        loop {
            outer.write(&mut values);
            let mut acc = T::zero();
            if has_terms {
                inner.reset();
                loop {
                    inner.write(&mut values);
                    let a = lhs.value_at(&pattern.lhs, &values);
                    let b = rhs_data[plain_linear(&pattern.rhs, &values, rhs_strides)];
                    acc = acc + a * b;
                    if let Some(mask) = mask {
                        acc = mask.apply(acc);
                    }
                    if !inner.advance() {
                        break;
                    }
                }
            }
            dst[linear] = acc;
            linear += 1;
            if !outer.advance() {
                break;
            }
        }
        Ok(())
    }
}

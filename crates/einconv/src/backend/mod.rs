//! Contraction engines.
//!
//! A backend executes a [`ContractionPattern`] whose extents were already
//! resolved into [`ContractionProperties`]. Two engines are provided:
//!
//! - [`GenericBackend`]: nested loops over output and summed roles. When an
//!   [`AccumulationMask`] is given it is applied to the running accumulator
//!   after every addition.
//! - [`GemmBackend`]: gathers both operands into matrices and multiplies them
//!   with faer. A mask is applied to each finished sum.
//!
//! [`Backend`] selects one of them at runtime and is what layers store.

mod faer_interop;
mod gemm;
mod generic;

pub use faer_interop::AsFaerMat;
pub use gemm::GemmBackend;
pub use generic::GenericBackend;

use crate::contract::{
    AccumulationMask, ContractionPattern, ContractionProperties, IndexRole, Operand, RoleValues,
};
use crate::error::TensorError;
use crate::scalar::Scalar;
use crate::strides::increment_index;
use crate::tensor::DenseTensor;

/// Engine that evaluates a resolved contraction.
pub trait ContractionBackend {
    /// Short name used in log records.
    fn name(&self) -> &'static str;

    /// Evaluate `pattern`, overwriting every element of `out`.
    fn execute<T: Scalar>(
        &self,
        pattern: &ContractionPattern,
        props: &ContractionProperties,
        lhs: &Operand<'_, T>,
        rhs: &DenseTensor<T>,
        out: &mut DenseTensor<T>,
        mask: Option<AccumulationMask>,
    ) -> Result<(), TensorError>;
}

/// Runtime engine selection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Backend {
    #[default]
    Generic,
    Gemm,
}

impl ContractionBackend for Backend {
    fn name(&self) -> &'static str {
        match self {
            Backend::Generic => GenericBackend.name(),
            Backend::Gemm => GemmBackend.name(),
        }
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
        match self {
            Backend::Generic => GenericBackend.execute(pattern, props, lhs, rhs, out, mask),
            Backend::Gemm => GemmBackend.execute(pattern, props, lhs, rhs, out, mask),
        }
    }
}

/// Column-major walk over every assignment of a list of roles.
pub(crate) struct RoleCursor {
    roles: Vec<IndexRole>,
    shape: Vec<usize>,
    index: Vec<usize>,
}

impl RoleCursor {
    pub(crate) fn new(roles: &[IndexRole], props: &ContractionProperties) -> Self {
        Self {
            roles: roles.to_vec(),
            shape: props.extents_of(roles),
            index: vec![0; roles.len()],
        }
    }

    /// Number of assignments; 1 for an empty role list.
    pub(crate) fn count(&self) -> usize {
        self.shape.iter().product()
    }

    pub(crate) fn reset(&mut self) {
        self.index.fill(0);
    }

    /// Store the current assignment into `values`.
    #[inline]
    pub(crate) fn write(&self, values: &mut RoleValues) {
        for (role, &i) in self.roles.iter().zip(&self.index) {
            values[role.slot()] = i;
        }
    }

    /// Move to the next assignment; `false` after the last one.
    #[inline]
    pub(crate) fn advance(&mut self) -> bool {
        increment_index(&mut self.index, &self.shape)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::contract_into;

    #[test]
    fn test_default_backend_is_generic() {
        assert_eq!(Backend::default(), Backend::Generic);
        assert_eq!(Backend::Gemm.name(), "gemm");
    }

    #[test]
    fn test_role_cursor_visits_all() {
        let pattern = ContractionPattern::conv_forward((1, 1), (0, 0));
        let props =
            ContractionProperties::compute(&pattern, &[1, 2, 3, 3], &[1, 2, 2, 2], &[1, 1, 2, 2])
                .unwrap();
        let mut cursor = RoleCursor::new(&props.summed, &props);
        assert_eq!(cursor.count(), 8);
        let mut values: RoleValues = [0; IndexRole::COUNT];
        let mut seen = Vec::new();
        loop {
            cursor.write(&mut values);
            seen.push((
                values[IndexRole::InChannel.slot()],
                values[IndexRole::KernelRow.slot()],
                values[IndexRole::KernelCol.slot()],
            ));
            if !cursor.advance() {
                break;
            }
        }
        assert_eq!(seen.len(), 8);
        assert_eq!(seen[1], (1, 0, 0));
        assert_eq!(seen[7], (1, 1, 1));
    }

    #[test]
    fn test_enum_dispatch_matches_engines() {
        let x = DenseTensor::from_fn(&[2, 2, 4, 4], |i| (i[0] + 2 * i[1] + 3 * i[2] + i[3]) as f64);
        let w = DenseTensor::from_fn(&[3, 2, 2, 2], |i| (1 + i[0] + i[1] + i[2] * i[3]) as f64);
        let pattern = ContractionPattern::conv_forward((2, 2), (1, 1));
        let lhs = Operand::with_halo(&x, 0, 0);

        let mut a = DenseTensor::zeros(&[2, 3, 3, 3]);
        let mut b = DenseTensor::zeros(&[2, 3, 3, 3]);
        contract_into(&Backend::Generic, &pattern, &lhs, &w, &mut a, None).unwrap();
        contract_into(&Backend::Gemm, &pattern, &lhs, &w, &mut b, None).unwrap();
        assert_eq!(a, b);
    }
}

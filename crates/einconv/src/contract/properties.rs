//! Role extents and role classification for a contraction.
//!
//! Before a backend runs, every role's extent is resolved from the plain
//! subscripts of the operands and from the output shape, and each role is
//! classified:
//!
//! ```text
//! lhs_free    : in output, indexes only lhs   (GEMM rows)
//! rhs_free    : in output, indexes only rhs   (GEMM columns)
//! shared_free : in output, indexes both       (batched; GEMM backend rejects)
//! summed      : absent from output            (GEMM inner dimension)
//! ```

use super::pattern::{ContractionPattern, IndexRole, Subscript};
use crate::error::TensorError;

/// Resolved extents and classification of the roles of a pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractionProperties {
    extents: [usize; IndexRole::COUNT],
    pub lhs_free: Vec<IndexRole>,
    pub rhs_free: Vec<IndexRole>,
    pub shared_free: Vec<IndexRole>,
    pub summed: Vec<IndexRole>,
}

fn register(
    extents: &mut [Option<usize>; IndexRole::COUNT],
    role: IndexRole,
    size: usize,
) -> Result<(), TensorError> {
    match extents[role.slot()] {
        Some(existing) if existing != size => Err(TensorError::ShapeMismatch {
            expected: existing,
            actual: size,
        }),
        _ => {
            extents[role.slot()] = Some(size);
            Ok(())
        }
    }
}

fn check_rank(shape: &[usize]) -> Result<(), TensorError> {
    if shape.len() != 4 {
        return Err(TensorError::RankMismatch {
            expected: 4,
            actual: shape.len(),
        });
    }
    Ok(())
}

impl ContractionProperties {
    /// Resolve extents against concrete shapes.
    ///
    /// # Errors
    ///
    /// - `RankMismatch` if an operand or the output is not rank 4
    /// - `ShapeMismatch` if a role has two different extents
    /// - `InvalidOperation` if a role has no extent or an output role does not
    ///   occur in either operand
    pub fn compute(
        pattern: &ContractionPattern,
        lhs_shape: &[usize],
        rhs_shape: &[usize],
        output_shape: &[usize],
    ) -> Result<Self, TensorError> {
        check_rank(lhs_shape)?;
        check_rank(rhs_shape)?;
        check_rank(output_shape)?;

        let mut extents = [None; IndexRole::COUNT];
        for (subscript, &size) in pattern.lhs.iter().zip(lhs_shape) {
            if let Subscript::Index(role) = subscript {
                register(&mut extents, *role, size)?;
            }
        }
        for (&role, &size) in pattern.rhs.iter().zip(rhs_shape) {
            register(&mut extents, role, size)?;
        }
        for (&role, &size) in pattern.output.iter().zip(output_shape) {
            register(&mut extents, role, size)?;
        }

        let mut resolved = [0usize; IndexRole::COUNT];
        let mut lhs_free = Vec::new();
        let mut rhs_free = Vec::new();
        let mut shared_free = Vec::new();
        let mut summed = Vec::new();

        for role in IndexRole::ALL {
            let in_lhs = pattern.lhs_mentions(role);
            let in_rhs = pattern.rhs_mentions(role);
            let in_output = pattern.output_mentions(role);
            if !in_lhs && !in_rhs && !in_output {
                continue;
            }
            resolved[role.slot()] = extents[role.slot()].ok_or_else(|| {
                TensorError::InvalidOperation(format!(
                    "index '{}' has no extent in pattern {pattern}",
                    role.letter()
                ))
            })?;
            match (in_lhs, in_rhs, in_output) {
                (_, _, false) => summed.push(role),
                (true, true, true) => shared_free.push(role),
                (true, false, true) => lhs_free.push(role),
                (false, true, true) => rhs_free.push(role),
                (false, false, true) => {
                    return Err(TensorError::InvalidOperation(format!(
                        "output index '{}' does not occur in any operand of {pattern}",
                        role.letter()
                    )));
                }
            }
        }

        Ok(Self {
            extents: resolved,
            lhs_free,
            rhs_free,
            shared_free,
            summed,
        })
    }

    /// Extent of `role` (0 for roles the pattern does not use).
    #[inline]
    pub fn extent(&self, role: IndexRole) -> usize {
        self.extents[role.slot()]
    }

    /// Extents of `roles`, in order.
    pub fn extents_of(&self, roles: &[IndexRole]) -> Vec<usize> {
        roles.iter().map(|&r| self.extent(r)).collect()
    }

    /// Number of terms in every output sum.
    pub fn summed_len(&self) -> usize {
        self.summed.iter().map(|&r| self.extent(r)).product()
    }
}

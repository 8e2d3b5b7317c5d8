//! Dense storage for tensor data.

use crate::scalar::Scalar;

/// Dense storage - contiguous array of elements in column-major order.
#[derive(Debug, Clone, PartialEq)]
pub struct Dense<ElT: Scalar> {
    data: Vec<ElT>,
}

impl<ElT: Scalar> Dense<ElT> {
    /// Create dense storage with given length, zero-initialized.
    pub fn zeros(len: usize) -> Self {
        Self {
            data: vec![ElT::zero(); len],
        }
    }

    /// Create dense storage from existing vector (takes ownership).
    pub fn from_vec(data: Vec<ElT>) -> Self {
        Self { data }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    #[inline]
    pub fn as_slice(&self) -> &[ElT] {
        &self.data
    }

    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [ElT] {
        &mut self.data
    }
}

//! N-dimensional tensor type with pluggable storage.
//!
//! ```text
//! Tensor{ElT, StoreT<:TensorStorage}
//! └── DenseTensor = Tensor where StoreT<:Dense
//! ```
//!
//! Convolution tensors use the semantic layouts `(batch, channel, height,
//! width)` for activations and `(out_channel, in_channel, kernel_h, kernel_w)`
//! for weights; memory order is column-major, so the batch index is the
//! fastest-moving one.

use crate::error::TensorError;
use crate::scalar::Scalar;
use crate::storage::{Dense, TensorStorage};
use crate::strides::{cartesian_to_linear, compute_strides};
use std::marker::PhantomData;

/// A n-dimensional tensor with polymorphic storage.
#[derive(Debug, Clone, PartialEq)]
pub struct Tensor<ElT: Scalar, StoreT: TensorStorage<ElT> = Dense<ElT>> {
    storage: StoreT,
    shape: Vec<usize>,
    strides: Vec<usize>,
    _phantom: PhantomData<ElT>,
}

/// Type alias for dense tensors.
pub type DenseTensor<ElT> = Tensor<ElT, Dense<ElT>>;

/// Number of elements addressed by `shape`; a rank-0 shape holds one scalar.
fn element_count(shape: &[usize]) -> usize {
    if shape.is_empty() {
        1
    } else {
        shape.iter().product()
    }
}

impl<ElT: Scalar, StoreT: TensorStorage<ElT>> Tensor<ElT, StoreT> {
    /// Create a new tensor with the given shape, zero-initialized.
    ///
    /// # Examples
    ///
    /// ```
    /// use einconv::Tensor;
    ///
    /// let t: Tensor<f64> = Tensor::zeros(&[2, 3, 4, 4]);
    /// assert_eq!(t.shape(), &[2, 3, 4, 4]);
    /// assert_eq!(t.len(), 96);
    /// ```
    pub fn zeros(shape: &[usize]) -> Self {
        Self {
            storage: StoreT::zeros(element_count(shape)),
            shape: shape.to_vec(),
            strides: compute_strides(shape),
            _phantom: PhantomData,
        }
    }

    /// Create tensor from data and shape.
    ///
    /// Data is expected to be in column-major order.
    ///
    /// # Errors
    ///
    /// Returns `TensorError::ShapeMismatch` if data length doesn't match shape.
    ///
    /// # Examples
    ///
    /// ```
    /// use einconv::{DenseTensor, Tensor};
    ///
    /// let t: DenseTensor<f64> = Tensor::from_vec(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0], &[2, 3]).unwrap();
    /// assert_eq!(t.get(&[1, 0]), Some(&2.0)); // Column-major: [1,0] is second element
    /// assert_eq!(t.get(&[0, 1]), Some(&3.0));
    /// ```
    pub fn from_vec(data: Vec<ElT>, shape: &[usize]) -> Result<Self, TensorError> {
        let expected_len = element_count(shape);
        if data.len() != expected_len {
            return Err(TensorError::ShapeMismatch {
                expected: expected_len,
                actual: data.len(),
            });
        }
        Ok(Self {
            storage: StoreT::from_vec(data),
            shape: shape.to_vec(),
            strides: compute_strides(shape),
            _phantom: PhantomData,
        })
    }

    /// Create a tensor filled with ones.
    pub fn ones(shape: &[usize]) -> Self {
        let mut t = Self::zeros(shape);
        t.fill(ElT::one());
        t
    }

    /// Create a tensor whose element at each cartesian index is `f(index)`.
    pub fn from_fn(shape: &[usize], mut f: impl FnMut(&[usize]) -> ElT) -> Self {
        let mut t = Self::zeros(shape);
        if t.is_empty() {
            return t;
        }
        let mut idx = vec![0usize; shape.len()];
        let mut linear = 0;
        loop {
            t.storage.as_mut_slice()[linear] = f(&idx);
            linear += 1;
            if !crate::strides::increment_index(&mut idx, shape) {
                break;
            }
        }
        t
    }

    #[inline]
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Get the rank (number of dimensions).
    #[inline]
    pub fn ndim(&self) -> usize {
        self.shape.len()
    }

    /// Get total number of elements.
    #[inline]
    pub fn len(&self) -> usize {
        self.storage.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.storage.is_empty()
    }

    #[inline]
    pub fn strides(&self) -> &[usize] {
        &self.strides
    }

    /// Get underlying data as slice.
    #[inline]
    pub fn data(&self) -> &[ElT] {
        self.storage.as_slice()
    }

    /// Get underlying data as mutable slice.
    #[inline]
    pub fn data_mut(&mut self) -> &mut [ElT] {
        self.storage.as_mut_slice()
    }

    /// Get element by linear index.
    #[inline]
    pub fn get_linear(&self, i: usize) -> Option<&ElT> {
        self.storage.as_slice().get(i)
    }

    fn in_bounds(&self, indices: &[usize]) -> bool {
        indices.len() == self.ndim()
            && indices
                .iter()
                .zip(self.shape.iter())
                .all(|(&idx, &dim)| idx < dim)
    }

    /// Get element by cartesian indices.
    ///
    /// Returns `None` if indices are out of bounds or wrong number of indices.
    pub fn get(&self, indices: &[usize]) -> Option<&ElT> {
        if !self.in_bounds(indices) {
            return None;
        }
        let linear = cartesian_to_linear(indices, &self.strides);
        self.get_linear(linear)
    }

    /// Get mutable element by cartesian indices.
    pub fn get_mut(&mut self, indices: &[usize]) -> Option<&mut ElT> {
        if !self.in_bounds(indices) {
            return None;
        }
        let linear = cartesian_to_linear(indices, &self.strides);
        self.storage.as_mut_slice().get_mut(linear)
    }

    /// Set element by cartesian indices.
    ///
    /// # Errors
    ///
    /// Returns error if indices are out of bounds or wrong number of indices.
    pub fn set(&mut self, indices: &[usize], value: ElT) -> Result<(), TensorError> {
        if indices.len() != self.ndim() {
            return Err(TensorError::WrongNumberOfIndices {
                expected: self.ndim(),
                actual: indices.len(),
            });
        }
        for (&idx, &dim) in indices.iter().zip(self.shape.iter()) {
            if idx >= dim {
                return Err(TensorError::IndexOutOfBounds {
                    index: idx,
                    dim_size: dim,
                });
            }
        }
        let linear = cartesian_to_linear(indices, &self.strides);
        self.storage.as_mut_slice()[linear] = value;
        Ok(())
    }

    /// Fill all elements with a value.
    pub fn fill(&mut self, value: ElT) {
        for x in self.storage.as_mut_slice() {
            *x = value;
        }
    }

    /// Fail with `RankMismatch` unless the tensor has rank `expected`.
    pub fn expect_rank(&self, expected: usize) -> Result<(), TensorError> {
        if self.ndim() != expected {
            return Err(TensorError::RankMismatch {
                expected,
                actual: self.ndim(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zeros_and_ones() {
        let z: DenseTensor<f64> = Tensor::zeros(&[2, 3]);
        assert!(z.data().iter().all(|&x| x == 0.0));
        let o: DenseTensor<f32> = Tensor::ones(&[2, 3]);
        assert!(o.data().iter().all(|&x| x == 1.0));
    }

    #[test]
    fn test_zero_sized_dimension() {
        let t: DenseTensor<f64> = Tensor::zeros(&[2, 0, 3]);
        assert!(t.is_empty());
        assert_eq!(t.shape(), &[2, 0, 3]);
    }

    #[test]
    fn test_from_vec_shape_mismatch() {
        let err = DenseTensor::<f64>::from_vec(vec![1.0, 2.0], &[3]).unwrap_err();
        assert!(matches!(
            err,
            TensorError::ShapeMismatch {
                expected: 3,
                actual: 2
            }
        ));
    }

    #[test]
    fn test_set_get() {
        let mut t: DenseTensor<f64> = Tensor::zeros(&[2, 3, 4, 5]);
        t.set(&[1, 2, 3, 4], 7.0).unwrap();
        assert_eq!(t.get(&[1, 2, 3, 4]), Some(&7.0));
        assert_eq!(t.get(&[2, 0, 0, 0]), None);
        assert!(t.set(&[0, 0, 4, 0], 1.0).is_err());
        assert!(t.set(&[0, 0], 1.0).is_err());
    }

    #[test]
    fn test_from_fn_matches_get() {
        let t: DenseTensor<f64> =
            Tensor::from_fn(&[2, 3, 4], |i| (i[0] + 10 * i[1] + 100 * i[2]) as f64);
        assert_eq!(t.get(&[1, 2, 3]), Some(&321.0));
        assert_eq!(t.get(&[0, 1, 0]), Some(&10.0));
    }

    #[test]
    fn test_expect_rank() {
        let t: DenseTensor<f64> = Tensor::zeros(&[2, 3]);
        assert!(t.expect_rank(2).is_ok());
        assert!(matches!(
            t.expect_rank(4),
            Err(TensorError::RankMismatch {
                expected: 4,
                actual: 2
            })
        ));
    }
}

//! Zero-copy views of dense tensors as faer matrices.
//!
//! Both einconv and faer store data column-major, so a tensor whose element
//! count equals `rows * cols` can be viewed as a matrix without copying.

use faer::{MatMut, MatRef};

use crate::scalar::Scalar;
use crate::tensor::DenseTensor;

/// Extension trait for viewing a `DenseTensor` as a faer matrix.
pub trait AsFaerMat<T: Scalar> {
    /// View tensor data as an immutable `rows x cols` faer matrix.
    ///
    /// # Panics
    ///
    /// Panics if `rows * cols != tensor.len()`.
    ///
    /// # Example
    ///
    /// ```
    /// use einconv::Tensor;
    /// use einconv::backend::AsFaerMat;
    ///
    /// let t = Tensor::from_vec(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0], &[2, 3]).unwrap();
    /// let mat = t.as_faer_mat(2, 3);
    /// assert_eq!(mat.nrows(), 2);
    /// assert_eq!(mat[(1, 2)], 6.0);
    /// ```
    fn as_faer_mat(&self, rows: usize, cols: usize) -> MatRef<'_, T>;

    /// View tensor data as a mutable `rows x cols` faer matrix.
    ///
    /// # Panics
    ///
    /// Panics if `rows * cols != tensor.len()`.
    fn as_faer_mat_mut(&mut self, rows: usize, cols: usize) -> MatMut<'_, T>;
}

impl<T: Scalar> AsFaerMat<T> for DenseTensor<T> {
    fn as_faer_mat(&self, rows: usize, cols: usize) -> MatRef<'_, T> {
        assert_eq!(
            rows * cols,
            self.len(),
            "Matrix dimensions ({rows} x {cols}) must match tensor size ({})",
            self.len()
        );
        MatRef::from_column_major_slice(self.data(), rows, cols)
    }

    fn as_faer_mat_mut(&mut self, rows: usize, cols: usize) -> MatMut<'_, T> {
        assert_eq!(
            rows * cols,
            self.len(),
            "Matrix dimensions ({rows} x {cols}) must match tensor size ({})",
            self.len()
        );
        MatMut::from_column_major_slice_mut(self.data_mut(), rows, cols)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_view_is_column_major() {
        let t = DenseTensor::from_vec(vec![1.0f64, 2.0, 3.0, 4.0], &[2, 2]).unwrap();
        let m = t.as_faer_mat(2, 2);
        assert_eq!(m[(0, 0)], 1.0);
        assert_eq!(m[(1, 0)], 2.0);
        assert_eq!(m[(0, 1)], 3.0);
    }

    #[test]
    fn test_mut_view_writes_through() {
        let mut t = DenseTensor::<f64>::zeros(&[2, 3]);
        {
            let mut m = t.as_faer_mat_mut(2, 3);
            m[(1, 2)] = 7.0;
        }
        assert_eq!(t.get(&[1, 2]), Some(&7.0));
    }

    #[test]
    #[should_panic(expected = "must match tensor size")]
    fn test_wrong_dimensions_panic() {
        let t = DenseTensor::<f64>::zeros(&[2, 3]);
        let _ = t.as_faer_mat(4, 2);
    }
}

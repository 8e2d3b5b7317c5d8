//! Strided tensor slicing.
//!
//! A [`Slice`] per dimension selects `start, start + step, ...` below `end`,
//! which is how the input-gradient decomposition addresses one residue class
//! of rows or columns (`start::stride`).

use crate::error::TensorError;
use crate::scalar::Scalar;
use crate::strides::{cartesian_to_linear, increment_index};
use crate::tensor::DenseTensor;

/// Strided selection along a single dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Slice {
    pub start: usize,
    pub end: usize,
    pub step: usize,
}

impl Slice {
    /// Select the whole dimension of size `size`.
    pub fn full(size: usize) -> Self {
        Self {
            start: 0,
            end: size,
            step: 1,
        }
    }

    /// Contiguous selection `start..end`.
    pub fn range(start: usize, end: usize) -> Self {
        Self {
            start,
            end,
            step: 1,
        }
    }

    /// Strided selection `start..end` with `step`, i.e. `start::step` when
    /// `end` is the dimension size.
    pub fn strided(start: usize, end: usize, step: usize) -> Self {
        Self { start, end, step }
    }

    /// Number of selected positions.
    ///
    /// ```
    /// use einconv::operations::Slice;
    ///
    /// assert_eq!(Slice::strided(1, 8, 2).len(), 4); // 1, 3, 5, 7
    /// assert_eq!(Slice::strided(0, 7, 3).len(), 3); // 0, 3, 6
    /// assert_eq!(Slice::strided(5, 4, 2).len(), 0);
    /// ```
    pub fn len(&self) -> usize {
        if self.start >= self.end || self.step == 0 {
            0
        } else {
            (self.end - self.start).div_ceil(self.step)
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Validate `slices` against `shape` and return the selected shape.
fn selected_shape(shape: &[usize], slices: &[Slice]) -> Result<Vec<usize>, TensorError> {
    if slices.len() != shape.len() {
        return Err(TensorError::WrongNumberOfIndices {
            expected: shape.len(),
            actual: slices.len(),
        });
    }
    let mut new_shape = Vec::with_capacity(shape.len());
    for (dim, (s, &size)) in slices.iter().zip(shape.iter()).enumerate() {
        if s.step == 0 {
            return Err(TensorError::InvalidOperation(format!(
                "slice step must be positive on dimension {dim}"
            )));
        }
        if s.end > size {
            return Err(TensorError::SliceOutOfBounds {
                start: s.start,
                end: s.end,
                dim,
                size,
            });
        }
        new_shape.push(s.len());
    }
    Ok(new_shape)
}

/// Visit every selected position as `(linear index in source, position in selection)`.
fn for_each_selected(
    strides: &[usize],
    slices: &[Slice],
    new_shape: &[usize],
    mut f: impl FnMut(usize, usize),
) {
    if new_shape.iter().any(|&d| d == 0) {
        return;
    }
    let ndim = slices.len();
    let mut indices = vec![0usize; ndim];
    let mut src = vec![0usize; ndim];
    let mut position = 0;
    loop {
        for d in 0..ndim {
            src[d] = slices[d].start + indices[d] * slices[d].step;
        }
        f(cartesian_to_linear(&src, strides), position);
        position += 1;
        if !increment_index(&mut indices, new_shape) {
            break;
        }
    }
}

/// Extract a strided slice from a tensor.
///
/// This creates a copy of the sliced data (not a view).
///
/// # Example
///
/// ```
/// use einconv::Tensor;
/// use einconv::operations::{Slice, slice};
///
/// // Every other kernel row/column of a 4x4 kernel, starting at 1.
/// let w = Tensor::<f64>::ones(&[2, 3, 4, 4]);
/// let s = slice(&w, &[Slice::full(2), Slice::full(3), Slice::strided(1, 4, 2), Slice::strided(1, 4, 2)]).unwrap();
/// assert_eq!(s.shape(), &[2, 3, 2, 2]);
/// ```
pub fn slice<ElT: Scalar>(
    tensor: &DenseTensor<ElT>,
    slices: &[Slice],
) -> Result<DenseTensor<ElT>, TensorError> {
    let new_shape = selected_shape(tensor.shape(), slices)?;
    let mut out = DenseTensor::zeros(&new_shape);
    let src = tensor.data();
    let dst = out.data_mut();
    for_each_selected(tensor.strides(), slices, &new_shape, |linear, position| {
        dst[position] = src[linear];
    });
    Ok(out)
}

/// Overwrite a strided slice of `dest` with the contents of `src`.
///
/// # Errors
///
/// Returns `ShapeMismatch` if `src` does not have the selected shape.
pub fn assign_slice<ElT: Scalar>(
    dest: &mut DenseTensor<ElT>,
    slices: &[Slice],
    src: &DenseTensor<ElT>,
) -> Result<(), TensorError> {
    let new_shape = selected_shape(dest.shape(), slices)?;
    if src.shape() != new_shape.as_slice() {
        return Err(TensorError::ShapeMismatch {
            expected: new_shape.iter().product(),
            actual: src.len(),
        });
    }
    let strides = dest.strides().to_vec();
    let values = src.data();
    let dst = dest.data_mut();
    for_each_selected(&strides, slices, &new_shape, |linear, position| {
        dst[linear] = values[position];
    });
    Ok(())
}

/// Set every element of a strided slice of `dest` to `value`.
pub fn fill_slice<ElT: Scalar>(
    dest: &mut DenseTensor<ElT>,
    slices: &[Slice],
    value: ElT,
) -> Result<(), TensorError> {
    let new_shape = selected_shape(dest.shape(), slices)?;
    let strides = dest.strides().to_vec();
    let dst = dest.data_mut();
    for_each_selected(&strides, slices, &new_shape, |linear, _| {
        dst[linear] = value;
    });
    Ok(())
}

//! Stride computation utilities.
//!
//! Uses column-major (Fortran) order, which is also faer's native layout.

/// Compute column-major strides from shape.
///
/// For shape [d0, d1, d2, ...], returns strides [1, d0, d0*d1, ...].
///
/// # Examples
///
/// ```
/// use einconv::strides::compute_strides;
///
/// assert_eq!(compute_strides(&[3, 4, 5]), vec![1, 3, 12]);
/// assert_eq!(compute_strides(&[2, 3]), vec![1, 2]);
/// assert_eq!(compute_strides(&[]), Vec::<usize>::new());
/// ```
pub fn compute_strides(shape: &[usize]) -> Vec<usize> {
    let mut strides = Vec::with_capacity(shape.len());
    let mut stride = 1;

    for &dim in shape.iter() {
        strides.push(stride);
        stride *= dim;
    }

    strides
}

/// Convert cartesian indices to linear index using the given strides.
#[inline]
pub fn cartesian_to_linear(indices: &[usize], strides: &[usize]) -> usize {
    indices
        .iter()
        .zip(strides.iter())
        .map(|(&idx, &stride)| idx * stride)
        .sum()
}

/// Convert linear index to cartesian indices using column-major order.
pub fn linear_to_cartesian(mut linear: usize, shape: &[usize]) -> Vec<usize> {
    let mut indices = Vec::with_capacity(shape.len());

    for &dim in shape.iter() {
        indices.push(linear % dim);
        linear /= dim;
    }

    indices
}

/// Advance a column-major multi-index in place.
///
/// Returns `false` once the index wraps around to all zeros.
#[inline]
pub fn increment_index(indices: &mut [usize], shape: &[usize]) -> bool {
    for (idx, &dim) in indices.iter_mut().zip(shape.iter()) {
        *idx += 1;
        if *idx < dim {
            return true;
        }
        *idx = 0;
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compute_strides_4d() {
        assert_eq!(compute_strides(&[2, 3, 8, 8]), vec![1, 2, 6, 48]);
    }

    #[test]
    fn test_cartesian_to_linear() {
        let strides = compute_strides(&[3, 4, 5]);
        assert_eq!(cartesian_to_linear(&[0, 0, 0], &strides), 0);
        assert_eq!(cartesian_to_linear(&[1, 0, 0], &strides), 1);
        assert_eq!(cartesian_to_linear(&[0, 1, 0], &strides), 3);
        assert_eq!(cartesian_to_linear(&[0, 0, 1], &strides), 12);
        assert_eq!(
            cartesian_to_linear(&[2, 3, 4], &strides),
            2 + 3 * 3 + 4 * 12
        );
    }

    #[test]
    fn test_linear_to_cartesian() {
        let shape = [3, 4, 5];
        assert_eq!(linear_to_cartesian(0, &shape), vec![0, 0, 0]);
        assert_eq!(linear_to_cartesian(3, &shape), vec![0, 1, 0]);
        assert_eq!(linear_to_cartesian(12, &shape), vec![0, 0, 1]);
    }

    #[test]
    fn test_increment_visits_in_linear_order() {
        let shape = [2, 3, 2];
        let mut idx = vec![0; 3];
        let mut linear = 0;
        loop {
            assert_eq!(idx, linear_to_cartesian(linear, &shape));
            linear += 1;
            if !increment_index(&mut idx, &shape) {
                break;
            }
        }
        assert_eq!(linear, 12);
    }
}

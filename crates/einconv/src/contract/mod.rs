//! Convolution-shaped tensor contractions.
//!
//! A contraction is described by a [`ContractionPattern`] and executed by a
//! [`ContractionBackend`](crate::backend::ContractionBackend):
//!
//! ```text
//! contract_into(backend, pattern, lhs, rhs, out, mask)
//!     → ContractionProperties::compute   (extents, role classes)
//!     → backend.execute                  (overwrites every element of out)
//! ```
//!
//! The left operand is an [`Operand`]: a tensor plus a spatial halo. Logical
//! coordinate `x` of a spatial axis lives at storage index `x + halo`, and
//! storage indices outside the tensor read as zero.
//!
//! # Example
//!
//! ```
//! use einconv::Tensor;
//! use einconv::backend::GenericBackend;
//! use einconv::contract::{ContractionPattern, Operand, contract_into};
//!
//! // 1x1 input, 1x1 kernel: a plain product.
//! let x = Tensor::<f64>::from_vec(vec![3.0], &[1, 1, 1, 1]).unwrap();
//! let w = Tensor::<f64>::from_vec(vec![2.0], &[1, 1, 1, 1]).unwrap();
//! let mut y = Tensor::<f64>::zeros(&[1, 1, 1, 1]);
//!
//! let pattern = ContractionPattern::conv_forward((1, 1), (0, 0));
//! contract_into(&GenericBackend, &pattern, &Operand::new(&x), &w, &mut y, None).unwrap();
//! assert_eq!(y.data(), &[6.0]);
//! ```

mod pattern;
mod properties;

pub use pattern::{
    AffineIndex, ContractionPattern, Direction, IndexRole, RoleValues, Subscript,
};
pub use properties::ContractionProperties;

use crate::backend::ContractionBackend;
use crate::error::TensorError;
use crate::scalar::Scalar;
use crate::tensor::DenseTensor;
use tracing::trace;

/// Opaque accumulation-precision token forwarded to the backend.
///
/// The convolution operator never interprets it. [`GenericBackend`] ANDs the
/// running accumulator's bit pattern with it after every addition;
/// [`GemmBackend`] applies it to each finished sum.
///
/// [`GenericBackend`]: crate::backend::GenericBackend
/// [`GemmBackend`]: crate::backend::GemmBackend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AccumulationMask(u64);

impl AccumulationMask {
    /// Keeps every bit; equivalent to no mask.
    pub const FULL: Self = Self(u64::MAX);

    pub const fn new(bits: u64) -> Self {
        Self(bits)
    }

    pub const fn bits(self) -> u64 {
        self.0
    }

    #[inline]
    pub fn apply<T: Scalar>(self, value: T) -> T {
        value.mask_bits(self.0)
    }
}

/// Left operand of a contraction: a rank-4 tensor with a spatial halo.
#[derive(Debug, Clone, Copy)]
pub struct Operand<'a, T: Scalar> {
    tensor: &'a DenseTensor<T>,
    halo: [usize; 4],
}

impl<'a, T: Scalar> Operand<'a, T> {
    /// Operand whose storage coordinates equal its logical coordinates.
    pub fn new(tensor: &'a DenseTensor<T>) -> Self {
        Self::with_halo(tensor, 0, 0)
    }

    /// Operand that was zero-padded by `rows` and `cols` on each spatial side.
    pub fn with_halo(tensor: &'a DenseTensor<T>, rows: usize, cols: usize) -> Self {
        Self {
            tensor,
            halo: [0, 0, rows, cols],
        }
    }

    pub fn tensor(&self) -> &'a DenseTensor<T> {
        self.tensor
    }

    pub fn shape(&self) -> &'a [usize] {
        self.tensor.shape()
    }

    /// Value at the position `subscripts` select for `values`; zero outside
    /// the stored tensor.
    #[inline]
    pub fn value_at(&self, subscripts: &[Subscript; 4], values: &RoleValues) -> T {
        let shape = self.tensor.shape();
        let strides = self.tensor.strides();
        let mut linear = 0;
        for axis in 0..4 {
            let index = match &subscripts[axis] {
                Subscript::Index(role) => values[role.slot()] as isize,
                Subscript::Affine(affine) => affine.eval(values),
            } + self.halo[axis] as isize;
            if index < 0 || index as usize >= shape[axis] {
                return T::zero();
            }
            linear += index as usize * strides[axis];
        }
        self.tensor.data()[linear]
    }
}

/// Linear index into a tensor whose axes are the plain roles `roles`.
#[inline]
pub fn plain_linear(roles: &[IndexRole; 4], values: &RoleValues, strides: &[usize]) -> usize {
    roles
        .iter()
        .zip(strides)
        .map(|(role, &stride)| values[role.slot()] * stride)
        .sum()
}

/// Contract `lhs` and `rhs` according to `pattern`, overwriting `out`.
///
/// # Errors
///
/// Returns `RankMismatch`/`ShapeMismatch` if the shapes disagree with the
/// pattern, and whatever the backend reports.
pub fn contract_into<T: Scalar, B: ContractionBackend + ?Sized>(
    backend: &B,
    pattern: &ContractionPattern,
    lhs: &Operand<'_, T>,
    rhs: &DenseTensor<T>,
    out: &mut DenseTensor<T>,
    mask: Option<AccumulationMask>,
) -> Result<(), TensorError> {
    let props = ContractionProperties::compute(pattern, lhs.shape(), rhs.shape(), out.shape())?;
    trace!(
        %pattern,
        backend = backend.name(),
        terms = props.summed_len(),
        outputs = out.len(),
        "contract"
    );
    backend.execute(pattern, &props, lhs, rhs, out, mask)
}

//! Scalar trait for tensor element types.

use faer_traits::ComplexField;
use std::fmt::Debug;
use std::ops::{Add, Mul, Sub};

/// Trait for scalar types supported by einconv.
///
/// This wraps faer's `ComplexField` so every element type can be fed to the
/// GEMM backend, and adds the arithmetic and bit-level hooks the contraction
/// engines need.
pub trait Scalar:
    ComplexField
    + Copy
    + Debug
    + Default
    + PartialOrd
    + Add<Output = Self>
    + Sub<Output = Self>
    + Mul<Output = Self>
    + 'static
{
    /// Returns the additive identity (zero).
    fn zero() -> Self {
        Self::default()
    }

    /// Returns the multiplicative identity (one).
    fn one() -> Self;

    /// Lossy conversion from `f64`.
    fn from_f64(value: f64) -> Self;

    /// Widening conversion to `f64`.
    fn to_f64(self) -> f64;

    /// Bitwise AND of the IEEE representation with `mask`.
    ///
    /// Used to emulate reduced-precision accumulation: clearing low mantissa
    /// bits truncates the running sum.
    fn mask_bits(self, mask: u64) -> Self;
}

impl Scalar for f64 {
    fn one() -> Self {
        1.0
    }

    fn from_f64(value: f64) -> Self {
        value
    }

    fn to_f64(self) -> f64 {
        self
    }

    fn mask_bits(self, mask: u64) -> Self {
        f64::from_bits(self.to_bits() & mask)
    }
}

impl Scalar for f32 {
    fn one() -> Self {
        1.0
    }

    fn from_f64(value: f64) -> Self {
        value as f32
    }

    fn to_f64(self) -> f64 {
        self as f64
    }

    /// Only the low 32 bits of `mask` apply.
    fn mask_bits(self, mask: u64) -> Self {
        f32::from_bits(self.to_bits() & (mask as u32))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_one() {
        assert_eq!(<f64 as Scalar>::zero(), 0.0);
        assert_eq!(<f64 as Scalar>::one(), 1.0);
        assert_eq!(<f32 as Scalar>::zero(), 0.0);
        assert_eq!(<f32 as Scalar>::one(), 1.0);
    }

    #[test]
    fn test_full_mask_is_identity() {
        let x = 1.234_567_890_123_f64;
        assert_eq!(x.mask_bits(u64::MAX), x);
        let y = 1.234_567_f32;
        assert_eq!(y.mask_bits(u64::MAX), y);
    }

    #[test]
    fn test_mask_truncates_mantissa() {
        let x = 1.0_f64 + f64::EPSILON;
        // Clearing the lowest mantissa bit drops the epsilon.
        assert_eq!(x.mask_bits(!1u64), 1.0);

        let y = 1.0_f32 + f32::EPSILON;
        assert_eq!(y.mask_bits(!1u64), 1.0);
    }

    #[test]
    fn test_f32_conversions() {
        assert_eq!(<f32 as Scalar>::from_f64(0.5), 0.5_f32);
        assert_eq!(0.25_f32.to_f64(), 0.25);
    }
}

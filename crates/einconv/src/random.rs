//! Random tensor construction.
//!
//! Used for layer weight initialization and for reproducible test inputs.

use rand::Rng;
use rand::distr::StandardUniform;
use rand_distr::StandardNormal;

use crate::scalar::Scalar;
use crate::storage::Dense;
use crate::tensor::Tensor;

impl<ElT: Scalar> Tensor<ElT, Dense<ElT>> {
    /// Create a tensor with uniform random values in [0, 1).
    ///
    /// # Example
    ///
    /// ```
    /// use einconv::Tensor;
    ///
    /// let t: Tensor<f64> = Tensor::random(&[2, 3]);
    /// assert!(t.data().iter().all(|&v| (0.0..1.0).contains(&v)));
    /// ```
    pub fn random(shape: &[usize]) -> Self {
        Self::random_with_rng(shape, &mut rand::rng())
    }

    /// Create a tensor with uniform random values using a specific RNG.
    ///
    /// # Example
    ///
    /// ```
    /// use einconv::Tensor;
    /// use rand::SeedableRng;
    /// use rand::rngs::StdRng;
    ///
    /// let a: Tensor<f64> = Tensor::random_with_rng(&[4], &mut StdRng::seed_from_u64(7));
    /// let b: Tensor<f64> = Tensor::random_with_rng(&[4], &mut StdRng::seed_from_u64(7));
    /// assert_eq!(a, b);
    /// ```
    pub fn random_with_rng<R: Rng>(shape: &[usize], rng: &mut R) -> Self {
        Self::uniform_with_rng(shape, 0.0, 1.0, rng)
    }

    /// Create a tensor with uniform random values in `[low, high)`.
    pub fn uniform_with_rng<R: Rng>(shape: &[usize], low: f64, high: f64, rng: &mut R) -> Self {
        let mut t = Self::zeros(shape);
        for x in t.data_mut() {
            let u: f64 = rng.sample(StandardUniform);
            *x = ElT::from_f64(low + (high - low) * u);
        }
        t
    }

    /// Create a tensor with standard normal random values.
    pub fn randn(shape: &[usize]) -> Self {
        Self::randn_with_rng(shape, &mut rand::rng())
    }

    /// Create a tensor with standard normal random values using a specific RNG.
    pub fn randn_with_rng<R: Rng>(shape: &[usize], rng: &mut R) -> Self {
        let mut t = Self::zeros(shape);
        for x in t.data_mut() {
            *x = ElT::from_f64(rng.sample::<f64, _>(StandardNormal));
        }
        t
    }
}

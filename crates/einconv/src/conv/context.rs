//! Saved forward state and the backward entry point.

use tracing::debug;

use crate::backend::ContractionBackend;
use crate::contract::AccumulationMask;
use crate::conv::ConvGeometry;
use crate::conv::backward::{input_grad, weight_grad_padded};
use crate::error::TensorError;
use crate::scalar::Scalar;
use crate::tensor::DenseTensor;

/// Which gradients the caller needs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GradRequest {
    pub input: bool,
    pub weight: bool,
}

impl GradRequest {
    pub const ALL: Self = Self {
        input: true,
        weight: true,
    };
    pub const INPUT: Self = Self {
        input: true,
        weight: false,
    };
    pub const WEIGHT: Self = Self {
        input: false,
        weight: true,
    };
    pub const NONE: Self = Self {
        input: false,
        weight: false,
    };
}

/// Gradients produced by [`Conv2dContext::backward`]. A gradient that was not
/// requested is `None`, never a zero tensor.
#[derive(Debug, Clone, PartialEq)]
pub struct Conv2dGradients<T: Scalar> {
    pub input: Option<DenseTensor<T>>,
    pub weight: Option<DenseTensor<T>>,
}

/// State saved by [`conv2d`](crate::conv::conv2d) for one backward pass.
///
/// `backward` takes the context by value, so each forward call pairs with at
/// most one backward call.
#[derive(Debug, Clone)]
pub struct Conv2dContext<T: Scalar> {
    padded_input: DenseTensor<T>,
    weight: DenseTensor<T>,
    geometry: ConvGeometry,
    accumulation_mask: Option<AccumulationMask>,
}

impl<T: Scalar> Conv2dContext<T> {
    pub(crate) fn new(
        padded_input: DenseTensor<T>,
        weight: DenseTensor<T>,
        geometry: ConvGeometry,
        accumulation_mask: Option<AccumulationMask>,
    ) -> Self {
        Self {
            padded_input,
            weight,
            geometry,
            accumulation_mask,
        }
    }

    pub fn geometry(&self) -> &ConvGeometry {
        &self.geometry
    }

    /// The input as seen by the contraction, zero-padded by the forward padding.
    pub fn padded_input(&self) -> &DenseTensor<T> {
        &self.padded_input
    }

    pub fn weight(&self) -> &DenseTensor<T> {
        &self.weight
    }

    pub fn accumulation_mask(&self) -> Option<AccumulationMask> {
        self.accumulation_mask
    }

    /// Compute the requested gradients from the output gradient `dy`.
    ///
    /// # Errors
    ///
    /// `ShapeMismatch`/`RankMismatch` if `dy` does not have the forward output
    /// shape.
    ///
    /// # Example
    ///
    /// ```
    /// use einconv::Tensor;
    /// use einconv::backend::Backend;
    /// use einconv::conv::{Conv2dParams, GradRequest, conv2d};
    ///
    /// let x = Tensor::<f64>::ones(&[1, 2, 5, 5]);
    /// let w = Tensor::<f64>::ones(&[3, 2, 3, 3]);
    /// let params = Conv2dParams::new((2, 2), (1, 1));
    /// let (y, ctx) = conv2d(&Backend::Generic, &x, &w, None, &params).unwrap();
    ///
    /// let dy = Tensor::<f64>::ones(y.shape());
    /// let grads = ctx.backward(&Backend::Generic, &dy, GradRequest::WEIGHT).unwrap();
    /// assert!(grads.input.is_none());
    /// assert_eq!(grads.weight.unwrap().shape(), &[3, 2, 3, 3]);
    /// ```
    pub fn backward<B: ContractionBackend>(
        self,
        backend: &B,
        dy: &DenseTensor<T>,
        request: GradRequest,
    ) -> Result<Conv2dGradients<T>, TensorError> {
        debug!(
            input = request.input,
            weight = request.weight,
            output = ?self.geometry.output_shape(),
            "conv2d backward"
        );
        let input = if request.input {
            Some(input_grad(
                backend,
                &self.weight,
                &self.geometry,
                dy,
                self.accumulation_mask,
            )?)
        } else {
            None
        };
        let weight = if request.weight {
            Some(weight_grad_padded(
                backend,
                &self.padded_input,
                &self.geometry,
                dy,
                self.accumulation_mask,
            )?)
        } else {
            None
        };
        Ok(Conv2dGradients { input, weight })
    }
}

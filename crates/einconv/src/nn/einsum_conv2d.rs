//! Convolution layer backed by the contraction operator.

use std::any::Any;

use rand::Rng;

use crate::backend::Backend;
use crate::contract::AccumulationMask;
use crate::conv::{Conv2dContext, Conv2dParams, conv2d};
use crate::error::TensorError;
use crate::nn::conv2d::init_parameters;
use crate::nn::{Conv2d, Conv2dOptions, Module};
use crate::scalar::Scalar;
use crate::tensor::DenseTensor;

/// Drop-in counterpart of [`Conv2d`] that evaluates through
/// [`conv2d`](crate::conv::conv2d).
///
/// It accepts the full constructor surface of the standard layer, but only
/// zero padding, unit dilation, one group and no bias can be evaluated;
/// other configurations construct fine and fail at `forward` with
/// `Unsupported`.
#[derive(Debug, Clone)]
pub struct EinsumConv2d<T: Scalar> {
    in_channels: usize,
    out_channels: usize,
    kernel_size: (usize, usize),
    options: Conv2dOptions,
    accumulation_mask: Option<AccumulationMask>,
    backend: Backend,
    weight: DenseTensor<T>,
    bias: Option<DenseTensor<T>>,
}

impl<T: Scalar> EinsumConv2d<T> {
    pub fn new(
        in_channels: usize,
        out_channels: usize,
        kernel_size: (usize, usize),
        options: Conv2dOptions,
        accumulation_mask: Option<AccumulationMask>,
    ) -> Result<Self, TensorError> {
        Self::with_rng(
            in_channels,
            out_channels,
            kernel_size,
            options,
            accumulation_mask,
            &mut rand::rng(),
        )
    }

    pub fn with_rng<R: Rng>(
        in_channels: usize,
        out_channels: usize,
        kernel_size: (usize, usize),
        options: Conv2dOptions,
        accumulation_mask: Option<AccumulationMask>,
        rng: &mut R,
    ) -> Result<Self, TensorError> {
        let (weight, bias) =
            init_parameters(in_channels, out_channels, kernel_size, &options, rng)?;
        Ok(Self {
            in_channels,
            out_channels,
            kernel_size,
            options,
            accumulation_mask,
            backend: Backend::default(),
            weight,
            bias,
        })
    }

    /// Same configuration and parameter values as `conv`, copied.
    pub fn from_conv2d(conv: &Conv2d<T>, accumulation_mask: Option<AccumulationMask>) -> Self {
        Self {
            in_channels: conv.in_channels(),
            out_channels: conv.out_channels(),
            kernel_size: conv.kernel_size(),
            options: *conv.options(),
            accumulation_mask,
            backend: Backend::default(),
            weight: conv.weight().clone(),
            bias: conv.bias().cloned(),
        }
    }

    /// A new layer with this layer's configuration and copied parameters,
    /// carrying `accumulation_mask` instead of the current one.
    pub fn rebuilt(&self, accumulation_mask: Option<AccumulationMask>) -> Self {
        Self {
            accumulation_mask,
            ..self.clone()
        }
    }

    pub fn with_backend(mut self, backend: Backend) -> Self {
        self.backend = backend;
        self
    }

    pub fn in_channels(&self) -> usize {
        self.in_channels
    }

    pub fn out_channels(&self) -> usize {
        self.out_channels
    }

    pub fn kernel_size(&self) -> (usize, usize) {
        self.kernel_size
    }

    pub fn options(&self) -> &Conv2dOptions {
        &self.options
    }

    pub fn accumulation_mask(&self) -> Option<AccumulationMask> {
        self.accumulation_mask
    }

    pub fn backend(&self) -> Backend {
        self.backend
    }

    pub fn weight(&self) -> &DenseTensor<T> {
        &self.weight
    }

    pub fn bias(&self) -> Option<&DenseTensor<T>> {
        self.bias.as_ref()
    }

    /// Operator configuration for one call.
    pub fn params(&self) -> Conv2dParams {
        self.options
            .params()
            .with_accumulation_mask(self.accumulation_mask)
    }

    /// Forward pass that also returns the context for
    /// [`Conv2dContext::backward`].
    pub fn forward_with_context(
        &self,
        input: &DenseTensor<T>,
    ) -> Result<(DenseTensor<T>, Conv2dContext<T>), TensorError> {
        let params = self.params();
        params.validate(self.bias.is_some())?;
        self.options.check_padding_mode()?;
        conv2d(&self.backend, input, &self.weight, self.bias.as_ref(), &params)
    }
}

impl<T: Scalar> Module<T> for EinsumConv2d<T> {
    fn forward(&self, input: &DenseTensor<T>) -> Result<DenseTensor<T>, TensorError> {
        self.forward_with_context(input).map(|(output, _)| output)
    }

    fn visit_parameters(&self, visitor: &mut dyn FnMut(&str, &DenseTensor<T>)) {
        visitor("weight", &self.weight);
        if let Some(bias) = &self.bias {
            visitor("bias", bias);
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

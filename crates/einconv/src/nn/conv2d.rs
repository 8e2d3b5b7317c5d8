//! Standard convolution layer.

use std::any::Any;

use rand::Rng;

use crate::conv::direct::conv2d_direct;
use crate::conv::{Conv2dParams, PaddingMode};
use crate::error::{TensorError, UnsupportedConfig};
use crate::nn::Module;
use crate::scalar::Scalar;
use crate::tensor::DenseTensor;

/// Constructor options shared by [`Conv2d`] and
/// [`EinsumConv2d`](crate::nn::EinsumConv2d).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Conv2dOptions {
    pub stride: (usize, usize),
    pub padding: (usize, usize),
    pub dilation: (usize, usize),
    pub groups: usize,
    pub bias: bool,
    pub padding_mode: PaddingMode,
}

impl Default for Conv2dOptions {
    fn default() -> Self {
        Self {
            stride: (1, 1),
            padding: (0, 0),
            dilation: (1, 1),
            groups: 1,
            bias: true,
            padding_mode: PaddingMode::Zeros,
        }
    }
}

impl Conv2dOptions {
    pub(crate) fn params(&self) -> Conv2dParams {
        Conv2dParams {
            stride: self.stride,
            padding: self.padding,
            dilation: self.dilation,
            groups: self.groups,
            accumulation_mask: None,
        }
    }

    pub(crate) fn check_padding_mode(&self) -> Result<(), UnsupportedConfig> {
        match self.padding_mode {
            PaddingMode::Zeros => Ok(()),
            mode => Err(UnsupportedConfig::PaddingMode(mode)),
        }
    }
}

/// Freshly initialized `(weight, bias)`: uniform in `±1/sqrt(fan_in)`.
pub(crate) fn init_parameters<T: Scalar, R: Rng>(
    in_channels: usize,
    out_channels: usize,
    kernel_size: (usize, usize),
    options: &Conv2dOptions,
    rng: &mut R,
) -> Result<(DenseTensor<T>, Option<DenseTensor<T>>), TensorError> {
    let groups = options.groups;
    if groups == 0 || in_channels % groups != 0 || out_channels % groups != 0 {
        return Err(TensorError::InvalidOperation(format!(
            "groups {groups} must divide in_channels {in_channels} and out_channels {out_channels}"
        )));
    }
    let fan_in = (in_channels / groups) * kernel_size.0 * kernel_size.1;
    let bound = 1.0 / (fan_in.max(1) as f64).sqrt();
    let weight = DenseTensor::uniform_with_rng(
        &[out_channels, in_channels / groups, kernel_size.0, kernel_size.1],
        -bound,
        bound,
        rng,
    );
    let bias = options
        .bias
        .then(|| DenseTensor::uniform_with_rng(&[out_channels], -bound, bound, rng));
    Ok((weight, bias))
}

/// 2D convolution layer evaluated by direct sliding-window summation.
#[derive(Debug, Clone)]
pub struct Conv2d<T: Scalar> {
    in_channels: usize,
    out_channels: usize,
    kernel_size: (usize, usize),
    options: Conv2dOptions,
    weight: DenseTensor<T>,
    bias: Option<DenseTensor<T>>,
}

impl<T: Scalar> Conv2d<T> {
    /// Layer with randomly initialized parameters.
    ///
    /// # Errors
    ///
    /// `InvalidOperation` if `groups` does not divide both channel counts.
    pub fn new(
        in_channels: usize,
        out_channels: usize,
        kernel_size: (usize, usize),
        options: Conv2dOptions,
    ) -> Result<Self, TensorError> {
        Self::with_rng(in_channels, out_channels, kernel_size, options, &mut rand::rng())
    }

    pub fn with_rng<R: Rng>(
        in_channels: usize,
        out_channels: usize,
        kernel_size: (usize, usize),
        options: Conv2dOptions,
        rng: &mut R,
    ) -> Result<Self, TensorError> {
        let (weight, bias) =
            init_parameters(in_channels, out_channels, kernel_size, &options, rng)?;
        Ok(Self {
            in_channels,
            out_channels,
            kernel_size,
            options,
            weight,
            bias,
        })
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

    pub fn weight(&self) -> &DenseTensor<T> {
        &self.weight
    }

    pub fn bias(&self) -> Option<&DenseTensor<T>> {
        self.bias.as_ref()
    }

    /// Replace the weight; the shape must not change.
    pub fn set_weight(&mut self, weight: DenseTensor<T>) -> Result<(), TensorError> {
        if weight.shape() != self.weight.shape() {
            return Err(TensorError::ShapeMismatch {
                expected: self.weight.len(),
                actual: weight.len(),
            });
        }
        self.weight = weight;
        Ok(())
    }
}

impl<T: Scalar> Module<T> for Conv2d<T> {
    fn forward(&self, input: &DenseTensor<T>) -> Result<DenseTensor<T>, TensorError> {
        self.options.check_padding_mode()?;
        conv2d_direct(input, &self.weight, self.bias.as_ref(), &self.options.params())
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

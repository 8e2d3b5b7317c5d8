//! Output-size law and shape bookkeeping.

use crate::error::TensorError;

/// `(input + 2·padding − kernel) / stride + 1`, or `None` when the kernel does
/// not fit in the padded input or the stride is zero.
///
/// ```
/// use einconv::conv::output_size;
///
/// assert_eq!(output_size(8, 1, 3, 2), Some(4));
/// assert_eq!(output_size(2, 0, 3, 1), None);
/// ```
pub fn output_size(input: usize, padding: usize, kernel: usize, stride: usize) -> Option<usize> {
    let padded = input + 2 * padding;
    if stride == 0 || kernel == 0 || kernel > padded {
        return None;
    }
    Some((padded - kernel) / stride + 1)
}

/// Sizes of one convolution, resolved from the input and weight shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConvGeometry {
    pub batch: usize,
    pub in_channels: usize,
    pub out_channels: usize,
    pub height: usize,
    pub width: usize,
    pub kernel_h: usize,
    pub kernel_w: usize,
    pub out_h: usize,
    pub out_w: usize,
    pub stride: (usize, usize),
    pub padding: (usize, usize),
}

impl ConvGeometry {
    /// Resolve the geometry of `input (n,c,h,w) ⊛ weight (k,c,r,s)`.
    ///
    /// # Errors
    ///
    /// - `RankMismatch` if either shape is not rank 4
    /// - `ShapeMismatch` if the channel counts differ
    /// - `InvalidGeometry` if an axis has no valid output position
    pub fn new(
        input_shape: &[usize],
        weight_shape: &[usize],
        stride: (usize, usize),
        padding: (usize, usize),
    ) -> Result<Self, TensorError> {
        for shape in [input_shape, weight_shape] {
            if shape.len() != 4 {
                return Err(TensorError::RankMismatch {
                    expected: 4,
                    actual: shape.len(),
                });
            }
        }
        let (batch, in_channels, height, width) =
            (input_shape[0], input_shape[1], input_shape[2], input_shape[3]);
        let (out_channels, kernel_h, kernel_w) = (weight_shape[0], weight_shape[2], weight_shape[3]);
        if weight_shape[1] != in_channels {
            return Err(TensorError::ShapeMismatch {
                expected: in_channels,
                actual: weight_shape[1],
            });
        }

        let out_h = output_size(height, padding.0, kernel_h, stride.0).ok_or(
            TensorError::InvalidGeometry {
                axis: "height",
                input: height,
                padding: padding.0,
                kernel: kernel_h,
                stride: stride.0,
            },
        )?;
        let out_w = output_size(width, padding.1, kernel_w, stride.1).ok_or(
            TensorError::InvalidGeometry {
                axis: "width",
                input: width,
                padding: padding.1,
                kernel: kernel_w,
                stride: stride.1,
            },
        )?;

        Ok(Self {
            batch,
            in_channels,
            out_channels,
            height,
            width,
            kernel_h,
            kernel_w,
            out_h,
            out_w,
            stride,
            padding,
        })
    }

    pub fn input_shape(&self) -> [usize; 4] {
        [self.batch, self.in_channels, self.height, self.width]
    }

    pub fn weight_shape(&self) -> [usize; 4] {
        [self.out_channels, self.in_channels, self.kernel_h, self.kernel_w]
    }

    pub fn output_shape(&self) -> [usize; 4] {
        [self.batch, self.out_channels, self.out_h, self.out_w]
    }

    pub fn padded_input_shape(&self) -> [usize; 4] {
        [
            self.batch,
            self.in_channels,
            self.height + 2 * self.padding.0,
            self.width + 2 * self.padding.1,
        ]
    }
}

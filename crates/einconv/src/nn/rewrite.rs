//! In-place replacement of convolution layers.

use tracing::debug;

use crate::contract::AccumulationMask;
use crate::nn::{Conv2d, EinsumConv2d, Module};
use crate::scalar::Scalar;

/// Replace every [`Conv2d`] and [`EinsumConv2d`] below `model` with a fresh
/// [`EinsumConv2d`] carrying `accumulation_mask`.
///
/// Parameters are copied by value. Non-convolution children are searched
/// recursively; `model` itself is never replaced. Returns the number of
/// replaced layers.
///
/// # Example
///
/// ```
/// use einconv::nn::{Conv2d, Conv2dOptions, EinsumConv2d, Module, Relu, Sequential, replace_conv2d};
///
/// let mut model = Sequential::<f64>::new()
///     .with("conv", Conv2d::new(1, 2, (3, 3), Conv2dOptions::default()).unwrap())
///     .with("relu", Relu);
/// assert_eq!(replace_conv2d(&mut model, None), 1);
/// assert!(model.get("conv").unwrap().as_any().is::<EinsumConv2d<f64>>());
/// ```
pub fn replace_conv2d<T: Scalar>(
    model: &mut dyn Module<T>,
    accumulation_mask: Option<AccumulationMask>,
) -> usize {
    let mut replaced = 0;
    for (name, child) in model.named_children_mut() {
        let any = child.as_any();
        let rebuilt = if let Some(conv) = any.downcast_ref::<Conv2d<T>>() {
            Some(EinsumConv2d::from_conv2d(conv, accumulation_mask))
        } else {
            any.downcast_ref::<EinsumConv2d<T>>()
                .map(|layer| layer.rebuilt(accumulation_mask))
        };
        match rebuilt {
            Some(layer) => {
                debug!(
                    name,
                    in_channels = layer.in_channels(),
                    out_channels = layer.out_channels(),
                    mask = ?accumulation_mask,
                    "replacing convolution"
                );
                *child = Box::new(layer);
                replaced += 1;
            }
            None => replaced += replace_conv2d(child.as_mut(), accumulation_mask),
        }
    }
    replaced
}

//! Dilated causal convolution block.

use burn::nn::conv::{Conv1d, Conv1dConfig};
use burn::nn::PaddingConfig1d;
use burn::prelude::*;
use burn::tensor::activation::tanh;

use super::film::Film;
use crate::crop::crop_tail;

#[derive(Config, Debug)]
pub struct ConvBlockConfig {
    pub in_channels: usize,
    pub out_channels: usize,
    pub kernel_size: usize,
    #[config(default = 1)]
    pub dilation: usize,
    #[config(default = 0)]
    pub cond_dim: usize,
    #[config(default = true)]
    pub residual: bool,
}

impl ConvBlockConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> ConvBlock<B> {
        let conv = Conv1dConfig::new(self.in_channels, self.out_channels, self.kernel_size)
            .with_dilation(self.dilation)
            .with_padding(PaddingConfig1d::Valid)
            .with_bias(false)
            .init(device);
        let film = (self.cond_dim > 0).then(|| Film::new(self.cond_dim, self.out_channels, device));
        let residual = self.residual.then(|| {
            Conv1dConfig::new(self.in_channels, self.out_channels, 1)
                .with_bias(false)
                .init(device)
        });

        ConvBlock {
            conv,
            film,
            residual,
            context: (self.kernel_size - 1) * self.dilation,
        }
    }
}

/// `tanh(film(conv(x)) + crop(res(x)))`.
///
/// The convolution is unpadded, so the block consumes `(kernel_size - 1) * dilation`
/// samples of left context.
#[derive(Module, Debug)]
pub struct ConvBlock<B: Backend> {
    conv: Conv1d<B>,
    film: Option<Film<B>>,
    residual: Option<Conv1d<B>>,
    context: usize,
}

impl<B: Backend> ConvBlock<B> {
    pub fn forward(&self, x: Tensor<B, 3>, cond: Option<&Tensor<B, 3>>) -> Tensor<B, 3> {
        let residual = self.residual.as_ref().map(|res| res.forward(x.clone()));

        let mut y = self.conv.forward(x);
        if let (Some(film), Some(cond)) = (&self.film, cond) {
            y = film.forward(y, cond.clone());
        }
        if let Some(res) = residual {
            let length = y.dims()[2];
            y = y + crop_tail(res, length);
        }
        tanh(y)
    }

    /// Samples of left context consumed by this block.
    pub fn context(&self) -> usize {
        self.context
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::ndarray::NdArrayDevice;
    use burn::backend::NdArray;

    type TestBackend = NdArray<f32>;

    #[test]
    fn test_output_length() {
        let device = NdArrayDevice::default();
        let block = ConvBlockConfig::new(1, 4, 3)
            .with_dilation(4)
            .init::<TestBackend>(&device);
        assert_eq!(block.context(), 8);
        let y = block.forward(Tensor::ones([2, 1, 20], &device), None);
        assert_eq!(y.dims(), [2, 4, 12]);
    }

    #[test]
    fn test_saturating_output() {
        let device = NdArrayDevice::default();
        let block = ConvBlockConfig::new(1, 2, 3).init::<TestBackend>(&device);
        let x = Tensor::<TestBackend, 3>::ones([1, 1, 16], &device).mul_scalar(100.0);
        let y = block.forward(x, None);
        let max = y.abs().max().into_scalar();
        assert!(max <= 1.0);
    }

    #[test]
    fn test_conditioning_changes_output() {
        let device = NdArrayDevice::default();
        let block = ConvBlockConfig::new(1, 2, 3)
            .with_cond_dim(2)
            .init::<TestBackend>(&device);
        let x = Tensor::<TestBackend, 3>::ones([1, 1, 8], &device);
        let c0 = Tensor::<TestBackend, 3>::zeros([1, 1, 2], &device);
        let c1 = Tensor::<TestBackend, 3>::ones([1, 1, 2], &device);
        let y0 = block.forward(x.clone(), Some(&c0));
        let y1 = block.forward(x, Some(&c1));
        let diff = (y0 - y1).abs().sum().into_scalar();
        assert!(diff > 0.0);
    }

    #[test]
    fn test_zero_input_zero_output() {
        let device = NdArrayDevice::default();
        let block = ConvBlockConfig::new(1, 3, 5)
            .with_dilation(2)
            .init::<TestBackend>(&device);
        let y = block.forward(Tensor::zeros([1, 1, 16], &device), None);
        assert_eq!(y.abs().sum().into_scalar(), 0.0);
    }
}

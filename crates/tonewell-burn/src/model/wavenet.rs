//! WaveNet-style stack of gated residual layers.

use burn::nn::conv::{Conv1d, Conv1dConfig};
use burn::nn::PaddingConfig1d;
use burn::prelude::*;
use burn::tensor::activation::{relu, sigmoid, tanh};
use tonewell_core::{Error, WaveNetParams};

use super::{prepare_input, EffectModel, InputSpec};
use crate::crop::crop_tail;

#[derive(Module, Debug)]
pub struct WaveNetLayer<B: Backend> {
    filter: Conv1d<B>,
    gate: Conv1d<B>,
    residual: Conv1d<B>,
    skip: Conv1d<B>,
    context: usize,
}

impl<B: Backend> WaveNetLayer<B> {
    pub fn new(channels: usize, kernel_size: usize, dilation: usize, device: &B::Device) -> Self {
        let dilated = || {
            Conv1dConfig::new(channels, channels, kernel_size)
                .with_dilation(dilation)
                .with_padding(PaddingConfig1d::Valid)
                .with_bias(false)
                .init(device)
        };
        let pointwise = || {
            Conv1dConfig::new(channels, channels, 1)
                .with_bias(false)
                .init(device)
        };
        Self {
            filter: dilated(),
            gate: dilated(),
            residual: pointwise(),
            skip: pointwise(),
            context: (kernel_size - 1) * dilation,
        }
    }

    /// Returns `(residual_out, skip_out)`, both `context` samples shorter than `x`.
    pub fn forward(&self, x: Tensor<B, 3>) -> (Tensor<B, 3>, Tensor<B, 3>) {
        let z = tanh(self.filter.forward(x.clone())) * sigmoid(self.gate.forward(x.clone()));
        let length = z.dims()[2];
        let skip = self.skip.forward(z.clone());
        let out = self.residual.forward(z) + crop_tail(x, length);
        (out, skip)
    }

    pub fn context(&self) -> usize {
        self.context
    }
}

/// 1×1 input projection, dilated [`WaveNetLayer`]s, and a post-processing head
/// over the summed skip outputs.
#[derive(Module, Debug)]
pub struct WaveNet<B: Backend> {
    input: Conv1d<B>,
    layers: Vec<WaveNetLayer<B>>,
    post: Conv1d<B>,
    output: Conv1d<B>,
    n_inputs: usize,
    receptive_field: usize,
}

impl<B: Backend> WaveNet<B> {
    pub fn new(params: &WaveNetParams, device: &B::Device) -> Self {
        let layers: Vec<WaveNetLayer<B>> = params
            .dilations()
            .into_iter()
            .map(|d| WaveNetLayer::new(params.n_channels, params.kernel_size, d, device))
            .collect();
        Self {
            input: Conv1dConfig::new(params.n_inputs, params.n_channels, 1)
                .with_bias(false)
                .init(device),
            post: Conv1dConfig::new(params.n_channels, params.n_channels, 1)
                .with_bias(false)
                .init(device),
            output: Conv1dConfig::new(params.n_channels, params.n_outputs, 1)
                .with_bias(false)
                .init(device),
            receptive_field: 1 + layers.iter().map(WaveNetLayer::context).sum::<usize>(),
            layers,
            n_inputs: params.n_inputs,
        }
    }
}

impl<B: Backend> EffectModel<B> for WaveNet<B> {
    fn forward(&self, x: Tensor<B, 3>, _cond: Option<Tensor<B, 3>>) -> Result<Tensor<B, 3>, Error> {
        let spec = InputSpec {
            n_inputs: self.n_inputs,
            cond_dim: 0,
            receptive_field: self.receptive_field,
        };
        prepare_input(&x, None, spec, &self.device())?;

        let mut hidden = self.input.forward(x);
        let mut skips = Vec::with_capacity(self.layers.len());
        for layer in &self.layers {
            let (out, skip) = layer.forward(hidden);
            hidden = out;
            skips.push(skip);
        }

        let length = hidden.dims()[2];
        let summed = skips
            .into_iter()
            .map(|skip| crop_tail(skip, length))
            .reduce(|acc, skip| acc + skip)
            .unwrap_or(hidden);
        let y = self.post.forward(relu(summed));
        Ok(self.output.forward(relu(y)))
    }

    fn receptive_field(&self) -> usize {
        self.receptive_field
    }

    fn n_inputs(&self) -> usize {
        self.n_inputs
    }

    fn cond_dim(&self) -> usize {
        0
    }

    fn device(&self) -> B::Device {
        self.output.weight.device()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::ndarray::NdArrayDevice;
    use burn::backend::NdArray;

    type TestBackend = NdArray<f32>;

    #[test]
    fn test_receptive_field_of_repeated_stack() {
        let params = WaveNetParams {
            n_inputs: 1,
            n_outputs: 1,
            n_channels: 4,
            dilation_depth: 4,
            n_repeat: 2,
            kernel_size: 2,
        };
        let device = NdArrayDevice::default();
        let model = WaveNet::<TestBackend>::new(&params, &device);
        // 2 * (1 + 2 + 4 + 8) + 1
        assert_eq!(model.receptive_field(), 31);
        let y = model
            .forward(Tensor::ones([1, 1, 40], &device), None)
            .unwrap();
        assert_eq!(y.dims(), [1, 1, 10]);
    }

    #[test]
    fn test_conditioning_ignored() {
        let params = WaveNetParams {
            n_inputs: 1,
            n_outputs: 1,
            n_channels: 2,
            dilation_depth: 2,
            n_repeat: 1,
            kernel_size: 3,
        };
        let device = NdArrayDevice::default();
        let model = WaveNet::<TestBackend>::new(&params, &device);
        let x = Tensor::<TestBackend, 3>::ones([1, 1, 12], &device);
        let cond = Tensor::<TestBackend, 3>::ones([1, 1, 5], &device);
        let a = model.forward(x.clone(), Some(cond)).unwrap();
        let b = model.forward(x, None).unwrap();
        assert_eq!(a.into_data(), b.into_data());
    }
}

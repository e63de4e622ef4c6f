//! Gated convolutional network.

use burn::nn::conv::{Conv1d, Conv1dConfig};
use burn::nn::PaddingConfig1d;
use burn::prelude::*;
use burn::tensor::activation::{sigmoid, tanh};
use tonewell_core::{Error, GcnParams};

use super::film::Film;
use super::{prepare_input, EffectModel, InputSpec};
use crate::crop::crop_tail;

/// One gated dilated layer: `tanh(a) * sigmoid(b)` over a doubled-width convolution.
///
/// Returns both the residual output fed to the next layer and the gated activation
/// collected as a skip connection.
#[derive(Module, Debug)]
pub struct GatedLayer<B: Backend> {
    conv: Conv1d<B>,
    film: Option<Film<B>>,
    mix: Conv1d<B>,
    projection: Option<Conv1d<B>>,
    channels: usize,
    context: usize,
}

impl<B: Backend> GatedLayer<B> {
    pub fn new(
        in_channels: usize,
        channels: usize,
        kernel_size: usize,
        dilation: usize,
        cond_dim: usize,
        device: &B::Device,
    ) -> Self {
        Self {
            conv: Conv1dConfig::new(in_channels, 2 * channels, kernel_size)
                .with_dilation(dilation)
                .with_padding(PaddingConfig1d::Valid)
                .with_bias(false)
                .init(device),
            film: (cond_dim > 0).then(|| Film::new(cond_dim, 2 * channels, device)),
            mix: Conv1dConfig::new(channels, channels, 1)
                .with_bias(false)
                .init(device),
            projection: (in_channels != channels).then(|| {
                Conv1dConfig::new(in_channels, channels, 1)
                    .with_bias(false)
                    .init(device)
            }),
            channels,
            context: (kernel_size - 1) * dilation,
        }
    }

    pub fn forward(
        &self,
        x: Tensor<B, 3>,
        cond: Option<&Tensor<B, 3>>,
    ) -> (Tensor<B, 3>, Tensor<B, 3>) {
        let residual = match &self.projection {
            Some(projection) => projection.forward(x.clone()),
            None => x.clone(),
        };

        let mut y = self.conv.forward(x);
        if let (Some(film), Some(cond)) = (&self.film, cond) {
            y = film.forward(y, cond.clone());
        }
        let gated = tanh(y.clone().narrow(1, 0, self.channels))
            * sigmoid(y.narrow(1, self.channels, self.channels));

        let length = gated.dims()[2];
        let out = self.mix.forward(gated.clone()) + crop_tail(residual, length);
        (out, gated)
    }

    pub fn context(&self) -> usize {
        self.context
    }
}

/// Blocks of [`GatedLayer`]s whose skip outputs are concatenated and mixed down
/// by a 1×1 head.
#[derive(Module, Debug)]
pub struct Gcn<B: Backend> {
    layers: Vec<GatedLayer<B>>,
    head: Conv1d<B>,
    n_inputs: usize,
    cond_dim: usize,
    receptive_field: usize,
}

impl<B: Backend> Gcn<B> {
    pub fn new(params: &GcnParams, device: &B::Device) -> Self {
        let layers: Vec<GatedLayer<B>> = params
            .dilations()
            .into_iter()
            .enumerate()
            .map(|(i, dilation)| {
                let in_channels = if i == 0 {
                    params.n_inputs
                } else {
                    params.n_channels
                };
                GatedLayer::new(
                    in_channels,
                    params.n_channels,
                    params.kernel_size,
                    dilation,
                    params.cond_dim,
                    device,
                )
            })
            .collect();

        let head = Conv1dConfig::new(params.n_channels * layers.len(), params.n_outputs, 1)
            .with_bias(false)
            .init(device);

        Self {
            receptive_field: 1 + layers.iter().map(GatedLayer::context).sum::<usize>(),
            layers,
            head,
            n_inputs: params.n_inputs,
            cond_dim: params.cond_dim,
        }
    }
}

impl<B: Backend> EffectModel<B> for Gcn<B> {
    fn forward(&self, x: Tensor<B, 3>, cond: Option<Tensor<B, 3>>) -> Result<Tensor<B, 3>, Error> {
        let spec = InputSpec {
            n_inputs: self.n_inputs,
            cond_dim: self.cond_dim,
            receptive_field: self.receptive_field,
        };
        let cond = prepare_input(&x, cond, spec, &self.device())?;

        let mut hidden = x;
        let mut skips = Vec::with_capacity(self.layers.len());
        for layer in &self.layers {
            let (out, skip) = layer.forward(hidden, cond.as_ref());
            hidden = out;
            skips.push(skip);
        }

        let length = hidden.dims()[2];
        let skips = skips
            .into_iter()
            .map(|skip| crop_tail(skip, length))
            .collect();
        Ok(self.head.forward(Tensor::cat(skips, 1)))
    }

    fn receptive_field(&self) -> usize {
        self.receptive_field
    }

    fn n_inputs(&self) -> usize {
        self.n_inputs
    }

    fn cond_dim(&self) -> usize {
        self.cond_dim
    }

    fn device(&self) -> B::Device {
        self.head.weight.device()
    }
}

//! Temporal convolutional network.

use burn::nn::conv::{Conv1d, Conv1dConfig};
use burn::prelude::*;
use tonewell_core::{Error, TcnParams};

use super::conv_block::{ConvBlock, ConvBlockConfig};
use super::{prepare_input, EffectModel, InputSpec};

/// Stack of dilated [`ConvBlock`]s followed by a 1×1 output projection.
#[derive(Module, Debug)]
pub struct Tcn<B: Backend> {
    blocks: Vec<ConvBlock<B>>,
    output: Conv1d<B>,
    n_inputs: usize,
    cond_dim: usize,
    receptive_field: usize,
}

impl<B: Backend> Tcn<B> {
    pub fn new(params: &TcnParams, device: &B::Device) -> Self {
        let dilations = params.dilations();
        let blocks: Vec<ConvBlock<B>> = dilations
            .iter()
            .enumerate()
            .map(|(i, dilation)| {
                let in_channels = if i == 0 {
                    params.n_inputs
                } else {
                    params.n_channels
                };
                ConvBlockConfig::new(in_channels, params.n_channels, params.kernel_size)
                    .with_dilation(*dilation)
                    .with_cond_dim(params.cond_dim)
                    .with_residual(params.residual)
                    .init(device)
            })
            .collect();

        let output = Conv1dConfig::new(params.n_channels, params.n_outputs, 1)
            .with_bias(false)
            .init(device);

        Self {
            receptive_field: 1 + blocks.iter().map(ConvBlock::context).sum::<usize>(),
            blocks,
            output,
            n_inputs: params.n_inputs,
            cond_dim: params.cond_dim,
        }
    }

    fn spec(&self) -> InputSpec {
        InputSpec {
            n_inputs: self.n_inputs,
            cond_dim: self.cond_dim,
            receptive_field: self.receptive_field,
        }
    }
}

impl<B: Backend> EffectModel<B> for Tcn<B> {
    fn forward(&self, x: Tensor<B, 3>, cond: Option<Tensor<B, 3>>) -> Result<Tensor<B, 3>, Error> {
        let cond = prepare_input(&x, cond, self.spec(), &self.device())?;
        let hidden = self
            .blocks
            .iter()
            .fold(x, |h, block| block.forward(h, cond.as_ref()));
        Ok(self.output.forward(hidden))
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
        self.output.weight.device()
    }
}

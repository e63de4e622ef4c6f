//! Feature-wise affine conditioning.

use burn::nn::{Linear, LinearConfig};
use burn::prelude::*;

/// Projects conditioning values to a per-channel scale and shift.
#[derive(Module, Debug)]
pub struct Film<B: Backend> {
    adaptor: Linear<B>,
    channels: usize,
}

impl<B: Backend> Film<B> {
    pub fn new(cond_dim: usize, channels: usize, device: &B::Device) -> Self {
        Self {
            adaptor: LinearConfig::new(cond_dim, 2 * channels).init(device),
            channels,
        }
    }

    /// `x * scale + shift`, with `cond: [batch, 1, cond_dim]` broadcast over time.
    pub fn forward(&self, x: Tensor<B, 3>, cond: Tensor<B, 3>) -> Tensor<B, 3> {
        let [batch, channels, time] = x.dims();
        let params = self.adaptor.forward(cond).swap_dims(1, 2);
        let scale = params
            .clone()
            .narrow(1, 0, self.channels)
            .expand([batch, channels, time]);
        let shift = params
            .narrow(1, self.channels, self.channels)
            .expand([batch, channels, time]);
        x * scale + shift
    }
}

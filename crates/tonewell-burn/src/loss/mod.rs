//! Training criteria.
//!
//! Time-domain terms live here as free functions; the spectral terms are in
//! [`stft`]. [`LossComposer`] turns a [`tonewell_core::LossSpec`] into a weighted
//! sum of them and reports the error-to-signal ratio alongside.

mod composer;
pub mod stft;

pub use composer::{LossComposer, LossOutput};
pub use stft::{MultiResolutionStft, Stft};

use burn::prelude::*;

/// Added to the target energy so silent targets don't divide by zero.
pub const ESR_EPS: f32 = 1e-10;

/// Mean absolute error.
pub fn mae<B: Backend, const D: usize>(pred: Tensor<B, D>, target: Tensor<B, D>) -> Tensor<B, 1> {
    (target - pred).abs().mean()
}

/// Mean squared error.
pub fn mse<B: Backend, const D: usize>(pred: Tensor<B, D>, target: Tensor<B, D>) -> Tensor<B, 1> {
    (target - pred).powf_scalar(2.0).mean()
}

/// Error-to-signal ratio `Σ(target - pred)² / (Σ target² + ε)` over the whole tensor.
pub fn esr<B: Backend, const D: usize>(pred: Tensor<B, D>, target: Tensor<B, D>) -> Tensor<B, 1> {
    let energy = target.clone().powf_scalar(2.0).sum().add_scalar(ESR_EPS);
    (target - pred).powf_scalar(2.0).sum() / energy
}

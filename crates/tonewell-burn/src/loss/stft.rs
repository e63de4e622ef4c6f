//! Differentiable short-time Fourier magnitude.
//!
//! The transform is a strided 1-D convolution with a fixed basis of windowed
//! cosines and negated sines, so gradients flow through it like any other conv.
//! Frames are centered: the signal is zero-padded by `fft_size / 2` on both
//! sides, which also means inputs shorter than one frame are still valid. The
//! right edge gets extra zeros so the last frame ends exactly on the padded
//! signal; the strided conv backward pass needs every input sample covered.

use std::f64::consts::PI;

use burn::prelude::*;
use burn::tensor::module::conv1d;
use burn::tensor::ops::ConvOptions;
use burn::tensor::TensorData;
use tonewell_core::StftResolution;

use crate::crop::{pad_left, pad_right};

/// Floor applied to squared magnitudes before the square root and logarithm.
const MAGNITUDE_FLOOR: f32 = 1e-8;

/// Keeps the Frobenius norm differentiable when both spectra coincide.
const NORM_EPS: f32 = 1e-12;

/// Periodic Hann window of `win_length` samples, zero-padded and centered in
/// `fft_size` samples.
pub(crate) fn centered_hann(resolution: &StftResolution) -> Vec<f64> {
    let win = resolution.win_length;
    let offset = (resolution.fft_size - win) / 2;
    let mut window = vec![0.0; resolution.fft_size];
    for (i, w) in window[offset..offset + win].iter_mut().enumerate() {
        *w = 0.5 - 0.5 * (2.0 * PI * i as f64 / win as f64).cos();
    }
    window
}

/// Left and right zero padding for `time` samples: `fft_size / 2` on each side,
/// plus whatever the right edge needs for `(padded - fft_size) % hop == 0`.
fn frame_padding(time: usize, fft_size: usize, hop: usize) -> (usize, usize) {
    let half = fft_size / 2;
    let span = (time + 2 * half).max(fft_size);
    let remainder = (span - fft_size) % hop.max(1);
    let extra = if remainder == 0 { 0 } else { hop - remainder };
    (half, span - time - half + extra)
}

/// One STFT resolution with its basis uploaded to a device.
#[derive(Debug, Clone)]
pub struct Stft<B: Backend> {
    resolution: StftResolution,
    /// `[2 * n_bins, 1, fft_size]`: real rows first, imaginary rows second.
    basis: Tensor<B, 3>,
}

impl<B: Backend> Stft<B> {
    pub fn new(resolution: StftResolution, device: &B::Device) -> Self {
        let n_fft = resolution.fft_size;
        let n_bins = resolution.n_bins();
        let window = centered_hann(&resolution);

        let mut basis = vec![0.0f32; 2 * n_bins * n_fft];
        for k in 0..n_bins {
            for (n, w) in window.iter().enumerate() {
                let phase = 2.0 * PI * (k * n) as f64 / n_fft as f64;
                basis[k * n_fft + n] = (w * phase.cos()) as f32;
                basis[(n_bins + k) * n_fft + n] = (-w * phase.sin()) as f32;
            }
        }

        Self {
            resolution,
            basis: Tensor::from_data(TensorData::new(basis, [2 * n_bins, 1, n_fft]), device),
        }
    }

    pub fn resolution(&self) -> &StftResolution {
        &self.resolution
    }

    /// Magnitude spectrogram of `x: [batch, channel, time]`.
    ///
    /// Returns `[batch * channel, n_bins, frames]`.
    pub fn magnitude(&self, x: Tensor<B, 3>) -> Tensor<B, 3> {
        let [batch, channels, time] = x.dims();
        let n_bins = self.resolution.n_bins();
        let n_fft = self.resolution.fft_size;
        let hop = self.resolution.hop_size;

        let (left, right) = frame_padding(time, n_fft, hop);
        let padded = pad_right(
            pad_left(x.reshape([batch * channels, 1, time]), left),
            right,
        );
        let spectrum = conv1d(
            padded,
            self.basis.clone(),
            None,
            ConvOptions::new([hop], [0], [1], 1),
        );
        let re = spectrum.clone().narrow(1, 0, n_bins);
        let im = spectrum.narrow(1, n_bins, n_bins);
        (re.powf_scalar(2.0) + im.powf_scalar(2.0))
            .clamp_min(MAGNITUDE_FLOOR)
            .sqrt()
    }

    /// Spectral convergence plus mean absolute log-magnitude distance.
    pub fn loss(&self, pred: Tensor<B, 3>, target: Tensor<B, 3>) -> Tensor<B, 1> {
        let pred_mag = self.magnitude(pred);
        let target_mag = self.magnitude(target);

        let diff_norm = (target_mag.clone() - pred_mag.clone())
            .powf_scalar(2.0)
            .sum()
            .add_scalar(NORM_EPS)
            .sqrt();
        let target_norm = target_mag.clone().powf_scalar(2.0).sum().add_scalar(NORM_EPS).sqrt();
        let convergence = diff_norm / target_norm;

        let log_distance = (target_mag.log() - pred_mag.log()).abs().mean();
        convergence + log_distance
    }
}

/// Average of [`Stft::loss`] over several resolutions.
#[derive(Debug, Clone)]
pub struct MultiResolutionStft<B: Backend> {
    resolutions: Vec<Stft<B>>,
}

impl<B: Backend> MultiResolutionStft<B> {
    pub fn new(resolutions: &[StftResolution], device: &B::Device) -> Self {
        Self {
            resolutions: resolutions.iter().map(|r| Stft::new(*r, device)).collect(),
        }
    }

    pub fn loss(&self, pred: Tensor<B, 3>, target: Tensor<B, 3>) -> Tensor<B, 1> {
        let count = self.resolutions.len().max(1) as f32;
        self.resolutions
            .iter()
            .map(|stft| stft.loss(pred.clone(), target.clone()))
            .reduce(|acc, l| acc + l)
            .map(|total| total.div_scalar(count))
            .unwrap_or_else(|| Tensor::zeros([1], &pred.device()))
    }
}

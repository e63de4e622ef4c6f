//! Test helpers and fixtures for tonewell integration tests.
//!
//! ## Tolerance Levels
//!
//! Use the appropriate tolerance from [`tolerances`] module:
//! - `FLOAT_EPSILON` (1e-6): Exact operations (reloads, unity gain)
//! - `TENSOR_EPSILON` (1e-5): Same math over different tensor shapes
//! - `METRIC_EPSILON` (1e-6): Loss and ESR values
//! - `SILENCE_THRESHOLD` (0.0001): Silence detection (-80dB)

#![allow(dead_code)]

pub mod tolerances;

use tonewell::prelude::*;
use tonewell::{DilationSchedule, TcnParams};

/// Default test sample rate.
pub const TEST_SAMPLE_RATE: f64 = 48000.0;

/// Small TCN: 3 blocks, kernel 3, dilation growth 2, receptive field 15.
pub fn tiny_tcn() -> ModelKind {
    ModelKind::Tcn(TcnParams {
        n_inputs: 1,
        n_outputs: 1,
        n_blocks: 3,
        kernel_size: 3,
        n_channels: 8,
        dilation: DilationSchedule::stacked(2),
        cond_dim: 0,
        residual: true,
    })
}

/// Training configuration sized for tests.
pub fn quick_config(n_epochs: usize) -> TrainingConfig {
    TrainingConfig {
        n_epochs,
        batch_size: 2,
        learning_rate: 5e-3,
        seed: 42,
        ..TrainingConfig::default()
    }
}

/// Generate a test signal: sine wave at given frequency for specified samples.
pub fn generate_sine(frequency: f64, sample_rate: f64, num_samples: usize) -> Vec<f32> {
    (0..num_samples)
        .map(|i| {
            let t = i as f64 / sample_rate;
            (2.0 * std::f64::consts::PI * frequency * t).sin() as f32
        })
        .collect()
}

/// Generate white noise (random samples in -1..1).
pub fn generate_noise(num_samples: usize, seed: u64) -> Vec<f32> {
    // Simple LCG for reproducible "random" noise
    let mut rng = seed;
    (0..num_samples)
        .map(|_| {
            rng = rng.wrapping_mul(6364136223846793005).wrapping_add(1);
            ((rng >> 33) as f32 / u32::MAX as f32) * 4.0 - 1.0
        })
        .collect()
}

/// Generate silence (zero samples).
pub fn generate_silence(num_samples: usize) -> Vec<f32> {
    vec![0.0; num_samples]
}

/// A soft-clipping "effect" used as a learnable target.
pub fn soft_clip(input: &[f32], drive: f32) -> Vec<f32> {
    input.iter().map(|x| (x * drive).tanh() * 0.5).collect()
}

/// Cut aligned `(input, target)` signals into crops and group them into batches.
pub fn crop_batches(input: &[f32], target: &[f32], crop: usize, batch_size: usize) -> VecBatches {
    let crops: Vec<(Vec<f32>, Vec<f32>)> = input
        .chunks_exact(crop)
        .zip(target.chunks_exact(crop))
        .map(|(x, y)| (x.to_vec(), y.to_vec()))
        .collect();
    VecBatches::new(
        crops
            .chunks(batch_size)
            .filter(|c| c.len() == batch_size)
            .map(|c| AudioBatch::from_crops(c).expect("aligned crops"))
            .collect(),
    )
}

/// Calculate RMS of a signal.
pub fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_sq: f32 = samples.iter().map(|s| s * s).sum();
    (sum_sq / samples.len() as f32).sqrt()
}

/// Calculate peak amplitude of a signal.
pub fn peak(samples: &[f32]) -> f32 {
    samples
        .iter()
        .map(|s| s.abs())
        .fold(0.0_f32, |a, b| a.max(b))
}

/// Check if audio is silent (all samples below threshold).
pub fn is_silent(samples: &[f32], threshold: f32) -> bool {
    samples.iter().all(|&s| s.abs() <= threshold)
}

/// Assert two signals are equal within tolerance, with detailed error message.
pub fn assert_signals_equal(a: &[f32], b: &[f32], epsilon: f32, context: &str) {
    assert_eq!(a.len(), b.len(), "{}: length mismatch", context);
    let first = a
        .iter()
        .zip(b)
        .position(|(x, y)| (x - y).abs() > epsilon);
    let max_diff = a
        .iter()
        .zip(b)
        .map(|(x, y)| (x - y).abs())
        .fold(0.0_f32, f32::max);
    assert!(
        first.is_none(),
        "{}: Signals differ - first diff at sample {:?}, max_diff={:.6}",
        context,
        first,
        max_diff
    );
}

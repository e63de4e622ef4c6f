//! Offline rendering of whole signals through a trained model.

use burn::prelude::*;
use serde::{Deserialize, Serialize};
use tonewell_core::Error as CoreError;

use crate::crop::{pad_left, pad_right};
use crate::error::Result;
use crate::model::EffectModel;
use crate::tensor::{audio_tensor, shared_cond, to_vec};

/// Post-processing applied while rendering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderOptions {
    /// Truncate every channel to this many samples before processing.
    pub max_length: Option<usize>,
    /// Silence appended to the input so decaying effects can ring out.
    pub tail: usize,
    /// Wet share of the output in percent; `100` is fully processed.
    pub mix: f32,
    /// Output gain in decibels.
    pub gain_db: f32,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            max_length: None,
            tail: 0,
            mix: 100.0,
            gain_db: 0.0,
        }
    }
}

impl RenderOptions {
    pub fn validate(&self) -> std::result::Result<(), CoreError> {
        if !(0.0..=100.0).contains(&self.mix) {
            return Err(CoreError::InvalidConfig(format!(
                "mix {} outside 0..=100",
                self.mix
            )));
        }
        if !self.gain_db.is_finite() {
            return Err(CoreError::InvalidConfig("gain_db must be finite".into()));
        }
        if self.max_length == Some(0) {
            return Err(CoreError::InvalidConfig("max_length must be at least 1".into()));
        }
        Ok(())
    }

    fn linear_gain(&self) -> f32 {
        10f32.powf(self.gain_db / 20.0)
    }
}

/// Process `channels` of mono audio, returning output aligned sample-for-sample
/// with the (truncated, tail-extended) input.
///
/// Each channel runs as one item of a batch through a single-input model.
/// The input is left-padded with `receptive_field - 1` zeros so the first output
/// sample already has a full, silent history.
pub fn render<B: Backend, M: EffectModel<B>>(
    model: &M,
    channels: &[Vec<f32>],
    cond: Option<&[f32]>,
    options: &RenderOptions,
) -> Result<Vec<Vec<f32>>> {
    options.validate()?;
    if model.n_inputs() != 1 {
        return Err(CoreError::InvalidConfig(format!(
            "rendering needs a single-input model, got {} inputs",
            model.n_inputs()
        ))
        .into());
    }
    let Some(first) = channels.first() else {
        return Ok(Vec::new());
    };
    if let Some(bad) = channels.iter().find(|c| c.len() != first.len()) {
        return Err(CoreError::ShapeMismatch {
            what: "render channel length",
            expected: vec![first.len()],
            actual: vec![bad.len()],
        }
        .into());
    }

    let length = options.max_length.map_or(first.len(), |m| m.min(first.len()));
    if length == 0 {
        return Ok(vec![Vec::new(); channels.len()]);
    }
    let n_channels = channels.len();
    let flat: Vec<f32> = channels
        .iter()
        .flat_map(|c| c[..length].iter().copied())
        .collect();

    let device = model.device();
    let dry = pad_right(audio_tensor::<B>(&flat, [n_channels, 1, length], &device)?, options.tail);
    let cond = shared_cond::<B>(cond, model.cond_dim(), &device)?;
    let wet = model.forward(pad_left(dry.clone(), model.receptive_field() - 1), cond)?;

    let [_, n_outputs, _] = wet.dims();
    if n_outputs != 1 {
        return Err(CoreError::ShapeMismatch {
            what: "render output channels",
            expected: vec![1],
            actual: vec![n_outputs],
        }
        .into());
    }

    let wet_share = options.mix / 100.0;
    let out = (wet.mul_scalar(wet_share) + dry.mul_scalar(1.0 - wet_share))
        .mul_scalar(options.linear_gain());

    let total = length + options.tail;
    tracing::debug!(channels = n_channels, samples = total, "Rendered");
    Ok(to_vec(out)?
        .chunks(total)
        .map(<[f32]>::to_vec)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Network;
    use approx::assert_abs_diff_eq;
    use burn::backend::ndarray::NdArrayDevice;
    use burn::backend::NdArray;
    use tonewell_core::{DilationSchedule, ModelKind, TcnParams};

    type TestBackend = NdArray<f32>;

    fn model() -> Network<TestBackend> {
        let kind = ModelKind::Tcn(TcnParams {
            n_inputs: 1,
            n_outputs: 1,
            n_blocks: 3,
            kernel_size: 3,
            n_channels: 4,
            dilation: DilationSchedule::stacked(2),
            cond_dim: 0,
            residual: true,
        });
        Network::init(&kind, &NdArrayDevice::default()).unwrap()
    }

    fn tone(len: usize) -> Vec<f32> {
        (0..len).map(|i| (i as f32 * 0.05).sin()).collect()
    }

    #[test]
    fn test_output_aligned_with_input() {
        let out = render(&model(), &[tone(40), tone(40)], None, &RenderOptions::default()).unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].len(), 40);
        for (a, b) in out[0].iter().zip(&out[1]) {
            assert_abs_diff_eq!(*a, *b, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_length_cap_and_tail() {
        let options = RenderOptions {
            max_length: Some(25),
            tail: 10,
            ..RenderOptions::default()
        };
        let out = render(&model(), &[tone(40)], None, &options).unwrap();
        assert_eq!(out[0].len(), 35);
    }

    #[test]
    fn test_dry_mix_and_gain() {
        let input = tone(30);
        let options = RenderOptions {
            mix: 0.0,
            gain_db: 20.0 * 2f32.log10(),
            ..RenderOptions::default()
        };
        let out = render(&model(), &[input.clone()], None, &options).unwrap();
        for (y, x) in out[0].iter().zip(&input) {
            assert_abs_diff_eq!(*y, 2.0 * x, epsilon = 1e-5);
        }
    }

    #[test]
    fn test_rejects_ragged_channels_and_bad_mix() {
        assert!(render(&model(), &[tone(10), tone(12)], None, &RenderOptions::default()).is_err());
        let options = RenderOptions {
            mix: 120.0,
            ..RenderOptions::default()
        };
        assert!(render(&model(), &[tone(10)], None, &options)
            .err()
            .is_some_and(|e| e.is_config()));
    }

    #[test]
    fn test_output_is_causal() {
        let a = tone(32);
        let mut b = a.clone();
        b[20] = 1.0;
        let model = model();
        let out_a = render(&model, &[a], None, &RenderOptions::default()).unwrap();
        let out_b = render(&model, &[b], None, &RenderOptions::default()).unwrap();
        assert_eq!(out_a[0][..20], out_b[0][..20]);
    }
}

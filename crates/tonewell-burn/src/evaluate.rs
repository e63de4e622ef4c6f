//! Test-set metrics over whole signals.

use burn::prelude::*;
use tonewell_core::Error as CoreError;

use crate::crop::pad_left;
use crate::error::Result;
use crate::loss::{esr, mse};
use crate::model::EffectModel;
use crate::tensor::{audio_tensor, scalar, shared_cond};

/// Error of one prediction against its target.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SignalMetrics {
    pub mse: f64,
    pub esr: f64,
}

/// Per-chunk metrics and their means.
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkedMetrics {
    pub chunks: Vec<SignalMetrics>,
    pub mean_mse: f64,
    pub mean_esr: f64,
}

/// Run `input` through the model with a silent history and compare the result
/// with `target`.
pub fn evaluate_signal<B: Backend, M: EffectModel<B>>(
    model: &M,
    input: &[f32],
    target: &[f32],
    cond: Option<&[f32]>,
) -> Result<SignalMetrics> {
    let chunks = evaluate_chunks(model, input, target, cond, 1)?;
    Ok(chunks.chunks[0])
}

/// Split the target into `n_chunks` consecutive pieces and evaluate each one.
///
/// Every chunk is predicted from its own window of the input extended by
/// `receptive_field - 1` samples of real history (zeros before the start of the
/// signal), so chunk outputs line up exactly with a whole-signal run.
/// Chunk length is `ceil(len / n_chunks)`; the last chunk may be shorter.
pub fn evaluate_chunks<B: Backend, M: EffectModel<B>>(
    model: &M,
    input: &[f32],
    target: &[f32],
    cond: Option<&[f32]>,
    n_chunks: usize,
) -> Result<ChunkedMetrics> {
    if input.len() != target.len() {
        return Err(CoreError::ShapeMismatch {
            what: "evaluation target",
            expected: vec![input.len()],
            actual: vec![target.len()],
        }
        .into());
    }
    if input.is_empty() || n_chunks == 0 {
        return Err(CoreError::InvalidConfig(
            "evaluation needs a non-empty signal and at least one chunk".into(),
        )
        .into());
    }

    let device = model.device();
    let history = model.receptive_field() - 1;
    let len = input.len();
    let x = pad_left(audio_tensor::<B>(input, [1, 1, len], &device)?, history);
    let y = audio_tensor::<B>(target, [1, 1, len], &device)?;
    let cond = shared_cond::<B>(cond, model.cond_dim(), &device)?;

    let chunk_len = len.div_ceil(n_chunks);
    let mut chunks = Vec::new();
    for start in (0..len).step_by(chunk_len) {
        let end = (start + chunk_len).min(len);
        let pred = model.forward(x.clone().slice([0..1, 0..1, start..end + history]), cond.clone())?;
        let target = y.clone().slice([0..1, 0..1, start..end]);
        chunks.push(SignalMetrics {
            mse: scalar(mse(pred.clone(), target.clone())),
            esr: scalar(esr(pred, target)),
        });
    }

    let n = chunks.len() as f64;
    let mean_mse = chunks.iter().map(|c| c.mse).sum::<f64>() / n;
    let mean_esr = chunks.iter().map(|c| c.esr).sum::<f64>() / n;
    tracing::debug!(chunks = chunks.len(), mean_mse, mean_esr, "Evaluated signal");
    Ok(ChunkedMetrics {
        chunks,
        mean_mse,
        mean_esr,
    })
}

//! Conversion between flat loader data and device tensors.

use burn::prelude::*;
use burn::tensor::TensorData;
use tonewell_core::{AudioBatch, Conditioning, Error as CoreError};

use crate::error::{Error, Result};

/// Build a `[batch, channel, time]` tensor from flat data.
pub fn audio_tensor<B: Backend>(
    data: &[f32],
    shape: [usize; 3],
    device: &B::Device,
) -> Result<Tensor<B, 3>> {
    let expected = shape.iter().product::<usize>();
    if data.len() != expected {
        return Err(CoreError::ShapeMismatch {
            what: "audio data",
            expected: shape.to_vec(),
            actual: vec![data.len()],
        }
        .into());
    }
    Ok(Tensor::from_data(TensorData::new(data.to_vec(), shape), device))
}

/// Build a `[batch, 1, cond_dim]` conditioning tensor.
pub fn cond_tensor<B: Backend>(cond: &Conditioning, device: &B::Device) -> Result<Tensor<B, 3>> {
    audio_tensor(&cond.values, [cond.batch, 1, cond.dim], device)
}

/// Input, target, and conditioning tensors of one batch.
///
/// A model with `cond_dim > 0` fed a batch without conditioning receives zeros.
pub fn batch_tensors<B: Backend>(
    batch: &AudioBatch,
    cond_dim: usize,
    device: &B::Device,
) -> Result<(Tensor<B, 3>, Tensor<B, 3>, Option<Tensor<B, 3>>)> {
    let input = audio_tensor(&batch.input, batch.shape, device)?;
    let target = audio_tensor(&batch.target, batch.shape, device)?;
    let cond = match (&batch.cond, cond_dim) {
        (_, 0) => None,
        (Some(c), _) => Some(cond_tensor(c, device)?),
        (None, dim) => Some(cond_tensor(&Conditioning::zeros(dim), device)?),
    };
    Ok((input, target, cond))
}

/// One conditioning vector shared by every batch item, or zeros when absent.
///
/// Returns `None` for models without a conditioning path.
pub fn shared_cond<B: Backend>(
    values: Option<&[f32]>,
    cond_dim: usize,
    device: &B::Device,
) -> Result<Option<Tensor<B, 3>>> {
    if cond_dim == 0 {
        return Ok(None);
    }
    let cond = match values {
        Some(v) => Conditioning::shared(v.to_vec()),
        None => Conditioning::zeros(cond_dim),
    };
    cond_tensor(&cond, device).map(Some)
}

/// Copy a tensor back to host memory.
pub fn to_vec<B: Backend, const D: usize>(x: Tensor<B, D>) -> Result<Vec<f32>> {
    x.into_data()
        .to_vec::<f32>()
        .map_err(|e| Error::TensorData(format!("{:?}", e)))
}

/// Read a single-element tensor as `f64`.
pub fn scalar<B: Backend>(x: Tensor<B, 1>) -> f64 {
    use burn::tensor::ElementConversion;
    x.into_scalar().elem::<f64>()
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::ndarray::NdArrayDevice;
    use burn::backend::NdArray;

    type TestBackend = NdArray<f32>;

    #[test]
    fn test_round_trip() {
        let device = NdArrayDevice::default();
        let data: Vec<f32> = (0..6).map(|i| i as f32).collect();
        let x = audio_tensor::<TestBackend>(&data, [1, 2, 3], &device).unwrap();
        assert_eq!(x.dims(), [1, 2, 3]);
        assert_eq!(to_vec(x).unwrap(), data);
    }

    #[test]
    fn test_wrong_length() {
        let device = NdArrayDevice::default();
        let err = audio_tensor::<TestBackend>(&[0.0; 5], [1, 2, 3], &device).unwrap_err();
        assert!(err.is_config());
    }

    #[test]
    fn test_missing_conditioning_is_zero() {
        let device = NdArrayDevice::default();
        let batch = AudioBatch::new(vec![0.0; 4], vec![0.0; 4], [1, 1, 4]).unwrap();
        let (_, _, cond) = batch_tensors::<TestBackend>(&batch, 2, &device).unwrap();
        let cond = cond.unwrap();
        assert_eq!(cond.dims(), [1, 1, 2]);
        assert_eq!(to_vec(cond).unwrap(), vec![0.0, 0.0]);

        let (_, _, cond) = batch_tensors::<TestBackend>(&batch, 0, &device).unwrap();
        assert!(cond.is_none());
    }
}

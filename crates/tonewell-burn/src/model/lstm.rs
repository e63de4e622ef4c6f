//! Recurrent model with a causal convolutional front-end.

use burn::nn::conv::{Conv1d, Conv1dConfig};
use burn::nn::{Linear, LinearConfig, Lstm, LstmConfig, PaddingConfig1d};
use burn::prelude::*;
use tonewell_core::{Error, LstmConvSkipParams};

use super::{prepare_input, EffectModel, InputSpec};
use crate::crop::crop_tail;

/// `conv -> lstm^n -> linear`, plus an optional 1×1 skip from the input.
///
/// The front-end convolution is unpadded, so output length follows the same
/// `T - (kernel_size - 1)` law as the convolutional families. The recurrent
/// state starts at zero for every call.
#[derive(Module, Debug)]
pub struct LstmConvSkip<B: Backend> {
    front: Conv1d<B>,
    layers: Vec<Lstm<B>>,
    head: Linear<B>,
    skip: Option<Conv1d<B>>,
    n_inputs: usize,
    receptive_field: usize,
}

impl<B: Backend> LstmConvSkip<B> {
    pub fn new(params: &LstmConvSkipParams, device: &B::Device) -> Self {
        let layers = (0..params.n_layers)
            .map(|_| LstmConfig::new(params.hidden_size, params.hidden_size, true).init(device))
            .collect();
        Self {
            front: Conv1dConfig::new(params.n_inputs, params.hidden_size, params.kernel_size)
                .with_padding(PaddingConfig1d::Valid)
                .init(device),
            layers,
            head: LinearConfig::new(params.hidden_size, params.n_outputs).init(device),
            skip: params.use_skip.then(|| {
                Conv1dConfig::new(params.n_inputs, params.n_outputs, 1)
                    .with_bias(false)
                    .init(device)
            }),
            n_inputs: params.n_inputs,
            receptive_field: params.kernel_size,
        }
    }
}

impl<B: Backend> EffectModel<B> for LstmConvSkip<B> {
    fn forward(&self, x: Tensor<B, 3>, _cond: Option<Tensor<B, 3>>) -> Result<Tensor<B, 3>, Error> {
        let spec = InputSpec {
            n_inputs: self.n_inputs,
            cond_dim: 0,
            receptive_field: self.receptive_field,
        };
        prepare_input(&x, None, spec, &self.device())?;

        // [batch, hidden, time] -> [batch, time, hidden]
        let features = self.front.forward(x.clone()).swap_dims(1, 2);
        let length = features.dims()[1];
        let hidden = self
            .layers
            .iter()
            .fold(features, |h, lstm| lstm.forward(h, None).0);
        let y = self.head.forward(hidden).swap_dims(1, 2);

        Ok(match &self.skip {
            Some(skip) => y + skip.forward(crop_tail(x, length)),
            None => y,
        })
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
        self.front.weight.device()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::ndarray::NdArrayDevice;
    use burn::backend::NdArray;

    type TestBackend = NdArray<f32>;

    fn params(use_skip: bool) -> LstmConvSkipParams {
        LstmConvSkipParams {
            n_inputs: 1,
            n_outputs: 1,
            hidden_size: 6,
            n_layers: 2,
            kernel_size: 4,
            use_skip,
        }
    }

    #[test]
    fn test_output_length() {
        let device = NdArrayDevice::default();
        for use_skip in [true, false] {
            let model = LstmConvSkip::<TestBackend>::new(&params(use_skip), &device);
            let y = model
                .forward(Tensor::ones([3, 1, 25], &device), None)
                .unwrap();
            assert_eq!(y.dims(), [3, 1, 22]);
        }
    }

    #[test]
    fn test_recurrence_is_causal() {
        let device = NdArrayDevice::default();
        let model = LstmConvSkip::<TestBackend>::new(&params(true), &device);
        let base: Vec<f32> = (0..16).map(|i| (i as f32 * 0.7).cos()).collect();
        let mut changed = base.clone();
        changed[15] = -2.0;

        let run = |data: &[f32]| {
            let x = Tensor::<TestBackend, 1>::from_floats(data, &device).reshape([1, 1, 16]);
            model.forward(x, None).unwrap().into_data().to_vec::<f32>().unwrap()
        };
        let a = run(&base);
        let b = run(&changed);
        assert_eq!(a[..a.len() - 1], b[..b.len() - 1]);
        assert_ne!(a[a.len() - 1], b[b.len() - 1]);
    }
}

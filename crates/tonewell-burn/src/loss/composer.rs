use burn::prelude::*;
use tonewell_core::{Error, LossSpec, LossTermKind};

use super::stft::{MultiResolutionStft, Stft};
use super::{esr, mae, mse};
use crate::tensor::scalar;

/// Result of one criterion evaluation.
#[derive(Debug, Clone)]
pub struct LossOutput<B: Backend> {
    /// Weighted sum of the criterion terms; backpropagate through this.
    pub objective: Tensor<B, 1>,
    /// Error-to-signal ratio of the same batch, computed without gradients.
    pub metric: f64,
}

#[derive(Debug, Clone)]
enum Term<B: Backend> {
    Stft(Stft<B>),
    MultiResolutionStft(MultiResolutionStft<B>),
    Mae,
    Mse,
    Esr,
}

impl<B: Backend> Term<B> {
    fn new(kind: &LossTermKind, device: &B::Device) -> Self {
        match kind {
            LossTermKind::Stft { resolution } => Term::Stft(Stft::new(*resolution, device)),
            LossTermKind::MultiResolutionStft { resolutions } => {
                Term::MultiResolutionStft(MultiResolutionStft::new(resolutions, device))
            }
            LossTermKind::Mae => Term::Mae,
            LossTermKind::Mse => Term::Mse,
            LossTermKind::Esr => Term::Esr,
        }
    }

    fn eval(&self, pred: Tensor<B, 3>, target: Tensor<B, 3>) -> Tensor<B, 1> {
        match self {
            Term::Stft(stft) => stft.loss(pred, target),
            Term::MultiResolutionStft(mrstft) => mrstft.loss(pred, target),
            Term::Mae => mae(pred, target),
            Term::Mse => mse(pred, target),
            Term::Esr => esr(pred, target),
        }
    }
}

/// Weighted sum of loss terms resolved for one device.
#[derive(Debug, Clone)]
pub struct LossComposer<B: Backend> {
    terms: Vec<(f32, Term<B>)>,
    label: String,
    device: B::Device,
}

impl<B: Backend> LossComposer<B> {
    pub fn from_spec(spec: &LossSpec, device: &B::Device) -> Result<Self, Error> {
        spec.validate()?;
        let terms = spec
            .terms
            .iter()
            .map(|t| (t.weight, Term::new(&t.term, device)))
            .collect();
        Ok(Self {
            terms,
            label: spec.label(),
            device: device.clone(),
        })
    }

    /// Parse and resolve a criterion string such as `"mae+mrstft"`.
    pub fn parse(criterion: &str, device: &B::Device) -> Result<Self, Error> {
        Self::from_spec(&criterion.parse()?, device)
    }

    /// Name used in telemetry tags.
    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn compute(&self, pred: Tensor<B, 3>, target: Tensor<B, 3>) -> Result<LossOutput<B>, Error> {
        if pred.dims() != target.dims() {
            return Err(Error::ShapeMismatch {
                what: "prediction vs target",
                expected: target.dims().to_vec(),
                actual: pred.dims().to_vec(),
            });
        }
        for (what, device) in [("prediction", pred.device()), ("target", target.device())] {
            if device != self.device {
                return Err(Error::DeviceMismatch(format!(
                    "{} on {:?}, criterion on {:?}",
                    what, device, self.device
                )));
            }
        }

        let metric = scalar(esr(pred.clone().detach(), target.clone().detach()));
        let objective = self
            .terms
            .iter()
            .map(|(weight, term)| {
                let value = term.eval(pred.clone(), target.clone());
                if *weight == 1.0 {
                    value
                } else {
                    value.mul_scalar(*weight)
                }
            })
            .reduce(|acc, v| acc + v)
            .unwrap_or_else(|| Tensor::zeros([1], &self.device));

        Ok(LossOutput { objective, metric })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::ndarray::NdArrayDevice;
    use burn::backend::{Autodiff, NdArray};

    type TestBackend = NdArray<f32>;

    fn noise(len: usize, device: &NdArrayDevice) -> Tensor<TestBackend, 3> {
        let data: Vec<f32> = (0..len)
            .map(|i| ((i * 7919 % 113) as f32 / 56.5) - 1.0)
            .collect();
        Tensor::<TestBackend, 1>::from_floats(data.as_slice(), device).reshape([1, 1, len])
    }

    #[test]
    fn test_weighted_sum() {
        let device = NdArrayDevice::default();
        let target = noise(64, &device);
        let pred = target.clone().add_scalar(0.1);

        let single = LossComposer::<TestBackend>::parse("mae", &device).unwrap();
        let weighted = LossComposer::<TestBackend>::parse("2*mae+mse", &device).unwrap();
        let a = scalar(single.compute(pred.clone(), target.clone()).unwrap().objective);
        let b = scalar(weighted.compute(pred, target).unwrap().objective);
        approx::assert_abs_diff_eq!(a, 0.1, epsilon = 1e-5);
        approx::assert_abs_diff_eq!(b, 0.2 + 0.01, epsilon = 1e-5);
        assert_eq!(weighted.label(), "2*mae+mse");
    }

    #[test]
    fn test_metric_is_esr() {
        let device = NdArrayDevice::default();
        let composer = LossComposer::<TestBackend>::parse("mae+mrstft", &device).unwrap();
        let target = noise(256, &device);
        let out = composer.compute(target.zeros_like(), target.clone()).unwrap();
        approx::assert_abs_diff_eq!(out.metric, 1.0, epsilon = 1e-6);
        let out = composer.compute(target.clone(), target).unwrap();
        approx::assert_abs_diff_eq!(out.metric, 0.0);
    }

    #[test]
    fn test_unknown_term() {
        let device = NdArrayDevice::default();
        assert!(matches!(
            LossComposer::<TestBackend>::parse("mae+huber", &device),
            Err(Error::UnknownLossTerm(_))
        ));
    }

    #[test]
    fn test_shape_mismatch() {
        let device = NdArrayDevice::default();
        let composer = LossComposer::<TestBackend>::parse("mse", &device).unwrap();
        assert!(matches!(
            composer.compute(noise(32, &device), noise(31, &device)),
            Err(Error::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_spectral_terms_are_differentiable() {
        type Ad = Autodiff<TestBackend>;
        let device = NdArrayDevice::default();
        let composer = LossComposer::<Ad>::parse("stft+mrstft", &device).unwrap();
        let target = Tensor::<Ad, 3>::from_inner(noise(2048, &device));
        let pred = Tensor::<Ad, 3>::from_inner(noise(2048, &device).mul_scalar(0.5)).require_grad();

        let out = composer.compute(pred.clone(), target).unwrap();
        let grads = out.objective.backward();
        let grad = pred.grad(&grads).unwrap();
        let norm = scalar(grad.clone().abs().sum());
        assert!(norm.is_finite());
        assert!(norm > 0.0);
    }
}

//! Sequence models mapping a dry waveform to a predicted wet waveform.
//!
//! Every family implements [`EffectModel`]: an unpadded causal forward pass whose
//! output is `receptive_field - 1` samples shorter than its input. [`Network`]
//! is the tagged factory that builds the right family from a [`ModelKind`].

mod conv_block;
mod film;
mod gcn;
mod lstm;
mod tcn;
mod wavenet;

pub use conv_block::{ConvBlock, ConvBlockConfig};
pub use film::Film;
pub use gcn::{GatedLayer, Gcn};
pub use lstm::LstmConvSkip;
pub use tcn::Tcn;
pub use wavenet::{WaveNet, WaveNetLayer};

use burn::prelude::*;
use tonewell_core::{Error, ModelKind};

/// Forward contract shared by all model families.
pub trait EffectModel<B: Backend> {
    /// Run the model over `x: [batch, n_inputs, time]`.
    ///
    /// `cond` is `[batch or 1, 1, cond_dim]` and is ignored by models without a
    /// conditioning path. Fails on short input, channel or conditioning shape
    /// mismatch, and tensors living on another device.
    fn forward(&self, x: Tensor<B, 3>, cond: Option<Tensor<B, 3>>) -> Result<Tensor<B, 3>, Error>;

    fn receptive_field(&self) -> usize;

    fn n_inputs(&self) -> usize;

    fn cond_dim(&self) -> usize;

    /// Device holding the parameters.
    fn device(&self) -> B::Device;
}

/// Static facts about a model's expected input.
#[derive(Debug, Clone, Copy)]
pub(crate) struct InputSpec {
    pub n_inputs: usize,
    pub cond_dim: usize,
    pub receptive_field: usize,
}

/// Validate `x` and normalize `cond` to `[batch, 1, cond_dim]`.
pub(crate) fn prepare_input<B: Backend>(
    x: &Tensor<B, 3>,
    cond: Option<Tensor<B, 3>>,
    spec: InputSpec,
    device: &B::Device,
) -> Result<Option<Tensor<B, 3>>, Error> {
    let input_device = x.device();
    if input_device != *device {
        return Err(Error::DeviceMismatch(format!(
            "input on {:?}, model on {:?}",
            input_device, device
        )));
    }

    let [batch, channels, time] = x.dims();
    if channels != spec.n_inputs {
        return Err(Error::ShapeMismatch {
            what: "input channels",
            expected: vec![spec.n_inputs],
            actual: vec![channels],
        });
    }
    if time < spec.receptive_field {
        return Err(Error::SequenceTooShort {
            length: time,
            receptive_field: spec.receptive_field,
        });
    }

    if spec.cond_dim == 0 {
        return Ok(None);
    }
    let cond = cond.ok_or_else(|| {
        Error::InvalidConfig(format!(
            "model expects {} conditioning values, none given",
            spec.cond_dim
        ))
    })?;
    if cond.device() != *device {
        return Err(Error::DeviceMismatch(format!(
            "conditioning on {:?}, model on {:?}",
            cond.device(),
            device
        )));
    }
    let [cond_batch, one, dim] = cond.dims();
    if one != 1 || dim != spec.cond_dim || (cond_batch != 1 && cond_batch != batch) {
        return Err(Error::ShapeMismatch {
            what: "conditioning",
            expected: vec![batch, 1, spec.cond_dim],
            actual: vec![cond_batch, one, dim],
        });
    }
    if cond_batch == batch {
        Ok(Some(cond))
    } else {
        Ok(Some(cond.expand([batch, 1, dim])))
    }
}

/// Any model family, resolved once from a [`ModelKind`].
#[derive(Module, Debug)]
pub enum Network<B: Backend> {
    Tcn(Tcn<B>),
    Gcn(Gcn<B>),
    WaveNet(WaveNet<B>),
    LstmConvSkip(LstmConvSkip<B>),
}

impl<B: Backend> Network<B> {
    pub fn init(kind: &ModelKind, device: &B::Device) -> Result<Self, Error> {
        kind.validate()?;
        let network = match kind {
            ModelKind::Tcn(p) => Network::Tcn(Tcn::new(p, device)),
            ModelKind::Gcn(p) => Network::Gcn(Gcn::new(p, device)),
            ModelKind::WaveNet(p) => Network::WaveNet(WaveNet::new(p, device)),
            ModelKind::LstmConvSkip(p) => Network::LstmConvSkip(LstmConvSkip::new(p, device)),
        };
        tracing::debug!(
            kind = kind.name(),
            receptive_field = kind.receptive_field(),
            params = network.num_params(),
            "Built network"
        );
        Ok(network)
    }

    fn inner(&self) -> &dyn EffectModel<B> {
        match self {
            Network::Tcn(m) => m,
            Network::Gcn(m) => m,
            Network::WaveNet(m) => m,
            Network::LstmConvSkip(m) => m,
        }
    }
}

impl<B: Backend> EffectModel<B> for Network<B> {
    fn forward(&self, x: Tensor<B, 3>, cond: Option<Tensor<B, 3>>) -> Result<Tensor<B, 3>, Error> {
        self.inner().forward(x, cond)
    }

    fn receptive_field(&self) -> usize {
        self.inner().receptive_field()
    }

    fn n_inputs(&self) -> usize {
        self.inner().n_inputs()
    }

    fn cond_dim(&self) -> usize {
        self.inner().cond_dim()
    }

    fn device(&self) -> B::Device {
        self.inner().device()
    }
}

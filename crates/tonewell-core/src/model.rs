//! Model topologies.
//!
//! [`ModelKind`] is a closed set of model families. Each variant carries its own
//! parameter record and fully determines the network topology, so a record
//! stored next to a checkpoint is enough to rebuild the network.

use crate::receptive::{checked_receptive_field, receptive_field, DilationSchedule};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// Temporal convolutional network: a chain of dilated conv blocks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TcnParams {
    #[serde(default = "one")]
    pub n_inputs: usize,
    #[serde(default = "one")]
    pub n_outputs: usize,
    pub n_blocks: usize,
    pub kernel_size: usize,
    pub n_channels: usize,
    #[serde(default)]
    pub dilation: DilationSchedule,
    #[serde(default)]
    pub cond_dim: usize,
    #[serde(default = "yes")]
    pub residual: bool,
}

/// Gated convolutional network: blocks of gated dilated layers with skip outputs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GcnParams {
    #[serde(default = "one")]
    pub n_inputs: usize,
    #[serde(default = "one")]
    pub n_outputs: usize,
    pub n_blocks: usize,
    pub n_layers: usize,
    pub n_channels: usize,
    pub kernel_size: usize,
    /// Layer `l` of every block uses dilation `dilation_depth^l`.
    pub dilation_depth: usize,
    #[serde(default)]
    pub cond_dim: usize,
}

/// WaveNet with power-of-two dilations repeated `n_repeat` times.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaveNetParams {
    #[serde(default = "one")]
    pub n_inputs: usize,
    #[serde(default = "one")]
    pub n_outputs: usize,
    pub n_channels: usize,
    pub dilation_depth: usize,
    pub n_repeat: usize,
    pub kernel_size: usize,
}

/// Causal conv front-end feeding a stacked LSTM, with an optional input skip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LstmConvSkipParams {
    #[serde(default = "one")]
    pub n_inputs: usize,
    #[serde(default = "one")]
    pub n_outputs: usize,
    pub hidden_size: usize,
    pub n_layers: usize,
    pub kernel_size: usize,
    #[serde(default = "yes")]
    pub use_skip: bool,
}

fn one() -> usize {
    1
}

fn yes() -> bool {
    true
}

/// Model family with its parameter record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum ModelKind {
    Tcn(TcnParams),
    Gcn(GcnParams),
    WaveNet(WaveNetParams),
    LstmConvSkip(LstmConvSkipParams),
}

impl TcnParams {
    pub fn dilations(&self) -> Vec<usize> {
        self.dilation.dilations(self.n_blocks)
    }
}

impl GcnParams {
    pub fn dilations(&self) -> Vec<usize> {
        let layer = DilationSchedule::Monotonic {
            growth: self.dilation_depth,
        };
        (0..self.n_blocks)
            .flat_map(|_| layer.dilations(self.n_layers))
            .collect()
    }
}

impl WaveNetParams {
    pub fn dilations(&self) -> Vec<usize> {
        let layer = DilationSchedule::Monotonic { growth: 2 };
        (0..self.n_repeat)
            .flat_map(|_| layer.dilations(self.dilation_depth))
            .collect()
    }
}

impl ModelKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Tcn(_) => "TCN",
            Self::Gcn(_) => "GCN",
            Self::WaveNet(_) => "WaveNet",
            Self::LstmConvSkip(_) => "LstmConvSkip",
        }
    }

    pub fn n_inputs(&self) -> usize {
        match self {
            Self::Tcn(p) => p.n_inputs,
            Self::Gcn(p) => p.n_inputs,
            Self::WaveNet(p) => p.n_inputs,
            Self::LstmConvSkip(p) => p.n_inputs,
        }
    }

    pub fn n_outputs(&self) -> usize {
        match self {
            Self::Tcn(p) => p.n_outputs,
            Self::Gcn(p) => p.n_outputs,
            Self::WaveNet(p) => p.n_outputs,
            Self::LstmConvSkip(p) => p.n_outputs,
        }
    }

    /// Conditioning dimension; families without a conditioning path report 0.
    pub fn cond_dim(&self) -> usize {
        match self {
            Self::Tcn(p) => p.cond_dim,
            Self::Gcn(p) => p.cond_dim,
            Self::WaveNet(_) | Self::LstmConvSkip(_) => 0,
        }
    }

    /// Per-layer dilations of the convolutional stack, in forward order.
    pub fn dilations(&self) -> Vec<usize> {
        match self {
            Self::Tcn(p) => p.dilations(),
            Self::Gcn(p) => p.dilations(),
            Self::WaveNet(p) => p.dilations(),
            Self::LstmConvSkip(_) => vec![1],
        }
    }

    pub fn kernel_size(&self) -> usize {
        match self {
            Self::Tcn(p) => p.kernel_size,
            Self::Gcn(p) => p.kernel_size,
            Self::WaveNet(p) => p.kernel_size,
            Self::LstmConvSkip(p) => p.kernel_size,
        }
    }

    /// Closed-form receptive field.
    ///
    /// For the LSTM family this is the context consumed by the convolutional
    /// front-end; the recurrent state reaches further back.
    pub fn receptive_field(&self) -> usize {
        receptive_field(self.kernel_size(), &self.dilations())
    }

    pub fn validate(&self) -> Result<()> {
        let positive = |name: &str, value: usize| {
            if value == 0 {
                Err(Error::InvalidConfig(format!(
                    "{}: {} must be at least 1",
                    self.name(),
                    name
                )))
            } else {
                Ok(())
            }
        };

        positive("n_inputs", self.n_inputs())?;
        positive("n_outputs", self.n_outputs())?;
        positive("kernel_size", self.kernel_size())?;

        match self {
            Self::Tcn(p) => {
                positive("n_blocks", p.n_blocks)?;
                positive("n_channels", p.n_channels)?;
                p.dilation.validate()?;
            }
            Self::Gcn(p) => {
                positive("n_blocks", p.n_blocks)?;
                positive("n_layers", p.n_layers)?;
                positive("n_channels", p.n_channels)?;
                positive("dilation_depth", p.dilation_depth)?;
            }
            Self::WaveNet(p) => {
                positive("n_channels", p.n_channels)?;
                positive("dilation_depth", p.dilation_depth)?;
                positive("n_repeat", p.n_repeat)?;
            }
            Self::LstmConvSkip(p) => {
                positive("hidden_size", p.hidden_size)?;
                positive("n_layers", p.n_layers)?;
            }
        }

        self.checked_dilations()
            .and_then(|d| checked_receptive_field(self.kernel_size(), &d))
            .ok_or_else(|| {
                Error::InvalidConfig(format!(
                    "{}: dilations or receptive field overflow",
                    self.name()
                ))
            })?;
        Ok(())
    }

    fn checked_dilations(&self) -> Option<Vec<usize>> {
        let repeated = |layer: DilationSchedule, per_block: usize, blocks: usize| -> Option<Vec<usize>> {
            let block = layer.checked_dilations(per_block)?;
            let total = block.len().checked_mul(blocks)?;
            Some(block.iter().copied().cycle().take(total).collect())
        };
        match self {
            Self::Tcn(p) => p.dilation.checked_dilations(p.n_blocks),
            Self::Gcn(p) => repeated(
                DilationSchedule::Monotonic {
                    growth: p.dilation_depth,
                },
                p.n_layers,
                p.n_blocks,
            ),
            Self::WaveNet(p) => repeated(
                DilationSchedule::Monotonic { growth: 2 },
                p.dilation_depth,
                p.n_repeat,
            ),
            Self::LstmConvSkip(_) => Some(vec![1]),
        }
    }
}

//! Named presets: a model topology plus the criterion it is trained with.
//!
//! Presets come from the built-in catalog or from a TOML file:
//!
//! ```toml
//! [[preset]]
//! name = "tcn-small"
//! criterion = "mae+mrstft"
//!
//! [preset.model]
//! kind = "tcn"
//! n_blocks = 4
//! kernel_size = 5
//! n_channels = 16
//! ```

use crate::loss::LossSpec;
use crate::model::{GcnParams, LstmConvSkipParams, ModelKind, TcnParams, WaveNetParams};
use crate::receptive::DilationSchedule;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Preset {
    pub name: String,
    pub model: ModelKind,
    #[serde(default = "default_criterion")]
    pub criterion: String,
}

fn default_criterion() -> String {
    "mrstft".to_string()
}

impl Preset {
    pub fn new(name: impl Into<String>, model: ModelKind, criterion: &str) -> Self {
        Self {
            name: name.into(),
            model,
            criterion: criterion.to_string(),
        }
    }

    /// Parse the criterion string.
    pub fn loss_spec(&self) -> Result<LossSpec> {
        self.criterion.parse()
    }

    pub fn validate(&self) -> Result<()> {
        self.model.validate()?;
        self.loss_spec().map(|_| ())
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct PresetFile {
    #[serde(default)]
    preset: Vec<Preset>,
}

/// Lookup table of presets by name.
#[derive(Debug, Clone, Default)]
pub struct PresetCatalog {
    presets: Vec<Preset>,
}

impl PresetCatalog {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Catalog of the built-in presets.
    pub fn builtin() -> Self {
        Self {
            presets: builtin_presets(),
        }
    }

    /// Load presets from a TOML string.
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let file: PresetFile = toml::from_str(contents)?;
        for preset in &file.preset {
            preset.validate()?;
        }
        Ok(Self {
            presets: file.preset,
        })
    }

    pub fn from_toml_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    /// Add or replace a preset.
    pub fn insert(&mut self, preset: Preset) -> Result<()> {
        preset.validate()?;
        match self.presets.iter_mut().find(|p| p.name == preset.name) {
            Some(existing) => *existing = preset,
            None => self.presets.push(preset),
        }
        Ok(())
    }

    /// Merge another catalog on top of this one.
    pub fn extend(&mut self, other: PresetCatalog) -> Result<()> {
        other.presets.into_iter().try_for_each(|p| self.insert(p))
    }

    pub fn get(&self, name: &str) -> Result<&Preset> {
        self.presets
            .iter()
            .find(|p| p.name == name)
            .ok_or_else(|| Error::UnknownPreset(name.to_string()))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.presets.iter().map(|p| p.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.presets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.presets.is_empty()
    }
}

fn tcn(n_blocks: usize, kernel_size: usize, n_channels: usize, growth: usize) -> ModelKind {
    ModelKind::Tcn(TcnParams {
        n_inputs: 1,
        n_outputs: 1,
        n_blocks,
        kernel_size,
        n_channels,
        dilation: DilationSchedule::stacked(growth),
        cond_dim: 0,
        residual: true,
    })
}

fn gcn(n_layers: usize, kernel_size: usize, dilation_depth: usize) -> ModelKind {
    ModelKind::Gcn(GcnParams {
        n_inputs: 1,
        n_outputs: 1,
        n_blocks: 1,
        n_layers,
        n_channels: 16,
        kernel_size,
        dilation_depth,
        cond_dim: 0,
    })
}

fn wavenet(dilation_depth: usize, n_repeat: usize) -> ModelKind {
    ModelKind::WaveNet(WaveNetParams {
        n_inputs: 1,
        n_outputs: 1,
        n_channels: 16,
        dilation_depth,
        n_repeat,
        kernel_size: 3,
    })
}

fn lstm(hidden_size: usize, n_layers: usize) -> ModelKind {
    ModelKind::LstmConvSkip(LstmConvSkipParams {
        n_inputs: 1,
        n_outputs: 1,
        hidden_size,
        n_layers,
        kernel_size: 3,
        use_skip: true,
    })
}

fn builtin_presets() -> Vec<Preset> {
    vec![
        Preset::new("tcn-baseline", tcn(5, 9, 32, 10), "mrstft"),
        Preset::new("tcn-4000", tcn(5, 19, 32, 10), "mae+mrstft"),
        Preset::new("gcn-250", gcn(4, 41, 6), "mae+mrstft"),
        Preset::new("gcn-2500", gcn(10, 5, 3), "mrstft"),
        Preset::new("wavenet-10", wavenet(10, 1), "mae+mrstft"),
        Preset::new("wavenet-18", wavenet(9, 2), "mae+mrstft"),
        Preset::new("wavenet-24", wavenet(8, 3), "mae+mrstft"),
        Preset::new("lstm-cs-32", lstm(32, 2), "mae+mrstft"),
        Preset::new("lstm-cs-96", lstm(96, 1), "mae+mrstft"),
    ]
}

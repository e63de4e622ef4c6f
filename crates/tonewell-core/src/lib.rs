//! Framework-agnostic core of tonewell.
//!
//! Everything needed to describe a training run without touching an ML framework:
//!
//! - [`ModelKind`]: closed set of model families with their parameter records
//! - [`DilationSchedule`] and [`receptive_field`]: closed-form context sizes
//! - [`LossSpec`]: weighted criterion terms parsed from strings like `"mae+mrstft"`
//! - [`PresetCatalog`]: named model + criterion pairs, built in or loaded from TOML
//! - [`TrainingConfig`], [`MultiStepLr`], [`BestTracker`]: run hyperparameters,
//!   learning-rate schedule, and checkpoint selection
//! - [`AudioBatch`] / [`BatchSource`]: the data-loader boundary
//! - [`TelemetrySink`]: per-epoch scalar output
//!
//! The tensor implementation lives in `tonewell-burn`.

pub mod error;
pub use error::{Error, Result};

pub mod batch;
pub use batch::{AudioBatch, BatchSource, Conditioning, VecBatches};

pub mod config;
pub use config::TrainingConfig;

pub mod loss;
pub use loss::{LossSpec, LossTermKind, StftResolution, WeightedTerm};

pub mod model;
pub use model::{GcnParams, LstmConvSkipParams, ModelKind, TcnParams, WaveNetParams};

pub mod preset;
pub use preset::{Preset, PresetCatalog};

pub mod receptive;
pub use receptive::{
    causal_padding, checked_receptive_field, output_length, receptive_field, DilationSchedule,
};

pub mod schedule;
pub use schedule::MultiStepLr;

pub mod selection;
pub use selection::BestTracker;

pub mod telemetry;
pub use telemetry::{
    FanoutSink, JsonLinesSink, MemorySink, ScalarRecord, TelemetrySink, TracingSink,
};

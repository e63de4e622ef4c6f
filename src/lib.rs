//! # Tonewell - Neural Audio-Effect Modeling
//!
//! Train causal neural networks to imitate analog audio effects from paired
//! dry/wet recordings.
//!
//! ## Architecture
//!
//! Tonewell is an umbrella crate that coordinates:
//! - **tonewell-core** - Model topologies, receptive fields, presets, criteria,
//!   schedules, checkpoint selection, batches, telemetry (no ML framework)
//! - **tonewell-burn** - Burn models, spectral losses, trainer, checkpoint store,
//!   rendering and evaluation
//!
//! ## Quick Start
//!
//! ```ignore
//! use tonewell::prelude::*;
//!
//! let ctx = initialize_run::<CpuAutodiffBackend>(42, cpu_device());
//! let preset = PresetCatalog::builtin().get("tcn-baseline")?.clone();
//! let model = Network::init(&preset.model, &ctx.device)?;
//!
//! let mut trainer = Trainer::from_preset(&preset, TrainingConfig::default(), &ctx.device)?
//!     .with_checkpoints(CheckpointStore::open("runs/tcn-baseline")?);
//! let trained = trainer.fit(model, AdamConfig::new().init(), &train, &valid)?;
//!
//! let wet = render(&trained.model.valid(), &[dry], None, &RenderOptions::default())?;
//! ```
//!
//! ## Feature Flags
//!
//! - `default` - Core types and the Burn CPU implementation
//! - `burn` - Burn implementation (NdArray + autodiff)
//! - `gpu` - wgpu backend for training and inference

/// Re-export of tonewell-core for direct access
pub use tonewell_core as core;

pub use tonewell_core::{
    causal_padding, output_length, receptive_field, AudioBatch, BatchSource, BestTracker,
    Conditioning, DilationSchedule, FanoutSink, GcnParams, JsonLinesSink, LossSpec, LossTermKind,
    LstmConvSkipParams, MemorySink, ModelKind, MultiStepLr, Preset, PresetCatalog, ScalarRecord,
    StftResolution, TcnParams, TelemetrySink, TracingSink, TrainingConfig, VecBatches,
    WaveNetParams,
};

#[cfg(feature = "burn")]
pub use tonewell_burn as nn;

#[cfg(feature = "burn")]
pub use tonewell_burn::{
    causal_crop, cpu_device, evaluate_chunks, evaluate_signal, initialize_run, render,
    CheckpointError, CheckpointHandle, CheckpointMetadata, CheckpointStore, ChunkedMetrics,
    CpuAutodiffBackend, CpuBackend, DevicePlacement, EffectModel, EpochStats, LossComposer,
    LossOutput, Network, Phase, RenderOptions, Retention, RunContext, SignalMetrics, StopHandle,
    Trained, Trainer, TrainingReport,
};

mod error;
pub use error::{Error, Result};

/// Convenient imports for the common training and inference workflow.
pub mod prelude {
    pub use crate::{Error, Result};

    pub use tonewell_core::{
        AudioBatch, BatchSource, Conditioning, LossSpec, ModelKind, PresetCatalog,
        TelemetrySink, TrainingConfig, VecBatches,
    };

    #[cfg(feature = "burn")]
    pub use tonewell_burn::burn::module::AutodiffModule;
    #[cfg(feature = "burn")]
    pub use tonewell_burn::burn::optim::AdamConfig;
    #[cfg(feature = "burn")]
    pub use tonewell_burn::{
        cpu_device, initialize_run, render, CheckpointStore, CpuAutodiffBackend, CpuBackend,
        EffectModel, Network, RenderOptions, Retention, StopHandle, Trainer,
    };
}

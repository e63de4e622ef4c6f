//! Burn implementation of tonewell.
//!
//! Dilated causal models, differentiable spectral losses, the epoch loop, and
//! checkpoint persistence on top of [Burn](https://burn.dev). CPU runs use the
//! NdArray backend; the `gpu` feature adds wgpu.
//!
//! ```rust,ignore
//! let ctx = initialize_run::<CpuAutodiffBackend>(42, cpu_device());
//! let preset = PresetCatalog::builtin().get("tcn-baseline")?.clone();
//! let model = Network::init(&preset.model, &ctx.device)?;
//! let mut trainer = Trainer::from_preset(&preset, TrainingConfig::default(), &ctx.device)?
//!     .with_checkpoints(CheckpointStore::open("runs/tcn")?);
//! let trained = trainer.fit(model, AdamConfig::new().init(), &train, &valid)?;
//! ```

pub mod checkpoint;
pub mod crop;
pub mod device;
pub mod error;
pub mod evaluate;
pub mod loss;
pub mod model;
pub mod render;
pub mod tensor;
pub mod trainer;

pub use checkpoint::{
    CheckpointHandle, CheckpointMetadata, CheckpointStore, Retention, FORMAT_VERSION,
};
pub use crop::{causal_crop, causal_crop_pair, pad_left, pad_right};
pub use device::{cpu_device, initialize_run, CpuAutodiffBackend, CpuBackend, DevicePlacement, RunContext};
#[cfg(feature = "gpu")]
pub use device::{gpu_device, GpuAutodiffBackend, GpuBackend};
pub use error::{CheckpointError, Error, Phase, Result};
pub use evaluate::{evaluate_chunks, evaluate_signal, ChunkedMetrics, SignalMetrics};
pub use loss::{esr, mae, mse, LossComposer, LossOutput, MultiResolutionStft, Stft};
pub use model::{EffectModel, Network};
pub use render::{render, RenderOptions};
pub use trainer::{EpochStats, StopHandle, Trained, Trainer, TrainingReport};

/// Re-export of the Burn version this crate is built against.
pub use burn;

//! Checkpoint persistence.
//!
//! Each checkpoint is a directory under the store root:
//!
//! ```text
//! <root>/
//!   best.json                       pointer to the best checkpoint
//!   epoch-0007-20240501-120301/
//!     model.mpk                     full-precision module record
//!     optimizer.mpk                 optimizer state
//!     checkpoint.json               metadata, written last
//! ```
//!
//! A checkpoint is assembled in a hidden `.staging-*` directory and renamed into
//! place once its metadata is on disk, so a crash never leaves a visible
//! half-written checkpoint. `best.json` is replaced with write-then-rename.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use burn::module::{AutodiffModule, Module};
use burn::optim::Optimizer;
use burn::record::{FullPrecisionSettings, NamedMpkFileRecorder, Recorder};
use burn::tensor::backend::{AutodiffBackend, Backend};
use serde::{Deserialize, Serialize};
use tonewell_core::{ModelKind, MultiStepLr, TrainingConfig};

use crate::error::CheckpointError;
use crate::model::Network;

/// Version of the on-disk layout and metadata schema.
pub const FORMAT_VERSION: u32 = 1;

/// `chrono` format of [`CheckpointMetadata::created_at`].
pub const TIMESTAMP_FORMAT: &str = "%Y%m%d-%H%M%S";

const MODEL_FILE: &str = "model";
const OPTIMIZER_FILE: &str = "optimizer";
const METADATA_FILE: &str = "checkpoint.json";
const BEST_POINTER: &str = "best.json";
const STAGING_PREFIX: &str = ".staging-";

type FileRecorder = NamedMpkFileRecorder<FullPrecisionSettings>;

/// Which finished checkpoints survive a new save.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Retention {
    #[default]
    KeepAll,
    /// Delete every other checkpoint once a new one is in place.
    KeepLatest,
}

/// Everything needed to rebuild and resume a run besides the tensors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckpointMetadata {
    pub format_version: u32,
    pub model: ModelKind,
    #[serde(default)]
    pub preset: Option<String>,
    pub criterion: String,
    /// Epoch whose weights are stored.
    pub epoch: usize,
    pub n_epochs: usize,
    pub batch_size: usize,
    pub learning_rate: f64,
    pub created_at: String,
    pub best_valid_loss: f64,
    pub scheduler: MultiStepLr,
    #[serde(default)]
    pub sample_rate: Option<u32>,
}

impl CheckpointMetadata {
    pub fn new(
        model: ModelKind,
        config: &TrainingConfig,
        criterion: impl Into<String>,
        epoch: usize,
        best_valid_loss: f64,
        scheduler: MultiStepLr,
    ) -> Self {
        Self {
            format_version: FORMAT_VERSION,
            model,
            preset: None,
            criterion: criterion.into(),
            epoch,
            n_epochs: config.n_epochs,
            batch_size: config.batch_size,
            learning_rate: config.learning_rate,
            created_at: chrono::Local::now().format(TIMESTAMP_FORMAT).to_string(),
            best_valid_loss,
            scheduler,
            sample_rate: config.sample_rate,
        }
    }

    pub fn with_preset(mut self, preset: impl Into<String>) -> Self {
        self.preset = Some(preset.into());
        self
    }

    fn dir_name(&self) -> String {
        format!("epoch-{:04}-{}", self.epoch, self.created_at)
    }
}

/// Location of one finished checkpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckpointHandle {
    pub path: PathBuf,
    pub epoch: usize,
}

#[derive(Debug, Serialize, Deserialize)]
struct BestPointer {
    dir: String,
    epoch: usize,
    valid_loss: f64,
}

/// Directory of checkpoints written during training.
#[derive(Debug, Clone)]
pub struct CheckpointStore {
    root: PathBuf,
    retention: Retention,
}

impl CheckpointStore {
    /// Open (and create if needed) a store rooted at `root`.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, CheckpointError> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self {
            root,
            retention: Retention::default(),
        })
    }

    pub fn with_retention(mut self, retention: Retention) -> Self {
        self.retention = retention;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Write a checkpoint and point `best.json` at it.
    ///
    /// The model is stored through its inference view, so it can be reloaded on
    /// any backend with [`CheckpointStore::load_network`].
    pub fn save<B, M, O>(
        &self,
        model: &M,
        optimizer: &O,
        metadata: &CheckpointMetadata,
    ) -> Result<CheckpointHandle, CheckpointError>
    where
        B: AutodiffBackend,
        M: AutodiffModule<B>,
        O: Optimizer<M, B>,
    {
        let name = metadata.dir_name();
        let staging = self.root.join(format!("{}{}", STAGING_PREFIX, name));
        if staging.exists() {
            fs::remove_dir_all(&staging)?;
        }
        fs::create_dir_all(&staging)?;

        let recorder = FileRecorder::new();
        model.valid().save_file(staging.join(MODEL_FILE), &recorder)?;
        Recorder::<B>::record(&recorder, optimizer.to_record(), staging.join(OPTIMIZER_FILE))?;
        write_synced(&staging.join(METADATA_FILE), &serde_json::to_vec_pretty(metadata)?)?;

        let path = self.root.join(&name);
        if path.exists() {
            fs::remove_dir_all(&path)?;
        }
        fs::rename(&staging, &path)?;

        let handle = CheckpointHandle {
            path,
            epoch: metadata.epoch,
        };
        self.write_best(&name, metadata)?;
        tracing::debug!(path = %handle.path.display(), epoch = handle.epoch, "Saved checkpoint");

        if self.retention == Retention::KeepLatest {
            self.prune(&handle);
        }
        Ok(handle)
    }

    /// Read and check the metadata of a checkpoint.
    pub fn read_metadata(&self, handle: &CheckpointHandle) -> Result<CheckpointMetadata, CheckpointError> {
        read_metadata(&handle.path)
    }

    /// Rebuild the network a checkpoint was written for and load its weights.
    pub fn load_network<B: Backend>(
        &self,
        handle: &CheckpointHandle,
        device: &B::Device,
    ) -> Result<(Network<B>, CheckpointMetadata), CheckpointError> {
        let metadata = read_metadata(&handle.path)?;
        let network = Network::<B>::init(&metadata.model, device)?.load_file(
            handle.path.join(MODEL_FILE),
            &FileRecorder::new(),
            device,
        )?;
        Ok((network, metadata))
    }

    /// Restore network and optimizer state to resume training `expected`.
    pub fn load_training<B, O>(
        &self,
        handle: &CheckpointHandle,
        expected: &ModelKind,
        optimizer: O,
        device: &B::Device,
    ) -> Result<(Network<B>, O, CheckpointMetadata), CheckpointError>
    where
        B: AutodiffBackend,
        O: Optimizer<Network<B>, B>,
    {
        let (network, metadata) = self.load_network::<B>(handle, device)?;
        if metadata.model != *expected {
            return Err(CheckpointError::ModelMismatch {
                found: format!("{:?}", metadata.model),
                expected: format!("{:?}", expected),
            });
        }
        let record = Recorder::<B>::load(&FileRecorder::new(), handle.path.join(OPTIMIZER_FILE), device)?;
        Ok((network, optimizer.load_record(record), metadata))
    }

    /// The checkpoint `best.json` points at, if any.
    pub fn best(&self) -> Result<Option<CheckpointHandle>, CheckpointError> {
        let pointer_path = self.root.join(BEST_POINTER);
        if !pointer_path.exists() {
            return Ok(None);
        }
        let pointer: BestPointer = serde_json::from_slice(&fs::read(&pointer_path)?)?;
        let path = self.root.join(&pointer.dir);
        if !path.join(METADATA_FILE).exists() {
            return Err(CheckpointError::NotFound(path));
        }
        Ok(Some(CheckpointHandle {
            path,
            epoch: pointer.epoch,
        }))
    }

    /// Finished checkpoints, oldest epoch first. Staging directories are skipped.
    pub fn list(&self) -> Result<Vec<CheckpointHandle>, CheckpointError> {
        let mut handles = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let path = entry?.path();
            let hidden = path
                .file_name()
                .and_then(|n| n.to_str())
                .map_or(true, |n| n.starts_with('.'));
            if hidden || !path.join(METADATA_FILE).is_file() {
                continue;
            }
            let metadata = read_metadata(&path)?;
            handles.push(CheckpointHandle {
                path,
                epoch: metadata.epoch,
            });
        }
        handles.sort_by_key(|h| h.epoch);
        Ok(handles)
    }

    fn write_best(&self, dir: &str, metadata: &CheckpointMetadata) -> Result<(), CheckpointError> {
        let pointer = BestPointer {
            dir: dir.to_string(),
            epoch: metadata.epoch,
            valid_loss: metadata.best_valid_loss,
        };
        let tmp = self.root.join(format!(".{}.tmp", BEST_POINTER));
        write_synced(&tmp, &serde_json::to_vec_pretty(&pointer)?)?;
        fs::rename(&tmp, self.root.join(BEST_POINTER))?;
        Ok(())
    }

    fn prune(&self, keep: &CheckpointHandle) {
        let handles = match self.list() {
            Ok(handles) => handles,
            Err(e) => {
                tracing::warn!(error = %e, "Could not list checkpoints for pruning");
                return;
            }
        };
        for handle in handles.into_iter().filter(|h| h.path != keep.path) {
            if let Err(e) = fs::remove_dir_all(&handle.path) {
                tracing::warn!(path = %handle.path.display(), error = %e, "Could not prune checkpoint");
            }
        }
    }
}

fn read_metadata(dir: &Path) -> Result<CheckpointMetadata, CheckpointError> {
    let bytes = fs::read(dir.join(METADATA_FILE))?;
    let value: serde_json::Value = serde_json::from_slice(&bytes)?;
    let found = value
        .get("format_version")
        .and_then(serde_json::Value::as_u64)
        .unwrap_or(0);
    if u32::try_from(found).ok() != Some(FORMAT_VERSION) {
        return Err(CheckpointError::SchemaMismatch {
            found,
            expected: FORMAT_VERSION,
        });
    }
    Ok(serde_json::from_value(value)?)
}

fn write_synced(path: &Path, bytes: &[u8]) -> Result<(), CheckpointError> {
    let mut file = fs::File::create(path)?;
    file.write_all(bytes)?;
    file.sync_all()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::EffectModel;
    use burn::backend::ndarray::NdArrayDevice;
    use burn::backend::{Autodiff, NdArray};
    use burn::optim::AdamConfig;
    use burn::prelude::*;
    use tempfile::TempDir;
    use tonewell_core::{DilationSchedule, TcnParams};

    type Inner = NdArray<f32>;
    type Ad = Autodiff<Inner>;

    fn kind() -> ModelKind {
        ModelKind::Tcn(TcnParams {
            n_inputs: 1,
            n_outputs: 1,
            n_blocks: 2,
            kernel_size: 3,
            n_channels: 4,
            dilation: DilationSchedule::stacked(2),
            cond_dim: 0,
            residual: true,
        })
    }

    fn metadata(epoch: usize, loss: f64) -> CheckpointMetadata {
        let config = TrainingConfig {
            n_epochs: 10,
            ..TrainingConfig::default()
        };
        CheckpointMetadata::new(
            kind(),
            &config,
            "mrstft",
            epoch,
            loss,
            MultiStepLr::from_config(&config),
        )
    }

    #[test]
    fn test_round_trip_is_bit_exact() {
        let dir = TempDir::new().unwrap();
        let store = CheckpointStore::open(dir.path()).unwrap();
        let device = NdArrayDevice::default();
        let model = Network::<Ad>::init(&kind(), &device).unwrap();
        let optimizer = AdamConfig::new().init::<Ad, Network<Ad>>();

        let handle = store.save(&model, &optimizer, &metadata(3, 0.5)).unwrap();
        let (loaded, meta) = store.load_network::<Inner>(&handle, &device).unwrap();
        assert_eq!(meta.epoch, 3);
        assert_eq!(meta.model, kind());
        assert_eq!(meta.scheduler.milestones(), &[8, 9]);

        let x = Tensor::<Inner, 1>::from_floats(
            [0.1, -0.4, 0.9, 0.3, -0.2, 0.7, 0.0, -0.6, 0.5, 0.2],
            &device,
        )
        .reshape([1, 1, 10]);
        let expected = model.valid().forward(x.clone(), None).unwrap().into_data();
        let actual = loaded.forward(x, None).unwrap().into_data();
        assert_eq!(expected, actual);
    }

    #[test]
    fn test_best_pointer_and_retention() {
        let dir = TempDir::new().unwrap();
        let store = CheckpointStore::open(dir.path())
            .unwrap()
            .with_retention(Retention::KeepLatest);
        let device = NdArrayDevice::default();
        let model = Network::<Ad>::init(&kind(), &device).unwrap();
        let optimizer = AdamConfig::new().init::<Ad, Network<Ad>>();

        assert!(store.best().unwrap().is_none());
        store.save(&model, &optimizer, &metadata(0, 0.9)).unwrap();
        let second = store.save(&model, &optimizer, &metadata(1, 0.5)).unwrap();

        assert_eq!(store.best().unwrap(), Some(second.clone()));
        assert_eq!(store.list().unwrap(), vec![second]);
    }

    #[test]
    fn test_resume_restores_optimizer() {
        let dir = TempDir::new().unwrap();
        let store = CheckpointStore::open(dir.path()).unwrap();
        let device = NdArrayDevice::default();
        let model = Network::<Ad>::init(&kind(), &device).unwrap();
        let optimizer = AdamConfig::new().init::<Ad, Network<Ad>>();
        let handle = store.save(&model, &optimizer, &metadata(2, 0.1)).unwrap();

        let fresh = AdamConfig::new().init::<Ad, Network<Ad>>();
        let (_, _, meta) = store
            .load_training::<Ad, _>(&handle, &kind(), fresh, &device)
            .unwrap();
        assert_eq!(meta.epoch, 2);

        let mut other = kind();
        if let ModelKind::Tcn(p) = &mut other {
            p.n_channels = 8;
        }
        let fresh = AdamConfig::new().init::<Ad, Network<Ad>>();
        assert!(matches!(
            store.load_training::<Ad, _>(&handle, &other, fresh, &device),
            Err(CheckpointError::ModelMismatch { .. })
        ));
    }

    #[test]
    fn test_schema_mismatch() {
        let dir = TempDir::new().unwrap();
        let store = CheckpointStore::open(dir.path()).unwrap();
        let device = NdArrayDevice::default();
        let model = Network::<Ad>::init(&kind(), &device).unwrap();
        let optimizer = AdamConfig::new().init::<Ad, Network<Ad>>();
        let handle = store.save(&model, &optimizer, &metadata(0, 1.0)).unwrap();

        let path = handle.path.join(METADATA_FILE);
        let mut value: serde_json::Value = serde_json::from_slice(&fs::read(&path).unwrap()).unwrap();
        value["format_version"] = serde_json::json!(FORMAT_VERSION + 1);
        fs::write(&path, serde_json::to_vec(&value).unwrap()).unwrap();

        assert!(matches!(
            store.read_metadata(&handle),
            Err(CheckpointError::SchemaMismatch { found, .. }) if found == u64::from(FORMAT_VERSION + 1)
        ));
    }

    #[test]
    fn test_wide_format_version_is_not_truncated() {
        let dir = TempDir::new().unwrap();
        let store = CheckpointStore::open(dir.path()).unwrap();
        let device = NdArrayDevice::default();
        let model = Network::<Ad>::init(&kind(), &device).unwrap();
        let optimizer = AdamConfig::new().init::<Ad, Network<Ad>>();
        let handle = store.save(&model, &optimizer, &metadata(0, 1.0)).unwrap();

        // low 32 bits equal the current version
        let wide = (1u64 << 32) + u64::from(FORMAT_VERSION);
        let path = handle.path.join(METADATA_FILE);
        let mut value: serde_json::Value = serde_json::from_slice(&fs::read(&path).unwrap()).unwrap();
        value["format_version"] = serde_json::json!(wide);
        fs::write(&path, serde_json::to_vec(&value).unwrap()).unwrap();

        assert!(matches!(
            store.read_metadata(&handle),
            Err(CheckpointError::SchemaMismatch { found, .. }) if found == wide
        ));
        assert!(store.load_network::<NdArray<f32>>(&handle, &device).is_err());
    }

    #[test]
    fn test_missing_checkpoint_is_io_error() {
        let dir = TempDir::new().unwrap();
        let store = CheckpointStore::open(dir.path()).unwrap();
        let handle = CheckpointHandle {
            path: dir.path().join("nope"),
            epoch: 0,
        };
        assert!(matches!(
            store.read_metadata(&handle),
            Err(CheckpointError::Io(_))
        ));
    }

    #[test]
    fn test_corrupt_metadata() {
        let dir = TempDir::new().unwrap();
        let store = CheckpointStore::open(dir.path()).unwrap();
        let ckpt = dir.path().join("epoch-0000-x");
        fs::create_dir_all(&ckpt).unwrap();
        fs::write(ckpt.join(METADATA_FILE), b"{ not json").unwrap();
        let handle = CheckpointHandle { path: ckpt, epoch: 0 };
        assert!(matches!(
            store.read_metadata(&handle),
            Err(CheckpointError::Metadata(_))
        ));
    }
}

//! Epoch loop: train, validate, step the schedule, keep the best checkpoint.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use burn::module::AutodiffModule;
use burn::optim::{GradientsParams, Optimizer};
use burn::tensor::backend::AutodiffBackend;
use tonewell_core::{
    BatchSource, BestTracker, LossSpec, ModelKind, MultiStepLr, Preset, TelemetrySink,
    TracingSink, TrainingConfig,
};

use crate::checkpoint::{CheckpointHandle, CheckpointMetadata, CheckpointStore};
use crate::crop::causal_crop;
use crate::error::{Error, Phase, Result};
use crate::loss::LossComposer;
use crate::model::EffectModel;
use crate::tensor::{batch_tensors, scalar};

/// Cloneable request to stop training at the next epoch boundary.
#[derive(Debug, Clone, Default)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request_stop(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_stop_requested(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Averages of one epoch.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EpochStats {
    pub epoch: usize,
    pub train_loss: f64,
    pub train_esr: f64,
    pub valid_loss: f64,
    pub valid_esr: f64,
    /// Learning rate used during this epoch.
    pub learning_rate: f64,
    /// Whether this epoch set a new validation minimum.
    pub improved: bool,
}

#[derive(Debug, Clone, Default)]
pub struct TrainingReport {
    pub epochs: Vec<EpochStats>,
    pub best_valid_loss: f64,
    pub best_epoch: Option<usize>,
    pub best_checkpoint: Option<CheckpointHandle>,
    /// Training ended on a stop request rather than after the last epoch.
    pub stopped_early: bool,
}

/// Final model and optimizer state together with the per-epoch record.
pub struct Trained<M, O> {
    pub model: M,
    pub optimizer: O,
    pub report: TrainingReport,
}

#[derive(Debug, Default)]
struct Running {
    loss: f64,
    metric: f64,
    count: usize,
}

impl Running {
    fn push(&mut self, loss: f64, metric: f64) {
        self.loss += loss;
        self.metric += metric;
        self.count += 1;
    }

    fn mean(&self) -> (f64, f64) {
        let n = self.count.max(1) as f64;
        (self.loss / n, self.metric / n)
    }
}

/// Drives training of one model on one device.
///
/// The trainer owns everything that persists across epochs (schedule, best
/// tracker, checkpoint store, telemetry) but not the model: [`Trainer::fit`]
/// takes the model by value and hands the trained one back, the way Burn
/// optimizers update modules.
pub struct Trainer<B: AutodiffBackend> {
    config: TrainingConfig,
    kind: ModelKind,
    preset: Option<String>,
    train_criterion: LossComposer<B>,
    valid_criterion: LossComposer<B::InnerBackend>,
    scheduler: MultiStepLr,
    tracker: BestTracker,
    store: Option<CheckpointStore>,
    last_checkpoint: Option<CheckpointHandle>,
    telemetry: Box<dyn TelemetrySink>,
    stop: StopHandle,
    start_epoch: usize,
    device: B::Device,
}

impl<B: AutodiffBackend> Trainer<B> {
    pub fn new(
        kind: ModelKind,
        criterion: &LossSpec,
        config: TrainingConfig,
        device: &B::Device,
    ) -> Result<Self> {
        config.validate()?;
        kind.validate()?;
        Ok(Self {
            train_criterion: LossComposer::from_spec(criterion, device)?,
            valid_criterion: LossComposer::from_spec(criterion, device)?,
            scheduler: MultiStepLr::from_config(&config),
            tracker: BestTracker::new(),
            config,
            kind,
            preset: None,
            store: None,
            last_checkpoint: None,
            telemetry: Box::new(TracingSink),
            stop: StopHandle::new(),
            start_epoch: 0,
            device: device.clone(),
        })
    }

    pub fn from_preset(preset: &Preset, config: TrainingConfig, device: &B::Device) -> Result<Self> {
        let mut trainer = Self::new(preset.model.clone(), &preset.loss_spec()?, config, device)?;
        trainer.preset = Some(preset.name.clone());
        Ok(trainer)
    }

    pub fn with_checkpoints(mut self, store: CheckpointStore) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_telemetry(mut self, sink: impl TelemetrySink + 'static) -> Self {
        self.telemetry = Box::new(sink);
        self
    }

    /// Continue after the epoch stored in `metadata`, keeping its schedule and
    /// validation minimum.
    pub fn resume(mut self, handle: CheckpointHandle, metadata: &CheckpointMetadata) -> Self {
        self.scheduler = metadata.scheduler.clone();
        self.tracker = BestTracker::resume(metadata.best_valid_loss, metadata.epoch);
        self.start_epoch = metadata.epoch + 1;
        self.last_checkpoint = Some(handle);
        self
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    pub fn scheduler(&self) -> &MultiStepLr {
        &self.scheduler
    }

    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }

    /// Run the remaining epochs.
    pub fn fit<M, O>(
        &mut self,
        model: M,
        optimizer: O,
        train: &dyn BatchSource,
        valid: &dyn BatchSource,
    ) -> Result<Trained<M, O>>
    where
        M: AutodiffModule<B> + EffectModel<B>,
        M::InnerModule: EffectModel<B::InnerBackend>,
        O: Optimizer<M, B>,
    {
        if train.is_empty() || valid.is_empty() {
            return Err(tonewell_core::Error::InvalidConfig(
                "training and validation sources must yield at least one batch".into(),
            )
            .into());
        }
        if model.device() != self.device {
            return Err(tonewell_core::Error::DeviceMismatch(format!(
                "model on {:?}, trainer on {:?}",
                model.device(),
                self.device
            ))
            .into());
        }

        tracing::info!(
            model = self.kind.name(),
            criterion = self.train_criterion.label(),
            epochs = self.config.n_epochs,
            start_epoch = self.start_epoch,
            receptive_field = model.receptive_field(),
            "Starting training"
        );

        let result = self.run(model, optimizer, train, valid);
        self.telemetry.flush();
        result
    }

    fn run<M, O>(
        &mut self,
        mut model: M,
        mut optimizer: O,
        train: &dyn BatchSource,
        valid: &dyn BatchSource,
    ) -> Result<Trained<M, O>>
    where
        M: AutodiffModule<B> + EffectModel<B>,
        M::InnerModule: EffectModel<B::InnerBackend>,
        O: Optimizer<M, B>,
    {
        let mut report = TrainingReport::default();
        let label = self.train_criterion.label().to_string();

        for epoch in self.start_epoch..self.config.n_epochs {
            if self.stop.is_stop_requested() {
                tracing::info!(epoch, "Stop requested, ending training");
                report.stopped_early = true;
                break;
            }

            let learning_rate = self.scheduler.lr();
            let (trained, train_loss, train_esr) =
                self.train_epoch(epoch, model, &mut optimizer, train, learning_rate)?;
            model = trained;
            let (valid_loss, valid_esr) = self.validate_epoch(epoch, &model.valid(), valid)?;

            self.telemetry.scalar(&format!("training/{}", label), epoch, train_loss);
            self.telemetry.scalar("training/esr", epoch, train_esr);
            self.telemetry.scalar(&format!("validation/{}", label), epoch, valid_loss);
            self.telemetry.scalar("validation/esr", epoch, valid_esr);

            self.scheduler.step();

            let improved = self.tracker.observe(epoch, valid_loss);
            if improved {
                if let Some(store) = &self.store {
                    let mut metadata = CheckpointMetadata::new(
                        self.kind.clone(),
                        &self.config,
                        label.clone(),
                        epoch,
                        valid_loss,
                        self.scheduler.clone(),
                    );
                    if let Some(preset) = &self.preset {
                        metadata = metadata.with_preset(preset.clone());
                    }
                    self.last_checkpoint = Some(store.save(&model, &optimizer, &metadata)?);
                }
            }

            tracing::info!(
                epoch,
                train_loss,
                train_esr,
                valid_loss,
                valid_esr,
                lr = learning_rate,
                improved,
                "Epoch finished"
            );
            report.epochs.push(EpochStats {
                epoch,
                train_loss,
                train_esr,
                valid_loss,
                valid_esr,
                learning_rate,
                improved,
            });
        }

        report.best_valid_loss = self.tracker.best();
        report.best_epoch = self.tracker.best_epoch();
        report.best_checkpoint = self.last_checkpoint.clone();
        Ok(Trained {
            model,
            optimizer,
            report,
        })
    }

    fn train_epoch<M, O>(
        &self,
        epoch: usize,
        mut model: M,
        optimizer: &mut O,
        source: &dyn BatchSource,
        learning_rate: f64,
    ) -> Result<(M, f64, f64)>
    where
        M: AutodiffModule<B> + EffectModel<B>,
        O: Optimizer<M, B>,
    {
        let mut running = Running::default();
        for (index, batch) in source.batches().enumerate() {
            let (input, target, cond) = batch_tensors::<B>(&batch, model.cond_dim(), &self.device)?;
            let pred = model.forward(input, cond)?;
            let target = causal_crop(target, pred.dims()[2])?;
            let output = self.train_criterion.compute(pred, target)?;

            let loss = scalar(output.objective.clone());
            self.check_finite(Phase::Train, epoch, index, "loss", loss)?;
            self.check_finite(Phase::Train, epoch, index, "esr", output.metric)?;

            let grads = GradientsParams::from_grads(output.objective.backward(), &model);
            model = optimizer.step(learning_rate, model, grads);

            tracing::debug!(epoch, batch = index, loss, esr = output.metric, "Train batch");
            running.push(loss, output.metric);
        }
        let (loss, metric) = running.mean();
        Ok((model, loss, metric))
    }

    fn validate_epoch<M>(&self, epoch: usize, model: &M, source: &dyn BatchSource) -> Result<(f64, f64)>
    where
        M: EffectModel<B::InnerBackend>,
    {
        let mut running = Running::default();
        for (index, batch) in source.batches().enumerate() {
            let (input, target, cond) =
                batch_tensors::<B::InnerBackend>(&batch, model.cond_dim(), &self.device)?;
            let pred = model.forward(input, cond)?;
            let target = causal_crop(target, pred.dims()[2])?;
            let output = self.valid_criterion.compute(pred, target)?;

            let loss = scalar(output.objective);
            self.check_finite(Phase::Validate, epoch, index, "loss", loss)?;
            self.check_finite(Phase::Validate, epoch, index, "esr", output.metric)?;

            tracing::debug!(epoch, batch = index, loss, esr = output.metric, "Validation batch");
            running.push(loss, output.metric);
        }
        Ok(running.mean())
    }

    fn check_finite(
        &self,
        phase: Phase,
        epoch: usize,
        batch: usize,
        what: &'static str,
        value: f64,
    ) -> Result<()> {
        if value.is_finite() {
            return Ok(());
        }
        tracing::error!(%phase, epoch, batch, what, value, "Non-finite value, aborting");
        Err(Error::NumericalFailure {
            phase,
            epoch,
            batch,
            what,
            value,
            last_checkpoint: self.last_checkpoint.as_ref().map(|h| h.path.clone()),
        })
    }
}

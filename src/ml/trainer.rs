// ============================================================
// Layer 5 — Training Loop
// ============================================================
// A small state machine around Burn's DataLoader:
//
//   Idle ──train()──▶ EpochRunning ──▶ BatchStep ×N ──┐
//                          ▲                          │
//                          └── validation ◀───────────┘
//                                  │ improved?
//                                  ▼
//                            Checkpointing ──▶ … ──▶ Done
//
//   - Training batches use TrainBackend (Autodiff<…>)
//   - model.valid() drops to the inner backend, so the
//     validation loader is built on B::InnerBackend
//   - A NaN/Inf loss aborts the run with NonFiniteLoss
//   - Without a validation split, the final epoch is saved
//
// Reference: Burn Book §5 (Training)

use std::{path::PathBuf, sync::Arc};

use burn::{
    data::{
        dataloader::{batcher::Batcher, DataLoader, DataLoaderBuilder},
        dataset::Dataset,
    },
    module::AutodiffModule,
    prelude::*,
    tensor::backend::AutodiffBackend,
};
use serde::{Deserialize, Serialize};

use crate::data::batcher::{LmBatch, LmBatcher};
use crate::domain::sample::LmSample;
use crate::error::{GptError, Result};
use crate::infra::{
    checkpoint::save_params,
    metrics::{EpochMetrics, MetricsLogger},
};
use crate::ml::model::Gpt;
use crate::ml::optimizer::{AdamWSettings, ScheduledAdamW, StepReport};
use crate::ml::params::ParamPartition;
use crate::ml::schedule::LrSchedule;

/// Warmup length shared by every preset, in supervised tokens.
pub const PRESET_WARMUP_TOKENS: u64 = 512 * 20;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainerConfig {
    pub max_epochs:     usize,
    pub batch_size:     usize,
    pub learning_rate:  f64,
    pub lr_decay:       bool,
    pub warmup_tokens:  u64,
    pub final_tokens:   u64,
    pub num_workers:    usize,
    pub betas:          (f32, f32),
    pub grad_norm_clip: f64,
    pub weight_decay:   f32,
    /// Seeds the loader shuffle
    pub seed:           u64,
    /// Where checkpoints go during training; None disables them
    pub ckpt_path:      Option<PathBuf>,
    pub metrics_dir:    Option<PathBuf>,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        Self {
            max_epochs:     10,
            batch_size:     64,
            learning_rate:  3e-4,
            lr_decay:       false,
            warmup_tokens:  375_000_000,
            final_tokens:   260_000_000_000,
            num_workers:    0,
            betas:          (0.9, 0.95),
            grad_norm_clip: 1.0,
            weight_decay:   0.1,
            seed:           0,
            ckpt_path:      None,
            metrics_dir:    None,
        }
    }
}

impl TrainerConfig {
    /// `corpus_tokens` = pretraining dataset length × block size.
    pub fn pretrain(corpus_tokens: u64) -> Self {
        Self {
            max_epochs: 650,
            batch_size: 128,
            learning_rate: 6e-3,
            ..Self::preset_base(corpus_tokens)
        }
    }

    pub fn finetune(corpus_tokens: u64, from_pretrained: bool) -> Self {
        Self {
            max_epochs: if from_pretrained { 10 } else { 75 },
            batch_size: 256,
            learning_rate: 6e-4,
            ..Self::preset_base(corpus_tokens)
        }
    }

    fn preset_base(corpus_tokens: u64) -> Self {
        Self {
            lr_decay: true,
            warmup_tokens: PRESET_WARMUP_TOKENS,
            final_tokens: 200 * corpus_tokens,
            num_workers: 4,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(GptError::Configuration("batch_size must be positive".into()));
        }
        if !(self.learning_rate.is_finite() && self.learning_rate >= 0.0) {
            return Err(GptError::Configuration(format!(
                "learning_rate must be a non-negative number, got {}",
                self.learning_rate
            )));
        }
        Ok(())
    }

    pub fn schedule(&self) -> LrSchedule {
        LrSchedule {
            base_rate:     self.learning_rate,
            lr_decay:      self.lr_decay,
            warmup_tokens: self.warmup_tokens,
            final_tokens:  self.final_tokens,
        }
    }

    pub fn adamw(&self) -> AdamWSettings {
        AdamWSettings {
            betas:          self.betas,
            weight_decay:   self.weight_decay,
            grad_norm_clip: self.grad_norm_clip,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TrainerState {
    Idle,
    EpochRunning { epoch: usize },
    BatchStep { epoch: usize, batch: usize },
    Checkpointing { epoch: usize },
    Done,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrainReport {
    pub epochs:           usize,
    pub steps:            usize,
    pub tokens:           u64,
    pub final_train_loss: Option<f64>,
    pub best_val_loss:    Option<f64>,
    pub checkpoints:      usize,
}

fn build_loader<BK, D>(
    device: &BK::Device,
    config: &TrainerConfig,
    dataset: D,
    shuffle: bool,
) -> Arc<dyn DataLoader<LmBatch<BK>>>
where
    BK: Backend,
    D: Dataset<LmSample> + 'static,
{
    let mut builder = DataLoaderBuilder::new(LmBatcher::<BK>::new(device.clone()))
        .batch_size(config.batch_size);
    if shuffle {
        builder = builder.shuffle(config.seed);
    }
    if config.num_workers > 0 {
        builder = builder.num_workers(config.num_workers);
    }
    builder.build(dataset)
}

/// Mean of per-batch masked losses. Runs whatever backend the model is
/// on; pass a `valid()` model to skip gradient tracking.
pub fn mean_loss<B: Backend>(
    model: &Gpt<B>,
    batches: impl IntoIterator<Item = LmBatch<B>>,
) -> Result<f64> {
    let mut sum = 0.0;
    let mut count = 0usize;
    for batch in batches {
        batch.validate(model.block_size())?;
        let (_, loss) = model.forward_loss(batch.inputs, batch.targets, batch.mask)?;
        sum += loss.into_scalar().elem::<f64>();
        count += 1;
    }
    Ok(if count > 0 { sum / count as f64 } else { f64::NAN })
}

/// Mean loss over a dataset in index order, without a DataLoader.
pub fn dataset_loss<B: Backend, D: Dataset<LmSample>>(
    model: &Gpt<B>,
    dataset: &D,
    batch_size: usize,
    device: &B::Device,
) -> Result<f64> {
    let batcher = LmBatcher::<B>::new(device.clone());
    let samples: Vec<LmSample> = dataset.iter().collect();
    let batches = samples
        .chunks(batch_size.max(1))
        .map(|chunk| batcher.batch(chunk.to_vec()));
    mean_loss(model, batches)
}

pub struct Trainer<B: AutodiffBackend> {
    model:         Gpt<B>,
    optimizer:     ScheduledAdamW<B, Gpt<B>>,
    config:        TrainerConfig,
    device:        B::Device,
    train_loader:  Arc<dyn DataLoader<LmBatch<B>>>,
    val_loader:    Option<Arc<dyn DataLoader<LmBatch<B::InnerBackend>>>>,
    metrics:       Option<MetricsLogger>,
    state:         TrainerState,
    best_val_loss: f64,
}

impl<B: AutodiffBackend> Trainer<B> {
    /// The decay partition is fixed here, from the model as handed in.
    pub fn new<D>(model: Gpt<B>, train: D, config: TrainerConfig, device: &B::Device) -> Result<Self>
    where
        D: Dataset<LmSample> + 'static,
    {
        config.validate()?;
        if train.is_empty() {
            return Err(GptError::Configuration("training dataset is empty".into()));
        }

        let partition = ParamPartition::new(model.param_decls())?;
        let optimizer = ScheduledAdamW::new(config.schedule(), config.adamw(), partition);
        let train_loader = build_loader::<B, D>(device, &config, train, true);
        let metrics = config.metrics_dir.as_ref().map(MetricsLogger::new).transpose()?;

        Ok(Self {
            model,
            optimizer,
            config,
            device: device.clone(),
            train_loader,
            val_loader: None,
            metrics,
            state: TrainerState::Idle,
            best_val_loss: f64::INFINITY,
        })
    }

    /// Evaluate on `val` after every epoch. An empty split is ignored.
    pub fn with_validation<V>(mut self, val: V) -> Self
    where
        V: Dataset<LmSample> + 'static,
    {
        if val.is_empty() {
            tracing::warn!("Validation split is empty; checkpointing at the final epoch instead");
            return self;
        }
        self.val_loader =
            Some(build_loader::<B::InnerBackend, V>(&self.device, &self.config, val, false));
        self
    }

    pub fn state(&self) -> TrainerState {
        self.state
    }

    pub fn model(&self) -> &Gpt<B> {
        &self.model
    }

    pub fn train(&mut self) -> Result<TrainReport> {
        if self.state == TrainerState::Done {
            return Err(GptError::Configuration(
                "train() called on a trainer that has already finished".into(),
            ));
        }

        let max_epochs = self.config.max_epochs;
        let mut report = TrainReport::default();
        tracing::info!(
            "Training for {} epochs, batch size {}, base lr {:.2e}",
            max_epochs,
            self.config.batch_size,
            self.config.learning_rate
        );

        for epoch in 1..=max_epochs {
            self.state = TrainerState::EpochRunning { epoch };
            let (train_loss, grad_norm) = self.run_epoch(epoch)?;
            let val_loss = self.validate()?;

            let metrics = EpochMetrics {
                epoch,
                train_loss,
                val_loss,
                lr: self.optimizer.current_lr(),
                grad_norm,
                tokens: self.optimizer.tokens(),
            };

            // Without validation the final epoch is the only checkpoint.
            let improved = match val_loss {
                Some(_) => metrics.is_improvement(self.best_val_loss),
                None => epoch == max_epochs,
            };
            if let Some(v) = val_loss {
                self.best_val_loss = self.best_val_loss.min(v);
            }
            if improved && self.checkpoint(epoch)? {
                report.checkpoints += 1;
            }

            match val_loss {
                Some(v) => tracing::info!(
                    "Epoch {:>3}/{} | train_loss={:.4} | val_loss={:.4} | lr={:.3e} | grad_norm={:.4}",
                    epoch, max_epochs, train_loss, v, metrics.lr, grad_norm
                ),
                None => tracing::info!(
                    "Epoch {:>3}/{} | train_loss={:.4} | lr={:.3e} | grad_norm={:.4}",
                    epoch, max_epochs, train_loss, metrics.lr, grad_norm
                ),
            }
            if let Some(logger) = &self.metrics {
                logger.log(&metrics)?;
            }

            report.epochs = epoch;
            report.final_train_loss = Some(train_loss);
        }

        report.steps = self.optimizer.step_count();
        report.tokens = self.optimizer.tokens();
        report.best_val_loss = self.best_val_loss.is_finite().then_some(self.best_val_loss);
        self.state = TrainerState::Done;
        tracing::info!("Training complete: {} steps, {} supervised tokens", report.steps, report.tokens);
        Ok(report)
    }

    /// Mean training loss and mean gradient norm over the epoch.
    fn run_epoch(&mut self, epoch: usize) -> Result<(f64, f64)> {
        let loader = Arc::clone(&self.train_loader);
        let mut loss_sum = 0.0;
        let mut norm_sum = 0.0;
        let mut batches = 0usize;

        for batch in loader.iter() {
            batches += 1;
            self.state = TrainerState::BatchStep { epoch, batch: batches };
            let (loss, step) = self.train_step(batch)?;
            loss_sum += loss;
            norm_sum += step.grad_norm;
        }
        if batches == 0 {
            return Ok((f64::NAN, f64::NAN));
        }
        Ok((loss_sum / batches as f64, norm_sum / batches as f64))
    }

    fn train_step(&mut self, batch: LmBatch<B>) -> Result<(f64, StepReport)> {
        batch.validate(self.model.block_size())?;
        let batch_tokens = batch.supervised_tokens;

        let (_, loss) = self.model.forward_loss(batch.inputs, batch.targets, batch.mask)?;
        let value = loss.clone().into_scalar().elem::<f64>();
        if !value.is_finite() {
            return Err(GptError::NonFiniteLoss { loss: value, step: self.optimizer.step_count() });
        }

        let grads = loss.backward();
        let (model, step) = self.optimizer.step(self.model.clone(), grads, batch_tokens)?;
        self.model = model;
        Ok((value, step))
    }

    fn validate(&self) -> Result<Option<f64>> {
        let Some(loader) = &self.val_loader else {
            return Ok(None);
        };
        let model = self.model.valid();
        mean_loss(&model, loader.iter()).map(Some)
    }

    /// Returns whether anything was written.
    fn checkpoint(&mut self, epoch: usize) -> Result<bool> {
        let Some(path) = self.config.ckpt_path.clone() else {
            return Ok(false);
        };
        self.state = TrainerState::Checkpointing { epoch };
        save_params(&self.model, &path)?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn presets_share_schedule_shape() {
        let tokens = 1_000 * 128;
        let pre = TrainerConfig::pretrain(tokens);
        assert_eq!((pre.max_epochs, pre.batch_size, pre.learning_rate), (650, 128, 6e-3));
        assert_eq!(pre.final_tokens, 200 * tokens);
        assert_eq!(pre.warmup_tokens, 10_240);
        assert!(pre.lr_decay);
        assert_eq!(pre.num_workers, 4);

        let scratch = TrainerConfig::finetune(tokens, false);
        assert_eq!((scratch.max_epochs, scratch.batch_size, scratch.learning_rate), (75, 256, 6e-4));

        let tuned = TrainerConfig::finetune(tokens, true);
        assert_eq!(tuned.max_epochs, 10);
        assert_eq!(tuned.final_tokens, scratch.final_tokens);
    }

    #[test]
    fn zero_batch_size_is_rejected() {
        let config = TrainerConfig { batch_size: 0, ..TrainerConfig::default() };
        assert!(matches!(config.validate(), Err(GptError::Configuration(_))));
    }
}

// ============================================================
// Layer 2 — TrainUseCase
// ============================================================
// Orchestrates pretraining and finetuning:
//
//   pretrain:
//     Step 1: Read the pretraining corpus       (Layer 4 - data)
//     Step 2: Build the span-corruption dataset (Layer 4 - data)
//     Step 3: Initialise the model              (Layer 5 - ml)
//     Step 4: Train with the pretraining preset (Layer 5 - ml)
//     Step 5: Write parameters + architecture   (Layer 6 - infra)
//
//   finetune:
//     Step 1: Rebuild the pretraining vocabulary
//     Step 2: Encode the name/birthplace corpus
//     Step 3: Optionally split off a validation set
//     Step 4: Initialise, optionally load pretrained parameters
//     Step 5: Train with the matching finetune preset
//     Step 6: Write parameters + architecture
//
// The vocabulary always comes from the pretraining corpus, so a
// finetuned or evaluated model lines up with pretrained weights.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use burn::{config::Config, data::dataset::Dataset};
use serde::{Deserialize, Serialize};

use crate::data::{
    corruption::SpanCorruptionDataset,
    loader::read_corpus,
    names::NameDataset,
    splitter::split_train_val,
};
use crate::domain::sample::LmSample;
use crate::infra::checkpoint::{config_path, load_params, save_params};
use crate::ml::{
    attention::{AttentionKind, SynthesisMode},
    backend::{get_device, TrainBackend},
    model::GptConfig,
    trainer::{TrainReport, Trainer, TrainerConfig},
};

/// Which attention every block uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModelVariant {
    Vanilla,
    Synthesizer,
    SynthesizerRandom,
}

impl ModelVariant {
    pub fn attention(self) -> (AttentionKind, SynthesisMode) {
        match self {
            ModelVariant::Vanilla => (AttentionKind::Causal, SynthesisMode::Dense),
            ModelVariant::Synthesizer => (AttentionKind::Synthesizer, SynthesisMode::Dense),
            ModelVariant::SynthesizerRandom => (AttentionKind::Synthesizer, SynthesisMode::Random),
        }
    }
}

// ─── Model Options ────────────────────────────────────────────────────────────
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelOptions {
    pub n_layer:    usize,
    pub n_head:     usize,
    pub n_embd:     usize,
    pub block_size: usize,
    pub dropout:    f64,
    /// Seeds parameter init, span corruption and the loader shuffle
    pub seed:       u64,
}

impl Default for ModelOptions {
    fn default() -> Self {
        Self { n_layer: 4, n_head: 8, n_embd: 256, block_size: 128, dropout: 0.1, seed: 0 }
    }
}

impl ModelOptions {
    pub fn gpt_config(&self, variant: ModelVariant, vocab_size: usize) -> GptConfig {
        let (attention, synthesis) = variant.attention();
        GptConfig::new(vocab_size, self.block_size)
            .with_n_layer(self.n_layer)
            .with_n_head(self.n_head)
            .with_n_embd(self.n_embd)
            .with_dropout(self.dropout)
            .with_attention(attention)
            .with_synthesis(synthesis)
    }
}

// ─── Preset Overrides ─────────────────────────────────────────────────────────
// Anything left as None keeps the preset value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrainOverrides {
    pub max_epochs:   Option<usize>,
    pub batch_size:   Option<usize>,
    pub lr:           Option<f64>,
    pub num_workers:  Option<usize>,
    pub metrics_dir:  Option<PathBuf>,
    /// Fraction of the finetuning corpus held out for validation
    pub val_fraction: Option<f64>,
}

impl TrainOverrides {
    fn apply(&self, mut config: TrainerConfig) -> TrainerConfig {
        if let Some(v) = self.max_epochs {
            config.max_epochs = v;
        }
        if let Some(v) = self.batch_size {
            config.batch_size = v;
        }
        if let Some(v) = self.lr {
            config.learning_rate = v;
        }
        if let Some(v) = self.num_workers {
            config.num_workers = v;
        }
        if self.metrics_dir.is_some() {
            config.metrics_dir = self.metrics_dir.clone();
        }
        config
    }
}

// ─── TrainUseCase ─────────────────────────────────────────────────────────────
pub struct TrainUseCase {
    model:     ModelOptions,
    overrides: TrainOverrides,
}

impl TrainUseCase {
    pub fn new(model: ModelOptions, overrides: TrainOverrides) -> Self {
        Self { model, overrides }
    }

    /// Span-corruption pretraining from scratch.
    pub fn pretrain(
        &self,
        variant: ModelVariant,
        pretrain_corpus: &Path,
        writing_params: &Path,
    ) -> Result<TrainReport> {
        let dataset = self.pretrain_dataset(pretrain_corpus)?;
        let corpus_tokens = corpus_tokens(&dataset, self.model.block_size);
        let gpt_config = self.model.gpt_config(variant, dataset.vocab().len());

        let trainer_config = self.trainer_config(TrainerConfig::pretrain(corpus_tokens));
        self.train(&gpt_config, None, dataset, None::<NameDataset>, trainer_config, writing_params)
    }

    /// Name → birthplace finetuning, from scratch or from pretrained
    /// parameters.
    pub fn finetune(
        &self,
        variant: ModelVariant,
        pretrain_corpus: &Path,
        finetune_corpus: &Path,
        writing_params: &Path,
        reading_params: Option<&Path>,
    ) -> Result<TrainReport> {
        let pretrain = self.pretrain_dataset(pretrain_corpus)?;
        let corpus_tokens = corpus_tokens(&pretrain, self.model.block_size);
        let vocab = pretrain.vocab().clone();

        let text = read_corpus(finetune_corpus)?;
        let names = NameDataset::new(&text, &vocab, self.model.block_size)
            .with_context(|| format!("Cannot encode '{}'", finetune_corpus.display()))?;

        let (train, val) = match self.overrides.val_fraction.filter(|f| *f > 0.0) {
            Some(fraction) => {
                let (train, val) =
                    split_train_val(names.into_samples(), 1.0 - fraction, self.model.seed);
                tracing::info!("Split: {} train, {} validation", train.len(), val.len());
                (NameDataset::from_samples(train), Some(NameDataset::from_samples(val)))
            }
            None => (names, None),
        };

        let gpt_config = self.model.gpt_config(variant, vocab.len());
        let preset = TrainerConfig::finetune(corpus_tokens, reading_params.is_some());
        let trainer_config = self.trainer_config(preset);
        self.train(&gpt_config, reading_params, train, val, trainer_config, writing_params)
    }

    fn pretrain_dataset(&self, path: &Path) -> Result<SpanCorruptionDataset> {
        tracing::info!("Reading pretraining corpus '{}'", path.display());
        let corpus = read_corpus(path)?;
        let dataset = SpanCorruptionDataset::new(&corpus, self.model.block_size, self.model.seed)
            .with_context(|| format!("Cannot build a pretraining dataset from '{}'", path.display()))?;
        tracing::info!(
            "Pretraining corpus: {} documents, vocabulary of {}",
            dataset.len(),
            dataset.vocab().len()
        );
        Ok(dataset)
    }

    fn trainer_config(&self, preset: TrainerConfig) -> TrainerConfig {
        TrainerConfig { seed: self.model.seed, ..self.overrides.apply(preset) }
    }

    fn train<D, V>(
        &self,
        gpt_config: &GptConfig,
        reading_params: Option<&Path>,
        train: D,
        val: Option<V>,
        mut trainer_config: TrainerConfig,
        writing_params: &Path,
    ) -> Result<TrainReport>
    where
        D: Dataset<LmSample> + 'static,
        V: Dataset<LmSample> + 'static,
    {
        let device = get_device();
        let mut model = gpt_config.init_seeded::<TrainBackend>(self.model.seed, &device)?;
        if let Some(path) = reading_params {
            tracing::info!("Loading pretrained parameters from '{}'", path.display());
            model = load_params(model, path, &device)
                .with_context(|| format!("Cannot load parameters from '{}'", path.display()))?;
        }

        trainer_config.ckpt_path = Some(writing_params.to_path_buf());
        let mut trainer = Trainer::new(model, train, trainer_config, &device)?;
        if let Some(val) = val {
            trainer = trainer.with_validation(val);
        }
        let report = trainer.train()?;

        if report.checkpoints == 0 {
            save_params(trainer.model(), writing_params)?;
        }
        gpt_config
            .save(config_path(writing_params))
            .with_context(|| format!("Cannot write model config next to '{}'", writing_params.display()))?;
        Ok(report)
    }
}

fn corpus_tokens(dataset: &SpanCorruptionDataset, block_size: usize) -> u64 {
    (dataset.len() * block_size) as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overrides_only_touch_what_they_name() {
        let preset = TrainerConfig::pretrain(1_000);
        let overrides = TrainOverrides { max_epochs: Some(2), lr: Some(1e-3), ..Default::default() };
        let config = overrides.apply(preset.clone());
        assert_eq!(config.max_epochs, 2);
        assert_eq!(config.learning_rate, 1e-3);
        assert_eq!(config.batch_size, preset.batch_size);
        assert_eq!(config.final_tokens, preset.final_tokens);
    }

    #[test]
    fn variants_map_to_attention() {
        assert_eq!(ModelVariant::Vanilla.attention().0, AttentionKind::Causal);
        assert_eq!(
            ModelVariant::SynthesizerRandom.attention(),
            (AttentionKind::Synthesizer, SynthesisMode::Random)
        );
    }
}

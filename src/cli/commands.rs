// ============================================================
// Layer 1 — CLI Commands and Arguments
// ============================================================
// Four subcommands:
//
//   pretrain        — span-corruption pretraining
//   finetune        — name → birthplace finetuning
//   evaluate        — greedy predictions + accuracy
//   london-baseline — accuracy of always answering "London"

use std::path::PathBuf;

use clap::{Args, Subcommand, ValueEnum};

use birthplace_gpt::application::train_use_case::{ModelOptions, ModelVariant, TrainOverrides};

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Pretrain on the span-corruption task
    Pretrain(PretrainArgs),

    /// Finetune on name/birthplace pairs
    Finetune(FinetuneArgs),

    /// Predict birthplaces with trained parameters
    Evaluate(EvaluateArgs),

    /// Score the always-"London" baseline
    LondonBaseline(BaselineArgs),
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum VariantArg {
    Vanilla,
    Synthesizer,
    SynthesizerRandom,
}

impl From<VariantArg> for ModelVariant {
    fn from(v: VariantArg) -> Self {
        match v {
            VariantArg::Vanilla => ModelVariant::Vanilla,
            VariantArg::Synthesizer => ModelVariant::Synthesizer,
            VariantArg::SynthesizerRandom => ModelVariant::SynthesizerRandom,
        }
    }
}

/// Architecture flags shared by every model command.
#[derive(Args, Debug, Clone)]
pub struct ModelArgs {
    #[arg(long, default_value_t = 4)]
    pub n_layer: usize,

    /// n_embd must be divisible by n_head
    #[arg(long, default_value_t = 8)]
    pub n_head: usize,

    #[arg(long, default_value_t = 256)]
    pub n_embd: usize,

    /// Characters per training window
    #[arg(long, default_value_t = 128)]
    pub block_size: usize,

    #[arg(long, default_value_t = 0.1)]
    pub dropout: f64,

    #[arg(long, default_value_t = 0)]
    pub seed: u64,
}

impl From<ModelArgs> for ModelOptions {
    fn from(a: ModelArgs) -> Self {
        ModelOptions {
            n_layer:    a.n_layer,
            n_head:     a.n_head,
            n_embd:     a.n_embd,
            block_size: a.block_size,
            dropout:    a.dropout,
            seed:       a.seed,
        }
    }
}

/// Optional replacements for the preset training hyperparameters.
#[derive(Args, Debug, Clone, Default)]
pub struct OverrideArgs {
    #[arg(long)]
    pub max_epochs: Option<usize>,

    #[arg(long)]
    pub batch_size: Option<usize>,

    #[arg(long)]
    pub lr: Option<f64>,

    #[arg(long)]
    pub num_workers: Option<usize>,

    /// Append per-epoch metrics to <DIR>/metrics.csv
    #[arg(long)]
    pub metrics_dir: Option<PathBuf>,
}

impl OverrideArgs {
    pub fn into_overrides(self, val_fraction: Option<f64>) -> TrainOverrides {
        TrainOverrides {
            max_epochs:  self.max_epochs,
            batch_size:  self.batch_size,
            lr:          self.lr,
            num_workers: self.num_workers,
            metrics_dir: self.metrics_dir,
            val_fraction,
        }
    }
}

#[derive(Args, Debug)]
pub struct PretrainArgs {
    #[arg(value_enum)]
    pub variant: VariantArg,

    /// One document per line
    #[arg(long)]
    pub pretrain_corpus: PathBuf,

    #[arg(long)]
    pub writing_params: PathBuf,

    #[command(flatten)]
    pub model: ModelArgs,

    #[command(flatten)]
    pub overrides: OverrideArgs,
}

#[derive(Args, Debug)]
pub struct FinetuneArgs {
    #[arg(value_enum)]
    pub variant: VariantArg,

    /// Source of the character vocabulary
    #[arg(long)]
    pub pretrain_corpus: PathBuf,

    /// One "name<TAB>birthplace" per line
    #[arg(long)]
    pub finetune_corpus: PathBuf,

    #[arg(long)]
    pub writing_params: PathBuf,

    /// Start from these pretrained parameters instead of scratch
    #[arg(long)]
    pub reading_params: Option<PathBuf>,

    /// Hold out this fraction of the finetuning corpus for validation
    #[arg(long)]
    pub val_fraction: Option<f64>,

    #[command(flatten)]
    pub model: ModelArgs,

    #[command(flatten)]
    pub overrides: OverrideArgs,
}

#[derive(Args, Debug)]
pub struct EvaluateArgs {
    #[arg(value_enum)]
    pub variant: VariantArg,

    #[arg(long)]
    pub pretrain_corpus: PathBuf,

    #[arg(long)]
    pub reading_params: PathBuf,

    #[arg(long)]
    pub eval_corpus: PathBuf,

    /// Predictions are written here, one per line
    #[arg(long)]
    pub outputs: PathBuf,

    #[command(flatten)]
    pub model: ModelArgs,
}

#[derive(Args, Debug)]
pub struct BaselineArgs {
    #[arg(long)]
    pub eval_corpus: PathBuf,
}

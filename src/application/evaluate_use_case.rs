// ============================================================
// Layer 2 — EvaluateUseCase
// ============================================================
// Scores a birthplace predictor against an evaluation file:
//
//   Step 1: Read "name[<TAB>birthplace]" lines     (Layer 4 - data)
//   Step 2: Predict a birthplace for every name    (Layer 3 trait)
//   Step 3: Write one prediction per line          (outputs file)
//   Step 4: Accuracy = exact matches / total
//
// The trained model and the London baseline go through the same
// scoring code via the BirthplacePredictor trait. Files without
// gold birthplaces still get predictions, but no accuracy.

use std::{fs, path::Path};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::application::train_use_case::{ModelOptions, ModelVariant};
use crate::data::{corruption::SpanCorruptionDataset, loader::{read_corpus, read_eval_lines}};
use crate::domain::traits::{BirthplacePredictor, LondonBaseline};
use crate::infra::checkpoint::{check_config, config_path, load_params};
use crate::ml::{
    backend::{get_device, InferBackend},
    inferencer::GptPredictor,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvalReport {
    pub total:   usize,
    /// None when the evaluation file carries no gold birthplaces
    pub correct: Option<usize>,
}

impl EvalReport {
    pub fn accuracy(&self) -> Option<f64> {
        match self.correct {
            Some(correct) if self.total > 0 => Some(correct as f64 / self.total as f64),
            _ => None,
        }
    }
}

/// Predict every name in `eval_corpus` and count exact matches.
pub fn score(
    predictor: &dyn BirthplacePredictor,
    eval_corpus: &Path,
) -> Result<(EvalReport, Vec<String>)> {
    let lines = read_eval_lines(eval_corpus)?;
    let has_gold = lines.first().is_some_and(|(_, gold)| gold.is_some());

    let mut predictions = Vec::with_capacity(lines.len());
    let mut correct = 0usize;
    for (name, gold) in &lines {
        let prediction = predictor.predict(name)?;
        if gold.as_deref() == Some(prediction.as_str()) {
            correct += 1;
        }
        predictions.push(prediction);
    }

    let report = EvalReport { total: lines.len(), correct: has_gold.then_some(correct) };
    match report.accuracy() {
        Some(acc) => tracing::info!(
            "Correct: {} out of {}: {:.2}%",
            correct,
            report.total,
            acc * 100.0
        ),
        None => tracing::info!("No gold birthplaces in '{}'; predictions only", eval_corpus.display()),
    }
    Ok((report, predictions))
}

pub struct EvaluateUseCase {
    model: ModelOptions,
}

impl EvaluateUseCase {
    pub fn new(model: ModelOptions) -> Self {
        Self { model }
    }

    /// Greedy-decode a birthplace for every eval name with trained
    /// parameters, writing predictions to `outputs`.
    pub fn evaluate(
        &self,
        variant: ModelVariant,
        pretrain_corpus: &Path,
        reading_params: &Path,
        eval_corpus: &Path,
        outputs: &Path,
    ) -> Result<EvalReport> {
        let corpus = read_corpus(pretrain_corpus)?;
        let vocab = SpanCorruptionDataset::new(&corpus, self.model.block_size, self.model.seed)?
            .vocab()
            .clone();

        // The sidecar, when present, must describe the requested variant.
        let gpt_config = self.model.gpt_config(variant, vocab.len());
        if config_path(reading_params).exists() {
            check_config(reading_params, &gpt_config).with_context(|| {
                format!("'{}' was not trained as {variant:?}", reading_params.display())
            })?;
        }

        let device = get_device();
        let model = gpt_config.init::<InferBackend>(&device)?;
        let model = load_params(model, reading_params, &device)
            .with_context(|| format!("Cannot load parameters from '{}'", reading_params.display()))?;

        let predictor = GptPredictor::new(model, vocab, device);
        let (report, predictions) = score(&predictor, eval_corpus)?;
        write_predictions(outputs, &predictions)?;
        Ok(report)
    }
}

/// Accuracy of always answering "London".
pub fn london_baseline(eval_corpus: &Path) -> Result<EvalReport> {
    let (report, _) = score(&LondonBaseline, eval_corpus)?;
    Ok(report)
}

fn write_predictions(outputs: &Path, predictions: &[String]) -> Result<()> {
    let mut text = predictions.join("\n");
    if !text.is_empty() {
        text.push('\n');
    }
    if let Some(parent) = outputs.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    fs::write(outputs, text)
        .with_context(|| format!("Cannot write predictions to '{}'", outputs.display()))?;
    tracing::info!("Wrote {} predictions to '{}'", predictions.len(), outputs.display());
    Ok(())
}

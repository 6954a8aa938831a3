// ============================================================
// Layer 5 — Inferencer
// ============================================================
// Greedy character-by-character decoding.
//
//   context   : "Ada Lovelace⁇"
//   decode    : argmax of the last position, append, repeat
//   completion: "Ada Lovelace⁇London⁇□□…"
//   prediction: text between the first and second ⁇
//
// The context is cropped to the last block_size characters
// before every forward pass.

use anyhow::Context;
use burn::prelude::*;

use crate::domain::traits::BirthplacePredictor;
use crate::domain::vocab::{CharVocab, MASK_CHAR};
use crate::error::{GptError, Result};
use crate::ml::model::Gpt;

/// Characters generated per prediction.
pub const PREDICTION_STEPS: usize = 32;

/// Extend `context` by `steps` greedily chosen token ids.
pub fn sample_greedy<B: Backend>(
    model: &Gpt<B>,
    context: &[u32],
    steps: usize,
    device: &B::Device,
) -> Result<Vec<u32>> {
    if context.is_empty() {
        return Err(GptError::Configuration("cannot sample from an empty context".into()));
    }
    let block_size = model.block_size();
    let mut ids = context.to_vec();

    for _ in 0..steps {
        let window = &ids[ids.len().saturating_sub(block_size)..];
        let len = window.len();
        let flat: Vec<i32> = window.iter().map(|&x| x as i32).collect();
        let tokens = Tensor::<B, 1, Int>::from_ints(flat.as_slice(), device).reshape([1, len]);

        let logits = model.forward(tokens)?;
        let [_, _, vocab] = logits.dims();
        let last = logits.slice([0..1, len - 1..len, 0..vocab]).reshape([1, vocab]);
        let next = last.argmax(1).into_scalar().elem::<i64>();
        ids.push(next as u32);
    }
    Ok(ids)
}

/// Text between the first and second MASK character, or after the first
/// one if the model never produced a second.
pub fn extract_prediction(completion: &str) -> String {
    completion.split(MASK_CHAR).nth(1).unwrap_or_default().to_string()
}

pub struct GptPredictor<B: Backend> {
    model:  Gpt<B>,
    vocab:  CharVocab,
    device: B::Device,
}

impl<B: Backend> GptPredictor<B> {
    pub fn new(model: Gpt<B>, vocab: CharVocab, device: B::Device) -> Self {
        Self { model, vocab, device }
    }

    pub fn complete(&self, name: &str) -> Result<String> {
        let context = self.vocab.encode(&format!("{name}{MASK_CHAR}"))?;
        let ids = sample_greedy(&self.model, &context, PREDICTION_STEPS, &self.device)?;
        Ok(self.vocab.decode(&ids))
    }
}

impl<B: Backend> BirthplacePredictor for GptPredictor<B> {
    fn predict(&self, name: &str) -> anyhow::Result<String> {
        let completion = self
            .complete(name)
            .with_context(|| format!("Cannot decode a prediction for '{name}'"))?;
        Ok(extract_prediction(&completion))
    }
}

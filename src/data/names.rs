// ============================================================
// Layer 4 — Name / Birthplace Dataset (finetuning)
// ============================================================
// Each corpus line is "name<TAB>birthplace". It becomes:
//
//   full   : name ⁇ birthplace ⁇ □□□…   (block_size + 1 chars)
//   input  : full[0 .. block_size]
//   target : full[1 .. block_size + 1], with the first
//            len(name) - 1 positions replaced by □
//
// Replacing the name echo with PAD means the loss only ever
// supervises "⁇ birthplace ⁇", so the model is never rewarded for
// predicting the name it was given.
//
// The vocabulary comes from the pretraining corpus so token ids
// line up with pretrained weights.

use burn::data::dataset::Dataset;

use crate::domain::sample::LmSample;
use crate::domain::vocab::{CharVocab, MASK_CHAR, PAD_ID};
use crate::error::{GptError, Result};

pub struct NameDataset {
    samples: Vec<LmSample>,
}

impl NameDataset {
    pub fn new(text: &str, vocab: &CharVocab, block_size: usize) -> Result<Self> {
        let samples = text
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .map(|(lineno, line)| encode_pair(line, lineno + 1, vocab, block_size))
            .collect::<Result<Vec<_>>>()?;

        tracing::info!("Name dataset: {} examples", samples.len());
        Ok(Self { samples })
    }

    pub fn from_samples(samples: Vec<LmSample>) -> Self {
        Self { samples }
    }

    pub fn into_samples(self) -> Vec<LmSample> {
        self.samples
    }

    pub fn sample_count(&self) -> usize {
        self.samples.len()
    }
}

/// Split one "name\tplace" line into its two fields.
pub fn split_pair(line: &str) -> Option<(&str, &str)> {
    let (name, place) = line.split_once('\t')?;
    Some((name, place.trim_end_matches('\r')))
}

fn encode_pair(line: &str, lineno: usize, vocab: &CharVocab, block_size: usize) -> Result<LmSample> {
    let (name, place) = split_pair(line).ok_or_else(|| {
        GptError::Corpus(format!("line {lineno}: expected 'name<TAB>birthplace'"))
    })?;

    let text = format!("{name}{MASK_CHAR}{place}{MASK_CHAR}");
    let mut ids = vocab.encode(&text)?;
    if ids.len() > block_size + 1 {
        return Err(GptError::DataShape(format!(
            "line {lineno}: {} characters do not fit in block_size {block_size}",
            ids.len()
        )));
    }
    ids.resize(block_size + 1, PAD_ID);

    let input = ids[..block_size].to_vec();
    let mut target = ids[1..].to_vec();
    let echo = name.chars().count().saturating_sub(1).min(block_size);
    target[..echo].fill(PAD_ID);

    Ok(LmSample::with_pad_mask(input, target, PAD_ID))
}

impl Dataset<LmSample> for NameDataset {
    fn get(&self, index: usize) -> Option<LmSample> {
        self.samples.get(index).cloned()
    }

    fn len(&self) -> usize {
        self.samples.len()
    }
}

// ============================================================
// Layer 4 — Span Corruption Dataset (pretraining)
// ============================================================
// Turns each line of the pretraining corpus into a
// "fill in the missing span" example:
//
//   document      : "Khatchig Mouradian is a journalist"
//   truncated     : "Khatchig Mouradian is a jour"
//   split         : prefix | masked span | suffix
//   rearranged    : prefix ⁇ suffix ⁇ masked span □□□…
//
// The model reads the rearranged string and learns to emit the
// masked span after the second ⁇. Input is the first
// `block_size` characters, target is the same string shifted
// left by one.
//
// Randomness:
//   Every fetch of index i draws a fresh corruption, but the draw
//   is a pure function of (seed, i, k) where k counts previous
//   fetches of i. Worker threads can therefore fetch in any order
//   and an epoch still sees the same examples for a given seed.
//
// Reference: Raffel et al. (2020) T5 span corruption
//            rand_chacha crate documentation

use burn::data::dataset::Dataset;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::sync::atomic::{AtomicU32, Ordering};

use crate::domain::sample::LmSample;
use crate::domain::vocab::{CharVocab, MASK_CHAR, PAD_ID};
use crate::error::{GptError, Result};

pub struct SpanCorruptionDataset {
    vocab: CharVocab,
    documents: Vec<Vec<char>>,
    block_size: usize,
    seed: u64,
    draws: Vec<AtomicU32>,
}

impl SpanCorruptionDataset {
    /// Build the dataset and its vocabulary from raw corpus text.
    /// One non-empty line = one document.
    pub fn new(corpus: &str, block_size: usize, seed: u64) -> Result<Self> {
        if block_size < 2 {
            return Err(GptError::Configuration(format!(
                "block_size must be at least 2, got {block_size}"
            )));
        }

        let vocab = CharVocab::from_corpus(corpus)?;
        let documents: Vec<Vec<char>> = corpus
            .lines()
            .filter(|l| !l.trim().is_empty())
            .map(|l| l.chars().collect())
            .collect();

        if documents.is_empty() {
            return Err(GptError::Corpus("pretraining corpus has no documents".to_string()));
        }

        tracing::info!(
            "Span corruption corpus: {} documents, vocab size {}",
            documents.len(),
            vocab.len()
        );

        let draws = (0..documents.len()).map(|_| AtomicU32::new(0)).collect();
        Ok(Self { vocab, documents, block_size, seed, draws })
    }

    pub fn vocab(&self) -> &CharVocab {
        &self.vocab
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// The corruption of document `index` for its `draw`-th fetch.
    pub fn corrupt(&self, index: usize, draw: u32) -> Option<LmSample> {
        let document = self.documents.get(index)?;
        let mut rng = ChaCha8Rng::seed_from_u64(mix_seed(self.seed, index as u64, draw as u64));

        // Keep the rearranged string (len + two MASKs) within block_size + 1.
        let max_len = (self.block_size * 7 / 8).min(self.block_size - 1).max(1);
        let min_len = 4.min(max_len);
        let truncate_len = rng.gen_range(min_len..=max_len).min(document.len());
        let doc = &document[..truncate_len];

        let mut rearranged: String = String::with_capacity(self.block_size + 1);
        if !doc.is_empty() {
            // Span length averages a quarter of the truncated document.
            let max_span = (doc.len() / 2).saturating_sub(1).max(1);
            let span_len = rng.gen_range(1..=max_span).min(doc.len());
            let start = rng.gen_range(0..=doc.len() - span_len);

            let prefix: String = doc[..start].iter().collect();
            let span: String = doc[start..start + span_len].iter().collect();
            let suffix: String = doc[start + span_len..].iter().collect();

            rearranged.push_str(&prefix);
            rearranged.push(MASK_CHAR);
            rearranged.push_str(&suffix);
            rearranged.push(MASK_CHAR);
            rearranged.push_str(&span);
        }

        let mut ids = self.vocab.encode(&rearranged).ok()?;
        ids.resize(self.block_size + 1, PAD_ID);

        let input = ids[..self.block_size].to_vec();
        let target = ids[1..].to_vec();
        Some(LmSample::with_pad_mask(input, target, PAD_ID))
    }
}

impl Dataset<LmSample> for SpanCorruptionDataset {
    fn get(&self, index: usize) -> Option<LmSample> {
        let draw = self.draws.get(index)?.fetch_add(1, Ordering::Relaxed);
        self.corrupt(index, draw)
    }

    fn len(&self) -> usize {
        self.documents.len()
    }
}

/// SplitMix64-style mixing of (seed, index, draw) into one RNG seed.
fn mix_seed(seed: u64, index: u64, draw: u64) -> u64 {
    let mut z = seed
        ^ index.wrapping_mul(0x9E37_79B9_7F4A_7C15)
        ^ draw.wrapping_mul(0xD1B5_4A32_D192_ED03);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

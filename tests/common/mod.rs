//! Shared helpers for integration tests.

#![allow(dead_code)]

use burn::backend::{
    ndarray::{NdArray, NdArrayDevice},
    Autodiff,
};

use birthplace_gpt::ml::{
    attention::{AttentionKind, SynthesisMode},
    model::GptConfig,
};

pub type TestBackend = NdArray;
pub type TrainTestBackend = Autodiff<NdArray>;

pub fn test_device() -> NdArrayDevice {
    NdArrayDevice::Cpu
}

/// 2 layers, 2 heads, width 32, no dropout.
pub fn tiny_config(vocab_size: usize, block_size: usize) -> GptConfig {
    GptConfig::new(vocab_size, block_size)
        .with_n_layer(2)
        .with_n_head(2)
        .with_n_embd(32)
        .with_dropout(0.0)
}

pub fn all_variants() -> Vec<(AttentionKind, SynthesisMode)> {
    vec![
        (AttentionKind::Causal, SynthesisMode::Dense),
        (AttentionKind::Synthesizer, SynthesisMode::Dense),
        (AttentionKind::Synthesizer, SynthesisMode::Random),
    ]
}

const FIRST: [&str; 10] = ["Ada", "Alan", "Bea", "Cy", "Dot", "Eve", "Fay", "Gus", "Hal", "Ivy"];
const LAST: [&str; 10] = ["Ng", "Li", "Ox", "Wu", "Yi", "Bo", "Jo", "Ko", "Mo", "Pi"];
const PLACES: [&str; 10] = ["Oslo", "Rome", "Lima", "Kyiv", "Baku", "Doha", "Riga", "Bern", "Graz", "Nice"];

/// 100 "name<TAB>place" lines; the place is decided by the surname.
pub fn synthetic_pairs() -> String {
    let mut lines = Vec::with_capacity(100);
    for first in FIRST {
        for (last, place) in LAST.iter().zip(PLACES) {
            lines.push(format!("{first} {last}\t{place}"));
        }
    }
    lines.join("\n")
}

/// A pretraining corpus whose vocabulary covers `synthetic_pairs`.
pub fn synthetic_corpus() -> String {
    synthetic_pairs().replace('\t', " was born in ")
}

/// Elementwise comparison of two float vectors.
pub fn assert_close(a: &[f32], b: &[f32], tol: f32) {
    assert_eq!(a.len(), b.len(), "length mismatch");
    for (i, (x, y)) in a.iter().zip(b).enumerate() {
        assert!((x - y).abs() <= tol, "index {i}: {x} vs {y}");
    }
}

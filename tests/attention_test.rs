//! Causality, normalisation and shape properties of both attention
//! mechanisms.

mod common;

use burn::prelude::*;
use burn::tensor::Distribution;

use birthplace_gpt::ml::attention::{
    AttentionConfig, AttentionCore, AttentionKind, SelfAttention, SynthesisMode,
};
use common::{all_variants, assert_close, test_device, TestBackend};

const N_EMBD: usize = 32;
const N_HEAD: usize = 4;
const BLOCK: usize = 8;

fn build(kind: AttentionKind, synthesis: SynthesisMode) -> SelfAttention<TestBackend> {
    AttentionConfig::new(N_EMBD, N_HEAD, BLOCK)
        .with_dropout(0.0)
        .with_kind(kind)
        .with_synthesis(synthesis)
        .init(&test_device())
        .unwrap()
}

fn random_input(batch: usize, len: usize) -> Tensor<TestBackend, 3> {
    Tensor::random([batch, len, N_EMBD], Distribution::Normal(0.0, 1.0), &test_device())
}

fn values<const D: usize>(t: Tensor<TestBackend, D>) -> Vec<f32> {
    t.into_data().to_vec::<f32>().unwrap()
}

#[test]
fn test_future_positions_do_not_change_the_past() {
    let keep = 5;
    for (kind, synthesis) in all_variants() {
        let attention = build(kind, synthesis);
        let x = random_input(2, BLOCK);
        let noise = random_input(2, BLOCK - keep);
        let perturbed = Tensor::cat(vec![x.clone().slice([0..2, 0..keep, 0..N_EMBD]), noise], 1);

        let before = attention.forward(x).slice([0..2, 0..keep, 0..N_EMBD]);
        let after = attention.forward(perturbed).slice([0..2, 0..keep, 0..N_EMBD]);
        assert_close(&values(before), &values(after), 1e-5);
    }
}

#[test]
fn test_rows_sum_to_one_with_exact_zeros_above_the_diagonal() {
    let len = 6;
    for (kind, synthesis) in all_variants() {
        let weights = values(build(kind, synthesis).attention_weights(random_input(2, len)));
        for (r, row) in weights.chunks(len).enumerate() {
            let i = r % len;
            let allowed: f32 = row[..=i].iter().sum();
            assert!((allowed - 1.0).abs() < 1e-5, "{kind:?}/{synthesis:?} row {i} sums to {allowed}");
            assert!(row[i + 1..].iter().all(|w| *w == 0.0), "{kind:?}/{synthesis:?} row {i} leaks");
            assert!(row.iter().all(|w| w.is_finite()));
        }
    }
}

#[test]
fn test_first_position_attends_only_to_itself() {
    for (kind, synthesis) in all_variants() {
        let weights = build(kind, synthesis).attention_weights(random_input(1, 4));
        let first_rows = values(weights.slice([0..1, 0..N_HEAD, 0..1, 0..1]));
        assert!(first_rows.iter().all(|w| (w - 1.0).abs() < 1e-6));
    }
}

#[test]
fn test_variants_share_the_output_shape() {
    for (kind, synthesis) in all_variants() {
        let out = build(kind, synthesis).forward(random_input(3, 7));
        assert_eq!(out.dims(), [3, 7, N_EMBD]);
    }
}

#[test]
fn test_random_synthesizer_ignores_input_content() {
    let attention = build(AttentionKind::Synthesizer, SynthesisMode::Random);
    let a = values(attention.attention_weights(random_input(2, BLOCK)));
    let b = values(attention.attention_weights(random_input(2, BLOCK)));
    assert_eq!(a, b);
}

#[test]
fn test_dense_synthesizer_depends_on_input() {
    let attention = build(AttentionKind::Synthesizer, SynthesisMode::Dense);
    let a = values(attention.attention_weights(random_input(1, BLOCK)));
    let b = values(attention.attention_weights(random_input(1, BLOCK) * 10.0));
    assert_ne!(a, b);
}

//! Checkpoint round trips and architecture mismatches.

mod common;

use burn::prelude::*;
use tempfile::tempdir;

use birthplace_gpt::{
    infra::checkpoint::{
        check_config, config_path, load_config, load_params, save_checkpoint, save_params,
    },
    ml::attention::{AttentionKind, SynthesisMode},
    GptError,
};
use common::{test_device, tiny_config, TestBackend};

fn logits(model: &birthplace_gpt::ml::model::Gpt<TestBackend>) -> Vec<f32> {
    let ids: Vec<i32> = vec![3, 1, 4, 1, 5, 9, 2, 6];
    let tokens = Tensor::<TestBackend, 1, Int>::from_ints(ids.as_slice(), &test_device()).reshape([1, 8]);
    model.forward(tokens).unwrap().into_data().to_vec::<f32>().unwrap()
}

#[test]
fn test_round_trip_reproduces_logits() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("model.params");
    let device = test_device();
    let config = tiny_config(12, 8);

    let original = config.init::<TestBackend>(&device).unwrap();
    save_checkpoint(&original, &config, &path).unwrap();
    assert!(path.with_extension("mpk").exists());

    let fresh = config.init::<TestBackend>(&device).unwrap();
    assert_ne!(logits(&original), logits(&fresh));

    let restored = load_params(fresh, &path, &device).unwrap();
    assert_eq!(logits(&original), logits(&restored));

    let sidecar = load_config(&path).unwrap();
    assert!(config_path(&path).exists());
    assert_eq!(sidecar.n_embd, config.n_embd);
    assert_eq!(sidecar.vocab_size, 12);
}

#[test]
fn test_synthesizer_round_trip() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("synth.params");
    let device = test_device();
    let config = tiny_config(12, 8)
        .with_attention(AttentionKind::Synthesizer)
        .with_synthesis(SynthesisMode::Random);

    let original = config.init::<TestBackend>(&device).unwrap();
    save_params(&original, &path).unwrap();
    let restored = load_params(config.init::<TestBackend>(&device).unwrap(), &path, &device).unwrap();
    assert_eq!(logits(&original), logits(&restored));
}

#[test]
fn test_different_width_is_a_format_error() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("model.params");
    let device = test_device();

    save_params(&tiny_config(12, 8).init::<TestBackend>(&device).unwrap(), &path).unwrap();
    let wider = tiny_config(12, 8).with_n_embd(64).init::<TestBackend>(&device).unwrap();
    let err = load_params(wider, &path, &device).unwrap_err();
    assert!(matches!(err, GptError::CheckpointFormat { .. }), "{err}");
}

#[test]
fn test_different_attention_is_a_format_error() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("model.params");
    let device = test_device();

    save_params(&tiny_config(12, 8).init::<TestBackend>(&device).unwrap(), &path).unwrap();
    let synth = tiny_config(12, 8)
        .with_attention(AttentionKind::Synthesizer)
        .init::<TestBackend>(&device)
        .unwrap();
    let err = load_params(synth, &path, &device).unwrap_err();
    assert!(matches!(err, GptError::CheckpointFormat { .. }), "{err}");
}

#[test]
fn test_missing_checkpoint_is_a_read_error() {
    let dir = tempdir().unwrap();
    let device = test_device();
    let model = tiny_config(12, 8).init::<TestBackend>(&device).unwrap();
    let err = load_params(model, &dir.path().join("absent.params"), &device).unwrap_err();
    assert!(matches!(err, GptError::FileRead { .. }));
}

#[test]
fn test_sidecar_must_match_the_requested_architecture() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("model.params");
    let device = test_device();
    let config = tiny_config(12, 8);
    save_checkpoint(&config.init::<TestBackend>(&device).unwrap(), &config, &path).unwrap();

    assert!(check_config(&path, &config).is_ok());
    assert!(check_config(&path, &config.clone().with_dropout(0.3)).is_ok());

    let random = config
        .clone()
        .with_attention(AttentionKind::Synthesizer)
        .with_synthesis(SynthesisMode::Random);
    let deeper = config.clone().with_n_layer(3);
    let other_vocab = tiny_config(13, 8);
    for expected in [random, deeper, other_vocab] {
        let err = check_config(&path, &expected).unwrap_err();
        assert!(matches!(err, GptError::CheckpointFormat { .. }), "{err}");
    }
}

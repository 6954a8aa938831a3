// ============================================================
// Layer 6 — Checkpoints
// ============================================================
// Model parameters are written with Burn's NamedMpkFileRecorder
// at full precision, so a reload is bit-for-bit. Optimizer
// state is never saved.
//
//   <path>.mpk            — named MessagePack record
//   <path>.manifest.json  — name and shape of every parameter
//   <path>.config.json    — GptConfig describing the architecture
//
// The recorder replaces any extension on <path> with ".mpk".
//
// Burn restores a record into whatever module it is handed, so
// the manifest is compared against the freshly built model
// BEFORE the record is read. Any difference becomes a
// CheckpointFormat error instead of a half-loaded model.
//
// Reference: Burn Book §5 (Records and Checkpointing)

use std::path::{Path, PathBuf};

use burn::{
    prelude::*,
    record::{FullPrecisionSettings, NamedMpkFileRecorder},
};
use serde::{Deserialize, Serialize};

use crate::error::{GptError, Result};
use crate::ml::{
    attention::AttentionKind,
    model::{Gpt, GptConfig},
};

type Recorder = NamedMpkFileRecorder<FullPrecisionSettings>;

fn format_error(path: &Path, reason: impl Into<String>) -> GptError {
    GptError::CheckpointFormat { path: path.to_path_buf(), reason: reason.into() }
}

/// Path of the architecture sidecar next to a checkpoint.
pub fn config_path(path: &Path) -> PathBuf {
    path.with_extension("config.json")
}

fn manifest_path(path: &Path) -> PathBuf {
    path.with_extension("manifest.json")
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct ManifestEntry {
    name:  String,
    shape: Vec<usize>,
}

fn manifest_of<B: Backend>(model: &Gpt<B>) -> Vec<ManifestEntry> {
    model
        .param_decls()
        .into_iter()
        .map(|d| ManifestEntry { name: d.name, shape: d.shape })
        .collect()
}

fn read_manifest(path: &Path) -> Result<Vec<ManifestEntry>> {
    let file = manifest_path(path);
    let json = std::fs::read_to_string(&file)
        .map_err(|source| GptError::FileRead { path: file.clone(), source })?;
    serde_json::from_str(&json).map_err(|e| format_error(&file, format!("invalid manifest: {e}")))
}

/// First difference between two manifests, if any.
fn manifest_diff(expected: &[ManifestEntry], found: &[ManifestEntry]) -> Option<String> {
    for (i, entry) in expected.iter().enumerate() {
        match found.get(i) {
            Some(f) if f == entry => continue,
            Some(f) => {
                return Some(format!(
                    "expected {} {:?}, found {} {:?}",
                    entry.name, entry.shape, f.name, f.shape
                ))
            }
            None => return Some(format!("missing parameter {} {:?}", entry.name, entry.shape)),
        }
    }
    found
        .get(expected.len())
        .map(|extra| format!("unexpected parameter {} {:?}", extra.name, extra.shape))
}

pub fn save_params<B: Backend>(model: &Gpt<B>, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    model
        .clone()
        .save_file(path.to_path_buf(), &Recorder::new())
        .map_err(|e| format_error(path, e.to_string()))?;
    let manifest = serde_json::to_string_pretty(&manifest_of(model))
        .map_err(|e| format_error(path, format!("cannot encode manifest: {e}")))?;
    std::fs::write(manifest_path(path), manifest)?;
    tracing::info!("Saved parameters to '{}'", path.with_extension("mpk").display());
    Ok(())
}

/// Saves the parameters and the architecture sidecar.
pub fn save_checkpoint<B: Backend>(model: &Gpt<B>, config: &GptConfig, path: &Path) -> Result<()> {
    save_params(model, path)?;
    config
        .save(config_path(path))
        .map_err(|e| format_error(path, format!("cannot write config sidecar: {e}")))?;
    Ok(())
}

pub fn load_config(path: &Path) -> Result<GptConfig> {
    let sidecar = config_path(path);
    GptConfig::load(&sidecar)
        .map_err(|e| format_error(&sidecar, format!("cannot read config sidecar: {e}")))
}

/// Compares the sidecar next to `path` with the architecture the caller
/// is about to build. Dropout does not change the parameter layout and
/// is not compared.
pub fn check_config(path: &Path, expected: &GptConfig) -> Result<()> {
    let found = load_config(path)?;
    let sidecar = config_path(path);

    let dims = [
        ("vocab_size", expected.vocab_size, found.vocab_size),
        ("block_size", expected.block_size, found.block_size),
        ("n_embd", expected.n_embd, found.n_embd),
        ("n_layer", expected.n_layer, found.n_layer),
        ("n_head", expected.n_head, found.n_head),
    ];
    if let Some((name, want, got)) = dims.iter().find(|(_, want, got)| want != got) {
        return Err(format_error(&sidecar, format!("{name} is {got} in the checkpoint, expected {want}")));
    }

    let same_attention = expected.attention == found.attention
        && (expected.attention == AttentionKind::Causal || expected.synthesis == found.synthesis);
    if !same_attention {
        return Err(format_error(
            &sidecar,
            format!(
                "checkpoint uses {:?}/{:?} attention, expected {:?}/{:?}",
                found.attention, found.synthesis, expected.attention, expected.synthesis
            ),
        ));
    }
    Ok(())
}

/// Loads a checkpoint into `model`, which must be freshly built with the
/// same architecture the checkpoint was written from.
pub fn load_params<B: Backend>(model: Gpt<B>, path: &Path, device: &B::Device) -> Result<Gpt<B>> {
    let file = path.with_extension("mpk");
    if !file.exists() {
        return Err(GptError::FileRead {
            path: file,
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "checkpoint not found"),
        });
    }

    let expected = manifest_of(&model);
    if let Some(diff) = manifest_diff(&expected, &read_manifest(path)?) {
        return Err(format_error(path, diff));
    }

    let loaded = model
        .load_file(path.to_path_buf(), &Recorder::new(), device)
        .map_err(|e| format_error(path, e.to_string()))?;
    if let Some(diff) = manifest_diff(&expected, &manifest_of(&loaded)) {
        return Err(format_error(path, diff));
    }

    tracing::info!("Loaded {} parameter tensors from '{}'", expected.len(), file.display());
    Ok(loaded)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(name: &str, shape: &[usize]) -> ManifestEntry {
        ManifestEntry { name: name.to_string(), shape: shape.to_vec() }
    }

    #[test]
    fn identical_manifests_have_no_diff() {
        let m = vec![entry("a", &[2, 3]), entry("b", &[3])];
        assert_eq!(manifest_diff(&m, &m.clone()), None);
    }

    #[test]
    fn shape_and_length_differences_are_reported() {
        let expected = vec![entry("a", &[2, 3]), entry("b", &[3])];
        let reshaped = vec![entry("a", &[2, 4]), entry("b", &[3])];
        assert!(manifest_diff(&expected, &reshaped).unwrap().contains("[2, 4]"));

        let short = vec![entry("a", &[2, 3])];
        assert!(manifest_diff(&expected, &short).unwrap().starts_with("missing"));

        let long = vec![entry("a", &[2, 3]), entry("b", &[3]), entry("c", &[1])];
        assert!(manifest_diff(&expected, &long).unwrap().starts_with("unexpected"));
    }
}

// ============================================================
// Layer 4 — LM Batcher
// ============================================================
// Implements Burn's Batcher trait to stack a Vec<LmSample>
// into tensors of shape [batch, seq_len].
//
//   inputs  : Int   [batch, seq_len]
//   targets : Int   [batch, seq_len]
//   mask    : Float [batch, seq_len]  (1.0 supervised, 0.0 not)
//
// The Batcher trait cannot fail, so a ragged set of samples is
// not stacked. It is reported through `shape_error` instead and
// the training loop turns that into a DataShape error.
//
// Reference: Burn Book §4 (Batcher)

use burn::{data::dataloader::batcher::Batcher, prelude::*};

use crate::domain::sample::LmSample;
use crate::error::{GptError, Result};

#[derive(Debug, Clone)]
pub struct LmBatch<B: Backend> {
    pub inputs: Tensor<B, 2, Int>,
    pub targets: Tensor<B, 2, Int>,
    pub mask: Tensor<B, 2>,
    /// Positions with mask = 1 across the whole batch
    pub supervised_tokens: usize,
    pub shape_error: Option<String>,
}

impl<B: Backend> LmBatch<B> {
    /// Fail if the batcher saw ragged samples or the windows are not
    /// exactly `block_size` long.
    pub fn validate(&self, block_size: usize) -> Result<()> {
        if let Some(reason) = &self.shape_error {
            return Err(GptError::DataShape(reason.clone()));
        }
        let [_, seq_len] = self.inputs.dims();
        if seq_len != block_size {
            return Err(GptError::DataShape(format!(
                "token window of length {seq_len}, expected block_size {block_size}"
            )));
        }
        Ok(())
    }
}

#[derive(Clone, Debug)]
pub struct LmBatcher<B: Backend> {
    pub device: B::Device,
}

impl<B: Backend> LmBatcher<B> {
    pub fn new(device: B::Device) -> Self {
        Self { device }
    }
}

impl<B: Backend> Batcher<LmSample, LmBatch<B>> for LmBatcher<B> {
    fn batch(&self, items: Vec<LmSample>) -> LmBatch<B> {
        let batch_size = items.len();
        let seq_len = items.first().map(|s| s.len()).unwrap_or(0);

        let ragged = items.iter().position(|s| {
            s.input.len() != seq_len || s.target.len() != seq_len || s.mask.len() != seq_len
        });
        let shape_error = ragged.map(|i| {
            format!("sample {i} in batch does not have the batch length {seq_len}")
        });
        // Stack only the well-formed prefix so tensor construction cannot panic.
        let usable = &items[..ragged.unwrap_or(batch_size)];

        let input_flat: Vec<i32> = usable
            .iter()
            .flat_map(|s| s.input.iter().map(|&x| x as i32))
            .collect();
        let target_flat: Vec<i32> = usable
            .iter()
            .flat_map(|s| s.target.iter().map(|&x| x as i32))
            .collect();
        let mask_flat: Vec<f32> = usable
            .iter()
            .flat_map(|s| s.mask.iter().map(|&m| f32::from(m)))
            .collect();
        let supervised_tokens = usable.iter().map(LmSample::supervised_tokens).sum();

        let rows = usable.len();
        let inputs = Tensor::<B, 1, Int>::from_ints(input_flat.as_slice(), &self.device)
            .reshape([rows, seq_len]);
        let targets = Tensor::<B, 1, Int>::from_ints(target_flat.as_slice(), &self.device)
            .reshape([rows, seq_len]);
        let mask = Tensor::<B, 1>::from_floats(mask_flat.as_slice(), &self.device)
            .reshape([rows, seq_len]);

        LmBatch { inputs, targets, mask, supervised_tokens, shape_error }
    }
}

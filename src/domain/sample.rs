// ============================================================
// Layer 3 — LmSample Domain Type
// ============================================================
// One supervised example for next-character prediction.
//
//   input  : the token window fed to the model
//   target : the token the model should predict at each position
//   mask   : 1 where the target is supervised, 0 where it is not
//
// All three have exactly `block_size` entries. The mask is kept
// explicitly (instead of being recomputed from PAD) so the loss
// never has to know which id means padding.

use serde::{Deserialize, Serialize};

use crate::error::{GptError, Result};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LmSample {
    pub input: Vec<u32>,
    pub target: Vec<u32>,
    pub mask: Vec<u8>,
}

impl LmSample {
    /// Build a sample whose mask marks every non-`pad_id` target.
    pub fn with_pad_mask(input: Vec<u32>, target: Vec<u32>, pad_id: u32) -> Self {
        let mask = target.iter().map(|&t| u8::from(t != pad_id)).collect();
        Self { input, target, mask }
    }

    pub fn len(&self) -> usize {
        self.input.len()
    }

    pub fn is_empty(&self) -> bool {
        self.input.is_empty()
    }

    /// Number of positions that contribute to the loss.
    pub fn supervised_tokens(&self) -> usize {
        self.mask.iter().filter(|&&m| m != 0).count()
    }

    /// Check that input, target and mask all have exactly `block_size` entries.
    pub fn validate(&self, block_size: usize) -> Result<()> {
        let lens = [self.input.len(), self.target.len(), self.mask.len()];
        if lens.iter().any(|&l| l != block_size) {
            return Err(GptError::DataShape(format!(
                "sample lengths (input, target, mask) = {lens:?}, expected {block_size} each"
            )));
        }
        Ok(())
    }
}

// Token-driven learning rate: linear warmup, then cosine decay
// down to a floor of 10% of the base rate.

use std::f64::consts::PI;

use serde::{Deserialize, Serialize};

const FLOOR: f64 = 0.1;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LrSchedule {
    pub base_rate:     f64,
    pub lr_decay:      bool,
    pub warmup_tokens: u64,
    pub final_tokens:  u64,
}

impl LrSchedule {
    /// Effective rate after `tokens` supervised tokens have been processed.
    pub fn rate_at(&self, tokens: u64) -> f64 {
        if !self.lr_decay {
            return self.base_rate;
        }
        if tokens < self.warmup_tokens {
            return self.base_rate * tokens as f64 / self.warmup_tokens as f64;
        }

        let span = self.final_tokens.saturating_sub(self.warmup_tokens);
        let progress = if span == 0 {
            1.0
        } else {
            ((tokens - self.warmup_tokens) as f64 / span as f64).clamp(0.0, 1.0)
        };
        self.base_rate * (0.5 * (1.0 + (PI * progress).cos())).max(FLOOR)
    }
}

// ============================================================
// Layer 5 — Causal Attention Variants
// ============================================================
// Two ways of producing a causal attention distribution behind
// one contract, AttentionCore:
//
//   CausalSelfAttention   scores = q·kᵀ / √d_head
//   SynthesizerAttention  scores are synthesized per position
//                         Dense  : relu(W1·x_i) · W2[:, j] + b2[j]
//                         Random : R[h, i, j], a learned table
//
// Both share the value path, the causal mask, the stable
// softmax and the output projection. A block holds a
// SelfAttention, which wraps exactly one of them.
//
// Reference: Vaswani et al. (2017) Attention Is All You Need
//            Tay et al. (2020) Synthesizer: Rethinking
//            Self-Attention in Transformer Models

use burn::{
    module::Param,
    nn::{Dropout, DropoutConfig, Initializer, Linear, LinearConfig},
    prelude::*,
    tensor::{activation::relu, Distribution},
};
use serde::{Deserialize, Serialize};

use crate::error::GptError;
use crate::ml::params::ParamCollector;

/// Fill value for blocked positions; exp() of it underflows to exactly 0.
const MASK_FILL: f32 = -1.0e10;

/// Which attention mechanism every block of a model uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttentionKind {
    Causal,
    Synthesizer,
}

/// How a synthesizer produces its score matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SynthesisMode {
    Dense,
    Random,
}

pub trait AttentionCore<B: Backend> {
    /// `[batch, len, n_embd]` in, same shape out.
    fn forward(&self, x: Tensor<B, 3>) -> Tensor<B, 3>;

    /// Post-softmax, pre-dropout weights, `[batch, n_head, len, len]`.
    fn attention_weights(&self, x: Tensor<B, 3>) -> Tensor<B, 4>;

    fn declare_params(&self, params: &mut ParamCollector);
}

#[derive(Config, Debug)]
pub struct AttentionConfig {
    pub n_embd:     usize,
    pub n_head:     usize,
    pub block_size: usize,
    #[config(default = "0.1")]
    pub dropout:    f64,
    #[config(default = "AttentionKind::Causal")]
    pub kind:       AttentionKind,
    #[config(default = "SynthesisMode::Dense")]
    pub synthesis:  SynthesisMode,
}

impl AttentionConfig {
    pub fn validate(&self) -> crate::error::Result<()> {
        if self.n_embd == 0 || self.n_head == 0 || self.block_size == 0 {
            return Err(GptError::Configuration(format!(
                "attention dimensions must be non-zero (n_embd={}, n_head={}, block_size={})",
                self.n_embd, self.n_head, self.block_size
            )));
        }
        if self.n_embd % self.n_head != 0 {
            return Err(GptError::Configuration(format!(
                "n_embd ({}) is not divisible by n_head ({})",
                self.n_embd, self.n_head
            )));
        }
        Ok(())
    }

    pub fn init<B: Backend>(&self, device: &B::Device) -> crate::error::Result<SelfAttention<B>> {
        self.validate()?;
        let attention = match self.kind {
            AttentionKind::Causal => SelfAttention {
                causal:      Some(self.init_causal(device)),
                synthesizer: None,
            },
            AttentionKind::Synthesizer => SelfAttention {
                causal:      None,
                synthesizer: Some(self.init_synthesizer(device)),
            },
        };
        Ok(attention)
    }

    fn linear<B: Backend>(&self, d_in: usize, d_out: usize, device: &B::Device) -> Linear<B> {
        LinearConfig::new(d_in, d_out)
            .with_initializer(Initializer::Normal { mean: 0.0, std: 0.02 })
            .init(device)
    }

    fn init_causal<B: Backend>(&self, device: &B::Device) -> CausalSelfAttention<B> {
        CausalSelfAttention {
            key:        self.linear(self.n_embd, self.n_embd, device),
            query:      self.linear(self.n_embd, self.n_embd, device),
            value:      self.linear(self.n_embd, self.n_embd, device),
            proj:       self.linear(self.n_embd, self.n_embd, device),
            attn_drop:  DropoutConfig::new(self.dropout).init(),
            resid_drop: DropoutConfig::new(self.dropout).init(),
            n_head:     self.n_head,
        }
    }

    fn init_synthesizer<B: Backend>(&self, device: &B::Device) -> SynthesizerAttention<B> {
        let d_head = self.n_embd / self.n_head;
        let small = Distribution::Uniform(-0.001, 0.001);
        let (w1, w2, b2, table) = match self.synthesis {
            SynthesisMode::Dense => (
                Some(self.linear(self.n_embd, self.n_embd, device)),
                Some(Param::from_tensor(Tensor::random([d_head, self.block_size], small, device))),
                Some(Param::from_tensor(Tensor::zeros([self.block_size], device))),
                None,
            ),
            SynthesisMode::Random => (
                None,
                None,
                None,
                Some(Param::from_tensor(Tensor::random(
                    [self.n_head, self.block_size, self.block_size],
                    Distribution::Normal(0.0, 0.02),
                    device,
                ))),
            ),
        };
        SynthesizerAttention {
            w1,
            w2,
            b2,
            table,
            value:      self.linear(self.n_embd, self.n_embd, device),
            proj:       self.linear(self.n_embd, self.n_embd, device),
            attn_drop:  DropoutConfig::new(self.dropout).init(),
            resid_drop: DropoutConfig::new(self.dropout).init(),
            n_head:     self.n_head,
        }
    }
}

// ── Shared pieces ────────────────────────────────────────────

/// `[b, t, c]` → `[b, h, t, c / h]`
fn split_heads<B: Backend>(x: Tensor<B, 3>, n_head: usize) -> Tensor<B, 4> {
    let [b, t, c] = x.dims();
    x.reshape([b, t, n_head, c / n_head]).swap_dims(1, 2)
}

/// `[b, h, t, d]` → `[b, t, h * d]`
fn merge_heads<B: Backend>(y: Tensor<B, 4>) -> Tensor<B, 3> {
    let [b, h, t, d] = y.dims();
    y.swap_dims(1, 2).reshape([b, t, h * d])
}

/// Blocks every key position after the query position, then takes a
/// softmax with the row max subtracted. Row i is non-zero on 0..=i only.
pub fn causal_softmax<B: Backend>(scores: Tensor<B, 4>) -> Tensor<B, 4> {
    let [b, h, t, s] = scores.dims();
    let blocked = Tensor::<B, 2, Bool>::tril_mask([t, s], 0, &scores.device())
        .unsqueeze_dims::<4>(&[0, 1])
        .expand([b, h, t, s]);
    let scores = scores.mask_fill(blocked, MASK_FILL);

    let row_max = scores.clone().max_dim(3).detach();
    let exp = (scores - row_max).exp();
    let denom = exp.clone().sum_dim(3);
    exp / denom
}

// ── Causal self-attention ────────────────────────────────────

#[derive(Module, Debug)]
pub struct CausalSelfAttention<B: Backend> {
    pub key:        Linear<B>,
    pub query:      Linear<B>,
    pub value:      Linear<B>,
    pub proj:       Linear<B>,
    pub attn_drop:  Dropout,
    pub resid_drop: Dropout,
    pub n_head:     usize,
}

impl<B: Backend> AttentionCore<B> for CausalSelfAttention<B> {
    fn forward(&self, x: Tensor<B, 3>) -> Tensor<B, 3> {
        let att = self.attn_drop.forward(self.attention_weights(x.clone()));
        let v = split_heads(self.value.forward(x), self.n_head);
        let y = merge_heads(att.matmul(v));
        self.resid_drop.forward(self.proj.forward(y))
    }

    fn attention_weights(&self, x: Tensor<B, 3>) -> Tensor<B, 4> {
        let [_, _, c] = x.dims();
        let d_head = c / self.n_head;
        let q = split_heads(self.query.forward(x.clone()), self.n_head);
        let k = split_heads(self.key.forward(x), self.n_head);
        let scores = q.matmul(k.swap_dims(2, 3)) / (d_head as f32).sqrt();
        causal_softmax(scores)
    }

    fn declare_params(&self, params: &mut ParamCollector) {
        params.linear("key", &self.key);
        params.linear("query", &self.query);
        params.linear("value", &self.value);
        params.linear("proj", &self.proj);
    }
}

// ── Synthesizer attention ────────────────────────────────────

/// Dense mode owns `w1`, `w2`, `b2`; random mode owns `table`.
#[derive(Module, Debug)]
pub struct SynthesizerAttention<B: Backend> {
    pub w1:         Option<Linear<B>>,
    pub w2:         Option<Param<Tensor<B, 2>>>,
    pub b2:         Option<Param<Tensor<B, 1>>>,
    pub table:      Option<Param<Tensor<B, 3>>>,
    pub value:      Linear<B>,
    pub proj:       Linear<B>,
    pub attn_drop:  Dropout,
    pub resid_drop: Dropout,
    pub n_head:     usize,
}

impl<B: Backend> SynthesizerAttention<B> {
    pub fn mode(&self) -> SynthesisMode {
        if self.table.is_some() {
            SynthesisMode::Random
        } else {
            SynthesisMode::Dense
        }
    }

    fn synthesize(&self, x: Tensor<B, 3>) -> Tensor<B, 4> {
        let [b, t, _] = x.dims();
        let h = self.n_head;

        if let Some(table) = &self.table {
            return table
                .val()
                .slice([0..h, 0..t, 0..t])
                .unsqueeze::<4>()
                .expand([b, h, t, t]);
        }

        match (&self.w1, &self.w2, &self.b2) {
            (Some(w1), Some(w2), Some(b2)) => {
                let a = split_heads(relu(w1.forward(x)), h);
                let [_, _, _, d] = a.dims();
                let w2 = w2.val().slice([0..d, 0..t]).unsqueeze::<4>().expand([b, h, d, t]);
                let b2 = b2.val().slice([0..t]).reshape([1, 1, 1, t]).expand([b, h, t, t]);
                a.matmul(w2) + b2
            }
            _ => unreachable!("synthesizer is built with either a table or w1/w2/b2"),
        }
    }
}

impl<B: Backend> AttentionCore<B> for SynthesizerAttention<B> {
    fn forward(&self, x: Tensor<B, 3>) -> Tensor<B, 3> {
        let att = self.attn_drop.forward(self.attention_weights(x.clone()));
        let v = split_heads(self.value.forward(x), self.n_head);
        let y = merge_heads(att.matmul(v));
        self.resid_drop.forward(self.proj.forward(y))
    }

    fn attention_weights(&self, x: Tensor<B, 3>) -> Tensor<B, 4> {
        causal_softmax(self.synthesize(x))
    }

    fn declare_params(&self, params: &mut ParamCollector) {
        if let Some(w1) = &self.w1 {
            params.linear("w1", w1);
        }
        if let Some(w2) = &self.w2 {
            params.param("w2", w2, true);
        }
        if let Some(b2) = &self.b2 {
            params.param("b2", b2, false);
        }
        if let Some(table) = &self.table {
            params.param("table", table, true);
        }
        params.linear("value", &self.value);
        params.linear("proj", &self.proj);
    }
}

// ── Dispatch ─────────────────────────────────────────────────

/// Exactly one of the two fields is set, fixed at construction.
#[derive(Module, Debug)]
pub struct SelfAttention<B: Backend> {
    pub causal:      Option<CausalSelfAttention<B>>,
    pub synthesizer: Option<SynthesizerAttention<B>>,
}

impl<B: Backend> SelfAttention<B> {
    pub fn kind(&self) -> AttentionKind {
        if self.causal.is_some() {
            AttentionKind::Causal
        } else {
            AttentionKind::Synthesizer
        }
    }

    fn core(&self) -> &dyn AttentionCore<B> {
        match (&self.causal, &self.synthesizer) {
            (Some(causal), _) => causal,
            (None, Some(synthesizer)) => synthesizer,
            (None, None) => unreachable!("SelfAttention is built with one variant"),
        }
    }
}

impl<B: Backend> AttentionCore<B> for SelfAttention<B> {
    fn forward(&self, x: Tensor<B, 3>) -> Tensor<B, 3> {
        self.core().forward(x)
    }

    fn attention_weights(&self, x: Tensor<B, 3>) -> Tensor<B, 4> {
        self.core().attention_weights(x)
    }

    fn declare_params(&self, params: &mut ParamCollector) {
        if self.causal.is_some() || self.synthesizer.is_some() {
            self.core().declare_params(params);
        }
    }
}

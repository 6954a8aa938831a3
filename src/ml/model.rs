use burn::{
    module::Param,
    nn::{
        Dropout, DropoutConfig,
        Embedding, EmbeddingConfig,
        Initializer,
        LayerNorm, LayerNormConfig,
        Linear, LinearConfig,
    },
    prelude::*,
    tensor::activation::{gelu, log_softmax},
};

use crate::error::GptError;
use crate::ml::attention::{AttentionConfig, AttentionCore, AttentionKind, SelfAttention, SynthesisMode};
use crate::ml::params::{ParamCollector, ParamDecl};

// #[derive(Config)] supplies Clone, Serialize and Deserialize.
#[derive(Config, Debug)]
pub struct GptConfig {
    pub vocab_size: usize,
    pub block_size: usize,
    #[config(default = "256")]
    pub n_embd:     usize,
    #[config(default = "4")]
    pub n_layer:    usize,
    #[config(default = "8")]
    pub n_head:     usize,
    #[config(default = "0.1")]
    pub dropout:    f64,
    #[config(default = "AttentionKind::Causal")]
    pub attention:  AttentionKind,
    #[config(default = "SynthesisMode::Dense")]
    pub synthesis:  SynthesisMode,
}

impl GptConfig {
    pub fn validate(&self) -> crate::error::Result<()> {
        if self.vocab_size == 0 || self.block_size == 0 || self.n_layer == 0 {
            return Err(GptError::Configuration(format!(
                "model dimensions must be non-zero (vocab_size={}, block_size={}, n_layer={})",
                self.vocab_size, self.block_size, self.n_layer
            )));
        }
        if !(0.0..1.0).contains(&self.dropout) {
            return Err(GptError::Configuration(format!(
                "dropout must lie in [0, 1), got {}",
                self.dropout
            )));
        }
        self.attention_config().validate()
    }

    fn attention_config(&self) -> AttentionConfig {
        AttentionConfig::new(self.n_embd, self.n_head, self.block_size)
            .with_dropout(self.dropout)
            .with_kind(self.attention)
            .with_synthesis(self.synthesis)
    }

    /// Seeds the backend RNG first so two calls with the same seed
    /// produce identical parameters.
    pub fn init_seeded<B: Backend>(&self, seed: u64, device: &B::Device) -> crate::error::Result<Gpt<B>> {
        B::seed(seed);
        self.init(device)
    }

    pub fn init<B: Backend>(&self, device: &B::Device) -> crate::error::Result<Gpt<B>> {
        self.validate()?;
        let normal = Initializer::Normal { mean: 0.0, std: 0.02 };

        let tok_emb = EmbeddingConfig::new(self.vocab_size, self.n_embd)
            .with_initializer(normal.clone())
            .init(device);
        let pos_emb = Param::from_tensor(Tensor::zeros([self.block_size, self.n_embd], device));
        let blocks = (0..self.n_layer)
            .map(|_| self.build_block(device))
            .collect::<crate::error::Result<Vec<_>>>()?;
        let ln_f = LayerNormConfig::new(self.n_embd).init(device);
        let head = LinearConfig::new(self.n_embd, self.vocab_size)
            .with_bias(false)
            .with_initializer(normal)
            .init(device);

        let model = Gpt {
            tok_emb,
            pos_emb,
            drop: DropoutConfig::new(self.dropout).init(),
            blocks,
            ln_f,
            head,
            block_size: self.block_size,
        };
        tracing::info!(
            "Initialised {:?} GPT: {} layers, {} heads, width {}, {} parameters",
            self.attention,
            self.n_layer,
            self.n_head,
            self.n_embd,
            model.num_params()
        );
        Ok(model)
    }

    fn build_block<B: Backend>(&self, device: &B::Device) -> crate::error::Result<Block<B>> {
        let normal = Initializer::Normal { mean: 0.0, std: 0.02 };
        Ok(Block {
            ln1:      LayerNormConfig::new(self.n_embd).init(device),
            attn:     self.attention_config().init(device)?,
            ln2:      LayerNormConfig::new(self.n_embd).init(device),
            mlp_fc:   LinearConfig::new(self.n_embd, 4 * self.n_embd)
                .with_initializer(normal.clone())
                .init(device),
            mlp_proj: LinearConfig::new(4 * self.n_embd, self.n_embd)
                .with_initializer(normal)
                .init(device),
            mlp_drop: DropoutConfig::new(self.dropout).init(),
        })
    }
}

/// Pre-norm transformer block: x + attn(ln1(x)), then x + mlp(ln2(x)).
#[derive(Module, Debug)]
pub struct Block<B: Backend> {
    pub ln1:      LayerNorm<B>,
    pub attn:     SelfAttention<B>,
    pub ln2:      LayerNorm<B>,
    pub mlp_fc:   Linear<B>,
    pub mlp_proj: Linear<B>,
    pub mlp_drop: Dropout,
}

impl<B: Backend> Block<B> {
    pub fn forward(&self, x: Tensor<B, 3>) -> Tensor<B, 3> {
        let x = x.clone() + self.attn.forward(self.ln1.forward(x));
        let hidden = gelu(self.mlp_fc.forward(self.ln2.forward(x.clone())));
        x + self.mlp_drop.forward(self.mlp_proj.forward(hidden))
    }

    fn declare_params(&self, params: &mut ParamCollector) {
        params.layer_norm("ln1", &self.ln1);
        params.scope("attn", |p| self.attn.declare_params(p));
        params.layer_norm("ln2", &self.ln2);
        params.linear("mlp_fc", &self.mlp_fc);
        params.linear("mlp_proj", &self.mlp_proj);
    }
}

#[derive(Module, Debug)]
pub struct Gpt<B: Backend> {
    pub tok_emb:    Embedding<B>,
    pub pos_emb:    Param<Tensor<B, 2>>,
    pub drop:       Dropout,
    pub blocks:     Vec<Block<B>>,
    pub ln_f:       LayerNorm<B>,
    pub head:       Linear<B>,
    pub block_size: usize,
}

impl<B: Backend> Gpt<B> {
    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// tokens: [batch, len] → logits: [batch, len, vocab]
    pub fn forward(&self, tokens: Tensor<B, 2, Int>) -> crate::error::Result<Tensor<B, 3>> {
        let [batch, len] = tokens.dims();
        if len > self.block_size {
            return Err(GptError::Configuration(format!(
                "sequence length {len} exceeds block size {}",
                self.block_size
            )));
        }

        let tok = self.tok_emb.forward(tokens);
        let [_, _, n_embd] = tok.dims();
        let pos = self
            .pos_emb
            .val()
            .slice([0..len, 0..n_embd])
            .unsqueeze::<3>()
            .expand([batch, len, n_embd]);

        let mut x = self.drop.forward(tok + pos);
        for block in &self.blocks {
            x = block.forward(x);
        }
        Ok(self.head.forward(self.ln_f.forward(x)))
    }

    /// Mean negative log-likelihood over positions where `mask` is 1.
    /// An all-zero mask gives a loss of exactly 0.
    pub fn forward_loss(
        &self,
        tokens: Tensor<B, 2, Int>,
        targets: Tensor<B, 2, Int>,
        mask: Tensor<B, 2>,
    ) -> crate::error::Result<(Tensor<B, 3>, Tensor<B, 1>)> {
        let token_dims = tokens.dims();
        if targets.dims() != token_dims || mask.dims() != token_dims {
            return Err(GptError::DataShape(format!(
                "tokens {:?}, targets {:?} and mask {:?} must share one shape",
                token_dims,
                targets.dims(),
                mask.dims()
            )));
        }

        let logits = self.forward(tokens)?;
        let [batch, len, vocab] = logits.dims();
        let rows = batch * len;

        let log_probs = log_softmax(logits.clone().reshape([rows, vocab]), 1);
        let picked = log_probs.gather(1, targets.reshape([rows, 1])).reshape([rows]);
        let mask = mask.reshape([rows]);

        let supervised = mask.clone().sum().clamp_min(1.0);
        let loss = (picked.neg() * mask).sum() / supervised;
        Ok((logits, loss))
    }

    /// Every parameter, in a stable order, with its decay group.
    pub fn param_decls(&self) -> Vec<ParamDecl> {
        let mut params = ParamCollector::new();
        params.embedding("tok_emb", &self.tok_emb);
        params.param("pos_emb", &self.pos_emb, false);
        for (i, block) in self.blocks.iter().enumerate() {
            params.scope(format!("blocks.{i}"), |p| block.declare_params(p));
        }
        params.layer_norm("ln_f", &self.ln_f);
        params.linear("head", &self.head);
        params.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type B = NdArray;

    fn tiny() -> GptConfig {
        GptConfig::new(10, 8)
            .with_n_embd(16)
            .with_n_layer(2)
            .with_n_head(2)
            .with_dropout(0.0)
    }

    #[test]
    fn logits_have_vocab_width() {
        let device = Default::default();
        let model = tiny().init::<B>(&device).unwrap();
        let tokens = Tensor::<B, 2, Int>::zeros([3, 5], &device);
        assert_eq!(model.forward(tokens).unwrap().dims(), [3, 5, 10]);
    }

    #[test]
    fn zero_dimensions_are_rejected() {
        let config = tiny().with_n_layer(0);
        assert!(matches!(config.validate(), Err(GptError::Configuration(_))));
    }

    #[test]
    fn mismatched_mask_is_a_shape_error() {
        let device = Default::default();
        let model = tiny().init::<B>(&device).unwrap();
        let tokens = Tensor::<B, 2, Int>::zeros([2, 4], &device);
        let targets = Tensor::<B, 2, Int>::zeros([2, 4], &device);
        let mask = Tensor::<B, 2>::ones([2, 3], &device);
        let result = model.forward_loss(tokens, targets, mask);
        assert!(matches!(result, Err(GptError::DataShape(_))));
    }

    #[test]
    fn head_has_no_bias() {
        let device = Default::default();
        let model = tiny().init::<B>(&device).unwrap();
        let names: Vec<String> = model.param_decls().into_iter().map(|d| d.name).collect();
        assert!(names.contains(&"head.weight".to_string()));
        assert!(!names.contains(&"head.bias".to_string()));
        assert!(names.contains(&"blocks.1.attn.query.weight".to_string()));
    }
}

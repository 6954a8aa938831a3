// ============================================================
// Layer 5 — Parameter Declarations and Decay Partition
// ============================================================
// Every layer states, at the point where it owns a parameter,
// whether that parameter takes weight decay:
//
//   decayed      : matrix weights (attention projections,
//                  synthesizer weights, feed-forward, LM head)
//   non-decayed  : biases, LayerNorm gamma/beta, embeddings
//
// Nothing inspects names or types after the fact. The model
// walks its layers once, collects a ParamDecl per parameter and
// the optimizer receives the frozen ParamPartition.
//
// The same declarations double as the checkpoint manifest:
// names and shapes are compared after loading a record.

use std::collections::HashSet;

use burn::{
    module::{Param, ParamId},
    nn::{Embedding, LayerNorm, Linear},
    prelude::*,
};

use crate::error::{GptError, Result};

/// One trainable tensor: where it lives, how big it is, whether it decays.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamDecl {
    pub name: String,
    pub id: ParamId,
    pub shape: Vec<usize>,
    pub decay: bool,
}

impl ParamDecl {
    pub fn rank(&self) -> usize {
        self.shape.len()
    }

    pub fn numel(&self) -> usize {
        self.shape.iter().product()
    }
}

/// Collects declarations while a module tree is walked.
#[derive(Debug, Default)]
pub struct ParamCollector {
    prefix: Vec<String>,
    decls: Vec<ParamDecl>,
}

impl ParamCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `f` with `name` appended to the current path.
    pub fn scope(&mut self, name: impl Into<String>, f: impl FnOnce(&mut Self)) {
        self.prefix.push(name.into());
        f(self);
        self.prefix.pop();
    }

    fn path(&self, name: &str) -> String {
        let mut parts = self.prefix.clone();
        parts.push(name.to_string());
        parts.join(".")
    }

    pub fn param<B: Backend, const D: usize>(
        &mut self,
        name: &str,
        param: &Param<Tensor<B, D>>,
        decay: bool,
    ) {
        self.decls.push(ParamDecl {
            name: self.path(name),
            id: param.id.clone(),
            shape: param.val().dims().to_vec(),
            decay,
        });
    }

    /// Weight decays, bias does not.
    pub fn linear<B: Backend>(&mut self, name: &str, linear: &Linear<B>) {
        self.scope(name, |c| {
            c.param("weight", &linear.weight, true);
            if let Some(bias) = &linear.bias {
                c.param("bias", bias, false);
            }
        });
    }

    pub fn layer_norm<B: Backend>(&mut self, name: &str, norm: &LayerNorm<B>) {
        self.scope(name, |c| {
            c.param("gamma", &norm.gamma, false);
            c.param("beta", &norm.beta, false);
        });
    }

    pub fn embedding<B: Backend>(&mut self, name: &str, embedding: &Embedding<B>) {
        self.scope(name, |c| c.param("weight", &embedding.weight, false));
    }

    pub fn finish(self) -> Vec<ParamDecl> {
        self.decls
    }
}

/// Immutable split of a model's parameters into the two decay groups.
#[derive(Debug, Clone)]
pub struct ParamPartition {
    decayed: Vec<ParamDecl>,
    non_decayed: Vec<ParamDecl>,
}

impl ParamPartition {
    /// Fails if any parameter id is declared twice.
    pub fn new(decls: Vec<ParamDecl>) -> Result<Self> {
        let mut seen = HashSet::new();
        for decl in &decls {
            if !seen.insert(decl.id.clone()) {
                return Err(GptError::Configuration(format!(
                    "parameter '{}' is declared more than once",
                    decl.name
                )));
            }
        }

        let (decayed, non_decayed): (Vec<_>, Vec<_>) = decls.into_iter().partition(|d| d.decay);
        tracing::debug!(
            "Parameter partition: {} decayed ({} values), {} non-decayed ({} values)",
            decayed.len(),
            decayed.iter().map(ParamDecl::numel).sum::<usize>(),
            non_decayed.len(),
            non_decayed.iter().map(ParamDecl::numel).sum::<usize>(),
        );
        Ok(Self { decayed, non_decayed })
    }

    pub fn decayed(&self) -> &[ParamDecl] {
        &self.decayed
    }

    pub fn non_decayed(&self) -> &[ParamDecl] {
        &self.non_decayed
    }

    pub fn iter(&self) -> impl Iterator<Item = &ParamDecl> {
        self.decayed.iter().chain(self.non_decayed.iter())
    }

    pub fn len(&self) -> usize {
        self.decayed.len() + self.non_decayed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

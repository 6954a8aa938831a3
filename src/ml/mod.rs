// ============================================================
// Layer 5 — ML / Model Layer (Burn)
// ============================================================
// Everything that touches tensors:
//
//   attention.rs  — AttentionCore trait, causal self-attention,
//                   dense and random synthesizer attention
//   model.rs      — GPT: embeddings, pre-norm blocks, LM head,
//                   masked next-character loss
//   params.rs     — per-layer parameter declarations and the
//                   weight-decay partition
//   schedule.rs   — token-driven warmup + cosine learning rate
//   optimizer.rs  — two AdamW groups, global-norm clipping
//   trainer.rs    — epoch/batch state machine, validation,
//                   checkpoints, metrics
//   inferencer.rs — greedy decoding and the GPT predictor
//   backend.rs    — NdArray or Wgpu, wrapped in Autodiff for training
//
// Reference: Burn Book §3 (Building Blocks)
//            Burn Book §5 (Training)
//            Radford et al. (2019) Language Models are
//            Unsupervised Multitask Learners

pub mod attention;

/// GPT architecture and masked loss
pub mod model;

pub mod params;

pub mod schedule;

pub mod optimizer;

/// Training loop with validation and checkpointing
pub mod trainer;

/// Greedy decoding for birthplace prediction
pub mod inferencer;

pub mod backend;

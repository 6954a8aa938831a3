// ============================================================
// Layer 6 — Infrastructure Layer
// ============================================================
// Persistence that several layers share:
//
//   checkpoint.rs — full-precision named MessagePack records,
//                   a parameter manifest checked before loading,
//                   and a JSON sidecar with the model config
//
//   metrics.rs    — per-epoch CSV log of loss, lr and tokens
//
// Reference: Burn Book §5 (Checkpointing)

/// Model parameter saving and loading
pub mod checkpoint;

/// Training metrics CSV logger
pub mod metrics;

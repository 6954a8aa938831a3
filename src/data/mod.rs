// ============================================================
// Layer 4 — Data Pipeline
// ============================================================
// Everything from raw corpus text to tensor batches:
//
//   corpus .txt / .tsv
//       │
//       ▼
//   loader               → reads UTF-8 files
//       │
//       ▼
//   SpanCorruptionDataset → pretraining examples (Burn Dataset)
//   NameDataset           → finetuning examples  (Burn Dataset)
//       │
//       ▼
//   LmBatcher             → stacks samples into [batch, block] tensors
//       │
//       ▼
//   DataLoader            → worker threads feed batches to the trainer
//
// Reference: Burn Book §4 (Datasets and Dataloaders)

/// Reads corpus files
pub mod loader;

/// Span-corruption pretraining dataset
pub mod corruption;

/// Name → birthplace finetuning dataset
pub mod names;

/// Implements Burn's Batcher trait to create tensor batches
pub mod batcher;

/// Seeded shuffle + train/validation split
pub mod splitter;

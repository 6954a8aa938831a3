// ============================================================
// Layer 2 — Application / Use Cases
// ============================================================
// Workflows built from the lower layers:
//
//   train_use_case    — pretrain and finetune a GPT variant,
//                       then write its parameters
//   evaluate_use_case — score a trained model or the London
//                       baseline on a name/birthplace file
//
// No model math and no printing here; the CLI reports results.

/// Pretraining and finetuning workflows
pub mod train_use_case;

/// Evaluation and the London baseline
pub mod evaluate_use_case;

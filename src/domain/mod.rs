// ============================================================
// Layer 3 — Domain Layer
// ============================================================
// Plain Rust types that define what the system works with.
//
// Rules for this layer:
//   - NO Burn framework types allowed here
//   - NO file I/O
//   - Only structs, enums, and traits
//
// Reference: Rust Book §5 (Structs), §10 (Traits)

/// Character vocabulary shared by every dataset and the evaluator
pub mod vocab;

/// One fixed-length (input, target, mask) training example
pub mod sample;

/// Core abstractions (traits) that other layers implement
pub mod traits;

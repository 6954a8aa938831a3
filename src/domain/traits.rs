// ============================================================
// Layer 3 — Core Traits (Abstractions)
// ============================================================
// The evaluator only needs "something that guesses a birthplace
// for a name". Both the trained transformer and the constant
// London baseline implement this, so accuracy is computed by one
// piece of code for either.

use anyhow::Result;

/// Any component that can guess where a person was born.
///
/// Implementations:
///   - GptPredictor   → greedy decoding with a trained model
///   - LondonBaseline → always answers "London"
pub trait BirthplacePredictor {
    /// Predict the birthplace for a single name.
    fn predict(&self, name: &str) -> Result<String>;
}

/// The baseline every trained model has to beat.
#[derive(Debug, Clone, Copy, Default)]
pub struct LondonBaseline;

impl BirthplacePredictor for LondonBaseline {
    fn predict(&self, _name: &str) -> Result<String> {
        Ok("London".to_string())
    }
}

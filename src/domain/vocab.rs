// ============================================================
// Layer 3 — Character Vocabulary
// ============================================================
// Maps characters to integer token ids and back.
//
// The vocabulary is built once from the pretraining corpus and
// then shared, unchanged, by the finetuning dataset and the
// evaluator. Two special characters always occupy the first ids:
//
//   id 0 → PAD  '□' (U+25A1)  — filler, never supervised
//   id 1 → MASK '⁇' (U+2047)  — span delimiter / answer marker
//   id 2.. → every distinct corpus character, sorted
//
// Because PAD is id 0, "target != 0" is exactly the loss mask.

use std::collections::HashMap;

use crate::error::{GptError, Result};

/// Padding character, always token id 0.
pub const PAD_CHAR: char = '\u{25A1}';

/// Mask / delimiter character, always token id 1.
pub const MASK_CHAR: char = '\u{2047}';

pub const PAD_ID: u32 = 0;
pub const MASK_ID: u32 = 1;

/// A fixed character-level vocabulary.
#[derive(Debug, Clone)]
pub struct CharVocab {
    itos: Vec<char>,
    stoi: HashMap<char, u32>,
}

impl CharVocab {
    /// Build the vocabulary from every character appearing in `corpus`.
    ///
    /// Fails if the corpus already contains one of the two reserved
    /// characters, since their ids would then be ambiguous.
    pub fn from_corpus(corpus: &str) -> Result<Self> {
        let mut chars: Vec<char> = corpus.chars().collect();
        chars.sort_unstable();
        chars.dedup();

        if chars.contains(&PAD_CHAR) || chars.contains(&MASK_CHAR) {
            return Err(GptError::Corpus(
                "corpus contains a reserved PAD or MASK character".to_string(),
            ));
        }

        let mut itos = Vec::with_capacity(chars.len() + 2);
        itos.push(PAD_CHAR);
        itos.push(MASK_CHAR);
        itos.extend(chars);

        Ok(Self::from_itos(itos))
    }

    fn from_itos(itos: Vec<char>) -> Self {
        let stoi = itos
            .iter()
            .enumerate()
            .map(|(i, &c)| (c, i as u32))
            .collect();
        Self { itos, stoi }
    }

    pub fn len(&self) -> usize {
        self.itos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.itos.is_empty()
    }

    pub fn id(&self, c: char) -> Option<u32> {
        self.stoi.get(&c).copied()
    }

    pub fn char_of(&self, id: u32) -> Option<char> {
        self.itos.get(id as usize).copied()
    }

    /// Encode a string, failing on the first character outside the vocabulary.
    pub fn encode(&self, text: &str) -> Result<Vec<u32>> {
        text.chars()
            .map(|c| {
                self.id(c).ok_or_else(|| {
                    GptError::Corpus(format!("character {c:?} is not in the vocabulary"))
                })
            })
            .collect()
    }

    /// Decode ids back to text. Unknown ids are skipped.
    pub fn decode(&self, ids: &[u32]) -> String {
        ids.iter().filter_map(|&id| self.char_of(id)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_special_ids_come_first() {
        let vocab = CharVocab::from_corpus("banana").unwrap();
        assert_eq!(vocab.id(PAD_CHAR), Some(PAD_ID));
        assert_eq!(vocab.id(MASK_CHAR), Some(MASK_ID));
        // 'a', 'b', 'n' follow in sorted order
        assert_eq!(vocab.len(), 5);
        assert_eq!(vocab.id('a'), Some(2));
        assert_eq!(vocab.id('n'), Some(4));
    }

    #[test]
    fn test_encode_decode() {
        let vocab = CharVocab::from_corpus("hello world").unwrap();
        let ids = vocab.encode("low").unwrap();
        assert_eq!(vocab.decode(&ids), "low");
    }

    #[test]
    fn test_unknown_character_is_an_error() {
        let vocab = CharVocab::from_corpus("abc").unwrap();
        assert!(matches!(vocab.encode("abz"), Err(GptError::Corpus(_))));
    }

    #[test]
    fn test_reserved_character_rejected() {
        let corpus = format!("abc{MASK_CHAR}");
        assert!(CharVocab::from_corpus(&corpus).is_err());
    }
}

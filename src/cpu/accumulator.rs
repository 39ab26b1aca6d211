//! The Baby accumulator.
//!
//! The only arithmetic register. It can be loaded only with the negation of
//! a store line, and the only arithmetic is subtraction; addition is
//! done by subtracting a negative number.

use crate::word::Word;
use serde::{Serialize, Deserialize};

/// The accumulator register (A).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Accumulator {
    value: Word,
}

impl Accumulator {
    /// Create a zeroed accumulator.
    pub const fn new() -> Self {
        Self { value: Word::ZERO }
    }

    /// LDN: A := -word.
    #[inline]
    pub fn load_negated(&mut self, word: Word) {
        self.value = word.wrapping_neg();
    }

    /// SUB: A := A - word.
    #[inline]
    pub fn subtract(&mut self, word: Word) {
        self.value = self.value.wrapping_sub(word);
    }

    /// Current value.
    #[inline]
    pub const fn value(&self) -> Word {
        self.value
    }

    /// The CMP test: true if A is negative.
    #[inline]
    pub const fn test(&self) -> bool {
        self.value.is_negative()
    }

    /// Overwrite the register directly (snapshot restore).
    pub fn set(&mut self, value: Word) {
        self.value = value;
    }

    /// Reset to zero.
    pub fn reset(&mut self) {
        self.value = Word::ZERO;
    }
}

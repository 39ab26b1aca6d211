//! 32-bit Baby words.
//!
//! Every word has two representations:
//! - *natural*: the two's-complement integer used by the accumulator
//! - *machine*: the bit-reversed order the Baby used on its CRT and in
//!   snapshot files, least significant bit first
//!
//! Only this module and the instruction codec know about the reversal.

use std::fmt;
use serde::{Serialize, Deserialize};
use thiserror::Error;

/// Number of bits in a word.
pub const WORD_BITS: usize = 32;

/// Reverse the bit order of a 32-bit value.
///
/// Reversal is its own inverse, so the same function converts natural to
/// machine order and back.
#[inline]
pub const fn reverse_bits32(word: u32) -> u32 {
    word.reverse_bits()
}

/// A single store line or register value.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Word(i32);

impl Word {
    /// The all-zero word.
    pub const ZERO: Word = Word(0);

    /// Create a word from its natural signed value.
    #[inline]
    pub const fn from_i32(value: i32) -> Self {
        Self(value)
    }

    /// The natural signed value.
    #[inline]
    pub const fn to_i32(self) -> i32 {
        self.0
    }

    /// Create a word from its natural bit pattern.
    #[inline]
    pub const fn from_bits(bits: u32) -> Self {
        Self(bits as i32)
    }

    /// The natural bit pattern.
    #[inline]
    pub const fn to_bits(self) -> u32 {
        self.0 as u32
    }

    /// Create a word from its machine (bit-reversed) form.
    #[inline]
    pub const fn from_machine(machine: u32) -> Self {
        Self::from_bits(reverse_bits32(machine))
    }

    /// The machine (bit-reversed) form.
    #[inline]
    pub const fn to_machine(self) -> u32 {
        reverse_bits32(self.to_bits())
    }

    /// True if the sign bit is set.
    #[inline]
    pub const fn is_negative(self) -> bool {
        self.0 < 0
    }

    /// Check if zero.
    #[inline]
    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    /// Two's-complement negation; `i32::MIN` negates to itself.
    #[inline]
    pub const fn wrapping_neg(self) -> Self {
        Self(self.0.wrapping_neg())
    }

    /// Modular subtraction.
    #[inline]
    pub const fn wrapping_sub(self, rhs: Word) -> Self {
        Self(self.0.wrapping_sub(rhs.0))
    }

    /// Parse a 32-character bit string in machine order (LSB first).
    ///
    /// Spaces and underscores are ignored so that grouped strings such as
    /// `"11100 00000000 010 0000000000000000"` are accepted.
    pub fn parse(s: &str) -> Result<Self, WordParseError> {
        let mut machine: u32 = 0;
        let mut count = 0;

        for c in s.chars().filter(|c| *c != ' ' && *c != '_') {
            let bit = match c {
                '0' | '.' => 0,
                '1' | '*' => 1,
                other => return Err(WordParseError::InvalidChar(other)),
            };
            if count == WORD_BITS {
                return Err(WordParseError::WrongLength(count + 1));
            }
            machine = (machine << 1) | bit;
            count += 1;
        }

        if count != WORD_BITS {
            return Err(WordParseError::WrongLength(count));
        }

        Ok(Self::from_machine(machine))
    }
}

impl From<i32> for Word {
    fn from(value: i32) -> Self {
        Self(value)
    }
}

impl From<Word> for i32 {
    fn from(word: Word) -> Self {
        word.0
    }
}

/// Machine order, least significant bit first.
impl fmt::Display for Word {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = format!("{:032b}", self.to_machine());
        f.pad(&s)
    }
}

impl fmt::Debug for Word {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Word({} = {})", self, self.0)
    }
}

/// Errors from parsing a machine-order bit string.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WordParseError {
    #[error("invalid bit character '{0}' (expected 0 or 1)")]
    InvalidChar(char),

    #[error("expected {WORD_BITS} bits, found {0}")]
    WrongLength(usize),
}

//! The Baby store.
//!
//! The original Baby kept its 32 words on a Williams-Kilburn CRT. Every
//! address is taken modulo 32, the same wrap-around the hardware's 5-bit line
//! selector gave.

use crate::word::Word;
use serde::{Serialize, Deserialize};
use thiserror::Error;

/// The number of lines in the store.
pub const STORE_SIZE: usize = 32;

/// Reduce any address to a store line.
#[inline]
pub const fn wrap_address(addr: usize) -> usize {
    addr % STORE_SIZE
}

/// Baby store: 32 words.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Store {
    lines: [Word; STORE_SIZE],
}

impl Store {
    /// Create a store with all lines zeroed.
    pub fn new() -> Self {
        Self {
            lines: [Word::ZERO; STORE_SIZE],
        }
    }

    /// Read a line. The address wraps modulo 32.
    #[inline]
    pub fn read(&self, addr: usize) -> Word {
        self.lines[wrap_address(addr)]
    }

    /// Write a line. The address wraps modulo 32.
    #[inline]
    pub fn write(&mut self, addr: usize, value: Word) {
        self.lines[wrap_address(addr)] = value;
    }

    /// Replace the whole store with `words`, zero-filling the lines after
    /// the last one given.
    ///
    /// Leaves the store untouched if more than 32 words are supplied.
    pub fn load_bulk(&mut self, words: &[Word]) -> Result<(), StoreError> {
        if words.len() > STORE_SIZE {
            return Err(StoreError::ProgramTooLarge { size: words.len() });
        }

        self.lines = [Word::ZERO; STORE_SIZE];
        self.lines[..words.len()].copy_from_slice(words);
        Ok(())
    }

    /// Copy of all 32 lines in address order.
    pub fn snapshot(&self) -> [Word; STORE_SIZE] {
        self.lines
    }

    /// Borrow the lines in address order.
    pub fn lines(&self) -> &[Word; STORE_SIZE] {
        &self.lines
    }

    /// Zero every line.
    pub fn reset(&mut self) {
        self.lines = [Word::ZERO; STORE_SIZE];
    }
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Only count non-zero lines
        let non_zero = self.lines.iter().filter(|w| !w.is_zero()).count();

        f.debug_struct("Store")
            .field("non_zero_lines", &non_zero)
            .field("total_lines", &STORE_SIZE)
            .finish()
    }
}

/// Errors that can occur during store operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// More words than the store has lines.
    #[error("program size {size} exceeds the 32-line store")]
    ProgramTooLarge { size: usize },
}

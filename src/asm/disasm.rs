//! Disassembler for Baby store contents.
//!
//! Converts store words back to source the assembler accepts. A word that
//! carries bits outside the instruction fields is printed as `NUM` so that
//! reassembly reproduces it exactly.

use crate::word::Word;
use crate::cpu::decode::{Instruction, Opcode};
use crate::cpu::store::STORE_SIZE;
use crate::asm::assembler::SymbolTable;

/// Disassemble a single word to text.
pub fn disassemble_word(word: Word) -> String {
    format_word(word, None)
}

/// Disassemble a full store, one line per address.
///
/// The result is lazy and holds no state beyond the store it borrows, so
/// cloning it or calling this again yields the same lines.
pub fn disassemble<'a>(lines: &'a [Word; STORE_SIZE], symbols: Option<&'a SymbolTable>) -> Disassembly<'a> {
    Disassembly {
        lines,
        symbols,
        addr: 0,
    }
}

/// Iterator over the disassembled lines of a store.
#[derive(Debug, Clone)]
pub struct Disassembly<'a> {
    lines: &'a [Word; STORE_SIZE],
    symbols: Option<&'a SymbolTable>,
    addr: usize,
}

impl Disassembly<'_> {
    /// All lines joined into assembler source.
    pub fn to_source(&self) -> String {
        let mut output = String::from("; Manchester Baby disassembly\n");
        for line in self.clone() {
            output.push_str(&line);
            output.push('\n');
        }
        output
    }
}

impl Iterator for Disassembly<'_> {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        if self.addr >= STORE_SIZE {
            return None;
        }

        let addr = self.addr;
        self.addr += 1;

        let text = format_word(self.lines[addr], self.symbols);
        let label = self.symbols.and_then(|s| s.label_at(addr as u8));
        Some(match label {
            Some(label) => format!("{:02}: {}: {}", addr, label, text),
            None => format!("{:02}: {}", addr, text),
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = STORE_SIZE - self.addr;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for Disassembly<'_> {}

/// Format a word as an instruction, or as data if decoding would lose bits.
fn format_word(word: Word, symbols: Option<&SymbolTable>) -> String {
    let instr = Instruction::from_word(word);
    // Function 5 has no mnemonic of its own
    if word.is_zero() || !Instruction::is_canonical(word) || instr.opcode == Opcode::SubAlt {
        return format!("NUM {}", word.to_i32());
    }

    let label = symbols.and_then(|s| s.label_at(instr.operand));
    match label {
        Some(label) if instr.opcode.uses_operand() => {
            format!("{} {}", instr.opcode.mnemonic(), label)
        }
        _ => instr.to_string(),
    }
}

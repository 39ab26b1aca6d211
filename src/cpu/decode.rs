//! Instruction decoder for the Baby.
//!
//! A Baby instruction occupies one store line. In natural bit numbering the
//! operand (a line number) sits in bits 0-4 and the function number in bits
//! 13-15; the hardware ignores every other bit.

use crate::word::{reverse_bits32, Word};
use serde::{Serialize, Deserialize};
use std::fmt;

/// Mask for the 5-bit operand field.
pub const OPERAND_MASK: u32 = 0x1F;

/// Position of the function field in the natural word.
pub const FUNCTION_SHIFT: u32 = 13;

/// Mask for the 3-bit function field (after shifting).
pub const FUNCTION_MASK: u32 = 0x7;

/// Natural bits that take part in an instruction.
pub const INSTRUCTION_BITS: u32 = OPERAND_MASK | (FUNCTION_MASK << FUNCTION_SHIFT);

/// The eight function numbers.
///
/// Function 5 repeats SUB; it is kept as its own variant so that decoding
/// and re-encoding a word never changes its bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Opcode {
    /// CI := operand
    Jmp = 0,
    /// CI := CI + S[operand]
    Jrp = 1,
    /// A := -S[operand]
    Ldn = 2,
    /// S[operand] := A
    Sto = 3,
    /// A := A - S[operand]
    Sub = 4,
    /// Second encoding of SUB
    SubAlt = 5,
    /// Skip the next line if A < 0
    Cmp = 6,
    /// Stop the machine
    Stp = 7,
}

impl Opcode {
    /// All opcodes in function-number order.
    pub const ALL: [Opcode; 8] = [
        Opcode::Jmp,
        Opcode::Jrp,
        Opcode::Ldn,
        Opcode::Sto,
        Opcode::Sub,
        Opcode::SubAlt,
        Opcode::Cmp,
        Opcode::Stp,
    ];

    /// Map a function number to its opcode. Only the low three bits count.
    #[inline]
    pub const fn from_function(function: u8) -> Self {
        Self::ALL[(function & FUNCTION_MASK as u8) as usize]
    }

    /// The 3-bit function number.
    #[inline]
    pub const fn function(self) -> u8 {
        self as u8
    }

    /// Canonical mnemonic.
    pub const fn mnemonic(self) -> &'static str {
        match self {
            Opcode::Jmp => "JMP",
            Opcode::Jrp => "JRP",
            Opcode::Ldn => "LDN",
            Opcode::Sto => "STO",
            Opcode::Sub | Opcode::SubAlt => "SUB",
            Opcode::Cmp => "CMP",
            Opcode::Stp => "STP",
        }
    }

    /// Look up a mnemonic, including the historical aliases.
    ///
    /// The lookup expects an upper-case mnemonic; case folding is up to the
    /// caller.
    pub fn from_mnemonic(mnemonic: &str) -> Option<Self> {
        let opcode = match mnemonic {
            "JMP" => Opcode::Jmp,
            "JRP" | "JPR" => Opcode::Jrp,
            "LDN" => Opcode::Ldn,
            "STO" => Opcode::Sto,
            "SUB" => Opcode::Sub,
            "CMP" | "SKN" => Opcode::Cmp,
            "STP" | "HLT" => Opcode::Stp,
            _ => return None,
        };
        Some(opcode)
    }

    /// True if the instruction reads or writes the store line named by its
    /// operand. CMP and STP ignore the operand.
    pub const fn uses_operand(self) -> bool {
        !matches!(self, Opcode::Cmp | Opcode::Stp)
    }
}

/// Decoded Baby instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Instruction {
    pub opcode: Opcode,
    /// Store line, 0-31.
    pub operand: u8,
}

impl Instruction {
    /// Build an instruction; the operand is taken modulo 32.
    pub const fn new(opcode: Opcode, operand: u8) -> Self {
        Self {
            opcode,
            operand: operand & OPERAND_MASK as u8,
        }
    }

    /// Decode a natural word.
    #[inline]
    pub const fn from_word(word: Word) -> Self {
        decode(word.to_machine())
    }

    /// Encode to a natural word.
    #[inline]
    pub const fn to_word(self) -> Word {
        Word::from_machine(encode(&self))
    }

    /// True if every set bit of `word` belongs to the instruction fields,
    /// i.e. the word is exactly `Instruction::from_word(word).to_word()`.
    #[inline]
    pub const fn is_canonical(word: Word) -> bool {
        word.to_bits() & !INSTRUCTION_BITS == 0
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.opcode.uses_operand() || self.operand != 0 {
            write!(f, "{} {}", self.opcode.mnemonic(), self.operand)
        } else {
            f.write_str(self.opcode.mnemonic())
        }
    }
}

/// Decode a machine-order word.
///
/// Total over all inputs: three function bits give exactly eight opcodes.
pub const fn decode(machine: u32) -> Instruction {
    let natural = reverse_bits32(machine);
    let function = ((natural >> FUNCTION_SHIFT) & FUNCTION_MASK) as u8;
    let operand = (natural & OPERAND_MASK) as u8;
    Instruction::new(Opcode::from_function(function), operand)
}

/// Encode an instruction to a machine-order word.
pub const fn encode(instr: &Instruction) -> u32 {
    let natural = ((instr.opcode.function() as u32) << FUNCTION_SHIFT)
        | (instr.operand as u32 & OPERAND_MASK);
    reverse_bits32(natural)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn any_instruction() -> impl Strategy<Value = Instruction> {
        (0u8..8, 0u8..32).prop_map(|(f, op)| Instruction::new(Opcode::from_function(f), op))
    }

    #[test]
    fn test_decode_known_words() {
        // LDN 3: function 2, operand 3
        let word = Word::from_i32((2 << 13) | 3);
        assert_eq!(
            Instruction::from_word(word),
            Instruction::new(Opcode::Ldn, 3)
        );

        // Machine order as it appears in a snapshot file
        let stp = Word::parse("00000000000001110000000000000000").unwrap();
        assert_eq!(Instruction::from_word(stp).opcode, Opcode::Stp);
    }

    #[test]
    fn test_ignored_bits() {
        // Bits outside the fields do not change the decoded instruction
        let word = Word::from_i32(-7);
        let instr = Instruction::from_word(word);
        assert_eq!(instr, Instruction::new(Opcode::Stp, 25));
        assert!(!Instruction::is_canonical(word));
        assert!(Instruction::is_canonical(instr.to_word()));
    }

    #[test]
    fn test_mnemonic_lookup() {
        for op in Opcode::ALL {
            let found = Opcode::from_mnemonic(op.mnemonic()).unwrap();
            assert_eq!(found.mnemonic(), op.mnemonic());
        }
        assert_eq!(Opcode::from_mnemonic("JPR"), Some(Opcode::Jrp));
        assert_eq!(Opcode::from_mnemonic("HLT"), Some(Opcode::Stp));
        assert_eq!(Opcode::from_mnemonic("ADD"), None);
    }

    #[test]
    fn test_display() {
        assert_eq!(Instruction::new(Opcode::Sto, 4).to_string(), "STO 4");
        assert_eq!(Instruction::new(Opcode::Cmp, 0).to_string(), "CMP");
        assert_eq!(Instruction::new(Opcode::Stp, 9).to_string(), "STP 9");
        assert_eq!(Instruction::new(Opcode::SubAlt, 1).to_string(), "SUB 1");
    }

    proptest! {
        #[test]
        fn decode_inverts_encode(instr in any_instruction()) {
            prop_assert_eq!(decode(encode(&instr)), instr);
        }

        #[test]
        fn decode_is_total(machine in any::<u32>()) {
            let instr = decode(machine);
            prop_assert!(instr.operand < 32);
        }
    }
}

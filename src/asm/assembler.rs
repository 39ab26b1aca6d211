//! Two-pass assembler for Baby programs.
//!
//! Syntax:
//! ```text
//! ; Comment
//! 00: NUM 0          ; explicit line address, data word
//! 01: LDN 20         ; load negated line 20
//! loop: SUB minus1   ; label definition, label operand
//!     CMP            ; skip next line if A < 0
//!     JMP loop
//!     STP
//! 20: 7              ; a bare number is a data word
//! minus1: -1
//! ```
//!
//! Lines without an explicit address take the line after the previous one,
//! starting from 0. Labels may be used before they are defined.

use crate::word::Word;
use crate::cpu::decode::{Instruction, Opcode};
use crate::cpu::store::STORE_SIZE;
use std::collections::{BTreeMap, HashMap};
use thiserror::Error;

/// Assembler settings that only affect how source text is read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AsmOptions {
    /// Starts a comment running to the end of the line.
    pub comment_marker: char,
    /// When set, mnemonics must be written in upper case.
    pub case_sensitive: bool,
}

impl Default for AsmOptions {
    fn default() -> Self {
        Self {
            comment_marker: ';',
            case_sensitive: false,
        }
    }
}

/// Label names and the store lines they refer to.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SymbolTable {
    by_name: HashMap<String, u8>,
    by_line: BTreeMap<u8, String>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Define a label. Returns `false` if the name is already taken.
    ///
    /// When several labels share a line, the first one defined is the one
    /// the disassembler prints.
    pub fn insert(&mut self, name: &str, line: u8) -> bool {
        if self.by_name.contains_key(name) {
            return false;
        }
        self.by_name.insert(name.to_string(), line);
        self.by_line.entry(line).or_insert_with(|| name.to_string());
        true
    }

    /// Line a label refers to.
    pub fn get(&self, name: &str) -> Option<u8> {
        self.by_name.get(name).copied()
    }

    /// Label to print for a line, if any.
    pub fn label_at(&self, line: u8) -> Option<&str> {
        self.by_line.get(&line).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}

/// Assembled words together with the labels that named them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Program {
    /// Store contents from line 0; at most 32 words.
    pub words: Vec<Word>,
    pub symbols: SymbolTable,
}

/// Assemble source code to store words with default options.
pub fn assemble(source: &str) -> Result<Vec<Word>, AssemblerError> {
    assemble_program(source, &AsmOptions::default()).map(|program| program.words)
}

/// Assemble source code, keeping the symbol table.
pub fn assemble_program(source: &str, options: &AsmOptions) -> Result<Program, AssemblerError> {
    let mut asm = Assembler::new(options);
    asm.assemble(source)
}

/// Operand token: a literal or a label reference.
#[derive(Debug, Clone)]
enum Operand {
    Number(i64),
    Label(String),
}

#[derive(Debug, Clone)]
enum Body {
    Data(Operand),
    Instruction { opcode: Opcode, operand: Option<Operand> },
}

/// A line that produces a word.
#[derive(Debug, Clone)]
struct Statement {
    source_line: usize,
    address: usize,
    body: Body,
}

/// The assembler state.
struct Assembler<'a> {
    options: &'a AsmOptions,
    /// Address the next word goes to.
    next_addr: usize,
    /// Symbol table (label -> line).
    symbols: SymbolTable,
    /// Source line that filled each store line.
    occupied: [Option<usize>; STORE_SIZE],
    statements: Vec<Statement>,
}

impl<'a> Assembler<'a> {
    fn new(options: &'a AsmOptions) -> Self {
        Self {
            options,
            next_addr: 0,
            symbols: SymbolTable::new(),
            occupied: [None; STORE_SIZE],
            statements: Vec::new(),
        }
    }

    fn assemble(&mut self, source: &str) -> Result<Program, AssemblerError> {
        // Pass 1: assign addresses and collect labels
        for (line_num, line) in source.lines().enumerate() {
            self.scan_line(line, line_num + 1)?;
        }

        // Pass 2: encode, resolving label operands
        let len = self.statements.iter().map(|s| s.address + 1).max().unwrap_or(0);
        let mut words = vec![Word::ZERO; len];
        for stmt in &self.statements {
            words[stmt.address] = self.encode(stmt)?;
        }

        log::debug!(
            "Assembled {} statements into {} words, {} labels",
            self.statements.len(),
            words.len(),
            self.symbols.len()
        );

        Ok(Program {
            words,
            symbols: std::mem::take(&mut self.symbols),
        })
    }

    fn scan_line(&mut self, line: &str, line_num: usize) -> Result<(), AssemblerError> {
        // Remove comments
        let line = match line.find(self.options.comment_marker) {
            Some(idx) => &line[..idx],
            None => line,
        };
        let mut rest = line.trim();

        if rest.is_empty() {
            return Ok(());
        }

        // Leading `NN:` address and `name:` label prefixes
        let mut labels = Vec::new();
        let mut seen_prefix = false;
        while let Some((head, tail)) = rest.split_once(':') {
            let head = head.trim();
            if !head.is_empty() && head.chars().all(|c| c.is_ascii_digit()) {
                if seen_prefix {
                    return Err(malformed(line_num, "line address must come first"));
                }
                let addr = head.parse::<usize>().unwrap_or(usize::MAX);
                if addr >= STORE_SIZE {
                    return Err(malformed(
                        line_num,
                        format!("line address {} out of range 0-{}", head, STORE_SIZE - 1),
                    ));
                }
                self.next_addr = addr;
            } else if is_identifier(head) {
                labels.push(head);
            } else {
                return Err(malformed(line_num, format!("invalid label '{}'", head)));
            }
            seen_prefix = true;
            rest = tail.trim();
        }

        for label in labels {
            if self.next_addr >= STORE_SIZE {
                return Err(AssemblerError::ProgramTooLarge { count: self.next_addr + 1 });
            }
            if !self.symbols.insert(label, self.next_addr as u8) {
                return Err(malformed(line_num, format!("label '{}' defined twice", label)));
            }
        }

        if rest.is_empty() {
            return Ok(());
        }

        let body = self.parse_body(rest, line_num)?;

        if self.next_addr >= STORE_SIZE {
            return Err(AssemblerError::ProgramTooLarge { count: self.next_addr + 1 });
        }
        if let Some(previous) = self.occupied[self.next_addr] {
            return Err(malformed(
                line_num,
                format!("line {:02} already assembled from source line {}", self.next_addr, previous),
            ));
        }

        self.occupied[self.next_addr] = Some(line_num);
        self.statements.push(Statement {
            source_line: line_num,
            address: self.next_addr,
            body,
        });
        self.next_addr += 1;

        Ok(())
    }

    fn parse_body(&self, text: &str, line_num: usize) -> Result<Body, AssemblerError> {
        let mut tokens = text.split_whitespace();
        let first = tokens.next().unwrap_or_default();
        let second = tokens.next();
        if let Some(extra) = tokens.next() {
            return Err(malformed(line_num, format!("unexpected '{}'", extra)));
        }

        // Bare number: data word
        if let Some(value) = parse_number(first) {
            if let Some(extra) = second {
                return Err(malformed(line_num, format!("unexpected '{}'", extra)));
            }
            return Ok(Body::Data(Operand::Number(value)));
        }

        let mnemonic = if self.options.case_sensitive {
            first.to_string()
        } else {
            first.to_ascii_uppercase()
        };

        if mnemonic == "NUM" {
            let token = second.ok_or_else(|| malformed(line_num, "NUM requires a value"))?;
            return Ok(Body::Data(parse_operand(token, line_num)?));
        }

        let opcode = Opcode::from_mnemonic(&mnemonic)
            .ok_or_else(|| malformed(line_num, format!("unknown mnemonic '{}'", first)))?;

        let operand = second.map(|t| parse_operand(t, line_num)).transpose()?;
        if opcode.uses_operand() && operand.is_none() {
            return Err(malformed(line_num, format!("{} requires an operand", opcode.mnemonic())));
        }

        Ok(Body::Instruction { opcode, operand })
    }

    fn resolve(&self, operand: &Operand, line_num: usize) -> Result<i64, AssemblerError> {
        match operand {
            Operand::Number(value) => Ok(*value),
            Operand::Label(label) => self.symbols
                .get(label)
                .map(i64::from)
                .ok_or_else(|| AssemblerError::UnresolvedLabel {
                    line: line_num,
                    label: label.clone(),
                }),
        }
    }

    fn encode(&self, stmt: &Statement) -> Result<Word, AssemblerError> {
        let line_num = stmt.source_line;
        match &stmt.body {
            Body::Data(operand) => {
                let value = self.resolve(operand, line_num)?;
                let word = if value < 0 {
                    i32::try_from(value).map(Word::from_i32)
                } else {
                    u32::try_from(value).map(Word::from_bits)
                };
                word.map_err(|_| malformed(line_num, format!("value {} does not fit in 32 bits", value)))
            }
            Body::Instruction { opcode, operand } => {
                let addr = match operand {
                    Some(operand) => self.resolve(operand, line_num)?,
                    None => 0,
                };
                if !(0..STORE_SIZE as i64).contains(&addr) {
                    return Err(malformed(
                        line_num,
                        format!("operand {} out of range 0-{}", addr, STORE_SIZE - 1),
                    ));
                }
                Ok(Instruction::new(*opcode, addr as u8).to_word())
            }
        }
    }
}

fn malformed(line: usize, message: impl Into<String>) -> AssemblerError {
    AssemblerError::MalformedLine {
        line,
        message: message.into(),
    }
}

fn is_identifier(token: &str) -> bool {
    let mut chars = token.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    }
}

/// Parse a decimal or `0x` hex literal with an optional sign.
fn parse_number(token: &str) -> Option<i64> {
    let (negative, digits) = match token.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, token.strip_prefix('+').unwrap_or(token)),
    };

    let magnitude = if let Some(hex) = digits.strip_prefix("0x").or_else(|| digits.strip_prefix("0X")) {
        // from_str_radix would also take a sign here
        if hex.is_empty() || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return None;
        }
        i64::from_str_radix(hex, 16).ok()?
    } else if !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit()) {
        digits.parse::<i64>().ok()?
    } else {
        return None;
    };

    Some(if negative { -magnitude } else { magnitude })
}

fn parse_operand(token: &str, line_num: usize) -> Result<Operand, AssemblerError> {
    if let Some(value) = parse_number(token) {
        Ok(Operand::Number(value))
    } else if is_identifier(token) {
        Ok(Operand::Label(token.to_string()))
    } else {
        Err(malformed(line_num, format!("invalid operand '{}'", token)))
    }
}

/// Errors that can occur during assembly.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AssemblerError {
    #[error("malformed line {line}: {message}")]
    MalformedLine { line: usize, message: String },

    #[error("unresolved label on line {line}: {label}")]
    UnresolvedLabel { line: usize, label: String },

    #[error("program needs {count} store lines, the store has 32")]
    ProgramTooLarge { count: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decoded(words: &[Word]) -> Vec<(Opcode, u8)> {
        words
            .iter()
            .map(|w| {
                let i = Instruction::from_word(*w);
                (i.opcode, i.operand)
            })
            .collect()
    }

    #[test]
    fn test_assemble_numbered_lines() {
        let words = assemble("0: LDN 3\n1: STO 4\n2: STP\n3: 7\n4: 0").unwrap();
        assert_eq!(words.len(), 5);
        assert_eq!(
            decoded(&words[..3]),
            vec![(Opcode::Ldn, 3), (Opcode::Sto, 4), (Opcode::Stp, 0)]
        );
        assert_eq!(words[3].to_i32(), 7);
        assert!(words[4].is_zero());
    }

    #[test]
    fn test_assemble_with_labels() {
        let source = r#"
            ; Count down from 3
            start:  LDN count
                    SUB one
                    CMP
                    JMP start    ; forward and backward references
            done:   STP
            count:  NUM 3
            one:    NUM 1
        "#;

        let program = assemble_program(source, &AsmOptions::default()).unwrap();
        assert_eq!(program.words.len(), 7);
        assert_eq!(program.symbols.get("count"), Some(5));
        assert_eq!(program.symbols.label_at(4), Some("done"));
        assert_eq!(
            decoded(&program.words[..5]),
            vec![
                (Opcode::Ldn, 5),
                (Opcode::Sub, 6),
                (Opcode::Cmp, 0),
                (Opcode::Jmp, 0),
                (Opcode::Stp, 0),
            ]
        );
    }

    #[test]
    fn test_assemble_data() {
        let words = assemble("NUM 42\n-17\n0x10\nNUM 4294967295\n").unwrap();
        assert_eq!(words[0].to_i32(), 42);
        assert_eq!(words[1].to_i32(), -17);
        assert_eq!(words[2].to_i32(), 16);
        assert_eq!(words[3].to_i32(), -1);

        let words = assemble("NUM -0x10\nNUM +0x1F").unwrap();
        assert_eq!(words[0].to_i32(), -16);
        assert_eq!(words[1].to_i32(), 31);
    }

    #[test]
    fn test_gaps_are_zero() {
        let words = assemble("LDN 10\n10: NUM 5").unwrap();
        assert_eq!(words.len(), 11);
        assert!(words[1..10].iter().all(|w| w.is_zero()));
        assert_eq!(words[10].to_i32(), 5);
    }

    #[test]
    fn test_label_only_line_binds_next_word() {
        let program = assemble_program("JMP end\nend:\nSTP", &AsmOptions::default()).unwrap();
        assert_eq!(program.symbols.get("end"), Some(1));
        assert_eq!(decoded(&program.words)[0], (Opcode::Jmp, 1));
    }

    #[test]
    fn test_aliases_and_case() {
        let words = assemble("jpr 3\nskn\nhlt").unwrap();
        assert_eq!(
            decoded(&words),
            vec![(Opcode::Jrp, 3), (Opcode::Cmp, 0), (Opcode::Stp, 0)]
        );

        let strict = AsmOptions { case_sensitive: true, ..AsmOptions::default() };
        assert!(matches!(
            assemble_program("stp", &strict),
            Err(AssemblerError::MalformedLine { line: 1, .. })
        ));
    }

    #[test]
    fn test_custom_comment_marker() {
        let options = AsmOptions { comment_marker: '#', ..AsmOptions::default() };
        let program = assemble_program("LDN 1 # load\n# whole line\nSTP", &options).unwrap();
        assert_eq!(program.words.len(), 2);
    }

    #[test]
    fn test_unresolved_label() {
        assert_eq!(
            assemble("LDN 1\nJMP nowhere"),
            Err(AssemblerError::UnresolvedLabel { line: 2, label: "nowhere".into() })
        );
    }

    #[test]
    fn test_malformed_lines() {
        for source in [
            "FOO 1",
            "LDN",
            "LDN 1 2",
            "LDN 32",
            "LDN -1",
            "NUM",
            "NUM 4294967296",
            "40: STP",
            "a b: STP",
            "x: STP\nx: STP",
            "3: STP\n3: STP",
            "LDN $",
            "NUM 0x-5",
            "NUM -0x-5",
            "NUM 0x+5",
            "LDN 0x",
        ] {
            assert!(
                matches!(assemble(source), Err(AssemblerError::MalformedLine { .. })),
                "expected MalformedLine for {:?}",
                source
            );
        }
    }

    #[test]
    fn test_program_too_large() {
        let source = "NUM 0\n".repeat(33);
        assert_eq!(
            assemble(&source),
            Err(AssemblerError::ProgramTooLarge { count: 33 })
        );

        // A full store is fine
        let source = "NUM 0\n".repeat(32);
        assert_eq!(assemble(&source).unwrap().len(), 32);

        assert!(matches!(
            assemble("31: NUM 1\nNUM 2"),
            Err(AssemblerError::ProgramTooLarge { .. })
        ));
    }
}

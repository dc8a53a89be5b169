//! The target machine: word shape, registers, opcodes, addressing modes.
//!
//! Everything the rest of the assembler knows about the machine lives here.
//! The machine is deliberately tiny: 12-bit words, a 10-bit address space
//! starting at [`CODE_BASE`], eight registers, sixteen opcodes and three
//! addressing modes.

use std::fmt::{Display, Formatter};

/// Width of a machine word, in bits.
pub const WORD_WIDTH: u8 = 12;

/// Width of the address payload of an [`MachineWord::Address`] word, in bits.
pub const ADDR_WIDTH: u8 = 10;

/// First address of the code image. The data image follows the code image
/// immediately, so cell addresses run `CODE_BASE..CODE_BASE + ic + dc`.
pub const CODE_BASE: u16 = 100;

/// Maximum length of one source line, in characters.
pub const MAX_LINE_LENGTH: usize = 80;

/// Maximum length of a label or macro name, in characters.
pub const MAX_LABEL_LENGTH: usize = 31;

/// A word address: an index into the final, single address space.
pub type Addr = u16;

/// One of the eight CPU registers, `r0` through `r7`.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Reg {
    R0,
    R1,
    R2,
    R3,
    R4,
    R5,
    R6,
    R7,
}

impl Reg {
    pub fn number(self) -> u16 {
        self as u16
    }
}

/// An opcode or directive, as written in the mnemonic position of a line.
///
/// The sixteen machine opcodes come first, in opcode-number order; the four
/// directives are carried in the same enum so that a parsed statement has a
/// single mnemonic type, the way the lexer produces it. Directive variants
/// have no opcode number.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Opcode {
    Mov,
    Cmp,
    Add,
    Sub,
    Not,
    Clr,
    Lea,
    Inc,
    Dec,
    Jmp,
    Bne,
    Red,
    Prn,
    Jsr,
    Rts,
    Hlt,

    // Directives
    Data,
    Str,
    Entry,
    Extern,
}

impl Opcode {
    pub fn is_directive(self) -> bool {
        use Opcode::*;
        matches!(self, Data | Str | Entry | Extern)
    }

    /// The 4-bit opcode number of a machine opcode.
    ///
    /// Only machine opcodes reach the encoder; a directive here is an
    /// assembler bug, not an input error.
    pub(crate) fn code(self) -> u16 {
        use Opcode::*;
        match self {
            Mov => 0,
            Cmp => 1,
            Add => 2,
            Sub => 3,
            Not => 4,
            Clr => 5,
            Lea => 6,
            Inc => 7,
            Dec => 8,
            Jmp => 9,
            Bne => 10,
            Red => 11,
            Prn => 12,
            Jsr => 13,
            Rts => 14,
            Hlt => 15,
            Data | Str | Entry | Extern => unreachable!("directive has no opcode number"),
        }
    }

    pub fn mnemonic(self) -> &'static str {
        use Opcode::*;
        match self {
            Mov => "mov",
            Cmp => "cmp",
            Add => "add",
            Sub => "sub",
            Not => "not",
            Clr => "clr",
            Lea => "lea",
            Inc => "inc",
            Dec => "dec",
            Jmp => "jmp",
            Bne => "bne",
            Red => "red",
            Prn => "prn",
            Jsr => "jsr",
            Rts => "rts",
            Hlt => "hlt",
            Data => ".data",
            Str => ".string",
            Entry => ".entry",
            Extern => ".extern",
        }
    }
}

impl Display for Opcode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.mnemonic())
    }
}

/// How an operand's value is located.
///
/// The mode numbers are the encoding slots of the instruction word's mode
/// fields; slot 2 is unassigned in this dialect.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum AddressMode {
    Immediate = 0,
    Direct = 1,
    Register = 3,
}

impl AddressMode {
    pub(crate) fn code(self) -> u16 {
        self as u16
    }
}

/// The A/R/E marker on an encoded word: tells a later loading step whether
/// the word is position-independent, must be relocated, or belongs to an
/// external symbol.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum AreTag {
    Absolute = 0,
    External = 1,
    Relocatable = 2,
}

impl AreTag {
    pub(crate) fn code(self) -> u16 {
        self as u16
    }
}

/// A single machine word, tagged by which sub-fields it concatenates.
///
/// Words are produced incrementally by the first pass; an operand word whose
/// label isn't defined yet exists only as a pending placeholder in the code
/// image (see [`assemble::ObjectWord`](crate::assemble::ObjectWord)) and
/// becomes an `Address` word during the second pass. By the time the encoder
/// runs, every cell holds one of these.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum MachineWord {
    /// The first word of every instruction: opcode, the addressing mode of
    /// each present operand, and the Absolute tag.
    Instruction {
        opcode: Opcode,
        src: Option<AddressMode>,
        dst: Option<AddressMode>,
    },
    /// The shared extra word of register operands. When both operands of an
    /// instruction are registers they pack into this one word; a lone
    /// register operand leaves the other field zero.
    Registers { src: Option<Reg>, dst: Option<Reg> },
    /// A resolved direct operand: 10-bit address plus A/R/E tag. External
    /// symbols get the all-zero placeholder address.
    Address { addr: Addr, tag: AreTag },
    /// A two's-complement literal filling the whole word: `.data`/`.string`
    /// cells and immediate operands.
    Raw(i16),
}

/// Words reserved by the language: mnemonics, directives (with and without
/// the leading dot), register names and the macro markers. Labels and macro
/// names may not collide with any of these.
pub fn is_reserved_word(word: &str) -> bool {
    const RESERVED: &[&str] = &[
        "mov", "cmp", "add", "sub", "not", "clr", "lea", "inc", "dec", "jmp", "bne", "red", "prn",
        "jsr", "rts", "hlt", ".data", ".string", ".entry", ".extern", "data", "string", "entry",
        "extern", "r0", "r1", "r2", "r3", "r4", "r5", "r6", "r7", "mcro", "endmcro",
    ];
    RESERVED.contains(&word)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opcode_numbers_follow_declaration_order() {
        assert_eq!(0, Opcode::Mov.code());
        assert_eq!(6, Opcode::Lea.code());
        assert_eq!(15, Opcode::Hlt.code());
    }

    #[test]
    fn register_mode_skips_the_unassigned_slot() {
        assert_eq!(0, AddressMode::Immediate.code());
        assert_eq!(1, AddressMode::Direct.code());
        assert_eq!(3, AddressMode::Register.code());
    }

    #[test]
    fn reserved_words_cover_all_spellings() {
        assert!(is_reserved_word("mov"));
        assert!(is_reserved_word(".string"));
        assert!(is_reserved_word("string"));
        assert!(is_reserved_word("r7"));
        assert!(is_reserved_word("endmcro"));
        assert!(!is_reserved_word("MAIN"));
        assert!(!is_reserved_word("r8"));
    }
}

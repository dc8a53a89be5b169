//! The first pass: build the symbol table and the code and data images.
//!
//! The pass walks the syntax tree in statement order, keeping an
//! instruction counter and a data counter. Labels are registered at the
//! counter value *before* their statement's words are appended. Most words
//! are complete the instant they are created; a direct operand whose label
//! isn't resolvable yet is appended as [`ObjectWord::Pending`] and completed
//! by the [second pass](crate::link), which walks the image this pass
//! produced — word counts can't drift between the passes because there is
//! only one image.
//!
//! Statements that analysis found broken (error placeholders, wrong operand
//! shapes) are skipped here; the file is already marked failed, and the
//! passes keep going only to surface the remaining diagnoses.

use crate::isa::{Addr, AddressMode, AreTag, MachineWord, Opcode};
use crate::parse::{File, Operand, Statement};
use crate::symbols::{SymbolKind, SymbolTable};
use crate::{SourceId, Span, Spanned};

/// One cell of the code image under construction.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ObjectWord {
    Complete(MachineWord),
    /// A direct operand waiting for its symbol: resolved by name through
    /// the symbol table during the second pass, never through a pointer
    /// into it.
    Pending { label: String, span: Span },
}

/// Everything the first pass hands to the second.
pub struct FirstPassOutput {
    pub(crate) id: SourceId,
    pub symbols: SymbolTable,
    pub code: Vec<ObjectWord>,
    pub data: Vec<MachineWord>,
    /// `.entry` operands, deferred: forward declarations are legal, so
    /// promotion can only happen once the whole file has been scanned.
    pub entries: Vec<Spanned<String>>,
    /// `.extern` operands, kept for the unused-external warning.
    pub externs: Vec<Spanned<String>>,
}

/// Which operand slot a word belongs to.
#[derive(Clone, Copy)]
enum Slot {
    Src,
    Dst,
}

fn address_mode(operand: &Operand) -> Option<AddressMode> {
    match operand {
        Operand::NumberLiteral(_) => Some(AddressMode::Immediate),
        Operand::Label(_) => Some(AddressMode::Direct),
        Operand::Register(_) => Some(AddressMode::Register),
        Operand::StringLiteral(_) => None,
    }
}

struct FirstPass {
    symbols: SymbolTable,
    code: Vec<ObjectWord>,
    data: Vec<MachineWord>,
    entries: Vec<Spanned<String>>,
    externs: Vec<Spanned<String>>,
}

impl FirstPass {
    /// Register a statement label. Reserved and duplicate names were
    /// already reported during analysis, so a failed insert is dropped
    /// here; the table keeps the first definition.
    fn define(&mut self, label: Option<&str>, address: Addr, kind: SymbolKind) {
        if let Some(label) = label {
            let _ = self.symbols.define(label, address, kind);
        }
    }

    fn operand_word(&mut self, operand: &Operand, span: &Span, slot: Slot) {
        let word = match operand {
            Operand::Register(r) => {
                let (src, dst) = match slot {
                    Slot::Src => (Some(*r), None),
                    Slot::Dst => (None, Some(*r)),
                };
                ObjectWord::Complete(MachineWord::Registers { src, dst })
            }
            Operand::NumberLiteral(v) => ObjectWord::Complete(MachineWord::Raw(*v)),
            Operand::Label(name) => match self.symbols.lookup(name) {
                // A code label's address is final as soon as it's defined;
                // data labels still move during relocation and externals
                // resolve to the placeholder, so both wait for pass two.
                Some(symbol) if symbol.kind == SymbolKind::Code => {
                    ObjectWord::Complete(MachineWord::Address {
                        addr: symbol.address,
                        tag: AreTag::Relocatable,
                    })
                }
                _ => ObjectWord::Pending {
                    label: name.clone(),
                    span: span.clone(),
                },
            },
            // Checked by the caller; string operands never reach an
            // instruction's operand words.
            Operand::StringLiteral(_) => return,
        };
        self.code.push(word);
    }

    fn instruction(&mut self, opcode: Opcode, label: Option<&str>, ops: &[(&Operand, &Span)]) {
        let (src, dst) = match ops {
            [src, dst] => (Some(*src), Some(*dst)),
            [dst] => (None, Some(*dst)),
            _ => (None, None),
        };

        let src_mode = src.and_then(|(o, _)| address_mode(o));
        let dst_mode = dst.and_then(|(o, _)| address_mode(o));
        if (src.is_some() && src_mode.is_none()) || (dst.is_some() && dst_mode.is_none()) {
            return; // a string operand; already diagnosed
        }

        self.define(label, self.code.len() as Addr, SymbolKind::Code);
        self.code.push(ObjectWord::Complete(MachineWord::Instruction {
            opcode,
            src: src_mode,
            dst: dst_mode,
        }));

        // Two register operands share one extra word.
        if let (Some((Operand::Register(s), _)), Some((Operand::Register(d), _))) = (src, dst) {
            self.code.push(ObjectWord::Complete(MachineWord::Registers {
                src: Some(*s),
                dst: Some(*d),
            }));
            return;
        }

        if let Some((operand, span)) = src {
            self.operand_word(operand, span, Slot::Src);
        }
        if let Some((operand, span)) = dst {
            self.operand_word(operand, span, Slot::Dst);
        }
    }

    fn directive(&mut self, opcode: Opcode, label: Option<&str>, ops: &[(&Operand, &Span)]) {
        match opcode {
            Opcode::Data => {
                self.define(label, self.data.len() as Addr, SymbolKind::Data);
                for (operand, _) in ops {
                    if let Operand::NumberLiteral(v) = operand {
                        self.data.push(MachineWord::Raw(*v));
                    }
                }
            }
            Opcode::Str => {
                self.define(label, self.data.len() as Addr, SymbolKind::Data);
                if let Some((Operand::StringLiteral(s), _)) = ops.first() {
                    for c in s.chars() {
                        self.data.push(MachineWord::Raw(c as i16));
                    }
                    self.data.push(MachineWord::Raw(0));
                }
            }
            Opcode::Entry => {
                if let Some((Operand::Label(name), span)) = ops.first() {
                    self.entries.push((name.clone(), (*span).clone()));
                }
            }
            Opcode::Extern => {
                if let Some((Operand::Label(name), span)) = ops.first() {
                    self.define(Some(name.as_str()), 0, SymbolKind::External);
                    self.externs.push((name.clone(), (*span).clone()));
                }
            }
            _ => unreachable!("machine opcodes are handled by instruction()"),
        }
    }

    fn statement(&mut self, statement: &Statement) {
        let opcode = match &statement.opcode {
            (Ok(opcode), _) => *opcode,
            (Err(()), _) => return,
        };
        let operands = match &statement.operands {
            (Ok(operands), _) => operands,
            (Err(()), _) => return,
        };

        let mut ops = Vec::with_capacity(operands.len());
        for (result, span) in operands {
            match result {
                Ok(operand) => ops.push((operand, span)),
                Err(()) => return, // already diagnosed
            }
        }

        let label = match &statement.label {
            Some((Ok(label), _)) => Some(label.as_str()),
            _ => None,
        };

        if opcode.is_directive() {
            self.directive(opcode, label, &ops);
        } else {
            self.instruction(opcode, label, &ops);
        }
    }
}

/// Run the first pass over a parsed file.
///
/// Always succeeds structurally: problems were reported by analysis, and
/// broken statements are skipped. Ends by relocating the data symbols past
/// the final instruction count.
pub fn first_pass(file: &File) -> FirstPassOutput {
    let mut pass = FirstPass {
        symbols: SymbolTable::new(),
        code: Vec::new(),
        data: Vec::new(),
        entries: Vec::new(),
        externs: Vec::new(),
    };

    for statement in file.statements.iter() {
        if let (Ok(s), _) = statement {
            pass.statement(s);
        }
    }

    let instruction_count = pass.code.len() as Addr;
    pass.symbols.relocate_data(instruction_count);

    let FirstPass {
        symbols,
        code,
        data,
        entries,
        externs,
    } = pass;
    FirstPassOutput {
        id: file.id.clone(),
        symbols,
        code,
        data,
        entries,
        externs,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lex::lex;
    use crate::parse::parse;
    use pretty_assertions::assert_eq;

    fn run(source: &str) -> FirstPassOutput {
        let tokens = lex(source).unwrap();
        let file = parse("<test>".to_string(), source, tokens).unwrap();
        first_pass(&file.0)
    }

    #[test]
    fn shared_register_word() {
        let out = run("mov r1, r2\n");
        assert_eq!(2, out.code.len());
        assert_eq!(
            ObjectWord::Complete(MachineWord::Registers {
                src: Some(crate::isa::Reg::R1),
                dst: Some(crate::isa::Reg::R2),
            }),
            out.code[1]
        );
    }

    #[test]
    fn lone_register_operand_keeps_its_slot() {
        let out = run("clr r4\n");
        assert_eq!(
            ObjectWord::Complete(MachineWord::Registers {
                src: None,
                dst: Some(crate::isa::Reg::R4),
            }),
            out.code[1]
        );
    }

    #[test]
    fn forward_reference_stays_pending() {
        let out = run("jmp END\nEND: hlt\n");
        assert!(matches!(&out.code[1], ObjectWord::Pending { label, .. } if label == "END"));
    }

    #[test]
    fn backward_code_reference_completes_immediately() {
        let out = run("LOOP: hlt\njmp LOOP\n");
        assert_eq!(
            ObjectWord::Complete(MachineWord::Address {
                addr: 0,
                tag: AreTag::Relocatable,
            }),
            out.code[2]
        );
    }

    #[test]
    fn data_symbols_are_relocated_past_the_code() {
        // Two instruction words (jmp + operand), then data.
        let out = run("jmp X\nX: .data 7\n");
        assert_eq!(2, out.code.len());
        let x = out.symbols.lookup("X").unwrap();
        assert_eq!(2, x.address);
        assert_eq!(vec![MachineWord::Raw(7)], out.data);
    }

    #[test]
    fn string_directive_is_nul_terminated() {
        let out = run("S: .string \"ab\"\n");
        assert_eq!(
            vec![
                MachineWord::Raw('a' as i16),
                MachineWord::Raw('b' as i16),
                MachineWord::Raw(0)
            ],
            out.data
        );
    }

    #[test]
    fn label_counters_are_pre_advance() {
        let out = run("A: .data 1, 2\nB: .data 3\nC: inc r1\nD: rts\n");
        // ic = 3 (inc + register word + rts)
        assert_eq!(3, out.code.len());
        assert_eq!(3, out.symbols.lookup("A").unwrap().address); // 0 + ic
        assert_eq!(5, out.symbols.lookup("B").unwrap().address); // 2 + ic
        assert_eq!(0, out.symbols.lookup("C").unwrap().address);
        assert_eq!(2, out.symbols.lookup("D").unwrap().address);
    }

    #[test]
    fn entries_and_externs_are_deferred() {
        let out = run(".entry MAIN\n.extern W\nMAIN: hlt\n");
        assert_eq!(vec![("MAIN".to_string(), 7..11)], out.entries);
        assert_eq!(1, out.externs.len());
        assert_eq!(
            SymbolKind::External,
            out.symbols.lookup("W").unwrap().kind
        );
    }
}

//! The second pass: complete the code image and finalize the symbol table.
//!
//! Walks the image the first pass produced, so it is aligned with pass one
//! word-for-word by construction. Three jobs:
//!
//! - resolve every [`Pending`](ObjectWord::Pending) operand word through
//!   the symbol table — undefined labels are errors, external labels get
//!   the placeholder word and a line in the externals list, everything else
//!   becomes a relocatable address;
//! - promote each deferred `.entry` label (conflicts with `.extern` are
//!   errors);
//! - warn about `.extern` declarations nothing ever referenced.
//!
//! The result is a fully-complete image: the encoder cannot be handed an
//! unresolved word, because the type no longer has one.

use crate::assemble::{FirstPassOutput, ObjectWord};
use crate::error::Error::Spanned;
use crate::error::SingleError::{InvalidLabelReference, UnusedExternal};
use crate::error::{Error, InvalidReferenceReason};
use crate::isa::{Addr, AreTag, MachineWord};
use crate::symbols::{MarkEntryError, SymbolKind, SymbolTable};

/// One use-site of an external symbol: the code-image index of the operand
/// word that referenced it.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ExternalUse {
    pub name: String,
    pub address: Addr,
}

/// A fully-resolved program, ready for encoding.
pub struct LinkedProgram {
    pub symbols: SymbolTable,
    pub code: Vec<MachineWord>,
    pub data: Vec<MachineWord>,
    /// External use-sites in image order.
    pub externals: Vec<ExternalUse>,
}

/// Run the second pass over the first pass's output.
///
/// Like every other stage, this accumulates diagnostics instead of
/// stopping: a file with five unresolved labels reports all five.
pub fn second_pass(first: FirstPassOutput) -> (LinkedProgram, Vec<Error>) {
    let FirstPassOutput {
        id,
        mut symbols,
        code,
        data,
        entries,
        externs,
    } = first;

    let mut errors = Vec::new();
    let mut externals = Vec::new();

    let code = code
        .into_iter()
        .enumerate()
        .map(|(i, word)| match word {
            ObjectWord::Complete(word) => word,
            ObjectWord::Pending { label, span } => match symbols.lookup(&label) {
                None => {
                    errors.push(Spanned(
                        (id.clone(), span).into(),
                        InvalidLabelReference {
                            label,
                            reason: InvalidReferenceReason::Undefined,
                        },
                    ));
                    // Placeholder to keep the image aligned; never encoded,
                    // since the error above suppresses all artifacts.
                    MachineWord::Address {
                        addr: 0,
                        tag: AreTag::Absolute,
                    }
                }
                Some(symbol) if symbol.kind == SymbolKind::External => {
                    externals.push(ExternalUse {
                        name: label,
                        address: i as Addr,
                    });
                    MachineWord::Address {
                        addr: 0,
                        tag: AreTag::External,
                    }
                }
                Some(symbol) => MachineWord::Address {
                    addr: symbol.address,
                    tag: AreTag::Relocatable,
                },
            },
        })
        .collect();

    for (name, span) in entries {
        match symbols.mark_entry(&name) {
            Ok(()) => {}
            Err(MarkEntryError::Undefined) => errors.push(Spanned(
                (id.clone(), span).into(),
                InvalidLabelReference {
                    label: name,
                    reason: InvalidReferenceReason::Undefined,
                },
            )),
            Err(MarkEntryError::External) => errors.push(Spanned(
                (id.clone(), span).into(),
                InvalidLabelReference {
                    label: name,
                    reason: InvalidReferenceReason::EntryExternConflict,
                },
            )),
        }
    }

    for (name, span) in externs {
        let used = externals.iter().any(|u| u.name == name);
        if !used {
            errors.push(Spanned(
                (id.clone(), span).into(),
                UnusedExternal { name },
            ));
        }
    }

    (
        LinkedProgram {
            symbols,
            code,
            data,
            externals,
        },
        errors,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assemble::first_pass;
    use crate::lex::lex;
    use crate::parse::parse;
    use pretty_assertions::assert_eq;

    fn run(source: &str) -> (LinkedProgram, Vec<Error>) {
        let tokens = lex(source).unwrap();
        let file = parse("<test>".to_string(), source, tokens).unwrap();
        second_pass(first_pass(&file.0))
    }

    #[test]
    fn forward_reference_resolves_to_a_relocatable_address() {
        let (linked, errors) = run("jmp END\nEND: hlt\n");
        assert!(errors.is_empty());
        assert_eq!(
            MachineWord::Address {
                addr: 2,
                tag: AreTag::Relocatable
            },
            linked.code[1]
        );
    }

    #[test]
    fn data_reference_uses_the_relocated_address() {
        let (linked, errors) = run("X: .data 7\nprn X\nhlt\n");
        assert!(errors.is_empty());
        // ic = 3, so X lands at 3.
        assert_eq!(
            MachineWord::Address {
                addr: 3,
                tag: AreTag::Relocatable
            },
            linked.code[1]
        );
    }

    #[test]
    fn external_reference_gets_the_placeholder_and_a_use_site() {
        let (linked, errors) = run("jmp E1\n.extern E1\n");
        assert!(errors.is_empty());
        assert_eq!(
            MachineWord::Address {
                addr: 0,
                tag: AreTag::External
            },
            linked.code[1]
        );
        assert_eq!(
            vec![ExternalUse {
                name: "E1".to_string(),
                address: 1
            }],
            linked.externals
        );
    }

    #[test]
    fn undefined_label_is_reported_per_use() {
        let (_, errors) = run("jmp NOWHERE\nbne NOWHERE\n");
        assert_eq!(2, errors.len());
        assert!(errors.iter().all(|e| !e.is_warning()));
    }

    #[test]
    fn entry_promotion_and_conflicts() {
        let (linked, errors) = run(".entry MAIN\nMAIN: hlt\n");
        assert!(errors.is_empty());
        assert!(linked.symbols.lookup("MAIN").unwrap().entry);

        let (_, errors) = run(".extern X\n.entry X\nprn X\nhlt\n");
        assert_eq!(1, errors.len());
        assert!(!errors[0].is_warning());
    }

    #[test]
    fn unused_external_is_a_warning() {
        let (_, errors) = run(".extern W\nhlt\n");
        assert_eq!(1, errors.len());
        assert!(errors[0].is_warning());
    }
}

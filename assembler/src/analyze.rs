//! Semantic analysis: walk the syntax tree and accumulate every diagnostic
//! it holds.
//!
//! Each concern is one small [`MutVisitor`] implementation; [`validate`]
//! runs them all and concatenates their findings. Nothing here stops early
//! — the point of this stage is that a single run reports every problem in
//! the file, so the failure flag is decided once, after everything has been
//! seen.

use std::collections::HashMap;

use itertools::concat;

use crate::error::Error::*;
use crate::error::SingleError::*;
use crate::error::{Error, OperandType};
use crate::isa::Opcode;
use crate::parse::{File, Operand, Statement};
use crate::util::validate_identifier;
use crate::{SpanWithSource, Spanned, WithErrData};

#[derive(Default)]
struct ParseErrorsAnalysis {
    errors: Vec<Error>,
}

impl ParseErrorsAnalysis {
    fn new() -> Self {
        Default::default()
    }

    fn push_error(&mut self, single_error: crate::error::SingleError, span: &SpanWithSource) {
        self.errors.push(Spanned(span.clone(), single_error));
    }
}

impl MutVisitor for ParseErrorsAnalysis {
    fn enter_statement_error(&mut self, span: &SpanWithSource) {
        self.push_error(BadStatement, span);
    }
    fn enter_label_error(&mut self, span: &SpanWithSource) {
        self.push_error(BadLabel { reasons: vec![] }, span);
    }
    fn enter_opcode_error(&mut self, span: &SpanWithSource) {
        self.push_error(BadOpcode, span);
    }
    fn enter_operand_error(&mut self, span: &SpanWithSource) {
        self.push_error(BadOperand, span);
    }
}

/// Checks every label definition (and every `.entry`/`.extern` operand)
/// against the identifier rules.
#[derive(Default)]
struct LabelsAnalysis {
    errors: Vec<Error>,
}

impl LabelsAnalysis {
    fn new() -> Self {
        Default::default()
    }

    fn check(&mut self, name: &str, span: &SpanWithSource) {
        let reasons = validate_identifier(name);
        if !reasons.is_empty() {
            self.errors.push(Spanned(span.clone(), BadLabel { reasons }));
        }
    }
}

impl MutVisitor for LabelsAnalysis {
    fn enter_statement(&mut self, statement: &Statement, span: &SpanWithSource) {
        let hanging = matches!(
            &statement.opcode,
            (Ok(Opcode::Entry), _) | (Ok(Opcode::Extern), _)
        );

        if !hanging {
            if let Some((Ok(label), label_span)) = &statement.label {
                let label_span = (span.id.clone(), label_span.clone()).into();
                self.check(label, &label_span);
            }
        }

        if hanging {
            if let (Ok(operands), _) = &statement.operands {
                if let Some((Ok(Operand::Label(name)), operand_span)) = operands.get(0) {
                    let operand_span = (span.id.clone(), operand_span.clone()).into();
                    self.check(name, &operand_span);
                }
            }
        }
    }
}

/// Finds labels defined more than once. `.extern` operands count as
/// definitions; labels in front of `.entry`/`.extern` don't (they are
/// ignored, and warned about separately).
#[derive(Default)]
struct DuplicateLabelsAnalysis {
    errors: Vec<Error>,
    labels: HashMap<String, Vec<SpanWithSource>>,
}

impl DuplicateLabelsAnalysis {
    fn new() -> Self {
        Default::default()
    }
}

impl MutVisitor for DuplicateLabelsAnalysis {
    fn exit_file(&mut self, _file: &File, _span: &SpanWithSource) {
        let DuplicateLabelsAnalysis { errors, labels } = self;
        let mut duplicates = labels
            .iter()
            .filter(|(_, occurrences)| occurrences.len() > 1)
            .collect::<Vec<_>>();
        duplicates.sort_by_key(|(_, occurrences)| occurrences[0].span.start);
        duplicates
            .into_iter()
            .map(|(label, occurrences)| {
                Single(
                    occurrences[0].id.clone(),
                    DuplicateLabel {
                        label: label.clone(),
                        occurrences: occurrences.clone(),
                    },
                )
            })
            .for_each(|e| errors.push(e));
    }

    fn enter_statement(&mut self, statement: &Statement, span: &SpanWithSource) {
        let opcode = match &statement.opcode {
            (Ok(opcode), _) => *opcode,
            (Err(()), _) => return,
        };

        match opcode {
            Opcode::Entry => {}
            Opcode::Extern => {
                if let (Ok(operands), _) = &statement.operands {
                    if let Some((Ok(Operand::Label(name)), operand_span)) = operands.get(0) {
                        let occurrences = self.labels.entry(name.clone()).or_insert_with(Vec::new);
                        occurrences.push((span.id.clone(), operand_span.clone()).into());
                    }
                }
            }
            _ => {
                if let Some((Ok(label), label_span)) = &statement.label {
                    let occurrences = self.labels.entry(label.clone()).or_insert_with(Vec::new);
                    occurrences.push((span.id.clone(), label_span.clone()).into());
                }
            }
        }
    }
}

/// What a mnemonic accepts in its operand list.
#[derive(Clone)]
enum ExpectedOperands {
    Exactly(Vec<OperandType>),
    /// `.data`: one or more operands, all of one type.
    AtLeastOne(OperandType),
}

fn expected_operands(opcode: Opcode) -> ExpectedOperands {
    use ExpectedOperands::*;
    use Opcode::*;
    match opcode {
        Mov | Add | Sub => Exactly(vec![
            OperandType::any_value(),
            OperandType::label_or_register(),
        ]),
        Cmp => Exactly(vec![OperandType::any_value(), OperandType::any_value()]),
        Lea => Exactly(vec![OperandType::Label, OperandType::label_or_register()]),
        Not | Clr | Inc | Dec | Red => Exactly(vec![OperandType::label_or_register()]),
        Jmp | Bne | Jsr => Exactly(vec![OperandType::Label]),
        Prn => Exactly(vec![OperandType::any_value()]),
        Rts | Hlt => Exactly(vec![]),
        Data => AtLeastOne(OperandType::number()),
        Str => Exactly(vec![OperandType::String]),
        Entry | Extern => Exactly(vec![OperandType::Label]),
    }
}

/// Validates operand counts and types against the per-mnemonic table.
///
/// Addressing-mode legality is part of the type: an opcode whose
/// destination can't be immediate simply doesn't accept a number there,
/// and a 12-bit out-of-range literal fails the width check.
#[derive(Default)]
struct OperandTypesAnalysis {
    errors: Vec<Error>,
    expected_operands: Option<ExpectedOperands>,
}

impl OperandTypesAnalysis {
    fn new() -> Self {
        Default::default()
    }

    fn check_operand(
        &mut self,
        operand: &Operand,
        expected: &OperandType,
        span: SpanWithSource,
    ) {
        if !expected.check(operand) {
            self.errors.push(Spanned(
                span,
                OperandTypeMismatch {
                    expected: expected.clone(),
                    actual: OperandType::of(operand),
                },
            ));
        }
    }
}

impl MutVisitor for OperandTypesAnalysis {
    fn enter_opcode_error(&mut self, _span: &SpanWithSource) {
        self.expected_operands = None;
    }

    fn enter_opcode(&mut self, opcode: &Opcode, _span: &SpanWithSource) {
        self.expected_operands = Some(expected_operands(*opcode));
    }

    fn enter_operands(&mut self, operands: &[WithErrData<Operand>], span: &SpanWithSource) {
        let expected = match &self.expected_operands {
            None => return,
            Some(expected) => expected.clone(),
        };
        match expected {
            ExpectedOperands::Exactly(expected) => {
                let ops_len = operands.len();
                let exp_len = expected.len();
                if ops_len != exp_len {
                    self.errors.push(Spanned(
                        span.clone(),
                        WrongNumberOfOperands {
                            expected: exp_len,
                            actual: ops_len,
                        },
                    ));
                } else {
                    for ((op_res, op_span), exp_ty) in operands.iter().zip(expected.iter()) {
                        if let Ok(op) = op_res {
                            self.check_operand(op, exp_ty, (span.id.clone(), op_span.clone()).into());
                        }
                    }
                }
            }
            ExpectedOperands::AtLeastOne(element) => {
                if operands.is_empty() {
                    self.errors.push(Spanned(
                        span.clone(),
                        WrongNumberOfOperands {
                            expected: 1,
                            actual: 0,
                        },
                    ));
                } else {
                    for (op_res, op_span) in operands {
                        if let Ok(op) = op_res {
                            self.check_operand(op, &element, (span.id.clone(), op_span.clone()).into());
                        }
                    }
                }
            }
        }
    }
}

/// Warns about labels written in front of `.entry`/`.extern`: they are
/// ignored, not defined.
#[derive(Default)]
struct HangingLabelsAnalysis {
    errors: Vec<Error>,
}

impl HangingLabelsAnalysis {
    fn new() -> Self {
        Default::default()
    }
}

impl MutVisitor for HangingLabelsAnalysis {
    fn enter_statement(&mut self, statement: &Statement, span: &SpanWithSource) {
        if let (Ok(opcode), _) = &statement.opcode {
            if matches!(opcode, Opcode::Entry | Opcode::Extern) {
                if let Some((_, label_span)) = &statement.label {
                    self.errors.push(Spanned(
                        (span.id.clone(), label_span.clone()).into(),
                        IgnoredLabel { directive: *opcode },
                    ));
                }
            }
        }
    }
}

fn visit(v: &mut impl MutVisitor, file: &File, span: &SpanWithSource) {
    v.enter_file(file, span);
    for statement in file.statements.iter() {
        visit_statement(v, file.id.clone(), statement);
    }
    v.exit_file(file, span);
}

fn visit_statement(
    v: &mut impl MutVisitor,
    id: crate::SourceId,
    statement: &WithErrData<Statement>,
) {
    let (statement_res, span) = statement;
    let span = (id.clone(), span.clone()).into();
    match statement_res {
        Err(_) => {
            v.enter_statement_error(&span);
        }
        Ok(s) => {
            v.enter_statement(s, &span);

            let Statement {
                label,
                opcode,
                operands,
            } = s;
            if let Some(l) = label {
                visit_label(v, id.clone(), l);
            }
            visit_opcode(v, id.clone(), opcode);
            visit_operands(v, id, operands);
        }
    }
}

fn visit_label(v: &mut impl MutVisitor, id: crate::SourceId, label: &WithErrData<String>) {
    let (label_res, span) = label;
    let span = (id, span.clone()).into();
    match label_res {
        Err(_) => {
            v.enter_label_error(&span);
        }
        Ok(l) => {
            v.enter_label(l, &span);
        }
    }
}

fn visit_opcode(v: &mut impl MutVisitor, id: crate::SourceId, opcode: &WithErrData<Opcode>) {
    let (opcode_res, span) = opcode;
    let span = (id, span.clone()).into();
    match opcode_res {
        Err(_) => {
            v.enter_opcode_error(&span);
        }
        Ok(oc) => {
            v.enter_opcode(oc, &span);
        }
    }
}

fn visit_operands(
    v: &mut impl MutVisitor,
    id: crate::SourceId,
    operands: &WithErrData<Vec<WithErrData<Operand>>>,
) {
    let (ops_res, span) = operands;
    let span: SpanWithSource = (id.clone(), span.clone()).into();
    if let Ok(o) = ops_res {
        v.enter_operands(o, &span);
        for operand in o {
            visit_operand(v, id.clone(), operand);
        }
    }
}

fn visit_operand(v: &mut impl MutVisitor, id: crate::SourceId, operand: &WithErrData<Operand>) {
    let (op_res, span) = operand;
    let span = (id, span.clone()).into();
    match op_res {
        Err(_) => {
            v.enter_operand_error(&span);
        }
        Ok(o) => {
            v.enter_operand(o, &span);
        }
    }
}

trait MutVisitor {
    fn enter_file(&mut self, _file: &File, _span: &SpanWithSource) {}
    fn exit_file(&mut self, _file: &File, _span: &SpanWithSource) {}

    fn enter_statement_error(&mut self, _span: &SpanWithSource) {}
    fn enter_statement(&mut self, _statement: &Statement, _span: &SpanWithSource) {}

    fn enter_label_error(&mut self, _span: &SpanWithSource) {}
    fn enter_label(&mut self, _label: &String, _span: &SpanWithSource) {}

    fn enter_opcode_error(&mut self, _span: &SpanWithSource) {}
    fn enter_opcode(&mut self, _opcode: &Opcode, _span: &SpanWithSource) {}

    fn enter_operands(&mut self, _operands: &[WithErrData<Operand>], _span: &SpanWithSource) {}

    fn enter_operand_error(&mut self, _span: &SpanWithSource) {}
    fn enter_operand(&mut self, _operand: &Operand, _span: &SpanWithSource) {}
}

/// Run every analysis over the file and collect all their diagnostics.
pub fn validate(file_spanned: &Spanned<File>) -> Vec<Error> {
    let (file, file_span) = file_spanned;

    let file_span_with_source = (file.id.clone(), file_span.clone()).into();

    let mut pe = ParseErrorsAnalysis::new();
    visit(&mut pe, file, &file_span_with_source);

    let mut la = LabelsAnalysis::new();
    visit(&mut la, file, &file_span_with_source);

    let mut dl = DuplicateLabelsAnalysis::new();
    visit(&mut dl, file, &file_span_with_source);

    let mut ot = OperandTypesAnalysis::new();
    visit(&mut ot, file, &file_span_with_source);

    let mut hl = HangingLabelsAnalysis::new();
    visit(&mut hl, file, &file_span_with_source);

    concat([pe.errors, la.errors, dl.errors, ot.errors, hl.errors])
}

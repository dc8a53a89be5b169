//! The diagnostics this assembler can produce.
//!
//! Every problem the pipeline can find is one variant of [`SingleError`],
//! carrying the data needed to explain it. Diagnostics are accumulated in
//! plain `Vec`s at each stage boundary and rendered as [`ariadne`] reports
//! at the very end; nothing in the pipeline prints.

use std::fmt::{Display, Formatter};

use ariadne::{Label, Report, ReportKind};
use itertools::Itertools;

use crate::lex::Token;
use crate::util::min_signed_width;
use crate::{parse::Operand, SourceId, SpanWithSource};

use Error::*;
use SingleError::*;

/// A diagnostic, attached to the source (and, where known, the exact span)
/// it was found in.
#[derive(Clone, Debug, PartialEq)]
pub enum Error {
    /// A diagnostic with no more precise location than the file itself.
    Single(SourceId, SingleError),
    /// A diagnostic anchored to a span.
    Spanned(SpanWithSource, SingleError),
}

impl Error {
    fn single_error(&self) -> &SingleError {
        match self {
            Single(_, error) | Spanned(_, error) => error,
        }
    }

    /// Warnings are advisory: they are reported but never fail the file.
    pub fn is_warning(&self) -> bool {
        self.single_error().is_warning()
    }

    /// Render this diagnostic as a printable report.
    pub fn report(&self) -> Report<SpanWithSource> {
        let error = self.single_error();
        let kind = if error.is_warning() {
            ReportKind::Warning
        } else {
            ReportKind::Error
        };

        let mut r = match self {
            Single(id, _) => Report::build(kind, id.clone(), 0),
            Spanned(span, _) => Report::build(kind, span.id.clone(), span.span.start),
        }
        .with_message(error.message());

        match (self, error) {
            (_, DuplicateLabel { occurrences, .. }) => {
                let mut first_declaration_labeled = false;
                for occurrence in occurrences {
                    let label_message = if !first_declaration_labeled {
                        first_declaration_labeled = true;
                        "first defined here"
                    } else {
                        "also defined here"
                    };
                    r = r.with_label(Label::new(occurrence.clone()).with_message(label_message));
                }
            }
            (Spanned(span, _), _) => {
                r = r.with_label(Label::new(span.clone()).with_message("here"));
            }
            (Single(..), _) => {}
        }

        r.finish()
    }
}

/// Why a label (or macro name) was rejected.
#[derive(Clone, Debug, PartialEq)]
pub enum InvalidLabelReason {
    Length { actual: usize },
    FirstChar { actual: Option<char> },
    OtherChars { actual: String },
    Reserved,
}

impl Display for InvalidLabelReason {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        use InvalidLabelReason::*;
        match self {
            Length { actual } => write!(
                f,
                "not between 1-{} chars (was: {})",
                crate::isa::MAX_LABEL_LENGTH,
                actual
            ),
            FirstChar { actual } => write!(f, "first char not alphabetic (was: {:?})", actual),
            OtherChars { actual } => {
                write!(f, "other chars not alphanumeric (bad chars: {})", actual)
            }
            Reserved => write!(f, "reserved word"),
        }
    }
}

/// Why a label reference couldn't be resolved during the second pass.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum InvalidReferenceReason {
    Undefined,
    EntryExternConflict,
}

/// The type of operand an opcode slot accepts, for operand validation.
///
/// Number widths are in bits, two's-complement signed; a literal fits a slot
/// when its minimum signed width is no larger than the slot's.
#[derive(Clone, Debug, PartialEq)]
pub enum OperandType {
    Register,
    Number { width: u8 },
    String,
    Label,
    Or(Box<OperandType>, Box<OperandType>),
}

impl Display for OperandType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        use OperandType::*;
        match self {
            Register => write!(f, "Register"),
            Number { width } => write!(f, "Number ({}-bit, signed)", width),
            String => write!(f, "String"),
            Label => write!(f, "Label"),
            Or(t1, t2) => write!(f, "{} or {}", t1, t2),
        }
    }
}

impl OperandType {
    pub(crate) fn number() -> Self {
        OperandType::Number {
            width: crate::isa::WORD_WIDTH,
        }
    }

    pub(crate) fn any_value() -> Self {
        use OperandType::*;
        Or(
            Box::new(Self::number()),
            Box::new(Or(Box::new(Label), Box::new(Register))),
        )
    }

    pub(crate) fn label_or_register() -> Self {
        use OperandType::*;
        Or(Box::new(Label), Box::new(Register))
    }

    pub(crate) fn check(&self, operand: &Operand) -> bool {
        use OperandType::*;
        match self {
            Register => matches!(operand, Operand::Register(_)),
            Number { width: expected } => {
                if let Operand::NumberLiteral(v) = operand {
                    min_signed_width(*v as i32) <= *expected
                } else {
                    false
                }
            }
            String => matches!(operand, Operand::StringLiteral(_)),
            Label => matches!(operand, Operand::Label(_)),
            Or(t1, t2) => t1.check(operand) || t2.check(operand),
        }
    }

    pub(crate) fn of(operand: &Operand) -> Self {
        use OperandType::*;
        match operand {
            Operand::Register(_) => Register,
            Operand::NumberLiteral(v) => Number {
                width: min_signed_width(*v as i32),
            },
            Operand::StringLiteral(_) => String,
            Operand::Label(_) => Label,
        }
    }
}

/// One diagnosable problem.
#[derive(Clone, Debug, PartialEq)]
pub enum SingleError {
    /// The file couldn't be read or an artifact couldn't be written.
    Io(String),

    // Preprocessor
    MacroNameMissing,
    BadMacroName {
        name: String,
        reasons: Vec<InvalidLabelReason>,
    },
    DuplicateMacro {
        name: String,
        original_line: usize,
    },
    UnterminatedMacro {
        name: String,
    },
    StrayEndMarker,
    ExtraTextAfterMarker {
        text: String,
    },
    ExtraTextAfterCall {
        name: String,
        text: String,
    },
    LineTooLong {
        length: usize,
    },
    DigitLeadingLine,

    // Lexing and parsing
    Lex(String),
    Parse(String),

    // Analysis
    BadStatement,
    BadLabel {
        reasons: Vec<InvalidLabelReason>,
    },
    BadOpcode,
    BadOperand,
    DuplicateLabel {
        label: String,
        occurrences: Vec<SpanWithSource>,
    },
    WrongNumberOfOperands {
        expected: usize,
        actual: usize,
    },
    OperandTypeMismatch {
        expected: OperandType,
        actual: OperandType,
    },

    // Second pass
    InvalidLabelReference {
        label: String,
        reason: InvalidReferenceReason,
    },

    // Warnings
    IgnoredLabel {
        directive: crate::isa::Opcode,
    },
    UnusedExternal {
        name: String,
    },
}

impl SingleError {
    pub fn is_warning(&self) -> bool {
        matches!(self, IgnoredLabel { .. } | UnusedExternal { .. })
    }

    fn message(&self) -> String {
        match self {
            Io(message) => format!("I/O error: {}", message),

            MacroNameMissing => String::from("macro marker without a macro name"),
            BadMacroName { name, reasons } => format!(
                "invalid macro name {}, reasons -- {}",
                name,
                reasons.iter().map(InvalidLabelReason::to_string).join(", ")
            ),
            DuplicateMacro {
                name,
                original_line,
            } => format!(
                "macro {} already defined at line {}",
                name, original_line
            ),
            UnterminatedMacro { name } => {
                format!("macro {} has no closing endmcro marker", name)
            }
            StrayEndMarker => String::from("endmcro without a matching mcro"),
            ExtraTextAfterMarker { text } => {
                format!("extraneous text after macro marker: {}", text)
            }
            ExtraTextAfterCall { name, text } => format!(
                "extraneous text after call of macro {}: {}",
                name, text
            ),
            LineTooLong { length } => format!(
                "line exceeds {} characters (was: {})",
                crate::isa::MAX_LINE_LENGTH,
                length
            ),
            DigitLeadingLine => String::from("line may not begin with a digit"),

            Lex(message) => format!("encountered invalid token: {}", message),
            Parse(message) => format!("could not parse: {}", message),

            BadStatement => String::from("invalid statement"),
            BadLabel { reasons } => {
                if reasons.is_empty() {
                    String::from("invalid label")
                } else {
                    format!(
                        "invalid label, reasons -- {}",
                        reasons.iter().map(InvalidLabelReason::to_string).join(", ")
                    )
                }
            }
            BadOpcode => String::from("invalid opcode or directive"),
            BadOperand => String::from("invalid operand"),
            DuplicateLabel { label, .. } => {
                format!("same label defined for multiple locations: {}", label)
            }
            WrongNumberOfOperands { expected, actual } => format!(
                "wrong number of operands; expected {}, found: {}",
                expected, actual
            ),
            OperandTypeMismatch { expected, actual } => format!(
                "wrong operand type; expected {}, found: {}",
                expected, actual
            ),

            InvalidLabelReference { label, reason } => match reason {
                InvalidReferenceReason::Undefined => {
                    format!("label {} does not exist", label)
                }
                InvalidReferenceReason::EntryExternConflict => format!(
                    "label {} is external and cannot be marked as an entry",
                    label
                ),
            },

            IgnoredLabel { directive } => {
                format!("label before {} is ignored", directive)
            }
            UnusedExternal { name } => {
                format!("external symbol {} is never used", name)
            }
        }
    }
}

pub(crate) fn from_lex_errors(
    id: &SourceId,
    errors: Vec<chumsky::error::Simple<char>>,
) -> Vec<Error> {
    errors
        .into_iter()
        .map(|e| {
            Spanned(
                (id.clone(), e.span()).into(),
                SingleError::Lex(e.to_string()),
            )
        })
        .collect()
}

pub(crate) fn from_parse_errors(
    id: &SourceId,
    errors: Vec<chumsky::error::Simple<Token>>,
) -> Vec<Error> {
    errors
        .into_iter()
        .map(|e| {
            Spanned(
                (id.clone(), e.span()).into(),
                SingleError::Parse(e.to_string()),
            )
        })
        .collect()
}

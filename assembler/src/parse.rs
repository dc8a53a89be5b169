//! Functions and data structures for parsing the token stream.
//!
//! Parsing, or syntactic analysis, tries to structure the sequence of tokens
//! produced by [lexing](crate::lex). Tokens between newlines are structured
//! into statements — an optional label definition, a mnemonic, and a list of
//! comma-separated operands. The result is a [`File`], or syntax tree,
//! corresponding to a single expanded source file. Here's an example:
//!
//! ```
//! # use t12_assembler::lex::lex;
//! # use t12_assembler::parse::*;
//! # use t12_assembler::parse::Operand::*;
//! # use t12_assembler::isa::Opcode::*;
//! # use t12_assembler::isa::Reg::*;
//! let source = "LOOP: add r1, W\n";
//! let tokens = lex(source).unwrap();
//! let (file, _) = parse("<test>".to_string(), source, tokens).unwrap();
//!
//! assert_eq!(file.statements,
//!     vec![(Ok(Statement {
//!         label: Some((Ok("LOOP".to_string()), 0..5)),
//!         opcode: (Ok(Add), 6..9),
//!         operands: (Ok(vec![
//!             (Ok(Register(R1)), 10..12),
//!             (Ok(Label("W".to_string())), 14..15),
//!         ]), 10..15),
//!     }), 0..15)]);
//! ```
//!
//! Often the order of tokens is invalid, but mostly correct. [`parse`] is
//! designed to recover when it encounters a token which is out of order: it
//! replaces the smallest possible part of the syntax tree with an error and
//! tries to make a reasonable guess about where to continue. In this way it
//! attempts to produce a syntax tree for any input, valid *or invalid*, and
//! the tree will contain location-specific error placeholders which
//! [semantic analysis](crate::analyze) reports with their causes. By
//! recovering, one run surfaces many errors instead of failing at the first.
//!
//! Most elements of the syntax tree are paired with error data using
//! [`WithErrData`](crate::WithErrData); this abstracts the error
//! placeholders away and makes clearer which syntax elements comprise the
//! tree.

use chumsky::prelude::*;
use chumsky::Stream;

use crate::isa::{Opcode, Reg};
use crate::lex::Token;
use crate::{SourceId, Spanned, WithErrData};

/// A parsed source file: a flat, ordered list of statements. The root of
/// the syntax tree.
///
/// Produced by [`parse`].
#[derive(Debug)]
pub struct File {
    pub(crate) id: SourceId,
    pub statements: Vec<WithErrData<Statement>>,
}

/// One statement line: optional label definition, mnemonic, operands.
///
/// When produced by [`parse`], may contain any number or types of operands;
/// operands are parsed as an arbitrarily long list no matter which mnemonic
/// was used. The number and types of operands are validated during
/// [semantic analysis](crate::analyze).
#[derive(Debug, Eq, PartialEq)]
pub struct Statement {
    pub label: Option<WithErrData<String>>,
    pub opcode: WithErrData<Opcode>,
    pub operands: WithErrData<Vec<WithErrData<Operand>>>,
}

/// An operand of a statement.
///
/// Each variant directly corresponds to a [`Token`](crate::lex::Token)
/// variant of the same name.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Operand {
    Register(Reg),
    NumberLiteral(i16),
    StringLiteral(String),
    Label(String),
}

fn operand() -> impl Parser<Token, WithErrData<Operand>, Error = Simple<Token>> {
    let operand = filter_map(move |span, t: Token| match t.clone() {
        Token::Register(reg) => Ok(Ok(Operand::Register(reg))),
        Token::NumberLiteral(val) => Ok(Ok(Operand::NumberLiteral(val))),
        Token::StringLiteral(s) => Ok(Ok(Operand::StringLiteral(s))),
        Token::Label(s) => Ok(Ok(Operand::Label(s))),
        Token::Opcode(_) | Token::LabelDef(_) | Token::Invalid => Ok(Err(())),
        _ => Err(Simple::expected_input_found(span, None, Some(t))),
    });
    operand.map_with_span(|o, span| (o, span))
}

fn operands() -> impl Parser<Token, WithErrData<Vec<WithErrData<Operand>>>, Error = Simple<Token>> {
    operand()
        .separated_by(just(Token::Comma))
        .map_with_span(|os, span| (Ok(os), span))
}

fn statement() -> impl Parser<Token, WithErrData<Statement>, Error = Simple<Token>> {
    let label = select! {
        Token::LabelDef(s) => Ok(s),
        Token::Invalid => Err(())
    }
    .map_with_span(|l, s| (l, s));

    let opcode = filter_map(move |span, t: Token| match t.clone() {
        Token::Opcode(o) => Ok(Ok(o)),
        Token::Invalid => Ok(Err(())),
        _ => Err(Simple::expected_input_found(span, None, Some(t))),
    })
    .map_with_span(|o, span| (o, span));

    let terminator = just(Token::Comment)
        .or_not()
        .then(just(Token::Newline).ignored().or(end()))
        .ignored();

    label
        .or_not()
        .then(opcode)
        .then(operands())
        .then_ignore(terminator.rewind())
        .map_with_span(|((l, o), os), span| {
            let statement = Statement {
                label: l,
                opcode: o,
                operands: os,
            };
            (Ok(statement), span)
        })
        // Pseudo-recovery strategy -- take everything until the end of the line.
        .or(none_of([Token::Newline, Token::Comment])
            .repeated()
            .at_least(1)
            .map_with_span(|_, span| (Err(()), span)))
}

fn comments_and_newlines() -> impl Parser<Token, (), Error = Simple<Token>> {
    just(Token::Comment)
        .or_not()
        .then(just(Token::Newline).repeated().at_least(1))
        .repeated()
        .at_least(1)
        .ignored()
}

fn file(id: SourceId) -> impl Parser<Token, Spanned<File>, Error = Simple<Token>> {
    comments_and_newlines()
        .or_not()
        .ignore_then(
            statement()
                .separated_by(comments_and_newlines())
                .allow_trailing(),
        )
        .then_ignore(just(Token::Comment).or_not())
        .then_ignore(end())
        .map_with_span(move |statements, span| {
            (
                File {
                    id: id.clone(),
                    statements,
                },
                span,
            )
        })
}

/// Produce a [`File`] (syntax tree) representative of the given tokens.
///
/// See the [module-level documentation](crate::parse) for general
/// information and examples.
///
/// `tokens` must be the tokens produced by [`lex`](crate::lex::lex)ing
/// `src`.
pub fn parse(
    id: SourceId,
    src: &str,
    tokens: Vec<Spanned<Token>>,
) -> Result<Spanned<File>, Vec<Simple<Token>>> {
    let len = src.chars().count();
    let (maybe_file, errors) =
        file(id).parse_recovery_verbose(Stream::from_iter(len..len + 1, tokens.into_iter()));

    maybe_file.ok_or(errors)
}

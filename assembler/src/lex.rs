//! Functions and data structures for lexing the (already macro-expanded)
//! assembly source.
//!
//! Lexing splits the source string into a sequence of meaningful "tokens",
//! each a small data structure representing one word or punctuation mark.
//! Here's an example:
//!
//! ```
//! # use t12_assembler::lex::*;
//! # use t12_assembler::lex::Token::*;
//! # use t12_assembler::isa::Opcode::*;
//! # use t12_assembler::isa::Reg::*;
//! let source = "mov r1, r2 ; inc counter";
//! let tokens = lex(source).unwrap();
//! assert_eq!(tokens,
//!     vec![
//!         (Opcode(Mov),   0.. 3),
//!         (Register(R1),  4.. 6),
//!         (Comma,         6.. 7),
//!         (Register(R2),  8..10),
//!         (Comment,      11..24),
//!     ]);
//! ```
//!
//! Each part separated by spaces or punctuation becomes its own token; the
//! entire comment is one token with no record of what it said, because its
//! content doesn't change the code being assembled.
//!
//! Lexing only splits the string. It doesn't check whether the order of
//! tokens makes sense — `r1 mov` lexes fine. Ordering is the parser's
//! concern, and anything that isn't a valid token at all becomes a
//! [`Token::Invalid`] for the later stages to report.
//!
//! [`lex`] also outputs each token's location in the source string as an
//! index range, used to construct error messages that point at specific
//! source locations.

use chumsky::prelude::*;
use std::fmt::{Display, Formatter};

use crate::isa::{Opcode, Reg};
use crate::Spanned;

/// A unit representing one string of meaningful text in the source.
///
/// Produced by [`lex`]ing. See the [module-level documentation](crate::lex)
/// for examples.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub enum Token {
    /// An opcode or directive mnemonic.
    Opcode(Opcode),
    /// A register reference (e.g., `r3`).
    Register(Reg),
    /// A number literal: optional `#` qualifier, optional sign, decimal
    /// digits (e.g. `7`, `#-5`) — or a character literal (e.g. `'a'`),
    /// which carries its code point.
    NumberLiteral(i16),
    /// A string literal (e.g., `"Hello, world!"`).
    StringLiteral(String),
    /// An identifier immediately followed by `:` — a label definition.
    LabelDef(String),
    /// A bare identifier: a label reference, or a would-be label.
    Label(String),

    /// A newline. Statements are newline-terminated.
    Newline,
    /// A comma (`,`).
    Comma,
    /// A comment, including the leading semicolon.
    Comment,

    /// Any string of characters which doesn't represent any other type of
    /// token.
    Invalid,
}

impl Display for Token {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

fn one_opcode(pattern: &'static str, output_opcode: Opcode) -> impl Parser<char, Opcode, Error = Simple<char>> {
    just_to(pattern, output_opcode)
}

fn one_register(pattern: &'static str, output_reg: Reg) -> impl Parser<char, Reg, Error = Simple<char>> {
    just_to(pattern, output_reg)
}

fn just_to<O: Clone>(pattern: &'static str, output: O) -> impl Parser<char, O, Error = Simple<char>> {
    just(pattern).to(output)
}

fn string_literal() -> impl Parser<char, Token, Error = Simple<char>> {
    // `escape` and `string_literal` are based on JSON parser example
    // https://github.com/zesterer/chumsky/blob/d4102128315d9dbbea901a91dc5eaa0fc9a790f7/examples/json.rs#L39
    let escape = just::<_, _, Simple<char>>('\\').ignore_then(
        just('\\')
            .or(just('"'))
            .or(just('n').to('\n'))
            .or(just('r').to('\r'))
            .or(just('t').to('\t')),
    );

    just('"')
        .ignore_then(filter(|c| *c != '\\' && *c != '"').or(escape).repeated())
        .then_ignore(just('"'))
        .collect::<String>()
        .map(Token::StringLiteral)
}

fn comment() -> impl Parser<char, Token, Error = Simple<char>> {
    just(';')
        .then(filter(|c| !is_newline(c)).repeated())
        .to(Token::Comment)
}

fn tokens() -> impl Parser<char, Vec<Spanned<Token>>, Error = Simple<char>> {
    let newline = text::newline().to(Token::Newline);

    let comma = just(',').to(Token::Comma);

    let non_newline_whitespace =
        filter(|c: &char| c.is_whitespace() && !is_newline(c)).repeated();

    let terminator = filter(|c: &char| c.is_whitespace() || *c == ',' || *c == ';')
        .ignored()
        .or(end().ignored());

    use Opcode::*;
    // These options are separated by `or` instead of all belonging
    // to one tuple passed to `choice` because `choice` only supports
    // tuples with up to 26 elements.
    // The grouping into machine opcodes and directives was chosen for
    // readability.
    let opcode = choice((
        one_opcode("mov", Mov),
        one_opcode("cmp", Cmp),
        one_opcode("add", Add),
        one_opcode("sub", Sub),
        one_opcode("not", Not),
        one_opcode("clr", Clr),
        one_opcode("lea", Lea),
        one_opcode("inc", Inc),
        one_opcode("dec", Dec),
        one_opcode("jmp", Jmp),
        one_opcode("bne", Bne),
        one_opcode("red", Red),
        one_opcode("prn", Prn),
        one_opcode("jsr", Jsr),
        one_opcode("rts", Rts),
        one_opcode("hlt", Hlt),
    ))
    .or(choice((
        one_opcode(".data", Data),
        one_opcode(".string", Str),
        one_opcode(".entry", Entry),
        one_opcode(".extern", Extern),
    )))
    .then_ignore(terminator.clone().rewind())
    .map(Token::Opcode);

    use Reg::*;
    let register = choice((
        one_register("r0", R0),
        one_register("r1", R1),
        one_register("r2", R2),
        one_register("r3", R3),
        one_register("r4", R4),
        one_register("r5", R5),
        one_register("r6", R6),
        one_register("r7", R7),
    ))
    .then_ignore(terminator.clone().rewind())
    .map(Token::Register);

    let number_literal = just('#')
        .or_not()
        .ignore_then(one_of("+-").or_not())
        .then(text::digits(10))
        .try_map(|(sign, digits): (Option<char>, String), span| {
            let parse_result = match sign {
                Some('-') => format!("-{}", digits).parse::<i16>(),
                _ => digits.parse::<i16>(),
            };
            parse_result.map_err(|e| Simple::custom(span, e.to_string()))
        })
        .then_ignore(terminator.clone().rewind())
        .map(Token::NumberLiteral);

    let char_literal = just('\'')
        .ignore_then(filter(|c: &char| *c != '\'' && !is_newline(c)))
        .then_ignore(just('\''))
        .then_ignore(terminator.clone().rewind())
        .map(|c| Token::NumberLiteral(c as i16));

    let label_def = text::ident()
        .then_ignore(just(':'))
        .then_ignore(terminator.clone().rewind())
        .map(Token::LabelDef);

    let label = text::ident() // C-style identifier; length and charset are validated during analysis.
        .then_ignore(terminator.rewind())
        .map(Token::Label);

    let token = choice((
        opcode,
        register,
        number_literal,
        char_literal,
        string_literal(),
        label_def,
        label,
        newline,
        comma,
        comment(),
    ))
    .recover_with(skip_until(
        [',', ';', ' ', '\t', '\n', '\r', '\x0B', '\x0C', '\u{0085}', '\u{2028}', '\u{2029}'],
        |_| Token::Invalid,
    ));

    token
        .map_with_span(|token, span| (token, span))
        .padded_by(non_newline_whitespace)
        .repeated()
        .then_ignore(end())
}

fn is_newline(c: &char) -> bool {
    // All line breaks matched by chumsky::text::newline
    ['\n',
        '\r',
        '\x0B',                   // Vertical tab
        '\x0C',                   // Form feed
        '\u{0085}',               // Next line
        '\u{2028}',               // Line separator
        '\u{2029}', ].contains(c) // Paragraph separator
}

/// Produce a sequence of [`Token`]s representative of the given source
/// string, with each token's index range.
///
/// See the [module-level documentation](crate::lex) for general information
/// and examples. Characters that don't form a valid token become
/// [`Token::Invalid`] rather than failing the lex, so later stages can
/// report them in context; `Err` is only returned when recovery produced no
/// token stream at all.
pub fn lex(source: &str) -> Result<Vec<Spanned<Token>>, Vec<Simple<char>>> {
    let (maybe_tokens, errors) = tokens().parse_recovery_verbose(source);
    maybe_tokens.ok_or(errors)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::isa::Opcode::*;
    use crate::isa::Reg::*;
    use pretty_assertions::assert_eq;
    use Token::*;

    #[test]
    fn lone_error() {
        let source = "#oops";
        let tokens = lex(source).unwrap();
        assert_eq!(vec![(Invalid, 0..5)], tokens);
    }

    #[test]
    fn error_in_context() {
        let source = "mov r1, #oops; <- error";
        let tokens = lex(source).unwrap();
        assert_eq!(
            vec![
                (Opcode(Mov), 0..3),
                (Register(R1), 4..6),
                (Comma, 6..7),
                (Invalid, 8..13),
                (Comment, 13..23),
            ],
            tokens
        );
    }

    #[test]
    fn label_definition_includes_the_colon() {
        let source = "MAIN: add r3, W";
        let tokens = lex(source).unwrap();
        assert_eq!(
            vec![
                (LabelDef("MAIN".to_string()), 0..5),
                (Opcode(Add), 6..9),
                (Register(R3), 10..12),
                (Comma, 12..13),
                (Label("W".to_string()), 14..15),
            ],
            tokens
        );
    }

    #[test]
    fn number_literals() {
        let source = ".data #-5, 7, '*'";
        let tokens = lex(source).unwrap();
        assert_eq!(
            vec![
                (Opcode(Data), 0..5),
                (NumberLiteral(-5), 6..9),
                (Comma, 9..10),
                (NumberLiteral(7), 11..12),
                (Comma, 12..13),
                (NumberLiteral(42), 14..17),
            ],
            tokens
        );
    }

    #[test]
    fn mnemonic_prefix_does_not_split_identifiers() {
        let source = "movement";
        let tokens = lex(source).unwrap();
        assert_eq!(vec![(Label("movement".to_string()), 0..8)], tokens);
    }

    #[test]
    fn string_literal_keeps_spacing() {
        let source = ".string \"a  b\"";
        let tokens = lex(source).unwrap();
        assert_eq!(
            vec![
                (Opcode(Str), 0..7),
                (StringLiteral("a  b".to_string()), 8..14),
            ],
            tokens
        );
    }

    #[test]
    fn reserved_word_as_label_definition_still_lexes() {
        // Analysis rejects it; the lexer just records what's there.
        let source = "mov: rts";
        let tokens = lex(source).unwrap();
        assert_eq!(
            vec![(LabelDef("mov".to_string()), 0..4), (Opcode(Rts), 5..8)],
            tokens
        );
    }
}

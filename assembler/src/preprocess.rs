//! The macro layer: capture `mcro`/`endmcro` definitions and substitute
//! calls, producing the expanded source the assembler proper consumes.
//!
//! The preprocessor is line-oriented and runs before lexing. It makes two
//! scans over the file. The first is a small state machine — `Scanning`
//! until a `mcro` marker opens a definition, `InMacroBody` until `endmcro`
//! closes it — which fills the per-file [`MacroTable`]. The second scan
//! drops the definition lines and replaces each call line with the macro's
//! body, verbatim:
//!
//! ```
//! # use t12_assembler::preprocess::preprocess;
//! let source = "mcro GREET\nmov r1,r2\nendmcro\nGREET\nhlt\n";
//! let (expanded, errors) = preprocess(&"demo.as".to_string(), source);
//! assert!(errors.is_empty());
//! assert_eq!("mov r1,r2\nhlt\n", expanded.unwrap());
//! ```
//!
//! A macro call must be the entire content of its line; anything after the
//! call is an error. Lines that aren't markers, definitions or calls pass
//! through unchanged except for whitespace normalization (runs of blanks
//! collapse to one space, ends are trimmed — string literals excepted), so
//! preprocessing already-expanded source is the identity.
//!
//! This stage also enforces two whole-line rules from the dialect: no line
//! may exceed [`MAX_LINE_LENGTH`](crate::isa::MAX_LINE_LENGTH) characters,
//! and no line may begin with a digit.
//!
//! Every problem found is reported and scanning continues; any error
//! suppresses the expanded output (returning `None`), so the assembler
//! stages only ever see cleanly-expanded source.

use std::collections::HashMap;
use std::mem;

use crate::error::{Error, SingleError};
use crate::isa::MAX_LINE_LENGTH;
use crate::util::validate_identifier;
use crate::{SourceId, Span};

/// The marker opening a macro definition.
pub const MACRO_START: &str = "mcro";
/// The marker closing a macro definition.
pub const MACRO_END: &str = "endmcro";

/// One captured macro: its validated name, its body lines (kept verbatim,
/// already whitespace-normalized like the rest of the file), and the line
/// number of its `mcro` marker.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Macro {
    pub name: String,
    pub body: Vec<String>,
    pub line: usize,
}

/// The macros of one file, built by the capture scan and read by the
/// substitution scan. Never shared across files.
#[derive(Debug, Default)]
pub struct MacroTable {
    macros: HashMap<String, Macro>,
}

impl MacroTable {
    fn insert(&mut self, m: Macro) {
        self.macros.insert(m.name.clone(), m);
    }

    pub fn get(&self, name: &str) -> Option<&Macro> {
        self.macros.get(name)
    }
}

/// One raw source line, split and normalized for the scans.
struct SourceLine<'a> {
    number: usize,
    span: Span,
    raw: &'a str,
    /// The statement part, whitespace-normalized, comment stripped.
    code: String,
    /// The full normalized line, comment included — what pass-through and
    /// macro bodies emit.
    text: String,
}

/// Split at the first `;` that isn't inside a string literal.
fn split_comment(line: &str) -> (&str, Option<&str>) {
    let mut in_string = false;
    for (i, c) in line.char_indices() {
        match c {
            '"' => in_string = !in_string,
            ';' if !in_string => return (&line[..i], Some(&line[i + 1..])),
            _ => {}
        }
    }
    (line, None)
}

/// Collapse every run of blanks outside string literals to a single space
/// and trim both ends.
fn normalize_whitespace(code: &str) -> String {
    let mut out = String::with_capacity(code.len());
    let mut in_string = false;
    let mut pending_space = false;
    for c in code.chars() {
        if in_string {
            out.push(c);
            if c == '"' {
                in_string = false;
            }
        } else if c.is_whitespace() {
            pending_space = true;
        } else {
            if pending_space && !out.is_empty() {
                out.push(' ');
            }
            pending_space = false;
            out.push(c);
            if c == '"' {
                in_string = true;
            }
        }
    }
    out
}

fn source_lines(src: &str) -> Vec<SourceLine> {
    let mut lines = Vec::new();
    let mut offset = 0;
    for (i, raw_with_cr) in src.split('\n').enumerate() {
        let raw = raw_with_cr.trim_end_matches('\r');
        let (code, comment) = split_comment(raw);
        let code = normalize_whitespace(code);
        let text = match comment {
            Some(comment) if code.is_empty() => format!(";{}", comment),
            Some(comment) => format!("{} ;{}", code, comment),
            None => code.clone(),
        };
        lines.push(SourceLine {
            number: i + 1,
            span: offset..offset + raw.len(),
            raw,
            code,
            text,
        });
        offset += raw_with_cr.len() + 1;
    }
    // `split` yields one empty trailing piece for input ending in a newline.
    if let Some(last) = lines.last() {
        if last.raw.is_empty() {
            lines.pop();
        }
    }
    lines
}

enum ScanState {
    Scanning,
    InMacroBody {
        /// `None` when the declaration was invalid: the body is still
        /// consumed, then discarded.
        name: Option<String>,
        body: Vec<String>,
        start_line: usize,
        start_span: Span,
    },
}

struct Capture<'a> {
    id: &'a SourceId,
    table: MacroTable,
    /// Marks definition lines (markers and bodies) for the second scan to
    /// drop.
    definition: Vec<bool>,
    errors: Vec<Error>,
}

impl<'a> Capture<'a> {
    fn error(&mut self, span: &Span, error: SingleError) {
        self.errors.push(Error::Spanned(
            (self.id.clone(), span.clone()).into(),
            error,
        ));
    }

    /// Handle a `mcro` marker line: validate the declared name and open the
    /// body. An invalid declaration still opens the body so scanning stays
    /// aligned, but the capture is discarded at `endmcro`.
    fn begin_macro<'t>(
        &mut self,
        line: &SourceLine,
        mut tokens: impl Iterator<Item = &'t str>,
    ) -> ScanState {
        let name = match tokens.next() {
            None => {
                self.error(&line.span, SingleError::MacroNameMissing);
                None
            }
            Some(name) => {
                let mut valid = true;

                let reasons = validate_identifier(name);
                if !reasons.is_empty() {
                    self.error(
                        &line.span,
                        SingleError::BadMacroName {
                            name: name.to_string(),
                            reasons,
                        },
                    );
                    valid = false;
                }

                if let Some(original) = self.table.get(name) {
                    let original_line = original.line;
                    self.error(
                        &line.span,
                        SingleError::DuplicateMacro {
                            name: name.to_string(),
                            original_line,
                        },
                    );
                    valid = false;
                }

                let extra = tokens.collect::<Vec<_>>();
                if !extra.is_empty() {
                    self.error(
                        &line.span,
                        SingleError::ExtraTextAfterMarker {
                            text: extra.join(" "),
                        },
                    );
                    valid = false;
                }

                if valid {
                    Some(name.to_string())
                } else {
                    None
                }
            }
        };

        ScanState::InMacroBody {
            name,
            body: Vec::new(),
            start_line: line.number,
            start_span: line.span.clone(),
        }
    }

    fn scan(&mut self, lines: &[SourceLine]) {
        let mut state = ScanState::Scanning;

        for (i, line) in lines.iter().enumerate() {
            let mut tokens = line.code.split_whitespace();
            let first = tokens.next();

            match &mut state {
                ScanState::Scanning => match first {
                    Some(MACRO_END) => {
                        self.definition[i] = true;
                        self.error(&line.span, SingleError::StrayEndMarker);
                    }
                    Some(MACRO_START) => {
                        self.definition[i] = true;
                        state = self.begin_macro(line, tokens);
                    }
                    _ => {}
                },
                ScanState::InMacroBody {
                    name,
                    body,
                    start_line,
                    start_span,
                } => {
                    self.definition[i] = true;
                    match first {
                        Some(MACRO_END) => {
                            let extra = tokens.collect::<Vec<_>>();
                            if !extra.is_empty() {
                                self.error(
                                    &line.span,
                                    SingleError::ExtraTextAfterMarker {
                                        text: extra.join(" "),
                                    },
                                );
                            }
                            if let Some(name) = name.take() {
                                self.table.insert(Macro {
                                    name,
                                    body: mem::take(body),
                                    line: *start_line,
                                });
                            }
                            state = ScanState::Scanning;
                        }
                        Some(MACRO_START) => {
                            let unterminated = SingleError::UnterminatedMacro {
                                name: name.clone().unwrap_or_else(|| "?".to_string()),
                            };
                            let span = start_span.clone();
                            self.error(&span, unterminated);
                            state = self.begin_macro(line, tokens);
                        }
                        _ => body.push(line.text.clone()),
                    }
                }
            }
        }

        if let ScanState::InMacroBody {
            name, start_span, ..
        } = state
        {
            let unterminated = SingleError::UnterminatedMacro {
                name: name.unwrap_or_else(|| "?".to_string()),
            };
            self.error(&start_span, unterminated);
        }
    }
}

/// Expand macros in `src`.
///
/// Returns the expanded source (only when no errors were found) and every
/// diagnostic raised along the way.
pub fn preprocess(id: &SourceId, src: &str) -> (Option<String>, Vec<Error>) {
    let lines = source_lines(src);

    let mut capture = Capture {
        id,
        table: MacroTable::default(),
        definition: vec![false; lines.len()],
        errors: Vec::new(),
    };

    // Whole-line rules, checked on the raw text before any capture.
    for line in &lines {
        if line.raw.chars().count() > MAX_LINE_LENGTH {
            capture.error(
                &line.span,
                SingleError::LineTooLong {
                    length: line.raw.chars().count(),
                },
            );
        }
        if line
            .code
            .chars()
            .next()
            .map(|c| c.is_ascii_digit())
            .unwrap_or(false)
        {
            capture.error(&line.span, SingleError::DigitLeadingLine);
        }
    }

    capture.scan(&lines);

    let Capture {
        table,
        definition,
        mut errors,
        ..
    } = capture;

    // Substitution scan: drop definition lines, splice call lines. A call
    // must be the entire content of its line, so any other token on a line
    // that names a macro is extraneous text.
    let mut out: Vec<String> = Vec::new();
    for (i, line) in lines.iter().enumerate() {
        if definition[i] {
            continue;
        }
        let tokens = line.code.split_whitespace().collect::<Vec<_>>();
        if let Some(call) = tokens.iter().position(|t| table.get(t).is_some()) {
            let name = tokens[call];
            let extra = tokens
                .iter()
                .enumerate()
                .filter(|(i, _)| *i != call)
                .map(|(_, t)| *t)
                .collect::<Vec<_>>();
            if !extra.is_empty() {
                errors.push(Error::Spanned(
                    (id.clone(), line.span.clone()).into(),
                    SingleError::ExtraTextAfterCall {
                        name: name.to_string(),
                        text: extra.join(" "),
                    },
                ));
            } else if let Some(mac) = table.get(name) {
                out.extend(mac.body.iter().cloned());
            }
            continue;
        }
        out.push(line.text.clone());
    }

    if !errors.is_empty() {
        return (None, errors);
    }

    let mut expanded = out.join("\n");
    if !expanded.is_empty() {
        expanded.push('\n');
    }
    (Some(expanded), errors)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SingleError::*;
    use pretty_assertions::assert_eq;

    fn run(src: &str) -> (Option<String>, Vec<Error>) {
        preprocess(&"test.as".to_string(), src)
    }

    fn errors_of(src: &str) -> Vec<SingleError> {
        run(src)
            .1
            .into_iter()
            .map(|e| match e {
                Error::Spanned(_, single) | Error::Single(_, single) => single,
            })
            .collect()
    }

    #[test]
    fn macro_call_expands_to_body_lines_in_order() {
        let (expanded, errors) = run("mcro GREET\nmov r1,r2\nadd r1,r3\nendmcro\nGREET\n");
        assert!(errors.is_empty());
        assert_eq!("mov r1,r2\nadd r1,r3\n", expanded.unwrap());
    }

    #[test]
    fn call_may_precede_definition() {
        let (expanded, errors) = run("GREET\nmcro GREET\nhlt\nendmcro\n");
        assert!(errors.is_empty());
        assert_eq!("hlt\n", expanded.unwrap());
    }

    #[test]
    fn macro_free_input_is_normalized_only() {
        let (expanded, errors) = run("MAIN:   mov\tr1 , r2\n\nhlt ; done\n");
        assert!(errors.is_empty());
        assert_eq!("MAIN: mov r1 , r2\n\nhlt ; done\n", expanded.unwrap());
    }

    #[test]
    fn expansion_is_idempotent_on_expanded_source() {
        let (first, _) = run("mcro M\nprn #1\nendmcro\nM\nrts\n");
        let first = first.unwrap();
        let (second, errors) = run(&first);
        assert!(errors.is_empty());
        assert_eq!(first, second.unwrap());
    }

    #[test]
    fn string_literal_whitespace_survives_normalization() {
        let (expanded, errors) = run("S: .string  \"a  b ; c\"\n");
        assert!(errors.is_empty());
        assert_eq!("S: .string \"a  b ; c\"\n", expanded.unwrap());
    }

    #[test]
    fn unterminated_macro_is_an_error() {
        assert!(matches!(
            errors_of("mcro M\nmov r1,r2\n")[0],
            UnterminatedMacro { .. }
        ));
    }

    #[test]
    fn stray_end_marker_is_an_error() {
        assert!(matches!(errors_of("endmcro\n")[0], StrayEndMarker));
    }

    #[test]
    fn nested_start_marker_reports_the_first_macro() {
        let errors = errors_of("mcro A\nmcro B\nhlt\nendmcro\n");
        assert!(matches!(&errors[0], UnterminatedMacro { name } if name == "A"));
        // The second macro still captures.
        assert_eq!(1, errors.len());
    }

    #[test]
    fn reserved_duplicate_and_oversized_names_are_errors() {
        assert!(matches!(
            errors_of("mcro mov\nendmcro\n")[0],
            BadMacroName { .. }
        ));
        assert!(matches!(
            errors_of("mcro M\nendmcro\nmcro M\nendmcro\n")[0],
            DuplicateMacro { .. }
        ));
        let long = format!("mcro {}\nendmcro\n", "M".repeat(40));
        assert!(matches!(errors_of(&long)[0], BadMacroName { .. }));
    }

    #[test]
    fn extra_text_after_markers_and_calls_is_an_error() {
        assert!(matches!(
            errors_of("mcro M extra\nendmcro\n")[0],
            ExtraTextAfterMarker { .. }
        ));
        assert!(matches!(
            errors_of("mcro M\nhlt\nendmcro junk\n")[0],
            ExtraTextAfterMarker { .. }
        ));
        assert!(matches!(
            errors_of("mcro M\nhlt\nendmcro\nM r1\n")[0],
            ExtraTextAfterCall { .. }
        ));
        // A call must be the whole line; a label in front counts too.
        assert!(matches!(
            errors_of("mcro M\nhlt\nendmcro\nMAIN: M\n")[0],
            ExtraTextAfterCall { .. }
        ));
    }

    #[test]
    fn whole_line_rules() {
        let long_line = format!("{}\n", "x".repeat(MAX_LINE_LENGTH + 1));
        assert!(matches!(errors_of(&long_line)[0], LineTooLong { .. }));
        assert!(matches!(errors_of("5tart: hlt\n")[0], DigitLeadingLine));
    }

    #[test]
    fn errors_suppress_the_expanded_output() {
        let (expanded, errors) = run("endmcro\nhlt\n");
        assert!(expanded.is_none());
        assert!(!errors.is_empty());
    }
}

//! A two-pass assembler for a little 12-bit teaching machine.
//!
//! The input dialect is line-oriented: one statement per line, an optional
//! leading label ending in `:`, then either one of the 16 opcodes or one of
//! the directives `.data`, `.string`, `.entry`, `.extern`. Comments start
//! with `;` and run to the end of the line. Before any of that, a small
//! macro layer (`mcro NAME` ... `endmcro`) is expanded textually.
//!
//! Assembly of one file runs through these stages, each a module of this
//! crate:
//!
//! 1. [`preprocess`]: capture and substitute macros, producing the expanded
//!    source (the `.am` intermediate).
//! 2. [`lex`]: split the expanded source into spanned [`Token`](lex::Token)s.
//! 3. [`parse`]: structure the tokens into a [`File`](parse::File) syntax
//!    tree, recovering from bad tokens so later stages can explain them.
//! 4. [`analyze`]: accumulate every syntax/semantic diagnostic the tree
//!    holds — nothing here stops at the first error.
//! 5. [`assemble`]: the first pass. Builds the symbol table and the code and
//!    data images; operand words that reference a not-yet-defined label stay
//!    pending.
//! 6. [`link`]: the second pass. Resolves pending words, promotes `.entry`
//!    labels, and collects external references.
//! 7. [`encode`] + [`output`]: pack each completed word into its 12-bit
//!    pattern and render the object/entries/externals artifacts.
//!
//! The three output artifacts are produced only when the whole run
//! accumulated zero errors; warnings never suppress them.

use std::path::Path;

pub mod analyze;
pub mod assemble;
pub mod encode;
pub mod error;
pub mod isa;
pub mod lex;
pub mod link;
pub mod output;
pub mod parse;
pub mod preprocess;
pub mod symbols;
pub(crate) mod util;

use error::Error;

/// An index range into a source string, as produced by the lexer and carried
/// through every later stage.
pub type Span = std::ops::Range<usize>;

/// A value paired with its location in the source.
pub type Spanned<T> = (T, Span);

/// Identifies the source a span refers to. One per input file.
pub type SourceId = String;

/// Construct the [`SourceId`] for a source file path.
pub fn id(path: &Path) -> SourceId {
    path.to_string_lossy().into_owned()
}

/// The [`SourceId`] of the macro-expanded intermediate of a source.
///
/// Diagnostics from the assembler stages point into the expanded text (the
/// `.am` artifact), not the raw file — macro substitution moves lines
/// around, so raw-source offsets would lie.
pub fn expanded_id(id: &SourceId) -> SourceId {
    match id.strip_suffix(".as") {
        Some(stem) => format!("{}.am", stem),
        None => format!("{}.am", id),
    }
}

/// A span together with the source it indexes into.
///
/// Spans produced while processing a single file don't carry the file name;
/// this pairing is added at the reporting boundary so diagnostics from
/// different files can share one sink.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct SpanWithSource {
    pub id: SourceId,
    pub span: Span,
}

impl From<(SourceId, Span)> for SpanWithSource {
    fn from((id, span): (SourceId, Span)) -> Self {
        Self { id, span }
    }
}

impl ariadne::Span for SpanWithSource {
    type SourceId = SourceId;

    fn source(&self) -> &SourceId {
        &self.id
    }
    fn start(&self) -> usize {
        self.span.start
    }
    fn end(&self) -> usize {
        self.span.end
    }
}

/// A syntax tree element which may instead hold an error placeholder.
///
/// The parser recovers from out-of-place tokens by substituting `Err(())`
/// for the smallest element it couldn't make sense of, so one bad token
/// doesn't take the rest of the line (or file) with it. [`analyze`] walks
/// the tree and reports each placeholder with its span.
pub type WithErrData<T> = Spanned<Result<T, ()>>;

/// The text artifacts produced for one cleanly-assembled file.
///
/// `expanded` is the macro-expanded source (the `.am` intermediate);
/// `entries` and `externals` are present only when the file declares at
/// least one entry symbol or uses at least one external symbol.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Artifacts {
    pub expanded: String,
    pub object: String,
    pub entries: Option<String>,
    pub externals: Option<String>,
}

/// The artifact types a driver can receive, for sinks keyed by kind.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ArtifactKind {
    Object,
    Entries,
    Externals,
}

impl Artifacts {
    /// The artifact text for `kind`, if this run produced one.
    pub fn get(&self, kind: ArtifactKind) -> Option<&str> {
        match kind {
            ArtifactKind::Object => Some(self.object.as_str()),
            ArtifactKind::Entries => self.entries.as_deref(),
            ArtifactKind::Externals => self.externals.as_deref(),
        }
    }
}

fn has_errors(diagnostics: &[Error]) -> bool {
    diagnostics.iter().any(|d| !d.is_warning())
}

/// A failed run: every diagnostic the run accumulated, plus the expanded
/// source when preprocessing succeeded (assembler-stage spans index into
/// it, under [`expanded_id`]).
#[derive(Debug)]
pub struct Failure {
    pub expanded: Option<String>,
    pub diagnostics: Vec<Error>,
}

/// Assemble one source file.
///
/// On success, returns the artifacts together with any warnings the run
/// produced. On failure, returns every diagnostic accumulated across all
/// stages — scanning never stops at the first problem, so a single run
/// surfaces everything it can diagnose.
pub fn assemble(id: SourceId, src: &str) -> Result<(Artifacts, Vec<Error>), Failure> {
    let mut diagnostics = Vec::new();

    let (expanded, preprocess_errors) = preprocess::preprocess(&id, src);
    diagnostics.extend(preprocess_errors);
    let expanded = match expanded {
        Some(expanded) => expanded,
        None => {
            return Err(Failure {
                expanded: None,
                diagnostics,
            })
        }
    };

    let am_id = expanded_id(&id);

    let tokens = match lex::lex(&expanded) {
        Ok(tokens) => tokens,
        Err(lex_errors) => {
            diagnostics.extend(error::from_lex_errors(&am_id, lex_errors));
            return Err(Failure {
                expanded: Some(expanded),
                diagnostics,
            });
        }
    };

    let file_spanned = match parse::parse(am_id.clone(), &expanded, tokens) {
        Ok(file_spanned) => file_spanned,
        Err(parse_errors) => {
            diagnostics.extend(error::from_parse_errors(&am_id, parse_errors));
            return Err(Failure {
                expanded: Some(expanded),
                diagnostics,
            });
        }
    };

    diagnostics.extend(analyze::validate(&file_spanned));

    // Both passes run even when analysis already failed the file: first- and
    // second-pass diagnoses are surfaced together, and the failure flag is
    // only consulted once both passes are done.
    let first_pass_output = assemble::first_pass(&file_spanned.0);

    let (linked, link_errors) = link::second_pass(first_pass_output);
    diagnostics.extend(link_errors);

    if has_errors(&diagnostics) {
        return Err(Failure {
            expanded: Some(expanded),
            diagnostics,
        });
    }

    let artifacts = output::artifacts(expanded, &linked);
    Ok((artifacts, diagnostics))
}

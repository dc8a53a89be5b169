extern crate t12_assembler;

use pretty_assertions::assert_eq;

use t12_assembler::error::{Error, InvalidReferenceReason, SingleError};
use t12_assembler::{assemble, Artifacts, Failure};

fn assemble_str(src: &str) -> Result<(Artifacts, Vec<Error>), Failure> {
    assemble("test.as".to_string(), src)
}

fn assemble_clean(src: &str) -> Artifacts {
    let (artifacts, warnings) =
        assemble_str(src).unwrap_or_else(|failure| panic!("{:?}", failure.diagnostics));
    assert!(warnings.is_empty(), "unexpected warnings: {:?}", warnings);
    artifacts
}

fn kinds(diagnostics: &[Error]) -> Vec<&SingleError> {
    diagnostics
        .iter()
        .map(|e| match e {
            Error::Single(_, single) | Error::Spanned(_, single) => single,
        })
        .collect()
}

#[test]
fn arithmetic_small() {
    let artifacts = assemble_clean(include_str!("inputs/arithmetic_small.as"));
    assert_eq!(
        "9 0\n\
         0100\tAM\n\
         0101\tAD\n\
         0102\tAE\n\
         0103\tDM\n\
         0104\tAB\n\
         0105\tAE\n\
         0106\tKE\n\
         0107\tAO\n\
         0108\tPA\n",
        artifacts.object
    );
    assert_eq!(None, artifacts.entries);
    assert_eq!(None, artifacts.externals);
}

#[test]
fn data_strings_entries_and_externals() {
    let artifacts = assemble_clean(include_str!("inputs/data_and_strings.as"));
    assert_eq!(
        "8 5\n\
         0100\tGc\n\
         0101\tAq\n\
         0102\tAE\n\
         0103\tNE\n\
         0104\tAB\n\
         0105\tMA\n\
         0106\t//\n\
         0107\tPA\n\
         0108\tAG\n\
         0109\t/3\n\
         0110\tBh\n\
         0111\tBi\n\
         0112\tAA\n",
        artifacts.object
    );
    assert_eq!("LIST,0096,0012\n", artifacts.entries.unwrap());
    assert_eq!("PRINT\t104\n", artifacts.externals.unwrap());
}

#[test]
fn macro_calls_expand_to_body_lines() {
    let artifacts = assemble_clean(include_str!("inputs/macros.as"));
    assert_eq!("mov r1, r2\nmov r1, r2\nhlt\n", artifacts.expanded);
    assert_eq!(
        "5 0\n\
         0100\tA8\n\
         0101\tCI\n\
         0102\tA8\n\
         0103\tCI\n\
         0104\tPA\n",
        artifacts.object
    );
}

#[test]
fn duplicate_label_fails_and_suppresses_all_artifacts() {
    let failure = assemble_str("A: .data 1\nA: .data 2\n").unwrap_err();
    assert!(kinds(&failure.diagnostics)
        .iter()
        .any(|k| matches!(k, SingleError::DuplicateLabel { .. })));
}

#[test]
fn entry_extern_conflict_is_an_error() {
    let failure = assemble_str(".extern X\n.entry X\nprn X\nhlt\n").unwrap_err();
    assert!(kinds(&failure.diagnostics).iter().any(|k| matches!(
        k,
        SingleError::InvalidLabelReference {
            reason: InvalidReferenceReason::EntryExternConflict,
            ..
        }
    )));
}

#[test]
fn external_references_resolve_to_the_placeholder_before_and_after_declaration() {
    let artifacts = assemble_clean("jmp E1\n.extern E1\nbne E1\nhlt\n");
    assert_eq!(
        "5 0\n\
         0100\tJE\n\
         0101\tAB\n\
         0102\tKE\n\
         0103\tAB\n\
         0104\tPA\n",
        artifacts.object
    );
    assert_eq!("E1\t101\nE1\t103\n", artifacts.externals.unwrap());
}

#[test]
fn first_data_symbol_lands_at_the_instruction_count() {
    // Two instruction words, so X's address is 2 (absolute 102 = 96 + 6).
    let artifacts = assemble_clean(".entry X\nprn #0\nX: .data 7\n");
    assert_eq!("X,0096,0006\n", artifacts.entries.unwrap());
}

#[test]
fn warnings_do_not_suppress_artifacts() {
    let (artifacts, warnings) = assemble_str(".extern W\nhlt\n").unwrap();
    assert_eq!(1, warnings.len());
    assert!(warnings[0].is_warning());
    assert_eq!("1 0\n0100\tPA\n", artifacts.object);
    assert_eq!(None, artifacts.externals);
}

#[test]
fn undefined_label_is_an_error() {
    let failure = assemble_str("jmp NOWHERE\nhlt\n").unwrap_err();
    assert!(kinds(&failure.diagnostics).iter().any(|k| matches!(
        k,
        SingleError::InvalidLabelReference {
            reason: InvalidReferenceReason::Undefined,
            ..
        }
    )));
}

#[test]
fn preprocessor_errors_fail_the_file_before_assembly() {
    let failure = assemble_str("endmcro\nhlt\n").unwrap_err();
    assert!(failure.expanded.is_none());
    assert!(kinds(&failure.diagnostics)
        .iter()
        .any(|k| matches!(k, SingleError::StrayEndMarker)));
}

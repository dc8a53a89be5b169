extern crate t12_assembler;

use std::fs;
use std::path::Path;
use std::process::exit;

use ariadne::sources;
use clap::{App, Arg};

use t12_assembler::error::{Error, SingleError};
use t12_assembler::{assemble, expanded_id, id, ArtifactKind, Artifacts, SourceId};

const SOURCE_EXTENSION: &str = "as";
const EXPANDED_EXTENSION: &str = "am";
const OBJECT_EXTENSION: &str = "ob";
const ENTRIES_EXTENSION: &str = "ent";
const EXTERNALS_EXTENSION: &str = "ext";

fn main() {
    let matches = App::new("assemble_t12")
        .version(env!("CARGO_PKG_VERSION"))
        .about("A two-pass assembler for a little 12-bit teaching machine.")
        .arg(
            Arg::with_name("bases")
                .help("Extension-less base names; each <base>.as is assembled to <base>.ob (+ .am/.ent/.ext)")
                .value_name("BASE")
                .required(true)
                .multiple(true),
        )
        .get_matches();

    let mut all_clean = true;
    for base in matches.values_of("bases").unwrap() {
        if !process(Path::new(base)) {
            all_clean = false;
        }
    }

    exit(if all_clean { 0 } else { 1 });
}

/// Assemble one base name. Returns whether the file was clean.
fn process(base: &Path) -> bool {
    let source_path = base.with_extension(SOURCE_EXTENSION);
    let source_id = id(&source_path);

    let src = match fs::read_to_string(&source_path) {
        Ok(src) => src,
        Err(e) => {
            let io_error = Error::Single(source_id.clone(), SingleError::Io(e.to_string()));
            report(&[io_error], &source_id, "", None);
            return false;
        }
    };

    match assemble(source_id.clone(), &src) {
        Ok((artifacts, warnings)) => {
            report(&warnings, &source_id, &src, Some(&artifacts.expanded));
            match write_artifacts(base, &artifacts) {
                Ok(()) => true,
                Err(e) => {
                    let io_error =
                        Error::Single(source_id.clone(), SingleError::Io(e.to_string()));
                    report(&[io_error], &source_id, &src, None);
                    false
                }
            }
        }
        Err(failure) => {
            report(
                &failure.diagnostics,
                &source_id,
                &src,
                failure.expanded.as_deref(),
            );
            false
        }
    }
}

fn write_artifacts(base: &Path, artifacts: &Artifacts) -> std::io::Result<()> {
    fs::write(base.with_extension(EXPANDED_EXTENSION), &artifacts.expanded)?;
    for (kind, extension) in [
        (ArtifactKind::Object, OBJECT_EXTENSION),
        (ArtifactKind::Entries, ENTRIES_EXTENSION),
        (ArtifactKind::Externals, EXTERNALS_EXTENSION),
    ] {
        if let Some(text) = artifacts.get(kind) {
            fs::write(base.with_extension(extension), text)?;
        }
    }
    Ok(())
}

/// Print reports for every diagnostic. Spans may point into the raw source
/// or into the expanded intermediate, so the cache carries both.
fn report(diagnostics: &[Error], source_id: &SourceId, src: &str, expanded: Option<&str>) {
    for diagnostic in diagnostics {
        let cache = sources(vec![
            (source_id.clone(), src.to_string()),
            (
                expanded_id(source_id),
                expanded.unwrap_or_default().to_string(),
            ),
        ]);
        let _ = diagnostic.report().eprint(cache);
    }
}

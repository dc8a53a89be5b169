//! Render a linked program into its text artifacts.
//!
//! Pure string building — writing the files (and choosing their names) is
//! the driver's job. Addresses printed here are absolute: the 0-based image
//! indices used everywhere else, shifted by [`CODE_BASE`].
//!
//! - Object: first line `<instruction words> <data words>`, then one line
//!   per memory cell in address order — 4-digit decimal address, a tab, and
//!   the cell's two-symbol alphabet encoding.
//! - Entries (only if at least one symbol is an entry): one line per entry
//!   symbol in definition order, `name,base,offset`, where the absolute
//!   address is split into the largest multiple of 16 below it and the
//!   remainder.
//! - Externals (only if at least one external use-site exists): one line
//!   per use-site in address order.

use itertools::Itertools;

use crate::isa::CODE_BASE;
use crate::link::LinkedProgram;
use crate::Artifacts;

fn object(linked: &LinkedProgram) -> String {
    let header = format!("{} {}", linked.code.len(), linked.data.len());
    let cells = linked
        .code
        .iter()
        .chain(linked.data.iter())
        .enumerate()
        .map(|(i, word)| format!("{:04}\t{}", CODE_BASE as usize + i, word.encode()));

    let mut out = std::iter::once(header).chain(cells).join("\n");
    out.push('\n');
    out
}

fn entries(linked: &LinkedProgram) -> Option<String> {
    let lines = linked
        .symbols
        .iter()
        .filter(|symbol| symbol.entry)
        .map(|symbol| {
            let address = CODE_BASE + symbol.address;
            let offset = address % 16;
            format!("{},{:04},{:04}", symbol.name, address - offset, offset)
        })
        .collect::<Vec<_>>();

    if lines.is_empty() {
        None
    } else {
        Some(lines.join("\n") + "\n")
    }
}

fn externals(linked: &LinkedProgram) -> Option<String> {
    if linked.externals.is_empty() {
        return None;
    }
    let lines = linked
        .externals
        .iter()
        .map(|u| format!("{}\t{}", u.name, CODE_BASE + u.address))
        .join("\n");
    Some(lines + "\n")
}

/// Build all artifacts for a cleanly-assembled file.
pub fn artifacts(expanded: String, linked: &LinkedProgram) -> Artifacts {
    Artifacts {
        expanded,
        object: object(linked),
        entries: entries(linked),
        externals: externals(linked),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assemble::first_pass;
    use crate::lex::lex;
    use crate::link::second_pass;
    use crate::parse::parse;
    use pretty_assertions::assert_eq;

    fn run(source: &str) -> Artifacts {
        let tokens = lex(source).unwrap();
        let file = parse("<test>".to_string(), source, tokens).unwrap();
        let (linked, errors) = second_pass(first_pass(&file.0));
        assert!(errors.iter().all(|e| e.is_warning()), "{:?}", errors);
        artifacts(source.to_string(), &linked)
    }

    #[test]
    fn object_listing_counts_and_addresses() {
        let artifacts = run("MAIN: prn #5\nhlt\n.data 7\n");
        // prn + immediate word + hlt = 3 instruction words, 1 data word.
        let lines = artifacts.object.lines().collect::<Vec<_>>();
        assert_eq!("3 1", lines[0]);
        assert_eq!(5, lines.len());
        assert!(lines[1].starts_with("0100\t"));
        assert!(lines[4].starts_with("0103\t"));
        assert_eq!(None, artifacts.entries);
        assert_eq!(None, artifacts.externals);
    }

    #[test]
    fn entries_split_base_and_offset() {
        let artifacts = run(".entry MAIN\nrts\nMAIN: hlt\n");
        // MAIN is at index 1, so its absolute address is 101 = 96 + 5.
        assert_eq!("MAIN,0096,0005\n", artifacts.entries.unwrap());
    }

    #[test]
    fn externals_list_use_sites() {
        let artifacts = run(".extern E1\njmp E1\njmp E1\n");
        assert_eq!("E1\t101\nE1\t103\n", artifacts.externals.unwrap());
    }
}

//! The per-file symbol table built by the first pass and consumed by the
//! second.
//!
//! Addresses stored here are 0-based word indices into the code or data
//! image; the code base address is only added when artifacts are formatted.
//! Data symbols are relocated past the code image once the first pass knows
//! the final instruction count.

use std::collections::HashMap;

use crate::isa::{self, Addr};

/// What a symbol names.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SymbolKind {
    /// A label on an instruction line; address is an instruction index.
    Code,
    /// A label on a `.data`/`.string` line; address is a data index until
    /// [`SymbolTable::relocate_data`] runs.
    Data,
    /// A `.extern` declaration; address stays 0, use-sites are collected
    /// separately for the externals artifact.
    External,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Symbol {
    pub name: String,
    pub address: Addr,
    pub kind: SymbolKind,
    /// Set during the second pass when a `.entry` names this symbol.
    /// Never set on an External symbol.
    pub entry: bool,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum DefineError {
    Reserved,
    Duplicate,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum MarkEntryError {
    Undefined,
    External,
}

/// Mapping from label name to symbol, append-only during the first pass.
///
/// The one legal "re-insertion" is the entry upgrade applied by the second
/// pass through [`mark_entry`](Self::mark_entry). Iteration follows
/// definition order so artifact output is deterministic.
#[derive(Debug, Default)]
pub struct SymbolTable {
    indices: HashMap<String, usize>,
    symbols: Vec<Symbol>,
    relocated: bool,
}

impl SymbolTable {
    pub fn new() -> Self {
        Default::default()
    }

    /// Insert a new symbol. Rejects reserved words and names already
    /// defined as Code, Data or External.
    pub fn define(&mut self, name: &str, address: Addr, kind: SymbolKind) -> Result<(), DefineError> {
        if isa::is_reserved_word(name) {
            return Err(DefineError::Reserved);
        }
        if self.indices.contains_key(name) {
            return Err(DefineError::Duplicate);
        }
        self.indices.insert(name.to_string(), self.symbols.len());
        self.symbols.push(Symbol {
            name: name.to_string(),
            address,
            kind,
            entry: false,
        });
        Ok(())
    }

    pub fn lookup(&self, name: &str) -> Option<&Symbol> {
        self.indices.get(name).map(|&i| &self.symbols[i])
    }

    /// Set the entry flag on an existing symbol. Idempotent; marking an
    /// External symbol is a conflict, not a merge.
    pub fn mark_entry(&mut self, name: &str) -> Result<(), MarkEntryError> {
        let i = *self.indices.get(name).ok_or(MarkEntryError::Undefined)?;
        let symbol = &mut self.symbols[i];
        if symbol.kind == SymbolKind::External {
            return Err(MarkEntryError::External);
        }
        symbol.entry = true;
        Ok(())
    }

    /// Shift every Data symbol past the code image. Must run exactly once,
    /// after the first pass has allocated all instruction words and before
    /// the second pass reads any address.
    pub fn relocate_data(&mut self, instruction_count: Addr) {
        debug_assert!(!self.relocated, "data symbols relocated twice");
        self.relocated = true;
        for symbol in self.symbols.iter_mut() {
            if symbol.kind == SymbolKind::Data {
                symbol.address += instruction_count;
            }
        }
    }

    /// Symbols in definition order.
    pub fn iter(&self) -> impl Iterator<Item = &Symbol> {
        self.symbols.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn define_rejects_reserved_and_duplicate_names() {
        let mut table = SymbolTable::new();
        assert_eq!(Err(DefineError::Reserved), table.define("mov", 0, SymbolKind::Code));
        assert_eq!(Ok(()), table.define("LOOP", 3, SymbolKind::Code));
        assert_eq!(
            Err(DefineError::Duplicate),
            table.define("LOOP", 7, SymbolKind::Data)
        );
    }

    #[test]
    fn relocate_data_moves_only_data_symbols() {
        let mut table = SymbolTable::new();
        table.define("MAIN", 0, SymbolKind::Code).unwrap();
        table.define("LIST", 0, SymbolKind::Data).unwrap();
        table.define("W", 2, SymbolKind::Data).unwrap();
        table.define("EXT", 0, SymbolKind::External).unwrap();
        table.relocate_data(10);
        assert_eq!(0, table.lookup("MAIN").unwrap().address);
        assert_eq!(10, table.lookup("LIST").unwrap().address);
        assert_eq!(12, table.lookup("W").unwrap().address);
        assert_eq!(0, table.lookup("EXT").unwrap().address);
    }

    #[test]
    fn entry_upgrade_is_idempotent_but_conflicts_with_external() {
        let mut table = SymbolTable::new();
        table.define("MAIN", 0, SymbolKind::Code).unwrap();
        table.define("EXT", 0, SymbolKind::External).unwrap();
        assert_eq!(Ok(()), table.mark_entry("MAIN"));
        assert_eq!(Ok(()), table.mark_entry("MAIN"));
        assert!(table.lookup("MAIN").unwrap().entry);
        assert_eq!(Err(MarkEntryError::External), table.mark_entry("EXT"));
        assert_eq!(Err(MarkEntryError::Undefined), table.mark_entry("NOPE"));
    }
}

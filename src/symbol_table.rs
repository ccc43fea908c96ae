//! Scoped variable bindings: a name maps to a declared type, a kind, and a
//! per-kind index dense within this table.

use std::collections::HashMap;

use crate::error::CompileError;
use crate::vm_writer::Segment;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SymbolKind {
    Static,
    Field,
    Argument,
    Local,
}

impl SymbolKind {
    /// The fixed mapping from a variable's kind to the VM segment it lives in.
    pub fn segment(self) -> Segment {
        match self {
            SymbolKind::Static => Segment::Static,
            SymbolKind::Field => Segment::This,
            SymbolKind::Argument => Segment::Argument,
            SymbolKind::Local => Segment::Local,
        }
    }
}

#[derive(Debug, Clone)]
struct SymbolRecord {
    r#type: String,
    kind: SymbolKind,
    index: u16,
}

/// Ordered insertion of records keyed by name, with an independent running
/// counter per [`SymbolKind`].
#[derive(Debug, Default)]
pub struct SymbolTable {
    records: HashMap<String, SymbolRecord>,
    counts: HashMap<SymbolKind, u16>,
}

impl SymbolTable {
    pub fn new() -> Self {
        SymbolTable::default()
    }

    /// Empties the table and resets all per-kind counters to zero.
    pub fn reset(&mut self) {
        self.records.clear();
        self.counts.clear();
    }

    /// Allocates the next index for `kind` and inserts the record.
    pub fn define(
        &mut self,
        name: &str,
        r#type: &str,
        kind: SymbolKind,
    ) -> Result<(), CompileError> {
        if self.records.contains_key(name) {
            return Err(CompileError::DuplicateSymbol {
                name: name.to_string(),
            });
        }
        let index = self.counts.get(&kind).copied().unwrap_or(0);
        self.records.insert(
            name.to_string(),
            SymbolRecord {
                r#type: r#type.to_string(),
                kind,
                index,
            },
        );
        self.counts.insert(kind, index + 1);
        Ok(())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.records.contains_key(name)
    }

    pub fn kind_of(&self, name: &str) -> Option<SymbolKind> {
        self.records.get(name).map(|r| r.kind)
    }

    pub fn type_of(&self, name: &str) -> Option<&str> {
        self.records.get(name).map(|r| r.r#type.as_str())
    }

    pub fn index_of(&self, name: &str) -> Option<u16> {
        self.records.get(name).map(|r| r.index)
    }

    pub fn var_count(&self, kind: SymbolKind) -> u16 {
        self.counts.get(&kind).copied().unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn per_kind_indexing_is_independent() {
        let mut t = SymbolTable::new();
        t.define("x", "int", SymbolKind::Field).unwrap();
        t.define("y", "int", SymbolKind::Field).unwrap();
        t.define("count", "int", SymbolKind::Static).unwrap();

        assert_eq!(t.index_of("x"), Some(0));
        assert_eq!(t.index_of("y"), Some(1));
        assert_eq!(t.index_of("count"), Some(0));
        assert_eq!(t.var_count(SymbolKind::Field), 2);
        assert_eq!(t.var_count(SymbolKind::Static), 1);
    }

    #[test]
    fn duplicate_define_fails() {
        let mut t = SymbolTable::new();
        t.define("x", "int", SymbolKind::Local).unwrap();
        let err = t.define("x", "int", SymbolKind::Local).unwrap_err();
        assert_eq!(
            err,
            CompileError::DuplicateSymbol {
                name: "x".to_string()
            }
        );
    }

    #[test]
    fn reset_clears_bindings_and_counters() {
        let mut t = SymbolTable::new();
        t.define("x", "int", SymbolKind::Local).unwrap();
        t.reset();
        assert!(!t.contains("x"));
        assert_eq!(t.var_count(SymbolKind::Local), 0);
        // and the slate really is clean: re-defining starts back at index 0
        t.define("y", "int", SymbolKind::Local).unwrap();
        assert_eq!(t.index_of("y"), Some(0));
    }

    #[test]
    fn lookup_of_undefined_name_is_total() {
        let t = SymbolTable::new();
        assert_eq!(t.index_of("missing"), None);
        assert_eq!(t.kind_of("missing"), None);
        assert_eq!(t.type_of("missing"), None);
    }
}

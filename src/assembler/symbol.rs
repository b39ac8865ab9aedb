//! The symbol table: constants and labels, kept in two disjoint maps
//! per the name-resolution order in [`super::resolver`].

use std::collections::HashMap;

use crate::assembler::Error;

/// The byte address of a label, or the synthetic pc carried through
/// pass 1 and pass 2.
pub type Address = u32;

/// Constants and labels, partitioned so the resolver can apply the
/// "constants first, then labels" lookup order and so a name defined
/// in one map can be rejected as a duplicate if it reappears in
/// either.
#[derive(Debug, Default, Clone)]
pub struct SymbolTable {
    constants: HashMap<String, i64>,
    labels: HashMap<String, Address>,
}

impl SymbolTable {
    pub fn new() -> SymbolTable {
        SymbolTable::default()
    }

    pub fn constant(&self, name: &str) -> Option<i64> {
        self.constants.get(name).copied()
    }

    pub fn label(&self, name: &str) -> Option<Address> {
        self.labels.get(name).copied()
    }

    fn is_defined(&self, name: &str) -> bool {
        self.constants.contains_key(name) || self.labels.contains_key(name)
    }

    /// Define a constant. Rejects redefinition of any name already
    /// known as either a constant or a label.
    pub fn define_constant(&mut self, name: &str, value: i64, line_number: usize) -> Result<(), Error> {
        if self.is_defined(name) {
            return Err(Error::DuplicateDefinition {
                name: name.to_string(),
                line_number,
            });
        }
        self.constants.insert(name.to_string(), value);
        Ok(())
    }

    /// Define a label at the given address. Rejects redefinition of
    /// any name already known as either a constant or a label.
    pub fn define_label(&mut self, name: &str, address: Address, line_number: usize) -> Result<(), Error> {
        if self.is_defined(name) {
            return Err(Error::DuplicateDefinition {
                name: name.to_string(),
                line_number,
            });
        }
        self.labels.insert(name.to_string(), address);
        Ok(())
    }
}

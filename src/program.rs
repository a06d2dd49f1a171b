//! Resolves function address → code unit, and function name → code
//! unit. Populated by the (excluded) assembler reader, read-only during
//! execution. See spec §4.5.

use std::collections::BTreeMap;
use std::rc::Rc;

use crate::code::CodeUnit;

/// Name/address index of code units.
///
/// Built via [`ProgramDirectoryBuilder`] and then frozen; `Rc` sharing
/// means looking a function up never clones its instruction bytes.
#[derive(Debug, Clone, Default)]
pub struct ProgramDirectory {
    by_addr: BTreeMap<i32, Rc<CodeUnit>>,
    by_name: BTreeMap<String, i32>,
}

impl ProgramDirectory {
    /// Resolve a function's entry address to its code unit.
    pub fn by_addr(&self, addr: i32) -> Option<&Rc<CodeUnit>> {
        self.by_addr.get(&addr)
    }

    /// Resolve a function name to its code unit.
    pub fn by_name(&self, name: &str) -> Option<&Rc<CodeUnit>> {
        let addr = self.by_name.get(name)?;
        self.by_addr(*addr)
    }
}

/// Builds a [`ProgramDirectory`] one function at a time, the way the
/// (excluded) assembler reader would while loading a compiled program.
#[derive(Debug, Default)]
pub struct ProgramDirectoryBuilder {
    directory: ProgramDirectory,
}

impl ProgramDirectoryBuilder {
    /// Start with an empty directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a compiled function under both its address and name.
    pub fn register(mut self, unit: CodeUnit) -> Self {
        let addr = unit.addr();
        let name = unit.name().to_owned();
        let unit = Rc::new(unit);
        self.directory.by_addr.insert(addr, unit);
        self.directory.by_name.insert(name, addr);
        self
    }

    /// Freeze the directory for execution.
    pub fn build(self) -> ProgramDirectory {
        self.directory
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_both_ways() {
        let dir = ProgramDirectoryBuilder::new()
            .register(CodeUnit::new("main", 0, 0, vec![]))
            .register(CodeUnit::new("fact", 1, 4, vec![]))
            .build();

        assert_eq!(dir.by_name("fact").unwrap().addr(), 1);
        assert_eq!(dir.by_addr(0).unwrap().name(), "main");
        assert!(dir.by_name("missing").is_none());
    }
}

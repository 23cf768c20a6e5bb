//! ELF symbol resolution (spec §4.8 step 1, §6).
//!
//! The inject pipeline needs two things out of the target's ELF image: the
//! load address and byte size of the function being replaced (to confirm
//! the uploaded patch fits in `FILL_NOP`'d space ahead of it, and to size
//! the allocation request) and, loosely, a notion of "how fresh is this
//! build" so a stale ELF against a freshly reflashed device is at least
//! flagged rather than silently mis-patched.

use std::fs;
use std::path::Path;
use std::time::SystemTime;

use object::{Object, ObjectSymbol};

use crate::error::HostError;

/// A resolved function: its load address and size in bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Symbol {
    /// Address the symbol is loaded at (already includes the Thumb bit for
    /// function symbols, if the ELF set it).
    pub addr: u32,
    /// Size in bytes, as recorded in the symbol table entry. Zero if the
    /// toolchain didn't emit one.
    pub size: u32,
}

/// A parsed ELF image's symbol table, queryable by name.
pub struct SymbolTable {
    symbols: Vec<(String, Symbol)>,
    /// Best-effort build identifier: the ELF file's own mtime. ELF carries
    /// no universal build-timestamp field, so this is a filesystem proxy,
    /// not a hash of the binary contents.
    pub build_time: Option<SystemTime>,
}

impl SymbolTable {
    /// Parses the ELF file at `path`.
    pub fn load(path: &Path) -> Result<Self, HostError> {
        let data = fs::read(path)?;
        let build_time = fs::metadata(path).and_then(|m| m.modified()).ok();
        let file = object::File::parse(&*data).map_err(|e| HostError::ElfParse(e.to_string()))?;

        let mut symbols = Vec::new();
        for sym in file.symbols() {
            if !sym.is_definition() {
                continue;
            }
            let Ok(name) = sym.name() else { continue };
            if name.is_empty() {
                continue;
            }
            symbols.push((
                name.to_string(),
                Symbol { addr: sym.address() as u32, size: sym.size() as u32 },
            ));
        }

        Ok(SymbolTable { symbols, build_time })
    }

    /// Looks up a function symbol by exact name.
    pub fn resolve(&self, name: &str) -> Option<Symbol> {
        self.symbols.iter().find(|(n, _)| n == name).map(|(_, sym)| *sym)
    }

    /// Number of definitions in the table (used by `fpb info`-style
    /// diagnostics and tests).
    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    /// True if the table has no definitions.
    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use object::write::{Object, Symbol as WriteSymbol, SymbolSection};
    use object::{Architecture, BinaryFormat, Endianness, SectionKind, SymbolFlags, SymbolKind, SymbolScope};

    // Builds a minimal relocatable ELF with one STT_FUNC symbol, to avoid
    // depending on a real cross-compiler being on PATH when these tests
    // run. `object::write`'s section-relative symbol values land at the
    // section's base address (0 for an unlinked object), so giving the
    // symbol an absolute `value` reproduces the st_value a linked image
    // would carry.
    fn write_minimal_elf(path: &Path) {
        let mut obj = Object::new(BinaryFormat::Elf, Architecture::Arm, Endianness::Little);
        let section = obj.add_section(Vec::new(), b".text".to_vec(), SectionKind::Text);
        obj.append_section_data(section, &[0u8; 64], 4);
        obj.add_symbol(WriteSymbol {
            name: b"patch_target".to_vec(),
            value: 0x0800_1000,
            size: 64,
            kind: SymbolKind::Text,
            scope: SymbolScope::Linkage,
            weak: false,
            section: SymbolSection::Section(section),
            flags: SymbolFlags::None,
        });
        fs::write(path, obj.write().unwrap()).unwrap();
    }

    #[test]
    fn resolves_known_symbol_by_name() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fw.elf");
        write_minimal_elf(&path);

        let table = SymbolTable::load(&path).unwrap();
        let sym = table.resolve("patch_target").expect("symbol present");
        assert_eq!(sym.addr, 0x0800_1000);
        assert_eq!(sym.size, 64);
    }

    #[test]
    fn missing_symbol_returns_none() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fw.elf");
        write_minimal_elf(&path);

        let table = SymbolTable::load(&path).unwrap();
        assert!(table.resolve("does_not_exist").is_none());
    }
}

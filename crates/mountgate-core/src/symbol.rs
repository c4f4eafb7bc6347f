//! Resolving non-exported kernel functions by name.
//!
//! The hook target is not part of the stable exported interface, so its
//! address comes from the full symbol table instead of a link-time import.

use std::collections::HashMap;
use std::path::Path;

use mountgate_common::error::{MountGateError, Result};
use mountgate_common::types::SymbolAddr;
use nom::{
    IResult, Parser,
    bytes::complete::take_till1,
    character::complete::{anychar, char, hex_digit1, space1},
    combinator::{map_res, opt},
    sequence::{delimited, preceded},
};

/// Looks up a function address by symbol name.
pub trait SymbolResolver {
    /// Returns the address of `name`, or `None` if it cannot be resolved.
    fn lookup_name(&self, name: &str) -> Option<SymbolAddr>;
}

/// In-memory name → address table.
#[derive(Debug, Clone, Default)]
pub struct SymbolTable {
    symbols: HashMap<String, SymbolAddr>,
}

impl SymbolTable {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `name` unless it is already present; the first definition wins.
    pub fn insert(&mut self, name: impl Into<String>, addr: SymbolAddr) {
        let _ = self.symbols.entry(name.into()).or_insert(addr);
    }

    /// Number of names in the table.
    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    /// Whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }
}

impl<S: Into<String>> FromIterator<(S, SymbolAddr)> for SymbolTable {
    fn from_iter<I: IntoIterator<Item = (S, SymbolAddr)>>(iter: I) -> Self {
        let mut table = Self::new();
        for (name, addr) in iter {
            table.insert(name, addr);
        }
        table
    }
}

impl SymbolResolver for SymbolTable {
    fn lookup_name(&self, name: &str) -> Option<SymbolAddr> {
        self.symbols
            .get(name)
            .copied()
            .filter(|addr| !addr.is_null())
    }
}

/// One parsed `kallsyms` line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KallsymsEntry<'a> {
    /// Symbol address (zero when hidden by `kptr_restrict`).
    pub addr: SymbolAddr,
    /// Single-letter symbol type as printed by `nm`.
    pub kind: char,
    /// Symbol name.
    pub name: &'a str,
    /// Owning module, for symbols outside the core image.
    pub module: Option<&'a str>,
}

impl KallsymsEntry<'_> {
    /// Whether this symbol lives in a text (code) section.
    pub const fn is_text(&self) -> bool {
        matches!(self.kind, 't' | 'T')
    }
}

fn address(input: &str) -> IResult<&str, SymbolAddr> {
    map_res(hex_digit1, |hex: &str| {
        u64::from_str_radix(hex, 16).map(SymbolAddr::new)
    })
    .parse(input)
}

/// Parses `<hex address> <type> <name>[\t[module]]`.
pub fn kallsyms_line(input: &str) -> IResult<&str, KallsymsEntry<'_>> {
    let (input, addr) = address(input)?;
    let (input, _) = space1(input)?;
    let (input, kind) = anychar(input)?;
    let (input, _) = space1(input)?;
    let (input, name) = take_till1(|c: char| c.is_whitespace())(input)?;
    let (input, module) = opt(preceded(
        space1,
        delimited(char('['), take_till1(|c: char| c == ']'), char(']')),
    ))
    .parse(input)?;
    Ok((
        input,
        KallsymsEntry {
            addr,
            kind,
            name,
            module,
        },
    ))
}

/// Resolver backed by a `kallsyms`-format symbol table.
///
/// Only text symbols from the core image are kept. Unparseable lines are
/// skipped.
#[derive(Debug, Clone, Default)]
pub struct KallsymsResolver {
    table: SymbolTable,
    hidden: bool,
}

impl KallsymsResolver {
    /// Builds a resolver from `kallsyms` text.
    pub fn parse(input: &str) -> Self {
        let mut table = SymbolTable::new();
        let mut seen = 0usize;
        let mut zeroed = 0usize;
        for line in input.lines() {
            let Ok((_, entry)) = kallsyms_line(line) else {
                continue;
            };
            if !entry.is_text() || entry.module.is_some() {
                continue;
            }
            seen += 1;
            if entry.addr.is_null() {
                zeroed += 1;
            }
            table.insert(entry.name, entry.addr);
        }
        Self {
            table,
            hidden: seen > 0 && seen == zeroed,
        }
    }

    /// Reads and parses a `kallsyms` file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|source| MountGateError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let resolver = Self::parse(&raw);
        if resolver.hidden {
            tracing::warn!(
                path = %path.display(),
                euid = nix::unistd::geteuid().as_raw(),
                "all symbol addresses are zero; kptr_restrict hides them from this reader"
            );
        }
        tracing::debug!(
            path = %path.display(),
            symbols = resolver.table.len(),
            "loaded kernel symbol table"
        );
        Ok(resolver)
    }

    /// Whether every address in the table was hidden.
    pub const fn addresses_hidden(&self) -> bool {
        self.hidden
    }
}

impl SymbolResolver for KallsymsResolver {
    fn lookup_name(&self, name: &str) -> Option<SymbolAddr> {
        self.table.lookup_name(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
ffffffc010000000 T _text
ffffffc0102a4e10 t attach_recursive_mnt
ffffffc0102a5000 T do_mount
ffffffc011000000 D some_data
ffffffc008001000 t attach_recursive_mnt\t[fake_module]
ffffffc0102a6000 t attach_recursive_mnt
garbage line
";

    #[test]
    fn parse_core_text_symbol() {
        let (_, entry) =
            kallsyms_line("ffffffc0102a4e10 t attach_recursive_mnt").expect("should parse");
        assert_eq!(entry.addr, SymbolAddr::new(0xffff_ffc0_102a_4e10));
        assert_eq!(entry.kind, 't');
        assert_eq!(entry.name, "attach_recursive_mnt");
        assert_eq!(entry.module, None);
        assert!(entry.is_text());
    }

    #[test]
    fn parse_module_symbol() {
        let (_, entry) =
            kallsyms_line("ffffffc008001000 T init_module\t[loop]").expect("should parse");
        assert_eq!(entry.module, Some("loop"));
    }

    #[test]
    fn resolver_prefers_first_core_definition() {
        let resolver = KallsymsResolver::parse(SAMPLE);
        assert_eq!(
            resolver.lookup_name("attach_recursive_mnt"),
            Some(SymbolAddr::new(0xffff_ffc0_102a_4e10))
        );
        assert!(resolver.lookup_name("do_mount").is_some());
    }

    #[test]
    fn data_symbols_not_resolved() {
        let resolver = KallsymsResolver::parse(SAMPLE);
        assert_eq!(resolver.lookup_name("some_data"), None);
        assert_eq!(resolver.lookup_name("missing"), None);
    }

    #[test]
    fn zeroed_addresses_count_as_unresolved() {
        let resolver = KallsymsResolver::parse(
            "0000000000000000 T _text\n0000000000000000 t attach_recursive_mnt\n",
        );
        assert!(resolver.addresses_hidden());
        assert_eq!(resolver.lookup_name("attach_recursive_mnt"), None);
    }

    #[test]
    fn load_from_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("kallsyms");
        std::fs::write(&path, SAMPLE).expect("write kallsyms");
        let resolver = KallsymsResolver::load(&path).expect("should load");
        assert!(!resolver.addresses_hidden());
        assert!(resolver.lookup_name("attach_recursive_mnt").is_some());
    }

    #[test]
    fn load_missing_file_is_io_error() {
        let err = KallsymsResolver::load(Path::new("/nonexistent/kallsyms")).unwrap_err();
        assert!(matches!(err, MountGateError::Io { .. }));
    }

    #[test]
    fn symbol_table_from_pairs() {
        let table: SymbolTable = [
            ("attach_recursive_mnt", SymbolAddr::new(0x1000)),
            ("null_sym", SymbolAddr::new(0)),
        ]
        .into_iter()
        .collect();
        assert_eq!(table.len(), 2);
        assert_eq!(table.lookup_name("attach_recursive_mnt"), Some(SymbolAddr::new(0x1000)));
        assert_eq!(table.lookup_name("null_sym"), None);
    }
}

//! # Names
//!
//! Interning, demangling, ordering, and matching of symbol names.
//!
//! Every linkage name the reader hands to the store is interned exactly once
//! in a [`NameTable`]; symbols refer to it through a [`NameId`]. Two symbols
//! have the same name exactly when their `NameId`s are equal, which is what
//! the symbol cache keys on.

pub(crate) mod demangle;
pub mod lookup;
pub mod ordering;

use std::collections::HashMap;
use std::fmt;

pub use lookup::{LookupName, MatchType};
pub use ordering::{compare_iw_ordered, matches_iw, matches_wild};

use crate::error::{next_id, SymdexResult};
use crate::types::{SymbolLanguage, SymbolName};

/// Handle of an interned name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NameId(u32);

impl NameId
{
    /// Raw index into the owning table
    #[must_use]
    pub const fn raw(self) -> u32
    {
        self.0
    }
}

impl fmt::Display for NameId
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        write!(f, "name#{}", self.0)
    }
}

/// Interned linkage names of one store
#[derive(Debug, Default)]
pub struct NameTable
{
    ids: HashMap<String, NameId>,
    entries: Vec<SymbolName>,
}

impl NameTable
{
    /// Create an empty table
    #[must_use]
    pub fn new() -> Self
    {
        Self::default()
    }

    /// Intern `raw`, demangling it on first sight
    ///
    /// The language only influences the first interning of a name; later
    /// calls with the same raw name return the existing id.
    ///
    /// ## Errors
    ///
    /// `CapacityExceeded` once every 32-bit id is taken.
    pub fn intern(&mut self, raw: &str, language: SymbolLanguage) -> SymdexResult<NameId>
    {
        if let Some(id) = self.ids.get(raw) {
            return Ok(*id);
        }
        let id = NameId(next_id(self.entries.len(), "names")?);
        self.entries.push(demangle::make_symbol_name(raw, language));
        self.ids.insert(raw.to_string(), id);
        Ok(id)
    }

    /// The interned name behind `id`
    #[must_use]
    pub fn get(&self, id: NameId) -> Option<&SymbolName>
    {
        self.entries.get(id.0 as usize)
    }

    /// The name used for ordering and matching, or `""` for a foreign id
    #[must_use]
    pub fn search_name(&self, id: NameId) -> &str
    {
        self.get(id).map_or("", SymbolName::search_name)
    }

    /// Number of distinct names
    #[must_use]
    pub fn len(&self) -> usize
    {
        self.entries.len()
    }

    /// Whether no name was interned yet
    #[must_use]
    pub fn is_empty(&self) -> bool
    {
        self.entries.is_empty()
    }

    /// Approximate heap bytes held by the table
    #[must_use]
    pub fn memory_used(&self) -> usize
    {
        let strings: usize = self
            .entries
            .iter()
            .map(|name| 2 * name.raw().len() + name.demangled().map_or(0, str::len))
            .sum();
        strings
            + self.entries.capacity() * std::mem::size_of::<SymbolName>()
            + self.ids.capacity() * std::mem::size_of::<(String, NameId)>()
    }
}

//! # Symbol Cache
//!
//! Content-addressed storage for partial symbol descriptors.
//!
//! Many compilation units describe the same entities: every unit that
//! includes a header re-declares its functions and types. The cache keeps
//! one canonical [`PartialSymbol`] per distinct `{address, language, domain,
//! class, name}` and hands out [`SymbolId`]s; units only ever store ids.
//!
//! The cache never evicts. Its lifetime is the lifetime of the owning store.
//!
//! ## Usage
//!
//! ```rust
//! use symdex_core::index::{PartialSymbol, SymbolCache};
//! use symdex_core::names::NameTable;
//! use symdex_core::types::{Address, AddressClass, Domain, SymbolLanguage};
//!
//! let mut names = NameTable::new();
//! let mut cache = SymbolCache::new();
//! let symbol = PartialSymbol {
//!     name: names.intern("main", SymbolLanguage::C)?,
//!     address: Address::from(0x1000),
//!     domain: Domain::Var,
//!     class: AddressClass::Block,
//!     language: SymbolLanguage::C,
//!     section: None,
//! };
//!
//! let (first, added) = cache.insert(symbol)?;
//! assert!(added);
//! let (second, added) = cache.insert(symbol)?;
//! assert!(!added);
//! assert_eq!(first, second);
//! # Ok::<(), symdex_core::error::SymdexError>(())
//! ```

use std::collections::HashMap;
use std::fmt;

use crate::error::{next_id, SymdexResult};
use crate::names::NameId;
use crate::types::{Address, AddressClass, Domain, SectionIndex, SymbolLanguage};

/// Handle of a canonical symbol in a [`SymbolCache`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SymbolId(u32);

impl SymbolId
{
    /// Get the raw numeric representation (useful for logging / errors).
    #[must_use]
    pub const fn raw(self) -> u32
    {
        self.0
    }
}

impl fmt::Display for SymbolId
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        write!(f, "symbol#{}", self.0)
    }
}

/// Lightweight description of one symbol of a unit
///
/// The address is unrelocated. The section is informational and does not take
/// part in deduplication: the first descriptor interned for a key keeps its
/// section.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartialSymbol
{
    /// Interned linkage name
    pub name: NameId,
    /// Unrelocated address (meaningful for static, block, and label classes)
    pub address: Address,
    /// Namespace the name lives in
    pub domain: Domain,
    /// What kind of entity this is
    pub class: AddressClass,
    /// Source language, which decides how the name compares
    pub language: SymbolLanguage,
    /// Object-file section, when known
    pub section: Option<SectionIndex>,
}

impl PartialSymbol
{
    fn key(&self) -> SymbolKey
    {
        SymbolKey {
            address: self.address,
            language: self.language,
            domain: self.domain,
            class: self.class,
            name: self.name,
        }
    }
}

/// The identity of a descriptor; hashing and equality both come from here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct SymbolKey
{
    address: Address,
    language: SymbolLanguage,
    domain: Domain,
    class: AddressClass,
    name: NameId,
}

/// Counters reported by [`SymbolCache::statistics`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStatistics
{
    /// Calls to `insert`
    pub inserts: u64,
    /// Inserts answered by an existing descriptor
    pub hits: u64,
    /// Distinct descriptors held
    pub unique: usize,
    /// Approximate bytes held
    pub memory_used: usize,
}

/// Deduplicating store of partial symbols
#[derive(Debug, Default)]
pub struct SymbolCache
{
    symbols: Vec<PartialSymbol>,
    index: HashMap<SymbolKey, SymbolId>,
    inserts: u64,
    hits: u64,
}

impl SymbolCache
{
    /// Create an empty cache
    #[must_use]
    pub fn new() -> Self
    {
        Self::default()
    }

    /// Intern `symbol`, returning its canonical id and whether it was new
    ///
    /// ## Errors
    ///
    /// `CapacityExceeded` once every 32-bit id is taken.
    pub fn insert(&mut self, symbol: PartialSymbol) -> SymdexResult<(SymbolId, bool)>
    {
        self.inserts += 1;
        let key = symbol.key();
        if let Some(id) = self.index.get(&key) {
            self.hits += 1;
            return Ok((*id, false));
        }

        let id = SymbolId(next_id(self.symbols.len(), "symbols")?);
        self.symbols.push(symbol);
        self.index.insert(key, id);
        Ok((id, true))
    }

    /// The canonical descriptor behind `id`
    #[must_use]
    pub fn get(&self, id: SymbolId) -> Option<&PartialSymbol>
    {
        self.symbols.get(id.0 as usize)
    }

    /// Number of distinct descriptors
    #[must_use]
    pub fn len(&self) -> usize
    {
        self.symbols.len()
    }

    /// Whether the cache holds nothing
    #[must_use]
    pub fn is_empty(&self) -> bool
    {
        self.symbols.is_empty()
    }

    /// Bytes held by the descriptors plus the key index
    #[must_use]
    pub fn memory_used(&self) -> usize
    {
        self.symbols.capacity() * std::mem::size_of::<PartialSymbol>()
            + self.index.capacity() * (std::mem::size_of::<SymbolKey>() + std::mem::size_of::<SymbolId>())
    }

    /// Insert and hit counters
    #[must_use]
    pub fn statistics(&self) -> CacheStatistics
    {
        CacheStatistics {
            inserts: self.inserts,
            hits: self.hits,
            unique: self.symbols.len(),
            memory_used: self.memory_used(),
        }
    }
}

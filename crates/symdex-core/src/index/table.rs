//! Full (expanded) symbol tables.
//!
//! The index does not interpret a full table beyond what its own queries and
//! consistency checks need: two blocks with a range and a symbol list each.

use std::fmt;

use super::unit::UnitId;
use crate::error::{next_id, SymdexResult};
use crate::types::{Address, AddressClass, Domain, SymbolLanguage};

/// Handle of an expanded table in a [`TableArena`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TableId(u32);

impl TableId
{
    /// Get the raw numeric representation (useful for logging / errors).
    #[must_use]
    pub const fn raw(self) -> u32
    {
        self.0
    }
}

impl fmt::Display for TableId
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        write!(f, "table#{}", self.0)
    }
}

/// A fully described symbol
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FullSymbol
{
    /// Search name (demangled when the reader knows how)
    pub name: String,
    /// Namespace the name lives in
    pub domain: Domain,
    /// What kind of entity this is
    pub class: AddressClass,
    /// Unrelocated address
    pub address: Address,
    /// Source language
    pub language: SymbolLanguage,
}

/// One scope level of a full table
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Block
{
    /// Unrelocated start of the block's code
    pub start: Address,
    /// Unrelocated end (exclusive)
    pub end: Address,
    /// Symbols defined at this level
    pub symbols: Vec<FullSymbol>,
}

impl Block
{
    /// Find a symbol by exact name whose domain satisfies `domain`
    #[must_use]
    pub fn lookup(&self, name: &str, domain: Domain) -> Option<&FullSymbol>
    {
        self.symbols
            .iter()
            .find(|symbol| symbol.name == name && symbol.domain.matches(symbol.language, domain))
    }

    /// Whether `address` lies in `[start, end)`
    #[must_use]
    pub fn contains(&self, address: Address) -> bool
    {
        self.start <= address && address < self.end
    }
}

/// Full symbol table of one compilation unit, as built by the reader
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompunitSymtab
{
    producer: Option<UnitId>,
    /// Primary source file
    pub filename: String,
    /// Externally visible symbols
    pub global_block: Block,
    /// File-local symbols
    pub static_block: Block,
}

impl CompunitSymtab
{
    /// Create an empty table for `filename`
    pub fn new(filename: impl Into<String>) -> Self
    {
        Self {
            producer: None,
            filename: filename.into(),
            global_block: Block::default(),
            static_block: Block::default(),
        }
    }

    /// The unit whose expansion produced this table
    #[must_use]
    pub fn producer(&self) -> Option<UnitId>
    {
        self.producer
    }

    pub(crate) fn set_producer(&mut self, unit: UnitId)
    {
        self.producer = Some(unit);
    }

    /// Look `name` up in the global block, then the static block
    #[must_use]
    pub fn lookup(&self, name: &str, domain: Domain) -> Option<&FullSymbol>
    {
        self.global_block
            .lookup(name, domain)
            .or_else(|| self.static_block.lookup(name, domain))
    }
}

/// Owner of every expanded table of an index
#[derive(Debug, Default)]
pub struct TableArena
{
    tables: Vec<CompunitSymtab>,
}

impl TableArena
{
    /// Create an empty arena
    #[must_use]
    pub fn new() -> Self
    {
        Self::default()
    }

    /// Take ownership of `table`
    ///
    /// ## Errors
    ///
    /// `CapacityExceeded` once every 32-bit id is taken.
    pub fn push(&mut self, table: CompunitSymtab) -> SymdexResult<TableId>
    {
        let id = TableId(next_id(self.tables.len(), "tables")?);
        self.tables.push(table);
        Ok(id)
    }

    /// The table behind `id`
    #[must_use]
    pub fn get(&self, id: TableId) -> Option<&CompunitSymtab>
    {
        self.tables.get(id.0 as usize)
    }

    /// Number of tables
    #[must_use]
    pub fn len(&self) -> usize
    {
        self.tables.len()
    }

    /// Whether nothing was expanded yet
    #[must_use]
    pub fn is_empty(&self) -> bool
    {
        self.tables.is_empty()
    }

    /// Every table with its id
    pub fn iter(&self) -> impl Iterator<Item = (TableId, &CompunitSymtab)>
    {
        (0..).map(TableId).zip(self.tables.iter())
    }
}

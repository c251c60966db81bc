//! Per-compilation-unit partial index entry.

use std::cmp::Ordering;
use std::fmt;
use std::path::{Path, PathBuf};

use once_cell::unsync::OnceCell;
use smallvec::SmallVec;

use super::cache::{PartialSymbol, SymbolCache, SymbolId};
use super::table::TableId;
use crate::error::SymdexResult;
use crate::names::{compare_iw_ordered, NameTable};
use crate::types::{Address, AddressClass, Placement};

/// Unique identifier for a unit installed in a store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UnitId(u32);

impl UnitId
{
    /// Create a new identifier from a raw value.
    #[must_use]
    pub const fn from_raw(value: u32) -> Self
    {
        Self(value)
    }

    /// Get the raw numeric representation (useful for logging / errors).
    #[must_use]
    pub const fn raw(self) -> u32
    {
        self.0
    }
}

impl fmt::Display for UnitId
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        write!(f, "unit#{}", self.0)
    }
}

/// Lifecycle of a unit's full table
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ExpansionState
{
    /// Only the partial index exists.
    #[default]
    Pending,
    /// The reader is building the full table right now.
    InProgress,
    /// The full table lives in the arena under this id.
    Expanded(TableId),
    /// The reader failed; the reason is kept and the reader is not asked again.
    Failed(String),
}

impl ExpansionState
{
    /// Whether expansion has run to completion, successfully or not
    #[must_use]
    pub const fn is_read_in(&self) -> bool
    {
        matches!(self, Self::Expanded(_) | Self::Failed(_))
    }

    /// The full table, when expansion succeeded
    #[must_use]
    pub const fn table(&self) -> Option<TableId>
    {
        match self {
            Self::Expanded(table) => Some(*table),
            _ => None,
        }
    }
}

/// Partial index entry of one compilation unit
///
/// Units are created through [`Store::create_unit`](super::Store::create_unit)
/// and filled by the reader; they hold handles into the store's symbol cache,
/// never symbols themselves.
#[derive(Debug)]
pub struct Unit
{
    id: UnitId,
    filename: String,
    dirname: Option<String>,
    anonymous: bool,
    text_low: Option<Address>,
    text_high: Option<Address>,
    derived_range: OnceCell<(Address, Address)>,
    global_symbols: Vec<SymbolId>,
    static_symbols: Vec<SymbolId>,
    dependencies: SmallVec<[UnitId; 4]>,
    user: Option<UnitId>,
    addrmap_supported: bool,
    reader_cookie: u64,
    fullname: Option<PathBuf>,
    state: ExpansionState,
    finalized: bool,
}

impl Unit
{
    pub(crate) fn new(id: UnitId, filename: String, anonymous: bool) -> Self
    {
        Self {
            id,
            filename,
            dirname: None,
            anonymous,
            text_low: None,
            text_high: None,
            derived_range: OnceCell::new(),
            global_symbols: Vec::new(),
            static_symbols: Vec::new(),
            dependencies: SmallVec::new(),
            user: None,
            addrmap_supported: false,
            reader_cookie: 0,
            fullname: None,
            state: ExpansionState::Pending,
            finalized: false,
        }
    }

    /// Handle of this unit
    #[must_use]
    pub fn id(&self) -> UnitId
    {
        self.id
    }

    /// Source file name as recorded by the compiler (or a label for anonymous units)
    #[must_use]
    pub fn filename(&self) -> &str
    {
        &self.filename
    }

    /// Compilation directory hint
    #[must_use]
    pub fn dirname(&self) -> Option<&str>
    {
        self.dirname.as_deref()
    }

    /// Whether the unit has no meaningful file name
    #[must_use]
    pub fn is_anonymous(&self) -> bool
    {
        self.anonymous
    }

    /// Globally visible symbols; sorted once the unit is finalized
    #[must_use]
    pub fn global_symbols(&self) -> &[SymbolId]
    {
        &self.global_symbols
    }

    /// File-local symbols in insertion order
    #[must_use]
    pub fn static_symbols(&self) -> &[SymbolId]
    {
        &self.static_symbols
    }

    /// Units whose contents this unit needs
    #[must_use]
    pub fn dependencies(&self) -> &[UnitId]
    {
        &self.dependencies
    }

    /// The unit this shared unit belongs to, if it is shared
    #[must_use]
    pub fn user(&self) -> Option<UnitId>
    {
        self.user
    }

    /// Whether the unit is shared (only expanded through its user)
    #[must_use]
    pub fn is_shared(&self) -> bool
    {
        self.user.is_some()
    }

    /// Whether this unit's ranges live in the store's address map
    #[must_use]
    pub fn addrmap_supported(&self) -> bool
    {
        self.addrmap_supported
    }

    /// Opaque value the reader uses to find the unit's raw data again
    #[must_use]
    pub fn reader_cookie(&self) -> u64
    {
        self.reader_cookie
    }

    /// Canonical path, once it has been resolved through the source locator
    #[must_use]
    pub fn cached_fullname(&self) -> Option<&Path>
    {
        self.fullname.as_deref()
    }

    /// Expansion state; meaningful on owners (non-shared units)
    #[must_use]
    pub fn state(&self) -> &ExpansionState
    {
        &self.state
    }

    /// Whether `finalize` has run
    #[must_use]
    pub fn is_finalized(&self) -> bool
    {
        self.finalized
    }

    /// Number of global plus static symbols
    #[must_use]
    pub fn symbol_count(&self) -> usize
    {
        self.global_symbols.len() + self.static_symbols.len()
    }

    /// Unrelocated `[low, high)` text range
    ///
    /// Bounds that were not supplied are derived from the addresses of the
    /// unit's code and data symbols on first use and cached. A unit with
    /// neither supplied bounds nor addressed symbols has the empty range at 0.
    #[must_use]
    pub fn text_range(&self, cache: &SymbolCache) -> (Address, Address)
    {
        if let (Some(low), Some(high)) = (self.text_low, self.text_high) {
            return (low, high);
        }
        let (derived_low, derived_high) = *self.derived_range.get_or_init(|| self.derive_range(cache));
        let low = self.text_low.unwrap_or(derived_low);
        let high = self.text_high.unwrap_or_else(|| derived_high.max(low));
        (low, high)
    }

    /// Whether both bounds were supplied by the reader
    #[must_use]
    pub fn has_explicit_range(&self) -> bool
    {
        self.text_low.is_some() && self.text_high.is_some()
    }

    fn derive_range(&self, cache: &SymbolCache) -> (Address, Address)
    {
        let mut addresses = self
            .global_symbols
            .iter()
            .chain(&self.static_symbols)
            .filter_map(|id| cache.get(*id))
            .filter(|symbol| has_code_address(symbol))
            .map(|symbol| symbol.address);
        let Some(first) = addresses.next() else {
            return (Address::ZERO, Address::ZERO);
        };
        let (low, high) = addresses.fold((first, first), |(low, high), address| (low.min(address), high.max(address)));
        (low, high.saturating_add(1))
    }

    pub(crate) fn set_dirname(&mut self, dirname: Option<String>)
    {
        self.dirname = dirname;
    }

    pub(crate) fn set_text_range(&mut self, low: Option<Address>, high: Option<Address>)
    {
        self.text_low = low;
        self.text_high = high;
        self.derived_range.take();
    }

    pub(crate) fn set_user(&mut self, user: Option<UnitId>)
    {
        self.user = user;
    }

    pub(crate) fn push_dependency(&mut self, dependency: UnitId)
    {
        if !self.dependencies.contains(&dependency) {
            self.dependencies.push(dependency);
        }
    }

    /// Drop every link to `unit`; returns whether one was dropped
    pub(crate) fn forget_unit(&mut self, unit: UnitId) -> bool
    {
        let before = self.dependencies.len();
        self.dependencies.retain(|dependency| *dependency != unit);
        let mut changed = self.dependencies.len() != before;
        if self.user == Some(unit) {
            self.user = None;
            changed = true;
        }
        changed
    }

    pub(crate) fn mark_addrmap_supported(&mut self)
    {
        self.addrmap_supported = true;
    }

    pub(crate) fn set_reader_cookie(&mut self, cookie: u64)
    {
        self.reader_cookie = cookie;
    }

    pub(crate) fn set_fullname(&mut self, fullname: Option<PathBuf>)
    {
        self.fullname = fullname;
    }

    pub(crate) fn set_state(&mut self, state: ExpansionState)
    {
        self.state = state;
    }

    /// Intern `symbol` and append it to the list chosen by `placement`
    ///
    /// A global symbol whose descriptor already existed in the cache is not
    /// appended again; static symbols are always appended.
    pub(crate) fn add_symbol(
        &mut self,
        cache: &mut SymbolCache,
        symbol: PartialSymbol,
        placement: Placement,
    ) -> SymdexResult<(SymbolId, bool)>
    {
        let (id, added) = cache.insert(symbol)?;
        match placement {
            Placement::Global if !added => {}
            Placement::Global => self.global_symbols.push(id),
            Placement::Static => self.static_symbols.push(id),
        }
        self.derived_range.take();
        Ok((id, added))
    }

    /// Shrink both lists and sort the global list by search name
    pub(crate) fn finalize(&mut self, cache: &SymbolCache, names: &NameTable)
    {
        self.global_symbols.shrink_to_fit();
        self.static_symbols.shrink_to_fit();
        self.global_symbols.sort_by(|a, b| match (cache.get(*a), cache.get(*b)) {
            (Some(a), Some(b)) => compare_iw_ordered(names.search_name(a.name), names.search_name(b.name)),
            _ => Ordering::Equal,
        });
        self.finalized = true;
    }
}

/// Whether a symbol's address denotes a location in the image
pub(crate) fn has_code_address(symbol: &PartialSymbol) -> bool
{
    matches!(symbol.class, AddressClass::Block | AddressClass::Static | AddressClass::Label)
}

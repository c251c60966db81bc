//! # Partial symbol store
//!
//! The [`Store`] owns every [`Unit`] of one binary image together with the
//! structures the units share: the [`SymbolCache`] that deduplicates symbol
//! descriptors, the [`NameTable`] that interns their names, and the
//! [`AddressMap`] that maps addresses to units.
//!
//! Units are addressed by [`UnitId`] handles that stay valid until the unit
//! is discarded. Iteration visits the most recently installed unit first.
//!
//! ## Usage
//!
//! ```rust
//! use symdex_core::index::{NewSymbol, Store};
//! use symdex_core::types::{Address, AddressClass, Domain, Placement, SymbolLanguage};
//!
//! let mut store = Store::new();
//! let unit = store.create_unit("main.c", Some(Address::new(0x1000)));
//! store.set_text_range(unit, Address::new(0x1000), Address::new(0x1400))?;
//! store.add_symbol(
//!     unit,
//!     NewSymbol::new("main", Domain::Var, AddressClass::Block)
//!         .at(Address::new(0x1010))
//!         .language(SymbolLanguage::C)
//!         .placement(Placement::Global),
//! )?;
//! store.finalize(unit)?;
//!
//! assert_eq!(store.stats().symbols, 1);
//! # Ok::<(), symdex_core::error::SymdexError>(())
//! ```

pub mod addrmap;
pub mod cache;
pub mod table;
pub mod unit;

use std::collections::{HashMap, HashSet, VecDeque};

use once_cell::unsync::OnceCell;
use tracing::{debug, warn};

pub use addrmap::AddressMap;
pub use cache::{CacheStatistics, PartialSymbol, SymbolCache, SymbolId};
pub use table::{Block, CompunitSymtab, FullSymbol, TableArena, TableId};
pub use unit::{ExpansionState, Unit, UnitId};

use crate::error::{SymdexError, SymdexResult};
use crate::names::NameTable;
use crate::types::{Address, AddressClass, Domain, Placement, SectionIndex, SymbolLanguage};

/// Description of a symbol the reader wants to add to a unit
///
/// Built with a small builder, following the defaults a reader most often
/// wants: global placement, address zero, unknown language, no section.
#[derive(Debug, Clone, Copy)]
pub struct NewSymbol<'a>
{
    name: &'a str,
    domain: Domain,
    class: AddressClass,
    address: Address,
    language: SymbolLanguage,
    section: Option<SectionIndex>,
    placement: Placement,
}

impl<'a> NewSymbol<'a>
{
    /// Start describing a symbol called `name`
    #[must_use]
    pub fn new(name: &'a str, domain: Domain, class: AddressClass) -> Self
    {
        Self {
            name,
            domain,
            class,
            address: Address::ZERO,
            language: SymbolLanguage::Unknown,
            section: None,
            placement: Placement::Global,
        }
    }

    /// A function entry point
    #[must_use]
    pub fn function(name: &'a str, address: Address) -> Self
    {
        Self::new(name, Domain::Var, AddressClass::Block).at(address)
    }

    /// A variable with static storage
    #[must_use]
    pub fn variable(name: &'a str, address: Address) -> Self
    {
        Self::new(name, Domain::Var, AddressClass::Static).at(address)
    }

    /// Set the unrelocated address
    #[must_use]
    pub fn at(mut self, address: Address) -> Self
    {
        self.address = address;
        self
    }

    /// Set the source language
    #[must_use]
    pub fn language(mut self, language: SymbolLanguage) -> Self
    {
        self.language = language;
        self
    }

    /// Set the object-file section
    #[must_use]
    pub fn section(mut self, section: SectionIndex) -> Self
    {
        self.section = Some(section);
        self
    }

    /// Choose the global or static list
    #[must_use]
    pub fn placement(mut self, placement: Placement) -> Self
    {
        self.placement = placement;
        self
    }
}

/// Snapshot of store-wide counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreStats
{
    /// Installed units
    pub units: usize,
    /// Global plus static list entries over all units
    pub symbols: usize,
    /// Owners whose full table was not built yet
    pub unexpanded: usize,
    /// Distinct names interned
    pub names: usize,
    /// Bytes held by the symbol cache
    pub cache_memory: usize,
    /// Bytes held by the name table
    pub name_memory: usize,
    /// Cache inserts answered by an existing descriptor
    pub cache_hits: u64,
    /// Cache inserts that added a descriptor
    pub cache_misses: u64,
    /// Breakpoints in the address map
    pub address_map_entries: usize,
}

/// Owner of all units of one binary image
#[derive(Debug, Default)]
pub struct Store
{
    next_id: u32,
    units: HashMap<UnitId, Unit>,
    order: VecDeque<UnitId>,
    cache: SymbolCache,
    names: NameTable,
    address_map: AddressMap,
    static_addresses: OnceCell<Vec<(Address, UnitId)>>,
}

impl Store
{
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self
    {
        Self::default()
    }

    /// Create a unit for `filename` and install it in front of the iteration order
    ///
    /// `text_low` is an optional unrelocated lower bound; the upper bound is
    /// supplied later through [`Store::set_text_range`] or derived from the
    /// unit's symbols.
    pub fn create_unit(&mut self, filename: impl Into<String>, text_low: Option<Address>) -> UnitId
    {
        let mut unit = Unit::new(self.allocate_id(), filename.into(), false);
        unit.set_text_range(text_low, None);
        self.install(unit)
    }

    /// Create a unit that has no file name of its own
    ///
    /// `label` is only used in diagnostics. Anonymous units are skipped by
    /// file-name searches.
    pub fn create_anonymous_unit(&mut self, label: impl Into<String>) -> UnitId
    {
        let unit = Unit::new(self.allocate_id(), label.into(), true);
        self.install(unit)
    }

    fn allocate_id(&mut self) -> UnitId
    {
        let id = UnitId::from_raw(self.next_id);
        self.next_id = self.next_id.saturating_add(1);
        id
    }

    fn install(&mut self, unit: Unit) -> UnitId
    {
        let id = unit.id();
        debug!(unit = %id, filename = unit.filename(), "installing unit");
        self.units.insert(id, unit);
        self.order.push_front(id);
        self.static_addresses.take();
        id
    }

    /// Remove `unit` from the store and hand it back
    ///
    /// Dependency and user links of the remaining units that point at it are
    /// dropped; a shared unit whose user is discarded becomes its own owner.
    ///
    /// ## Errors
    ///
    /// `UnitNotFound` if the unit is not currently installed.
    pub fn discard(&mut self, unit: UnitId) -> SymdexResult<Unit>
    {
        let removed = self.units.remove(&unit).ok_or(SymdexError::UnitNotFound(unit))?;
        self.order.retain(|id| *id != unit);
        self.address_map.remove_unit(unit);
        self.static_addresses.take();
        for other in self.units.values_mut() {
            if other.forget_unit(unit) {
                debug!(unit = %other.id(), discarded = %unit, "dropped link to discarded unit");
            }
        }
        debug!(unit = %unit, filename = removed.filename(), "discarded unit");
        Ok(removed)
    }

    /// The unit behind `id`, if installed
    #[must_use]
    pub fn unit(&self, id: UnitId) -> Option<&Unit>
    {
        self.units.get(&id)
    }

    /// Like [`Store::unit`], but a missing unit is an error
    ///
    /// ## Errors
    ///
    /// `UnitNotFound` if the unit is not currently installed.
    pub fn get(&self, id: UnitId) -> SymdexResult<&Unit>
    {
        self.units.get(&id).ok_or(SymdexError::UnitNotFound(id))
    }

    pub(crate) fn get_mut(&mut self, id: UnitId) -> SymdexResult<&mut Unit>
    {
        self.units.get_mut(&id).ok_or(SymdexError::UnitNotFound(id))
    }

    /// Iterate over the installed units, most recently installed first
    #[must_use]
    pub fn range(&self) -> UnitRange<'_>
    {
        UnitRange { store: self, position: 0 }
    }

    /// Snapshot of the current iteration order
    ///
    /// Useful when the caller needs to mutate the store while walking it.
    #[must_use]
    pub fn unit_ids(&self) -> Vec<UnitId>
    {
        self.order.iter().copied().collect()
    }

    /// Number of installed units
    #[must_use]
    pub fn len(&self) -> usize
    {
        self.units.len()
    }

    /// Whether no unit is installed
    #[must_use]
    pub fn is_empty(&self) -> bool
    {
        self.units.is_empty()
    }

    /// Add a symbol to `unit`
    ///
    /// Returns the canonical id and whether the descriptor was new to the
    /// cache. Adding a global symbol whose descriptor already exists does not
    /// grow the unit's global list.
    ///
    /// ## Errors
    ///
    /// `UnitNotFound` if the unit is not currently installed, or
    /// `CapacityExceeded` once the name table or the symbol cache is full.
    pub fn add_symbol(&mut self, unit: UnitId, symbol: NewSymbol<'_>) -> SymdexResult<(SymbolId, bool)>
    {
        let name = self.names.intern(symbol.name, symbol.language)?;
        let descriptor = PartialSymbol {
            name,
            address: symbol.address,
            domain: symbol.domain,
            class: symbol.class,
            language: symbol.language,
            section: symbol.section,
        };
        let target = self.units.get_mut(&unit).ok_or(SymdexError::UnitNotFound(unit))?;
        let result = target.add_symbol(&mut self.cache, descriptor, symbol.placement)?;
        self.static_addresses.take();
        Ok(result)
    }

    /// Shrink `unit`'s lists and sort its globals for binary search
    ///
    /// ## Errors
    ///
    /// `UnitNotFound` if the unit is not currently installed.
    pub fn finalize(&mut self, unit: UnitId) -> SymdexResult<()>
    {
        let target = self.units.get_mut(&unit).ok_or(SymdexError::UnitNotFound(unit))?;
        target.finalize(&self.cache, &self.names);
        Ok(())
    }

    /// Record that `unit` needs `dependency`
    ///
    /// ## Errors
    ///
    /// `UnitNotFound` if either unit is not currently installed.
    pub fn add_dependency(&mut self, unit: UnitId, dependency: UnitId) -> SymdexResult<()>
    {
        self.get(dependency)?;
        self.get_mut(unit)?.push_dependency(dependency);
        Ok(())
    }

    /// Mark `shared` as belonging to `owner`
    ///
    /// ## Errors
    ///
    /// `UnitNotFound` if either unit is not installed, `InvalidArgument` if
    /// they are the same unit.
    pub fn set_user(&mut self, shared: UnitId, owner: UnitId) -> SymdexResult<()>
    {
        if shared == owner {
            return Err(SymdexError::InvalidArgument(format!("{shared} cannot be its own user")));
        }
        self.get(owner)?;
        self.get_mut(shared)?.set_user(Some(owner));
        Ok(())
    }

    /// Set the compilation directory of `unit`
    ///
    /// ## Errors
    ///
    /// `UnitNotFound` if the unit is not currently installed.
    pub fn set_dirname(&mut self, unit: UnitId, dirname: impl Into<String>) -> SymdexResult<()>
    {
        self.get_mut(unit)?.set_dirname(Some(dirname.into()));
        Ok(())
    }

    /// Store the value the reader uses to find `unit`'s raw data again
    ///
    /// ## Errors
    ///
    /// `UnitNotFound` if the unit is not currently installed.
    pub fn set_reader_cookie(&mut self, unit: UnitId, cookie: u64) -> SymdexResult<()>
    {
        self.get_mut(unit)?.set_reader_cookie(cookie);
        Ok(())
    }

    /// Supply both bounds of `unit`'s unrelocated text range
    ///
    /// A range whose end lies below its start is kept as given (so the
    /// consistency check can report it) but logged; range queries skip it.
    ///
    /// ## Errors
    ///
    /// `UnitNotFound` if the unit is not currently installed.
    pub fn set_text_range(&mut self, unit: UnitId, low: Address, high: Address) -> SymdexResult<()>
    {
        let target = self.get_mut(unit)?;
        if high < low {
            warn!(unit = %unit, filename = target.filename(), "text range {low}..{high} ends before it starts");
        }
        target.set_text_range(Some(low), Some(high));
        Ok(())
    }

    /// Claim the still unowned addresses of `[low, high)` for `unit` in the address map
    ///
    /// ## Errors
    ///
    /// `UnitNotFound` if the unit is not currently installed.
    pub fn record_address_range(&mut self, unit: UnitId, low: Address, high: Address) -> SymdexResult<()>
    {
        self.get_mut(unit)?.mark_addrmap_supported();
        self.address_map.set_empty(low, high, unit);
        Ok(())
    }

    /// Unrelocated `[low, high)` range of `unit`
    #[must_use]
    pub fn text_range(&self, unit: UnitId) -> Option<(Address, Address)>
    {
        self.unit(unit).map(|u| u.text_range(&self.cache))
    }

    /// Follow user links from `unit` to the unit that actually gets expanded
    ///
    /// ## Errors
    ///
    /// `UnitNotFound` for a dangling link, `UserCycle` when the links loop.
    pub fn owner_of(&self, unit: UnitId) -> SymdexResult<UnitId>
    {
        let mut seen = HashSet::new();
        let mut current = unit;
        while let Some(user) = self.get(current)?.user() {
            if !seen.insert(current) {
                return Err(SymdexError::UserCycle(unit));
            }
            current = user;
        }
        Ok(current)
    }

    /// Whether the owner of `unit` has been read in (successfully or not)
    #[must_use]
    pub fn is_read_in(&self, unit: UnitId) -> bool
    {
        self.owner_of(unit)
            .ok()
            .and_then(|owner| self.unit(owner))
            .is_some_and(|owner| owner.state().is_read_in())
    }

    /// The canonical descriptor behind `id`
    #[must_use]
    pub fn symbol(&self, id: SymbolId) -> Option<&PartialSymbol>
    {
        self.cache.get(id)
    }

    /// Search name of a symbol, or `""` for a foreign id
    #[must_use]
    pub fn symbol_name(&self, id: SymbolId) -> &str
    {
        self.cache.get(id).map_or("", |symbol| self.names.search_name(symbol.name))
    }

    /// The interned names
    #[must_use]
    pub fn names(&self) -> &NameTable
    {
        &self.names
    }

    /// The symbol cache
    #[must_use]
    pub fn cache(&self) -> &SymbolCache
    {
        &self.cache
    }

    /// The address map
    #[must_use]
    pub fn address_map(&self) -> &AddressMap
    {
        &self.address_map
    }

    /// Find the unit that first listed a static-class symbol at exactly `address`
    ///
    /// The sorted lookup table is built on first use and dropped whenever units
    /// or symbols are added or removed.
    #[must_use]
    pub fn unit_for_static_address(&self, address: Address) -> Option<UnitId>
    {
        let table = self.static_addresses.get_or_init(|| self.build_static_addresses());
        table
            .binary_search_by_key(&address, |(at, _)| *at)
            .ok()
            .map(|index| table[index].1)
    }

    fn build_static_addresses(&self) -> Vec<(Address, UnitId)>
    {
        let mut seen = HashSet::new();
        let mut table = Vec::new();
        for unit in self.range() {
            for id in unit.global_symbols().iter().chain(unit.static_symbols()) {
                let Some(symbol) = self.cache.get(*id) else {
                    continue;
                };
                if symbol.class == AddressClass::Static && seen.insert(symbol.address) {
                    table.push((symbol.address, unit.id()));
                }
            }
        }
        table.sort_by_key(|(address, _)| *address);
        table
    }

    /// Store-wide counters; never expands or mutates anything
    #[must_use]
    pub fn stats(&self) -> StoreStats
    {
        let cache = self.cache.statistics();
        StoreStats {
            units: self.units.len(),
            symbols: self.units.values().map(Unit::symbol_count).sum(),
            unexpanded: self
                .units
                .values()
                .filter(|unit| !unit.is_shared() && !unit.state().is_read_in())
                .count(),
            names: self.names.len(),
            cache_memory: cache.memory_used,
            name_memory: self.names.memory_used(),
            cache_hits: cache.hits,
            cache_misses: cache.inserts - cache.hits,
            address_map_entries: self.address_map.len(),
        }
    }

    /// Drop every cached full path
    pub fn forget_cached_source_info(&mut self)
    {
        for unit in self.units.values_mut() {
            unit.set_fullname(None);
        }
    }
}

/// Restartable iterator over a store's units, most recently installed first
#[derive(Debug, Clone)]
pub struct UnitRange<'a>
{
    store: &'a Store,
    position: usize,
}

impl<'a> Iterator for UnitRange<'a>
{
    type Item = &'a Unit;

    fn next(&mut self) -> Option<Self::Item>
    {
        let id = self.store.order.get(self.position)?;
        self.position += 1;
        self.store.units.get(id)
    }

    fn size_hint(&self) -> (usize, Option<usize>)
    {
        let remaining = self.store.order.len().saturating_sub(self.position);
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for UnitRange<'_> {}

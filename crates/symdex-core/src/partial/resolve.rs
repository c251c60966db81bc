//! Address to unit resolution.
//!
//! The fast path asks the address map. Units whose reader did not record
//! ranges there, or an address map hit rejected by the overlay check, fall
//! back to a scan over unit ranges. When several ranges contain the address
//! (nested or overlapping compilation units), the unit with the closest
//! preceding function wins.

use tracing::{trace, warn};

use super::PartialIndex;
use crate::error::SymdexResult;
use crate::index::{Store, SymbolId, TableId, Unit, UnitId};
use crate::reader::MinimalSymbol;
use crate::types::{Address, AddressClass, Domain, SectionIndex};

impl PartialIndex
{
    /// The unit whose code covers the relocated address `pc`
    ///
    /// `section` restricts the closest-function heuristic (and, with overlay
    /// debugging, validates address map hits). `hint` is the linker symbol
    /// covering `pc`, when the caller already knows it; a unit whose best
    /// function starts exactly at the hint's address is taken immediately.
    ///
    /// ## Errors
    ///
    /// Errors of the partial scan.
    pub fn find_unit(
        &mut self,
        pc: Address,
        section: Option<SectionIndex>,
        hint: Option<&MinimalSymbol>,
    ) -> SymdexResult<Option<UnitId>>
    {
        self.require_partial_symbols()?;
        let offset = self.image.text_section_offset();

        if !self.store.address_map().is_empty() {
            if let Some(candidate) = self.store.address_map().find(pc.unrelocate(offset)) {
                if !self.rejects_overlay_hit(candidate, pc, section, hint) {
                    return Ok(Some(candidate));
                }
                trace!(unit = %candidate, "address map hit for {pc} rejected by section check");
            }
        }

        Ok(self.find_unit_by_ranges(pc, section, hint))
    }

    /// Expanded table of the unit covering `pc`
    ///
    /// ## Errors
    ///
    /// Errors of the partial scan or of the expansion.
    pub fn find_compunit_symtab(
        &mut self,
        pc: Address,
        section: Option<SectionIndex>,
        hint: Option<&MinimalSymbol>,
    ) -> SymdexResult<Option<TableId>>
    {
        let Some(unit) = self.find_unit(pc, section, hint)? else {
            return Ok(None);
        };
        if self.store.is_read_in(unit) {
            let filename = self.store.get(unit)?.filename();
            warn!("(Internal error: pc {pc} in read in unit, but not in symtab.) [{filename}]");
        }
        self.expand(unit).map(Some)
    }

    /// Expanded table of the unit that first defined a static variable at exactly `address`
    ///
    /// ## Errors
    ///
    /// Errors of the partial scan or of the expansion.
    pub fn find_compunit_symtab_by_address(&mut self, address: Address) -> SymdexResult<Option<TableId>>
    {
        self.require_partial_symbols()?;
        let offset = self.image.text_section_offset();
        match self.store.unit_for_static_address(address.unrelocate(offset)) {
            Some(unit) => self.expand(unit).map(Some),
            None => Ok(None),
        }
    }

    /// Best function of `unit` at relocated `pc`, restricted to `section` if given
    #[must_use]
    pub fn find_pc_sect_symbol(&self, unit: UnitId, pc: Address, section: Option<SectionIndex>) -> Option<SymbolId>
    {
        let target = self.store.unit(unit)?;
        closest_function(&self.store, target, pc, section, self.image.text_section_offset())
    }

    fn rejects_overlay_hit(
        &self,
        candidate: UnitId,
        pc: Address,
        section: Option<SectionIndex>,
        hint: Option<&MinimalSymbol>,
    ) -> bool
    {
        let (Some(section), Some(hint)) = (section, hint) else {
            return false;
        };
        if !self.config.overlay_debugging {
            return false;
        }
        let offset = self.image.text_section_offset();
        match self.find_pc_sect_symbol(candidate, pc, Some(section)) {
            Some(best) => self
                .store
                .symbol(best)
                .is_none_or(|symbol| symbol.address.relocate(offset) != hint.address),
            None => true,
        }
    }

    fn find_unit_by_ranges(&self, pc: Address, section: Option<SectionIndex>, hint: Option<&MinimalSymbol>)
        -> Option<UnitId>
    {
        let offset = self.image.text_section_offset();
        let scan_all = self.store.address_map().is_empty();
        let candidates: Vec<&Unit> = self
            .store
            .range()
            .filter(|unit| scan_all || !unit.addrmap_supported())
            .filter(|unit| {
                let (low, high) = unit.text_range(self.store.cache());
                if high < low {
                    trace!(unit = %unit.id(), "skipping unit with malformed range");
                    return false;
                }
                low.relocate(offset) <= pc && pc < high.relocate(offset)
            })
            .collect();

        match candidates.as_slice() {
            [] => None,
            [only] => Some(only.id()),
            [first, ..] => Some(self.closest_unit(first, &candidates, pc, section, hint)),
        }
    }

    /// Among units whose ranges all contain `pc`, pick the one whose function is nearest below it
    fn closest_unit(
        &self,
        first: &Unit,
        candidates: &[&Unit],
        pc: Address,
        section: Option<SectionIndex>,
        hint: Option<&MinimalSymbol>,
    ) -> UnitId
    {
        let offset = self.image.text_section_offset();
        let mut best_unit = first.id();
        let mut best_address = first.text_range(self.store.cache()).0.relocate(offset);

        for unit in candidates {
            let (low, _) = unit.text_range(self.store.cache());
            let mut this_address = low.relocate(offset);
            if let Some(symbol) = closest_function(&self.store, unit, pc, section, offset)
                .and_then(|id| self.store.symbol(id))
            {
                let address = symbol.address.relocate(offset);
                if hint.is_some_and(|hint| hint.address == address) {
                    return unit.id();
                }
                this_address = address;
            }
            if this_address > best_address {
                best_address = this_address;
                best_unit = unit.id();
            }
        }
        best_unit
    }
}

/// Function symbol of `unit` with the greatest address not above `pc`
///
/// The search is anchored just below the unit's start so that only functions
/// inside the unit qualify; a unit starting at zero also accepts a function
/// at address zero. Globals are searched before statics, and an equal address
/// found later does not displace the first one (except at zero).
fn closest_function(
    store: &Store,
    unit: &Unit,
    pc: Address,
    section: Option<SectionIndex>,
    offset: u64,
) -> Option<SymbolId>
{
    let low = unit.text_range(store.cache()).0.relocate(offset);
    let accept_zero = low == Address::ZERO;
    let mut best_pc = if accept_zero { Address::ZERO } else { low - 1 };
    let mut best = None;

    for id in unit.global_symbols().iter().chain(unit.static_symbols()) {
        let Some(symbol) = store.symbol(*id) else {
            continue;
        };
        if symbol.domain != Domain::Var || symbol.class != AddressClass::Block {
            continue;
        }
        let address = symbol.address.relocate(offset);
        if address > pc {
            continue;
        }
        let improves = address > best_pc || (accept_zero && best_pc == Address::ZERO && address == Address::ZERO);
        if !improves {
            continue;
        }
        if let Some(section) = section {
            if symbol.section != Some(section) {
                continue;
            }
        }
        best_pc = address;
        best = Some(*id);
    }
    best
}

//! # Index backends
//!
//! Every image gets exactly one index. Most images use the lazy
//! [`PartialIndex`]; with "read now" every unit is expanded while the image
//! is loaded and queries are answered from the full tables by
//! [`EagerIndex`]. Callers talk to either through the [`SymbolIndex`] trait,
//! usually via the [`IndexBackend`] enum.

use std::fmt::Write as _;
use std::ops::ControlFlow;

use tracing::info;

use crate::error::SymdexResult;
use crate::index::{CompunitSymtab, FullSymbol, TableId, UnitId};
use crate::partial::{MatchOutcome, MatchRequest, PartialIndex};
use crate::paths::basename;
use crate::types::{Address, Domain, SectionIndex, SymbolLanguage};

/// Queries every index backend answers
///
/// Addresses passed in are relocated.
pub trait SymbolIndex
{
    /// Whether the image has any debug information at all
    ///
    /// ## Errors
    ///
    /// Errors of the initial scan.
    fn has_symbols(&mut self) -> SymdexResult<bool>;

    /// Whether some unit still waits for expansion
    ///
    /// ## Errors
    ///
    /// Errors of the initial scan.
    fn has_unexpanded_symtabs(&mut self) -> SymdexResult<bool>;

    /// Unit whose code covers `pc`
    ///
    /// ## Errors
    ///
    /// Errors of the initial scan.
    fn find_unit_for_pc(&mut self, pc: Address, section: Option<SectionIndex>) -> SymdexResult<Option<UnitId>>;

    /// Full table of the unit whose code covers `pc`, expanding it if needed
    ///
    /// ## Errors
    ///
    /// Errors of the initial scan or of the expansion.
    fn find_compunit_symtab(&mut self, pc: Address, section: Option<SectionIndex>) -> SymdexResult<Option<TableId>>;

    /// Language of the first unit defining `name` globally
    ///
    /// ## Errors
    ///
    /// Errors of the initial scan.
    fn lookup_global_symbol_language(&mut self, name: &str, domain: Domain) -> SymdexResult<Option<SymbolLanguage>>;

    /// Expand every unit the request selects and hand its table to `on_expanded`
    ///
    /// ## Errors
    ///
    /// `Interrupted` on cancellation, or errors of the scan and expansion.
    fn expand_symtabs_matching(
        &mut self,
        request: MatchRequest<'_>,
        on_expanded: &mut dyn FnMut(TableId, &CompunitSymtab) -> ControlFlow<()>,
    ) -> SymdexResult<MatchOutcome>;

    /// Expand every unit
    ///
    /// ## Errors
    ///
    /// `Interrupted` on cancellation, or errors of the scan.
    fn expand_all(&mut self) -> SymdexResult<()>;

    /// An expanded table
    fn table(&self, id: TableId) -> Option<&CompunitSymtab>;

    /// Human-readable statistics
    ///
    /// ## Errors
    ///
    /// `Format` if rendering fails.
    fn stats(&self) -> SymdexResult<String>;

    /// Human-readable dump of the whole index
    ///
    /// ## Errors
    ///
    /// Errors of the initial scan, or `Format` if rendering fails.
    fn dump(&mut self) -> SymdexResult<String>;
}

impl SymbolIndex for PartialIndex
{
    fn has_symbols(&mut self) -> SymdexResult<bool>
    {
        PartialIndex::has_symbols(self)
    }

    fn has_unexpanded_symtabs(&mut self) -> SymdexResult<bool>
    {
        PartialIndex::has_unexpanded_symtabs(self)
    }

    fn find_unit_for_pc(&mut self, pc: Address, section: Option<SectionIndex>) -> SymdexResult<Option<UnitId>>
    {
        let hint = self.image().lookup_minimal_symbol_by_pc(pc);
        self.find_unit(pc, section, hint.as_ref())
    }

    fn find_compunit_symtab(&mut self, pc: Address, section: Option<SectionIndex>) -> SymdexResult<Option<TableId>>
    {
        let hint = self.image().lookup_minimal_symbol_by_pc(pc);
        PartialIndex::find_compunit_symtab(self, pc, section, hint.as_ref())
    }

    fn lookup_global_symbol_language(&mut self, name: &str, domain: Domain) -> SymdexResult<Option<SymbolLanguage>>
    {
        PartialIndex::lookup_global_symbol_language(self, name, domain)
    }

    fn expand_symtabs_matching(
        &mut self,
        request: MatchRequest<'_>,
        on_expanded: &mut dyn FnMut(TableId, &CompunitSymtab) -> ControlFlow<()>,
    ) -> SymdexResult<MatchOutcome>
    {
        PartialIndex::expand_symtabs_matching(self, request, on_expanded)
    }

    fn expand_all(&mut self) -> SymdexResult<()>
    {
        PartialIndex::expand_all(self)
    }

    fn table(&self, id: TableId) -> Option<&CompunitSymtab>
    {
        PartialIndex::table(self, id)
    }

    fn stats(&self) -> SymdexResult<String>
    {
        self.print_stats()
    }

    fn dump(&mut self) -> SymdexResult<String>
    {
        let units: Vec<UnitId> = self.require_partial_symbols()?.map(|unit| unit.id()).collect();
        let mut out = String::new();
        for unit in units {
            out.push_str(&self.dump_unit(unit)?);
            out.push('\n');
        }
        out.push_str(&self.dump_address_map(None)?);
        Ok(out)
    }
}

/// Index that expands every unit up front
///
/// It keeps the partial index it was built from (for the stores' bookkeeping
/// and diagnostics) but never consults the partial symbol lists for queries.
#[derive(Debug)]
pub struct EagerIndex
{
    inner: PartialIndex,
}

impl EagerIndex
{
    /// Scan the image and expand every unit
    ///
    /// Units whose reader fails are left out of the tables.
    ///
    /// ## Errors
    ///
    /// Errors of the scan, or `Interrupted`.
    pub fn new(mut inner: PartialIndex) -> SymdexResult<Self>
    {
        inner.expand_all()?;
        info!(
            image = inner.image().name(),
            tables = inner.tables().len(),
            "expanded all units at load"
        );
        Ok(Self { inner })
    }

    /// The partial index underneath
    #[must_use]
    pub fn partial(&self) -> &PartialIndex
    {
        &self.inner
    }

    /// Mutable access to the partial index underneath
    pub fn partial_mut(&mut self) -> &mut PartialIndex
    {
        &mut self.inner
    }

    /// Table whose global block covers the unrelocated `address`, preferring the narrowest one
    fn table_at(&self, address: Address) -> Option<(TableId, &CompunitSymtab)>
    {
        self.inner
            .tables()
            .iter()
            .filter(|(_, table)| table.global_block.contains(address))
            .min_by_key(|(_, table)| table.global_block.end.value().saturating_sub(table.global_block.start.value()))
    }
}

impl SymbolIndex for EagerIndex
{
    fn has_symbols(&mut self) -> SymdexResult<bool>
    {
        Ok(!self.inner.tables().is_empty() || !self.inner.store().is_empty())
    }

    fn has_unexpanded_symtabs(&mut self) -> SymdexResult<bool>
    {
        Ok(false)
    }

    fn find_unit_for_pc(&mut self, pc: Address, _section: Option<SectionIndex>) -> SymdexResult<Option<UnitId>>
    {
        let address = pc.unrelocate(self.inner.image().text_section_offset());
        Ok(self.table_at(address).and_then(|(_, table)| table.producer()))
    }

    fn find_compunit_symtab(&mut self, pc: Address, _section: Option<SectionIndex>) -> SymdexResult<Option<TableId>>
    {
        let address = pc.unrelocate(self.inner.image().text_section_offset());
        Ok(self.table_at(address).map(|(id, _)| id))
    }

    fn lookup_global_symbol_language(&mut self, name: &str, domain: Domain) -> SymdexResult<Option<SymbolLanguage>>
    {
        Ok(self
            .inner
            .tables()
            .iter()
            .find_map(|(_, table)| table.global_block.lookup(name, domain))
            .map(|symbol| symbol.language))
    }

    fn expand_symtabs_matching(
        &mut self,
        request: MatchRequest<'_>,
        on_expanded: &mut dyn FnMut(TableId, &CompunitSymtab) -> ControlFlow<()>,
    ) -> SymdexResult<MatchOutcome>
    {
        let MatchRequest {
            mut file_filter,
            lookup_name,
            mut symbol_filter,
            block_flags,
            domain,
            kind,
        } = request;
        let lookup = lookup_name.map(|name| self.inner.effective_lookup(name).ignoring_params(true));
        let searching = lookup.is_some() || symbol_filter.is_some();

        for (id, table) in self.inner.tables().iter() {
            self.inner.cancellation().check()?;
            if let Some(filter) = file_filter.as_mut() {
                if !(**filter)(&table.filename, false) && !(**filter)(basename(&table.filename), true) {
                    continue;
                }
            }

            let mut accepts = |symbol: &FullSymbol| {
                if domain != Domain::Undef && !symbol.domain.matches(symbol.language, domain) {
                    return false;
                }
                if !kind.accepts(symbol.domain, symbol.class) {
                    return false;
                }
                if lookup.as_ref().is_some_and(|lookup| !lookup.matches(&symbol.name)) {
                    return false;
                }
                symbol_filter.as_mut().is_none_or(|filter| (**filter)(&symbol.name))
            };
            let matched = !searching
                || (block_flags.global && table.global_block.symbols.iter().any(&mut accepts))
                || (block_flags.statics && table.static_block.symbols.iter().any(&mut accepts));
            if matched && on_expanded(id, table).is_break() {
                return Ok(MatchOutcome::Stopped);
            }
        }
        Ok(MatchOutcome::Completed)
    }

    fn expand_all(&mut self) -> SymdexResult<()>
    {
        Ok(())
    }

    fn table(&self, id: TableId) -> Option<&CompunitSymtab>
    {
        self.inner.table(id)
    }

    fn stats(&self) -> SymdexResult<String>
    {
        let mut out = self.inner.print_stats()?;
        writeln!(out, "  Read now: all units expanded at load")?;
        Ok(out)
    }

    fn dump(&mut self) -> SymdexResult<String>
    {
        let mut out = String::new();
        for (id, table) in self.inner.tables().iter() {
            let producer = table
                .producer()
                .map_or_else(|| "<none>".to_string(), |unit| unit.to_string());
            writeln!(out, "Symtab {id} for {} (from {producer})", table.filename)?;
            for (label, block) in [("global", &table.global_block), ("static", &table.static_block)] {
                writeln!(out, "  {label} block {} - {}", block.start, block.end)?;
                for symbol in &block.symbols {
                    writeln!(
                        out,
                        "    `{}', {}, {}, {}, {}",
                        symbol.name, symbol.language, symbol.domain, symbol.class, symbol.address
                    )?;
                }
            }
        }
        Ok(out)
    }
}

/// The index of one image, lazy or eager
#[derive(Debug)]
pub enum IndexBackend
{
    /// Units are expanded on demand.
    Partial(PartialIndex),
    /// Every unit was expanded at load.
    Eager(EagerIndex),
}

impl IndexBackend
{
    /// Wrap `partial`, expanding everything first when `readnow` is set
    ///
    /// ## Errors
    ///
    /// Errors of the eager expansion.
    pub fn select(partial: PartialIndex, readnow: bool) -> SymdexResult<Self>
    {
        if readnow {
            EagerIndex::new(partial).map(Self::Eager)
        } else {
            Ok(Self::Partial(partial))
        }
    }

    /// The partial index, whichever backend is active
    #[must_use]
    pub fn partial(&self) -> &PartialIndex
    {
        match self {
            Self::Partial(index) => index,
            Self::Eager(index) => index.partial(),
        }
    }

    /// Mutable access to the partial index, whichever backend is active
    pub fn partial_mut(&mut self) -> &mut PartialIndex
    {
        match self {
            Self::Partial(index) => index,
            Self::Eager(index) => index.partial_mut(),
        }
    }

    fn inner(&mut self) -> &mut dyn SymbolIndex
    {
        match self {
            Self::Partial(index) => index,
            Self::Eager(index) => index,
        }
    }
}

impl SymbolIndex for IndexBackend
{
    fn has_symbols(&mut self) -> SymdexResult<bool>
    {
        self.inner().has_symbols()
    }

    fn has_unexpanded_symtabs(&mut self) -> SymdexResult<bool>
    {
        self.inner().has_unexpanded_symtabs()
    }

    fn find_unit_for_pc(&mut self, pc: Address, section: Option<SectionIndex>) -> SymdexResult<Option<UnitId>>
    {
        self.inner().find_unit_for_pc(pc, section)
    }

    fn find_compunit_symtab(&mut self, pc: Address, section: Option<SectionIndex>) -> SymdexResult<Option<TableId>>
    {
        self.inner().find_compunit_symtab(pc, section)
    }

    fn lookup_global_symbol_language(&mut self, name: &str, domain: Domain) -> SymdexResult<Option<SymbolLanguage>>
    {
        self.inner().lookup_global_symbol_language(name, domain)
    }

    fn expand_symtabs_matching(
        &mut self,
        request: MatchRequest<'_>,
        on_expanded: &mut dyn FnMut(TableId, &CompunitSymtab) -> ControlFlow<()>,
    ) -> SymdexResult<MatchOutcome>
    {
        self.inner().expand_symtabs_matching(request, on_expanded)
    }

    fn expand_all(&mut self) -> SymdexResult<()>
    {
        self.inner().expand_all()
    }

    fn table(&self, id: TableId) -> Option<&CompunitSymtab>
    {
        self.partial().table(id)
    }

    fn stats(&self) -> SymdexResult<String>
    {
        match self {
            Self::Partial(index) => index.stats(),
            Self::Eager(index) => index.stats(),
        }
    }

    fn dump(&mut self) -> SymdexResult<String>
    {
        self.inner().dump()
    }
}

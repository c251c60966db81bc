//! Name, domain, and file based search.
//!
//! Two kinds of queries live here. Point lookups (`lookup_symbol`,
//! `match_symbol`) look inside a single unit and use the sorted global list
//! for a binary search when the lookup name allows it. Pass-wide searches
//! (`expand_symtabs_matching` and friends) walk every unit that is not read
//! in yet, follow shared dependencies, and expand what matches.
//!
//! A pass remembers which units it already searched in a side map that is
//! created fresh for every pass, so shared units reached from several owners
//! are scanned once and cyclic dependency graphs terminate.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::ops::ControlFlow;
use std::path::Path;

use tracing::trace;

use super::PartialIndex;
use crate::error::SymdexResult;
use crate::index::{CompunitSymtab, PartialSymbol, Store, SymbolId, TableId, UnitId};
use crate::names::{compare_iw_ordered, LookupName};
use crate::paths::basename;
use crate::types::{BlockSearchFlags, Domain, Placement, SearchKind, SymbolLanguage};

/// Caller-supplied ordering between a symbol's search name and the looked-up name
pub type OrderedCompare<'a> = &'a dyn Fn(&str, &str) -> Ordering;

/// How a search pass ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchOutcome
{
    /// Every candidate unit was visited.
    Completed,
    /// The expansion callback asked to stop.
    Stopped,
}

/// Parameters of [`PartialIndex::expand_symtabs_matching`]
///
/// Every filter is optional; an empty request expands every unit that is not
/// read in yet.
///
/// ## Example
///
/// ```rust
/// use symdex_core::names::LookupName;
/// use symdex_core::types::{Domain, SearchKind};
/// use symdex_core::MatchRequest;
///
/// let name = LookupName::new("main");
/// let mut only_c = |file: &str, _basename: bool| file.ends_with(".c");
/// let request = MatchRequest::new()
///     .file_filter(&mut only_c)
///     .lookup_name(&name)
///     .domain(Domain::Var)
///     .kind(SearchKind::Functions);
/// # drop(request);
/// ```
#[derive(Default)]
pub struct MatchRequest<'a>
{
    pub(crate) file_filter: Option<&'a mut dyn FnMut(&str, bool) -> bool>,
    pub(crate) lookup_name: Option<&'a LookupName>,
    pub(crate) symbol_filter: Option<&'a mut dyn FnMut(&str) -> bool>,
    pub(crate) block_flags: BlockSearchFlags,
    pub(crate) domain: Domain,
    pub(crate) kind: SearchKind,
}

impl<'a> MatchRequest<'a>
{
    /// A request without filters: both blocks, any domain, any kind
    #[must_use]
    pub fn new() -> Self
    {
        Self::default()
    }

    /// Only units whose file name passes `filter`
    ///
    /// The second argument tells the filter whether it is looking at a
    /// basename only; a filter that rejects a basename is not asked again
    /// with the full path.
    #[must_use]
    pub fn file_filter(mut self, filter: &'a mut dyn FnMut(&str, bool) -> bool) -> Self
    {
        self.file_filter = Some(filter);
        self
    }

    /// Only units defining a symbol matching `name`
    #[must_use]
    pub fn lookup_name(mut self, name: &'a LookupName) -> Self
    {
        self.lookup_name = Some(name);
        self
    }

    /// Only units defining a symbol whose search name passes `filter`
    #[must_use]
    pub fn symbol_filter(mut self, filter: &'a mut dyn FnMut(&str) -> bool) -> Self
    {
        self.symbol_filter = Some(filter);
        self
    }

    /// Which symbol lists are searched
    #[must_use]
    pub fn block_flags(mut self, flags: BlockSearchFlags) -> Self
    {
        self.block_flags = flags;
        self
    }

    /// Required domain; `Domain::Undef` accepts all
    #[must_use]
    pub fn domain(mut self, domain: Domain) -> Self
    {
        self.domain = domain;
        self
    }

    /// Required symbol category
    #[must_use]
    pub fn kind(mut self, kind: SearchKind) -> Self
    {
        self.kind = kind;
        self
    }
}

/// Per-pass search state of one unit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SearchStatus
{
    Unvisited,
    Found,
    NotFound,
}

/// Side map of one search pass
#[derive(Debug, Default)]
struct SearchFlags
{
    status: HashMap<UnitId, SearchStatus>,
    visiting: HashSet<UnitId>,
}

impl SearchFlags
{
    fn status(&self, unit: UnitId) -> SearchStatus
    {
        self.status.get(&unit).copied().unwrap_or(SearchStatus::Unvisited)
    }

    fn record(&mut self, unit: UnitId, found: bool) -> bool
    {
        let status = if found { SearchStatus::Found } else { SearchStatus::NotFound };
        self.status.insert(unit, status);
        self.visiting.remove(&unit);
        found
    }
}

struct SymbolQuery<'q>
{
    lookup: Option<&'q LookupName>,
    flags: BlockSearchFlags,
    domain: Domain,
    kind: SearchKind,
}

impl SymbolQuery<'_>
{
    fn accepts(&self, store: &Store, symbol: &PartialSymbol, filter: &mut Option<&mut dyn FnMut(&str) -> bool>)
        -> bool
    {
        if self.domain != Domain::Undef && !symbol.domain.matches(symbol.language, self.domain) {
            return false;
        }
        if !self.kind.accepts(symbol.domain, symbol.class) {
            return false;
        }
        let name = store.names().search_name(symbol.name);
        if self.lookup.is_some_and(|lookup| !lookup.matches(name)) {
            return false;
        }
        filter.as_mut().is_none_or(|filter| (**filter)(name))
    }
}

/// Whether `unit`, or a shared unit it depends on, has a symbol the query accepts
fn search_unit(
    store: &Store,
    query: &SymbolQuery<'_>,
    filter: &mut Option<&mut dyn FnMut(&str) -> bool>,
    flags: &mut SearchFlags,
    unit: UnitId,
) -> bool
{
    match flags.status(unit) {
        SearchStatus::Found => return true,
        SearchStatus::NotFound => return false,
        SearchStatus::Unvisited => {}
    }
    if !flags.visiting.insert(unit) {
        return false;
    }
    let Some(target) = store.unit(unit) else {
        return flags.record(unit, false);
    };

    for dependency in target.dependencies() {
        if store.unit(*dependency).is_some_and(|dep| dep.is_shared())
            && search_unit(store, query, filter, flags, *dependency)
        {
            return flags.record(unit, true);
        }
    }

    let lists = [
        (query.flags.global, target.global_symbols()),
        (query.flags.statics, target.static_symbols()),
    ];
    for (wanted, list) in lists {
        if !wanted {
            continue;
        }
        for id in list {
            if store.symbol(*id).is_some_and(|symbol| query.accepts(store, symbol, filter)) {
                trace!(unit = %unit, symbol = store.symbol_name(*id), "search matched");
                return flags.record(unit, true);
            }
        }
    }
    flags.record(unit, false)
}

impl Store
{
    /// Find a symbol of `unit` matching `lookup` in `domain`
    ///
    /// Globals are binary searched when the lookup allows it: the search lands
    /// on the first entry ordered at or after the name, backs up over earlier
    /// entries that still match, and returns the first match whose domain
    /// fits. Statics and wild lookups are scanned linearly.
    #[must_use]
    pub fn lookup_symbol(&self, unit: UnitId, lookup: &LookupName, domain: Domain, scope: Placement)
        -> Option<SymbolId>
    {
        let target = self.unit(unit)?;
        let list = match scope {
            Placement::Global => target.global_symbols(),
            Placement::Static => target.static_symbols(),
        };
        let fits = |id: SymbolId| {
            self.symbol(id)
                .is_some_and(|symbol| symbol.domain.matches(symbol.language, domain))
        };
        let matches = |id: SymbolId| lookup.matches(self.symbol_name(id));

        if scope == Placement::Global && lookup.supports_ordered_search() && target.is_finalized() {
            let first = list.partition_point(|id| compare_iw_ordered(self.symbol_name(*id), lookup.name()).is_lt());
            let mut start = first;
            while start > 0 && matches(list[start - 1]) {
                start -= 1;
            }
            return list[start..]
                .iter()
                .copied()
                .take_while(|id| matches(*id))
                .find(|id| fits(*id));
        }

        list.iter().copied().find(|id| matches(*id) && fits(*id))
    }

    /// Find a symbol of `unit` matching `lookup`, ordered by a caller-supplied comparison
    ///
    /// With `global` and an ordering, the sorted global list is binary
    /// searched with that ordering and scanned forward only. Otherwise the
    /// chosen list is scanned linearly.
    #[must_use]
    pub fn match_symbol(
        &self,
        unit: UnitId,
        global: bool,
        lookup: &LookupName,
        domain: Domain,
        ordered_compare: Option<OrderedCompare<'_>>,
    ) -> Option<SymbolId>
    {
        let target = self.unit(unit)?;
        let list = if global { target.global_symbols() } else { target.static_symbols() };
        let fits = |id: SymbolId| {
            self.symbol(id)
                .is_some_and(|symbol| symbol.domain.matches(symbol.language, domain))
        };
        let matches = |id: SymbolId| lookup.matches(self.symbol_name(id));

        match ordered_compare {
            Some(compare) if global && target.is_finalized() => {
                let first = list.partition_point(|id| compare(self.symbol_name(*id), lookup.name()).is_lt());
                list[first..]
                    .iter()
                    .copied()
                    .take_while(|id| matches(*id))
                    .find(|id| fits(*id))
            }
            _ => list.iter().copied().find(|id| matches(*id) && fits(*id)),
        }
    }
}

impl PartialIndex
{
    /// The lookup as this index's case sensitivity allows it
    pub(crate) fn effective_lookup(&self, lookup: &LookupName) -> LookupName
    {
        let case_sensitive = lookup.is_case_sensitive() && self.config.case_sensitive;
        lookup.clone().with_case_sensitivity(case_sensitive)
    }

    /// Find a symbol of `unit` by name, honoring the configured case sensitivity
    #[must_use]
    pub fn lookup_symbol(&self, unit: UnitId, lookup: &LookupName, domain: Domain, scope: Placement)
        -> Option<SymbolId>
    {
        self.store.lookup_symbol(unit, &self.effective_lookup(lookup), domain, scope)
    }

    /// Search every unit that is not read in yet and expand those that match
    ///
    /// For each candidate unit, in store order: expanded units are skipped; the
    /// file filter is tried on the recorded name, then on the basename, and
    /// only after a basename match (or with `basenames_may_differ`) on the full
    /// path from the source locator; then, if a lookup name or symbol filter
    /// was given, the unit and its shared dependencies are searched. Matching
    /// units are expanded and handed to `on_expanded`, which can stop the pass.
    /// Units whose reader fails are skipped.
    ///
    /// ## Errors
    ///
    /// `Interrupted` if cancellation is observed between units, plus errors of
    /// the partial scan and contract violations during expansion.
    pub fn expand_symtabs_matching(
        &mut self,
        request: MatchRequest<'_>,
        mut on_expanded: impl FnMut(TableId, &CompunitSymtab) -> ControlFlow<()>,
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

        let units: Vec<UnitId> = self.require_partial_symbols()?.map(|unit| unit.id()).collect();
        let lookup = lookup_name.map(|name| self.effective_lookup(name).ignoring_params(true));
        let searching = lookup.is_some() || symbol_filter.is_some();
        let query = SymbolQuery {
            lookup: lookup.as_ref(),
            flags: block_flags,
            domain,
            kind,
        };
        let mut flags = SearchFlags::default();

        for unit in units {
            self.cancel.check()?;
            if self.store.is_read_in(unit) {
                continue;
            }

            if let Some(filter) = file_filter.as_mut() {
                if !self.file_matches(unit, &mut **filter)? {
                    continue;
                }
            }

            if searching && !search_unit(&self.store, &query, &mut symbol_filter, &mut flags, unit) {
                continue;
            }

            let table = match self.expand(unit) {
                Ok(table) => table,
                Err(err) if err.is_unit_local() => continue,
                Err(err) => return Err(err),
            };
            if let Some(symtab) = self.tables.get(table) {
                if on_expanded(table, symtab).is_break() {
                    return Ok(MatchOutcome::Stopped);
                }
            }
        }
        Ok(MatchOutcome::Completed)
    }

    fn file_matches(&mut self, unit: UnitId, filter: &mut dyn FnMut(&str, bool) -> bool) -> SymdexResult<bool>
    {
        let target = self.store.get(unit)?;
        if target.is_anonymous() {
            return Ok(false);
        }
        if filter(target.filename(), false) {
            return Ok(true);
        }
        if !self.config.basenames_may_differ && !filter(basename(target.filename()), true) {
            return Ok(false);
        }
        let fullname = self.fullname(unit)?;
        Ok(filter(&fullname.to_string_lossy(), false))
    }

    /// Expand every unit that is not read in yet and has a symbol matching `lookup`
    ///
    /// ## Errors
    ///
    /// Errors of the partial scan, `Interrupted`, or contract violations.
    pub fn expand_matching_symbols(
        &mut self,
        lookup: &LookupName,
        domain: Domain,
        global: bool,
        ordered_compare: Option<OrderedCompare<'_>>,
    ) -> SymdexResult<usize>
    {
        let units: Vec<UnitId> = self.require_partial_symbols()?.map(|unit| unit.id()).collect();
        let lookup = self.effective_lookup(lookup);
        let mut expanded = 0;
        for unit in units {
            self.cancel.check()?;
            if self.store.is_read_in(unit) {
                continue;
            }
            if self.store.match_symbol(unit, global, &lookup, domain, ordered_compare).is_none() {
                continue;
            }
            match self.expand(unit) {
                Ok(_) => expanded += 1,
                Err(err) if err.is_unit_local() => {}
                Err(err) => return Err(err),
            }
        }
        Ok(expanded)
    }

    /// Language of the first unexpanded unit that defines `name` globally
    ///
    /// ## Errors
    ///
    /// Errors of the partial scan.
    pub fn lookup_global_symbol_language(&mut self, name: &str, domain: Domain) -> SymdexResult<Option<SymbolLanguage>>
    {
        let lookup = self.effective_lookup(&LookupName::new(name));
        self.require_partial_symbols()?;
        for unit in self.store.range() {
            if self.store.is_read_in(unit.id()) {
                continue;
            }
            if let Some(symbol) = self
                .store
                .lookup_symbol(unit.id(), &lookup, domain, Placement::Global)
                .and_then(|id| self.store.symbol(id))
            {
                return Ok(Some(symbol.language));
            }
        }
        Ok(None)
    }

    /// Call `visit` with the file name (and full path, if asked for) of every unexpanded unit
    ///
    /// Shared and anonymous units are skipped.
    ///
    /// ## Errors
    ///
    /// Errors of the partial scan or `Interrupted`.
    pub fn map_symbol_filenames(
        &mut self,
        mut visit: impl FnMut(&str, Option<&Path>),
        need_fullname: bool,
    ) -> SymdexResult<()>
    {
        let units: Vec<UnitId> = self
            .require_partial_symbols()?
            .filter(|unit| !unit.is_shared() && !unit.is_anonymous())
            .map(|unit| unit.id())
            .collect();
        for unit in units {
            self.cancel.check()?;
            if self.store.is_read_in(unit) {
                continue;
            }
            let fullname = if need_fullname { Some(self.fullname(unit)?) } else { None };
            visit(self.store.get(unit)?.filename(), fullname.as_deref());
        }
        Ok(())
    }

    /// Expand the unit that is the best guess for "the main source file"
    ///
    /// That is the last unit in store order (the first one the reader
    /// installed) whose file is neither a `.h` header nor the
    /// `<<C++-namespaces>>` pseudo file.
    ///
    /// ## Errors
    ///
    /// Errors of the partial scan or of the expansion.
    pub fn find_last_source_symtab(&mut self) -> SymdexResult<Option<TableId>>
    {
        let last = self
            .require_partial_symbols()?
            .filter(|unit| !is_header_or_namespace_unit(unit.filename()))
            .last()
            .map(|unit| unit.id());
        match last {
            Some(unit) => self.expand(unit).map(Some),
            None => Ok(None),
        }
    }
}

fn is_header_or_namespace_unit(filename: &str) -> bool
{
    (filename.len() > 2 && filename.ends_with(".h")) || filename == "<<C++-namespaces>>"
}

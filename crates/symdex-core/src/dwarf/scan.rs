//! Compilation unit scanning.
//!
//! One walk over a unit's DIE tree serves both passes. The partial pass keeps
//! the file-scope entities (functions, variables, types, enumerators) and
//! installs them into the store; the full pass additionally keeps
//! function-local statics and labels and builds a [`CompunitSymtab`].

use std::collections::{HashMap, HashSet};

use gimli::{constants, AttributeValue, DebugInfoOffset, DebuggingInformationEntry, DwAt, DwTag, Operation, UnitHeader};
use tracing::{debug, trace};

use super::{language_from_dwarf, map_dwarf_error, OwnedDwarf, OwnedReader};
use crate::error::{SymdexError, SymdexResult};
use crate::index::{Block, CompunitSymtab, FullSymbol, NewSymbol, Store, Unit, UnitId};
use crate::reader::{DebugInfoReader, ImageServices};
use crate::types::{Address, AddressClass, Domain, Placement, SectionIndex, SymbolLanguage};

type DwarfUnit = gimli::Unit<OwnedReader>;
type Entry<'abbrev, 'unit> = DebuggingInformationEntry<'abbrev, 'unit, OwnedReader>;

/// Label of units without a `DW_AT_name`
const UNNAMED_UNIT: &str = "<unnamed unit>";

/// [`DebugInfoReader`] over the DWARF sections of one image
///
/// Unit cookies are indexes into the list of unit headers collected by the
/// partial scan.
pub struct DwarfReader
{
    dwarf: OwnedDwarf,
    headers: Vec<UnitHeader<OwnedReader>>,
    text_section: Option<SectionIndex>,
    /// Imported partial units, keyed by the unit that owns them
    adopted: HashMap<UnitId, Vec<UnitId>>,
}

impl std::fmt::Debug for DwarfReader
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result
    {
        f.debug_struct("DwarfReader")
            .field("units", &self.headers.len())
            .field("text_section", &self.text_section)
            .finish_non_exhaustive()
    }
}

struct ScannedSymbol
{
    name: String,
    domain: Domain,
    class: AddressClass,
    address: u64,
    placement: Placement,
    section: Option<SectionIndex>,
}

struct ScannedUnit
{
    /// Root is a `DW_TAG_partial_unit`
    partial: bool,
    name: Option<String>,
    comp_dir: Option<String>,
    language: SymbolLanguage,
    ranges: Vec<(u64, u64)>,
    symbols: Vec<ScannedSymbol>,
    imports: Vec<DebugInfoOffset>,
    includes: Vec<(String, Option<String>)>,
}

/// Ancestor of the entry being visited
struct Scope
{
    tag: DwTag,
    /// Name this scope adds in front of qualified names
    qualifier: Option<String>,
    /// Inside a function body
    code: bool,
}

impl DwarfReader
{
    pub(crate) fn new(dwarf: OwnedDwarf, text_section: Option<SectionIndex>) -> Self
    {
        Self {
            dwarf,
            headers: Vec::new(),
            text_section,
            adopted: HashMap::new(),
        }
    }

    /// Walk one unit. `None` for type units and anything that is not a (partial) compilation unit.
    fn scan_unit(&self, unit: &DwarfUnit, full: bool) -> SymdexResult<Option<ScannedUnit>>
    {
        let mut cursor = unit.entries();
        let Some((_, root)) = cursor
            .next_dfs()
            .map_err(|err| map_dwarf_error("reading unit root", err))?
        else {
            return Ok(None);
        };
        if !matches!(root.tag(), constants::DW_TAG_compile_unit | constants::DW_TAG_partial_unit) {
            return Ok(None);
        }

        let language = match attr_value(root, constants::DW_AT_language)? {
            Some(AttributeValue::Language(language)) => language_from_dwarf(language),
            _ => SymbolLanguage::Unknown,
        };
        let mut scanned = ScannedUnit {
            partial: root.tag() == constants::DW_TAG_partial_unit,
            name: unit.name.as_ref().map(reader_to_string).transpose()?,
            comp_dir: unit.comp_dir.as_ref().map(reader_to_string).transpose()?,
            language,
            ranges: self.unit_ranges(unit)?,
            symbols: Vec::new(),
            imports: Vec::new(),
            includes: if full { Vec::new() } else { self.include_files(unit)? },
        };

        let mut depth: isize = 0;
        let mut scopes: Vec<Scope> = Vec::new();
        while let Some((delta, entry)) = cursor
            .next_dfs()
            .map_err(|err| map_dwarf_error("traversing DIE tree", err))?
        {
            depth += delta;
            let level = usize::try_from(depth).unwrap_or(0);
            scopes.truncate(level.saturating_sub(1));
            let scope = self.visit(unit, entry, &scopes, full, &mut scanned)?;
            scopes.push(scope);
        }
        Ok(Some(scanned))
    }

    fn visit(
        &self,
        unit: &DwarfUnit,
        entry: &Entry<'_, '_>,
        scopes: &[Scope],
        full: bool,
        scanned: &mut ScannedUnit,
    ) -> SymdexResult<Scope>
    {
        let tag = entry.tag();
        let in_code = scopes.iter().any(|scope| scope.code);
        let qualified_language = scanned.language.qualifies_names();
        let mut scope = Scope {
            tag,
            qualifier: None,
            code: in_code
                || matches!(
                    tag,
                    constants::DW_TAG_subprogram | constants::DW_TAG_lexical_block | constants::DW_TAG_inlined_subroutine
                ),
        };

        if tag == constants::DW_TAG_imported_unit {
            if let Some(target) = import_target(unit, entry)? {
                scanned.imports.push(target);
            }
            return Ok(scope);
        }

        let name = self.entry_name(unit, entry, constants::DW_AT_name)?;
        if qualified_language {
            scope.qualifier = match tag {
                constants::DW_TAG_namespace => {
                    Some(name.clone().unwrap_or_else(|| "(anonymous namespace)".to_string()))
                }
                constants::DW_TAG_structure_type
                | constants::DW_TAG_class_type
                | constants::DW_TAG_union_type
                | constants::DW_TAG_module => name.clone(),
                constants::DW_TAG_enumeration_type if flag(entry, constants::DW_AT_enum_class)? => name.clone(),
                _ => None,
            };
        }
        if flag(entry, constants::DW_AT_declaration)? {
            return Ok(scope);
        }
        if in_code && !full {
            return Ok(scope);
        }

        let type_placement = if qualified_language { Placement::Global } else { Placement::Static };
        let symbol = match tag {
            constants::DW_TAG_subprogram if !in_code => {
                let Some(address) = self.low_pc(unit, entry)? else {
                    return Ok(scope);
                };
                let placement = placement(flag(entry, constants::DW_AT_external)?);
                Some((Domain::Var, AddressClass::Block, address, placement, self.text_section))
            }
            constants::DW_TAG_variable => {
                let Some(address) = self.static_location(unit, entry)?.filter(|address| *address != 0) else {
                    return Ok(scope);
                };
                let placement = if in_code {
                    Placement::Static
                } else {
                    placement(flag(entry, constants::DW_AT_external)?)
                };
                Some((Domain::Var, AddressClass::Static, address, placement, None))
            }
            constants::DW_TAG_label if in_code => self
                .low_pc(unit, entry)?
                .map(|address| (Domain::Label, AddressClass::Label, address, Placement::Static, self.text_section)),
            constants::DW_TAG_typedef | constants::DW_TAG_base_type | constants::DW_TAG_subrange_type if !in_code => {
                Some((Domain::Var, AddressClass::Typedef, 0, Placement::Static, None))
            }
            constants::DW_TAG_structure_type
            | constants::DW_TAG_class_type
            | constants::DW_TAG_union_type
            | constants::DW_TAG_enumeration_type
                if !in_code =>
            {
                Some((Domain::Struct, AddressClass::Typedef, 0, type_placement, None))
            }
            constants::DW_TAG_enumerator
                if !in_code && scopes.last().is_some_and(|parent| parent.tag == constants::DW_TAG_enumeration_type) =>
            {
                Some((Domain::Var, AddressClass::Const, 0, type_placement, None))
            }
            constants::DW_TAG_module if !in_code => {
                Some((Domain::Module, AddressClass::Typedef, 0, Placement::Global, None))
            }
            _ => None,
        };

        let Some((domain, class, address, placement, section)) = symbol else {
            return Ok(scope);
        };
        let name = match name {
            Some(name) if qualified_language => qualify(scopes, &name),
            Some(name) => name,
            None => match self.entry_name(unit, entry, constants::DW_AT_linkage_name)? {
                Some(linkage) => linkage,
                None => return Ok(scope),
            },
        };
        trace!(%name, %domain, %class, address = format_args!("0x{address:x}"), "scanned symbol");
        scanned.symbols.push(ScannedSymbol {
            name,
            domain,
            class,
            address,
            placement,
            section,
        });
        Ok(scope)
    }

    fn unit_ranges(&self, unit: &DwarfUnit) -> SymdexResult<Vec<(u64, u64)>>
    {
        let mut ranges = Vec::new();
        let mut iter = self
            .dwarf
            .unit_ranges(unit)
            .map_err(|err| map_dwarf_error("reading unit ranges", err))?;
        while let Some(range) = iter
            .next()
            .map_err(|err| map_dwarf_error("reading unit ranges", err))?
        {
            if range.begin < range.end {
                ranges.push((range.begin, range.end));
            }
        }
        Ok(ranges)
    }

    /// Files of the unit's line table other than the primary source file
    fn include_files(&self, unit: &DwarfUnit) -> SymdexResult<Vec<(String, Option<String>)>>
    {
        let Some(program) = unit.line_program.as_ref() else {
            return Ok(Vec::new());
        };
        let primary = unit.name.as_ref().map(reader_to_string).transpose()?;
        let header = program.header();
        let mut seen = HashSet::new();
        let mut includes = Vec::new();
        for file in header.file_names() {
            let name = self.attr_to_string(unit, file.path_name())?;
            if primary.as_deref() == Some(name.as_str()) {
                continue;
            }
            let dir = match file.directory(header) {
                Some(value) => Some(self.attr_to_string(unit, value)?),
                None => None,
            };
            if seen.insert((name.clone(), dir.clone())) {
                includes.push((name, dir));
            }
        }
        Ok(includes)
    }

    fn low_pc(&self, unit: &DwarfUnit, entry: &Entry<'_, '_>) -> SymdexResult<Option<u64>>
    {
        match attr_value(entry, constants::DW_AT_low_pc)? {
            Some(AttributeValue::Addr(address)) => Ok(Some(address)),
            Some(AttributeValue::DebugAddrIndex(index)) => self
                .dwarf
                .address(unit, index)
                .map(Some)
                .map_err(|err| map_dwarf_error("resolving DW_AT_low_pc", err)),
            _ => Ok(None),
        }
    }

    /// Address of a variable whose location is a plain `DW_OP_addr`
    fn static_location(&self, unit: &DwarfUnit, entry: &Entry<'_, '_>) -> SymdexResult<Option<u64>>
    {
        let Some(AttributeValue::Exprloc(expression)) = attr_value(entry, constants::DW_AT_location)? else {
            return Ok(None);
        };
        let mut operations = expression.operations(unit.encoding());
        match operations
            .next()
            .map_err(|err| map_dwarf_error("decoding DW_AT_location", err))?
        {
            Some(Operation::Address { address }) => Ok(Some(address)),
            Some(Operation::AddressIndex { index }) => self
                .dwarf
                .address(unit, index)
                .map(Some)
                .map_err(|err| map_dwarf_error("resolving DW_AT_location", err)),
            _ => Ok(None),
        }
    }

    fn entry_name(&self, unit: &DwarfUnit, entry: &Entry<'_, '_>, name: DwAt) -> SymdexResult<Option<String>>
    {
        match attr_value(entry, name)? {
            Some(value) => self.attr_to_string(unit, value).map(Some),
            None => Ok(None),
        }
    }

    fn attr_to_string(&self, unit: &DwarfUnit, value: AttributeValue<OwnedReader>) -> SymdexResult<String>
    {
        let reader = self
            .dwarf
            .attr_string(unit, value)
            .map_err(|err| map_dwarf_error("resolving DWARF string", err))?;
        reader_to_string(&reader)
    }

    fn unit_by_cookie(&self, cookie: u64) -> SymdexResult<DwarfUnit>
    {
        let header = usize::try_from(cookie)
            .ok()
            .and_then(|index| self.headers.get(index))
            .ok_or_else(|| SymdexError::InvalidArgument(format!("no compilation unit #{cookie}")))?;
        self.dwarf
            .unit(header.clone())
            .map_err(|err| map_dwarf_error("parsing compilation unit", err))
    }

    fn install(&self, store: &mut Store, scanned: ScannedUnit, cookie: u64) -> SymdexResult<UnitId>
    {
        let low = scanned.ranges.iter().map(|(low, _)| *low).min();
        let high = scanned.ranges.iter().map(|(_, high)| *high).max();
        let id = match scanned.name {
            Some(name) => store.create_unit(name, low.map(Address::new)),
            None => store.create_anonymous_unit(UNNAMED_UNIT),
        };
        store.set_reader_cookie(id, cookie)?;
        if let Some(dir) = &scanned.comp_dir {
            store.set_dirname(id, dir.clone())?;
        }
        if let (Some(low), Some(high)) = (low, high) {
            store.set_text_range(id, Address::new(low), Address::new(high))?;
        }
        for (low, high) in &scanned.ranges {
            store.record_address_range(id, Address::new(*low), Address::new(*high))?;
        }

        for symbol in &scanned.symbols {
            let mut new = NewSymbol::new(&symbol.name, symbol.domain, symbol.class)
                .at(Address::new(symbol.address))
                .language(scanned.language)
                .placement(symbol.placement);
            if let Some(section) = symbol.section {
                new = new.section(section);
            }
            store.add_symbol(id, new)?;
        }
        store.finalize(id)?;

        for (file, dir) in scanned.includes {
            let include = store.create_unit(file, None);
            if let Some(dir) = dir.or_else(|| scanned.comp_dir.clone()) {
                store.set_dirname(include, dir)?;
            }
            store.set_user(include, id)?;
            store.finalize(include)?;
        }
        Ok(id)
    }
}

impl DebugInfoReader for DwarfReader
{
    fn read_partial_symbols(&mut self, store: &mut Store, image: &dyn ImageServices) -> SymdexResult<()>
    {
        self.headers.clear();
        self.adopted.clear();
        let mut by_offset: HashMap<DebugInfoOffset, UnitId> = HashMap::new();
        let mut imports: Vec<(UnitId, DebugInfoOffset)> = Vec::new();
        let mut partial_units: HashSet<UnitId> = HashSet::new();

        let mut headers = self.dwarf.units();
        while let Some(header) = headers
            .next()
            .map_err(|err| map_dwarf_error("reading .debug_info unit header", err))?
        {
            let cookie = self.headers.len() as u64;
            let offset = header.offset().as_debug_info_offset();
            self.headers.push(header.clone());
            let unit = self
                .dwarf
                .unit(header)
                .map_err(|err| map_dwarf_error("parsing compilation unit", err))?;
            let Some(mut scanned) = self.scan_unit(&unit, false)? else {
                continue;
            };
            let pending = std::mem::take(&mut scanned.imports);
            let partial = scanned.partial;
            let id = self.install(store, scanned, cookie)?;
            if partial {
                partial_units.insert(id);
            }
            if let Some(offset) = offset {
                by_offset.insert(offset, id);
            }
            imports.extend(pending.into_iter().map(|target| (id, target)));
        }

        for (owner, shared) in link_imports(store, &imports, &by_offset, &partial_units)? {
            self.adopted.entry(owner).or_default().push(shared);
        }
        debug!(image = image.name(), units = store.len(), "scanned compilation units");
        Ok(())
    }

    fn read_compunit(&mut self, unit: &Unit, store: &Store) -> SymdexResult<CompunitSymtab>
    {
        let dwarf_unit = self.unit_by_cookie(unit.reader_cookie())?;
        let scanned = self
            .scan_unit(&dwarf_unit, true)?
            .ok_or_else(|| SymdexError::InvalidArgument(format!("{} is not a compilation unit", unit.filename())))?;

        let (start, end) = unit.text_range(store.cache());
        let mut table = CompunitSymtab::new(unit.filename());
        table.global_block = Block {
            start,
            end,
            symbols: Vec::new(),
        };
        table.static_block = table.global_block.clone();
        add_full_symbols(&mut table, scanned);

        // Imported partial units are read together with their owner.
        let mut pending: Vec<UnitId> = self.adopted.get(&unit.id()).cloned().unwrap_or_default();
        let mut visited: HashSet<UnitId> = HashSet::from([unit.id()]);
        while let Some(shared) = pending.pop() {
            if !visited.insert(shared) {
                continue;
            }
            let dwarf_unit = self.unit_by_cookie(store.get(shared)?.reader_cookie())?;
            if let Some(scanned) = self.scan_unit(&dwarf_unit, true)? {
                add_full_symbols(&mut table, scanned);
            }
            pending.extend(self.adopted.get(&shared).into_iter().flatten().copied());
        }
        Ok(table)
    }
}

fn add_full_symbols(table: &mut CompunitSymtab, scanned: ScannedUnit)
{
    for symbol in scanned.symbols {
        let full = FullSymbol {
            name: symbol.name,
            domain: symbol.domain,
            class: symbol.class,
            address: Address::new(symbol.address),
            language: scanned.language,
        };
        match symbol.placement {
            Placement::Global => table.global_block.symbols.push(full),
            Placement::Static => table.static_block.symbols.push(full),
        }
    }
}

/// Record every import as a dependency of the importing unit
///
/// An imported `DW_TAG_partial_unit` also becomes a shared unit of the first
/// unit importing it, unless that would make the user links loop. Returns the
/// `(owner, shared)` pairs that were linked.
fn link_imports(
    store: &mut Store,
    imports: &[(UnitId, DebugInfoOffset)],
    by_offset: &HashMap<DebugInfoOffset, UnitId>,
    partial_units: &HashSet<UnitId>,
) -> SymdexResult<Vec<(UnitId, UnitId)>>
{
    let mut adopted = Vec::new();
    for (importer, target) in imports {
        let Some(dependency) = by_offset.get(target).copied() else {
            trace!(unit = %importer, "imported unit at {:#x} not found", target.0);
            continue;
        };
        if dependency == *importer {
            continue;
        }
        store.add_dependency(*importer, dependency)?;
        if partial_units.contains(&dependency)
            && !store.get(dependency)?.is_shared()
            && store.owner_of(*importer)? != dependency
        {
            store.set_user(dependency, *importer)?;
            adopted.push((*importer, dependency));
        }
    }
    Ok(adopted)
}

fn attr_value(entry: &Entry<'_, '_>, name: DwAt) -> SymdexResult<Option<AttributeValue<OwnedReader>>>
{
    Ok(entry
        .attr(name)
        .map_err(|err| map_dwarf_error("reading attribute", err))?
        .map(|attr| attr.value()))
}

fn flag(entry: &Entry<'_, '_>, name: DwAt) -> SymdexResult<bool>
{
    Ok(matches!(attr_value(entry, name)?, Some(AttributeValue::Flag(true))))
}

fn placement(external: bool) -> Placement
{
    if external {
        Placement::Global
    } else {
        Placement::Static
    }
}

fn import_target(unit: &DwarfUnit, entry: &Entry<'_, '_>) -> SymdexResult<Option<DebugInfoOffset>>
{
    Ok(match attr_value(entry, constants::DW_AT_import)? {
        Some(AttributeValue::DebugInfoRef(offset)) => Some(offset),
        Some(AttributeValue::UnitRef(offset)) => offset.to_debug_info_offset(&unit.header),
        _ => None,
    })
}

fn qualify(scopes: &[Scope], name: &str) -> String
{
    let mut qualified = String::new();
    for qualifier in scopes.iter().filter_map(|scope| scope.qualifier.as_deref()) {
        qualified.push_str(qualifier);
        qualified.push_str("::");
    }
    qualified.push_str(name);
    qualified
}

fn reader_to_string(reader: &OwnedReader) -> SymdexResult<String>
{
    use gimli::Reader as _;

    Ok(reader
        .to_string_lossy()
        .map_err(|err| map_dwarf_error("decoding DWARF string", err))?
        .into_owned())
}

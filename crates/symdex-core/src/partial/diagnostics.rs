//! Maintenance dumps and consistency checks.
//!
//! Everything in here renders to a `String` so the CLI (or a test) decides
//! where it goes. None of these functions expands a unit.

use std::fmt::{self, Write as _};

use regex::Regex;

use super::PartialIndex;
use crate::error::SymdexResult;
use crate::index::{Block, ExpansionState, PartialSymbol, Store, SymbolId, Unit, UnitId};
use crate::paths::compare_filenames_for_search;
use crate::types::{Address, AddressClass};

/// Something the consistency check found wrong
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsistencyFinding
{
    /// The unit's range ends before it starts
    BadRange
    {
        /// Affected unit
        unit: UnitId,
        /// Its file name
        filename: String,
        /// Start of the range
        low: Address,
        /// End of the range
        high: Address,
    },
    /// A partial symbol has no counterpart in the expanded table
    MissingSymbol
    {
        /// Affected unit
        unit: UnitId,
        /// Its file name
        filename: String,
        /// Search name of the symbol
        symbol: String,
        /// Whether the symbol was on the global list
        global: bool,
    },
    /// The unit's range is wider than its table's global block
    RangeExceedsBlock
    {
        /// Affected unit
        unit: UnitId,
        /// Its file name
        filename: String,
        /// Start of the unit's range
        low: Address,
        /// End of the unit's range
        high: Address,
        /// Start of the global block
        block_start: Address,
        /// End of the global block
        block_end: Address,
    },
}

impl fmt::Display for ConsistencyFinding
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        match self {
            Self::BadRange {
                filename, low, high, ..
            } => write!(f, "Unit {filename} covers bad range {low} - {high}"),
            Self::MissingSymbol {
                filename,
                symbol,
                global,
                ..
            } => {
                let scope = if *global { "Global" } else { "Static" };
                write!(f, "{scope} symbol `{symbol}' only found in {filename} unit")
            }
            Self::RangeExceedsBlock {
                filename,
                low,
                high,
                block_start,
                block_end,
                ..
            } => write!(
                f,
                "Unit {filename} covers bad range {low} - {high} (table block is {block_start} - {block_end})"
            ),
        }
    }
}

impl PartialIndex
{
    /// Human-readable description of one unit and its partial symbols
    ///
    /// ## Errors
    ///
    /// `UnitNotFound` if the unit is not installed.
    pub fn dump_unit(&self, unit: UnitId) -> SymdexResult<String>
    {
        let target = self.store.get(unit)?;
        let offset = self.image.text_section_offset();
        let (low, high) = target.text_range(self.store.cache());
        let mut out = String::new();

        writeln!(out, "Partial symtab for source file {} ({unit})", target.filename())?;
        if target.is_anonymous() {
            writeln!(out, "  Anonymous unit")?;
        }
        writeln!(out, "  Read from object file {}", self.image.name())?;
        match target.state() {
            ExpansionState::Expanded(table) => writeln!(out, "  Full symtab was read ({table})"),
            ExpansionState::Failed(reason) => writeln!(out, "  Full symtab could not be read: {reason}"),
            ExpansionState::InProgress => writeln!(out, "  Full symtab is being read"),
            ExpansionState::Pending if target.is_shared() => writeln!(out, "  Read in through its user"),
            ExpansionState::Pending => writeln!(out, "  Symbols not yet read in"),
        }?;
        writeln!(
            out,
            "  Symbols cover text addresses {}-{}",
            low.relocate(offset),
            high.relocate(offset)
        )?;
        writeln!(
            out,
            "  Address map supported - {}.",
            if target.addrmap_supported() { "yes" } else { "no" }
        )?;
        writeln!(out, "  Depends on {} other partial symtabs.", target.dependencies().len())?;
        for (index, dependency) in target.dependencies().iter().enumerate() {
            let name = self.store.unit(*dependency).map_or("<discarded>", Unit::filename);
            writeln!(out, "    {index} {dependency} {name}")?;
        }
        if let Some(user) = target.user() {
            let name = self.store.unit(user).map_or("<discarded>", Unit::filename);
            writeln!(out, "  Shared partial symtab with user {user} {name}")?;
        }
        if !target.global_symbols().is_empty() {
            writeln!(out, "  Global partial symbols:")?;
            write_symbols(&mut out, &self.store, target.global_symbols(), offset)?;
        }
        if !target.static_symbols().is_empty() {
            writeln!(out, "  Static partial symbols:")?;
            write_symbols(&mut out, &self.store, target.static_symbols(), offset)?;
        }
        Ok(out)
    }

    /// Breakpoints of the address map, optionally only those owned by `unit`
    ///
    /// ## Errors
    ///
    /// `Format` if rendering fails.
    pub fn dump_address_map(&self, unit: Option<UnitId>) -> SymdexResult<String>
    {
        let offset = self.image.text_section_offset();
        let mut out = String::new();
        writeln!(out, "Address map of {}:", self.image.name())?;
        for (address, owner) in self.store.address_map().entries() {
            if unit.is_some_and(|wanted| owner != Some(wanted)) {
                continue;
            }
            match owner {
                Some(owner) => {
                    let name = self.store.unit(owner).map_or("<discarded>", Unit::filename);
                    writeln!(out, "  {} {owner} ({name})", address.relocate(offset))
                }
                None => writeln!(out, "  {} <nobody>", address.relocate(offset)),
            }?;
        }
        Ok(out)
    }

    /// Summary block for every unit whose file name matches `filter`
    ///
    /// ## Errors
    ///
    /// Errors of the partial scan.
    pub fn info_units(&mut self, filter: Option<&Regex>) -> SymdexResult<String>
    {
        self.require_partial_symbols()?;
        let offset = self.image.text_section_offset();
        let mut out = String::new();
        let mut printed_header = false;

        for unit in self.store.range() {
            if filter.is_some_and(|regex| !regex.is_match(unit.filename())) {
                continue;
            }
            if !printed_header {
                writeln!(out, "{{ image {}", self.image.name())?;
                writeln!(out, "  architecture {}", self.image.architecture())?;
                printed_header = true;
            }
            let (low, high) = unit.text_range(self.store.cache());
            writeln!(out, "  {{ unit {} ({})", unit.filename(), unit.id())?;
            writeln!(
                out,
                "    readin {}",
                if self.store.is_read_in(unit.id()) { "yes" } else { "no" }
            )?;
            writeln!(
                out,
                "    fullname {}",
                unit.cached_fullname()
                    .map_or_else(|| "(null)".to_string(), |path| path.display().to_string())
            )?;
            writeln!(out, "    text addresses {} -- {}", low.relocate(offset), high.relocate(offset))?;
            writeln!(out, "    globals {}", unit.global_symbols().len())?;
            writeln!(out, "    statics {}", unit.static_symbols().len())?;
            if let Some(user) = unit.user() {
                let name = self.store.unit(user).map_or("<discarded>", Unit::filename);
                writeln!(out, "    user {user} {name}")?;
            }
            if unit.dependencies().is_empty() {
                writeln!(out, "    dependencies (none)")?;
            } else {
                writeln!(out, "    dependencies {{")?;
                for dependency in unit.dependencies() {
                    let name = self.store.unit(*dependency).map_or("<discarded>", Unit::filename);
                    writeln!(out, "      {dependency} {name}")?;
                }
                writeln!(out, "    }}")?;
            }
            writeln!(
                out,
                "    address map supported {}",
                if unit.addrmap_supported() { "yes" } else { "no" }
            )?;
            writeln!(out, "  }}")?;
        }
        if printed_header {
            writeln!(out, "}}")?;
        }
        Ok(out)
    }

    /// Units whose file name (or full path) names `source`
    ///
    /// ## Errors
    ///
    /// Errors of the partial scan.
    pub fn units_for_source(&mut self, source: &str) -> SymdexResult<Vec<UnitId>>
    {
        let units: Vec<UnitId> = self.require_partial_symbols()?.map(Unit::id).collect();
        let mut found = Vec::new();
        for unit in units {
            let target = self.store.get(unit)?;
            if target.is_anonymous() {
                continue;
            }
            if compare_filenames_for_search(target.filename(), source)
                || compare_filenames_for_search(&self.fullname(unit)?.to_string_lossy(), source)
            {
                found.push(unit);
            }
        }
        Ok(found)
    }

    /// Statistics report
    ///
    /// ## Errors
    ///
    /// `Format` if rendering fails.
    pub fn print_stats(&self) -> SymdexResult<String>
    {
        let stats = self.store.stats();
        let mut out = String::new();
        writeln!(out, "Statistics for '{}':", self.image.name())?;
        writeln!(out, "  Number of partial symbols read: {}", stats.symbols)?;
        writeln!(out, "  Number of units: {}", stats.units)?;
        writeln!(out, "  Number of units (not yet expanded): {}", stats.unexpanded)?;
        writeln!(out, "  Number of full tables: {}", self.tables.len())?;
        writeln!(out, "  Number of distinct names: {}", stats.names)?;
        writeln!(out, "  Address map entries: {}", stats.address_map_entries)?;
        writeln!(
            out,
            "  Symbol cache: {} hits, {} misses, {} bytes",
            stats.cache_hits, stats.cache_misses, stats.cache_memory
        )?;
        writeln!(out, "  Name table: {} bytes", stats.name_memory)?;
        Ok(out)
    }

    /// Compare every read-in unit with its full table
    ///
    /// Units that are not read in only get the range check. A unit with a bad
    /// range is reported once and not compared further.
    #[must_use]
    pub fn check_consistency(&self) -> Vec<ConsistencyFinding>
    {
        let mut findings = Vec::new();
        for unit in self.store.range() {
            let (low, high) = unit.text_range(self.store.cache());
            if high < low {
                findings.push(ConsistencyFinding::BadRange {
                    unit: unit.id(),
                    filename: unit.filename().to_string(),
                    low,
                    high,
                });
                continue;
            }

            let Some(table) = unit.state().table().and_then(|id| self.tables.get(id)) else {
                continue;
            };

            for (list, block, global) in [
                (unit.static_symbols(), &table.static_block, false),
                (unit.global_symbols(), &table.global_block, true),
            ] {
                for id in list {
                    let Some(symbol) = self.store.symbol(*id) else {
                        continue;
                    };
                    if !global && symbol.class == AddressClass::Block && symbol.address == Address::ZERO {
                        continue;
                    }
                    let name = self.store.names().search_name(symbol.name);
                    if block.lookup(name, symbol.domain).is_none() {
                        findings.push(ConsistencyFinding::MissingSymbol {
                            unit: unit.id(),
                            filename: unit.filename().to_string(),
                            symbol: name.to_string(),
                            global,
                        });
                    }
                }
            }

            if exceeds(unit.has_explicit_range(), low, high, &table.global_block) {
                findings.push(ConsistencyFinding::RangeExceedsBlock {
                    unit: unit.id(),
                    filename: unit.filename().to_string(),
                    low,
                    high,
                    block_start: table.global_block.start,
                    block_end: table.global_block.end,
                });
            }
        }
        findings
    }
}

fn exceeds(explicit: bool, low: Address, high: Address, block: &Block) -> bool
{
    explicit && high != Address::ZERO && (low < block.start || high > block.end)
}

fn write_symbols(out: &mut String, store: &Store, list: &[SymbolId], offset: u64) -> fmt::Result
{
    for id in list {
        let Some(symbol) = store.symbol(*id) else {
            continue;
        };
        writeln!(out, "    {}", describe_symbol(store, symbol, offset)?)?;
    }
    Ok(())
}

fn describe_symbol(store: &Store, symbol: &PartialSymbol, offset: u64) -> Result<String, fmt::Error>
{
    let mut line = String::new();
    if let Some(name) = store.names().get(symbol.name) {
        write!(line, "`{}'", name.raw())?;
        if let Some(demangled) = name.demangled() {
            write!(line, "  `{demangled}'")?;
        }
    }
    write!(
        line,
        ", {}, {}, {}, {}",
        symbol.language,
        symbol.domain,
        symbol.class,
        symbol.address.relocate(offset)
    )?;
    if let Some(section) = symbol.section {
        write!(line, ", {section}")?;
    }
    Ok(line)
}
